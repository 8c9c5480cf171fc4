use anyhow::{Context, Result};
use std::env;
use std::fmt;

use crate::errors::handler::DEFAULT_NOT_FOUND_MESSAGE;

pub const DEFAULT_SERVER_ERROR_MESSAGE: &str =
    "Internal server error, please contact the administrator.";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub errors: ErrorsConfig,
    pub reporting: ReportingConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub instance_id: String,
}

/// Deployment environment, from `ENV_FLAG`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Local,
    Test,
    Staging,
    Production,
    Other(String),
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Self::Local,
            "test" => Self::Test,
            "staging" => Self::Staging,
            "production" | "prod" => Self::Production,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Local => "local",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Production => "production",
            Self::Other(name) => name,
        }
    }

    /// Unhandled errors propagate to the debug page instead of being
    /// converted to a generic 500. Only local and test do this.
    pub fn propagates_unhandled(&self) -> bool {
        matches!(self, Self::Local | Self::Test)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of the error envelope itself
#[derive(Debug, Clone)]
pub struct ErrorsConfig {
    pub environment: Environment,
    /// `details` of the generic 500 envelope
    pub server_error_message: String,
    /// `message` of every not-found record
    pub not_found_message: String,
    /// Realm for `WWW-Authenticate`; without it, authentication errors are 403
    pub www_authenticate_realm: Option<String>,
    /// Largest request body buffered for the `object` field
    pub max_body_bytes: usize,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            server_error_message: DEFAULT_SERVER_ERROR_MESSAGE.to_string(),
            not_found_message: DEFAULT_NOT_FOUND_MESSAGE.to_string(),
            www_authenticate_realm: None,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ErrorsConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportingConfig {
    /// Error tracker endpoint; reports only go to the log when unset
    pub url: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Key required in `X-Api-Key` for write endpoints, if set
    pub api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("API_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .context("API_PORT must be a valid port number")?,
                instance_id: env::var("INSTANCE_ID")
                    .or_else(|_| env::var("HOSTNAME"))
                    .unwrap_or_else(|_| "unknown".to_string()),
            },
            errors: ErrorsConfig {
                environment: Environment::parse(
                    &env::var("ENV_FLAG").unwrap_or_else(|_| "production".to_string()),
                ),
                server_error_message: env::var("SERVER_ERROR_MESSAGE")
                    .unwrap_or_else(|_| DEFAULT_SERVER_ERROR_MESSAGE.to_string()),
                not_found_message: env::var("NOT_FOUND_MESSAGE")
                    .unwrap_or_else(|_| DEFAULT_NOT_FOUND_MESSAGE.to_string()),
                www_authenticate_realm: non_empty_var("WWW_AUTHENTICATE_REALM"),
                max_body_bytes: env::var("MAX_ERROR_BODY_BYTES")
                    .unwrap_or_else(|_| "2097152".to_string())
                    .parse()
                    .context("MAX_ERROR_BODY_BYTES must be a valid number")?,
            },
            reporting: ReportingConfig {
                url: non_empty_var("ERROR_REPORT_URL"),
                timeout_ms: env::var("ERROR_REPORT_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .context("ERROR_REPORT_TIMEOUT_MS must be a valid number")?,
            },
            auth: AuthConfig {
                api_key: non_empty_var("API_KEY"),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
