//! Reporting of unhandled errors to an external error tracker.
//!
//! The adapter only depends on [`ErrorReporter`]; which implementation is
//! used is decided at startup from [`ReportingConfig`].

pub mod http;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ReportingConfig;

pub use http::HttpReporter;

/// Everything the tracker receives about one unhandled error
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub method: String,
    pub path: String,
    /// Top-level error message
    pub message: String,
    /// Messages of the error and each of its causes, outermost first
    pub chain: Vec<String>,
    /// The request body
    pub object: Value,
}

impl ErrorReport {
    pub fn new(
        error: &anyhow::Error,
        environment: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        object: Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            environment: environment.into(),
            method: method.into(),
            path: path.into(),
            message: error.to_string(),
            chain: error.chain().map(|cause| cause.to_string()).collect(),
            object,
        }
    }
}

/// Sink for unhandled errors. Calls must not block the request.
pub trait ErrorReporter: Send + Sync {
    fn capture(&self, report: ErrorReport);
}

/// Writes reports to the log only
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn capture(&self, report: ErrorReport) {
        error!(
            event_id = %report.event_id,
            environment = %report.environment,
            method = %report.method,
            path = %report.path,
            chain = ?report.chain,
            "Unhandled error captured: {}",
            report.message
        );
    }
}

/// Pick the reporter for this deployment
pub fn from_config(config: &ReportingConfig) -> anyhow::Result<Arc<dyn ErrorReporter>> {
    match &config.url {
        Some(url) => {
            info!("Error reports will be sent to {}", url);
            Ok(Arc::new(HttpReporter::new(url.clone(), config.timeout_ms)?))
        }
        None => {
            info!("ERROR_REPORT_URL not set, error reports go to the log only");
            Ok(Arc::new(TracingReporter))
        }
    }
}
