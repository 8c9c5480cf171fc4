use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Separator joining nested field names into one code segment
pub const DEPTH_MARK: &str = "::";

/// Code used for every not-found record
pub const PARAMETER_UNKNOWN_CODE: &str = "general.parameter_unknown";

/// Field name for validation errors not tied to a field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Client-facing error category (`type` in an error record)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Missing, invalid or insufficient credentials
    AuthenticationError,

    /// Domain errors raised by application logic, and the fallback
    ApiError,

    /// Request payload failed field validation
    ValidationError,

    /// The requested resource does not exist
    InvalidRequestError,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationError => "authentication_error",
            Self::ApiError => "api_error",
            Self::ValidationError => "validation_error",
            Self::InvalidRequestError => "invalid_request_error",
        }
    }
}

/// Discriminant of an [`ApiException`](super::exception::ApiException)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    AuthenticationFailed,
    NotAuthenticated,
    PermissionDenied,
    Custom,
    Validation,
    NotFound,
    Api,
}

/// Kind mapping, checked in declaration order.
const KIND_MAPPING: &[(ExceptionKind, ErrorType)] = &[
    // credentials
    (ExceptionKind::AuthenticationFailed, ErrorType::AuthenticationError),
    (ExceptionKind::NotAuthenticated, ErrorType::AuthenticationError),
    (ExceptionKind::PermissionDenied, ErrorType::AuthenticationError),
    // raised by application logic
    (ExceptionKind::Custom, ErrorType::ApiError),
    (ExceptionKind::Validation, ErrorType::ValidationError),
    // generic
    (ExceptionKind::NotFound, ErrorType::InvalidRequestError),
];

impl ExceptionKind {
    /// Look up the client-facing type, defaulting to `api_error`
    pub fn error_type(self) -> ErrorType {
        KIND_MAPPING
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, error_type)| *error_type)
            .unwrap_or(ErrorType::ApiError)
    }
}
