use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::codes::ErrorType;

/// A single `{type, code, message}` entry returned to API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRecord {
    /// Error category
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    /// Dotted machine-readable code (e.g. `validation.city_code.required`)
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ErrorRecord {
    pub fn new(error_type: ErrorType, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type,
            code: code.into(),
            message: message.into(),
        }
    }
}
