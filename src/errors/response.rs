use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::record::ErrorRecord;

/// Body of every error response: `{"errors": [{"details", "object"}]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    pub errors: Vec<ErrorEntry>,
}

/// One envelope entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorEntry {
    /// Error records for recognized errors, a plain message for server errors
    pub details: ErrorDetails,
    /// The request body, echoed back unchanged
    #[schema(value_type = Object)]
    pub object: Value,
}

/// `details` is a list of records or, for unhandled server errors, a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ErrorDetails {
    Records(Vec<ErrorRecord>),
    Message(String),
}

impl ErrorEnvelope {
    /// Envelope for an error the handler recognized
    pub fn records(records: Vec<ErrorRecord>, object: Value) -> Self {
        Self {
            errors: vec![ErrorEntry {
                details: ErrorDetails::Records(records),
                object,
            }],
        }
    }

    /// Envelope for an unhandled error, with the cause suppressed
    pub fn message(message: impl Into<String>, object: Value) -> Self {
        Self {
            errors: vec![ErrorEntry {
                details: ErrorDetails::Message(message.into()),
                object,
            }],
        }
    }
}

/// An envelope with its status and extra headers
#[derive(Debug, Clone)]
pub struct EnvelopeResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub envelope: ErrorEnvelope,
}

impl EnvelopeResponse {
    pub fn new(status: StatusCode, envelope: ErrorEnvelope) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            envelope,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

impl IntoResponse for EnvelopeResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, Json(self.envelope)).into_response()
    }
}
