//! Structured error handling for API responses

pub mod adapter;
pub mod codes;
pub mod exception;
pub mod handler;
pub mod record;
pub mod response;
pub mod validation;

pub use adapter::{ExceptionAdapter, HandlerError, RequestContext, Rollback, UnhandledError};
pub use codes::{ErrorType, ExceptionKind};
pub use exception::{ApiError, ApiException, CustomError, CustomException};
pub use handler::ExceptionHandler;
pub use record::ErrorRecord;
pub use response::{ErrorDetails, ErrorEnvelope, ErrorEntry};
pub use validation::{FieldError, FieldErrors, ValidationDetail};
