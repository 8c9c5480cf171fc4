pub mod envelope;
pub mod logging;

pub use envelope::{error_envelope, with_error_envelope};
pub use logging::logging_middleware;
