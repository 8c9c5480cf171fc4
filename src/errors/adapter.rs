use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::exception::{ApiError, ApiException, CustomError};
use super::handler::ExceptionHandler;
use super::response::{EnvelopeResponse, ErrorEnvelope};
use super::validation::ValidationDetail;
use crate::config::ErrorsConfig;
use crate::metrics::registry::{ERROR_RECORDS_TOTAL, UNHANDLED_ERRORS_TOTAL};
use crate::reporting::{ErrorReport, ErrorReporter};

/// Error returned by request handlers
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Recognized: always rendered as an error envelope
    #[error(transparent)]
    Api(#[from] ApiException),

    /// Anything else, e.g. a storage failure
    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),
}

impl From<ValidationDetail> for HandlerError {
    fn from(detail: ValidationDetail) -> Self {
        Self::Api(detail.into())
    }
}

impl From<CustomError> for HandlerError {
    fn from(error: CustomError) -> Self {
        Self::Api(error.into())
    }
}

impl From<ApiError> for HandlerError {
    fn from(error: ApiError) -> Self {
        Self::Api(error.into())
    }
}

/// Response extension carrying a raised error to the envelope middleware
#[derive(Debug, Clone)]
pub struct RaisedError(pub Arc<HandlerError>);

impl IntoResponse for HandlerError {
    /// The body is left empty: the envelope middleware replaces the whole
    /// response using the error stored in the extensions.
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Api(exception) => exception.status_code(),
            Self::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let mut response = status.into_response();
        response.extensions_mut().insert(RaisedError(Arc::new(self)));
        response
    }
}

type Undo = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// The request's transaction.
///
/// Writes made while handling a request register how to undo themselves with
/// [`Rollback::on_rollback`]. Once the response is final the envelope
/// middleware calls [`Rollback::finish`], which runs the undo log (newest
/// first) if the request was marked and discards it otherwise. Clones share
/// the flag and the log.
#[derive(Clone, Default)]
pub struct Rollback {
    marked: Arc<AtomicBool>,
    undo: Arc<Mutex<Vec<Undo>>>,
}

impl Rollback {
    pub fn mark(&self) {
        self.marked.store(true, Ordering::SeqCst);
    }

    pub fn is_marked(&self) -> bool {
        self.marked.load(Ordering::SeqCst)
    }

    /// Register `undo` to run if the request ends up rolled back
    pub fn on_rollback<F, Fut>(&self, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.undo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(move || Box::pin(undo())));
    }

    /// Settle the transaction. Returns how many writes were undone.
    pub async fn finish(&self) -> usize {
        let undo = std::mem::take(&mut *self.undo.lock().unwrap_or_else(PoisonError::into_inner));
        if !self.is_marked() {
            return 0;
        }

        let count = undo.len();
        for step in undo.into_iter().rev() {
            step().await;
        }
        if count > 0 {
            debug!(count, "Rolled back request writes");
        }
        count
    }
}

impl fmt::Debug for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self
            .undo
            .lock()
            .map(|undo| undo.len())
            .unwrap_or_default();
        f.debug_struct("Rollback")
            .field("marked", &self.is_marked())
            .field("pending", &pending)
            .finish()
    }
}

/// What the adapter knows about the failing request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    /// Parsed request body, echoed as `object`
    pub body: Value,
    pub rollback: Rollback,
}

/// An unhandled error left for the debug page (local and test only)
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UnhandledError {
    message: String,
    debug: String,
}

impl UnhandledError {
    fn new(error: &anyhow::Error) -> Self {
        Self {
            message: format!("{:#}", error),
            debug: format!("{:?}", error),
        }
    }

    /// Full error chain as shown on the debug page
    pub fn debug_text(&self) -> &str {
        &self.debug
    }
}

impl IntoResponse for UnhandledError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("Unhandled error\n\n{}", self.debug),
        )
            .into_response()
    }
}

/// Turns raised errors into envelope responses
pub struct ExceptionAdapter {
    config: ErrorsConfig,
    handler: ExceptionHandler,
    reporter: Arc<dyn ErrorReporter>,
}

impl ExceptionAdapter {
    pub fn new(config: ErrorsConfig, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            handler: ExceptionHandler::new(config.not_found_message.clone()),
            config,
            reporter,
        }
    }

    pub fn config(&self) -> &ErrorsConfig {
        &self.config
    }

    /// Build the response for `error`.
    ///
    /// Returns `Err` only for unrecognized errors in environments that
    /// propagate them.
    pub fn respond(
        &self,
        error: &HandlerError,
        ctx: &RequestContext,
    ) -> Result<EnvelopeResponse, UnhandledError> {
        match error {
            HandlerError::Api(exception) => Ok(self.handled(exception, ctx)),
            HandlerError::Unhandled(err) => self.unhandled(err, ctx),
        }
    }

    fn handled(&self, exception: &ApiException, ctx: &RequestContext) -> EnvelopeResponse {
        let (status, headers) = self.default_response(exception);
        ctx.rollback.mark();

        let records = self.handler.handle(exception);
        for record in &records {
            ERROR_RECORDS_TOTAL
                .with_label_values(&[record.error_type.as_str()])
                .inc();
        }

        let envelope = ErrorEnvelope::records(records, ctx.body.clone());
        warn!(
            method = %ctx.method,
            path = %ctx.path,
            status = status.as_u16(),
            "error response detail:\n{}",
            serde_json::to_string_pretty(&envelope).unwrap_or_default()
        );

        EnvelopeResponse::new(status, envelope).with_headers(headers)
    }

    fn unhandled(
        &self,
        err: &anyhow::Error,
        ctx: &RequestContext,
    ) -> Result<EnvelopeResponse, UnhandledError> {
        ctx.rollback.mark();
        if self.config.environment.propagates_unhandled() {
            UNHANDLED_ERRORS_TOTAL
                .with_label_values(&["propagated"])
                .inc();
            return Err(UnhandledError::new(err));
        }

        let report = ErrorReport::new(
            err,
            self.config.environment.as_str(),
            ctx.method.as_str(),
            ctx.path.as_str(),
            ctx.body.clone(),
        );
        error!(
            event_id = %report.event_id,
            method = %ctx.method,
            path = %ctx.path,
            "Unhandled error, returning generic server error: {:#}",
            err
        );
        self.reporter.capture(report);
        UNHANDLED_ERRORS_TOTAL
            .with_label_values(&["converted"])
            .inc();

        Ok(EnvelopeResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorEnvelope::message(self.config.server_error_message.as_str(), ctx.body.clone()),
        ))
    }

    /// Status and headers for a recognized exception
    fn default_response(&self, exception: &ApiException) -> (StatusCode, HeaderMap) {
        let mut headers = HeaderMap::new();
        let status = match exception {
            ApiException::AuthenticationFailed { .. } | ApiException::NotAuthenticated { .. } => {
                match self.www_authenticate() {
                    Some(value) => {
                        headers.insert(header::WWW_AUTHENTICATE, value);
                        StatusCode::UNAUTHORIZED
                    }
                    None => StatusCode::FORBIDDEN,
                }
            }
            other => other.status_code(),
        };
        (status, headers)
    }

    fn www_authenticate(&self) -> Option<HeaderValue> {
        let realm = self.config.www_authenticate_realm.as_deref()?;
        match HeaderValue::from_str(&format!("Bearer realm=\"{}\"", realm)) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(realm = %realm, "Invalid WWW-Authenticate realm, ignoring it");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::errors::codes::ErrorType;
    use crate::errors::exception::CustomException;
    use crate::errors::response::ErrorDetails;
    use crate::errors::validation::FieldError;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Default)]
    struct RecordingReporter {
        reports: Mutex<Vec<ErrorReport>>,
    }

    impl RecordingReporter {
        fn count(&self) -> usize {
            self.reports.lock().unwrap().len()
        }
    }

    impl ErrorReporter for RecordingReporter {
        fn capture(&self, report: ErrorReport) {
            self.reports.lock().unwrap().push(report);
        }
    }

    crate::custom_exception! {
        struct InvalidEffectiveDate {
            status: 400,
            detail: "Invalid effective date.",
            code: "courtesy_car.customer.invalid_effective_date",
        }
    }

    fn adapter(environment: Environment) -> (ExceptionAdapter, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::default());
        let adapter = ExceptionAdapter::new(
            ErrorsConfig::for_environment(environment),
            reporter.clone(),
        );
        (adapter, reporter)
    }

    fn ctx(body: Value) -> RequestContext {
        RequestContext {
            method: "POST".to_string(),
            path: "/courtesy-car/customers".to_string(),
            body,
            rollback: Rollback::default(),
        }
    }

    fn records(response: &EnvelopeResponse) -> &[crate::errors::record::ErrorRecord] {
        match &response.envelope.errors[0].details {
            ErrorDetails::Records(records) => records,
            ErrorDetails::Message(m) => panic!("expected records, got message {:?}", m),
        }
    }

    #[test]
    fn test_recognized_error_echoes_body() {
        let (adapter, reporter) = adapter(Environment::Production);
        let body = json!({"name": "Wang", "delivery": {"address": {}}});
        let ctx = ctx(body.clone());
        let error = HandlerError::from(InvalidEffectiveDate);

        let response = assert_ok!(adapter.respond(&error, &ctx));

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.envelope.errors.len(), 1);
        assert_eq!(response.envelope.errors[0].object, body);
        assert_eq!(
            records(&response)[0].code,
            "courtesy_car.customer.invalid_effective_date"
        );
        assert_eq!(records(&response)[0].error_type, ErrorType::ApiError);
        assert!(ctx.rollback.is_marked());
        assert_eq!(reporter.count(), 0);
    }

    #[test]
    fn test_recognized_error_is_never_propagated() {
        let (adapter, _) = adapter(Environment::Local);
        let error = HandlerError::from(ApiException::invalid_field("phone", FieldError::required()));
        let response = assert_ok!(adapter.respond(&error, &ctx(json!({}))));
        assert_eq!(records(&response)[0].code, "validation.phone.required");
    }

    #[test]
    fn test_unhandled_in_production_returns_generic_500() {
        let (adapter, reporter) = adapter(Environment::Production);
        let body = json!({"phone": "13800000000"});
        let ctx = ctx(body.clone());
        let error = HandlerError::from(anyhow::anyhow!("relation \"customer\" does not exist"));

        let response = assert_ok!(adapter.respond(&error, &ctx));

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.envelope.errors[0].details,
            ErrorDetails::Message(crate::config::DEFAULT_SERVER_ERROR_MESSAGE.to_string())
        );
        assert_eq!(response.envelope.errors[0].object, body);
        assert_eq!(reporter.count(), 1);
        assert!(ctx.rollback.is_marked());

        let reports = reporter.reports.lock().unwrap();
        assert_eq!(reports[0].environment, "production");
        assert!(reports[0].message.contains("does not exist"));
    }

    #[test]
    fn test_unhandled_in_staging_is_converted() {
        let (adapter, reporter) = adapter(Environment::Staging);
        let error = HandlerError::from(anyhow::anyhow!("boom"));
        assert_ok!(adapter.respond(&error, &ctx(json!({}))));
        assert_eq!(reporter.count(), 1);
    }

    #[test]
    fn test_unhandled_propagates_in_local_and_test() {
        for environment in [Environment::Local, Environment::Test] {
            let (adapter, reporter) = adapter(environment);
            let error = HandlerError::from(
                anyhow::anyhow!("connection reset").context("failed to save customer"),
            );

            let unhandled = assert_err!(adapter.respond(&error, &ctx(json!({}))));
            assert!(unhandled.to_string().contains("failed to save customer"));
            assert!(unhandled.debug_text().contains("connection reset"));
            assert_eq!(reporter.count(), 0);
        }
    }

    #[test]
    fn test_authentication_without_realm_is_forbidden() {
        let (adapter, _) = adapter(Environment::Production);
        let error = HandlerError::from(ApiException::not_authenticated());
        let response = assert_ok!(adapter.respond(&error, &ctx(json!({}))));

        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert!(response.headers.get(header::WWW_AUTHENTICATE).is_none());
        assert_eq!(records(&response)[0].error_type, ErrorType::AuthenticationError);
    }

    #[test]
    fn test_authentication_with_realm_is_unauthorized() {
        let reporter = Arc::new(RecordingReporter::default());
        let config = ErrorsConfig {
            www_authenticate_realm: Some("api".to_string()),
            ..ErrorsConfig::default()
        };
        let adapter = ExceptionAdapter::new(config, reporter);
        let error = HandlerError::from(ApiException::authentication_failed());
        let response = assert_ok!(adapter.respond(&error, &ctx(json!({}))));

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers[header::WWW_AUTHENTICATE],
            "Bearer realm=\"api\""
        );
    }

    #[test]
    fn test_method_not_allowed_is_api_error() {
        let (adapter, _) = adapter(Environment::Production);
        let error = HandlerError::from(ApiError::method_not_allowed("DELETE"));
        let response = assert_ok!(adapter.respond(&error, &ctx(json!({}))));

        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(records(&response)[0].code, "method_not_allowed");
        assert_eq!(records(&response)[0].error_type, ErrorType::ApiError);
    }

    #[test]
    fn test_propagated_error_still_marks_rollback() {
        let (adapter, _) = adapter(Environment::Local);
        let ctx = ctx(json!({}));
        let error = HandlerError::from(anyhow::anyhow!("boom"));
        assert_err!(adapter.respond(&error, &ctx));
        assert!(ctx.rollback.is_marked());
    }

    fn counting_rollback(rollback: &Rollback, log: &Arc<Mutex<Vec<u32>>>, step: u32) {
        let log = log.clone();
        rollback.on_rollback(move || async move {
            log.lock().unwrap().push(step);
        });
    }

    #[tokio::test]
    async fn test_marked_rollback_undoes_newest_first() {
        let rollback = Rollback::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        counting_rollback(&rollback, &log, 1);
        counting_rollback(&rollback, &log, 2);

        rollback.clone().mark();
        assert_eq!(rollback.finish().await, 2);
        assert_eq!(*log.lock().unwrap(), vec![2, 1]);
        assert_eq!(rollback.finish().await, 0);
    }

    #[tokio::test]
    async fn test_unmarked_rollback_keeps_writes() {
        let rollback = Rollback::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        counting_rollback(&rollback, &log, 1);

        assert_eq!(rollback.finish().await, 0);
        assert!(log.lock().unwrap().is_empty());

        // The log was discarded, so a later mark has nothing to undo
        rollback.mark();
        assert_eq!(rollback.finish().await, 0);
    }

    #[test]
    fn test_not_found_record() {
        let (adapter, _) = adapter(Environment::Production);
        let error = HandlerError::from(ApiException::not_found());
        let response = assert_ok!(adapter.respond(&error, &ctx(json!({}))));

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(records(&response)[0].code, "general.parameter_unknown");
        assert_eq!(
            records(&response)[0].error_type,
            ErrorType::InvalidRequestError
        );
    }

    #[test]
    fn test_custom_error_status_is_kept() {
        crate::custom_exception! {
            struct Locked {
                status: 423,
                detail: "Customer is locked.",
                code: "courtesy_car.customer.locked",
            }
        }
        let (adapter, _) = adapter(Environment::Production);
        let error = HandlerError::from(Locked::raise());
        let response = assert_ok!(adapter.respond(&error, &ctx(json!({}))));
        assert_eq!(response.status, StatusCode::LOCKED);
    }

    #[test]
    fn test_handler_error_into_response_carries_error() {
        let response = HandlerError::from(ApiException::permission_denied()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let raised = response.extensions().get::<RaisedError>().unwrap();
        assert!(matches!(
            raised.0.as_ref(),
            HandlerError::Api(ApiException::PermissionDenied { .. })
        ));
    }
}
