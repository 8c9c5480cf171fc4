use anyhow::anyhow;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::debug;

use crate::errors::adapter::RaisedError;
use crate::errors::{ApiError, ExceptionAdapter, HandlerError, RequestContext, Rollback};

/// Wrap every route (and the fallback) of `router` in [`error_envelope`].
///
/// Panics inside handlers are caught and raised as unhandled errors.
pub fn with_error_envelope<S>(router: Router<S>, adapter: Arc<ExceptionAdapter>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(adapter, error_envelope))
}

/// Buffers the request body, runs the handler, and renders any error it
/// raised through the adapter. The router's own 405 for a wrong method is
/// rendered as a `method_not_allowed` error.
///
/// Handlers get a [`Rollback`] in their request extensions. It is marked
/// whenever an error is rendered and settled once the response is final, so
/// writes registered on it are undone for failed requests.
pub async fn error_envelope(
    State(adapter): State<Arc<ExceptionAdapter>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let rollback = Rollback::default();

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, adapter.config().max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(method = %method, path = %path, "Failed to read request body: {}", e);
            let ctx = RequestContext {
                method,
                path,
                body: empty_object(),
                rollback,
            };
            let error = HandlerError::from(ApiError::parse_error("Request body could not be read."));
            return render(&adapter, &error, &ctx);
        }
    };

    let body = request_object(&bytes);
    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(rollback.clone());

    let mut response = next.run(request).await;
    let error = match response.extensions_mut().remove::<RaisedError>() {
        Some(RaisedError(error)) => Some(error),
        None if response.status() == StatusCode::METHOD_NOT_ALLOWED => Some(Arc::new(
            HandlerError::from(ApiError::method_not_allowed(&method)),
        )),
        None => None,
    };

    let response = match error {
        Some(error) => {
            let ctx = RequestContext {
                method,
                path,
                body,
                rollback: rollback.clone(),
            };
            let mut rendered = render(&adapter, &error, &ctx);
            if let Some(allow) = response.headers().get(header::ALLOW) {
                rendered.headers_mut().insert(header::ALLOW, allow.clone());
            }
            rendered
        }
        None => response,
    };

    rollback.finish().await;
    response
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else {
        "unknown panic payload"
    };
    HandlerError::from(anyhow!("handler panicked: {}", message)).into_response()
}

fn render(adapter: &ExceptionAdapter, error: &HandlerError, ctx: &RequestContext) -> Response {
    match adapter.respond(error, ctx) {
        Ok(envelope) => envelope.into_response(),
        Err(unhandled) => unhandled.into_response(),
    }
}

/// The request body as echoed in `object`: empty or non-JSON bodies are `{}`
fn request_object(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return empty_object();
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| empty_object())
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
