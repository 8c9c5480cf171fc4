use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    create_customer, get_customer, health, list_customers, not_found, AppState,
};
use super::middleware::{logging_middleware, with_error_envelope};
use super::openapi::ApiDoc;
use crate::errors::ExceptionAdapter;
use crate::metrics;

pub fn create_router(state: AppState, adapter: Arc<ExceptionAdapter>) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Health check
        .route("/health", get(health))
        // Courtesy car customers
        .route(
            "/courtesy-car/customers",
            get(list_customers).post(create_customer),
        )
        .route("/courtesy-car/customers/:id", get(get_customer))
        .fallback(not_found);

    with_error_envelope(api, adapter)
        // Metrics endpoint (Prometheus)
        .route("/metrics", get(metrics::metrics_handler))
        // OpenAPI documentation
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware (order matters: logging -> metrics -> cors -> trace)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics::middleware::track_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
