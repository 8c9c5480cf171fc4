use axum::{
    extract::{Extension, FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use super::extract::{ApiKeyAuth, JsonBody};
use crate::config::AuthConfig;
use crate::courtesy_car::{Customer, CustomerStore, NewCustomer};
use crate::errors::{ApiException, ErrorEnvelope, HandlerError, Rollback};

lazy_static::lazy_static! {
    static ref START_TIME: Instant = Instant::now();
}

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub customers: CustomerStore,
    pub auth: AuthConfig,
    pub instance_id: String,
}

impl FromRef<AppState> for AuthConfig {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = serde_json::Value)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "error-envelope",
        "version": env!("CARGO_PKG_VERSION"),
        "instance_id": state.instance_id,
        "uptime_seconds": START_TIME.elapsed().as_secs(),
    }))
}

/// Register a courtesy car customer
#[utoipa::path(
    post,
    path = "/courtesy-car/customers",
    tag = "courtesy-car",
    request_body = NewCustomer,
    params(
        ("X-Api-Key" = Option<String>, Header, description = "Required when the service has an API key configured")
    ),
    responses(
        (status = 201, description = "Customer registered", body = Customer),
        (status = 400, description = "Validation failed, invalid effective date, or customer already exists", body = ErrorEnvelope),
        (status = 401, description = "Missing or wrong API key", body = ErrorEnvelope),
        (status = 403, description = "Missing or wrong API key (no WWW-Authenticate realm configured)", body = ErrorEnvelope),
        (status = 500, description = "Unhandled server error", body = ErrorEnvelope)
    )
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(rollback): Extension<Rollback>,
    _auth: ApiKeyAuth,
    JsonBody(payload): JsonBody<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), HandlerError> {
    let customer = payload.validate(Utc::now().date_naive())?;
    let customer = state.customers.insert_in(&rollback, customer).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// Get a customer by id
#[utoipa::path(
    get,
    path = "/courtesy-car/customers/{id}",
    tag = "courtesy-car",
    params(
        ("id" = Uuid, Path, description = "Customer UUID")
    ),
    responses(
        (status = 200, description = "Customer found", body = Customer),
        (status = 404, description = "Customer not found", body = ErrorEnvelope)
    )
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, HandlerError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiException::not_found())?;

    match state.customers.get(id).await {
        Some(customer) => Ok(Json(customer)),
        None => {
            info!("Customer not found: {}", id);
            Err(ApiException::not_found().into())
        }
    }
}

/// List registered customers
#[utoipa::path(
    get,
    path = "/courtesy-car/customers",
    tag = "courtesy-car",
    responses(
        (status = 200, description = "All customers", body = [Customer])
    )
)]
pub async fn list_customers(State(state): State<AppState>) -> Json<Vec<Customer>> {
    Json(state.customers.list().await)
}

/// Any unrouted path
pub async fn not_found() -> HandlerError {
    ApiException::not_found().into()
}
