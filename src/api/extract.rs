use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;

use crate::config::AuthConfig;
use crate::errors::{ApiError, ApiException, FieldError, HandlerError, ValidationDetail};

pub const API_KEY_HEADER: &str = "x-api-key";

/// `Json<T>` whose rejections are raised through the error envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HandlerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_to_error(rejection, &content_type)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection, content_type: &str) -> HandlerError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::unsupported_media_type(content_type).into()
        }
        JsonRejection::JsonDataError(e) => {
            ValidationDetail::non_field([FieldError::invalid(e.body_text())]).into()
        }
        JsonRejection::JsonSyntaxError(e) => {
            ApiError::parse_error(format!("JSON parse error - {}", e.body_text())).into()
        }
        other => ApiError::parse_error(other.body_text()).into(),
    }
}

/// Requires `X-Api-Key` to match the configured key, when one is configured
#[derive(Debug, Clone, Copy)]
pub struct ApiKeyAuth;

#[async_trait]
impl<S> FromRequestParts<S> for ApiKeyAuth
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = HandlerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthConfig::from_ref(state);
        let Some(expected) = auth.api_key.as_deref() else {
            return Ok(Self);
        };

        match parts.headers.get(API_KEY_HEADER) {
            None => Err(ApiException::not_authenticated().into()),
            Some(provided) if provided.as_bytes() == expected.as_bytes() => Ok(Self),
            Some(_) => Err(ApiException::authentication_failed().into()),
        }
    }
}
