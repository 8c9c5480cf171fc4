use axum::http::StatusCode;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

use super::codes::ExceptionKind;
use super::validation::{FieldError, ValidationDetail};

/// A domain error declared with a fixed status, detail and code.
///
/// Declare new ones with [`custom_exception!`](crate::custom_exception).
pub trait CustomException {
    const STATUS_CODE: u16;
    const DEFAULT_DETAIL: &'static str;
    const DEFAULT_CODE: &'static str;

    /// Raise with the declared detail and code
    fn raise() -> CustomError
    where
        Self: Sized,
    {
        CustomError::of::<Self>()
    }
}

/// Declare a [`CustomException`] as a unit struct.
///
/// ```
/// error_envelope::custom_exception! {
///     /// Order already shipped
///     pub struct AlreadyShipped {
///         status: 409,
///         detail: "The order has already shipped.",
///         code: "shop.order.already_shipped",
///     }
/// }
/// ```
#[macro_export]
macro_rules! custom_exception {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            status: $status:expr,
            detail: $detail:expr,
            code: $code:expr $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis struct $name;

        impl $crate::errors::CustomException for $name {
            const STATUS_CODE: u16 = $status;
            const DEFAULT_DETAIL: &'static str = $detail;
            const DEFAULT_CODE: &'static str = $code;
        }

        impl ::std::convert::From<$name> for $crate::errors::ApiException {
            fn from(_: $name) -> Self {
                $crate::errors::ApiException::Custom(
                    <$name as $crate::errors::CustomException>::raise(),
                )
            }
        }

        impl ::std::convert::From<$name> for $crate::errors::HandlerError {
            fn from(exception: $name) -> Self {
                $crate::errors::HandlerError::Api($crate::errors::ApiException::from(exception))
            }
        }
    };
}

/// A raised instance of a [`CustomException`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomError {
    status: StatusCode,
    detail: Cow<'static, str>,
    code: Cow<'static, str>,
}

impl CustomError {
    pub fn of<T: CustomException>() -> Self {
        Self {
            status: StatusCode::from_u16(T::STATUS_CODE)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            detail: Cow::Borrowed(T::DEFAULT_DETAIL),
            code: Cow::Borrowed(T::DEFAULT_CODE),
        }
    }

    /// Override the declared detail for this raise
    pub fn with_detail(mut self, detail: impl Into<Cow<'static, str>>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Override the declared code for this raise
    pub fn with_code(mut self, code: impl Into<Cow<'static, str>>) -> Self {
        self.code = code.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

/// Generic API error: parse failures, unsupported methods and media types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
    code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            code: code.into(),
        }
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail, "parse_error")
    }

    pub fn method_not_allowed(method: &str) -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("Method \"{}\" not allowed.", method),
            "method_not_allowed",
        )
    }

    pub fn unsupported_media_type(media_type: &str) -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Unsupported media type \"{}\" in request.", media_type),
            "unsupported_media_type",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

/// Every error the envelope recognizes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiException {
    #[error("{detail}")]
    AuthenticationFailed { detail: String },

    #[error("{detail}")]
    NotAuthenticated { detail: String },

    #[error("{detail}")]
    PermissionDenied { detail: String },

    #[error("{detail}")]
    NotFound { detail: String },

    #[error("Invalid input.")]
    Validation(ValidationDetail),

    #[error("{0}")]
    Custom(CustomError),

    #[error("{0}")]
    Api(ApiError),
}

impl ApiException {
    pub fn authentication_failed() -> Self {
        Self::AuthenticationFailed {
            detail: "Incorrect authentication credentials.".to_string(),
        }
    }

    pub fn not_authenticated() -> Self {
        Self::NotAuthenticated {
            detail: "Authentication credentials were not provided.".to_string(),
        }
    }

    pub fn permission_denied() -> Self {
        Self::PermissionDenied {
            detail: "You do not have permission to perform this action.".to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self::NotFound {
            detail: "Not found.".to_string(),
        }
    }

    /// Validation failure on a single top-level field
    pub fn invalid_field(field: impl Into<String>, error: FieldError) -> Self {
        Self::Validation(ValidationDetail::new().with_error(field, error))
    }

    pub fn kind(&self) -> ExceptionKind {
        match self {
            Self::AuthenticationFailed { .. } => ExceptionKind::AuthenticationFailed,
            Self::NotAuthenticated { .. } => ExceptionKind::NotAuthenticated,
            Self::PermissionDenied { .. } => ExceptionKind::PermissionDenied,
            Self::NotFound { .. } => ExceptionKind::NotFound,
            Self::Validation(_) => ExceptionKind::Validation,
            Self::Custom(_) => ExceptionKind::Custom,
            Self::Api(_) => ExceptionKind::Api,
        }
    }

    /// Machine-readable code of the exception itself
    pub fn code(&self) -> &str {
        match self {
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::NotAuthenticated { .. } => "not_authenticated",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "invalid",
            Self::Custom(e) => e.code(),
            Self::Api(e) => e.code(),
        }
    }

    /// Status before any authentication-header adjustment
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailed { .. } | Self::NotAuthenticated { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Self::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Custom(e) => e.status(),
            Self::Api(e) => e.status(),
        }
    }
}

impl From<ValidationDetail> for ApiException {
    fn from(detail: ValidationDetail) -> Self {
        Self::Validation(detail)
    }
}

impl From<CustomError> for ApiException {
    fn from(error: CustomError) -> Self {
        Self::Custom(error)
    }
}

impl From<ApiError> for ApiException {
    fn from(error: ApiError) -> Self {
        Self::Api(error)
    }
}
