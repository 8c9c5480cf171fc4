use super::codes::PARAMETER_UNKNOWN_CODE;
use super::exception::ApiException;
use super::record::ErrorRecord;

pub const DEFAULT_NOT_FOUND_MESSAGE: &str = "The requested resource does not exist.";

/// Classifies an exception and formats it as error records
#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    not_found_message: String,
}

impl Default for ExceptionHandler {
    fn default() -> Self {
        Self::new(DEFAULT_NOT_FOUND_MESSAGE)
    }
}

impl ExceptionHandler {
    pub fn new(not_found_message: impl Into<String>) -> Self {
        Self {
            not_found_message: not_found_message.into(),
        }
    }

    /// Build the records returned to the client for `exception`.
    ///
    /// Not-found errors always carry [`PARAMETER_UNKNOWN_CODE`] and the
    /// configured message; validation errors are flattened field by field;
    /// everything else becomes one record with the exception's own code and
    /// message.
    pub fn handle(&self, exception: &ApiException) -> Vec<ErrorRecord> {
        let error_type = exception.kind().error_type();
        match exception {
            ApiException::NotFound { .. } => vec![ErrorRecord::new(
                error_type,
                PARAMETER_UNKNOWN_CODE,
                self.not_found_message.as_str(),
            )],
            ApiException::Validation(detail) => detail.unpack(),
            other => vec![ErrorRecord::new(error_type, other.code(), other.to_string())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes::ErrorType;
    use crate::errors::exception::{ApiError, CustomException};
    use crate::errors::validation::{FieldError, ValidationDetail};

    crate::custom_exception! {
        struct AlreadyExists {
            status: 400,
            detail: "Customer already exists.",
            code: "courtesy_car.customer.already_exists",
        }
    }

    #[test]
    fn test_mapped_kinds_yield_one_record() {
        let handler = ExceptionHandler::default();
        let cases = [
            (ApiException::authentication_failed(), ErrorType::AuthenticationError),
            (ApiException::not_authenticated(), ErrorType::AuthenticationError),
            (ApiException::permission_denied(), ErrorType::AuthenticationError),
            (AlreadyExists.into(), ErrorType::ApiError),
            (ApiException::from(ApiError::method_not_allowed("DELETE")), ErrorType::ApiError),
        ];

        for (exc, expected) in cases {
            let records = handler.handle(&exc);
            assert_eq!(records.len(), 1, "{:?}", exc);
            assert_eq!(records[0].error_type, expected);
            assert_eq!(records[0].code, exc.code());
            assert_eq!(records[0].message, exc.to_string());
        }
    }

    #[test]
    fn test_custom_exception_record() {
        let records = ExceptionHandler::default().handle(&AlreadyExists.into());
        assert_eq!(
            records,
            vec![ErrorRecord::new(
                ErrorType::ApiError,
                "courtesy_car.customer.already_exists",
                "Customer already exists.",
            )]
        );
    }

    #[test]
    fn test_overridden_custom_detail_is_used() {
        let exc = ApiException::Custom(AlreadyExists::raise().with_detail("Phone 555 is taken."));
        let records = ExceptionHandler::default().handle(&exc);
        assert_eq!(records[0].message, "Phone 555 is taken.");
    }

    #[test]
    fn test_not_found_ignores_own_message() {
        let exc = ApiException::NotFound {
            detail: "No Customer matches the given query.".to_string(),
        };
        let records = ExceptionHandler::default().handle(&exc);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_type, ErrorType::InvalidRequestError);
        assert_eq!(records[0].code, "general.parameter_unknown");
        assert_eq!(records[0].message, DEFAULT_NOT_FOUND_MESSAGE);
    }

    #[test]
    fn test_not_found_message_is_configurable() {
        let handler = ExceptionHandler::new("Resource missing.");
        let records = handler.handle(&ApiException::not_found());
        assert_eq!(records[0].message, "Resource missing.");
    }

    #[test]
    fn test_validation_is_unpacked() {
        let detail = ValidationDetail::new()
            .with_error("name", FieldError::required())
            .with_nested(
                "delivery",
                ValidationDetail::new().with_nested(
                    "address",
                    ValidationDetail::new().with_error("city_code", FieldError::required()),
                ),
            );
        let records = ExceptionHandler::default().handle(&ApiException::Validation(detail));

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.error_type == ErrorType::ValidationError));
        assert_eq!(records[0].code, "validation.name.required");
        assert_eq!(records[1].code, "validation.delivery::address::city_code.required");
    }

    #[test]
    fn test_handle_is_idempotent() {
        let handler = ExceptionHandler::default();
        let exc = ApiException::Validation(
            ValidationDetail::new()
                .with_nested(
                    "delivery",
                    ValidationDetail::new().with_error("street", FieldError::blank()),
                )
                .with_error("phone", FieldError::required()),
        );

        let first = handler.handle(&exc);
        let second = handler.handle(&exc);
        assert_eq!(first, second);
        assert_eq!(second[1].code, "validation.phone.required");
    }
}
