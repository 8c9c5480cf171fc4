use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::InvalidEffectiveDate;
use crate::errors::{ApiException, FieldError, ValidationDetail};

pub const MAX_NAME_LENGTH: usize = 64;
pub const DEFAULT_COVERAGE_DAYS: u32 = 365;
pub const MAX_COVERAGE_DAYS: u32 = 366;
/// Latest allowed effective date, counted from today
pub const EFFECTIVE_DATE_WINDOW_DAYS: i64 = 90;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Request payload for creating a customer. Every field is optional here so
/// that missing fields are reported as validation errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewCustomer {
    /// Customer name
    pub name: Option<String>,
    /// Contact phone number, digits only
    pub phone: Option<String>,
    /// First day of coverage (`YYYY-MM-DD`), at most 90 days from today
    pub effective_date: Option<String>,
    /// Length of coverage in days (default 365)
    pub coverage_days: Option<u32>,
    /// Where the courtesy car is delivered
    pub delivery: Option<DeliveryPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DeliveryPayload {
    pub address: Option<AddressPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AddressPayload {
    /// Six-digit administrative city code
    pub city_code: Option<String>,
    pub street: Option<String>,
}

/// A registered courtesy car customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub effective_date: NaiveDate,
    /// First day no longer covered
    pub expiry_date: NaiveDate,
    pub delivery: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub city_code: String,
    pub street: String,
}

impl Customer {
    /// Whether both coverage periods share at least one day
    pub fn overlaps(&self, other: &Customer) -> bool {
        self.effective_date < other.expiry_date && other.effective_date < self.expiry_date
    }
}

impl NewCustomer {
    /// Validate the payload against `today` and build the customer.
    ///
    /// Field errors are collected for the whole payload before the
    /// effective date window is checked.
    pub fn validate(self, today: NaiveDate) -> Result<Customer, ApiException> {
        let mut detail = ValidationDetail::new();

        let name = text_field(&mut detail, "name", self.name, MAX_NAME_LENGTH);
        let phone = text_field(&mut detail, "phone", self.phone, 20);
        if let Some(p) = &phone {
            if p.len() < 5 || !p.chars().all(|c| c.is_ascii_digit()) {
                detail.add("phone", FieldError::invalid("Enter a valid phone number."));
            }
        }
        let effective_date = text_field(&mut detail, "effective_date", self.effective_date, 10);

        let coverage_days = self.coverage_days.unwrap_or(DEFAULT_COVERAGE_DAYS);
        if coverage_days == 0 {
            detail.add(
                "coverage_days",
                FieldError::new("min_value", "Ensure this value is greater than or equal to 1."),
            );
        } else if coverage_days > MAX_COVERAGE_DAYS {
            detail.add(
                "coverage_days",
                FieldError::new(
                    "max_value",
                    format!(
                        "Ensure this value is less than or equal to {}.",
                        MAX_COVERAGE_DAYS
                    ),
                ),
            );
        }

        let address = match self.delivery {
            None => {
                detail.add("delivery", FieldError::required());
                None
            }
            Some(delivery) => {
                let (address, errors) = validate_delivery(delivery);
                detail.nest("delivery", errors);
                address
            }
        };

        if !detail.is_empty() {
            return Err(ApiException::Validation(detail));
        }

        // every field above is present once the detail is empty
        let (Some(name), Some(phone), Some(effective_date), Some(delivery)) =
            (name, phone, effective_date, address)
        else {
            return Err(ApiException::Validation(detail));
        };

        let effective_date = NaiveDate::parse_from_str(&effective_date, DATE_FORMAT)
            .map_err(|_| ApiException::from(InvalidEffectiveDate))?;
        if effective_date < today
            || effective_date > today + Duration::days(EFFECTIVE_DATE_WINDOW_DAYS)
        {
            return Err(InvalidEffectiveDate.into());
        }

        Ok(Customer {
            id: Uuid::new_v4(),
            name,
            phone,
            effective_date,
            expiry_date: effective_date + Duration::days(i64::from(coverage_days)),
            delivery,
        })
    }
}

fn validate_delivery(delivery: DeliveryPayload) -> (Option<Address>, ValidationDetail) {
    let mut detail = ValidationDetail::new();
    let Some(address) = delivery.address else {
        detail.add("address", FieldError::required());
        return (None, detail);
    };

    let mut address_errors = ValidationDetail::new();
    let city_code = text_field(&mut address_errors, "city_code", address.city_code, 6);
    if let Some(code) = &city_code {
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            address_errors.add("city_code", FieldError::invalid("Enter a valid city code."));
        }
    }
    let street = text_field(&mut address_errors, "street", address.street, 255);
    detail.nest("address", address_errors);

    match (city_code, street) {
        (Some(city_code), Some(street)) if detail.is_empty() => {
            (Some(Address { city_code, street }), detail)
        }
        _ => (None, detail),
    }
}

/// Required, non-blank, length-limited text. Returns the trimmed value when valid.
fn text_field(
    detail: &mut ValidationDetail,
    field: &str,
    value: Option<String>,
    max_length: usize,
) -> Option<String> {
    let Some(value) = value else {
        detail.add(field, FieldError::required());
        return None;
    };
    let value = value.trim();
    if value.is_empty() {
        detail.add(field, FieldError::blank());
        return None;
    }
    if value.chars().count() > max_length {
        detail.add(field, FieldError::max_length(max_length));
        return None;
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExceptionHandler;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn valid() -> NewCustomer {
        NewCustomer {
            name: Some("Wang Fang".to_string()),
            phone: Some("13800138000".to_string()),
            effective_date: Some("2024-03-15".to_string()),
            coverage_days: None,
            delivery: Some(DeliveryPayload {
                address: Some(AddressPayload {
                    city_code: Some("310000".to_string()),
                    street: Some("88 Century Avenue".to_string()),
                }),
            }),
        }
    }

    fn codes(err: &ApiException) -> Vec<String> {
        ExceptionHandler::default()
            .handle(err)
            .into_iter()
            .map(|r| r.code)
            .collect()
    }

    #[test]
    fn test_valid_payload() {
        let customer = valid().validate(today()).unwrap();
        assert_eq!(customer.name, "Wang Fang");
        assert_eq!(customer.effective_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(customer.expiry_date, NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(customer.delivery.city_code, "310000");
    }

    #[test]
    fn test_empty_payload_reports_every_field() {
        let err = NewCustomer::default().validate(today()).unwrap_err();
        assert_eq!(
            codes(&err),
            vec![
                "validation.name.required",
                "validation.phone.required",
                "validation.effective_date.required",
                "validation.delivery.required",
            ]
        );
    }

    #[test]
    fn test_nested_address_errors() {
        let mut payload = valid();
        payload.delivery = Some(DeliveryPayload {
            address: Some(AddressPayload {
                city_code: None,
                street: Some("  ".to_string()),
            }),
        });

        let err = payload.validate(today()).unwrap_err();
        assert_eq!(
            codes(&err),
            vec![
                "validation.delivery::address::city_code.required",
                "validation.delivery::address::street.blank",
            ]
        );
    }

    #[test]
    fn test_missing_address() {
        let mut payload = valid();
        payload.delivery = Some(DeliveryPayload { address: None });
        let err = payload.validate(today()).unwrap_err();
        assert_eq!(codes(&err), vec!["validation.delivery::address.required"]);
    }

    #[test]
    fn test_invalid_phone_and_city_code() {
        let mut payload = valid();
        payload.phone = Some("12ab".to_string());
        payload.delivery.as_mut().unwrap().address.as_mut().unwrap().city_code =
            Some("31".to_string());

        let err = payload.validate(today()).unwrap_err();
        assert_eq!(
            codes(&err),
            vec![
                "validation.phone.invalid",
                "validation.delivery::address::city_code.invalid",
            ]
        );
    }

    #[test]
    fn test_coverage_days_bounds() {
        let mut payload = valid();
        payload.coverage_days = Some(0);
        let err = payload.validate(today()).unwrap_err();
        assert_eq!(codes(&err), vec!["validation.coverage_days.min_value"]);

        let mut payload = valid();
        payload.coverage_days = Some(400);
        let err = payload.validate(today()).unwrap_err();
        assert_eq!(codes(&err), vec!["validation.coverage_days.max_value"]);
    }

    #[test]
    fn test_malformed_effective_date() {
        let mut payload = valid();
        payload.effective_date = Some("15/03/2024".to_string());
        let err = payload.validate(today()).unwrap_err();
        assert_eq!(codes(&err), vec!["courtesy_car.customer.invalid_effective_date"]);
    }

    #[test]
    fn test_effective_date_window() {
        let mut payload = valid();
        payload.effective_date = Some("2024-06-30".to_string());
        assert!(payload.validate(today()).is_err());

        let mut payload = valid();
        payload.effective_date = Some("2024-02-29".to_string());
        assert!(payload.validate(today()).is_err());

        let mut payload = valid();
        payload.effective_date = Some("2024-05-30".to_string());
        assert!(payload.validate(today()).is_ok());
    }

    #[test]
    fn test_overlap() {
        let a = valid().validate(today()).unwrap();
        let mut b = a.clone();
        b.effective_date = a.expiry_date;
        b.expiry_date = a.expiry_date + Duration::days(10);
        assert!(!a.overlaps(&b));

        b.effective_date = a.expiry_date - Duration::days(1);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }
}
