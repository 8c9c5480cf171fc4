//! Courtesy car customers: the demo domain served by the API.
//!
//! Payload validation produces nested [`ValidationDetail`]s, and domain
//! rules raise the `courtesy_car.customer.*` exceptions declared here.

pub mod customer;
pub mod store;

pub use customer::{Address, Customer, NewCustomer};
pub use store::CustomerStore;

crate::custom_exception! {
    /// Same phone number with a coverage period overlapping an existing one
    pub struct AlreadyExists {
        status: 400,
        detail: "The customer already exists and its coverage period overlaps.",
        code: "courtesy_car.customer.already_exists",
    }
}

crate::custom_exception! {
    /// Effective date is malformed or outside the allowed window
    pub struct InvalidEffectiveDate {
        status: 400,
        detail: "Invalid effective date for the new customer, e.g. malformed or more than 90 days away.",
        code: "courtesy_car.customer.invalid_effective_date",
    }
}
