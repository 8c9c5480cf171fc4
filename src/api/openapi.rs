use utoipa::OpenApi;

use crate::courtesy_car::customer::{AddressPayload, DeliveryPayload};
use crate::courtesy_car::{Address, Customer, NewCustomer};
use crate::errors::{ErrorDetails, ErrorEntry, ErrorEnvelope, ErrorRecord, ErrorType};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Error Envelope Service",
        version = "0.1.0",
        description = "Courtesy car customer API. Every error is returned as {\"errors\": [{\"details\", \"object\"}]}, where details lists {type, code, message} records, or is a plain message for unhandled server errors.",
    ),
    paths(
        crate::api::handlers::health,
        crate::api::handlers::create_customer,
        crate::api::handlers::get_customer,
        crate::api::handlers::list_customers,
    ),
    components(
        schemas(
            ErrorEnvelope,
            ErrorEntry,
            ErrorDetails,
            ErrorRecord,
            ErrorType,
            NewCustomer,
            DeliveryPayload,
            AddressPayload,
            Customer,
            Address,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "courtesy-car", description = "Courtesy car customers"),
    )
)]
pub struct ApiDoc;
