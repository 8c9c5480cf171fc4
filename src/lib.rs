// Library exports for testing
pub mod api;
pub mod config;
pub mod courtesy_car;
pub mod errors;
pub mod metrics;
pub mod reporting;
