use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Error envelope Metrics
    pub static ref ERROR_RECORDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "error_records_total",
        "Total error records returned to clients",
        &["type"]  // type: authentication_error, api_error, validation_error, invalid_request_error
    )
    .unwrap();

    pub static ref UNHANDLED_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "unhandled_errors_total",
        "Total errors not recognized by the envelope",
        &["outcome"]  // outcome: propagated, converted
    )
    .unwrap();

    pub static ref ERROR_REPORTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "error_reports_total",
        "Total reports sent to the error tracker",
        &["result"]  // result: sent, failed, dropped
    )
    .unwrap();
}

/// Initialize all metrics (called on startup)
pub fn init_metrics() {
    // Force lazy_static initialization
    lazy_static::initialize(&HTTP_REQUESTS_TOTAL);
    lazy_static::initialize(&HTTP_REQUEST_DURATION_SECONDS);
    lazy_static::initialize(&ERROR_RECORDS_TOTAL);
    lazy_static::initialize(&UNHANDLED_ERRORS_TOTAL);
    lazy_static::initialize(&ERROR_REPORTS_TOTAL);
}
