use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ErrorReport, ErrorReporter};
use crate::metrics::registry::ERROR_REPORTS_TOTAL;

/// Posts reports as JSON to an error tracker endpoint.
///
/// Delivery runs on a spawned task; the request never waits for it.
#[derive(Clone)]
pub struct HttpReporter {
    url: String,
    http_client: reqwest::Client,
}

impl HttpReporter {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("error-envelope/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("Failed to build error report HTTP client")?;

        Ok(Self {
            url: url.into(),
            http_client,
        })
    }

    async fn send(client: reqwest::Client, url: String, report: ErrorReport) -> Result<()> {
        client
            .post(&url)
            .json(&report)
            .send()
            .await
            .context("Failed to send error report")?
            .error_for_status()
            .context("Error tracker rejected report")?;
        Ok(())
    }
}

impl ErrorReporter for HttpReporter {
    fn capture(&self, report: ErrorReport) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(event_id = %report.event_id, "No async runtime, error report dropped");
            ERROR_REPORTS_TOTAL.with_label_values(&["dropped"]).inc();
            return;
        };

        let client = self.http_client.clone();
        let url = self.url.clone();
        runtime.spawn(async move {
            let event_id = report.event_id;
            match Self::send(client, url, report).await {
                Ok(()) => {
                    debug!(event_id = %event_id, "Error report delivered");
                    ERROR_REPORTS_TOTAL.with_label_values(&["sent"]).inc();
                }
                Err(e) => {
                    warn!(event_id = %event_id, "Error report delivery failed: {:#}", e);
                    ERROR_REPORTS_TOTAL.with_label_values(&["failed"]).inc();
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capture_without_runtime_is_dropped() {
        let reporter = HttpReporter::new("http://127.0.0.1:9/reports", 100).unwrap();
        let dropped = ERROR_REPORTS_TOTAL.with_label_values(&["dropped"]);
        let before = dropped.get();

        let err = anyhow::anyhow!("database is down");
        reporter.capture(ErrorReport::new(&err, "production", "GET", "/", json!({})));

        assert_eq!(dropped.get(), before + 1);
    }
}
