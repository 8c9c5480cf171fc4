use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use error_envelope::api::handlers::AppStateInner;
use error_envelope::api::routes::create_router;
use error_envelope::config::Config;
use error_envelope::courtesy_car::CustomerStore;
use error_envelope::errors::ExceptionAdapter;
use error_envelope::{metrics, reporting};

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Starting graceful shutdown...");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,error_envelope=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting error envelope service v{}",
        env!("CARGO_PKG_VERSION")
    );

    metrics::registry::init_metrics();
    info!("Metrics registry initialized");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        environment = %config.errors.environment,
        propagate_unhandled = config.errors.environment.propagates_unhandled(),
        "Configuration loaded successfully"
    );

    let reporter =
        reporting::from_config(&config.reporting).context("Failed to initialize error reporter")?;
    let adapter = Arc::new(ExceptionAdapter::new(config.errors.clone(), reporter));

    let state = Arc::new(AppStateInner {
        customers: CustomerStore::new(),
        auth: config.auth.clone(),
        instance_id: config.server.instance_id.clone(),
    });

    let app = create_router(state, adapter);

    let addr = config.server_address();
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind server")?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");

    Ok(())
}
