//! Table service entry point.

use std::process::ExitCode;

use app::{Backend, Config, run_lifecycle};
use common::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(%err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, cancelling in-flight work");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, cancelling in-flight work");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Tie the root context to the shutdown signal
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });
    let root = Context::with_token(shutdown);

    // 3. Select the storage backend
    tracing::info!(backend = config.backend(), "starting table service");
    let backend = match Backend::connect(&config).await {
        Ok(backend) => backend,
        Err(err) => {
            tracing::error!(%err, "failed to set up storage");
            return ExitCode::from(err.exit_code());
        }
    };

    // 4. Drive one table through its lifecycle
    match run_lifecycle(&backend, &root, &config).await {
        Ok(summary) => {
            tracing::info!(
                table_id = %summary.table_id,
                order_id = %summary.order_id,
                preparations = summary.preparations,
                total = summary.total,
                "lifecycle complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, kind = %err.kind(), "lifecycle failed");
            ExitCode::from(err.exit_code())
        }
    }
}
