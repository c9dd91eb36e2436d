//! Gateway entry point: load configuration, build the router, serve until a
//! shutdown signal arrives.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use tenantgate::config::GatewayConfig;
use tenantgate::forward::{BackendClient, BackendConfig, BackendForwarder};
use tenantgate::server::{AppState, router};

/// Command-line options. Credentials and policy come from the environment
/// (see [`GatewayConfig::from_env`]); only the listen surface is a flag.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address and port to listen on
    #[arg(short, long, env = "TENANTGATE_LISTEN", default_value = "0.0.0.0:8484")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match GatewayConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(error = %e, "Configuration invalid, refusing to start");
            return Err(e.into());
        }
    };

    let backend = BackendClient::new(BackendConfig {
        timeout: config.request_timeout,
        connect_timeout: config.connect_timeout,
        pool_max_idle_per_host: config.pool_max_idle_per_host,
        ..BackendConfig::default()
    })?;
    let backend: Arc<dyn BackendForwarder> = Arc::new(backend);

    let state = AppState::new(config, backend);
    let app = router(state);

    let listener = TcpListener::bind(&cli.listen).await?;
    info!(listen = %cli.listen, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install SIGINT handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("SIGINT received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
