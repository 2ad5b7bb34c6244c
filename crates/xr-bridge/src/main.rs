use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use xr_bridge::{AppState, BridgeConfig, build_facades, build_router};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    let config = BridgeConfig::from_env();

    let default_level = if config.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!("starting xr-bridge v{VERSION}");

    let set = build_facades(&config);
    if set.is_empty() {
        tracing::error!("no facades enabled, refusing to start");
        std::process::exit(2);
    }
    tracing::info!(facades = set.len(), "facades initialized");

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(set, config));
    let app = build_router(state);

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(addr = %addr, error = %err, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %addr, "listening");

    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = serve.await {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }

    tracing::info!("shut down cleanly");
}

/// Resolves on SIGINT or SIGTERM; either triggers graceful shutdown
/// and a zero exit code.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
