//! hitcount gateway binary.
//!
//! - Config: `HITCOUNT_CONFIG` (default `hitcount.yaml`), then `HITCOUNT_*` overrides
//! - In-memory store with an expiry sweeper
//! - Graceful shutdown on SIGINT/SIGTERM: streams close first, then the listener drains

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use hitcount_core::{HitcountError, Result};
use hitcount_gateway::{app_state::AppState, config, router, store::MemoryServer};

const DEFAULT_CONFIG_PATH: &str = "hitcount.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "hitcount-gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("HITCOUNT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::resolve(Some(path.as_str()), |k| std::env::var(k).ok())?;
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| HitcountError::BadRequest(format!("gateway.listen: {e}")))?;

    let server = MemoryServer::new(cfg.store.databases);
    let sweep_every = Duration::from_millis(cfg.store.sweep_interval_ms);
    let state = AppState::new(cfg, &server)?;
    let sweeper = server.spawn_sweeper(sweep_every, state.shutdown_signal());

    let app = router::build_router(state.clone());

    tracing::info!(%listen, "hitcount-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| HitcountError::Internal(format!("bind {listen} failed: {e}")))?;

    let shutdown_state = state.clone();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_state.begin_shutdown();
        })
        .await
        .map_err(|e| HitcountError::Internal(format!("server failed: {e}")))?;

    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "sweeper task ended abnormally");
    }
    tracing::info!("hitcount-gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
