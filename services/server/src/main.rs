use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use pico_core::SessionHandle;
use pico_server::state::AppState;
use pico_server::{broadcaster, cli, config, discovery, lockfile};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// PICORadar position-sharing server.
#[derive(Debug, Parser)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Overrides the configured WebSocket listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Path to the single-instance lock file.
    #[arg(long, default_value = "/tmp/picoradar.lock")]
    lock_file: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match config::load_config(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PICORADAR_LOG")
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let _lock = match lockfile::LockGuard::acquire(&args.lock_file) {
        Ok(lock) => lock,
        Err(err) => {
            error!(error = %err, "failed to acquire single-instance lock");
            return ExitCode::FAILURE;
        }
    };

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, addr = %bind_addr, "failed to bind listen address");
            return ExitCode::FAILURE;
        }
    };

    let udp_port = config.discovery.udp_port;
    let service_port = config.server.port;

    let state = AppState::new(config);
    let router = pico_server::build_router(state.clone())
        .into_make_service_with_connect_info::<SocketAddr>();

    tokio::spawn(async move {
        if let Err(err) = discovery::run(udp_port, service_port).await {
            error!(error = %err, "discovery responder exited");
        }
    });
    tokio::spawn(broadcaster::run(state.clone()));
    tokio::spawn(cli::run(state.clone()));

    info!(addr = %bind_addr, "picoradar server listening");
    if let Err(err) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
    {
        error!(error = %err, "server error");
        return ExitCode::FAILURE;
    }

    if tokio::time::timeout(Duration::from_secs(3), wait_for_sessions_to_drain(&state))
        .await
        .is_err()
    {
        warn!("shutdown timeout elapsed with sessions still open; exiting anyway");
    }

    info!("server shut down gracefully");
    ExitCode::SUCCESS
}

async fn wait_for_sessions_to_drain(state: &AppState) {
    while state.authenticated_session_count().await > 0 {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Waits for SIGTERM, Ctrl-C, or the stdin `quit` command, whichever arrives
/// first, then signals every live session to drain.
async fn shutdown_signal(state: AppState) {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
        _ = state.shutdown.wait() => info!("shutting down via stdin command"),
    }

    state.shutdown.fire();
    let sessions = state.sessions.read().await;
    for handle in sessions.values() {
        handle.request_drain(pico_protocol::close_reasons::SHUTDOWN);
    }
}
