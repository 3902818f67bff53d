use std::net::SocketAddr;

use pico_server::config::{
    AuthConfig, BroadcastConfig, Config, DiscoveryConfig, LoggingConfig, ServerConfig,
    SessionConfig,
};
use pico_server::state::AppState;

pub const TEST_TOKEN: &str = "integration-test-token";

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
        },
        discovery: DiscoveryConfig { udp_port: 0 },
        auth: AuthConfig {
            token: TEST_TOKEN.to_owned(),
        },
        broadcast: BroadcastConfig { interval_ms: 20 },
        session: SessionConfig {
            auth_timeout_ms: 500,
            queue_capacity: 4,
        },
        logging: LoggingConfig {
            level: "info".to_owned(),
        },
    }
}

/// Spins up a real server on an OS-assigned port and returns its address and
/// `AppState`, with the broadcaster already running against it.
pub async fn spawn_server() -> (SocketAddr, AppState) {
    spawn_server_with_config(test_config()).await
}

pub async fn spawn_server_with_config(config: Config) -> (SocketAddr, AppState) {
    let state = AppState::new(config);
    let router = pico_server::build_router(state.clone())
        .into_make_service_with_connect_info::<SocketAddr>();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    tokio::spawn(pico_server::broadcaster::run(state.clone()));

    (addr, state)
}

pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/ws")
}
