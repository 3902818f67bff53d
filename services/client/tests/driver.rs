use std::sync::{Arc, Mutex};

use pico_client::{ClientDriver, ClientState};
use pico_protocol::Pose;
use pico_server::config::{
    AuthConfig, BroadcastConfig, Config, DiscoveryConfig, LoggingConfig, ServerConfig,
    SessionConfig,
};
use pico_server::state::AppState;

const TEST_TOKEN: &str = "client-integration-token";

async fn spawn_server() -> std::net::SocketAddr {
    let config = Config {
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
    };
    let state = AppState::new(config);
    let router = pico_server::build_router(state.clone())
        .into_make_service_with_connect_info::<std::net::SocketAddr>();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    tokio::spawn(pico_server::broadcaster::run(state));
    addr
}

#[tokio::test]
async fn connect_then_disconnect_round_trips_state() {
    let addr = spawn_server().await;
    let driver = ClientDriver::new();
    assert_eq!(driver.state(), ClientState::Disconnected);

    driver
        .connect(&addr.to_string(), "alice", TEST_TOKEN)
        .await
        .unwrap();
    assert_eq!(driver.state(), ClientState::Connected);

    driver.disconnect().await;
    assert_eq!(driver.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    let addr = spawn_server().await;
    let driver = ClientDriver::new();

    let err = driver
        .connect(&addr.to_string(), "alice", "wrong-token")
        .await
        .unwrap_err();
    assert!(matches!(err, pico_client::ClientError::Rejected(_)));
    assert_eq!(driver.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn roster_callback_fires_after_a_pose_update() {
    let addr = spawn_server().await;
    let driver = Arc::new(ClientDriver::new());

    let seen = Arc::new(Mutex::new(false));
    let seen_clone = seen.clone();
    driver.on_roster(move |roster| {
        if roster.players.iter().any(|p| p.player_id == "alice") {
            *seen_clone.lock().unwrap() = true;
        }
    });

    driver
        .connect(&addr.to_string(), "alice", TEST_TOKEN)
        .await
        .unwrap();
    driver.send_pose(Pose::default());

    for _ in 0..50 {
        if *seen.lock().unwrap() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(*seen.lock().unwrap(), "expected a roster update containing alice");

    driver.disconnect().await;
}
