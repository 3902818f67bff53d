mod support;

use pico_protocol::{AuthRequest, AuthResponse, Message};
use pico_test_utils::MockPicoClient;
use support::{spawn_server, ws_url, TEST_TOKEN};

#[tokio::test]
async fn valid_token_is_accepted() {
    let (addr, _state) = spawn_server().await;
    let mut client = MockPicoClient::connect(&ws_url(addr)).await.unwrap();

    client
        .send(&Message::AuthRequest(AuthRequest {
            player_id: "alice".to_owned(),
            token: TEST_TOKEN.to_owned(),
        }))
        .await
        .unwrap();

    match client.recv().await.unwrap() {
        Message::AuthResponse(AuthResponse { ok, .. }) => assert!(ok),
        other => panic!("expected AuthResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn bad_token_is_rejected_and_connection_closes() {
    let (addr, state) = spawn_server().await;
    let mut client = MockPicoClient::connect(&ws_url(addr)).await.unwrap();

    client
        .send(&Message::AuthRequest(AuthRequest {
            player_id: "alice".to_owned(),
            token: "wrong-token".to_owned(),
        }))
        .await
        .unwrap();

    match client.recv().await.unwrap() {
        Message::AuthResponse(AuthResponse { ok, .. }) => assert!(!ok),
        other => panic!("expected AuthResponse, got {other:?}"),
    }

    // The server closes the socket right after a rejection; the registry
    // never gains an entry for this player.
    assert!(matches!(client.recv().await, Err(_)));
    assert_eq!(state.registry.count(), 0);
}

#[tokio::test]
async fn malformed_player_id_is_rejected() {
    let (addr, _state) = spawn_server().await;
    let mut client = MockPicoClient::connect(&ws_url(addr)).await.unwrap();

    client
        .send(&Message::AuthRequest(AuthRequest {
            player_id: "".to_owned(),
            token: TEST_TOKEN.to_owned(),
        }))
        .await
        .unwrap();

    match client.recv().await.unwrap() {
        Message::AuthResponse(AuthResponse { ok, .. }) => assert!(!ok),
        other => panic!("expected AuthResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn non_auth_first_message_is_rejected() {
    let (addr, _state) = spawn_server().await;
    let mut client = MockPicoClient::connect(&ws_url(addr)).await.unwrap();

    client
        .send(&Message::PoseUpdate(pico_protocol::PoseUpdate {
            pose: pico_protocol::Pose::default(),
        }))
        .await
        .unwrap();

    match client.recv().await.unwrap() {
        Message::AuthResponse(AuthResponse { ok, .. }) => assert!(!ok),
        other => panic!("expected AuthResponse, got {other:?}"),
    }
}
