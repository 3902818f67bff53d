mod support;

use pico_protocol::{AuthRequest, AuthResponse, Message};
use pico_test_utils::{MockPicoClient, MockPicoClientError};
use support::{spawn_server, ws_url, TEST_TOKEN};

async fn authenticate(client: &mut MockPicoClient, player_id: &str) {
    client
        .send(&Message::AuthRequest(AuthRequest {
            player_id: player_id.to_owned(),
            token: TEST_TOKEN.to_owned(),
        }))
        .await
        .unwrap();
    match client.recv().await.unwrap() {
        Message::AuthResponse(AuthResponse { ok, .. }) => assert!(ok),
        other => panic!("expected AuthResponse, got {other:?}"),
    }
}

/// A frame larger than `pico_protocol::MAX_MESSAGE_BYTES` must be rejected by
/// `decode` as a policy violation and close the connection, not silently
/// dropped by the transport layer before the protocol ever sees it.
#[tokio::test]
async fn oversized_frame_closes_the_connection_as_a_policy_violation() {
    let (addr, _state) = spawn_server().await;

    let mut client = MockPicoClient::connect(&ws_url(addr)).await.unwrap();
    authenticate(&mut client, "alice").await;

    // Well-formed JSON, just padded past the protocol's size limit but still
    // under axum's transport-level cap, so it reaches `pico_protocol::decode`
    // rather than being rejected by the WebSocket layer first.
    let padding = "x".repeat(pico_protocol::MAX_MESSAGE_BYTES + 1024);
    let oversized = format!(
        r#"{{"type":"pose_update","pose":{{"position":[0.0,0.0,0.0],"orientation":[0.0,0.0,0.0,1.0]}},"padding":"{padding}"}}"#
    );
    client.send_raw(oversized.into_bytes()).await.unwrap();

    let err = client.recv().await.unwrap_err();
    assert!(
        matches!(err, MockPicoClientError::Closed),
        "expected the connection to close after an oversized frame, got {err:?}"
    );
}
