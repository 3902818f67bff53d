//! Client-side driver for the PICORadar wire protocol. Symmetric to a
//! Session from the peer side: connect, perform a handshake, then hand off
//! to a background task pair that owns the split socket halves for the life
//! of the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pico_protocol::{AuthRequest, AuthResponse, Message, Pose, PoseUpdate, RosterUpdate};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
    Disconnecting,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("a connect attempt is already in progress")]
    ConnectInProgress,
    #[error("connect did not complete within the 5 second handshake timeout")]
    Timeout,
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed message from server: {0}")]
    Decode(#[from] pico_protocol::DecodeError),
    #[error("server rejected authentication: {0}")]
    Rejected(String),
    #[error("connection closed before the handshake completed")]
    Disconnected,
}

type RosterCallback = Arc<dyn Fn(RosterUpdate) + Send + Sync>;

/// The peer-side counterpart to `services/server`'s Session: one instance
/// per logical connection, reusable across reconnects.
pub struct ClientDriver {
    state: Mutex<ClientState>,
    connecting: AtomicBool,
    pose_tx: Mutex<Option<mpsc::UnboundedSender<Pose>>>,
    callback: Mutex<Option<RosterCallback>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl Default for ClientDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientDriver {
    pub fn new() -> Self {
        ClientDriver {
            state: Mutex::new(ClientState::Disconnected),
            connecting: AtomicBool::new(false),
            pose_tx: Mutex::new(None),
            callback: Mutex::new(None),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// Registers the callback invoked once per received RosterUpdate, on the
    /// driver's internal read task. Must be short and non-blocking.
    pub fn on_roster<F>(&self, callback: F)
    where
        F: Fn(RosterUpdate) + Send + Sync + 'static,
    {
        *self.callback.lock().expect("callback lock poisoned") = Some(Arc::new(callback));
    }

    fn set_state(&self, next: ClientState) {
        *self.state.lock().expect("state lock poisoned") = next;
    }

    /// Connects, authenticates, and returns once the AuthResponse has been
    /// received, all within a 5 second cumulative deadline. A second
    /// concurrent call on the same driver fails immediately rather than
    /// queuing behind the first.
    pub async fn connect(
        &self,
        addr: &str,
        player_id: &str,
        token: &str,
    ) -> Result<(), ClientError> {
        if self.connecting.swap(true, Ordering::SeqCst) {
            return Err(ClientError::ConnectInProgress);
        }
        let outcome = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.do_connect(addr, player_id, token),
        )
        .await;
        self.connecting.store(false, Ordering::SeqCst);

        match outcome {
            Ok(result) => result,
            Err(_) => {
                self.set_state(ClientState::Disconnected);
                Err(ClientError::Timeout)
            }
        }
    }

    async fn do_connect(
        &self,
        addr: &str,
        player_id: &str,
        token: &str,
    ) -> Result<(), ClientError> {
        self.set_state(ClientState::Connecting);
        let url = format!("ws://{addr}/ws");
        let (ws, _response) = tokio_tungstenite::connect_async(url).await?;
        let (mut write, mut read) = ws.split();

        self.set_state(ClientState::Authenticating);
        let request = Message::AuthRequest(AuthRequest {
            player_id: player_id.to_owned(),
            token: token.to_owned(),
        });
        write
            .send(WsFrame::Binary(pico_protocol::encode(&request).into()))
            .await?;

        let response = read_one_message(&mut read).await?;
        match response {
            Some(Message::AuthResponse(AuthResponse { ok: true, .. })) => {}
            Some(Message::AuthResponse(AuthResponse { ok: false, reason })) => {
                self.set_state(ClientState::Disconnected);
                return Err(ClientError::Rejected(reason));
            }
            Some(other) => {
                self.set_state(ClientState::Disconnected);
                return Err(ClientError::Rejected(format!(
                    "expected auth_response, got {other:?}"
                )));
            }
            None => {
                self.set_state(ClientState::Disconnected);
                return Err(ClientError::Disconnected);
            }
        }

        let (pose_tx, pose_rx) = mpsc::unbounded_channel();
        *self.pose_tx.lock().expect("pose_tx lock poisoned") = Some(pose_tx);

        let callback = self.callback.lock().expect("callback lock poisoned").clone();
        *self.reader.lock().expect("reader lock poisoned") =
            Some(tokio::spawn(run_reader(read, callback)));
        *self.writer.lock().expect("writer lock poisoned") =
            Some(tokio::spawn(run_writer(write, pose_rx)));

        self.set_state(ClientState::Connected);
        info!(%player_id, "client driver connected");
        Ok(())
    }

    /// Fire-and-forget. Silently dropped if the driver is not Connected.
    pub fn send_pose(&self, pose: Pose) {
        if self.state() != ClientState::Connected {
            return;
        }
        if let Some(tx) = self.pose_tx.lock().expect("pose_tx lock poisoned").as_ref() {
            let _ = tx.send(pose);
        }
    }

    /// Idempotent; blocks until the internal reader and writer tasks have
    /// joined.
    pub async fn disconnect(&self) {
        if self.state() == ClientState::Disconnected {
            return;
        }
        self.set_state(ClientState::Disconnecting);

        // Dropping the sender closes the writer's channel, which makes it
        // send a close frame and exit; the reader exits when the socket
        // closes in response.
        self.pose_tx.lock().expect("pose_tx lock poisoned").take();

        let writer = self.writer.lock().expect("writer lock poisoned").take();
        if let Some(handle) = writer {
            let _ = handle.await;
        }
        let reader = self.reader.lock().expect("reader lock poisoned").take();
        if let Some(handle) = reader {
            let _ = handle.await;
        }

        self.set_state(ClientState::Disconnected);
    }
}

async fn read_one_message(
    read: &mut futures_util::stream::SplitStream<WsStream>,
) -> Result<Option<Message>, ClientError> {
    loop {
        match read.next().await {
            None => return Ok(None),
            Some(Ok(WsFrame::Binary(bytes))) => return Ok(Some(pico_protocol::decode(&bytes)?)),
            Some(Ok(WsFrame::Text(text))) => {
                return Ok(Some(pico_protocol::decode(text.as_bytes())?))
            }
            Some(Ok(WsFrame::Close(_))) => return Ok(None),
            Some(Ok(WsFrame::Ping(_) | WsFrame::Pong(_) | WsFrame::Frame(_))) => continue,
            Some(Err(err)) => return Err(err.into()),
        }
    }
}

async fn run_reader(
    mut read: futures_util::stream::SplitStream<WsStream>,
    callback: Option<RosterCallback>,
) {
    loop {
        match read.next().await {
            Some(Ok(WsFrame::Binary(bytes))) => match pico_protocol::decode(&bytes) {
                Ok(Message::RosterUpdate(roster)) => {
                    if let Some(callback) = &callback {
                        callback(roster);
                    }
                }
                Ok(_) => continue,
                Err(err) => {
                    warn!(error = %err, "failed to decode server message");
                    continue;
                }
            },
            Some(Ok(WsFrame::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                warn!(error = %err, "transport error in client reader");
                return;
            }
        }
    }
}

async fn run_writer(
    mut write: futures_util::stream::SplitSink<WsStream, WsFrame>,
    mut pose_rx: mpsc::UnboundedReceiver<Pose>,
) {
    while let Some(pose) = pose_rx.recv().await {
        let message = Message::PoseUpdate(PoseUpdate { pose });
        if write
            .send(WsFrame::Binary(pico_protocol::encode(&message).into()))
            .await
            .is_err()
        {
            return;
        }
    }
    let _ = write.send(WsFrame::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let driver = ClientDriver::new();
        assert_eq!(driver.state(), ClientState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_on_a_fresh_driver_is_a_no_op() {
        let driver = ClientDriver::new();
        driver.disconnect().await;
        assert_eq!(driver.state(), ClientState::Disconnected);
    }

    #[tokio::test]
    async fn send_pose_before_connecting_is_silently_dropped() {
        let driver = ClientDriver::new();
        driver.send_pose(Pose::default());
        assert_eq!(driver.state(), ClientState::Disconnected);
    }
}
