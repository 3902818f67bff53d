//! Per-connection state machine: extract the upgrade, run a timed handshake
//! read, then drive a `tokio::select!` loop over the socket and the
//! per-session outbound queue until the session drains.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use axum::extract::ws::{Message as WsFrame, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use pico_core::{SessionHandle, SessionState};
use pico_protocol::{close_reasons, AuthResponse, DecodeError, Message, PlayerId, Pose};
use tokio::sync::Notify;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Hard transport-level cap on a single WebSocket frame, kept above
/// `pico_protocol::MAX_MESSAGE_BYTES` so a message that exceeds the protocol
/// limit still reaches `decode_frame` and is classified as a policy
/// violation rather than being torn down by the transport first.
const TRANSPORT_MAX_FRAME_BYTES: usize = pico_protocol::MAX_MESSAGE_BYTES * 2;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.max_message_size(TRANSPORT_MAX_FRAME_BYTES)
        .on_upgrade(move |socket| drive_session(socket, state, peer_addr.to_string()))
}

/// The concrete `SessionHandle` a Session hands the Registry as a weak
/// reference. It also carries the per-session outbound queue so the
/// Broadcaster can enqueue a RosterUpdate without reaching into any other
/// part of the session.
pub struct SessionHandleImpl {
    id: Uuid,
    peer_addr: String,
    state: Mutex<SessionState>,
    drain_requested: AtomicBool,
    drain_reason: Mutex<&'static str>,
    notify: Notify,
    outbound: Mutex<VecDeque<Arc<[u8]>>>,
    capacity: usize,
}

impl SessionHandleImpl {
    fn new(id: Uuid, capacity: usize, peer_addr: String) -> Arc<Self> {
        Arc::new(SessionHandleImpl {
            id,
            peer_addr,
            state: Mutex::new(SessionState::Handshaking),
            drain_requested: AtomicBool::new(false),
            drain_reason: Mutex::new(close_reasons::PEER_CLOSED),
            notify: Notify::new(),
            outbound: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    fn reason(&self) -> &'static str {
        *self.drain_reason.lock().expect("drain_reason lock poisoned")
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session state lock poisoned")
    }

    /// Moves to `next` if the edge is legal; otherwise logs and leaves the
    /// state untouched.
    fn transition(&self, next: SessionState) {
        let mut state = self.state.lock().expect("session state lock poisoned");
        if state.can_transition_to(next) {
            *state = next;
        } else {
            warn!(
                session_id = %self.id,
                peer_addr = %self.peer_addr,
                from = ?*state,
                to = ?next,
                "illegal session state transition attempted"
            );
        }
    }

    /// Enqueues an encoded RosterUpdate. Every item this queue ever holds is
    /// a RosterUpdate (the AuthResponse is sent synchronously before the
    /// queue exists), so the slow-consumer policy reduces to "drop the
    /// oldest entry to make room": there is always one to evict.
    pub fn enqueue_roster(&self, bytes: Arc<[u8]>) {
        let mut queue = self.outbound.lock().expect("outbound queue poisoned");
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(bytes);
        drop(queue);
        self.notify.notify_one();
    }

    fn pop_outbound(&self) -> Option<Arc<[u8]>> {
        self.outbound
            .lock()
            .expect("outbound queue poisoned")
            .pop_front()
    }
}

impl SessionHandle for SessionHandleImpl {
    fn id(&self) -> Uuid {
        self.id
    }

    fn request_drain(&self, reason: &'static str) {
        if !self.drain_requested.swap(true, Ordering::SeqCst) {
            *self.drain_reason.lock().expect("drain_reason lock poisoned") = reason;
        }
        self.transition(SessionState::Draining);
        self.notify.notify_one();
    }
}

async fn drive_session(mut socket: WebSocket, state: AppState, peer_addr: String) {
    let id = Uuid::new_v4();
    let handle = SessionHandleImpl::new(id, state.config.session.queue_capacity, peer_addr);

    let player_id = match authenticate(&mut socket, &state, &handle).await {
        Some(player_id) => player_id,
        None => {
            handle.transition(SessionState::Closed);
            return;
        }
    };

    state.register_session(id, handle.clone()).await;
    state.registry.upsert(
        player_id.clone(),
        Pose::default(),
        Arc::downgrade(&handle) as Weak<dyn SessionHandle>,
    );
    info!(session_id = %id, peer_addr = %handle.peer_addr, player_id = %player_id, "session authenticated");

    let reason = stream_loop(&mut socket, &handle, &player_id, &state).await;
    handle.transition(SessionState::Closed);

    state.registry.remove(&player_id);
    state.unregister_session(id).await;
    let _ = socket.send(WsFrame::Close(None)).await;
    info!(session_id = %id, peer_addr = %handle.peer_addr, player_id = %player_id, reason, "session closed");
}

/// Reads exactly one message within the configured auth deadline. Sends an
/// `AuthResponse` and returns `None` on any rejection path (any
/// Authenticating to Draining edge); returns the validated `PlayerId` on
/// success.
async fn authenticate(
    socket: &mut WebSocket,
    state: &AppState,
    handle: &Arc<SessionHandleImpl>,
) -> Option<PlayerId> {
    let timeout = Duration::from_millis(state.config.session.auth_timeout_ms);
    let first = tokio::time::timeout(timeout, socket.recv()).await;

    let request = match first {
        Ok(Some(Ok(frame))) => match decode_frame(frame) {
            Ok(Message::AuthRequest(req)) => {
                handle.transition(SessionState::Authenticating);
                req
            }
            Ok(_) => {
                reject(socket, "first message must be auth_request").await;
                return None;
            }
            Err(err) => {
                warn!(session_id = %handle.id, peer_addr = %handle.peer_addr, error = %err, "malformed first message");
                reject(socket, "malformed first message").await;
                return None;
            }
        },
        Ok(Some(Err(err))) => {
            warn!(session_id = %handle.id, peer_addr = %handle.peer_addr, error = %err, "transport error during handshake");
            return None;
        }
        Ok(None) => return None,
        Err(_) => {
            warn!(session_id = %handle.id, peer_addr = %handle.peer_addr, "authentication timed out");
            reject(socket, "authentication timed out").await;
            return None;
        }
    };

    let player_id = match PlayerId::parse(&request.player_id) {
        Ok(id) => id,
        Err(err) => {
            reject(socket, &format!("invalid player_id: {err}")).await;
            return None;
        }
    };

    if !crate::auth::token_matches(&state.config.auth.token, &request.token) {
        warn!(session_id = %handle.id, peer_addr = %handle.peer_addr, player_id = %player_id, "authentication rejected: bad token");
        reject(socket, "invalid token").await;
        return None;
    }

    let response = Message::AuthResponse(AuthResponse {
        ok: true,
        reason: String::new(),
    });
    if socket
        .send(WsFrame::Binary(pico_protocol::encode(&response).into()))
        .await
        .is_err()
    {
        return None;
    }

    handle.transition(SessionState::Authenticated);
    Some(player_id)
}

async fn reject(socket: &mut WebSocket, reason: &str) {
    let response = Message::AuthResponse(AuthResponse {
        ok: false,
        reason: reason.to_owned(),
    });
    let _ = socket
        .send(WsFrame::Binary(pico_protocol::encode(&response).into()))
        .await;
}

/// Drives the authenticated phase: reads `PoseUpdate`s, flushes queued
/// RosterUpdate bytes whenever the Broadcaster wakes this session, and
/// watches for a drain request. Returns the reason the session stopped.
async fn stream_loop(
    socket: &mut WebSocket,
    handle: &Arc<SessionHandleImpl>,
    player_id: &PlayerId,
    state: &AppState,
) -> &'static str {
    loop {
        tokio::select! {
            _ = handle.notify.notified() => {
                if handle.drain_requested.load(Ordering::SeqCst) {
                    // Flush whatever is already queued before closing, bounded so a
                    // peer that stopped reading entirely can't hang the drain forever.
                    let flushed = tokio::time::timeout(Duration::from_secs(1), async {
                        while let Some(bytes) = handle.pop_outbound() {
                            if socket.send(WsFrame::Binary(bytes.to_vec().into())).await.is_err() {
                                return close_reasons::TRANSPORT_ERROR;
                            }
                        }
                        handle.reason()
                    })
                    .await;
                    return flushed.unwrap_or_else(|_| handle.reason());
                }
                while let Some(bytes) = handle.pop_outbound() {
                    if socket.send(WsFrame::Binary(bytes.to_vec().into())).await.is_err() {
                        return close_reasons::TRANSPORT_ERROR;
                    }
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(WsFrame::Close(_))) | None => return close_reasons::PEER_CLOSED,
                    Some(Ok(WsFrame::Ping(_))) | Some(Ok(WsFrame::Pong(_))) => continue,
                    Some(Ok(other)) => {
                        match decode_frame(other) {
                            Ok(Message::PoseUpdate(update)) => {
                                state.registry.upsert(
                                    player_id.clone(),
                                    update.pose,
                                    Arc::downgrade(handle) as Weak<dyn SessionHandle>,
                                );
                            }
                            Ok(Message::AuthRequest(_)) => {
                                warn!(session_id = %handle.id, peer_addr = %handle.peer_addr, "duplicate auth_request after authentication");
                                return close_reasons::POLICY_VIOLATION;
                            }
                            Ok(_) => {
                                warn!(session_id = %handle.id, peer_addr = %handle.peer_addr, "unexpected message kind after authentication");
                                return close_reasons::POLICY_VIOLATION;
                            }
                            Err(DecodeError::Oversized { len, max }) => {
                                warn!(session_id = %handle.id, peer_addr = %handle.peer_addr, len, max, "oversized inbound message");
                                return close_reasons::POLICY_VIOLATION;
                            }
                            Err(err) => {
                                warn!(session_id = %handle.id, peer_addr = %handle.peer_addr, error = %err, "failed to decode inbound message");
                                return close_reasons::POLICY_VIOLATION;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        warn!(session_id = %handle.id, peer_addr = %handle.peer_addr, error = %err, "transport error");
                        return close_reasons::TRANSPORT_ERROR;
                    }
                }
            }
        }
    }
}

fn decode_frame(frame: WsFrame) -> Result<Message, DecodeError> {
    let bytes: Vec<u8> = match frame {
        WsFrame::Binary(bytes) => bytes.to_vec(),
        WsFrame::Text(text) => text.as_bytes().to_vec(),
        _ => return Err(DecodeError::Malformed("non-data frame".to_owned())),
    };
    pico_protocol::decode(&bytes)
}
