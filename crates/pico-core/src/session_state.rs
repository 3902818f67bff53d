/// The states a single connection moves through.
///
/// Transport code (the axum handler in the server binary) drives this state
/// machine; `pico-core` only names the states and the legal edges so the
/// invariant is checked in one place regardless of which transport crate
/// ends up driving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, no message received yet.
    Handshaking,
    /// An `AuthRequest` has been read and is being checked against the
    /// configured token.
    Authenticating,
    /// Token accepted; the session is registered and streaming pose updates.
    Authenticated,
    /// A drain was requested (takeover, slow consumer, shutdown, or
    /// transport error) and the session is unwinding: no further inbound
    /// messages are forwarded to the registry.
    Draining,
    /// Terminal. The connection is gone and the session object may be
    /// dropped.
    Closed,
}

impl SessionState {
    /// Whether `self -> next` is one of the allowed transitions.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Handshaking, Authenticating)
                | (Handshaking, Draining)
                | (Authenticating, Authenticated)
                | (Authenticating, Draining)
                | (Authenticated, Draining)
                | (Draining, Closed)
                // A transport error or peer close can short-circuit straight
                // to Closed from any non-terminal state.
                | (Handshaking, Closed)
                | (Authenticating, Closed)
                | (Authenticated, Closed)
        )
    }
}
