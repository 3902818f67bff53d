//! Transport-agnostic state shared by every PICORadar server: the player
//! registry and the session state machine. Nothing in this crate knows
//! about WebSockets, axum, or tokio — the server binary wires it to a
//! transport, and `pico-test-utils` wires it to a mock one.

mod registry;
mod session_state;

pub use registry::{Registry, SessionHandle};
pub use session_state::SessionState;
