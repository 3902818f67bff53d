//! Test-only WebSocket client used by `services/server`'s integration suite
//! to drive a real server instance the way a client implementation would,
//! without pulling in a full client driver.

mod client;

pub use client::{MockPicoClient, MockPicoClientError};
