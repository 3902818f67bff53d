use serde::{Deserialize, Serialize};

/// A player's position, rotation, scene id, and timestamp at one instant.
///
/// The server never validates numeric ranges or quaternion normalization;
/// values are opaque peer-authored metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    /// Borrowed as an owned `String` rather than `&str` since poses are
    /// stored in the registry and broadcast well past the lifetime of any
    /// single inbound buffer.
    pub scene_id: String,
    /// Peer-authored; treated as opaque metadata, never adjusted by the
    /// server.
    pub timestamp_ms: i64,
}

impl Default for Pose {
    fn default() -> Self {
        Pose {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scene_id: String::new(),
            timestamp_ms: 0,
        }
    }
}
