//! The periodic roster fan-out task. Templated on the interval loop shape
//! used for heartbeat timers elsewhere in this codebase, generalized into a
//! standalone, server-wide singleton task rather than one per session.

use std::sync::Arc;
use std::time::Duration;

use pico_protocol::{Message, RosterEntry, RosterUpdate};
use tracing::debug;

use crate::state::AppState;

/// Runs forever on `config.broadcast.interval_ms`, suppressing idle ticks
/// when nothing has changed since the last broadcast.
pub async fn run(state: AppState) {
    let period = Duration::from_millis(state.config.broadcast.interval_ms);
    let mut interval = tokio::time::interval(period);
    let mut last_broadcast_version = u64::MAX;

    loop {
        interval.tick().await;

        let version = state.registry.version();
        if version == last_broadcast_version {
            continue;
        }

        let sessions = state.sessions.read().await;
        if sessions.is_empty() {
            last_broadcast_version = version;
            continue;
        }

        let snapshot = state.registry.snapshot();
        let roster = Message::RosterUpdate(RosterUpdate {
            players: snapshot
                .into_iter()
                .map(|(player_id, pose)| RosterEntry {
                    player_id: player_id.to_string(),
                    pose,
                })
                .collect(),
        });
        let encoded: Arc<[u8]> = pico_protocol::encode(&roster).into();

        for handle in sessions.values() {
            handle.enqueue_roster(encoded.clone());
        }
        debug!(version, recipients = sessions.len(), "broadcast tick");

        last_broadcast_version = version;
    }
}
