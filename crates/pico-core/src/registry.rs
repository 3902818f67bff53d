use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, Weak};

use pico_protocol::{PlayerId, Pose};
use uuid::Uuid;

/// Narrow view of a Session the Registry is allowed to hold a weak reference
/// to. The registry never owns a Session and never extends its lifetime;
/// a takeover signals the incumbent to drain through this handle rather
/// than the registry reaching into the session directly.
pub trait SessionHandle: Send + Sync {
    /// Stable identifier of the connection this handle belongs to, mostly
    /// useful for log correlation.
    fn id(&self) -> Uuid;

    /// Ask the session to stop streaming and begin draining. `reason` is a
    /// short machine-stable string (see `pico_protocol::close_reasons`),
    /// logged once by the session, not by the registry.
    fn request_drain(&self, reason: &'static str);
}

struct PlayerRecord {
    pose: Pose,
    session_ref: Weak<dyn SessionHandle>,
}

/// The concurrent in-memory map of player identity to latest pose. A single
/// `RwLock` guards the map; critical sections are all O(1) or O(n) clones
/// with no I/O and no suspension points, so a synchronous lock is
/// sufficient — no caller ever holds the guard across an `.await`.
pub struct Registry {
    players: RwLock<HashMap<PlayerId, PlayerRecord>>,
    version: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            players: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
        }
    }

    /// Insert or overwrite a player's pose and owning session.
    ///
    /// If a different, still-live session already owns `player_id`, that
    /// incumbent is asked to drain with reason `"superseded"` before the new
    /// record replaces it. Last writer wins; this never fails.
    pub fn upsert(&self, player_id: PlayerId, pose: Pose, session: Weak<dyn SessionHandle>) {
        let mut players = self.players.write().expect("registry lock poisoned");
        if let Some(existing) = players.get(&player_id) {
            if !existing.session_ref.ptr_eq(&session) {
                if let Some(incumbent) = existing.session_ref.upgrade() {
                    incumbent.request_drain(pico_protocol::close_reasons::SUPERSEDED);
                }
            }
        }
        players.insert(
            player_id,
            PlayerRecord {
                pose,
                session_ref: session,
            },
        );
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Remove a player's record. Idempotent; never fails.
    pub fn remove(&self, player_id: &PlayerId) {
        let mut players = self.players.write().expect("registry lock poisoned");
        if players.remove(player_id).is_some() {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Look up a single player's current pose.
    pub fn get(&self, player_id: &PlayerId) -> Option<Pose> {
        let players = self.players.read().expect("registry lock poisoned");
        players.get(player_id).map(|record| record.pose)
    }

    /// Copy out every (player_id, pose) pair currently registered.
    ///
    /// The returned `Vec` is fully owned and stable even if the registry is
    /// mutated immediately after this call returns.
    pub fn snapshot(&self) -> Vec<(PlayerId, Pose)> {
        let players = self.players.read().expect("registry lock poisoned");
        players
            .iter()
            .map(|(id, record)| (id.clone(), record.pose))
            .collect()
    }

    /// Number of distinct players currently registered.
    pub fn count(&self) -> usize {
        self.players.read().expect("registry lock poisoned").len()
    }

    /// Monotonically increasing counter bumped on every `upsert`/`remove`
    /// that actually changed the map. The Broadcaster polls this
    /// to decide whether a tick has anything new to send.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    struct TestSession {
        id: Uuid,
        drained: AtomicBool,
        reason: RwLock<Option<&'static str>>,
    }

    impl TestSession {
        fn new() -> Arc<Self> {
            Arc::new(TestSession {
                id: Uuid::new_v4(),
                drained: AtomicBool::new(false),
                reason: RwLock::new(None),
            })
        }

        fn was_drained_with(&self, expected: &'static str) -> bool {
            self.drained.load(Ordering::SeqCst) && *self.reason.read().unwrap() == Some(expected)
        }
    }

    impl SessionHandle for TestSession {
        fn id(&self) -> Uuid {
            self.id
        }

        fn request_drain(&self, reason: &'static str) {
            self.drained.store(true, Ordering::SeqCst);
            *self.reason.write().unwrap() = Some(reason);
        }
    }

    fn pid(s: &str) -> PlayerId {
        PlayerId::parse(s).unwrap()
    }

    #[test]
    fn upsert_then_get_then_remove() {
        let registry = Registry::new();
        let session = TestSession::new();
        registry.upsert(pid("alice"), Pose::default(), Arc::downgrade(&session));

        assert_eq!(registry.count(), 1);
        assert!(registry.get(&pid("alice")).is_some());

        registry.remove(&pid("alice"));
        assert_eq!(registry.count(), 0);
        assert!(registry.get(&pid("alice")).is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = Registry::new();
        registry.remove(&pid("ghost"));
        registry.remove(&pid("ghost"));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn snapshot_has_no_duplicates_and_matches_count() {
        let registry = Registry::new();
        let s1 = TestSession::new();
        let s2 = TestSession::new();
        registry.upsert(pid("alice"), Pose::default(), Arc::downgrade(&s1));
        registry.upsert(pid("bob"), Pose::default(), Arc::downgrade(&s2));

        let snap = registry.snapshot();
        assert_eq!(snap.len(), registry.count());
        let mut ids: Vec<_> = snap.iter().map(|(id, _)| id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), snap.len());
    }

    #[test]
    fn repeated_upsert_from_same_session_does_not_trigger_takeover() {
        let registry = Registry::new();
        let session = TestSession::new();
        let handle = Arc::downgrade(&session);

        registry.upsert(pid("alice"), Pose::default(), handle.clone());
        registry.upsert(
            pid("alice"),
            Pose {
                timestamp_ms: 42,
                ..Pose::default()
            },
            handle,
        );

        assert!(!session.drained.load(Ordering::SeqCst));
        assert_eq!(registry.get(&pid("alice")).unwrap().timestamp_ms, 42);
    }

    #[test]
    fn upsert_from_a_different_session_triggers_takeover_of_the_incumbent() {
        let registry = Registry::new();
        let incumbent = TestSession::new();
        let challenger = TestSession::new();

        registry.upsert(pid("bob"), Pose::default(), Arc::downgrade(&incumbent));
        registry.upsert(pid("bob"), Pose::default(), Arc::downgrade(&challenger));

        assert!(incumbent.was_drained_with(pico_protocol::close_reasons::SUPERSEDED));
        assert!(!challenger.drained.load(Ordering::SeqCst));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn upsert_version_counter_advances_on_real_changes_only() {
        let registry = Registry::new();
        let v0 = registry.version();
        registry.remove(&pid("nobody")); // no-op, shouldn't advance
        assert_eq!(registry.version(), v0);

        let session = TestSession::new();
        registry.upsert(pid("alice"), Pose::default(), Arc::downgrade(&session));
        assert!(registry.version() > v0);
    }
}
