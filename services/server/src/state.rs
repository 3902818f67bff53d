use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pico_core::Registry;
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

use crate::config::Config;
use crate::session::SessionHandleImpl;

pub type SessionRegistry = Arc<RwLock<HashMap<Uuid, Arc<SessionHandleImpl>>>>;

/// A fire-once-from-anywhere shutdown broadcast. `wait()` resolves
/// immediately if `fire()` already ran, and otherwise waits for it, so it is
/// safe to call `wait()` from tasks started before or after the shutdown
/// trigger.
pub struct ShutdownSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        ShutdownSignal {
            flag: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Idempotent; safe to call more than once.
    pub fn fire(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        // Registering interest in `notified()` before checking the flag
        // means a `fire()` racing with this call is never missed.
        let notified = self.notify.notified();
        if self.is_set() {
            return;
        }
        notified.await;
    }
}

/// Shared application state, one instance per process, handed to every
/// axum route and the Broadcaster task.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub sessions: SessionRegistry,
    pub config: Arc<Config>,
    pub shutdown: Arc<ShutdownSignal>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            registry: Arc::new(Registry::new()),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            shutdown: Arc::new(ShutdownSignal::new()),
        }
    }

    pub async fn register_session(&self, id: Uuid, handle: Arc<SessionHandleImpl>) {
        self.sessions.write().await.insert(id, handle);
    }

    pub async fn unregister_session(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }

    pub async fn authenticated_session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
