pub mod auth;
pub mod broadcaster;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod lockfile;
pub mod session;
pub mod state;

pub use state::AppState;

use axum::{routing::get, Router};

/// The two routes PICORadar needs: the single bidirectional session route
/// and a plain health check.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(session::ws_handler))
        .route("/healthz", get(health::healthz))
        .with_state(state)
}

mod health {
    use axum::response::IntoResponse;
    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }
}
