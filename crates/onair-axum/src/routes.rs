//! Router assembly.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// All routes with state applied.
///
/// | Method | Path | Handler |
/// |---|---|---|
/// | GET | `/health` | liveness, uptime, active calls, sinks |
/// | POST | `/interrupts` | publish a breaking-news, listener or trend signal |
/// | GET | `/telephony/stream` | carrier media-stream WebSocket |
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/interrupts", post(handlers::interrupts::publish))
        .route("/telephony/stream", get(handlers::telephony::stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
