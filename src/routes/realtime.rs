//! Relay WebSocket route
//!
//! `GET /realtime` upgrades to the standardized-patient voice relay. See
//! [`crate::handlers::realtime`] for the message protocol.
//!
//! ```json
//! // Client starts the session
//! {"type": "session.configure", "caseId": "chest-pain-01", "dialectLevel": "moderate"}
//!
//! // Relay answers once upstream is configured
//! {"type": "session.ready"}
//! ```

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::realtime_handler;
use crate::middleware::connection_limit_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay router.
///
/// Upgrades pass through the connection limiter, which answers 503 or 429
/// before any upstream work starts.
pub fn create_realtime_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/realtime", get(realtime_handler))
        .route_layer(middleware::from_fn_with_state(
            state,
            connection_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
