//! Connection limit middleware for relay WebSocket connections
//!
//! Enforces a global cap on concurrent relay sessions and a per-IP cap.
//! Plain HTTP requests pass through untouched; they are rate limited
//! separately.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use osce_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/realtime", get(realtime_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError};

/// Client IP of an admitted WebSocket upgrade, injected for the handler.
#[derive(Clone, Copy, Debug)]
pub struct ClientIp(pub IpAddr);

/// Holds a connection slot and gives it back when dropped.
pub struct ConnectionGuard {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl ConnectionGuard {
    pub fn new(state: Arc<AppState>, ip: IpAddr) -> Self {
        Self { state, ip }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
        tracing::debug!(ip = %self.ip, "Connection slot released");
    }
}

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Reserve a connection slot for WebSocket upgrades.
///
/// Returns 503 when the global limit is reached and 429 when the client's
/// IP is at its limit. On success the request carries a [`ClientIp`]
/// extension and the handler turns it into a [`ConnectionGuard`]. A request
/// that does not end in `101 Switching Protocols` gives its slot back here.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    let client_ip = addr.ip();

    match state.try_acquire_connection(client_ip) {
        Ok(()) => {
            request.extensions_mut().insert(ClientIp(client_ip));
            let response = next.run(request).await;
            // The handler only takes ownership of the slot when it upgrades
            if response.status() != StatusCode::SWITCHING_PROTOCOLS {
                state.release_connection(client_ip);
            }
            response
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(ip = %client_ip, "Rejecting connection: global limit reached");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
        Err(ConnectionLimitError::PerIpLimitReached) => {
            tracing::warn!(ip = %client_ip, "Rejecting connection: per-IP limit reached");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many connections from your IP address.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{Router, middleware, routing::get};
    use std::net::Ipv4Addr;
    use tower::ServiceExt;

    fn state(per_ip: u32) -> Arc<AppState> {
        let mut config = ServerConfig::default();
        config.max_websocket_connections = Some(10);
        config.max_connections_per_ip = per_ip;
        AppState::new(config).unwrap()
    }

    fn upgrade_request(ip: [u8; 4]) -> Request<Body> {
        let mut request = Request::builder()
            .uri("/realtime")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
        request
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/realtime", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .with_state(state)
    }

    #[test]
    fn test_guard_releases_slot() {
        let state = state(3);
        let ip: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();
        state.try_acquire_connection(ip).unwrap();
        {
            let _guard = ConnectionGuard::new(state.clone(), ip);
            assert_eq!(state.ws_connection_count(), 1);
        }
        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.ip_connection_count(&ip), 0);
    }

    #[tokio::test]
    async fn test_per_ip_rejection_status() {
        let state = state(1);
        let ip: IpAddr = Ipv4Addr::new(10, 0, 0, 2).into();
        state.try_acquire_connection(ip).unwrap();

        let response = app(state).oneshot(upgrade_request([10, 0, 0, 2])).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_failed_upgrade_returns_slot() {
        let state = state(2);
        let response = app(state.clone())
            .oneshot(upgrade_request([10, 0, 0, 4]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_plain_requests_pass_through() {
        let state = state(0);
        let mut request = Request::builder()
            .uri("/realtime")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 3], 40000))));

        let response = app(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.ws_connection_count(), 0);
    }
}
