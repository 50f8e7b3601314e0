//! Relay WebSocket handler
//!
//! One task per downstream socket runs the relay loop. A sender task owns the
//! downstream sink. The upstream provider owns its own socket task, which
//! writes translated events straight to the sender task and hands only
//! session-level events to the loop. Neither task ever waits on the other.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};

use crate::core::realtime::RealtimeEvent;
use crate::middleware::{ClientIp, ConnectionGuard};
use crate::state::AppState;

use super::messages::{RelayIncomingMessage, RelayOutgoingMessage, RelayRoute};
use super::session::{Flow, RelayContext, RelaySession};

/// Channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Only `SessionReady` and `Closed` reach the relay loop, at most once each
const SESSION_EVENT_BUFFER: usize = 8;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Time allowed for queued downstream messages to flush on close
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Relay WebSocket handler
///
/// Upgrades the connection and runs one relay session on it. The connection
/// slot reserved by the limit middleware is released when the session ends.
pub async fn realtime_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let guard = client_ip.map(|Extension(ClientIp(ip))| ConnectionGuard::new(state.clone(), ip));

    debug!("Relay WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            handle_relay_socket(socket, state).await;
            drop(guard);
        })
}

/// Run the relay loop until either side closes.
async fn handle_relay_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<RelayRoute>(CHANNEL_BUFFER_SIZE);
    let (event_tx, mut event_rx) = mpsc::channel::<RealtimeEvent>(SESSION_EVENT_BUFFER);

    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                RelayRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {e}");
                        continue;
                    }
                },
                RelayRoute::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!("Downstream send failed: {e}");
                break;
            }
        }
    });

    let mut session = RelaySession::new(&app_state.config.realtime);
    let ctx = RelayContext {
        app_state,
        message_tx,
        event_tx,
    };

    info!(session_id = %session.id, "Relay session opened");

    loop {
        let deadline = session.deadline();

        select! {
            biased;

            // Before client input so a ready session accepts audio at once
            Some(event) = event_rx.recv() => {
                session.touch();
                if session.handle_upstream(&event) == Flow::Close {
                    break;
                }
            }

            incoming = receiver.next() => {
                session.touch();

                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<RelayIncomingMessage>(text.as_str()) {
                            Ok(message) => {
                                if session.handle_downstream(message, &ctx).await == Flow::Close {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(session_id = %session.id, "Dropping malformed client message: {e}");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(session_id = %session.id, bytes = data.len(), "Dropping binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(session_id = %session.id, "Client closed relay session");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(session_id = %session.id, "Client socket error: {e}");
                        break;
                    }
                }
            }

            _ = tokio::time::sleep_until(deadline) => {
                // Upstream traffic may have moved the deadline
                if session.deadline() > tokio::time::Instant::now() {
                    continue;
                }
                let message = session.timeout_message();
                warn!(session_id = %session.id, state = %session.state(), "{message}");
                let _ = ctx
                    .message_tx
                    .send(RelayRoute::Outgoing(RelayOutgoingMessage::error(message)))
                    .await;
                break;
            }
        }
    }

    // Upstream first so nothing more is produced for a closing client
    session.close().await;

    let _ = ctx.message_tx.send(RelayRoute::Close).await;
    drop(ctx);

    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }

    info!(session_id = %session.id, "Relay session closed");
}
