//! Mock upstream realtime speech server
//!
//! Speaks enough of the realtime protocol for relay tests: answers
//! `session.update` with `session.updated` and replays a short patient turn on
//! every `input_audio_buffer.commit`.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

/// Patient audio chunk returned for every committed utterance
pub const PATIENT_AUDIO: &str = "AAECAwQF";
pub const PATIENT_REPLY: &str = "Since yesterday, doctor.";
pub const STUDENT_TRANSCRIPT: &str = "When did the pain start?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Normal session
    Converse,
    /// Refuse the handshake with 401
    RejectAuth,
    /// Confirm the session, then close the socket
    CloseAfterReady,
    /// Like `Converse`, but send a frame that is not JSON before each turn
    GarbageBeforeTurn,
}

#[derive(Default)]
pub struct MockStats {
    pub connections: AtomicUsize,
    /// Every client event received, in order
    pub received: Mutex<Vec<Value>>,
    /// Request URI and auth headers of each handshake
    pub handshakes: Mutex<Vec<Handshake>>,
}

#[derive(Debug, Clone)]
pub struct Handshake {
    pub uri: String,
    pub authorization: Option<String>,
    pub api_key: Option<String>,
}

impl MockStats {
    pub fn received_types(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .filter_map(|event| event["type"].as_str().map(str::to_string))
            .collect()
    }

    /// Audio payloads of every `input_audio_buffer.append`, in order.
    pub fn appended_audio(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .filter(|event| event["type"] == "input_audio_buffer.append")
            .filter_map(|event| event["audio"].as_str().map(str::to_string))
            .collect()
    }

    pub fn session_update(&self) -> Option<Value> {
        self.received
            .lock()
            .iter()
            .find(|event| event["type"] == "session.update")
            .cloned()
    }
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub stats: Arc<MockStats>,
}

impl MockUpstream {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stats = Arc::new(MockStats::default());

        let task_stats = stats.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let stats = task_stats.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, behavior, stats).await;
                });
            }
        });

        Self { addr, stats }
    }

    /// URL to put in the relay's realtime configuration.
    pub fn url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }
}

fn header(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn handle_connection(
    stream: TcpStream,
    behavior: Behavior,
    stats: Arc<MockStats>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handshake_stats = stats.clone();
    let callback = move |request: &Request, response: Response| {
        handshake_stats.handshakes.lock().push(Handshake {
            uri: request.uri().to_string(),
            authorization: header(request, "authorization"),
            api_key: header(request, "api-key"),
        });

        if behavior == Behavior::RejectAuth {
            let mut rejection = ErrorResponse::new(Some("invalid api key".to_string()));
            *rejection.status_mut() = StatusCode::UNAUTHORIZED;
            return Err(rejection);
        }
        Ok(response)
    };

    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let (mut write, mut read) = ws_stream.split();
    stats.connections.fetch_add(1, Ordering::SeqCst);

    write
        .send(text(json!({"type": "session.created", "session": {"id": "sess_mock"}})))
        .await?;

    while let Some(message) = read.next().await {
        let message = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Ping(data)) => {
                write.send(Message::Pong(data)).await?;
                continue;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let event: Value = serde_json::from_str(message.as_str())?;
        let event_type = event["type"].as_str().unwrap_or_default().to_string();
        stats.received.lock().push(event);

        match event_type.as_str() {
            "session.update" => {
                write.send(text(json!({"type": "session.updated"}))).await?;
                if behavior == Behavior::CloseAfterReady {
                    write.send(Message::Close(None)).await?;
                    break;
                }
            }
            "input_audio_buffer.commit" => {
                if behavior == Behavior::GarbageBeforeTurn {
                    write
                        .send(Message::Text("{not valid json".into()))
                        .await?;
                }
                for event in patient_turn() {
                    write.send(text(event)).await?;
                }
            }
            _ => {}
        }
    }

    stats.connections.fetch_sub(1, Ordering::SeqCst);
    Ok(())
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

fn patient_turn() -> Vec<Value> {
    vec![
        json!({"type": "input_audio_buffer.speech_stopped", "audio_end_ms": 1200, "item_id": "item_1"}),
        json!({
            "type": "conversation.item.input_audio_transcription.completed",
            "item_id": "item_1",
            "transcript": STUDENT_TRANSCRIPT
        }),
        json!({"type": "response.created", "response": {"id": "resp_1"}}),
        json!({"type": "response.audio.delta", "response_id": "resp_1", "delta": PATIENT_AUDIO}),
        json!({"type": "response.audio_transcript.done", "response_id": "resp_1", "transcript": PATIENT_REPLY}),
        json!({"type": "response.audio.done", "response_id": "resp_1"}),
        json!({"type": "response.done", "response": {"id": "resp_1", "status": "completed"}}),
    ]
}
