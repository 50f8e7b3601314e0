//! Realtime API client implementation.
//!
//! One client serves every vendor that speaks the realtime protocol; the
//! [`VendorProfile`] decides how the upgrade request authenticates.
//!
//! # API Reference
//!
//! - Endpoint: resolved by the vendor profile, e.g. `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! The client never reconnects. When the upstream socket ends for any reason
//! other than [`BaseRealtime::disconnect`], a [`RealtimeEvent::Closed`] is
//! emitted and the session is over.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Request, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, trace, warn};

use super::config::{PCM16_FORMAT, REALTIME_SAMPLE_RATE};
use super::messages::{ClientEvent, InputAudioTranscription, ServerEvent, SessionConfig};
use crate::core::realtime::base::{
    BaseRealtime, ConnectionState, RealtimeConfig, RealtimeError, RealtimeEvent,
    RealtimeEventCallback, RealtimeResult, TranscriptRole,
};
use crate::core::realtime::vendor::{AuthStyle, VendorProfile};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on the upstream handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for the close handshake before the socket task is aborted.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Why the socket task stopped.
#[derive(Debug)]
enum TaskExit {
    /// The client asked to disconnect
    Requested,
    /// The upstream sent a close frame or ended the stream
    ClosedByPeer(Option<String>),
    /// Read or write failure on the socket
    Transport(String),
}

/// Realtime API client.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    profile: VendorProfile,
    state: Arc<RwLock<ConnectionState>>,
    /// Shared with the socket task
    connected: Arc<AtomicBool>,
    intentional_disconnect: Arc<AtomicBool>,
    ws_sender: Option<mpsc::Sender<ClientEvent>>,
    event_callback: Option<RealtimeEventCallback>,
    connection_handle: Option<JoinHandle<()>>,
}

impl OpenAIRealtime {
    /// Build the upgrade request with the vendor's authentication headers.
    fn build_request(&self) -> RealtimeResult<Request<()>> {
        let mut request = self.config.url.as_str().into_client_request().map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("Invalid WebSocket URL: {e}"))
        })?;

        let invalid_key =
            |_| RealtimeError::InvalidConfiguration("API key contains invalid characters".into());
        let headers = request.headers_mut();
        match self.profile.auth {
            AuthStyle::Bearer => {
                let value = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                    .map_err(invalid_key)?;
                headers.insert(AUTHORIZATION, value);
                headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
            }
            AuthStyle::ApiKeyHeader => {
                let value = HeaderValue::from_str(&self.config.api_key).map_err(invalid_key)?;
                headers.insert("api-key", value);
            }
        }

        Ok(request)
    }

    /// Build the `session.update` payload.
    fn build_session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: Some(
                self.config
                    .modalities
                    .clone()
                    .unwrap_or_else(|| vec!["text".to_string(), "audio".to_string()]),
            ),
            instructions: self.config.instructions.clone(),
            voice: Some(
                self.config
                    .voice
                    .clone()
                    .unwrap_or_else(|| self.profile.voices.default.as_str().to_string()),
            ),
            input_audio_format: Some(
                self.config
                    .input_audio_format
                    .clone()
                    .unwrap_or_else(|| PCM16_FORMAT.to_string()),
            ),
            output_audio_format: Some(
                self.config
                    .output_audio_format
                    .clone()
                    .unwrap_or_else(|| PCM16_FORMAT.to_string()),
            ),
            input_audio_transcription: self.config.input_audio_transcription.as_ref().map(|t| {
                InputAudioTranscription {
                    model: t.model.clone(),
                }
            }),
            turn_detection: self.config.turn_detection.clone(),
            temperature: self.config.temperature,
        }
    }

    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        match self.ws_sender.as_ref() {
            Some(sender) => sender
                .send(event)
                .await
                .map_err(|e| RealtimeError::WebSocketError(e.to_string())),
            None => Err(RealtimeError::NotConnected),
        }
    }

    async fn emit(callback: &Option<RealtimeEventCallback>, event: RealtimeEvent) {
        if let Some(cb) = callback {
            cb(event).await;
        }
    }
}

/// Translate one upstream event into the provider-neutral vocabulary.
///
/// `ready_sent` tracks whether [`RealtimeEvent::SessionReady`] was already
/// produced; only the first `session.updated` yields it.
pub fn translate_server_event(event: ServerEvent, ready_sent: &mut bool) -> Option<RealtimeEvent> {
    match event {
        ServerEvent::SessionUpdated { .. } if !*ready_sent => {
            *ready_sent = true;
            Some(RealtimeEvent::SessionReady)
        }
        ServerEvent::SessionUpdated { .. } | ServerEvent::SessionCreated { .. } => None,
        ServerEvent::Error { error } => Some(RealtimeEvent::Error {
            message: error.message,
        }),
        ServerEvent::SpeechStarted { item_id, .. } => Some(RealtimeEvent::SpeechStarted { item_id }),
        ServerEvent::SpeechStopped { item_id, .. } => Some(RealtimeEvent::SpeechStopped { item_id }),
        ServerEvent::TranscriptionDelta { delta, .. } => Some(RealtimeEvent::TranscriptDelta {
            role: TranscriptRole::User,
            delta,
        }),
        ServerEvent::TranscriptionCompleted { transcript, .. } => {
            Some(RealtimeEvent::TranscriptDone {
                role: TranscriptRole::User,
                transcript,
            })
        }
        ServerEvent::TranscriptionFailed { error, .. } => Some(RealtimeEvent::Error {
            message: error.message,
        }),
        ServerEvent::AudioTranscriptDelta { delta, .. } => Some(RealtimeEvent::TranscriptDelta {
            role: TranscriptRole::Assistant,
            delta,
        }),
        ServerEvent::AudioTranscriptDone { transcript, .. } => Some(RealtimeEvent::TranscriptDone {
            role: TranscriptRole::Assistant,
            transcript,
        }),
        ServerEvent::AudioDelta { delta, .. } => Some(RealtimeEvent::AudioDelta { delta }),
        ServerEvent::AudioDone { .. } => Some(RealtimeEvent::AudioDone),
        ServerEvent::ResponseDone { response } => Some(RealtimeEvent::ResponseDone {
            response_id: response.and_then(|r| r.id),
        }),
        ServerEvent::Other => None,
    }
}

#[async_trait]
impl BaseRealtime for OpenAIRealtime {
    fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }
        if config.url.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "Realtime endpoint URL is required".to_string(),
            ));
        }

        let profile = VendorProfile::for_vendor(config.vendor);

        Ok(Self {
            config,
            profile,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            intentional_disconnect: Arc::new(AtomicBool::new(false)),
            ws_sender: None,
            event_callback: None,
            connection_handle: None,
        })
    }

    async fn connect(&mut self) -> RealtimeResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.intentional_disconnect.store(false, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Connecting;

        let request = self.build_request()?;

        let connect = tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(request));
        let ws_stream = match connect.await {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(tungstenite::Error::Http(response)))
                if response.status() == 401 || response.status() == 403 =>
            {
                *self.state.write() = ConnectionState::Failed;
                return Err(RealtimeError::AuthenticationFailed(format!(
                    "Upstream rejected credentials ({})",
                    response.status()
                )));
            }
            Ok(Err(e)) => {
                *self.state.write() = ConnectionState::Failed;
                return Err(RealtimeError::ConnectionFailed(e.to_string()));
            }
            Err(_) => {
                *self.state.write() = ConnectionState::Failed;
                return Err(RealtimeError::ConnectionFailed(format!(
                    "Handshake timed out after {}s",
                    CONNECT_TIMEOUT.as_secs()
                )));
            }
        };

        info!(vendor = %self.profile.vendor, model = %self.config.model, "Connected to realtime upstream");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        self.ws_sender = Some(tx);

        let callback = self.event_callback.clone();
        let state = self.state.clone();
        let connected = self.connected.clone();
        let intentional_disconnect = self.intentional_disconnect.clone();

        self.connected.store(true, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Connected;

        let handle = tokio::spawn(async move {
            let mut ready_sent = false;

            let exit = loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        let Some(event) = outgoing else {
                            break TaskExit::Requested;
                        };
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!("Failed to serialize client event: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            break TaskExit::Transport(e.to_string());
                        }
                    }

                    incoming = ws_stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerEvent>(&text) {
                                Ok(ServerEvent::SessionCreated { session }) => {
                                    let id = session.and_then(|s| s.id);
                                    info!(upstream_session_id = ?id, "Upstream session created");
                                }
                                Ok(event) => {
                                    if let Some(translated) = translate_server_event(event, &mut ready_sent) {
                                        Self::emit(&callback, translated).await;
                                    }
                                }
                                Err(e) => {
                                    warn!("Dropping malformed upstream message: {e}");
                                    trace!(payload = %text.as_str(), "malformed upstream payload");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                break TaskExit::Transport(e.to_string());
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| f.reason.to_string())
                                .filter(|reason| !reason.is_empty());
                            break TaskExit::ClosedByPeer(reason);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break TaskExit::Transport(e.to_string()),
                        None => break TaskExit::ClosedByPeer(None),
                    }
                }
            };

            connected.store(false, Ordering::SeqCst);

            match exit {
                TaskExit::Requested => {
                    if let Err(e) = ws_sink.send(Message::Close(None)).await {
                        debug!("Close frame not delivered: {e}");
                    }
                    let _ = ws_sink.close().await;
                    *state.write() = ConnectionState::Disconnected;
                }
                _ if intentional_disconnect.load(Ordering::SeqCst) => {
                    *state.write() = ConnectionState::Disconnected;
                }
                TaskExit::ClosedByPeer(reason) => {
                    info!(reason = ?reason, "Realtime upstream closed the connection");
                    let _ = ws_sink.close().await;
                    *state.write() = ConnectionState::Failed;
                    Self::emit(&callback, RealtimeEvent::Closed { reason }).await;
                }
                TaskExit::Transport(message) => {
                    warn!("Realtime upstream transport error: {message}");
                    *state.write() = ConnectionState::Failed;
                    Self::emit(
                        &callback,
                        RealtimeEvent::Error {
                            message: format!("Upstream connection error: {message}"),
                        },
                    )
                    .await;
                    Self::emit(&callback, RealtimeEvent::Closed { reason: Some(message) }).await;
                }
            }

            debug!("Realtime socket task ended");
        });

        self.connection_handle = Some(handle);

        let session = self.build_session_config();
        self.send_event(ClientEvent::SessionUpdate { session }).await
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        self.intentional_disconnect.store(true, Ordering::SeqCst);

        // Dropping the sender lets the task flush what is queued, then send a close frame
        self.ws_sender = None;

        if let Some(mut handle) = self.connection_handle.take()
            && tokio::time::timeout(CLOSE_GRACE_PERIOD, &mut handle)
                .await
                .is_err()
        {
            warn!("Realtime close handshake timed out, aborting socket task");
            handle.abort();
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Disconnected;

        info!(vendor = %self.profile.vendor, "Disconnected from realtime upstream");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn get_connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn append_audio(&mut self, audio_base64: String) -> RealtimeResult<()> {
        self.send_event(ClientEvent::InputAudioBufferAppend {
            audio: audio_base64,
        })
        .await
    }

    async fn commit_audio_buffer(&mut self) -> RealtimeResult<()> {
        self.send_event(ClientEvent::InputAudioBufferCommit).await
    }

    async fn cancel_response(&mut self) -> RealtimeResult<()> {
        self.send_event(ClientEvent::ResponseCancel).await
    }

    fn on_event(&mut self, callback: RealtimeEventCallback) -> RealtimeResult<()> {
        self.event_callback = Some(callback);
        Ok(())
    }

    fn get_provider_info(&self) -> serde_json::Value {
        serde_json::json!({
            "vendor": self.profile.vendor.as_str(),
            "model": self.config.model,
            "voice": self.config.voice,
            "audio_format": PCM16_FORMAT,
            "sample_rate": REALTIME_SAMPLE_RATE,
            "state": self.get_connection_state().to_string(),
        })
    }
}

impl Drop for OpenAIRealtime {
    fn drop(&mut self) {
        // Never leave an upstream socket running without an owner
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
    }
}
