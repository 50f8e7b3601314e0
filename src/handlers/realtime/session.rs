//! Per-connection relay session.
//!
//! A [`RelaySession`] is owned by the task serving one downstream socket. It
//! holds the upstream provider and the explicit session state, and decides
//! what happens to every message crossing the relay in either direction.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::messages::{RelayIncomingMessage, RelayOutgoingMessage, RelayRoute, SessionConfigure};
use crate::config::{RealtimeSettings, ServerConfig};
use crate::core::case::{CaseRecord, DialectLevel};
use crate::core::instructions::build_instructions;
use crate::core::realtime::openai::PCM16_FORMAT;
use crate::core::realtime::{
    BoxedRealtime, EndpointParams, InputTranscriptionConfig, RealtimeConfig, RealtimeEvent,
    RealtimeResult, VendorProfile, create_realtime_provider,
};
use crate::state::AppState;

use super::messages::is_valid_audio_payload;

/// Lifecycle of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Downstream accepted, waiting for `session.configure`
    Idle,
    /// Upstream opened, waiting for the session acknowledgement
    Configuring,
    /// Upstream acknowledged; no audio forwarded yet
    Ready,
    /// Audio is flowing
    Streaming,
    Closed,
}

impl RelayState {
    /// Whether client audio and control messages may be forwarded.
    pub fn is_live(&self) -> bool {
        matches!(self, RelayState::Ready | RelayState::Streaming)
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayState::Idle => "idle",
            RelayState::Configuring => "configuring",
            RelayState::Ready => "ready",
            RelayState::Streaming => "streaming",
            RelayState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Whether the relay loop keeps running after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Channels and shared state a session talks to.
pub struct RelayContext {
    pub app_state: Arc<AppState>,
    /// Downstream sender task
    pub message_tx: mpsc::Sender<RelayRoute>,
    /// Session-level upstream events, consumed by the relay loop
    pub event_tx: mpsc::Sender<RealtimeEvent>,
}

impl RelayContext {
    async fn send(&self, message: RelayOutgoingMessage) {
        if self
            .message_tx
            .send(RelayRoute::Outgoing(message))
            .await
            .is_err()
        {
            debug!("Downstream sender closed, message dropped");
        }
    }
}

/// Delivers upstream events from the provider's socket task.
///
/// Every event goes straight to the downstream sender, so the socket task
/// never waits on the relay loop. `SessionReady` and `Closed` are also queued
/// for the loop: Ready ahead of the client's copy, so the session accepts
/// audio by the time the client sees it, and Closed after it, so the loop
/// cannot close the client socket before the notice is out.
#[derive(Clone)]
pub struct UpstreamForwarder {
    session_id: String,
    message_tx: mpsc::Sender<RelayRoute>,
    event_tx: mpsc::Sender<RealtimeEvent>,
    activity: Arc<Mutex<Instant>>,
}

impl UpstreamForwarder {
    pub async fn forward(&self, event: RealtimeEvent) {
        *self.activity.lock() = Instant::now();

        match event {
            RealtimeEvent::SessionReady => {
                self.queue(event.clone()).await;
                self.deliver(event).await;
            }
            RealtimeEvent::Closed { .. } => {
                self.deliver(event.clone()).await;
                self.queue(event).await;
            }
            RealtimeEvent::Error { ref message } => {
                warn!(session_id = %self.session_id, "Upstream error: {message}");
                self.deliver(event).await;
            }
            RealtimeEvent::AudioDelta { ref delta } => {
                debug!(session_id = %self.session_id, bytes = delta.len(), "Upstream audio");
                self.deliver(event).await;
            }
            other => self.deliver(other).await,
        }
    }

    async fn queue(&self, event: RealtimeEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!(session_id = %self.session_id, "Relay loop gone, event dropped");
        }
    }

    async fn deliver(&self, event: RealtimeEvent) {
        if self
            .message_tx
            .send(RelayRoute::Outgoing(event.into()))
            .await
            .is_err()
        {
            debug!(session_id = %self.session_id, "Downstream sender closed, event dropped");
        }
    }
}

/// Build the upstream configuration for a case.
pub fn build_realtime_config(
    config: &ServerConfig,
    api_key: String,
    case: &CaseRecord,
    requested_dialect: Option<&str>,
) -> RealtimeResult<RealtimeConfig> {
    let settings = &config.realtime;
    let profile = VendorProfile::for_vendor(settings.vendor);

    let url = profile.endpoint(&EndpointParams {
        model: &settings.model,
        override_url: settings.url.as_deref(),
        azure_endpoint: config.azure_openai_endpoint.as_deref(),
        azure_deployment: config.azure_openai_deployment.as_deref(),
    })?;

    let dialect = DialectLevel::resolve(requested_dialect, case);
    let voice = profile.select_voice(case.gender.as_deref());

    Ok(RealtimeConfig {
        api_key,
        vendor: settings.vendor,
        url,
        model: settings.model.clone(),
        voice: Some(voice.as_str().to_string()),
        instructions: Some(build_instructions(case, Some(dialect))),
        temperature: None,
        input_audio_format: Some(PCM16_FORMAT.to_string()),
        output_audio_format: Some(PCM16_FORMAT.to_string()),
        input_audio_transcription: Some(InputTranscriptionConfig {
            model: settings.transcription_model.clone(),
        }),
        turn_detection: Some(profile.turn_detection(
            settings.vad_threshold,
            settings.vad_prefix_padding_ms,
            settings.vad_silence_duration_ms,
        )),
        modalities: Some(vec!["text".to_string(), "audio".to_string()]),
    })
}

pub struct RelaySession {
    pub id: String,
    state: RelayState,
    provider: Option<BoxedRealtime>,
    case_id: Option<String>,
    opened_at: Instant,
    last_activity: Instant,
    /// Last upstream event, written by the [`UpstreamForwarder`]
    upstream_activity: Arc<Mutex<Instant>>,
    unconfigured_timeout: Duration,
    idle_timeout: Duration,
}

impl RelaySession {
    pub fn new(settings: &RealtimeSettings) -> Self {
        let now = Instant::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: RelayState::Idle,
            provider: None,
            case_id: None,
            opened_at: now,
            last_activity: now,
            upstream_activity: Arc::new(Mutex::new(now)),
            unconfigured_timeout: Duration::from_secs(settings.unconfigured_timeout_seconds),
            idle_timeout: Duration::from_secs(settings.idle_timeout_seconds),
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    fn transition(&mut self, next: RelayState) {
        if self.state != next {
            debug!(
                session_id = %self.id,
                from = %self.state,
                to = %next,
                "Relay state change"
            );
            self.state = next;
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// When the session should be closed for lack of progress or traffic.
    pub fn deadline(&self) -> Instant {
        if self.state.is_live() {
            let upstream = *self.upstream_activity.lock();
            self.last_activity.max(upstream) + self.idle_timeout
        } else {
            self.opened_at + self.unconfigured_timeout
        }
    }

    pub fn forwarder(&self, ctx: &RelayContext) -> UpstreamForwarder {
        UpstreamForwarder {
            session_id: self.id.clone(),
            message_tx: ctx.message_tx.clone(),
            event_tx: ctx.event_tx.clone(),
            activity: self.upstream_activity.clone(),
        }
    }

    /// Error text sent when [`RelaySession::deadline`] passes.
    pub fn timeout_message(&self) -> String {
        if self.state.is_live() {
            format!(
                "Session closed after {}s without activity",
                self.idle_timeout.as_secs()
            )
        } else {
            format!(
                "Session was not configured within {}s",
                self.unconfigured_timeout.as_secs()
            )
        }
    }

    /// Handle one parsed client message.
    pub async fn handle_downstream(
        &mut self,
        message: RelayIncomingMessage,
        ctx: &RelayContext,
    ) -> Flow {
        if let RelayIncomingMessage::SessionConfigure(configure) = message {
            return self.configure(configure, ctx).await;
        }

        if !self.state.is_live() {
            debug!(
                session_id = %self.id,
                state = %self.state,
                "Dropping client message before session is ready"
            );
            return Flow::Continue;
        }

        let Some(provider) = self.provider.as_mut() else {
            return Flow::Continue;
        };

        let result = match message {
            RelayIncomingMessage::AudioAppend { audio } => {
                if !is_valid_audio_payload(&audio) {
                    warn!(session_id = %self.id, "Dropping audio frame with invalid base64");
                    return Flow::Continue;
                }
                let result = provider.append_audio(audio).await;
                if result.is_ok() && self.state == RelayState::Ready {
                    self.transition(RelayState::Streaming);
                }
                result
            }
            RelayIncomingMessage::AudioCommit => provider.commit_audio_buffer().await,
            RelayIncomingMessage::ResponseCancel => provider.cancel_response().await,
            RelayIncomingMessage::SessionConfigure(_) => Ok(()),
        };

        // A dead upstream reports itself through a Closed event
        if let Err(e) = result {
            warn!(session_id = %self.id, "Failed to forward client message upstream: {e}");
        }

        Flow::Continue
    }

    async fn configure(&mut self, configure: SessionConfigure, ctx: &RelayContext) -> Flow {
        if self.state != RelayState::Idle {
            warn!(
                session_id = %self.id,
                state = %self.state,
                "Ignoring repeated session.configure"
            );
            return Flow::Continue;
        }

        self.transition(RelayState::Configuring);
        let config = &ctx.app_state.config;

        let api_key = match config.realtime_api_key() {
            Ok(key) => key,
            Err(message) => {
                warn!(session_id = %self.id, vendor = %config.realtime.vendor, "{message}");
                ctx.send(RelayOutgoingMessage::error(message)).await;
                return Flow::Close;
            }
        };

        let case = match (configure.case_data, configure.case_id) {
            (Some(case), _) => case,
            (None, Some(id)) => match ctx.app_state.cases.get(&id) {
                Some(case) => case,
                None => {
                    ctx.send(RelayOutgoingMessage::error(format!("Case not found: {id}")))
                        .await;
                    return Flow::Close;
                }
            },
            (None, None) => CaseRecord::default(),
        };
        self.case_id = case.case_id.clone();

        let realtime_config = match build_realtime_config(
            config,
            api_key,
            &case,
            configure.dialect_level.as_deref(),
        ) {
            Ok(cfg) => cfg,
            Err(e) => {
                ctx.send(RelayOutgoingMessage::error(e.to_string())).await;
                return Flow::Close;
            }
        };

        let mut provider = match create_realtime_provider(realtime_config) {
            Ok(provider) => provider,
            Err(e) => {
                ctx.send(RelayOutgoingMessage::error(e.to_string())).await;
                return Flow::Close;
            }
        };

        let forwarder = self.forwarder(ctx);
        if let Err(e) = provider.on_event(Arc::new(move |event| {
            let forwarder = forwarder.clone();
            Box::pin(async move { forwarder.forward(event).await })
        })) {
            ctx.send(RelayOutgoingMessage::error(e.to_string())).await;
            return Flow::Close;
        }

        info!(
            session_id = %self.id,
            case_id = ?self.case_id,
            vendor = %config.realtime.vendor,
            "Connecting relay session upstream"
        );

        if let Err(e) = provider.connect().await {
            warn!(session_id = %self.id, "Upstream connection failed: {e}");
            ctx.send(RelayOutgoingMessage::error(format!(
                "Failed to connect to realtime service: {e}"
            )))
            .await;
            return Flow::Close;
        }

        debug!(session_id = %self.id, provider = %provider.get_provider_info(), "Upstream connected");
        self.provider = Some(provider);
        Flow::Continue
    }

    /// Apply a session-level upstream event queued by the [`UpstreamForwarder`].
    /// The client already has its own copy.
    pub fn handle_upstream(&mut self, event: &RealtimeEvent) -> Flow {
        match event {
            RealtimeEvent::SessionReady => {
                if self.state == RelayState::Configuring {
                    self.transition(RelayState::Ready);
                    info!(session_id = %self.id, case_id = ?self.case_id, "Relay session ready");
                } else {
                    debug!(session_id = %self.id, "Ignoring duplicate session acknowledgement");
                }
                Flow::Continue
            }
            RealtimeEvent::Closed { reason } => {
                info!(session_id = %self.id, reason = ?reason, "Upstream closed relay session");
                Flow::Close
            }
            _ => Flow::Continue,
        }
    }

    /// Close the upstream side. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut provider) = self.provider.take()
            && let Err(e) = provider.disconnect().await
        {
            warn!(session_id = %self.id, "Failed to disconnect upstream: {e}");
        }
        self.transition(RelayState::Closed);
    }

    #[cfg(test)]
    fn attach(&mut self, provider: BoxedRealtime, state: RelayState) {
        self.provider = Some(provider);
        self.state = state;
    }
}
