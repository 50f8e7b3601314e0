//! Base traits and types for realtime speech providers.
//!
//! A realtime provider holds one upstream WebSocket to a hosted speech model
//! and reports everything it hears through a single ordered event callback.
//!
//! # Audio Format
//!
//! PCM 16-bit signed little-endian, mono, 24kHz, base64-encoded per frame.
//! Audio payloads pass through the provider without being decoded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use super::vendor::RealtimeVendor;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Configuration for one realtime session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,

    /// Upstream vendor; decides the authentication header
    #[serde(default)]
    pub vendor: RealtimeVendor,

    /// Fully resolved WebSocket endpoint, query string included
    #[serde(default)]
    pub url: String,

    /// Model to use (e.g., "gpt-4o-realtime-preview")
    #[serde(default)]
    pub model: String,

    /// Voice ID for audio output
    #[serde(default)]
    pub voice: Option<String>,

    /// System instructions for the model
    #[serde(default)]
    pub instructions: Option<String>,

    /// Temperature for response generation
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Input audio format
    #[serde(default)]
    pub input_audio_format: Option<String>,

    /// Output audio format
    #[serde(default)]
    pub output_audio_format: Option<String>,

    /// Enable input audio transcription
    #[serde(default)]
    pub input_audio_transcription: Option<InputTranscriptionConfig>,

    /// Turn detection configuration
    #[serde(default)]
    pub turn_detection: Option<TurnDetectionConfig>,

    /// Response modalities (text, audio, or both)
    #[serde(default)]
    pub modalities: Option<Vec<String>>,
}

/// Configuration for input audio transcription.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputTranscriptionConfig {
    /// Model to use for transcription (e.g., "whisper-1")
    pub model: String,
}

/// Configuration for turn detection (VAD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold (0.0 to 1.0)
        #[serde(default)]
        threshold: Option<f32>,
        /// Amount of audio to include before voice detection (ms)
        #[serde(default)]
        prefix_padding_ms: Option<u32>,
        /// Silence duration before end of turn (ms)
        #[serde(default)]
        silence_duration_ms: Option<u32>,
    },
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(500),
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection failed or was closed by the provider
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Role of the speaker in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    /// Student (microphone) speech
    User,
    /// Simulated patient speech
    Assistant,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Everything a provider reports, in the order it arrived upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// The provider acknowledged the session configuration
    SessionReady,
    /// VAD detected the start of speech
    SpeechStarted { item_id: Option<String> },
    /// VAD detected the end of speech
    SpeechStopped { item_id: Option<String> },
    /// Incremental transcript text
    TranscriptDelta { role: TranscriptRole, delta: String },
    /// Completed transcript for one turn
    TranscriptDone {
        role: TranscriptRole,
        transcript: String,
    },
    /// Base64 PCM16 output audio, exactly as the provider sent it
    AudioDelta { delta: String },
    /// Audio output for the current response finished
    AudioDone,
    /// The current response finished
    ResponseDone { response_id: Option<String> },
    /// Error reported by the provider or the transport
    Error { message: String },
    /// The upstream socket closed
    Closed { reason: Option<String> },
}

/// Callback type for provider events.
pub type RealtimeEventCallback =
    Arc<dyn Fn(RealtimeEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Base Trait
// =============================================================================

/// Base trait for realtime speech providers.
///
/// Register the event callback before calling [`BaseRealtime::connect`];
/// events received before registration are dropped.
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Create a new realtime provider instance.
    fn new(config: RealtimeConfig) -> RealtimeResult<Self>
    where
        Self: Sized;

    /// Open the upstream socket and send the session configuration.
    async fn connect(&mut self) -> RealtimeResult<()>;

    /// Close the upstream socket. Idempotent.
    async fn disconnect(&mut self) -> RealtimeResult<()>;

    /// Check if the provider is connected.
    fn is_ready(&self) -> bool;

    /// Get the current connection state.
    fn get_connection_state(&self) -> ConnectionState;

    /// Append one base64 PCM16 frame to the upstream input buffer.
    async fn append_audio(&mut self, audio_base64: String) -> RealtimeResult<()>;

    /// Commit the input buffer (manual end of utterance).
    async fn commit_audio_buffer(&mut self) -> RealtimeResult<()>;

    /// Cancel the in-flight response.
    async fn cancel_response(&mut self) -> RealtimeResult<()>;

    /// Register the event callback.
    fn on_event(&mut self, callback: RealtimeEventCallback) -> RealtimeResult<()>;

    /// Get provider information.
    fn get_provider_info(&self) -> serde_json::Value;
}

/// Boxed trait object for realtime providers.
pub type BoxedRealtime = Box<dyn BaseRealtime>;
