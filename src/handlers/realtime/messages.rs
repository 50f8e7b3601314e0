//! Relay WebSocket message types
//!
//! Downstream frames are JSON text with a `type` discriminator. Audio is
//! carried as base64 PCM16 inside JSON and is never decoded by the relay.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::core::case::CaseRecord;
use crate::core::realtime::{RealtimeEvent, TranscriptRole};

// =============================================================================
// Incoming Messages (Client -> Relay)
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum RelayIncomingMessage {
    /// Start the session for a case
    #[serde(rename = "session.configure")]
    SessionConfigure(SessionConfigure),

    /// One base64 PCM16 frame
    #[serde(rename = "audio.append")]
    AudioAppend { audio: String },

    /// Manual end of utterance
    #[serde(rename = "audio.commit")]
    AudioCommit,

    /// Abort the in-flight patient response
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

/// Payload of `session.configure`.
///
/// `caseData` carries the full record. `caseId` refers to a stored case and
/// is only consulted when `caseData` is absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfigure {
    #[serde(default)]
    pub case_data: Option<CaseRecord>,
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub dialect_level: Option<String>,
}

/// Whether an `audio.append` payload is well-formed base64.
pub fn is_valid_audio_payload(audio: &str) -> bool {
    !audio.is_empty() && BASE64.decode(audio).is_ok()
}

// =============================================================================
// Outgoing Messages (Relay -> Client)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum RelayOutgoingMessage {
    #[serde(rename = "session.ready")]
    SessionReady,

    #[serde(rename = "speech.started")]
    SpeechStarted,

    #[serde(rename = "speech.stopped")]
    SpeechStopped,

    #[serde(rename = "transcript.delta")]
    TranscriptDelta { role: TranscriptRole, delta: String },

    #[serde(rename = "transcript.done")]
    TranscriptDone {
        role: TranscriptRole,
        transcript: String,
    },

    /// Base64 PCM16, exactly as received upstream
    #[serde(rename = "audio.delta")]
    AudioDelta { delta: String },

    #[serde(rename = "audio.done")]
    AudioDone,

    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "session.closed")]
    SessionClosed {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl RelayOutgoingMessage {
    pub fn error(message: impl Into<String>) -> Self {
        RelayOutgoingMessage::Error {
            message: message.into(),
        }
    }
}

impl From<RealtimeEvent> for RelayOutgoingMessage {
    fn from(event: RealtimeEvent) -> Self {
        match event {
            RealtimeEvent::SessionReady => RelayOutgoingMessage::SessionReady,
            RealtimeEvent::SpeechStarted { .. } => RelayOutgoingMessage::SpeechStarted,
            RealtimeEvent::SpeechStopped { .. } => RelayOutgoingMessage::SpeechStopped,
            RealtimeEvent::TranscriptDelta { role, delta } => {
                RelayOutgoingMessage::TranscriptDelta { role, delta }
            }
            RealtimeEvent::TranscriptDone { role, transcript } => {
                RelayOutgoingMessage::TranscriptDone { role, transcript }
            }
            RealtimeEvent::AudioDelta { delta } => RelayOutgoingMessage::AudioDelta { delta },
            RealtimeEvent::AudioDone => RelayOutgoingMessage::AudioDone,
            RealtimeEvent::ResponseDone { .. } => RelayOutgoingMessage::ResponseDone,
            RealtimeEvent::Error { message } => RelayOutgoingMessage::Error { message },
            RealtimeEvent::Closed { reason } => RelayOutgoingMessage::SessionClosed { reason },
        }
    }
}

// =============================================================================
// Message Routing
// =============================================================================

/// Work items for the downstream sender task.
#[derive(Debug)]
pub enum RelayRoute {
    Outgoing(RelayOutgoingMessage),
    /// Send a close frame and stop
    Close,
}
