//! Realtime protocol client.
//!
//! Speaks the OpenAI realtime WebSocket protocol, which Azure OpenAI also
//! serves. Vendor differences are handled by
//! [`VendorProfile`](crate::core::realtime::VendorProfile).
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse
//!
//! # Audio Format
//!
//! Input and output audio is PCM 16-bit signed little-endian at 24kHz.

mod client;
mod config;
mod messages;

pub use client::{OpenAIRealtime, translate_server_event};
pub use config::{
    OPENAI_REALTIME_URL, PCM16_FORMAT, REALTIME_SAMPLE_RATE, RealtimeVoice, pcm16_duration_ms,
};
pub use messages::{ApiError, ClientEvent, InputAudioTranscription, ServerEvent, SessionConfig};
