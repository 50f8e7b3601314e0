//! Realtime protocol constants and voice catalogue.

use serde::{Deserialize, Serialize};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Audio sample rate mandated by the realtime protocol.
pub const REALTIME_SAMPLE_RATE: u32 = 24000;

/// Wire name of the only audio encoding the relay negotiates.
pub const PCM16_FORMAT: &str = "pcm16";

/// Voices accepted by the realtime protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl RealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }
}

impl std::fmt::Display for RealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Playback duration of a PCM16 mono frame at [`REALTIME_SAMPLE_RATE`].
#[inline]
pub fn pcm16_duration_ms(byte_len: usize) -> u64 {
    // 2 bytes per sample
    (byte_len as u64 / 2) * 1000 / REALTIME_SAMPLE_RATE as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_serde_matches_as_str() {
        for voice in [RealtimeVoice::Alloy, RealtimeVoice::Shimmer, RealtimeVoice::Ash] {
            let json = serde_json::to_string(&voice).unwrap();
            assert_eq!(json, format!("\"{}\"", voice.as_str()));
        }
    }

    #[test]
    fn test_pcm16_duration() {
        // 100ms of 24kHz mono PCM16
        assert_eq!(pcm16_duration_ms(4800), 100);
        assert_eq!(pcm16_duration_ms(0), 0);
    }
}
