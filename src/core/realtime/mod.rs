//! Realtime speech provider module.
//!
//! Holds the upstream side of a relay session: one WebSocket to a hosted
//! speech-to-speech model, configured once and then fed audio frames.
//!
//! # Supported Vendors
//!
//! - **OpenAI Realtime API**
//! - **Azure OpenAI Realtime API** (same protocol, `api-key` header)
//!
//! # Example
//!
//! ```rust,ignore
//! use osce_gateway::core::realtime::{create_realtime_provider, RealtimeConfig};
//! use std::sync::Arc;
//!
//! let mut provider = create_realtime_provider(config)?;
//! provider.on_event(Arc::new(|event| Box::pin(async move {
//!     println!("{event:?}");
//! })))?;
//! provider.connect().await?;
//! provider.append_audio(frame_base64).await?;
//! ```

mod base;
pub mod openai;
mod vendor;

pub use base::{
    BaseRealtime, BoxedRealtime, ConnectionState, InputTranscriptionConfig, RealtimeConfig,
    RealtimeError, RealtimeEvent, RealtimeEventCallback, RealtimeResult, TranscriptRole,
    TurnDetectionConfig,
};
pub use openai::{OPENAI_REALTIME_URL, OpenAIRealtime, REALTIME_SAMPLE_RATE, RealtimeVoice};
pub use vendor::{
    AZURE_REALTIME_API_VERSION, AuthStyle, EndpointParams, RealtimeVendor, VadDefaults,
    VendorProfile, VoiceCatalogue,
};

/// Create the realtime provider for a session.
///
/// Every supported vendor speaks the same protocol, so the vendor in the
/// config only selects headers and defaults inside the client.
pub fn create_realtime_provider(config: RealtimeConfig) -> RealtimeResult<BoxedRealtime> {
    Ok(Box::new(OpenAIRealtime::new(config)?))
}

/// Names accepted for `REALTIME_VENDOR`.
pub fn get_supported_realtime_vendors() -> Vec<&'static str> {
    vec![RealtimeVendor::OpenAI.as_str(), RealtimeVendor::Azure.as_str()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_realtime_provider() {
        let config = RealtimeConfig {
            api_key: "test_key".to_string(),
            url: "wss://api.openai.com/v1/realtime?model=m".to_string(),
            ..Default::default()
        };
        let provider = create_realtime_provider(config).unwrap();
        assert!(!provider.is_ready());
        assert_eq!(provider.get_provider_info()["vendor"], "openai");
    }

    #[test]
    fn test_create_realtime_provider_without_key() {
        let result = create_realtime_provider(RealtimeConfig::default());
        assert!(matches!(
            result,
            Err(RealtimeError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_supported_vendors() {
        assert_eq!(get_supported_realtime_vendors(), vec!["openai", "azure"]);
    }
}
