//! Upstream vendor profiles.
//!
//! Both supported vendors speak the same realtime wire protocol. They differ
//! in endpoint layout, authentication header, voice catalogue and VAD
//! defaults, which live here as plain data.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::base::{RealtimeError, RealtimeResult, TurnDetectionConfig};
use super::openai::{OPENAI_REALTIME_URL, RealtimeVoice};

/// Azure OpenAI realtime API version
pub const AZURE_REALTIME_API_VERSION: &str = "2024-10-01-preview";

/// Supported upstream vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeVendor {
    /// OpenAI Realtime API
    #[default]
    OpenAI,
    /// Azure OpenAI Realtime API
    Azure,
}

impl RealtimeVendor {
    /// Parse vendor from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(RealtimeVendor::OpenAI),
            "azure" | "azure-openai" | "azure_openai" => Some(RealtimeVendor::Azure),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeVendor::OpenAI => "openai",
            RealtimeVendor::Azure => "azure",
        }
    }
}

impl fmt::Display for RealtimeVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the API key travels in the upgrade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` plus `OpenAI-Beta: realtime=v1`
    Bearer,
    /// `api-key: <key>`
    ApiKeyHeader,
}

/// Voices chosen from the patient's gender.
#[derive(Debug, Clone, Copy)]
pub struct VoiceCatalogue {
    pub female: RealtimeVoice,
    pub male: RealtimeVoice,
    pub default: RealtimeVoice,
}

/// VAD values used when configuration leaves them unset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadDefaults {
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

/// Everything that distinguishes one vendor from another.
#[derive(Debug, Clone, Copy)]
pub struct VendorProfile {
    pub vendor: RealtimeVendor,
    pub auth: AuthStyle,
    pub voices: VoiceCatalogue,
    pub vad: VadDefaults,
}

/// Location details needed to build a vendor endpoint.
#[derive(Debug, Clone, Default)]
pub struct EndpointParams<'a> {
    pub model: &'a str,
    /// Replaces the vendor base URL (query parameters are still appended)
    pub override_url: Option<&'a str>,
    pub azure_endpoint: Option<&'a str>,
    pub azure_deployment: Option<&'a str>,
}

impl VendorProfile {
    pub fn for_vendor(vendor: RealtimeVendor) -> Self {
        match vendor {
            RealtimeVendor::OpenAI => Self {
                vendor,
                auth: AuthStyle::Bearer,
                voices: VoiceCatalogue {
                    female: RealtimeVoice::Shimmer,
                    male: RealtimeVoice::Echo,
                    default: RealtimeVoice::Alloy,
                },
                vad: VadDefaults {
                    threshold: 0.5,
                    prefix_padding_ms: 300,
                    silence_duration_ms: 500,
                },
            },
            RealtimeVendor::Azure => Self {
                vendor,
                auth: AuthStyle::ApiKeyHeader,
                voices: VoiceCatalogue {
                    female: RealtimeVoice::Coral,
                    male: RealtimeVoice::Ash,
                    default: RealtimeVoice::Alloy,
                },
                vad: VadDefaults {
                    threshold: 0.5,
                    prefix_padding_ms: 300,
                    silence_duration_ms: 600,
                },
            },
        }
    }

    /// Resolve the WebSocket URL for a session.
    pub fn endpoint(&self, params: &EndpointParams<'_>) -> RealtimeResult<String> {
        let base = match (params.override_url, self.vendor) {
            (Some(url), _) => url.to_string(),
            (None, RealtimeVendor::OpenAI) => OPENAI_REALTIME_URL.to_string(),
            (None, RealtimeVendor::Azure) => {
                let endpoint = params.azure_endpoint.ok_or_else(|| {
                    RealtimeError::InvalidConfiguration(
                        "Azure OpenAI endpoint is not configured".to_string(),
                    )
                })?;
                azure_base_url(endpoint)?
            }
        };

        let mut url = url::Url::parse(&base)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid URL {base}: {e}")))?;

        match self.vendor {
            RealtimeVendor::OpenAI => {
                url.query_pairs_mut().append_pair("model", params.model);
            }
            RealtimeVendor::Azure => {
                let deployment = params.azure_deployment.unwrap_or(params.model);
                url.query_pairs_mut()
                    .append_pair("api-version", AZURE_REALTIME_API_VERSION)
                    .append_pair("deployment", deployment);
            }
        }

        Ok(url.to_string())
    }

    /// Pick a voice from a free-text gender field.
    ///
    /// Female markers are checked first since "female" contains "male".
    pub fn select_voice(&self, gender: Option<&str>) -> RealtimeVoice {
        let Some(gender) = gender.map(|g| g.trim().to_lowercase()) else {
            return self.voices.default;
        };

        if gender == "f" || gender.contains("female") || gender.contains("woman") {
            self.voices.female
        } else if gender == "m" || gender.contains("male") || gender.contains("man") {
            self.voices.male
        } else {
            self.voices.default
        }
    }

    /// Server VAD settings with configured overrides applied.
    pub fn turn_detection(
        &self,
        threshold: Option<f32>,
        prefix_padding_ms: Option<u32>,
        silence_duration_ms: Option<u32>,
    ) -> TurnDetectionConfig {
        TurnDetectionConfig::ServerVad {
            threshold: Some(threshold.unwrap_or(self.vad.threshold)),
            prefix_padding_ms: Some(prefix_padding_ms.unwrap_or(self.vad.prefix_padding_ms)),
            silence_duration_ms: Some(silence_duration_ms.unwrap_or(self.vad.silence_duration_ms)),
        }
    }
}

/// `https://res.openai.azure.com` -> `wss://res.openai.azure.com/openai/realtime`
fn azure_base_url(endpoint: &str) -> RealtimeResult<String> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("wss://"))
        .unwrap_or(trimmed);

    if host.is_empty() {
        return Err(RealtimeError::InvalidConfiguration(
            "Azure OpenAI endpoint is empty".to_string(),
        ));
    }

    Ok(format!("wss://{host}/openai/realtime"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_parse() {
        assert_eq!(RealtimeVendor::parse("OpenAI"), Some(RealtimeVendor::OpenAI));
        assert_eq!(RealtimeVendor::parse("azure"), Some(RealtimeVendor::Azure));
        assert_eq!(
            RealtimeVendor::parse("azure-openai"),
            Some(RealtimeVendor::Azure)
        );
        assert_eq!(RealtimeVendor::parse("hume"), None);
    }

    #[test]
    fn test_openai_endpoint() {
        let profile = VendorProfile::for_vendor(RealtimeVendor::OpenAI);
        let url = profile
            .endpoint(&EndpointParams {
                model: "gpt-4o-realtime-preview",
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            url,
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
    }

    #[test]
    fn test_azure_endpoint() {
        let profile = VendorProfile::for_vendor(RealtimeVendor::Azure);
        let url = profile
            .endpoint(&EndpointParams {
                model: "gpt-4o-realtime-preview",
                azure_endpoint: Some("https://res.openai.azure.com/"),
                azure_deployment: Some("sp-voice"),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            url,
            "wss://res.openai.azure.com/openai/realtime?api-version=2024-10-01-preview&deployment=sp-voice"
        );
    }

    #[test]
    fn test_azure_endpoint_missing() {
        let profile = VendorProfile::for_vendor(RealtimeVendor::Azure);
        let result = profile.endpoint(&EndpointParams {
            model: "m",
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_override_url_keeps_vendor_query() {
        let profile = VendorProfile::for_vendor(RealtimeVendor::OpenAI);
        let url = profile
            .endpoint(&EndpointParams {
                model: "m1",
                override_url: Some("ws://127.0.0.1:9000/v1/realtime"),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(url, "ws://127.0.0.1:9000/v1/realtime?model=m1");
    }

    #[test]
    fn test_select_voice() {
        let profile = VendorProfile::for_vendor(RealtimeVendor::OpenAI);
        assert_eq!(profile.select_voice(Some("Female")), RealtimeVoice::Shimmer);
        assert_eq!(profile.select_voice(Some("woman")), RealtimeVoice::Shimmer);
        assert_eq!(profile.select_voice(Some("F")), RealtimeVoice::Shimmer);
        assert_eq!(profile.select_voice(Some("Male")), RealtimeVoice::Echo);
        assert_eq!(profile.select_voice(Some(" m ")), RealtimeVoice::Echo);
        assert_eq!(profile.select_voice(Some("non-binary")), RealtimeVoice::Alloy);
        assert_eq!(profile.select_voice(None), RealtimeVoice::Alloy);

        let azure = VendorProfile::for_vendor(RealtimeVendor::Azure);
        assert_eq!(azure.select_voice(Some("female")).as_str(), "coral");
    }

    #[test]
    fn test_turn_detection_overrides() {
        let profile = VendorProfile::for_vendor(RealtimeVendor::Azure);
        let vad = profile.turn_detection(Some(0.7), None, None);
        assert_eq!(
            vad,
            TurnDetectionConfig::ServerVad {
                threshold: Some(0.7),
                prefix_padding_ms: Some(300),
                silence_duration_ms: Some(600),
            }
        );
    }
}
