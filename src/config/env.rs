//! Environment variable loading
//!
//! Reads every supported variable into an [`EnvConfig`] with no defaults
//! applied; `merge` decides precedence and fallbacks.

use std::env;
use std::str::FromStr;

/// Raw values read from the process environment
#[derive(Debug, Default)]
pub(super) struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,

    pub openai_api_key: Option<String>,
    pub azure_openai_api_key: Option<String>,
    pub azure_openai_endpoint: Option<String>,
    pub azure_openai_deployment: Option<String>,

    pub openai_base_url: Option<String>,
    pub chat_model: Option<String>,
    pub chat_max_tokens: Option<u32>,
    pub chat_temperature: Option<f32>,

    pub realtime_vendor: Option<String>,
    pub realtime_model: Option<String>,
    pub realtime_url: Option<String>,
    pub realtime_transcription_model: Option<String>,
    pub vad_threshold: Option<f32>,
    pub vad_prefix_padding_ms: Option<u32>,
    pub vad_silence_duration_ms: Option<u32>,
    pub unconfigured_timeout_seconds: Option<u64>,
    pub idle_timeout_seconds: Option<u64>,

    pub cases_dir: Option<String>,

    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl EnvConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            host: string("HOST"),
            port: parsed("PORT")?,
            tls_cert_path: string("TLS_CERT_PATH"),
            tls_key_path: string("TLS_KEY_PATH"),

            openai_api_key: string("OPENAI_API_KEY"),
            azure_openai_api_key: string("AZURE_OPENAI_API_KEY"),
            azure_openai_endpoint: string("AZURE_OPENAI_ENDPOINT"),
            azure_openai_deployment: string("AZURE_OPENAI_DEPLOYMENT"),

            openai_base_url: string("OPENAI_BASE_URL"),
            chat_model: string("CHAT_MODEL"),
            chat_max_tokens: parsed("CHAT_MAX_TOKENS")?,
            chat_temperature: parsed("CHAT_TEMPERATURE")?,

            realtime_vendor: string("REALTIME_VENDOR"),
            realtime_model: string("REALTIME_MODEL"),
            realtime_url: string("REALTIME_URL"),
            realtime_transcription_model: string("REALTIME_TRANSCRIPTION_MODEL"),
            vad_threshold: parsed("VAD_THRESHOLD")?,
            vad_prefix_padding_ms: parsed("VAD_PREFIX_PADDING_MS")?,
            vad_silence_duration_ms: parsed("VAD_SILENCE_DURATION_MS")?,
            unconfigured_timeout_seconds: parsed("RELAY_UNCONFIGURED_TIMEOUT_SECONDS")?,
            idle_timeout_seconds: parsed("RELAY_IDLE_TIMEOUT_SECONDS")?,

            cases_dir: string("CASES_DIR"),

            cors_allowed_origins: string("CORS_ALLOWED_ORIGINS"),
            rate_limit_requests_per_second: parsed("RATE_LIMIT_REQUESTS_PER_SECOND")?,
            rate_limit_burst_size: parsed("RATE_LIMIT_BURST_SIZE")?,
            max_websocket_connections: parsed("MAX_WEBSOCKET_CONNECTIONS")?,
            max_connections_per_ip: parsed("MAX_CONNECTIONS_PER_IP")?,
        })
    }
}

/// Non-empty string value of `name`
fn string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name} ('{raw}'): {e}").into()),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_parse_error_names_variable() {
        unsafe {
            env::set_var("PORT", "not-a-port");
        }
        let err = EnvConfig::load().unwrap_err();
        assert!(err.to_string().contains("PORT"));
        unsafe {
            env::remove_var("PORT");
        }
    }

    #[test]
    #[serial]
    fn test_blank_values_are_absent() {
        unsafe {
            env::set_var("OPENAI_API_KEY", "  ");
        }
        let config = EnvConfig::load().unwrap();
        assert!(config.openai_api_key.is_none());
        unsafe {
            env::remove_var("OPENAI_API_KEY");
        }
    }
}
