use std::path::PathBuf;

use super::env::EnvConfig;
use super::yaml::YamlConfig;
use super::{RealtimeSettings, ServerConfig, TlsConfig};
use crate::core::realtime::{RealtimeVendor, get_supported_realtime_vendors};

/// Merge environment variables (base) with optional YAML overrides
///
/// For every field the YAML value wins, then the environment value, then the
/// default from [`ServerConfig::default`].
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();
    let defaults = ServerConfig::default();

    let server = yaml.server.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let chat = yaml.chat.unwrap_or_default();
    let realtime = yaml.realtime.unwrap_or_default();
    let cases = yaml.cases.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let tls_yaml = server.tls.unwrap_or_default();
    let tls = if tls_yaml.enabled == Some(false) {
        None
    } else {
        match (
            tls_yaml.cert_path.or(env.tls_cert_path),
            tls_yaml.key_path.or(env.tls_key_path),
        ) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(
                    "TLS requires both a certificate path and a key path (TLS_CERT_PATH, TLS_KEY_PATH)"
                        .into(),
                );
            }
        }
    };

    let vendor = match realtime.vendor.or(env.realtime_vendor) {
        Some(name) => RealtimeVendor::parse(&name).ok_or_else(|| {
            format!(
                "Unsupported realtime vendor '{name}'. Expected one of: {}",
                get_supported_realtime_vendors().join(", ")
            )
        })?,
        None => defaults.realtime.vendor,
    };

    let default_realtime = RealtimeSettings::default();
    let realtime = RealtimeSettings {
        vendor,
        model: realtime
            .model
            .or(env.realtime_model)
            .unwrap_or(default_realtime.model),
        url: realtime.url.or(env.realtime_url),
        transcription_model: realtime
            .transcription_model
            .or(env.realtime_transcription_model)
            .unwrap_or(default_realtime.transcription_model),
        vad_threshold: realtime.vad_threshold.or(env.vad_threshold),
        vad_prefix_padding_ms: realtime.vad_prefix_padding_ms.or(env.vad_prefix_padding_ms),
        vad_silence_duration_ms: realtime
            .vad_silence_duration_ms
            .or(env.vad_silence_duration_ms),
        unconfigured_timeout_seconds: realtime
            .unconfigured_timeout_seconds
            .or(env.unconfigured_timeout_seconds)
            .unwrap_or(default_realtime.unconfigured_timeout_seconds),
        idle_timeout_seconds: realtime
            .idle_timeout_seconds
            .or(env.idle_timeout_seconds)
            .unwrap_or(default_realtime.idle_timeout_seconds),
    };

    Ok(ServerConfig {
        host: server.host.or(env.host).unwrap_or(defaults.host.clone()),
        port: server.port.or(env.port).unwrap_or(defaults.port),
        tls,
        openai_api_key: providers.openai_api_key.or(env.openai_api_key),
        azure_openai_api_key: providers.azure_openai_api_key.or(env.azure_openai_api_key),
        azure_openai_endpoint: providers
            .azure_openai_endpoint
            .or(env.azure_openai_endpoint),
        azure_openai_deployment: providers
            .azure_openai_deployment
            .or(env.azure_openai_deployment),
        openai_base_url: chat
            .base_url
            .or(env.openai_base_url)
            .unwrap_or(defaults.openai_base_url.clone()),
        chat_model: chat
            .model
            .or(env.chat_model)
            .unwrap_or(defaults.chat_model.clone()),
        chat_max_tokens: chat
            .max_tokens
            .or(env.chat_max_tokens)
            .unwrap_or(defaults.chat_max_tokens),
        chat_temperature: chat
            .temperature
            .or(env.chat_temperature)
            .unwrap_or(defaults.chat_temperature),
        realtime,
        cases_dir: cases.dir.or(env.cases_dir).map(PathBuf::from),
        cors_allowed_origins: security.cors_allowed_origins.or(env.cors_allowed_origins),
        rate_limit_requests_per_second: security
            .rate_limit_requests_per_second
            .or(env.rate_limit_requests_per_second)
            .unwrap_or(defaults.rate_limit_requests_per_second),
        rate_limit_burst_size: security
            .rate_limit_burst_size
            .or(env.rate_limit_burst_size)
            .unwrap_or(defaults.rate_limit_burst_size),
        max_websocket_connections: security
            .max_websocket_connections
            .or(env.max_websocket_connections),
        max_connections_per_ip: security
            .max_connections_per_ip
            .or(env.max_connections_per_ip)
            .unwrap_or(defaults.max_connections_per_ip),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn cleanup() {
        unsafe {
            env::remove_var("TLS_CERT_PATH");
            env::remove_var("TLS_KEY_PATH");
            env::remove_var("REALTIME_VENDOR");
            env::remove_var("CHAT_MODEL");
        }
    }

    #[test]
    #[serial]
    fn test_merge_without_yaml_uses_defaults() {
        cleanup();
        let config = merge_config(None).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.realtime.vendor, RealtimeVendor::OpenAI);
        assert!(config.tls.is_none());
    }

    #[test]
    #[serial]
    fn test_half_configured_tls_is_rejected() {
        cleanup();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/tmp/cert.pem");
        }
        let err = merge_config(None).unwrap_err();
        assert!(err.to_string().contains("TLS requires both"));
        cleanup();
    }

    #[test]
    #[serial]
    fn test_unknown_vendor_is_rejected() {
        cleanup();
        unsafe {
            env::set_var("REALTIME_VENDOR", "acme");
        }
        let err = merge_config(None).unwrap_err();
        assert!(err.to_string().contains("acme"));
        assert!(err.to_string().contains("openai, azure"));
        cleanup();
    }

    #[test]
    #[serial]
    fn test_yaml_wins_over_env() {
        cleanup();
        unsafe {
            env::set_var("CHAT_MODEL", "env-model");
        }
        let yaml: YamlConfig = serde_yaml::from_str("chat:\n  model: yaml-model\n").unwrap();
        let config = merge_config(Some(yaml)).unwrap();
        assert_eq!(config.chat_model, "yaml-model");
        cleanup();
    }
}
