use super::ServerConfig;
use crate::core::realtime::RealtimeVendor;

/// Validate a fully merged configuration
pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_port(config.port)?;
    validate_realtime(config)?;
    validate_rate_limits(
        config.rate_limit_requests_per_second,
        config.rate_limit_burst_size,
    )?;
    Ok(())
}

fn validate_port(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    if port == 0 {
        return Err("PORT must be between 1 and 65535".into());
    }
    Ok(())
}

fn validate_realtime(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let realtime = &config.realtime;

    if let Some(threshold) = realtime.vad_threshold
        && !(0.0..=1.0).contains(&threshold)
    {
        return Err(format!("VAD_THRESHOLD must be within 0.0..=1.0, got {threshold}").into());
    }

    if realtime.unconfigured_timeout_seconds == 0 {
        return Err("RELAY_UNCONFIGURED_TIMEOUT_SECONDS must be greater than zero".into());
    }

    if realtime.vendor == RealtimeVendor::Azure
        && realtime.url.is_none()
        && config.azure_openai_endpoint.is_none()
    {
        return Err(
            "Realtime vendor 'azure' requires AZURE_OPENAI_ENDPOINT (or an explicit REALTIME_URL)"
                .into(),
        );
    }

    if let Some(url) = &realtime.url {
        let parsed = url::Url::parse(url).map_err(|e| format!("Invalid REALTIME_URL: {e}"))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(format!(
                "REALTIME_URL must use ws:// or wss://, got '{}'",
                parsed.scheme()
            )
            .into());
        }
    }

    Ok(())
}

fn validate_rate_limits(rps: u32, burst: u32) -> Result<(), Box<dyn std::error::Error>> {
    if rps == 0 || burst == 0 {
        return Err(
            "RATE_LIMIT_REQUESTS_PER_SECOND and RATE_LIMIT_BURST_SIZE must be greater than zero"
                .into(),
        );
    }
    Ok(())
}
