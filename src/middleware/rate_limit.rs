//! Per-IP request rate limiting
//!
//! Wraps the router in a `tower_governor` layer keyed by client IP. The IP
//! comes from `X-Forwarded-For`, `X-Real-IP` or `Forwarded` when present and
//! from the peer address otherwise.

use std::time::Duration;

use anyhow::anyhow;
use axum::Router;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tracing::info;

/// Rates at or above this disable the limiter entirely
pub const RATE_LIMIT_DISABLED_AT: u32 = 100_000;

/// Time for one request's worth of quota to come back.
pub fn replenish_period(requests_per_second: u32) -> Duration {
    Duration::from_secs(1) / requests_per_second.max(1)
}

/// Apply the per-IP limiter: `requests_per_second` sustained, bursts of up
/// to `burst_size`. Rejected requests get 429.
pub fn with_rate_limit(
    router: Router,
    requests_per_second: u32,
    burst_size: u32,
) -> anyhow::Result<Router> {
    if requests_per_second >= RATE_LIMIT_DISABLED_AT {
        info!("Rate limiting disabled (rate >= {RATE_LIMIT_DISABLED_AT}/s)");
        return Ok(router);
    }

    let config = GovernorConfigBuilder::default()
        .period(replenish_period(requests_per_second))
        .burst_size(burst_size.max(1))
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("Invalid rate limiter configuration"))?;

    info!(
        requests_per_second,
        burst_size, "Per-IP rate limiting enabled"
    );
    Ok(router.layer(GovernorLayer::new(config)))
}
