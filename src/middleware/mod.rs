pub mod connection_limit;
pub mod rate_limit;

// Re-export middleware functions
pub use connection_limit::{ClientIp, ConnectionGuard, connection_limit_middleware};
pub use rate_limit::{RATE_LIMIT_DISABLED_AT, with_rate_limit};
