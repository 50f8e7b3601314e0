//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `cases` - Case listing, lookup, creation and criteria updates
//! - `chat` - Text chat, assessment and case generation
//! - `feedback` - Feedback collection
//! - `realtime` - Standardized-patient voice relay WebSocket

pub mod api;
pub mod cases;
pub mod chat;
pub mod feedback;
pub mod realtime;

// Re-export commonly used handlers for convenient access
pub use realtime::realtime_handler;
