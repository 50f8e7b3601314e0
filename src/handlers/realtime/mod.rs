//! Standardized-patient voice relay
//!
//! Bridges one browser WebSocket to one upstream realtime speech session.
//!
//! # Protocol
//!
//! ## Client → Relay
//!
//! - **session.configure**: `caseData` (or `caseId`), optional `dialectLevel`
//! - **audio.append**: `audio`, one base64 PCM16 24kHz mono frame
//! - **audio.commit**: end the current utterance manually
//! - **response.cancel**: stop the patient's in-flight reply
//!
//! ## Relay → Client
//!
//! - **session.ready**: upstream accepted the session configuration
//! - **speech.started** / **speech.stopped**: VAD events
//! - **transcript.delta** / **transcript.done**: `role` is `user` or `assistant`
//! - **audio.delta** / **audio.done**: patient speech, base64 PCM16
//! - **response.done**: patient finished a reply
//! - **error**: `message`
//! - **session.closed**: upstream ended the session

mod handler;
pub mod messages;
pub mod session;

pub use handler::realtime_handler;
pub use session::{RelaySession, RelayState, build_realtime_config};
