//! Platform audio boundary
//!
//! Device session, per-callback pipeline and their configuration. The
//! session owns the CPAL output stream; the pipeline runs on the stream's
//! callback thread and is never touched from the control thread while the
//! stream is alive.

mod config;
mod error;
mod pipeline;
mod session;

pub use config::{
    SessionConfig, DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
};
pub use error::{AudioError, AudioResult};
pub use session::{DeviceSession, SessionState};
