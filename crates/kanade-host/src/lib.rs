//! kanade-host: real-time audio output host with a native effect chain.
//!
//! A [`audio::DeviceSession`] owns the platform output stream and pulls
//! interleaved f32 audio from a caller-supplied [`source::RenderSource`]
//! on every hardware callback. Between the source and the device sits an
//! [`chain::EffectChain`] of [`processor::NativeProcessor`]s that can be
//! edited, bypassed and latency-queried from a control thread while the
//! stream runs. The same chain can also be driven offline through
//! [`offline::OfflineRenderer`], which [`export::render_to_wav`] uses to
//! write latency-compensated 24-bit WAV files.

pub mod audio;
pub mod chain;
pub mod export;
pub mod metrics;
pub mod offline;
pub mod processor;
pub mod source;
pub mod types;

pub use audio::{AudioError, AudioResult, DeviceSession, SessionConfig, SessionState};
pub use chain::EffectChain;
pub use export::{render_to_wav, ExportRequest, ExportSummary};
pub use metrics::{JitterStats, UnderrunCounters};
pub use offline::OfflineRenderer;
pub use processor::{
    share, ChannelLayout, DelayProcessor, GainProcessor, NativeProcessor, ProcessorHandle,
    SideBuffer, SideEvent,
};
pub use source::{shared_source, RenderSource, SharedRenderSource, SineSource};
pub use types::{DeviceParams, PlanarBuffer, Sample};
