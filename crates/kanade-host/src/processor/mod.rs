//! Native processor interface
//!
//! One polymorphic capability interface for every hosted processor format:
//! layout negotiation, prepare/release lifecycle, in-place planar processing,
//! suspend state and latency reporting. The host depends only on this trait,
//! never on concrete processor types.

pub mod native;

use std::sync::{Arc, Mutex};

use crate::types::PlanarBuffer;

pub use native::{DelayProcessor, GainProcessor};

/// Channel layout offered to a processor during negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    /// Number of channels in this layout
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Layout matching a device output channel count: mono for a single
    /// output channel, stereo otherwise.
    pub fn for_output_channels(channels: usize) -> Self {
        if channels == 1 {
            ChannelLayout::Mono
        } else {
            ChannelLayout::Stereo
        }
    }
}

/// One side-channel event delivered alongside an audio block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideEvent {
    /// Frame offset within the current block
    pub frame: usize,
    /// Raw event payload (short message)
    pub data: [u8; 3],
}

/// Side-channel event list passed through the chain with each block.
///
/// Cleared by the pipeline at the start of every block; processors may
/// consume or emit events during `process`.
#[derive(Debug, Default)]
pub struct SideBuffer {
    events: Vec<SideEvent>,
}

impl SideBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all events (start of a new block)
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn push(&mut self, event: SideEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SideEvent> {
        self.events.iter()
    }
}

/// The capability interface implemented by every hosted processor.
///
/// Lifecycle: `negotiate` (layout), `prepare` (rate/block), any number of
/// `process` calls, then `release`. `suspend(true)` parks the processor so a
/// bypassed slot stops consuming CPU; a suspended processor must pass audio
/// through untouched if it is processed anyway.
pub trait NativeProcessor: Send {
    /// Display name, used in logs
    fn name(&self) -> &str;

    /// Offer an input/output channel layout. Returns false if the processor
    /// cannot run with this layout; the host may retry with another layout.
    fn negotiate(&mut self, input: ChannelLayout, output: ChannelLayout) -> bool;

    /// Allocate and configure for the given rate and maximum block size
    fn prepare(&mut self, sample_rate: u32, block_size: usize);

    /// Process the active frames of `buffer` in place
    fn process(&mut self, buffer: &mut PlanarBuffer, side: &mut SideBuffer);

    /// Park or resume the processor
    fn suspend(&mut self, suspended: bool);

    /// Processing delay introduced by this processor, in samples
    fn latency_samples(&self) -> usize {
        0
    }

    /// Channels this processor needs in the shared processing buffer
    fn channels_required(&self) -> usize {
        2
    }

    /// Release resources and flush internal state (end of offline render,
    /// processor about to be destroyed)
    fn release(&mut self);
}

/// Shared, identity-comparable handle to a processor.
///
/// The chain never owns a processor exclusively: the composing application
/// keeps its own clone and removes the processor from the chain before
/// discarding it. Identity (`Arc::ptr_eq`) is what remove/bypass operations
/// match on.
pub type ProcessorHandle = Arc<Mutex<dyn NativeProcessor>>;

/// Wrap a processor into a [`ProcessorHandle`]
pub fn share<P: NativeProcessor + 'static>(processor: P) -> ProcessorHandle {
    Arc::new(Mutex::new(processor))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scriptable processor used by chain/pipeline/offline tests

    use super::*;
    use std::sync::Arc;

    /// Call log shared between a test and its processors
    pub type CallLog = Arc<Mutex<Vec<String>>>;

    pub fn new_log() -> CallLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// Processor that records every call and can be told to reject layouts
    pub struct ScriptedProcessor {
        tag: String,
        log: CallLog,
        pub accept_layouts: Vec<ChannelLayout>,
        pub latency: usize,
        pub suspended: bool,
    }

    impl ScriptedProcessor {
        pub fn new(tag: &str, log: CallLog) -> Self {
            Self {
                tag: tag.to_string(),
                log,
                accept_layouts: vec![ChannelLayout::Mono, ChannelLayout::Stereo],
                latency: 0,
                suspended: false,
            }
        }

        pub fn with_latency(mut self, latency: usize) -> Self {
            self.latency = latency;
            self
        }

        pub fn rejecting_all_layouts(mut self) -> Self {
            self.accept_layouts.clear();
            self
        }

        pub fn accepting_only(mut self, layout: ChannelLayout) -> Self {
            self.accept_layouts = vec![layout];
            self
        }

        fn record(&self, call: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.tag, call));
        }
    }

    impl NativeProcessor for ScriptedProcessor {
        fn name(&self) -> &str {
            &self.tag
        }

        fn negotiate(&mut self, input: ChannelLayout, _output: ChannelLayout) -> bool {
            let ok = self.accept_layouts.contains(&input);
            self.record(&format!("negotiate({:?})={}", input, ok));
            ok
        }

        fn prepare(&mut self, sample_rate: u32, block_size: usize) {
            self.record(&format!("prepare({}, {})", sample_rate, block_size));
        }

        fn process(&mut self, _buffer: &mut PlanarBuffer, _side: &mut SideBuffer) {
            self.record("process");
        }

        fn suspend(&mut self, suspended: bool) {
            self.suspended = suspended;
            self.record(&format!("suspend({})", suspended));
        }

        fn latency_samples(&self) -> usize {
            self.latency
        }

        fn release(&mut self) {
            self.record("release");
        }
    }

    /// All calls recorded so far, in order
    pub fn calls(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_for_output_channels() {
        assert_eq!(ChannelLayout::for_output_channels(1), ChannelLayout::Mono);
        assert_eq!(ChannelLayout::for_output_channels(2), ChannelLayout::Stereo);
        assert_eq!(ChannelLayout::for_output_channels(8), ChannelLayout::Stereo);
        assert_eq!(ChannelLayout::Mono.channels(), 1);
        assert_eq!(ChannelLayout::Stereo.channels(), 2);
    }

    #[test]
    fn test_side_buffer_clear() {
        let mut side = SideBuffer::new();
        side.push(SideEvent {
            frame: 0,
            data: [0x90, 60, 100],
        });
        assert!(!side.is_empty());
        side.clear();
        assert!(side.is_empty());
    }
}
