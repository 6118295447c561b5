//! Per-callback processing pipeline
//!
//! The algorithm run once per hardware callback: record jitter, pull frames
//! from the render source, mask underrun with silence, then either copy
//! straight to the device (empty chain) or deinterleave, run the chain on
//! the planar buffer and write back. No unbounded blocking, no steady-state
//! allocation.

use std::sync::Arc;
use std::time::Instant;

use crate::chain::EffectChain;
use crate::metrics::{JitterMonitor, UnderrunCounters};
use crate::processor::SideBuffer;
use crate::source::SharedRenderSource;
use crate::types::{DeviceParams, PlanarBuffer, Sample};

pub(crate) struct CallbackPipeline {
    render: SharedRenderSource,
    chain: Arc<EffectChain>,
    jitter: JitterMonitor,
    underruns: Arc<UnderrunCounters>,
    /// Interleaved scratch; capacity grows monotonically, never shrinks
    /// while the session is active
    scratch: Vec<Sample>,
    planar: PlanarBuffer,
    side: SideBuffer,
    sample_rate: u32,
    channels: usize,
    last_callback: Option<Instant>,
}

impl CallbackPipeline {
    pub(crate) fn new(
        render: SharedRenderSource,
        chain: Arc<EffectChain>,
        jitter: JitterMonitor,
        underruns: Arc<UnderrunCounters>,
        params: DeviceParams,
    ) -> Self {
        Self {
            render,
            chain,
            jitter,
            underruns,
            scratch: vec![0.0; params.block_size * params.output_channels],
            planar: PlanarBuffer::with_capacity(params.output_channels, params.block_size),
            side: SideBuffer::new(),
            sample_rate: params.sample_rate,
            channels: params.output_channels,
            last_callback: None,
        }
    }

    /// Fill one interleaved device buffer.
    ///
    /// An empty buffer or a zero channel count is a silent no-op.
    pub(crate) fn process(&mut self, output: &mut [Sample]) {
        if output.is_empty() || self.channels == 0 {
            return;
        }
        let frames = output.len() / self.channels;
        if frames == 0 {
            return;
        }

        self.record_jitter(frames);

        // Grow the interleaved scratch if the device delivered a bigger
        // block than negotiated (not expected once steady)
        let need = frames * self.channels;
        if self.scratch.len() < need {
            self.scratch.resize(need, 0.0);
        }
        let scratch = &mut self.scratch[..need];

        // Pull frames from the render source; clamp over-production and
        // mask underrun with silence, never looped or repeated audio
        let produced = {
            let mut source = self.render.lock().unwrap();
            source.render(scratch, frames, self.channels)
        };
        let produced = produced.min(frames);
        if produced < frames {
            let start = produced * self.channels;
            scratch[start..].fill(0.0);
            self.underruns.record((need - start) as u64);
        }

        // Empty chain: straight copy, skip the planar round trip
        if self.chain.is_empty() {
            output[..need].copy_from_slice(scratch);
            output[need..].fill(0.0);
            return;
        }

        self.planar.ensure(self.channels, frames);
        self.planar.deinterleave_from(scratch, self.channels);
        self.side.clear();
        self.chain.process_planar(&mut self.planar, &mut self.side);
        self.planar.interleave_into(output, self.channels);
        output[need..].fill(0.0);
    }

    /// Compare the elapsed time since the previous callback with the ideal
    /// period for this block and record the absolute deviation.
    fn record_jitter(&mut self, frames: usize) {
        let now = Instant::now();
        if let Some(last) = self.last_callback {
            let elapsed_ms = now.duration_since(last).as_secs_f64() * 1000.0;
            let ideal_ms = frames as f64 / self.sample_rate as f64 * 1000.0;
            self.jitter.record((elapsed_ms - ideal_ms).abs());
        }
        self.last_callback = Some(now);
    }
}
