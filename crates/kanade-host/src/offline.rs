//! Offline chain rendering
//!
//! Drives the same chain the live callback uses, but from a control-thread
//! loop: fixed stereo, caller-chosen rate and block size, and explicit
//! latency accounting so an export can align its output with the nominal
//! timeline. The live session must be stopped before this runs; the chain
//! is never driven from two sides at once.

use std::sync::Arc;

use crate::audio::{AudioError, AudioResult};
use crate::chain::EffectChain;
use crate::processor::SideBuffer;
use crate::types::{PlanarBuffer, Sample};

/// Offline rendering always runs stereo
pub const OFFLINE_CHANNELS: usize = 2;

/// Control-thread driver for the effect chain.
///
/// Usage: `prepare`, then any number of `process_block` calls, then
/// `release`. `total_latency_samples` tells the caller how many leading
/// frames of chain output to discard and how many extra frames to keep
/// requesting past the nominal program length so effect tails are captured.
pub struct OfflineRenderer {
    chain: Arc<EffectChain>,
    planar: PlanarBuffer,
    side: SideBuffer,
    block_size: Option<usize>,
}

impl OfflineRenderer {
    pub fn new(chain: Arc<EffectChain>) -> Self {
        Self {
            chain,
            planar: PlanarBuffer::new(),
            side: SideBuffer::new(),
            block_size: None,
        }
    }

    /// Re-negotiate every processor to stereo and re-prepare it at the
    /// offline rate and block size. Bypass flags are preserved.
    pub fn prepare(&mut self, sample_rate: u32, block_size: usize) -> AudioResult<()> {
        if sample_rate == 0 || block_size == 0 {
            return Err(AudioError::InvalidOfflineParams(format!(
                "{} Hz, {} frames",
                sample_rate, block_size
            )));
        }
        self.planar.ensure(OFFLINE_CHANNELS, block_size);
        self.chain.prepare_offline(sample_rate, block_size);
        self.block_size = Some(block_size);
        log::debug!(
            "offline chain prepared: {} Hz, {} frames, latency {} samples",
            sample_rate,
            block_size,
            self.total_latency_samples()
        );
        Ok(())
    }

    /// Sum of every processor's reported latency, bypassed or not
    pub fn total_latency_samples(&self) -> usize {
        self.chain.total_latency_samples()
    }

    /// Run one interleaved stereo block through the chain in place.
    ///
    /// Ordering and bypass-skip semantics are identical to the live path.
    /// `block` holds `frames * 2` samples; partial final blocks are fine as
    /// long as `frames` does not exceed the prepared block size.
    pub fn process_block(&mut self, block: &mut [Sample], frames: usize) -> AudioResult<()> {
        let prepared_block = self.block_size.ok_or(AudioError::OfflineNotPrepared)?;
        if frames == 0 {
            return Ok(());
        }
        if frames > prepared_block || block.len() < frames * OFFLINE_CHANNELS {
            return Err(AudioError::InvalidOfflineParams(format!(
                "block of {} frames exceeds prepared size {}",
                frames, prepared_block
            )));
        }

        self.planar.ensure(OFFLINE_CHANNELS, frames);
        self.planar
            .deinterleave_from(&block[..frames * OFFLINE_CHANNELS], OFFLINE_CHANNELS);
        self.side.clear();
        self.chain.process_planar(&mut self.planar, &mut self.side);
        self.planar
            .interleave_into(&mut block[..frames * OFFLINE_CHANNELS], OFFLINE_CHANNELS);
        Ok(())
    }

    /// Release every processor regardless of bypass state, flushing tails
    pub fn release(&mut self) {
        self.chain.release_all();
        self.block_size = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::test_support::{calls, new_log, ScriptedProcessor};
    use crate::processor::{share, DelayProcessor, GainProcessor};

    #[test]
    fn test_latency_sums_across_slots() {
        // delay contributes 128, gain contributes 0
        let chain = Arc::new(EffectChain::new());
        chain.add_processor(share(DelayProcessor::new(128)), false);
        chain.add_processor(share(GainProcessor::new(1.0)), false);

        let mut offline = OfflineRenderer::new(Arc::clone(&chain));
        offline.prepare(44100, 512).unwrap();
        assert_eq!(offline.total_latency_samples(), 128);
    }

    #[test]
    fn test_prepare_forces_stereo_and_keeps_bypass() {
        let log = new_log();
        let chain = Arc::new(EffectChain::new());
        let p = share(ScriptedProcessor::new("p", log.clone()));
        chain.add_processor(p.clone(), false);
        chain.set_bypassed(&p, true);

        let mut offline = OfflineRenderer::new(Arc::clone(&chain));
        offline.prepare(44100, 256).unwrap();

        let recorded = calls(&log);
        assert!(recorded.contains(&"p:negotiate(Stereo)=true".to_string()));
        assert!(recorded.contains(&"p:prepare(44100, 256)".to_string()));
        assert!(chain.is_bypassed(&p));

        // Bypassed slots are skipped while processing but still released
        let mut block = vec![0.5f32; 64 * 2];
        offline.process_block(&mut block, 64).unwrap();
        assert!(!calls(&log).iter().any(|c| c.ends_with(":process")));

        offline.release();
        assert!(calls(&log).contains(&"p:release".to_string()));
    }

    #[test]
    fn test_process_applies_chain_in_place() {
        let chain = Arc::new(EffectChain::new());
        chain.add_processor(share(GainProcessor::new(0.5)), false);

        let mut offline = OfflineRenderer::new(chain);
        offline.prepare(48000, 128).unwrap();

        let mut block = vec![0.8f32; 128 * 2];
        offline.process_block(&mut block, 128).unwrap();
        assert!(block.iter().all(|s| (*s - 0.4).abs() < 1e-6));
    }

    #[test]
    fn test_process_before_prepare_is_an_error() {
        let mut offline = OfflineRenderer::new(Arc::new(EffectChain::new()));
        let mut block = vec![0.0f32; 8];
        assert!(matches!(
            offline.process_block(&mut block, 4),
            Err(AudioError::OfflineNotPrepared)
        ));
    }

    #[test]
    fn test_invalid_prepare_params_rejected() {
        let mut offline = OfflineRenderer::new(Arc::new(EffectChain::new()));
        assert!(offline.prepare(0, 512).is_err());
        assert!(offline.prepare(44100, 0).is_err());
    }
}
