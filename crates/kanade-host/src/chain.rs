//! Effect chain
//!
//! Ordered, bypass-aware list of processor slots shared between the control
//! thread and the audio callback. All state lives behind one mutex; the
//! callback holds it only for the duration of a single block's traversal, so
//! the worst-case hold time is bounded by one chain pass.

use std::sync::{Arc, Mutex};

use crate::processor::{ChannelLayout, NativeProcessor, ProcessorHandle, SideBuffer};
use crate::types::{DeviceParams, PlanarBuffer};

/// One chain entry: a shared processor reference plus its bypass flag.
///
/// A single slot vector keeps the processor list and the bypass flags in
/// lockstep by construction.
struct ChainSlot {
    processor: ProcessorHandle,
    bypassed: bool,
}

struct ChainState {
    slots: Vec<ChainSlot>,
    /// Device params while the session is running, None otherwise
    params: Option<DeviceParams>,
}

/// The processor chain between the render source and the device outputs.
///
/// Shared as `Arc<EffectChain>` between the device session, the callback
/// pipeline and the offline renderer. Mutations on unknown handles are
/// silent no-ops; a misbehaving processor degrades the chain, never kills it.
pub struct EffectChain {
    state: Mutex<ChainState>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                slots: Vec::new(),
                params: None,
            }),
        }
    }

    /// Append a processor to the end of the chain.
    ///
    /// If the device is currently active the processor is negotiated and
    /// prepared immediately; otherwise the next session start does it.
    pub fn add_processor(&self, processor: ProcessorHandle, initially_bypassed: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(params) = state.params {
            let layout = ChannelLayout::for_output_channels(params.output_channels);
            negotiate_and_prepare(&processor, layout, params.sample_rate, params.block_size);
            processor.lock().unwrap().suspend(initially_bypassed);
        }
        state.slots.push(ChainSlot {
            processor,
            bypassed: initially_bypassed,
        });
    }

    /// Remove a processor by identity, preserving the order of the rest.
    /// No-op if the handle was never added.
    pub fn remove_processor(&self, processor: &ProcessorHandle) {
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state
            .slots
            .iter()
            .position(|slot| Arc::ptr_eq(&slot.processor, processor))
        {
            state.slots.remove(pos);
        }
    }

    /// Empty the chain. Processors are not released or destroyed; their
    /// owners keep their handles.
    pub fn clear(&self) {
        self.state.lock().unwrap().slots.clear();
    }

    /// Set the bypass flag and mirror it into the processor's suspend state,
    /// so a bypassed processor also stops consuming CPU. No-op for an
    /// unknown handle.
    pub fn set_bypassed(&self, processor: &ProcessorHandle, bypassed: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(slot) = state
            .slots
            .iter_mut()
            .find(|slot| Arc::ptr_eq(&slot.processor, processor))
        {
            slot.bypassed = bypassed;
            slot.processor.lock().unwrap().suspend(bypassed);
        }
    }

    /// Bypass flag for a processor; true (fail-safe) for an unknown handle
    pub fn is_bypassed(&self, processor: &ProcessorHandle) -> bool {
        let state = self.state.lock().unwrap();
        state
            .slots
            .iter()
            .find(|slot| Arc::ptr_eq(&slot.processor, processor))
            .map(|slot| slot.bypassed)
            .unwrap_or(true)
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().slots.is_empty()
    }

    /// Sum of every processor's reported latency, bypassed slots included
    pub fn total_latency_samples(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .slots
            .iter()
            .map(|slot| slot.processor.lock().unwrap().latency_samples())
            .sum()
    }

    /// Device-start transition: record the active params and negotiate,
    /// prepare and re-suspend every slot for them.
    pub(crate) fn prepare_all(&self, params: DeviceParams) {
        let mut state = self.state.lock().unwrap();
        state.params = Some(params);
        let layout = ChannelLayout::for_output_channels(params.output_channels);
        for slot in &state.slots {
            negotiate_and_prepare(&slot.processor, layout, params.sample_rate, params.block_size);
            slot.processor.lock().unwrap().suspend(slot.bypassed);
        }
    }

    /// Device-stop transition: the params are no longer valid
    pub(crate) fn deactivate(&self) {
        self.state.lock().unwrap().params = None;
    }

    /// Offline transition: force every slot to stereo and re-prepare it at
    /// the offline rate/size, preserving bypass flags.
    pub(crate) fn prepare_offline(&self, sample_rate: u32, block_size: usize) {
        let state = self.state.lock().unwrap();
        for slot in &state.slots {
            negotiate_and_prepare(
                &slot.processor,
                ChannelLayout::Stereo,
                sample_rate,
                block_size,
            );
            slot.processor.lock().unwrap().suspend(slot.bypassed);
        }
    }

    /// Release every processor regardless of bypass state (flushes tails)
    pub(crate) fn release_all(&self) {
        let state = self.state.lock().unwrap();
        for slot in &state.slots {
            slot.processor.lock().unwrap().release();
        }
    }

    /// Run every non-bypassed processor, in chain order, in place on the
    /// shared planar buffer.
    ///
    /// Grows the buffer to the widest channel requirement across the active
    /// processors first (not expected once steady). Called from the audio
    /// callback and from the offline loop, never both at once.
    pub(crate) fn process_planar(&self, planar: &mut PlanarBuffer, side: &mut SideBuffer) {
        let state = self.state.lock().unwrap();

        let mut need_channels = planar.channel_count();
        for slot in state.slots.iter().filter(|slot| !slot.bypassed) {
            if let Ok(p) = slot.processor.try_lock() {
                need_channels = need_channels.max(p.channels_required());
            }
        }
        if need_channels > planar.channel_count() {
            planar.ensure(need_channels, planar.frames());
        }

        for slot in state.slots.iter().filter(|slot| !slot.bypassed) {
            // A processor busy on the control thread is skipped for this
            // block rather than blocking the callback.
            match slot.processor.try_lock() {
                Ok(mut p) => p.process(planar, side),
                Err(_) => log::trace!("processor busy, skipping one block"),
            }
        }
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Negotiate a layout matching the device, falling back to forced stereo.
/// Both attempts failing is logged but never fatal: the processor stays in
/// the chain and may misrender.
fn negotiate_and_prepare(
    processor: &ProcessorHandle,
    layout: ChannelLayout,
    sample_rate: u32,
    block_size: usize,
) {
    let mut p = processor.lock().unwrap();
    if !p.negotiate(layout, layout) && !p.negotiate(ChannelLayout::Stereo, ChannelLayout::Stereo) {
        log::warn!(
            "processor '{}' rejected {:?} and forced stereo layouts, keeping it in the chain",
            p.name(),
            layout
        );
    }
    p.prepare(sample_rate, block_size);
}
