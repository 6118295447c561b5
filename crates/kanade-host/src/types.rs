//! Common types for the audio host
//!
//! Fundamental audio types shared between the live callback path and the
//! offline rendering path: the planar processing buffer and the negotiated
//! device parameters.

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Parameters negotiated with the audio device.
///
/// Captured on the device's "about to start" transition and valid only while
/// the session is running. Cleared on stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceParams {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Callback block size in frames
    pub block_size: usize,
    /// Number of output channels delivered to the device
    pub output_channels: usize,
}

impl DeviceParams {
    /// Create device params, as captured at stream start
    pub fn new(sample_rate: u32, block_size: usize, output_channels: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            output_channels,
        }
    }

    /// Duration of one callback block in milliseconds
    pub fn block_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.block_size as f64 / self.sample_rate as f64 * 1000.0
    }
}

/// Per-channel contiguous audio storage.
///
/// One `Vec<Sample>` per channel. Capacity only ever grows (frames and
/// channels alike) so that steady-state callbacks never allocate; the active
/// frame count is set per block without touching capacity, the same way the
/// engine buffers set their working length from capacity.
#[derive(Debug, Default)]
pub struct PlanarBuffer {
    channels: Vec<Vec<Sample>>,
    capacity_frames: usize,
    active_frames: usize,
}

impl PlanarBuffer {
    /// Create an empty planar buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer pre-sized to the given shape
    pub fn with_capacity(channels: usize, frames: usize) -> Self {
        let mut buf = Self::new();
        buf.ensure(channels, frames);
        buf
    }

    /// Grow to at least `channels` x `frames` and set the active frame count.
    ///
    /// Growth is monotonic: neither the channel list nor the per-channel
    /// storage ever shrinks. Allocation only happens the first time a larger
    /// shape is requested.
    pub fn ensure(&mut self, channels: usize, frames: usize) {
        if frames > self.capacity_frames {
            self.capacity_frames = frames;
            for ch in &mut self.channels {
                ch.resize(frames, 0.0);
            }
        }
        while self.channels.len() < channels {
            self.channels.push(vec![0.0; self.capacity_frames]);
        }
        self.active_frames = frames;
    }

    /// Number of allocated channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Active frame count for the current block
    pub fn frames(&self) -> usize {
        self.active_frames
    }

    /// Read access to one channel, limited to the active frames
    pub fn channel(&self, ch: usize) -> &[Sample] {
        &self.channels[ch][..self.active_frames]
    }

    /// Write access to one channel, limited to the active frames
    pub fn channel_mut(&mut self, ch: usize) -> &mut [Sample] {
        &mut self.channels[ch][..self.active_frames]
    }

    /// Zero every allocated channel over the active frames
    pub fn fill_silence(&mut self) {
        for ch in &mut self.channels {
            ch[..self.active_frames].fill(0.0);
        }
    }

    /// Copy interleaved samples into per-channel storage.
    ///
    /// Reads `active_frames * channels` samples from `interleaved`
    /// (frame0ch0, frame0ch1, frame1ch0, ...).
    pub fn deinterleave_from(&mut self, interleaved: &[Sample], channels: usize) {
        let frames = self.active_frames;
        debug_assert!(interleaved.len() >= frames * channels);
        debug_assert!(self.channels.len() >= channels);
        for ch in 0..channels {
            let dst = &mut self.channels[ch][..frames];
            for (i, slot) in dst.iter_mut().enumerate() {
                *slot = interleaved[i * channels + ch];
            }
        }
    }

    /// Copy per-channel storage back into an interleaved buffer.
    ///
    /// Writes only the first `channels` channels; extra processing channels
    /// (e.g. a processor that negotiated wider layouts) are not emitted.
    pub fn interleave_into(&self, interleaved: &mut [Sample], channels: usize) {
        let frames = self.active_frames;
        debug_assert!(interleaved.len() >= frames * channels);
        for ch in 0..channels.min(self.channels.len()) {
            let src = &self.channels[ch][..frames];
            for (i, sample) in src.iter().enumerate() {
                interleaved[i * channels + ch] = *sample;
            }
        }
    }
}
