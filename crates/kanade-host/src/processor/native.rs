//! Built-in native processors
//!
//! Small processors implemented directly against [`NativeProcessor`]: a gain
//! stage and a fixed delay line that reports its delay as latency (the shape
//! of any lookahead-style processor). They double as reference
//! implementations of the trait lifecycle.

use super::{ChannelLayout, NativeProcessor, SideBuffer};
use crate::types::{PlanarBuffer, Sample};

/// Linear gain applied to every negotiated channel
pub struct GainProcessor {
    name: String,
    gain: Sample,
    layout: ChannelLayout,
    suspended: bool,
}

impl GainProcessor {
    pub fn new(gain: Sample) -> Self {
        Self {
            name: format!("gain x{:.2}", gain),
            gain,
            layout: ChannelLayout::Stereo,
            suspended: false,
        }
    }

    pub fn gain(&self) -> Sample {
        self.gain
    }

    pub fn set_gain(&mut self, gain: Sample) {
        self.gain = gain;
    }
}

impl NativeProcessor for GainProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn negotiate(&mut self, input: ChannelLayout, output: ChannelLayout) -> bool {
        if input != output {
            return false;
        }
        self.layout = input;
        true
    }

    fn prepare(&mut self, _sample_rate: u32, _block_size: usize) {}

    fn process(&mut self, buffer: &mut PlanarBuffer, _side: &mut SideBuffer) {
        if self.suspended {
            return;
        }
        let channels = self.layout.channels().min(buffer.channel_count());
        for ch in 0..channels {
            for sample in buffer.channel_mut(ch) {
                *sample *= self.gain;
            }
        }
    }

    fn suspend(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    fn channels_required(&self) -> usize {
        self.layout.channels()
    }

    fn release(&mut self) {}
}

/// Ring buffer for one channel of the delay processor
#[derive(Debug, Default)]
struct DelayLine {
    buffer: Vec<Sample>,
    write_pos: usize,
}

impl DelayLine {
    fn resize(&mut self, delay_samples: usize) {
        self.buffer.clear();
        self.buffer.resize(delay_samples, 0.0);
        self.write_pos = 0;
    }

    #[inline]
    fn process(&mut self, input: Sample) -> Sample {
        if self.buffer.is_empty() {
            return input;
        }
        let output = self.buffer[self.write_pos];
        self.buffer[self.write_pos] = input;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// Fixed delay on every negotiated channel.
///
/// Reports the delay as processing latency, so an offline render compensates
/// for it exactly. Models the latency behaviour of lookahead processors.
pub struct DelayProcessor {
    name: String,
    delay_samples: usize,
    lines: Vec<DelayLine>,
    layout: ChannelLayout,
    suspended: bool,
}

impl DelayProcessor {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            name: format!("delay {} smp", delay_samples),
            delay_samples,
            lines: Vec::new(),
            layout: ChannelLayout::Stereo,
            suspended: false,
        }
    }
}

impl NativeProcessor for DelayProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn negotiate(&mut self, input: ChannelLayout, output: ChannelLayout) -> bool {
        if input != output {
            return false;
        }
        self.layout = input;
        true
    }

    fn prepare(&mut self, _sample_rate: u32, _block_size: usize) {
        self.lines
            .resize_with(self.layout.channels(), DelayLine::default);
        for line in &mut self.lines {
            line.resize(self.delay_samples);
        }
    }

    fn process(&mut self, buffer: &mut PlanarBuffer, _side: &mut SideBuffer) {
        if self.suspended {
            return;
        }
        let channels = self.lines.len().min(buffer.channel_count());
        for ch in 0..channels {
            let line = &mut self.lines[ch];
            for sample in buffer.channel_mut(ch) {
                *sample = line.process(*sample);
            }
        }
    }

    fn suspend(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    fn latency_samples(&self) -> usize {
        self.delay_samples
    }

    fn channels_required(&self) -> usize {
        self.layout.channels()
    }

    fn release(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_block(frames: usize) -> PlanarBuffer {
        PlanarBuffer::with_capacity(2, frames)
    }

    #[test]
    fn test_gain_scales_both_channels() {
        let mut gain = GainProcessor::new(0.5);
        assert!(gain.negotiate(ChannelLayout::Stereo, ChannelLayout::Stereo));
        gain.prepare(48000, 4);

        let mut buf = stereo_block(4);
        buf.channel_mut(0).fill(1.0);
        buf.channel_mut(1).fill(-1.0);

        let mut side = SideBuffer::new();
        gain.process(&mut buf, &mut side);
        assert_eq!(buf.channel(0), &[0.5; 4]);
        assert_eq!(buf.channel(1), &[-0.5; 4]);
    }

    #[test]
    fn test_suspended_gain_passes_through() {
        let mut gain = GainProcessor::new(0.0);
        assert!(gain.negotiate(ChannelLayout::Stereo, ChannelLayout::Stereo));
        gain.suspend(true);

        let mut buf = stereo_block(2);
        buf.channel_mut(0).fill(1.0);
        let mut side = SideBuffer::new();
        gain.process(&mut buf, &mut side);
        assert_eq!(buf.channel(0), &[1.0, 1.0]);
    }

    #[test]
    fn test_delay_line_outputs_silence_then_input() {
        let mut delay = DelayProcessor::new(3);
        assert!(delay.negotiate(ChannelLayout::Mono, ChannelLayout::Mono));
        delay.prepare(48000, 4);
        assert_eq!(delay.latency_samples(), 3);

        let mut buf = PlanarBuffer::with_capacity(1, 4);
        buf.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let mut side = SideBuffer::new();
        delay.process(&mut buf, &mut side);

        // Three samples of delay fill, then the first input re-appears
        assert_eq!(buf.channel(0), &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_zero_delay_is_identity() {
        let mut delay = DelayProcessor::new(0);
        assert!(delay.negotiate(ChannelLayout::Mono, ChannelLayout::Mono));
        delay.prepare(48000, 3);

        let mut buf = PlanarBuffer::with_capacity(1, 3);
        buf.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0]);
        let mut side = SideBuffer::new();
        delay.process(&mut buf, &mut side);
        assert_eq!(buf.channel(0), &[1.0, 2.0, 3.0]);
    }
}
