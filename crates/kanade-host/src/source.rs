//! Render source boundary
//!
//! The host does not generate or mix audio itself; it pulls interleaved
//! frames from an external render source. The contract is deliberately
//! narrow: a demand, a destination, and the number of frames actually
//! produced.

use std::sync::{Arc, Mutex};

use crate::types::Sample;

/// External supplier of interleaved audio frames.
///
/// `render` fills up to `frames * channels` samples into `out`
/// (frame-interleaved) and returns the number of frames actually produced.
/// Zero is a valid "not ready" answer, not an error; the host masks it with
/// silence. Calls must be bounded, there is no timeout on the other side.
pub trait RenderSource: Send {
    fn render(&mut self, out: &mut [Sample], frames: usize, channels: usize) -> usize;
}

/// Closures work as render sources
impl<F> RenderSource for F
where
    F: FnMut(&mut [Sample], usize, usize) -> usize + Send,
{
    fn render(&mut self, out: &mut [Sample], frames: usize, channels: usize) -> usize {
        self(out, frames, channels)
    }
}

/// Shared render source handle.
///
/// The live callback and the offline export loop both pull from the same
/// source; they never run concurrently (the session is stopped before an
/// export starts), so the mutex is uncontended in practice.
pub type SharedRenderSource = Arc<Mutex<dyn RenderSource>>;

/// Wrap a render source into a [`SharedRenderSource`]
pub fn shared_source<S: RenderSource + 'static>(source: S) -> SharedRenderSource {
    Arc::new(Mutex::new(source))
}

/// Simple sine render source, handy for demos and smoke tests
pub struct SineSource {
    frequency: f64,
    sample_rate: f64,
    phase: f64,
    amplitude: f32,
}

impl SineSource {
    pub fn new(frequency: f64, sample_rate: u32) -> Self {
        Self {
            frequency,
            sample_rate: sample_rate as f64,
            phase: 0.0,
            amplitude: 0.5,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Follow a device rate change
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f64;
    }
}

impl RenderSource for SineSource {
    fn render(&mut self, out: &mut [Sample], frames: usize, channels: usize) -> usize {
        let step = self.frequency / self.sample_rate * std::f64::consts::TAU;
        for frame in 0..frames {
            let value = (self.phase.sin() as f32) * self.amplitude;
            self.phase += step;
            for ch in 0..channels {
                out[frame * channels + ch] = value;
            }
        }
        if self.phase > std::f64::consts::TAU {
            self.phase -= std::f64::consts::TAU;
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_render_source() {
        let mut source = |out: &mut [Sample], frames: usize, channels: usize| {
            out[..frames * channels].fill(0.25);
            frames
        };
        let mut buf = [0.0f32; 8];
        let produced = source.render(&mut buf, 4, 2);
        assert_eq!(produced, 4);
        assert_eq!(buf, [0.25; 8]);
    }

    #[test]
    fn test_sine_produces_all_frames() {
        let mut sine = SineSource::new(440.0, 48000);
        let mut buf = [0.0f32; 64];
        assert_eq!(sine.render(&mut buf, 32, 2), 32);
        // Both channels carry the same signal
        assert_eq!(buf[2], buf[3]);
        assert!(buf.iter().any(|s| *s != 0.0));
    }
}
