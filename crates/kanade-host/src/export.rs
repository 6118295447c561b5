//! WAV export
//!
//! Renders the session's source through its chain offline and writes the
//! result as 24-bit stereo PCM. The live stream is stopped for the duration
//! and restarted afterwards if it was running; chain latency is compensated
//! by discarding the leading silent frames and rendering past the nominal
//! end so effect tails land in the file.

use std::path::Path;
use std::thread;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::{AudioError, AudioResult, DeviceSession};
use crate::offline::{OfflineRenderer, OFFLINE_CHANNELS};
use crate::types::Sample;

/// Floor for the export sample rate (CD quality)
const MIN_EXPORT_SAMPLE_RATE: u32 = 44_100;

/// Floor for the export block size in frames
const MIN_EXPORT_BLOCK_SIZE: usize = 256;

const BITS_PER_SAMPLE: u16 = 24;
const I24_MAX: f32 = 8_388_607.0;

/// Parameters for one export run
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Nominal program length in frames at the export rate
    pub song_frames: u64,
    pub sample_rate: u32,
    pub block_size: usize,
}

impl ExportRequest {
    pub fn new(song_frames: u64) -> Self {
        Self {
            song_frames,
            sample_rate: MIN_EXPORT_SAMPLE_RATE,
            block_size: MIN_EXPORT_BLOCK_SIZE,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }
}

/// What an export produced
#[derive(Debug, Clone, Copy)]
pub struct ExportSummary {
    /// Frames actually written to the file
    pub frames_written: u64,
    /// Chain latency that was compensated, in samples
    pub latency_samples: usize,
}

/// Render `request.song_frames` frames of the session's source through its
/// chain and write them to `path`.
///
/// The session is stopped first so the chain has a single driver, and
/// restarted afterwards when it was running. Failure to restart is logged,
/// not turned into an export error; the file on disk is already complete at
/// that point.
pub fn render_to_wav(
    session: &mut DeviceSession,
    path: &Path,
    request: &ExportRequest,
) -> AudioResult<ExportSummary> {
    if request.song_frames == 0 {
        return Err(AudioError::InvalidOfflineParams(
            "song length of 0 frames".to_string(),
        ));
    }
    let was_running = session.is_running();
    session.stop();

    let result = run_export(session, path, request);

    if was_running {
        if let Err(e) = session.start() {
            log::error!("failed to resume live audio after export: {}", e);
        }
    }
    result
}

fn run_export(
    session: &mut DeviceSession,
    path: &Path,
    request: &ExportRequest,
) -> AudioResult<ExportSummary> {
    let sample_rate = request.sample_rate.max(MIN_EXPORT_SAMPLE_RATE);
    let block_size = request.block_size.max(MIN_EXPORT_BLOCK_SIZE);

    let mut offline = OfflineRenderer::new(session.chain().clone());
    offline.prepare(sample_rate, block_size)?;
    let latency = offline.total_latency_samples();

    log::info!(
        "exporting {} frames at {} Hz ({} samples of chain latency)",
        request.song_frames,
        sample_rate,
        latency
    );

    let spec = WavSpec {
        channels: OFFLINE_CHANNELS as u16,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(|e| {
        offline.release();
        AudioError::Export(e.to_string())
    })?;

    let source = session.render_source();
    let mut block = vec![0.0f32; block_size * OFFLINE_CHANNELS];
    // Render past the nominal end by the chain latency so delayed tails are
    // flushed, and drop the same number of leading frames
    let total_frames = request.song_frames + latency as u64;
    let mut rendered: u64 = 0;
    let mut skip = latency;
    let mut frames_written: u64 = 0;

    while rendered < total_frames {
        let todo = ((total_frames - rendered) as usize).min(block_size);
        let got = {
            let mut source = source.lock().unwrap();
            source.render(&mut block, todo, OFFLINE_CHANNELS)
        };
        if got == 0 {
            // Source momentarily starved; give it time to catch up
            thread::sleep(Duration::from_millis(1));
            continue;
        }
        let got = got.min(todo);

        if let Err(e) = offline.process_block(&mut block, got) {
            offline.release();
            return Err(e);
        }

        for frame in 0..got {
            if skip > 0 {
                skip -= 1;
                continue;
            }
            for ch in 0..OFFLINE_CHANNELS {
                let quantized = sample_to_i24(block[frame * OFFLINE_CHANNELS + ch]);
                if let Err(e) = writer.write_sample(quantized) {
                    offline.release();
                    return Err(AudioError::Export(e.to_string()));
                }
            }
            frames_written += 1;
        }
        rendered += got as u64;
    }

    offline.release();
    writer
        .finalize()
        .map_err(|e| AudioError::Export(e.to_string()))?;

    log::info!("export complete: {} frames written", frames_written);
    Ok(ExportSummary {
        frames_written,
        latency_samples: latency,
    })
}

fn sample_to_i24(sample: Sample) -> i32 {
    (sample.clamp(-1.0, 1.0) * I24_MAX) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{share, DelayProcessor, GainProcessor};
    use crate::source::shared_source;

    /// Deterministic ramp keyed on the absolute frame index, resumable
    /// across render calls
    fn ramp_source() -> crate::source::SharedRenderSource {
        let mut next_frame: u64 = 0;
        shared_source(move |out: &mut [Sample], frames: usize, channels: usize| {
            for f in 0..frames {
                let value = ramp_value(next_frame + f as u64);
                for ch in 0..channels {
                    out[f * channels + ch] = value;
                }
            }
            next_frame += frames as u64;
            frames
        })
    }

    fn ramp_value(frame: u64) -> f32 {
        (frame % 1000) as f32 / 1000.0 * 0.5
    }

    #[test]
    fn test_export_compensates_chain_latency() {
        let mut session = DeviceSession::new(ramp_source());
        session
            .chain()
            .add_processor(share(DelayProcessor::new(128)), false);
        session
            .chain()
            .add_processor(share(GainProcessor::new(1.0)), false);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.wav");
        let request = ExportRequest::new(44_100).with_block_size(512);

        let summary = render_to_wav(&mut session, &path, &request).unwrap();
        assert_eq!(summary.latency_samples, 128);
        assert_eq!(summary.frames_written, 44_100);

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 24);
        assert_eq!(reader.duration(), 44_100);

        // With the leading latency frames discarded, file frame n lines up
        // with source frame n
        let samples: Vec<i32> = reader.samples::<i32>().map(|s| s.unwrap()).collect();
        for &frame in &[0u64, 1, 127, 128, 129, 1000, 44_099] {
            let expected = ramp_value(frame);
            let left = samples[frame as usize * 2] as f32 / I24_MAX;
            assert!(
                (left - expected).abs() < 1e-3,
                "frame {}: got {}, expected {}",
                frame,
                left,
                expected
            );
        }
    }

    #[test]
    fn test_export_with_empty_chain() {
        let mut session = DeviceSession::new(ramp_source());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dry.wav");

        let summary =
            render_to_wav(&mut session, &path, &ExportRequest::new(4_096)).unwrap();
        assert_eq!(summary.latency_samples, 0);
        assert_eq!(summary.frames_written, 4_096);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 4_096);
    }

    #[test]
    fn test_zero_length_export_is_rejected() {
        let mut session = DeviceSession::new(ramp_source());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        assert!(render_to_wav(&mut session, &path, &ExportRequest::new(0)).is_err());
    }

    #[test]
    fn test_request_floors_are_applied() {
        // Sub-minimum rate and block size are raised, not honored
        let mut session = DeviceSession::new(ramp_source());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floored.wav");
        let request = ExportRequest::new(1_000)
            .with_sample_rate(22_050)
            .with_block_size(32);

        render_to_wav(&mut session, &path, &request).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 44_100);
    }
}
