//! Device session
//!
//! Owns the platform output stream and drives the callback pipeline. One
//! session is constructed explicitly by the composing application and owns
//! its chain and metrics; there is no process-wide device manager.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, Stream, StreamConfig};

use super::config::SessionConfig;
use super::error::{AudioError, AudioResult};
use super::pipeline::CallbackPipeline;
use crate::chain::EffectChain;
use crate::metrics::{JitterMonitor, JitterStats, UnderrunCounters};
use crate::source::SharedRenderSource;
use crate::types::DeviceParams;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
}

/// Owns the audio device and the live callback.
///
/// `start` opens the default output device and registers the pipeline as its
/// callback; `stop` is idempotent and always returns the session to `Idle`.
/// Failure to open a device is reported as an `Err`, never a panic; the
/// retry/abort policy belongs to the caller.
pub struct DeviceSession {
    config: SessionConfig,
    render: SharedRenderSource,
    chain: Arc<EffectChain>,
    jitter_stats: Arc<JitterStats>,
    underruns: Arc<UnderrunCounters>,
    stream: Option<Stream>,
    params: Option<DeviceParams>,
    state: SessionState,
}

impl DeviceSession {
    /// Create an idle session pulling audio from `render`
    pub fn new(render: SharedRenderSource) -> Self {
        Self::with_config(render, SessionConfig::default())
    }

    pub fn with_config(render: SharedRenderSource, config: SessionConfig) -> Self {
        Self {
            config,
            render,
            chain: Arc::new(EffectChain::new()),
            jitter_stats: Arc::new(JitterStats::default()),
            underruns: Arc::new(UnderrunCounters::default()),
            stream: None,
            params: None,
            state: SessionState::Idle,
        }
    }

    /// The processor chain driven by this session
    pub fn chain(&self) -> &Arc<EffectChain> {
        &self.chain
    }

    /// Device params while running, None otherwise
    pub fn params(&self) -> Option<DeviceParams> {
        self.params
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Latest published 95th-percentile callback jitter in ms
    pub fn jitter_p95_ms(&self) -> f64 {
        self.jitter_stats.p95_ms()
    }

    /// Underrun counters for the live path
    pub fn underruns(&self) -> &Arc<UnderrunCounters> {
        &self.underruns
    }

    pub(crate) fn render_source(&self) -> SharedRenderSource {
        Arc::clone(&self.render)
    }

    /// Open the default output device and start the callback.
    ///
    /// Already-running sessions are left alone. On any failure the session
    /// is back in `Idle` and the error describes what went wrong.
    pub fn start(&mut self) -> AudioResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.state = SessionState::Starting;
        match self.open_stream() {
            Ok((stream, params)) => {
                self.stream = Some(stream);
                self.params = Some(params);
                self.state = SessionState::Running;
                log::info!(
                    "audio session running: {} ch, {} Hz, {} frames (~{:.1} ms)",
                    params.output_channels,
                    params.sample_rate,
                    params.block_size,
                    params.block_ms()
                );
                Ok(())
            }
            Err(e) => {
                self.chain.deactivate();
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Unregister the callback and close the device. Safe to call at any
    /// time, including when already stopped.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            log::info!("audio session stopped");
        }
        self.params = None;
        self.chain.deactivate();
        self.state = SessionState::Idle;
    }

    fn open_stream(&mut self) -> AudioResult<(Stream, DeviceParams)> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("using audio device: {}", device_name);

        let supported = pick_output_config(&device, &self.config)?;
        let block_size = self.config.effective_block_size();
        let params = DeviceParams::new(
            supported.sample_rate().0,
            block_size,
            supported.channels() as usize,
        );

        // "About to start": size buffers and prepare the chain before the
        // first callback can fire
        self.chain.prepare_all(params);
        let pipeline = CallbackPipeline::new(
            self.render_source(),
            Arc::clone(&self.chain),
            JitterMonitor::with_stats(Arc::clone(&self.jitter_stats)),
            Arc::clone(&self.underruns),
            params,
        );

        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: BufferSize::Fixed(block_size as u32),
        };

        let stream = match build_output_stream(&device, &stream_config, pipeline) {
            Ok(stream) => stream,
            Err(e) => {
                // Some backends refuse fixed block sizes; fall back to the
                // device default and keep the requested size as a sizing hint
                log::warn!(
                    "fixed block of {} frames rejected ({}), retrying with device default",
                    block_size,
                    e
                );
                let fallback = StreamConfig {
                    buffer_size: BufferSize::Default,
                    ..stream_config
                };
                let pipeline = CallbackPipeline::new(
                    self.render_source(),
                    Arc::clone(&self.chain),
                    JitterMonitor::with_stats(Arc::clone(&self.jitter_stats)),
                    Arc::clone(&self.underruns),
                    params,
                );
                build_output_stream(&device, &fallback, pipeline)?
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        Ok((stream, params))
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pick the best supported output configuration: f32 samples, a stereo
/// channel pair when the device has one, and the preferred sample rate when
/// it falls inside the supported range.
fn pick_output_config(
    device: &cpal::Device,
    config: &SessionConfig,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let ranges: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if ranges.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let best = ranges
        .iter()
        .filter(|r| r.sample_format() == SampleFormat::F32)
        .filter(|r| r.channels() == 2)
        .next()
        .or_else(|| {
            ranges
                .iter()
                .filter(|r| r.sample_format() == SampleFormat::F32)
                .next()
        })
        .or_else(|| ranges.first())
        .ok_or_else(|| AudioError::ConfigError("No usable output configuration".to_string()))?;

    let target_rate = config.target_sample_rate();
    let sample_rate = if target_rate >= best.min_sample_rate().0 && target_rate <= best.max_sample_rate().0
    {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "device does not support {} Hz, falling back to {} Hz",
            target_rate,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(sample_rate))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut pipeline: CallbackPipeline,
) -> AudioResult<Stream> {
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                pipeline.process(data);
            },
            move |err| {
                log::error!("audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
