//! Render a few seconds of a sine tone through a small chain to a WAV file.
//!
//! Usage: offline-render [OUTPUT.wav] [SECONDS]

use std::path::PathBuf;

use anyhow::{Context, Result};

use kanade_host::{
    render_to_wav, share, DelayProcessor, DeviceSession, ExportRequest, GainProcessor, SineSource,
};

const SAMPLE_RATE: u32 = 44_100;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let path: PathBuf = args
        .next()
        .unwrap_or_else(|| "render.wav".to_string())
        .into();
    let seconds: u64 = args
        .next()
        .map(|s| s.parse())
        .transpose()
        .context("SECONDS must be a whole number")?
        .unwrap_or(3);

    let source = kanade_host::shared_source(
        SineSource::new(440.0, SAMPLE_RATE).with_amplitude(0.4),
    );
    let mut session = DeviceSession::new(source);
    session
        .chain()
        .add_processor(share(GainProcessor::new(0.8)), false);
    session
        .chain()
        .add_processor(share(DelayProcessor::new(2_048)), false);

    let request = ExportRequest::new(seconds * SAMPLE_RATE as u64).with_sample_rate(SAMPLE_RATE);
    let summary = render_to_wav(&mut session, &path, &request)
        .with_context(|| format!("rendering to {}", path.display()))?;

    println!(
        "wrote {} frames to {} ({} samples of latency compensated)",
        summary.frames_written,
        path.display(),
        summary.latency_samples
    );
    Ok(())
}
