//! Session configuration
//!
//! Preferences applied when opening the output device. Everything is
//! optional; the device's own defaults win when nothing is requested.

use serde::{Deserialize, Serialize};

/// Maximum block size accepted from configuration (frames)
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Minimum block size accepted from configuration (frames)
pub const MIN_BLOCK_SIZE: usize = 64;

/// Default block size when no preference is specified (frames).
/// 512 frames is a safe default that works on most systems.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Preferred sample rate when the device supports it (48kHz, the standard
/// professional audio rate)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Configuration for a device session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Preferred sample rate in Hz; falls back to what the device supports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    /// Requested callback block size in frames; clamped to sane bounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<usize>,
}

impl SessionConfig {
    /// Block size to request, clamped to [MIN_BLOCK_SIZE, MAX_BLOCK_SIZE]
    pub fn effective_block_size(&self) -> usize {
        self.block_size
            .unwrap_or(DEFAULT_BLOCK_SIZE)
            .clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)
    }

    /// Sample rate to aim for during config selection
    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_clamping() {
        let config = SessionConfig {
            block_size: Some(16),
            ..Default::default()
        };
        assert_eq!(config.effective_block_size(), MIN_BLOCK_SIZE);

        let config = SessionConfig {
            block_size: Some(1 << 20),
            ..Default::default()
        };
        assert_eq!(config.effective_block_size(), MAX_BLOCK_SIZE);

        assert_eq!(
            SessionConfig::default().effective_block_size(),
            DEFAULT_BLOCK_SIZE
        );
    }
}
