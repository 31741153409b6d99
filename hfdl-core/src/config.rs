//! Configuration types for the HFDL receive pipeline.
use serde::{Deserialize, Serialize};

/// Samples per symbol after final resampling (fixed by the protocol).
pub const SPS: usize = 10;
/// HFDL symbol rate in baud.
pub const HFDL_SYMBOL_RATE: usize = 1800;
/// TDMA channel transition bandwidth in Hz.
pub const HFDL_CHANNEL_TRANSITION_BW_HZ: f64 = 250.0;
/// SSB carrier offset applied by ground transmitters.
pub const HFDL_SSB_CARRIER_OFFSET_HZ: f64 = 1440.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    Cu8,
    Cs16,
    #[default]
    Cf32,
}

/// One requested HFDL voice channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Channel center frequency in kHz, as used for tuning and as the
    /// `channel_freq` key in burst metadata and the aircraft cache.
    pub frequency_khz: u32,
}

/// Configuration for the shared FFT channelizer stage (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelizerConfig {
    pub input_sample_rate_hz: u32,
    pub pre_decimation: u32,
    pub transition_bw_hz: f64,
    pub centerfreq_hz: i64,
}

impl Default for ChannelizerConfig {
    fn default() -> Self {
        Self {
            input_sample_rate_hz: 192_000,
            pre_decimation: 10,
            transition_bw_hz: HFDL_CHANNEL_TRANSITION_BW_HZ,
            centerfreq_hz: 0,
        }
    }
}

impl ChannelizerConfig {
    /// Fails if the pre-decimated FFT size would be smaller than the
    /// channel filter taps, per §4.1's create() contract.
    pub fn validate_against_taps(&self, taps_length: usize) -> Result<(), crate::errors::ChannelizerError> {
        let decimated_rate = self.input_sample_rate_hz / self.pre_decimation.max(1);
        if (decimated_rate as usize) < taps_length {
            return Err(crate::errors::ChannelizerError::FftTooSmall {
                fft_size: decimated_rate as usize,
                taps_length,
            });
        }
        Ok(())
    }
}

/// Per-channel worker configuration (§3, §4.2). Immutable for the lifetime
/// of a channel worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelWorkerConfig {
    pub channel: ChannelSpec,
    pub post_decimation_sample_rate_hz: u32,
    pub symbol_rate: usize,
    pub samples_per_symbol: usize,
    pub correlation_threshold: f32,
    pub max_search_retries: u8,
}

impl Default for ChannelWorkerConfig {
    fn default() -> Self {
        Self {
            channel: ChannelSpec { frequency_khz: 0 },
            post_decimation_sample_rate_hz: 19_200,
            symbol_rate: HFDL_SYMBOL_RATE,
            samples_per_symbol: SPS,
            correlation_threshold: 0.3,
            max_search_retries: 3,
        }
    }
}

/// Aircraft-ID cache configuration (§3, §11.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub expiration_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            expiration_interval_secs: 60,
        }
    }
}

/// Ground-station directory / system-table configuration (§6, §11.2).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemTableConfig {
    pub path: Option<std::path::PathBuf>,
    pub save_path: Option<std::path::PathBuf>,
}

/// Output queue backpressure policy, shared across pipeline connections
/// per §5.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueConfig {
    /// `0` means unbounded.
    pub high_water_mark: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { high_water_mark: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_too_small_is_rejected() {
        let cfg = ChannelizerConfig {
            input_sample_rate_hz: 600,
            pre_decimation: 10,
            ..Default::default()
        };
        assert!(cfg.validate_against_taps(61).is_err());
    }

    #[test]
    fn fft_large_enough_is_accepted() {
        let cfg = ChannelizerConfig::default();
        assert!(cfg.validate_against_taps(61).is_ok());
    }
}
