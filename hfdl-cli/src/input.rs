//! I/Q sample producer: reads a file of `CU8`/`CS16`/`CF32` samples and
//! pushes fixed-size blocks of normalized `Complex32` into the pipeline's
//! input queue (§6 input contract — sample-format conversion is the
//! producer's responsibility, not the channelizer's).

use color_eyre::eyre::{Context, Result};
use hfdl_core::config::SampleFormat;
use hfdl_core::pipeline::queue::Queue;
use hfdl_core::pipeline::shutdown::{ExitLevel, ShutdownState};
use num_complex::Complex32;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

/// Samples per block handed to the channelizer. Matches the channelizer's
/// pre-decimation input expectations for the default 192 kHz / 10x config.
const BLOCK_SAMPLES: usize = 1920;

fn octets_per_sample(format: SampleFormat) -> usize {
    match format {
        SampleFormat::Cu8 => 2,
        SampleFormat::Cs16 => 4,
        SampleFormat::Cf32 => 8,
    }
}

fn decode_sample(format: SampleFormat, buf: &[u8]) -> Complex32 {
    match format {
        SampleFormat::Cu8 => {
            let i = (buf[0] as f32 - 127.5) / 127.5;
            let q = (buf[1] as f32 - 127.5) / 127.5;
            Complex32::new(i, q)
        }
        SampleFormat::Cs16 => {
            let i = i16::from_le_bytes([buf[0], buf[1]]) as f32 / 32768.0;
            let q = i16::from_le_bytes([buf[2], buf[3]]) as f32 / 32768.0;
            Complex32::new(i, q)
        }
        SampleFormat::Cf32 => {
            let i = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
            let q = f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
            Complex32::new(i, q)
        }
    }
}

/// Reads `path` to completion, pushing `BLOCK_SAMPLES`-sized blocks into
/// `input`. The final partial block, if any, is discarded (too short for
/// the channelizer's fixed block size). Stops early once `shutdown` reaches
/// `Force`.
pub fn run_iq_file(
    path: &Path,
    format: SampleFormat,
    input: Queue<Vec<Complex32>>,
    shutdown: Arc<ShutdownState>,
) -> Result<()> {
    let file = File::open(path).wrap_err_with(|| format!("failed to open I/Q file: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let stride = octets_per_sample(format);
    let mut raw = vec![0u8; stride * BLOCK_SAMPLES];

    loop {
        if shutdown.level() == ExitLevel::Force {
            break;
        }
        let mut filled = 0;
        while filled < raw.len() {
            match reader.read(&mut raw[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) => return Err(e).wrap_err("error reading I/Q file"),
            }
        }
        if filled < raw.len() {
            break;
        }
        let block: Vec<Complex32> = raw.chunks_exact(stride).map(|c| decode_sample(format, c)).collect();
        if !input.send(block) {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cu8_midpoint_decodes_to_origin() {
        let sample = decode_sample(SampleFormat::Cu8, &[127, 128]);
        assert!(sample.re.abs() < 0.01);
        assert!((sample.im - (128.0 - 127.5) / 127.5).abs() < 1e-6);
    }

    #[test]
    fn cs16_full_scale_decodes_near_unity() {
        let bytes = i16::MAX.to_le_bytes();
        let sample = decode_sample(SampleFormat::Cs16, &[bytes[0], bytes[1], 0, 0]);
        assert!((sample.re - 0.99997).abs() < 1e-3);
        assert_eq!(sample.im, 0.0);
    }

    #[test]
    fn cf32_roundtrips_exactly() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-0.25f32).to_le_bytes());
        let sample = decode_sample(SampleFormat::Cf32, &bytes);
        assert_eq!(sample, Complex32::new(1.5, -0.25));
    }
}
