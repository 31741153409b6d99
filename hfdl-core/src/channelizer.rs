//! Overlap-save FFT channelizer (§4.1).
//!
//! Extracts one decimated, frequency-translated narrowband channel from a
//! wideband input stream. Fixed FFT size chosen so the pre-decimated rate
//! still leaves room for the channel filter's impulse response; overlap
//! length is `taps_length - 1`.

use crate::config::ChannelizerConfig;
use crate::errors::ChannelizerError;
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Phase-continuity state threaded across successive `process` calls so
/// block boundaries don't introduce a discontinuity in the frequency shift.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftState {
    pub startbin: usize,
    pub offsetbin: i64,
    pub v: f32,
}

pub struct Channelizer {
    fft_size: usize,
    overlap: usize,
    decimation: u32,
    shift_bins: i64,
    filter_fft: Vec<Complex32>,
    fft_fwd: Arc<dyn Fft<f32>>,
    fft_inv: Arc<dyn Fft<f32>>,
    history: Vec<Complex32>,
    state: ShiftState,
}

impl Channelizer {
    pub fn create(config: &ChannelizerConfig, taps: &[f32]) -> Result<Self, ChannelizerError> {
        config.validate_against_taps(taps.len())?;

        let decimated_rate = config.input_sample_rate_hz / config.pre_decimation.max(1);
        let overlap = taps.len() - 1;
        let fft_size = (decimated_rate as usize).next_power_of_two().max(taps.len() * 2);

        let mut planner = FftPlanner::<f32>::new();
        let fft_fwd = planner.plan_fft_forward(fft_size);
        let fft_inv = planner.plan_fft_inverse(fft_size);

        let mut filter_time = vec![Complex32::new(0.0, 0.0); fft_size];
        for (i, &t) in taps.iter().enumerate() {
            filter_time[i] = Complex32::new(t, 0.0);
        }
        let mut filter_fft = filter_time;
        fft_fwd.process(&mut filter_fft);

        let shift_bins = ((config.centerfreq_hz as f64 / decimated_rate as f64) * fft_size as f64).round() as i64;

        Ok(Self {
            fft_size,
            overlap,
            decimation: config.pre_decimation.max(1),
            shift_bins,
            filter_fft,
            fft_fwd,
            fft_inv,
            history: vec![Complex32::new(0.0, 0.0); overlap],
            state: ShiftState::default(),
        })
    }

    pub fn output_block_size(&self) -> usize {
        self.fft_size - self.overlap
    }

    pub fn shift_state(&self) -> ShiftState {
        self.state
    }

    /// Process one block of `output_block_size()` fresh input samples
    /// (pre-decimated already by the caller at `decimation`), returning a
    /// block of channelized, still-complex output samples.
    pub fn process(&mut self, input: &[Complex32]) -> Result<Vec<Complex32>, ChannelizerError> {
        let block = self.output_block_size();
        if input.len() != block {
            return Err(ChannelizerError::BlockSizeMismatch {
                expected: block,
                actual: input.len(),
            });
        }

        let mut buf = Vec::with_capacity(self.fft_size);
        buf.extend_from_slice(&self.history);
        buf.extend_from_slice(input);

        self.history.clear();
        self.history.extend_from_slice(&input[input.len() - self.overlap..]);

        self.apply_pre_shift(&mut buf);

        self.fft_fwd.process(&mut buf);
        for (x, h) in buf.iter_mut().zip(self.filter_fft.iter()) {
            *x *= *h;
        }
        self.fft_inv.process(&mut buf);

        let scale = 1.0 / self.fft_size as f32;
        let scraped: Vec<Complex32> = buf[self.overlap..]
            .iter()
            .map(|c| *c * scale)
            .collect();

        self.state.offsetbin = self.shift_bins;
        self.state.startbin = self.state.startbin.wrapping_add(scraped.len());

        Ok(scraped)
    }

    fn apply_pre_shift(&mut self, buf: &mut [Complex32]) {
        if self.shift_bins == 0 {
            return;
        }
        let n = self.fft_size as f32;
        for (i, x) in buf.iter_mut().enumerate() {
            let phase = -2.0 * PI * self.shift_bins as f32 * (i as f32 + self.state.v) / n;
            *x *= Complex32::from_polar(1.0, phase);
        }
        self.state.v += buf.len() as f32;
    }

    pub fn decimation(&self) -> u32 {
        self.decimation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::matched_filter::rrc_taps;

    fn test_config() -> ChannelizerConfig {
        ChannelizerConfig {
            input_sample_rate_hz: 192_000,
            pre_decimation: 10,
            transition_bw_hz: 250.0,
            centerfreq_hz: 0,
        }
    }

    #[test]
    fn create_rejects_undersized_fft() {
        let cfg = ChannelizerConfig {
            input_sample_rate_hz: 100,
            pre_decimation: 10,
            ..test_config()
        };
        let taps = rrc_taps(10, 0.6, 6);
        assert!(Channelizer::create(&cfg, &taps).is_err());
    }

    #[test]
    fn process_rejects_wrong_block_size() {
        let cfg = test_config();
        let taps = rrc_taps(10, 0.6, 6);
        let mut ch = Channelizer::create(&cfg, &taps).unwrap();
        let bad_block = vec![Complex32::new(0.0, 0.0); ch.output_block_size() + 1];
        assert!(ch.process(&bad_block).is_err());
    }

    #[test]
    fn process_preserves_block_length_on_success() {
        let cfg = test_config();
        let taps = rrc_taps(10, 0.6, 6);
        let mut ch = Channelizer::create(&cfg, &taps).unwrap();
        let block = vec![Complex32::new(1.0, 0.0); ch.output_block_size()];
        let out = ch.process(&block).unwrap();
        assert_eq!(out.len(), ch.output_block_size());
    }
}
