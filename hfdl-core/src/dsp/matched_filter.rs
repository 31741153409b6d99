//! Matched (root-raised-cosine) FIR filter applied after AGC, before
//! symbol-timing sync. Sized for `SPS = 10` samples/symbol and a 6-symbol
//! span, giving 61 taps.
//!
//! RRC coefficient derivation follows the same closed-form construction as
//! the modulation-side pulse shaper, just evaluated at the HFDL symbol rate
//! and samples-per-symbol instead of an audio carrier's.

use crate::config::SPS;
use num_complex::Complex32;
use std::collections::VecDeque;
use std::f64::consts::PI;

pub const MATCHED_FILTER_TAPS: usize = 6 * SPS + 1;
const ROLLOFF: f64 = 0.6;

pub fn rrc_taps(sps: usize, rolloff: f64, span_symbols: usize) -> Vec<f32> {
    let len = span_symbols * sps + 1;
    let mut h = vec![0.0f64; len];
    let ts = sps as f64;
    for (i, h_i) in h.iter_mut().enumerate() {
        let t = i as f64 - (len / 2) as f64;
        let t_norm = t / ts;
        *h_i = if t_norm.abs() < 1e-10 {
            1.0 - rolloff + 4.0 * rolloff / PI
        } else if (t_norm.abs() - 1.0 / (4.0 * rolloff)).abs() < 1e-6 {
            let sqrt2 = std::f64::consts::SQRT_2;
            (rolloff / sqrt2)
                * ((1.0 + 2.0 / PI) * (PI / 4.0).sin() + (1.0 - 2.0 / PI) * (PI / 4.0).cos())
        } else {
            let pi_t = PI * t_norm;
            let four_alpha_t = 4.0 * rolloff * t_norm;
            let numerator = (pi_t * rolloff).cos() + (pi_t).sin() / four_alpha_t;
            let denominator = pi_t * (1.0 - four_alpha_t * four_alpha_t);
            if denominator.abs() > 1e-10 {
                numerator / denominator
            } else {
                0.0
            }
        };
    }
    let energy: f64 = h.iter().map(|x| x * x).sum();
    let scale = if energy > 1e-12 { 1.0 / energy.sqrt() } else { 1.0 };
    h.into_iter().map(|x| (x * scale) as f32).collect()
}

#[derive(Debug, Clone)]
pub struct MatchedFilter {
    taps: Vec<f32>,
    history: VecDeque<Complex32>,
}

impl MatchedFilter {
    pub fn new(taps: Vec<f32>) -> Self {
        let len = taps.len();
        Self {
            taps,
            history: VecDeque::from(vec![Complex32::new(0.0, 0.0); len]),
        }
    }

    pub fn default_for_hfdl() -> Self {
        Self::new(rrc_taps(SPS, ROLLOFF, 6))
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    pub fn reset(&mut self) {
        for s in self.history.iter_mut() {
            *s = Complex32::new(0.0, 0.0);
        }
    }

    pub fn process(&mut self, sample: Complex32) -> Complex32 {
        self.history.pop_front();
        self.history.push_back(sample);
        self.history
            .iter()
            .zip(self.taps.iter())
            .map(|(s, t)| *s * *t)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_has_61_taps() {
        let mf = MatchedFilter::default_for_hfdl();
        assert_eq!(mf.taps().len(), MATCHED_FILTER_TAPS);
    }

    #[test]
    fn filter_is_linear_and_stable_on_impulse() {
        let mut mf = MatchedFilter::default_for_hfdl();
        let mut energy = 0.0f32;
        for i in 0..(MATCHED_FILTER_TAPS * 2) {
            let input = if i == 0 {
                Complex32::new(1.0, 0.0)
            } else {
                Complex32::new(0.0, 0.0)
            };
            energy += mf.process(input).norm_sqr();
        }
        assert!(energy.is_finite());
        assert!(energy > 0.0);
    }
}
