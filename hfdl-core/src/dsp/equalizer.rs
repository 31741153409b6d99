//! Decision-directed LMS equalizer.
//!
//! 15 complex taps, step size `mu = 0.1`. During `EQ_TRAIN` (§4.2c) the
//! reference symbol is the known training sequence; during `DATA_1`/`DATA_2`
//! the reference is the demodulator's hard decision on the equalized output
//! (decision-directed mode).

use num_complex::Complex32;
use std::collections::VecDeque;

pub const EQUALIZER_TAPS: usize = 15;
const MU: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct LmsEqualizer {
    taps: Vec<Complex32>,
    history: VecDeque<Complex32>,
    mu: f32,
}

impl LmsEqualizer {
    pub fn new(num_taps: usize, mu: f32) -> Self {
        let mut taps = vec![Complex32::new(0.0, 0.0); num_taps];
        // Centre tap initialized to unity: equalizer starts as a pass-through.
        taps[num_taps / 2] = Complex32::new(1.0, 0.0);
        Self {
            taps,
            history: VecDeque::from(vec![Complex32::new(0.0, 0.0); num_taps]),
            mu,
        }
    }

    pub fn default_for_hfdl() -> Self {
        Self::new(EQUALIZER_TAPS, MU)
    }

    pub fn reset(&mut self) {
        let n = self.taps.len();
        self.taps = vec![Complex32::new(0.0, 0.0); n];
        self.taps[n / 2] = Complex32::new(1.0, 0.0);
        for s in self.history.iter_mut() {
            *s = Complex32::new(0.0, 0.0);
        }
    }

    fn push(&mut self, symbol: Complex32) {
        self.history.pop_front();
        self.history.push_back(symbol);
    }

    fn output(&self) -> Complex32 {
        self.history
            .iter()
            .zip(self.taps.iter())
            .map(|(s, t)| *s * *t)
            .sum()
    }

    fn update(&mut self, error: Complex32) {
        for (tap, sample) in self.taps.iter_mut().zip(self.history.iter()) {
            *tap += self.mu * error * sample.conj();
        }
    }

    /// Feed one symbol in training mode, against a known reference symbol.
    /// Returns the equalized output.
    pub fn train(&mut self, symbol: Complex32, reference: Complex32) -> Complex32 {
        self.push(symbol);
        let out = self.output();
        let error = reference - out;
        self.update(error);
        out
    }

    /// Feed one symbol in decision-directed mode. `decide` maps the
    /// equalizer output to the nearest constellation point, which is then
    /// used as the error reference.
    pub fn equalize(&mut self, symbol: Complex32, decide: impl Fn(Complex32) -> Complex32) -> Complex32 {
        self.push(symbol);
        let out = self.output();
        let reference = decide(out);
        let error = reference - out;
        self.update(error);
        out
    }

    pub fn taps(&self) -> &[Complex32] {
        &self.taps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pass_through_identity_channel_converges() {
        let mut eq = LmsEqualizer::default_for_hfdl();
        let symbols = [
            Complex32::new(1.0, 1.0),
            Complex32::new(-1.0, 1.0),
            Complex32::new(-1.0, -1.0),
            Complex32::new(1.0, -1.0),
        ];
        let mut last_out = Complex32::new(0.0, 0.0);
        for _ in 0..200 {
            for &s in &symbols {
                last_out = eq.train(s, s);
            }
        }
        assert_relative_eq!(last_out.re, symbols[3].re, epsilon = 0.2);
        assert_relative_eq!(last_out.im, symbols[3].im, epsilon = 0.2);
    }

    #[test]
    fn reset_restores_centre_tap_identity() {
        let mut eq = LmsEqualizer::default_for_hfdl();
        eq.train(Complex32::new(1.0, 1.0), Complex32::new(2.0, 2.0));
        eq.reset();
        let centre = EQUALIZER_TAPS / 2;
        assert_relative_eq!(eq.taps()[centre].re, 1.0, epsilon = 1e-9);
        assert_relative_eq!(eq.taps()[centre].im, 0.0, epsilon = 1e-9);
    }
}
