//! Symbol-timing recovery.
//!
//! A Gardner-style early-late timing error detector running at `SPS` samples
//! per symbol. Tracks a fractional timing phase and emits exactly one symbol
//! per nominal symbol period, occasionally emitting zero or two symbols when
//! the phase accumulator under/overflows a sample boundary (the sampler-side
//! EMIT_SYMBOLS/SKIP distinction in the channel worker, §4.2).

use crate::config::SPS;
use num_complex::Complex32;

#[derive(Debug, Clone)]
pub struct SymbolSync {
    sps: f32,
    /// Fractional sample phase within the current symbol period, `[0, sps)`.
    phase: f32,
    gain: f32,
    prev_sample: Complex32,
    mid_sample: Complex32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No symbol boundary crossed this sample.
    Pending,
    /// A symbol was emitted.
    Symbol,
}

impl SymbolSync {
    pub fn new(sps: usize, gain: f32) -> Self {
        Self {
            sps: sps as f32,
            phase: 0.0,
            gain,
            prev_sample: Complex32::new(0.0, 0.0),
            mid_sample: Complex32::new(0.0, 0.0),
        }
    }

    pub fn default_for_hfdl() -> Self {
        Self::new(SPS, 0.05)
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.prev_sample = Complex32::new(0.0, 0.0);
        self.mid_sample = Complex32::new(0.0, 0.0);
    }

    /// Advance by one input sample. Returns `Symbol` (with the sampled
    /// value) on the sample closest to the recovered symbol center.
    pub fn step(&mut self, sample: Complex32) -> (SyncOutcome, Complex32) {
        self.phase += 1.0;
        if self.phase >= self.sps / 2.0 && self.phase < self.sps / 2.0 + 1.0 {
            self.mid_sample = sample;
        }
        if self.phase >= self.sps {
            self.phase -= self.sps;
            let error = gardner_error(self.prev_sample, self.mid_sample, sample);
            self.phase += self.gain * error;
            self.prev_sample = sample;
            (SyncOutcome::Symbol, sample)
        } else {
            (SyncOutcome::Pending, sample)
        }
    }
}

fn gardner_error(early: Complex32, mid: Complex32, late: Complex32) -> f32 {
    (late.re - early.re) * mid.re + (late.im - early.im) * mid.im
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_roughly_one_symbol_per_sps_samples() {
        let mut sync = SymbolSync::default_for_hfdl();
        let mut symbol_count = 0;
        for i in 0..1000 {
            let t = i as f32 * 0.1;
            let sample = Complex32::new(t.sin(), t.cos());
            if sync.step(sample).0 == SyncOutcome::Symbol {
                symbol_count += 1;
            }
        }
        let expected = 1000 / SPS;
        let diff = (symbol_count as isize - expected as isize).abs();
        assert!(diff <= 2, "symbol_count = {symbol_count}, expected ~{expected}");
    }

    #[test]
    fn reset_clears_phase_accumulator() {
        let mut sync = SymbolSync::default_for_hfdl();
        for _ in 0..7 {
            sync.step(Complex32::new(1.0, 0.0));
        }
        sync.reset();
        assert_eq!(sync.phase, 0.0);
    }
}
