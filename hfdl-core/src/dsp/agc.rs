//! Automatic gain control.
//!
//! A simple feedback AGC: tracks a running estimate of signal magnitude and
//! scales samples toward a target amplitude. Can be "locked" once the framer
//! has confirmed preamble acquisition (§4.2 A1_SEARCH), after which the gain
//! stops adapting so the Costas/equalizer chain sees a stable amplitude.

use num_complex::Complex32;

#[derive(Debug, Clone)]
pub struct Agc {
    target_amplitude: f32,
    attack_rate: f32,
    decay_rate: f32,
    gain: f32,
    locked: bool,
}

impl Agc {
    pub fn new(target_amplitude: f32, attack_rate: f32, decay_rate: f32) -> Self {
        Self {
            target_amplitude,
            attack_rate,
            decay_rate,
            gain: 1.0,
            locked: false,
        }
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
        self.locked = false;
    }

    pub fn process(&mut self, sample: Complex32) -> Complex32 {
        let out = sample * self.gain;
        if !self.locked {
            let mag = out.norm();
            if mag > 1e-9 {
                let error = self.target_amplitude - mag;
                let rate = if error > 0.0 {
                    self.attack_rate
                } else {
                    self.decay_rate
                };
                self.gain += rate * error * self.gain / mag;
                self.gain = self.gain.clamp(1e-3, 1e3);
            }
        }
        out
    }
}

impl Default for Agc {
    fn default() -> Self {
        Self::new(1.0, 0.01, 0.01)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_toward_target_amplitude() {
        let mut agc = Agc::new(1.0, 0.05, 0.05);
        let mut last_mag = 0.0;
        for _ in 0..500 {
            last_mag = agc.process(Complex32::new(0.1, 0.0)).norm();
        }
        assert!((last_mag - 1.0).abs() < 0.05, "last_mag = {last_mag}");
    }

    #[test]
    fn locked_agc_does_not_adapt() {
        let mut agc = Agc::new(1.0, 0.5, 0.5);
        agc.process(Complex32::new(0.1, 0.0));
        agc.lock();
        let gain_before = agc.gain;
        agc.process(Complex32::new(5.0, 0.0));
        assert_eq!(agc.gain, gain_before);
    }
}
