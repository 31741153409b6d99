//! Costas carrier phase/frequency recovery loop.
//!
//! Formulas and gains match the reference decoder exactly: `alpha = 0.10`,
//! `beta = 0.2 * alpha^2`, phase error clamped to `[-1, 1]` before being
//! applied, phase wrapped to `(-pi, pi]` after each step.

use num_complex::Complex32;
use std::f32::consts::PI;

#[derive(Debug, Clone)]
pub struct CostasLoop {
    alpha: f32,
    beta: f32,
    /// Current phase estimate, radians.
    phi: f32,
    /// Current frequency estimate (phase increment per symbol), radians.
    dphi: f32,
}

impl CostasLoop {
    pub fn new() -> Self {
        let alpha = 0.10;
        Self {
            alpha,
            beta: 0.2 * alpha * alpha,
            phi: 0.0,
            dphi: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.phi = 0.0;
        self.dphi = 0.0;
    }

    pub fn freq_offset(&self) -> f32 {
        self.dphi
    }

    /// Derotate `sample` by the current phase estimate.
    pub fn execute(&self, sample: Complex32) -> Complex32 {
        sample * Complex32::from_polar(1.0, -self.phi)
    }

    /// Feed a phase-error estimate back into the loop. `err` is clamped to
    /// `[-1, 1]` before being applied to phase and frequency.
    pub fn adjust(&mut self, err: f32) {
        let err = err.clamp(-1.0, 1.0);
        self.phi += self.alpha * err;
        self.dphi += self.beta * err;
    }

    /// Advance the free-running phase by the current frequency estimate and
    /// wrap to `(-pi, pi]`.
    pub fn step(&mut self) {
        self.phi += self.dphi;
        self.wrap_phase();
    }

    fn wrap_phase(&mut self) {
        while self.phi > PI {
            self.phi -= 2.0 * PI;
        }
        while self.phi <= -PI {
            self.phi += 2.0 * PI;
        }
    }
}

impl Default for CostasLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gains_match_reference_formula() {
        let costas = CostasLoop::new();
        assert_relative_eq!(costas.alpha, 0.10, epsilon = 1e-9);
        assert_relative_eq!(costas.beta, 0.2 * 0.10 * 0.10, epsilon = 1e-9);
    }

    #[test]
    fn phase_wraps_to_half_open_interval() {
        let mut costas = CostasLoop::new();
        costas.phi = PI - 0.01;
        costas.dphi = 0.5;
        costas.step();
        assert!(costas.phi > -PI && costas.phi <= PI);
    }

    #[test]
    fn adjust_clamps_error_to_unit_range() {
        let mut a = CostasLoop::new();
        let mut b = CostasLoop::new();
        a.adjust(5.0);
        b.adjust(1.0);
        assert_relative_eq!(a.phi, b.phi, epsilon = 1e-9);
        assert_relative_eq!(a.dphi, b.dphi, epsilon = 1e-9);
    }

    #[test]
    fn execute_derotates_by_negative_phase() {
        let mut costas = CostasLoop::new();
        costas.phi = PI / 2.0;
        let rotated = costas.execute(Complex32::new(1.0, 0.0));
        assert_relative_eq!(rotated.re, 0.0, epsilon = 1e-5);
        assert_relative_eq!(rotated.im, -1.0, epsilon = 1e-5);
    }
}
