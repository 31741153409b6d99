//! BPSK / QPSK / 8-PSK modem: symbol-to-constellation-point decisions and
//! bit (de)mapping. The link-parameter table (§4.2, M1/M2 selector) picks
//! one of these three arities per frame based on the negotiated modulation.

use num_complex::Complex32;
use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModArity {
    Bpsk,
    Qpsk,
    Psk8,
}

impl ModArity {
    pub fn bits_per_symbol(self) -> u32 {
        match self {
            ModArity::Bpsk => 1,
            ModArity::Qpsk => 2,
            ModArity::Psk8 => 3,
        }
    }

    pub fn points(self) -> usize {
        1 << self.bits_per_symbol()
    }

    /// Gray-coded constellation point for bit pattern `code` (0..points()).
    pub fn constellation_point(self, code: u32) -> Complex32 {
        let n = self.points() as u32;
        let gray = code ^ (code >> 1);
        let theta = TAU * gray as f32 / n as f32 + TAU / (2.0 * n as f32);
        Complex32::from_polar(1.0, theta)
    }

    /// Nearest constellation point to `symbol`, by phase angle.
    pub fn decide(self, symbol: Complex32) -> Complex32 {
        let code = self.demap(symbol);
        self.constellation_point(code)
    }

    /// Gray-coded bit pattern nearest to `symbol`'s phase.
    pub fn demap(self, symbol: Complex32) -> u32 {
        let n = self.points() as u32;
        let mut theta = symbol.arg();
        if theta < 0.0 {
            theta += TAU;
        }
        let sector = ((theta / TAU) * n as f32).round() as u32 % n;
        gray_decode(sector)
    }

    /// Expand `code` into its `bits_per_symbol()` MSB-first bits.
    pub fn bits_of(self, code: u32) -> Vec<u8> {
        let bps = self.bits_per_symbol();
        (0..bps)
            .rev()
            .map(|i| ((code >> i) & 1) as u8)
            .collect()
    }
}

fn gray_decode(mut gray: u32) -> u32 {
    let mut mask = gray >> 1;
    while mask != 0 {
        gray ^= mask;
        mask >>= 1;
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bpsk_has_two_points_one_bit() {
        assert_eq!(ModArity::Bpsk.points(), 2);
        assert_eq!(ModArity::Bpsk.bits_per_symbol(), 1);
    }

    #[test]
    fn qpsk_constellation_points_are_unit_magnitude() {
        for code in 0..4 {
            let p = ModArity::Qpsk.constellation_point(code);
            assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn demap_round_trips_through_constellation_point() {
        for arity in [ModArity::Bpsk, ModArity::Qpsk, ModArity::Psk8] {
            for code in 0..arity.points() as u32 {
                let p = arity.constellation_point(code);
                assert_eq!(arity.demap(p), code, "arity={arity:?} code={code}");
            }
        }
    }

    #[test]
    fn bits_of_is_msb_first() {
        assert_eq!(ModArity::Psk8.bits_of(0b101), vec![1, 0, 1]);
    }
}
