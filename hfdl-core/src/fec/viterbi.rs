//! K=7, rate-1/2 convolutional (Viterbi) decoder (§4.3).
//!
//! Polynomials `V27POLYA = 0x6D`, `V27POLYB = 0x4F`. Soft input bits are hard
//! decisions represented as `0` or `255`; for rate-1/4 (300 bps) bursts each
//! chip is transmitted twice and the caller is expected to have already
//! dropped every other deinterleaved chip before calling [`decode`]. Output
//! bytes are bit-reversed before being handed to the next stage.

use crate::errors::FecError;

pub const CONSTRAINT_LENGTH: u32 = 7;
pub const NUM_STATES: usize = 1 << (CONSTRAINT_LENGTH - 1);
pub const V27POLYA: u8 = 0x6D;
pub const V27POLYB: u8 = 0x4F;

fn parity(mut x: u32) -> u8 {
    let mut p = 0u8;
    while x != 0 {
        p ^= 1;
        x &= x - 1;
    }
    p
}

fn branch_output(state: usize, input_bit: u8) -> (u8, u8) {
    let reg = ((input_bit as u32) << (CONSTRAINT_LENGTH - 1)) | state as u32;
    let a = parity(reg & V27POLYA as u32);
    let b = parity(reg & V27POLYB as u32);
    (a, b)
}

#[derive(Clone, Copy)]
struct PathMetric {
    cost: u32,
    prev_state: usize,
    input_bit: u8,
}

/// Decode `soft_bits` (pairs of `0`/`255` values, length must be even) back
/// into the original bit stream using the Viterbi algorithm with Hamming
/// distance as the branch metric, then bit-reverses each output byte.
pub fn decode(soft_bits: &[u8]) -> Result<Vec<u8>, FecError> {
    if soft_bits.len() % 2 != 0 {
        return Err(FecError::ViterbiInputMisaligned {
            len: soft_bits.len(),
            step: 2,
        });
    }
    let num_symbols = soft_bits.len() / 2;
    if num_symbols == 0 {
        return Ok(Vec::new());
    }

    let mut metrics = vec![u32::MAX; NUM_STATES];
    metrics[0] = 0;
    let mut history: Vec<[PathMetric; NUM_STATES]> = Vec::with_capacity(num_symbols);

    for sym in 0..num_symbols {
        let rx_a = soft_bits[2 * sym];
        let rx_b = soft_bits[2 * sym + 1];
        let rx_a_bit = (rx_a >= 128) as u8;
        let rx_b_bit = (rx_b >= 128) as u8;

        let mut next_metrics = vec![u32::MAX; NUM_STATES];
        let mut step = [PathMetric {
            cost: u32::MAX,
            prev_state: 0,
            input_bit: 0,
        }; NUM_STATES];

        for state in 0..NUM_STATES {
            if metrics[state] == u32::MAX {
                continue;
            }
            for input_bit in 0..2u8 {
                let (out_a, out_b) = branch_output(state, input_bit);
                let branch_metric =
                    (out_a != rx_a_bit) as u32 + (out_b != rx_b_bit) as u32;
                let next_state = ((state as u32) >> 1 | ((input_bit as u32) << (CONSTRAINT_LENGTH - 2)))
                    as usize;
                let cost = metrics[state] + branch_metric;
                if cost < next_metrics[next_state] {
                    next_metrics[next_state] = cost;
                    step[next_state] = PathMetric {
                        cost,
                        prev_state: state,
                        input_bit,
                    };
                }
            }
        }
        metrics = next_metrics;
        history.push(step);
    }

    let mut best_state = (0..NUM_STATES)
        .min_by_key(|&s| metrics[s])
        .unwrap_or(0);

    let mut bits = vec![0u8; num_symbols];
    for sym in (0..num_symbols).rev() {
        let step = history[sym][best_state];
        bits[sym] = step.input_bit;
        best_state = step.prev_state;
    }

    Ok(pack_msb_first(&bits))
}

fn pack_msb_first(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            let mut byte = 0u8;
            for (i, &b) in chunk.iter().enumerate() {
                byte |= b << (7 - i);
            }
            byte
        })
        .collect()
}

/// Reverse the bit order within each byte. The reference decoder's raw
/// Viterbi output is bit-reversed relative to the transmitted octet stream;
/// the burst pipeline applies this once when assembling a `pdu` buffer from
/// [`decode`]'s output.
pub fn bit_reverse_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|&b| b.reverse_bits()).collect()
}

/// Convolutionally encode `bytes` (MSB-first per octet) at rate 1/2,
/// producing interleaved soft-bit pairs (`0`/`255`). Used by round-trip
/// tests and the synthetic burst generator.
pub fn encode(bytes: &[u8]) -> Vec<u8> {
    let mut state = 0usize;
    let mut out = Vec::with_capacity(bytes.len() * 16);
    for &byte in bytes {
        for i in (0..8).rev() {
            let input_bit = (byte >> i) & 1;
            let (a, b) = branch_output(state, input_bit);
            out.push(if a != 0 { 255 } else { 0 });
            out.push(if b != 0 { 255 } else { 0 });
            state = ((state as u32) >> 1 | ((input_bit as u32) << (CONSTRAINT_LENGTH - 2))) as usize;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_is_identity_without_noise() {
        let original = b"HFDL test payload bytes";
        let encoded = encode(original);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(&decoded[..original.len()], original);
    }

    #[test]
    fn odd_length_input_is_rejected() {
        assert!(decode(&[0, 255, 0]).is_err());
    }

    #[test]
    fn empty_input_decodes_to_empty_output() {
        assert_eq!(decode(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn bit_reversal_is_its_own_inverse() {
        let original = vec![0b1001_0110u8, 0x00, 0xFF];
        let reversed = bit_reverse_bytes(&original);
        assert_ne!(reversed, original);
        assert_eq!(bit_reverse_bytes(&reversed), original);
    }
}
