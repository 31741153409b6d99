//! Per-channel burst acquisition, demodulation and framing state machine
//! (§4.2). One instance per tuned frequency; owned exclusively by its
//! worker thread.

use crate::channel_worker::tables::{
    correlate, m1_table, m2_table, preamble_a, train_seq, FrameParams, FRAME_PARAM_TABLE,
    NUM_FRAME_PARAMS, PREAMBLE_LEN, TRAIN_LEN,
};
use crate::config::ChannelWorkerConfig;
use crate::dsp::{Agc, CostasLoop, LmsEqualizer, MatchedFilter, ModArity, SymbolSync};
use crate::dsp::symbol_sync::SyncOutcome;
use crate::fec::{viterbi_decode, Deinterleaver, Descrambler};
use crate::pipeline::burst::{BurstMetadata, BurstRecord, SlotType};
use num_complex::Complex32;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    EmitBits,
    EmitSymbols,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framer {
    A1Search,
    A2Search,
    M1Search,
    M2Skip,
    EqTrain,
    Data1,
    Data2,
}

/// Exponential moving average, used for EVM tracking (`tau ~= 0.02`).
struct Ema {
    value: f32,
    alpha: f32,
}

impl Ema {
    fn new(alpha: f32) -> Self {
        Self { value: 0.0, alpha }
    }

    fn update(&mut self, sample: f32) -> f32 {
        self.value += self.alpha * (sample - self.value);
        self.value
    }
}

pub struct ChannelWorkerState {
    config: ChannelWorkerConfig,

    agc: Agc,
    matched_filter: MatchedFilter,
    symbol_sync: SymbolSync,
    costas: CostasLoop,
    equalizer: LmsEqualizer,

    preamble: Vec<u8>,
    m1: [Vec<u8>; NUM_FRAME_PARAMS],
    /// Indexed by the same link-parameter selector as `m1`. `M2_SKIP`
    /// keeps the sampler in `Skip` (§4.2), so no bits are collected to
    /// correlate against it; kept for the index chosen in `M1_SEARCH`.
    m2: [Vec<u8>; NUM_FRAME_PARAMS],

    bits: VecDeque<u8>,
    training_symbols: Vec<Complex32>,
    data_symbols: Vec<Complex32>,

    sampler: Sampler,
    framer: Framer,
    symbols_wanted: usize,
    bitmask: u8,
    current_mod_arity: ModArity,
    data_mod_arity: ModArity,
    frame_params: Option<FrameParams>,
    frame_param_idx: Option<usize>,
    search_retries: u8,
    eq_train_seq_cnt: u8,
    t_idx: usize,
    data_segments_remaining: u16,
    training_bit_errors: u64,
    training_bits_checked: u64,

    evm: Ema,
    last_freq_err_hz: f32,
    sample_rate_hz: f32,
}

impl ChannelWorkerState {
    pub fn new(config: ChannelWorkerConfig) -> Self {
        let sample_rate_hz = config.post_decimation_sample_rate_hz as f32;
        Self {
            agc: Agc::default(),
            matched_filter: MatchedFilter::default_for_hfdl(),
            symbol_sync: SymbolSync::default_for_hfdl(),
            costas: CostasLoop::new(),
            equalizer: LmsEqualizer::default_for_hfdl(),
            preamble: preamble_a(),
            m1: m1_table(),
            m2: m2_table(),
            bits: VecDeque::from(vec![0u8; PREAMBLE_LEN]),
            training_symbols: Vec::with_capacity(TRAIN_LEN),
            data_symbols: Vec::new(),
            sampler: Sampler::EmitBits,
            framer: Framer::A1Search,
            symbols_wanted: PREAMBLE_LEN,
            bitmask: 0,
            current_mod_arity: ModArity::Bpsk,
            data_mod_arity: ModArity::Bpsk,
            frame_params: None,
            frame_param_idx: None,
            search_retries: 0,
            eq_train_seq_cnt: 0,
            t_idx: 0,
            data_segments_remaining: 0,
            training_bit_errors: 0,
            training_bits_checked: 0,
            evm: Ema::new(0.02),
            last_freq_err_hz: 0.0,
            sample_rate_hz,
            config,
        }
    }

    pub fn channel_freq_khz(&self) -> u32 {
        self.config.channel.frequency_khz
    }

    /// The `M2` sequence for the link-parameter index `M1_SEARCH` matched,
    /// if any. `M2_SKIP` runs with the sampler in `Skip` (§4.2), so there
    /// are no collected bits to correlate this against; it is exposed for
    /// diagnostics and tests rather than consulted by the framer itself.
    fn expected_m2(&self) -> Option<&[u8]> {
        self.frame_param_idx.map(|idx| self.m2[idx].as_slice())
    }

    /// Full reset to `(EMIT_BITS, A1_SEARCH)` with DSP feedback unlocked
    /// (§4.2 "on any reset").
    pub fn reset(&mut self) {
        self.agc.unlock();
        self.agc.reset();
        self.equalizer.reset();
        self.symbol_sync.reset();
        self.costas.reset();
        self.bits = VecDeque::from(vec![0u8; PREAMBLE_LEN]);
        self.training_symbols.clear();
        self.data_symbols.clear();
        self.sampler = Sampler::EmitBits;
        self.framer = Framer::A1Search;
        self.symbols_wanted = PREAMBLE_LEN;
        self.bitmask = 0;
        self.current_mod_arity = ModArity::Bpsk;
        self.data_mod_arity = ModArity::Bpsk;
        self.frame_params = None;
        self.frame_param_idx = None;
        self.search_retries = 0;
        self.eq_train_seq_cnt = 0;
        self.t_idx = 0;
        self.data_segments_remaining = 0;
    }

    /// Costas delay-compensation rule (§4.2): the equalizer introduces one
    /// symbol of group delay, so Costas tracks the modulation the framer
    /// will be in one symbol from now.
    fn costas_mod_arity(&self) -> ModArity {
        let about_to_enter_data1 =
            self.framer == Framer::EqTrain && self.eq_train_seq_cnt == 1;
        if about_to_enter_data1 || self.framer == Framer::Data1 {
            self.data_mod_arity
        } else {
            ModArity::Bpsk
        }
    }

    fn push_bit(&mut self, bit: u8) {
        self.bits.pop_front();
        self.bits.push_back(bit ^ self.bitmask);
    }

    /// Feed one resampled complex sample through the AGC / matched-filter /
    /// symbol-sync chain, processing every symbol the sync stage emits.
    /// Returns a completed burst, if this sample caused one.
    pub fn process_sample(&mut self, sample: Complex32) -> Option<BurstRecord> {
        let agc_out = self.agc.process(sample);
        let filtered = self.matched_filter.process(agc_out);
        let (outcome, symbol) = self.symbol_sync.step(filtered);
        if outcome != SyncOutcome::Symbol {
            return None;
        }
        self.process_symbol(symbol)
    }

    fn process_symbol(&mut self, symbol: Complex32) -> Option<BurstRecord> {
        let arity = self.costas_mod_arity();
        let rotated = self.costas.execute(symbol);
        let code = arity.demap(rotated);
        let ideal = arity.constellation_point(code);
        let phase_err = (rotated * ideal.conj()).arg();
        self.costas.adjust(phase_err);
        self.costas.step();
        self.last_freq_err_hz =
            self.costas.freq_offset() * self.sample_rate_hz / (2.0 * std::f32::consts::PI);

        let reference = if self.framer == Framer::EqTrain {
            let polarity = train_seq(self.bitmask != 0)[self.t_idx % TRAIN_LEN];
            Complex32::new(polarity as f32, 0.0)
        } else {
            ideal
        };
        let equalized = if self.framer == Framer::EqTrain {
            self.equalizer.train(rotated, reference)
        } else {
            self.equalizer.equalize(rotated, |s| self.current_mod_arity.decide(s))
        };

        let evm_code = self.current_mod_arity.demap(equalized);
        let evm_ideal = self.current_mod_arity.constellation_point(evm_code);
        self.evm.update((equalized - evm_ideal).norm());

        match self.sampler {
            Sampler::EmitBits => {
                for b in arity.bits_of(code) {
                    self.push_bit(b);
                }
            }
            Sampler::EmitSymbols => {
                if self.framer == Framer::EqTrain {
                    self.training_symbols.push(equalized);
                } else {
                    self.data_symbols.push(equalized);
                }
            }
            Sampler::Skip => {}
        }

        if self.symbols_wanted > 1 {
            self.symbols_wanted -= 1;
            if self.framer == Framer::EqTrain {
                self.t_idx += 1;
            }
            return None;
        }

        self.advance_framer()
    }

    fn arm(&mut self, sampler: Sampler, framer: Framer, symbols: usize) {
        self.sampler = sampler;
        self.framer = framer;
        self.symbols_wanted = symbols;
    }

    fn advance_framer(&mut self) -> Option<BurstRecord> {
        match self.framer {
            Framer::A1Search => {
                let corr = correlate(&self.preamble, &self.contiguous_bits());
                if corr.abs() > self.config.correlation_threshold {
                    self.bitmask = if corr < 0.0 { 0xFF } else { 0x00 };
                    self.agc.lock();
                    self.arm(Sampler::EmitBits, Framer::A2Search, PREAMBLE_LEN);
                } else {
                    self.symbols_wanted = 1;
                }
                None
            }
            Framer::A2Search => {
                let corr = correlate(&self.preamble, &self.contiguous_bits());
                if corr.abs() > self.config.correlation_threshold {
                    self.search_retries = 0;
                    self.arm(Sampler::EmitBits, Framer::M1Search, PREAMBLE_LEN);
                } else {
                    self.search_retries += 1;
                    if self.search_retries >= self.config.max_search_retries {
                        self.reset();
                    } else {
                        self.arm(Sampler::EmitBits, Framer::A1Search, PREAMBLE_LEN);
                    }
                }
                None
            }
            Framer::M1Search => {
                let bits = self.contiguous_bits();
                let (idx, corr) = (0..NUM_FRAME_PARAMS)
                    .map(|k| (k, correlate(&self.m1[k], &bits)))
                    .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
                    .expect("frame-param table is non-empty");
                if corr.abs() > self.config.correlation_threshold {
                    let params = FRAME_PARAM_TABLE[idx];
                    self.frame_params = Some(params);
                    self.frame_param_idx = Some(idx);
                    self.data_mod_arity = params.modulation;
                    self.data_segments_remaining = params.data_segment_count / 30;
                    self.arm(Sampler::Skip, Framer::M2Skip, TRAIN_LEN);
                } else {
                    self.reset();
                }
                None
            }
            Framer::M2Skip => {
                debug_assert_eq!(self.expected_m2().map(<[u8]>::len), Some(TRAIN_LEN));
                self.training_symbols.clear();
                self.t_idx = 0;
                self.eq_train_seq_cnt = 9;
                self.arm(Sampler::EmitSymbols, Framer::EqTrain, TRAIN_LEN);
                None
            }
            Framer::EqTrain => {
                self.score_training_mini_slot();
                if self.eq_train_seq_cnt > 1 {
                    self.eq_train_seq_cnt -= 1;
                    self.training_symbols.clear();
                    self.t_idx = 0;
                    self.arm(Sampler::EmitSymbols, Framer::EqTrain, TRAIN_LEN);
                    None
                } else if self.data_segments_remaining > 0 {
                    self.current_mod_arity = self.data_mod_arity;
                    self.arm(Sampler::EmitSymbols, Framer::Data1, 15);
                    None
                } else {
                    let burst = self.finish_burst();
                    self.reset();
                    burst
                }
            }
            Framer::Data1 => {
                self.arm(Sampler::EmitSymbols, Framer::Data2, 15);
                None
            }
            Framer::Data2 => {
                self.data_segments_remaining = self.data_segments_remaining.saturating_sub(1);
                self.current_mod_arity = ModArity::Bpsk;
                self.eq_train_seq_cnt = 1;
                self.training_symbols.clear();
                self.t_idx = 0;
                self.arm(Sampler::EmitSymbols, Framer::EqTrain, TRAIN_LEN);
                None
            }
        }
    }

    fn contiguous_bits(&self) -> Vec<u8> {
        self.bits.iter().copied().collect()
    }

    fn score_training_mini_slot(&mut self) {
        let expected = train_seq(self.bitmask != 0);
        for (i, &symbol) in self.training_symbols.iter().enumerate() {
            let bit = ModArity::Bpsk.demap(symbol) as u8;
            let expected_bit = if expected[i % TRAIN_LEN] > 0 { 1 } else { 0 };
            self.training_bits_checked += 1;
            if bit != expected_bit {
                self.training_bit_errors += 1;
            }
        }
    }

    /// Run the FEC chain over accumulated data symbols (§4.3) and assemble
    /// the burst record.
    fn finish_burst(&mut self) -> Option<BurstRecord> {
        let params = self.frame_params?;
        let mod_arity = self.data_mod_arity;
        let bits_per_symbol = mod_arity.bits_per_symbol() as usize;

        let mut descrambler = Descrambler::new();
        let chips: Vec<u8> = self
            .data_symbols
            .iter()
            .flat_map(|&s| mod_arity.bits_of(mod_arity.demap(s)))
            .map(|bit| bit ^ descrambler.next_chip())
            .collect();

        let cols = (chips.len() / 40).max(1);
        let mut interleaver = Deinterleaver::new(cols, params.push_column_shift);
        for &chip in &chips {
            if interleaver.push(chip).is_err() {
                break;
            }
        }
        let mut deinterleaved = interleaver.drain_all();

        if params.code_rate_quarter {
            deinterleaved = deinterleaved.into_iter().step_by(2).collect();
        }

        let soft_bits: Vec<u8> = deinterleaved
            .iter()
            .map(|&bit| if bit != 0 { 255 } else { 0 })
            .collect();
        let decoded = viterbi_decode(&soft_bits).ok()?;
        let pdu = crate::fec::viterbi::bit_reverse_bytes(&decoded);

        let slot = if params.data_segment_count > 72 {
            SlotType::Double
        } else {
            SlotType::Single
        };
        let bit_rate_bps = (1800 * bits_per_symbol) as u32
            / if params.code_rate_quarter { 4 } else { 2 };

        Some(BurstRecord {
            metadata: BurstMetadata {
                rx_timestamp_secs: 0,
                rx_timestamp_usecs: 0,
                channel_freq_khz: self.channel_freq_khz(),
                bit_rate_bps,
                slot,
                freq_err_hz: self.last_freq_err_hz,
                sig_level_db: 0.0,
                noise_level_db: 0.0,
            },
            pdu,
            flags: crate::pipeline::burst::BurstFlags::NONE,
        })
    }

    pub fn training_ber(&self) -> f64 {
        if self.training_bits_checked == 0 {
            0.0
        } else {
            self.training_bit_errors as f64 / self.training_bits_checked as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> ChannelWorkerState {
        ChannelWorkerState::new(ChannelWorkerConfig {
            channel: crate::config::ChannelSpec {
                frequency_khz: 13_257,
            },
            ..Default::default()
        })
    }

    #[test]
    fn starts_in_emit_bits_a1_search() {
        let w = worker();
        assert_eq!(w.sampler, Sampler::EmitBits);
        assert_eq!(w.framer, Framer::A1Search);
        assert_eq!(w.symbols_wanted, PREAMBLE_LEN);
    }

    #[test]
    fn reset_restores_initial_state_and_unlocks_agc() {
        let mut w = worker();
        w.agc.lock();
        w.framer = Framer::Data1;
        w.reset();
        assert_eq!(w.framer, Framer::A1Search);
        assert!(!w.agc.is_locked());
    }

    #[test]
    fn costas_tracks_data_arity_only_at_the_documented_transition_points() {
        let mut w = worker();
        w.data_mod_arity = ModArity::Qpsk;

        w.framer = Framer::Data1;
        assert_eq!(w.costas_mod_arity(), ModArity::Qpsk);

        w.framer = Framer::EqTrain;
        w.eq_train_seq_cnt = 1;
        assert_eq!(w.costas_mod_arity(), ModArity::Qpsk);

        w.eq_train_seq_cnt = 2;
        assert_eq!(w.costas_mod_arity(), ModArity::Bpsk);

        w.framer = Framer::Data2;
        assert_eq!(w.costas_mod_arity(), ModArity::Bpsk);
    }

    #[test]
    fn expected_m2_tracks_the_matched_frame_param_index() {
        let mut w = worker();
        assert!(w.expected_m2().is_none());
        w.frame_param_idx = Some(3);
        assert_eq!(w.expected_m2(), Some(w.m2[3].as_slice()));
        w.reset();
        assert!(w.expected_m2().is_none());
    }

    #[test]
    fn feeding_silence_never_locks_onto_a_false_preamble() {
        let mut w = worker();
        for _ in 0..(PREAMBLE_LEN * 4) {
            assert!(w.process_sample(Complex32::new(0.0, 0.0)).is_none());
        }
        assert_eq!(w.framer, Framer::A1Search);
    }
}
