//! DSP primitives feeding the channel worker's per-sample inner loop (§4.2):
//! AGC, Costas carrier recovery, matched filter, symbol-timing sync, and the
//! LMS equalizer, plus the BPSK/QPSK/8PSK modem used throughout.

pub mod agc;
pub mod costas;
pub mod equalizer;
pub mod matched_filter;
pub mod modem;
pub mod symbol_sync;

pub use agc::Agc;
pub use costas::CostasLoop;
pub use equalizer::LmsEqualizer;
pub use matched_filter::MatchedFilter;
pub use modem::ModArity;
pub use symbol_sync::SymbolSync;
