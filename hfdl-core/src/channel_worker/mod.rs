//! Per-channel burst acquisition, demodulation, and framing (§4.2).

pub mod state;
pub mod tables;

pub use state::{ChannelWorkerState, Framer, Sampler};
