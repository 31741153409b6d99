//! HFDL core library.
//!
//! Burst acquisition/demodulation/framing, FEC, and layered PDU decoding
//! (SPDU/MPDU/LPDU/HFNPDU/ACARS) for a High-Frequency Data Link receiver.
//! Modules mirror the stages of the pipeline: a shared FFT channelizer
//! feeds per-channel workers that run a DSP chain and burst framer state
//! machine; completed bursts are FEC-decoded and handed to the PDU decoder.

pub mod cache;
pub mod channel_worker;
pub mod channelizer;
pub mod config;
pub mod dsp;
pub mod errors;
pub mod fec;
pub mod logging;
pub mod output;
pub mod pdu;
pub mod pipeline;
pub mod systable;

pub use config::{ChannelSpec, ChannelWorkerConfig, ChannelizerConfig};
pub use errors::{HfdlError, Result};
