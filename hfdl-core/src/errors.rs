//! HFDL error types with granular categories

use thiserror::Error;

/// Top-level error type for all hfdl-core operations
#[derive(Debug, Error)]
pub enum HfdlError {
    #[error("channelizer error: {0}")]
    Channelizer(#[from] ChannelizerError),

    #[error("framer error: {0}")]
    Framer(#[from] FramerError),

    #[error("FEC error: {0}")]
    Fec(#[from] FecError),

    #[error("PDU error: {0}")]
    Pdu(#[from] PduError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// FFT channelizer errors (§4.1)
#[derive(Debug, Error)]
pub enum ChannelizerError {
    #[error("FFT size {fft_size} is smaller than filter taps length {taps_length}")]
    FftTooSmall { fft_size: usize, taps_length: usize },

    #[error("pre-decimation factor {decimation} does not evenly divide input size {input_size}")]
    BadDecimation {
        decimation: usize,
        input_size: usize,
    },

    #[error("channel span {span_hz} Hz exceeds input sample rate {sample_rate_hz} Hz")]
    ChannelSpanTooWide { span_hz: f64, sample_rate_hz: f64 },

    #[error("input block size {actual} does not match expected {expected}")]
    BlockSizeMismatch { expected: usize, actual: usize },
}

/// Channel worker / framer errors (§4.2)
#[derive(Debug, Error)]
pub enum FramerError {
    #[error("symbol buffer underrun: needed {required}, had {available}")]
    SymbolUnderrun { required: usize, available: usize },

    #[error("unknown M1 frame parameter index {index}")]
    UnknownFrameParamIndex { index: usize },

    #[error("search retries exhausted ({retries}) without matching preamble")]
    SearchRetriesExhausted { retries: u8 },
}

/// Deinterleaver / descrambler / Viterbi errors (§4.3)
#[derive(Debug, Error)]
pub enum FecError {
    #[error("deinterleaver table size {declared} does not match pushed count {actual}")]
    DeinterleaverSizeMismatch { declared: usize, actual: usize },

    #[error("viterbi input length {len} is not a multiple of the expected step size {step}")]
    ViterbiInputMisaligned { len: usize, step: usize },

    #[error("FCS mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    FcsMismatch { expected: u16, computed: u16 },
}

/// PDU layer parse errors (§4.4). These are recorded locally on the offending
/// PDU node (`err = true`) rather than propagated; see §7.
#[derive(Debug, Error)]
pub enum PduError {
    #[error("truncated PDU: expected at least {expected} octets, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unknown PDU type {type_code:#04x}")]
    UnknownType { type_code: u8 },

    #[error("value out of range: {field} = {value} (expected {bound})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        bound: &'static str,
    },

    #[error("FCS check failed over {protected_len} protected octets")]
    FcsFailed { protected_len: usize },
}

/// Aircraft cache / ground-station directory errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("station id {id} out of range 0..127")]
    StationIdOutOfRange { id: u32 },

    #[error("duplicate station id {id}")]
    DuplicateStationId { id: u8 },

    #[error("system-table version {version} out of range 0..4095")]
    VersionOutOfRange { version: u32 },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sample rate: {rate_hz} Hz (must be >= 18000)")]
    InvalidSampleRate { rate_hz: u32 },

    #[error("invalid center frequency: channel span {span_khz} kHz >= sample rate {sample_rate_khz} kHz")]
    CenterFrequencySpanTooWide {
        span_khz: f64,
        sample_rate_khz: f64,
    },

    #[error("no channel frequencies specified")]
    NoChannels,

    #[error("invalid output spec: {spec}")]
    InvalidOutputSpec { spec: String },

    #[error("station id {id:?} exceeds 255 characters")]
    StationIdTooLong { id: String },

    #[error("system-table: {0}")]
    SystemTable(#[from] crate::systable::SystemTableError),
}

/// Result type alias for hfdl-core operations
pub type Result<T> = std::result::Result<T, HfdlError>;
