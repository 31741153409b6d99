//! Burst record produced by a channel worker and consumed by the PDU
//! decoder (§3).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    Single,
    Double,
}

/// Bitmask rather than a bare integer so new flags can be added without
/// breaking callers matching on it. Only `ORDERED_SHUTDOWN` is assigned
/// today; the rest of the bit space is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstFlags(u32);

impl BurstFlags {
    pub const NONE: BurstFlags = BurstFlags(0);
    pub const ORDERED_SHUTDOWN: BurstFlags = BurstFlags(1 << 0);

    pub fn contains(self, other: BurstFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: BurstFlags) -> BurstFlags {
        BurstFlags(self.0 | other.0)
    }
}

impl Default for BurstFlags {
    fn default() -> Self {
        BurstFlags::NONE
    }
}

#[derive(Debug, Clone)]
pub struct BurstMetadata {
    pub rx_timestamp_secs: u64,
    pub rx_timestamp_usecs: u32,
    pub channel_freq_khz: u32,
    pub bit_rate_bps: u32,
    pub slot: SlotType,
    pub freq_err_hz: f32,
    pub sig_level_db: f32,
    pub noise_level_db: f32,
}

#[derive(Debug, Clone)]
pub struct BurstRecord {
    pub metadata: BurstMetadata,
    pub pdu: Vec<u8>,
    pub flags: BurstFlags,
}

impl BurstRecord {
    /// The sentinel record a channel worker emits on its output queue when
    /// it observes the shutdown marker on its input, so the PDU decoder can
    /// propagate end-of-stream downstream in turn (§5 cancellation model).
    pub fn shutdown_marker() -> Self {
        Self {
            metadata: BurstMetadata {
                rx_timestamp_secs: 0,
                rx_timestamp_usecs: 0,
                channel_freq_khz: 0,
                bit_rate_bps: 0,
                slot: SlotType::Single,
                freq_err_hz: 0.0,
                sig_level_db: 0.0,
                noise_level_db: 0.0,
            },
            pdu: Vec::new(),
            flags: BurstFlags::ORDERED_SHUTDOWN,
        }
    }

    pub fn is_shutdown_marker(&self) -> bool {
        self.flags.contains(BurstFlags::ORDERED_SHUTDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_marker_is_flagged() {
        assert!(BurstRecord::shutdown_marker().is_shutdown_marker());
    }

    #[test]
    fn ordinary_record_is_not_a_shutdown_marker() {
        let record = BurstRecord {
            metadata: BurstMetadata {
                rx_timestamp_secs: 1,
                rx_timestamp_usecs: 0,
                channel_freq_khz: 13_257,
                bit_rate_bps: 1800,
                slot: SlotType::Double,
                freq_err_hz: 0.0,
                sig_level_db: -20.0,
                noise_level_db: -60.0,
            },
            pdu: vec![1, 2, 3],
            flags: BurstFlags::NONE,
        };
        assert!(!record.is_shutdown_marker());
    }
}
