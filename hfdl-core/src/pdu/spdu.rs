//! SPDU (squitter), ground-station uplink housekeeping frame (§4.4).
//!
//! Fixed 66-octet PDU: 64 protected octets followed by a little-endian CCITT
//! FCS. Carries the system table version and up to three ground-station
//! status records, nibble-packed across byte boundaries; the pipeline uses
//! `systable_version` to decide whether to refresh the ground-station
//! directory.

use crate::errors::PduError;
use crate::fec::fcs;

pub const SPDU_LEN: usize = 66;
const PROTECTED_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GsStatusRecord {
    pub id: u8,
    pub utc_sync: bool,
    /// 20-bit bitmap of frequencies currently in use.
    pub freqs_in_use: u32,
}

#[derive(Debug, Clone)]
pub struct Spdu {
    pub version: u8,
    pub rls_in_use: bool,
    pub iso8208_supported: bool,
    pub change_note: u8,
    pub src_id: u8,
    pub frame_index: u16,
    pub frame_offset: u8,
    pub min_priority: u8,
    pub systable_version: u16,
    pub gs_status: Vec<GsStatusRecord>,
    pub crc_ok: bool,
    pub raw: Vec<u8>,
}

impl Spdu {
    pub fn parse(raw: &[u8]) -> Result<Self, PduError> {
        if raw.len() != SPDU_LEN {
            return Err(PduError::Truncated {
                expected: SPDU_LEN,
                actual: raw.len(),
            });
        }
        let protected = &raw[..PROTECTED_LEN];
        let crc_ok = fcs::verify_fcs(protected, [raw[64], raw[65]]);
        let buf = raw;

        let rls_in_use = buf[0] & 0x02 != 0;
        let version = (buf[0] >> 2) & 0x03;
        let iso8208_supported = buf[0] & 0x20 != 0;
        let change_note = (buf[0] & 0xC0) >> 6;

        let src_id = buf[1] & 0x7F;
        let frame_index = buf[2] as u16 | ((buf[3] as u16 & 0x0F) << 8);
        let frame_offset = (buf[3] >> 4) & 0x0F;

        let min_priority = buf[52] & 0x0F;
        let systable_version = buf[53] as u16 | ((buf[54] as u16 & 0x0F) << 8);

        let gs0 = GsStatusRecord {
            id: src_id,
            utc_sync: buf[1] & 0x80 != 0,
            freqs_in_use: ((buf[54] as u32 & 0xF0) >> 4)
                | ((buf[55] as u32) << 4)
                | ((buf[56] as u32) << 12),
        };
        let gs1 = GsStatusRecord {
            id: buf[57] & 0x7F,
            utc_sync: buf[57] & 0x80 != 0,
            freqs_in_use: buf[58] as u32 | ((buf[59] as u32) << 8) | ((buf[60] as u32 & 0x0F) << 16),
        };
        let gs2 = GsStatusRecord {
            id: ((buf[60] & 0xF0) >> 4) | ((buf[61] & 0x07) << 4),
            utc_sync: buf[61] & 0x08 != 0,
            freqs_in_use: ((buf[61] as u32 & 0xF0) >> 4)
                | ((buf[62] as u32) << 4)
                | ((buf[63] as u32) << 12),
        };

        Ok(Self {
            version,
            rls_in_use,
            iso8208_supported,
            change_note,
            src_id,
            frame_index,
            frame_offset,
            min_priority,
            systable_version,
            gs_status: vec![gs0, gs1, gs2],
            crc_ok,
            raw: raw.to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; PROTECTED_LEN];
        buf[0] = (if self.rls_in_use { 0x02 } else { 0 })
            | ((self.version & 0x03) << 2)
            | (if self.iso8208_supported { 0x20 } else { 0 })
            | ((self.change_note & 0x03) << 6);

        let gs0 = self.gs_status.first().copied().unwrap_or(GsStatusRecord {
            id: self.src_id,
            utc_sync: false,
            freqs_in_use: 0,
        });
        buf[1] = (self.src_id & 0x7F) | (if gs0.utc_sync { 0x80 } else { 0 });

        buf[2] = (self.frame_index & 0xFF) as u8;
        buf[3] = ((self.frame_index >> 8) as u8 & 0x0F) | ((self.frame_offset & 0x0F) << 4);

        buf[52] = self.min_priority & 0x0F;
        buf[53] = (self.systable_version & 0xFF) as u8;

        let gs1 = self.gs_status.get(1).copied().unwrap_or(GsStatusRecord {
            id: 0,
            utc_sync: false,
            freqs_in_use: 0,
        });
        let gs2 = self.gs_status.get(2).copied().unwrap_or(GsStatusRecord {
            id: 0,
            utc_sync: false,
            freqs_in_use: 0,
        });

        buf[54] = ((self.systable_version >> 8) as u8 & 0x0F) | (((gs0.freqs_in_use & 0xF) as u8) << 4);
        buf[55] = ((gs0.freqs_in_use >> 4) & 0xFF) as u8;
        buf[56] = ((gs0.freqs_in_use >> 12) & 0xFF) as u8;

        buf[57] = (gs1.id & 0x7F) | (if gs1.utc_sync { 0x80 } else { 0 });
        buf[58] = (gs1.freqs_in_use & 0xFF) as u8;
        buf[59] = ((gs1.freqs_in_use >> 8) & 0xFF) as u8;

        buf[60] = (((gs1.freqs_in_use >> 16) & 0x0F) as u8) | ((gs2.id & 0x0F) << 4);
        buf[61] = ((gs2.id >> 4) & 0x07)
            | (if gs2.utc_sync { 0x08 } else { 0 })
            | (((gs2.freqs_in_use & 0xF) as u8) << 4);
        buf[62] = ((gs2.freqs_in_use >> 4) & 0xFF) as u8;
        buf[63] = ((gs2.freqs_in_use >> 12) & 0xFF) as u8;

        fcs::append_fcs(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Spdu {
        Spdu {
            version: 2,
            rls_in_use: true,
            iso8208_supported: false,
            change_note: 0x3,
            src_id: 0x45,
            frame_index: 0xABC & 0x0FFF,
            frame_offset: 0x5,
            min_priority: 3,
            systable_version: 0xABC & 0x0FFF,
            gs_status: vec![
                GsStatusRecord {
                    id: 0x45,
                    utc_sync: true,
                    freqs_in_use: 0x7E5A1 & 0xFFFFF,
                },
                GsStatusRecord {
                    id: 0x12,
                    utc_sync: false,
                    freqs_in_use: 0,
                },
                GsStatusRecord {
                    id: 0x09,
                    utc_sync: true,
                    freqs_in_use: 0xFFFFF,
                },
            ],
            crc_ok: true,
            raw: Vec::new(),
        }
    }

    #[test]
    fn encode_then_parse_round_trips_every_field() {
        let original = sample();
        let wire = original.encode();
        assert_eq!(wire.len(), SPDU_LEN);
        let parsed = Spdu::parse(&wire).unwrap();

        assert!(parsed.crc_ok);
        assert_eq!(parsed.version, original.version);
        assert_eq!(parsed.rls_in_use, original.rls_in_use);
        assert_eq!(parsed.iso8208_supported, original.iso8208_supported);
        assert_eq!(parsed.change_note, original.change_note);
        assert_eq!(parsed.src_id, original.src_id);
        assert_eq!(parsed.frame_index, original.frame_index);
        assert_eq!(parsed.frame_offset, original.frame_offset);
        assert_eq!(parsed.min_priority, original.min_priority);
        assert_eq!(parsed.systable_version, original.systable_version);
        assert_eq!(parsed.gs_status, original.gs_status);
    }

    #[test]
    fn corrupted_octet_fails_fcs() {
        let mut wire = sample().encode();
        wire[0] ^= 0xFF;
        let parsed = Spdu::parse(&wire).unwrap();
        assert!(!parsed.crc_ok);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(Spdu::parse(&[0u8; 10]).is_err());
    }

    #[test]
    fn gs0_id_and_utc_sync_are_shared_with_the_header_src_fields() {
        let wire = sample().encode();
        let parsed = Spdu::parse(&wire).unwrap();
        assert_eq!(parsed.gs_status[0].id, parsed.src_id);
    }
}
