//! HFNPDU (HF-network layer), §4.4.
//!
//! Begins with `0xFF <type>`. Coordinates are 20-bit signed fields scaled by
//! `180/0x7FFFF`; UTC is a 16-bit 2-second-unit field; system-table
//! frequencies are 6-digit BCD in three octets at 100 Hz resolution. Every
//! multi-byte field below is indexed from the start of the HFNPDU (`buf[0]`
//! is the `0xFF` marker, `buf[1]` the type octet), matching the reference
//! parser, and most fields are nibble-packed across byte boundaries rather
//! than byte-aligned.

use crate::errors::PduError;
use crate::pdu::{decode_bcd_frequency_hz, decode_utc, parse_coordinate, sign_extend};

pub const TYPE_SYSTEM_TABLE: u8 = 0xD0;
pub const TYPE_PERFORMANCE_DATA: u8 = 0xD1;
pub const TYPE_SYSTEM_TABLE_REQUEST: u8 = 0xD2;
pub const TYPE_FREQUENCY_DATA: u8 = 0xD5;
pub const TYPE_DELAYED_ECHO: u8 = 0xDE;
pub const TYPE_ENVELOPED_DATA: u8 = 0xFF;

const MARKER: u8 = 0xFF;
const SYSTABLE_HFNPDU_MIN_LEN: usize = 13;
const FREQ_FIELD_LEN: usize = 3;
/// Not carried anywhere in the wire format itself; bounds how many BCD
/// frequency fields a single system-table entry may report (§11 Open
/// Question: the reference parser's overflow handling here overwrites
/// `gs_id` instead of truncating `freq_cnt`, which DESIGN.md treats as a bug
/// and does not reproduce).
const GS_MAX_FREQ_CNT: usize = 8;
const PERFORMANCE_DATA_HFNPDU_LEN: usize = 47;
const FREQUENCY_DATA_HFNPDU_MIN_LEN: usize = 15;
const PROP_FREQ_DATA_LEN: usize = 6;
const PROP_FREQS_CNT_MAX: usize = 6;

/// One ground-station entry from a system-table HFNPDU body. Exactly one
/// entry is carried per `0xD0` PDU; a full table is reassembled by the
/// pipeline across `seq_num`/`total_cnt` segments (§11.2 scenario S5).
#[derive(Debug, Clone, PartialEq)]
pub struct SystemTableEntry {
    pub gs_id: u8,
    pub utc_sync: bool,
    pub lat: f64,
    pub lon: f64,
    pub spdu_version: u8,
    pub master_frame_slot: u8,
    pub frequencies_hz: Vec<u32>,
}

/// Parses the single ground-station entry carried by a system-table HFNPDU
/// body (`raw` is the full HFNPDU: `raw[0]=0xFF`, `raw[1]=type`). Returns the
/// entry plus the broadcast's `systable_version`/`seq_num`/`total_cnt`.
fn parse_systable_entry(raw: &[u8]) -> Result<(SystemTableEntry, u16, u8, u8), PduError> {
    if raw.len() < SYSTABLE_HFNPDU_MIN_LEN {
        return Err(PduError::Truncated {
            expected: SYSTABLE_HFNPDU_MIN_LEN,
            actual: raw.len(),
        });
    }
    let buf = raw;
    let total_cnt = ((buf[2] >> 4) & 0xF) + 1;
    let seq_num = buf[2] & 0xF;
    let systable_version = ((buf[3] as u16 >> 4) & 0xF) | ((buf[4] as u16) << 4);
    let gs_id = buf[5] & 0x7F;
    let utc_sync = buf[5] & 0x80 != 0;

    let lat_raw = buf[6] as u32 | ((buf[7] as u32) << 8) | ((buf[8] as u32 & 0xF) << 16);
    let lon_raw = ((buf[8] as u32 >> 4) & 0xF) | ((buf[9] as u32) << 4) | ((buf[10] as u32) << 12);
    let lat = parse_coordinate(sign_extend(lat_raw, 20));
    let lon = parse_coordinate(sign_extend(lon_raw, 20));

    let spdu_version = buf[11] & 0x7;
    let mut freq_cnt = ((buf[11] >> 3) & 0x1F) as usize;
    if freq_cnt > GS_MAX_FREQ_CNT {
        freq_cnt = GS_MAX_FREQ_CNT;
    }

    let mut consumed = SYSTABLE_HFNPDU_MIN_LEN - 1;
    let mut frequencies_hz = Vec::with_capacity(freq_cnt);
    for f in 0..freq_cnt {
        let pos = (SYSTABLE_HFNPDU_MIN_LEN - 1) + f * FREQ_FIELD_LEN;
        if pos + FREQ_FIELD_LEN < raw.len() {
            frequencies_hz.push(decode_bcd_frequency_hz([buf[pos], buf[pos + 1], buf[pos + 2]]));
            consumed += FREQ_FIELD_LEN;
        } else {
            break;
        }
    }
    let master_frame_slot = buf[consumed] & 0xF;

    Ok((
        SystemTableEntry {
            gs_id,
            utc_sync,
            lat,
            lon,
            spdu_version,
            master_frame_slot,
            frequencies_hz,
        },
        systable_version,
        seq_num,
        total_cnt,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropagatingFrequency {
    pub gs_id: u8,
    /// 20-bit bitmap of frequencies this ground station propagates.
    pub propagating_freqs: u32,
    /// 20-bit bitmap of frequencies this ground station is tuned to.
    pub tuned_freqs: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyRecord {
    pub flight_id: String,
    pub lat: f64,
    pub lon: f64,
    pub utc: (u8, u8, u8),
    pub propagating_frequencies: Vec<PropagatingFrequency>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HfnpduBody {
    SystemTable {
        systable_version: u16,
        seq_num: u8,
        total_cnt: u8,
        entry: SystemTableEntry,
    },
    PerformanceData {
        payload: Vec<u8>,
    },
    SystemTableRequest {
        requested_version: u16,
    },
    FrequencyData(FrequencyRecord),
    DelayedEcho,
    /// `None` when the enclosing HFNPDU is too short to carry an ACARS SOH
    /// (§8 boundary behavior: `type=0xFF`, `len < 3` yields no ACARS child).
    Enveloped {
        acars: Option<Vec<u8>>,
    },
    Unknown {
        type_code: u8,
        payload: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hfnpdu {
    pub type_code: u8,
    pub body: HfnpduBody,
}

impl Hfnpdu {
    pub fn parse(raw: &[u8]) -> Result<Self, PduError> {
        if raw.len() < 2 || raw[0] != MARKER {
            return Err(PduError::Truncated {
                expected: 2,
                actual: raw.len(),
            });
        }
        let type_code = raw[1];
        let body = &raw[2..];

        let parsed = match type_code {
            TYPE_SYSTEM_TABLE => {
                let (entry, systable_version, seq_num, total_cnt) = parse_systable_entry(raw)?;
                HfnpduBody::SystemTable {
                    systable_version,
                    seq_num,
                    total_cnt,
                    entry,
                }
            }
            TYPE_PERFORMANCE_DATA => {
                if raw.len() != PERFORMANCE_DATA_HFNPDU_LEN {
                    return Err(PduError::Truncated {
                        expected: PERFORMANCE_DATA_HFNPDU_LEN,
                        actual: raw.len(),
                    });
                }
                HfnpduBody::PerformanceData {
                    payload: body.to_vec(),
                }
            }
            TYPE_SYSTEM_TABLE_REQUEST => {
                if body.len() < 2 {
                    return Err(PduError::Truncated {
                        expected: 2,
                        actual: body.len(),
                    });
                }
                HfnpduBody::SystemTableRequest {
                    requested_version: u16::from_le_bytes([body[0], body[1]]),
                }
            }
            TYPE_FREQUENCY_DATA => {
                if raw.len() < FREQUENCY_DATA_HFNPDU_MIN_LEN {
                    return Err(PduError::Truncated {
                        expected: FREQUENCY_DATA_HFNPDU_MIN_LEN,
                        actual: raw.len(),
                    });
                }
                let flight_id = String::from_utf8_lossy(&raw[2..8]).trim_end_matches('\0').to_string();
                let lat_raw = raw[8] as u32 | ((raw[9] as u32) << 8) | ((raw[10] as u32 & 0xF) << 16);
                let lon_raw =
                    ((raw[10] as u32 >> 4) & 0xF) | ((raw[11] as u32) << 4) | ((raw[12] as u32) << 12);
                let lat = parse_coordinate(sign_extend(lat_raw, 20));
                let lon = parse_coordinate(sign_extend(lon_raw, 20));
                let utc = decode_utc(u16::from_le_bytes([raw[13], raw[14]]));

                let mut propagating_frequencies = Vec::new();
                for f in 0..PROP_FREQS_CNT_MAX {
                    let pos = FREQUENCY_DATA_HFNPDU_MIN_LEN + f * PROP_FREQ_DATA_LEN;
                    if pos + PROP_FREQ_DATA_LEN > raw.len() {
                        break;
                    }
                    let gs_id = raw[pos] & 0x7F;
                    let propagating_freqs =
                        raw[pos + 1] as u32 | ((raw[pos + 2] as u32) << 8) | ((raw[pos + 3] as u32 & 0xF) << 16);
                    let tuned_freqs = ((raw[pos + 3] as u32 >> 4) & 0xF)
                        | ((raw[pos + 4] as u32) << 4)
                        | ((raw[pos + 5] as u32) << 12);
                    propagating_frequencies.push(PropagatingFrequency {
                        gs_id,
                        propagating_freqs,
                        tuned_freqs,
                    });
                }
                HfnpduBody::FrequencyData(FrequencyRecord {
                    flight_id,
                    lat,
                    lon,
                    utc,
                    propagating_frequencies,
                })
            }
            TYPE_DELAYED_ECHO => HfnpduBody::DelayedEcho,
            TYPE_ENVELOPED_DATA => {
                if raw.len() < 3 {
                    HfnpduBody::Enveloped { acars: None }
                } else {
                    HfnpduBody::Enveloped {
                        acars: Some(raw[2..].to_vec()),
                    }
                }
            }
            other => HfnpduBody::Unknown {
                type_code: other,
                payload: body.to_vec(),
            },
        };

        Ok(Self {
            type_code,
            body: parsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enveloped_data_with_len_below_three_has_no_acars_child() {
        let raw = [MARKER, TYPE_ENVELOPED_DATA];
        let hfnpdu = Hfnpdu::parse(&raw).unwrap();
        assert_eq!(hfnpdu.body, HfnpduBody::Enveloped { acars: None });
    }

    #[test]
    fn enveloped_data_carries_acars_soh_onward() {
        let raw = [MARKER, TYPE_ENVELOPED_DATA, 0x01, b'A', b'1'];
        let hfnpdu = Hfnpdu::parse(&raw).unwrap();
        assert_eq!(
            hfnpdu.body,
            HfnpduBody::Enveloped {
                acars: Some(vec![0x01, b'A', b'1'])
            }
        );
    }

    fn systable_wire(seq_num: u8, total_cnt_minus_one: u8, gs_id: u8, freq_cnt: u8) -> Vec<u8> {
        let mut raw = vec![MARKER, TYPE_SYSTEM_TABLE];
        raw.push((total_cnt_minus_one << 4) | (seq_num & 0xF));
        raw.push(0x30); // systable_version low nibble in high nibble of buf[3]
        raw.push(0x0A); // systable_version high byte
        raw.push(gs_id & 0x7F);
        raw.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00]); // lat/lon placeholders
        raw.push((freq_cnt << 3) & 0xF8); // spdu_version=0, freq_cnt in top 5 bits
        for f in 0..freq_cnt {
            raw.extend_from_slice(&[0x10, 0x08, 0x10 + f]);
        }
        raw.push(0x01); // master_frame_slot
        raw
    }

    #[test]
    fn system_table_entry_carries_broadcast_segmentation_fields() {
        let raw = systable_wire(2, 3, 42, 2);
        let hfnpdu = Hfnpdu::parse(&raw).unwrap();
        match hfnpdu.body {
            HfnpduBody::SystemTable {
                seq_num,
                total_cnt,
                entry,
                ..
            } => {
                assert_eq!(seq_num, 2);
                assert_eq!(total_cnt, 4);
                assert_eq!(entry.gs_id, 42);
                assert_eq!(entry.frequencies_hz.len(), 2);
            }
            other => panic!("expected a system table body, got {other:?}"),
        }
    }

    #[test]
    fn system_table_entry_truncates_freq_cnt_past_the_max() {
        let raw = systable_wire(0, 0, 1, 0x1F);
        let hfnpdu = Hfnpdu::parse(&raw).unwrap();
        match hfnpdu.body {
            HfnpduBody::SystemTable { entry, .. } => {
                assert_eq!(entry.frequencies_hz.len(), GS_MAX_FREQ_CNT);
                assert_eq!(entry.gs_id, 1, "gs_id must not be clobbered by the truncation");
            }
            other => panic!("expected a system table body, got {other:?}"),
        }
    }

    #[test]
    fn system_table_entry_below_min_len_is_rejected() {
        let raw = [MARKER, TYPE_SYSTEM_TABLE, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(Hfnpdu::parse(&raw).is_err());
    }

    #[test]
    fn performance_data_requires_exact_length() {
        let mut raw = vec![MARKER, TYPE_PERFORMANCE_DATA];
        raw.extend(std::iter::repeat(0u8).take(10));
        assert!(Hfnpdu::parse(&raw).is_err());
    }

    #[test]
    fn frequency_data_parses_flight_id_and_propagating_entries() {
        let mut raw = vec![MARKER, TYPE_FREQUENCY_DATA];
        raw.extend_from_slice(b"N12345"); // flight_id, 6 bytes
        raw.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00]); // lat/lon placeholders
        raw.extend_from_slice(&[0x00, 0x00]); // utc
        raw.extend_from_slice(&[7, 0x34, 0x12, 0x60, 0x78, 0x9A]); // one propagating-freq record
        let hfnpdu = Hfnpdu::parse(&raw).unwrap();
        match hfnpdu.body {
            HfnpduBody::FrequencyData(record) => {
                assert_eq!(record.flight_id, "N12345");
                assert_eq!(record.propagating_frequencies.len(), 1);
                assert_eq!(record.propagating_frequencies[0].gs_id, 7);
            }
            other => panic!("expected frequency data body, got {other:?}"),
        }
    }

    #[test]
    fn missing_marker_is_rejected() {
        assert!(Hfnpdu::parse(&[0x00, TYPE_DELAYED_ECHO]).is_err());
    }
}
