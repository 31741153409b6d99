//! LPDU (link layer), §4.4.
//!
//! First octet is the LPDU type. FCS is verified over `len - 2` octets.
//! Logon-confirm variants write the negotiated `(channel_freq, ac_id) ->
//! icao_address` mapping into the aircraft cache.

use crate::cache::AircraftCache;
use crate::errors::PduError;
use crate::fec::fcs;
use crate::pdu::parse_icao;

pub const TYPE_UNNUMBERED_DATA: u8 = 0x0D;
pub const TYPE_UNNUMBERED_ACKED_DATA: u8 = 0x1D;
pub const TYPE_LOGON_DENIED: u8 = 0x2F;
pub const TYPE_LOGOFF_REQUEST: u8 = 0x3F;
pub const TYPE_LOGON_RESUME: u8 = 0x4F;
pub const TYPE_LOGON_RESUME_CONFIRM: u8 = 0x5F;
pub const TYPE_LOGON_REQUEST_NORMAL: u8 = 0x8F;
pub const TYPE_LOGON_CONFIRM: u8 = 0x9F;
pub const TYPE_LOGON_REQUEST_DLS: u8 = 0xBF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LpduPayload {
    UnnumberedData { hfnpdu: Vec<u8> },
    UnnumberedAckedData { hfnpdu: Vec<u8> },
    LogonDenied { icao: u32, reason: u8 },
    LogoffRequest { icao: u32, reason: u8 },
    LogonResume { icao: u32 },
    LogonRequestNormal { icao: u32 },
    LogonRequestDls { icao: u32 },
    LogonResumeConfirm { icao: u32, ac_id: u8 },
    LogonConfirm { icao: u32, ac_id: u8 },
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Lpdu {
    pub lpdu_type: u8,
    pub payload: LpduPayload,
    pub crc_ok: bool,
    pub raw: Vec<u8>,
}

impl Lpdu {
    pub fn parse(
        raw: &[u8],
        channel_freq_khz: u32,
        cache: Option<&AircraftCache>,
    ) -> Result<Self, PduError> {
        if raw.len() < 3 {
            return Err(PduError::Truncated {
                expected: 3,
                actual: raw.len(),
            });
        }
        let protected_len = raw.len() - 2;
        let crc_ok = fcs::verify_fcs(&raw[..protected_len], [raw[protected_len], raw[protected_len + 1]]);
        let lpdu_type = raw[0];

        let payload = match lpdu_type {
            TYPE_UNNUMBERED_DATA => LpduPayload::UnnumberedData {
                hfnpdu: raw[1..protected_len].to_vec(),
            },
            TYPE_UNNUMBERED_ACKED_DATA => LpduPayload::UnnumberedAckedData {
                hfnpdu: raw[1..protected_len].to_vec(),
            },
            TYPE_LOGON_DENIED | TYPE_LOGOFF_REQUEST => {
                if raw.len() < 7 {
                    return Err(PduError::Truncated {
                        expected: 7,
                        actual: raw.len(),
                    });
                }
                let icao = parse_icao([raw[1], raw[2], raw[3]]);
                let reason = raw[4];
                if lpdu_type == TYPE_LOGON_DENIED {
                    LpduPayload::LogonDenied { icao, reason }
                } else {
                    LpduPayload::LogoffRequest { icao, reason }
                }
            }
            TYPE_LOGON_RESUME | TYPE_LOGON_REQUEST_NORMAL | TYPE_LOGON_REQUEST_DLS => {
                if raw.len() < 6 {
                    return Err(PduError::Truncated {
                        expected: 6,
                        actual: raw.len(),
                    });
                }
                let icao = parse_icao([raw[1], raw[2], raw[3]]);
                match lpdu_type {
                    TYPE_LOGON_RESUME => LpduPayload::LogonResume { icao },
                    TYPE_LOGON_REQUEST_NORMAL => LpduPayload::LogonRequestNormal { icao },
                    _ => LpduPayload::LogonRequestDls { icao },
                }
            }
            TYPE_LOGON_RESUME_CONFIRM | TYPE_LOGON_CONFIRM => {
                if raw.len() < 7 {
                    return Err(PduError::Truncated {
                        expected: 7,
                        actual: raw.len(),
                    });
                }
                let icao = parse_icao([raw[1], raw[2], raw[3]]);
                let ac_id = raw[4];
                if crc_ok {
                    if let Some(cache) = cache {
                        cache.insert(channel_freq_khz, ac_id, icao);
                    }
                }
                if lpdu_type == TYPE_LOGON_RESUME_CONFIRM {
                    LpduPayload::LogonResumeConfirm { icao, ac_id }
                } else {
                    LpduPayload::LogonConfirm { icao, ac_id }
                }
            }
            _ => LpduPayload::Unknown,
        };

        Ok(Self {
            lpdu_type,
            payload,
            crc_ok,
            raw: raw.to_vec(),
        })
    }
}
