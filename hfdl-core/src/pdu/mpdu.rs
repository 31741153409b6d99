//! MPDU (media-access layer), §4.4.
//!
//! Direction is carried in the top bit of the first octet. A downlink MPDU
//! carries one aircraft's LPDUs; an uplink MPDU carries one or more
//! aircraft blocks, each with its own LPDU length table. LPDUs themselves
//! are NOT individually length-prefixed on the wire in this design — each
//! block's length table in the header gives every LPDU's length up front,
//! and the LPDU octets follow concatenated.

use crate::errors::PduError;
use crate::fec::fcs;

const DOWNLINK_BIT: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpduDirection {
    Downlink,
    Uplink,
}

#[derive(Debug, Clone)]
pub struct MpduBlock {
    pub ac_id: Option<u8>,
    pub lpdu_payloads: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct Mpdu {
    pub direction: MpduDirection,
    pub src_id: Option<u8>,
    pub dst_id: Option<u8>,
    pub blocks: Vec<MpduBlock>,
    pub crc_ok: bool,
    pub raw: Vec<u8>,
}

impl Mpdu {
    pub fn parse(raw: &[u8]) -> Result<Self, PduError> {
        if raw.is_empty() {
            return Err(PduError::Truncated {
                expected: 1,
                actual: 0,
            });
        }
        if raw[0] & DOWNLINK_BIT != 0 {
            Self::parse_downlink(raw)
        } else {
            Self::parse_uplink(raw)
        }
    }

    fn parse_downlink(raw: &[u8]) -> Result<Self, PduError> {
        const FIXED_HEADER: usize = 6;
        if raw.len() < FIXED_HEADER {
            return Err(PduError::Truncated {
                expected: FIXED_HEADER,
                actual: raw.len(),
            });
        }
        let dst_id = raw[1] & 0x7F;
        let src_id = raw[2];
        let lpdu_cnt = raw[3] as usize;
        let header_len = FIXED_HEADER + lpdu_cnt;
        if raw.len() < header_len {
            return Err(PduError::Truncated {
                expected: header_len,
                actual: raw.len(),
            });
        }
        let lengths: Vec<usize> = raw[FIXED_HEADER..header_len]
            .iter()
            .map(|&b| b as usize + 1)
            .collect();
        let total: usize = lengths.iter().sum();
        let protected_len = header_len + total;
        if raw.len() < protected_len + 2 {
            return Err(PduError::Truncated {
                expected: protected_len + 2,
                actual: raw.len(),
            });
        }

        let mut payloads = Vec::with_capacity(lengths.len());
        let mut cursor = header_len;
        for &len in &lengths {
            payloads.push(raw[cursor..cursor + len].to_vec());
            cursor += len;
        }

        let crc_ok = fcs::verify_fcs(&raw[..protected_len], [raw[protected_len], raw[protected_len + 1]]);

        Ok(Self {
            direction: MpduDirection::Downlink,
            src_id: Some(src_id),
            dst_id: Some(dst_id),
            blocks: vec![MpduBlock {
                ac_id: None,
                lpdu_payloads: payloads,
            }],
            crc_ok,
            raw: raw.to_vec(),
        })
    }

    fn parse_uplink(raw: &[u8]) -> Result<Self, PduError> {
        let block_count = ((raw[0] >> 4) & 0x07) as usize + 1;
        let mut offset = 1usize;
        let mut block_lengths: Vec<(u8, Vec<usize>)> = Vec::with_capacity(block_count);

        for _ in 0..block_count {
            if offset + 2 > raw.len() {
                return Err(PduError::Truncated {
                    expected: offset + 2,
                    actual: raw.len(),
                });
            }
            let ac_id = raw[offset];
            let lpdu_cnt = raw[offset + 1] as usize;
            offset += 2;
            if offset + lpdu_cnt > raw.len() {
                return Err(PduError::Truncated {
                    expected: offset + lpdu_cnt,
                    actual: raw.len(),
                });
            }
            let lengths: Vec<usize> = raw[offset..offset + lpdu_cnt]
                .iter()
                .map(|&b| b as usize + 1)
                .collect();
            offset += lpdu_cnt;
            block_lengths.push((ac_id, lengths));
        }

        let mut blocks = Vec::with_capacity(block_count);
        let mut cursor = offset;
        for (ac_id, lengths) in block_lengths {
            let mut payloads = Vec::with_capacity(lengths.len());
            for len in lengths {
                if cursor + len > raw.len() {
                    return Err(PduError::Truncated {
                        expected: cursor + len,
                        actual: raw.len(),
                    });
                }
                payloads.push(raw[cursor..cursor + len].to_vec());
                cursor += len;
            }
            blocks.push(MpduBlock {
                ac_id: Some(ac_id),
                lpdu_payloads: payloads,
            });
        }

        if cursor + 2 > raw.len() {
            return Err(PduError::Truncated {
                expected: cursor + 2,
                actual: raw.len(),
            });
        }
        let crc_ok = fcs::verify_fcs(&raw[..cursor], [raw[cursor], raw[cursor + 1]]);

        Ok(Self {
            direction: MpduDirection::Uplink,
            src_id: None,
            dst_id: None,
            blocks,
            crc_ok,
            raw: raw.to_vec(),
        })
    }

    pub fn encode_downlink(src_id: u8, dst_id: u8, lpdus: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = vec![DOWNLINK_BIT, dst_id & 0x7F, src_id, lpdus.len() as u8, 0, 0];
        for lpdu in lpdus {
            buf.push((lpdu.len() - 1) as u8);
        }
        for lpdu in lpdus {
            buf.extend_from_slice(lpdu);
        }
        fcs::append_fcs(&buf)
    }

    pub fn encode_uplink(blocks: &[(u8, Vec<Vec<u8>>)]) -> Vec<u8> {
        let mut buf = vec![(((blocks.len() - 1) as u8) & 0x07) << 4];
        for (ac_id, lpdus) in blocks {
            buf.push(*ac_id);
            buf.push(lpdus.len() as u8);
            for lpdu in lpdus {
                buf.push((lpdu.len() - 1) as u8);
            }
        }
        for (_, lpdus) in blocks {
            for lpdu in lpdus {
                buf.extend_from_slice(lpdu);
            }
        }
        fcs::append_fcs(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downlink_round_trips() {
        let lpdus = vec![vec![0x0Du8, 1, 2, 3], vec![0x1Du8, 4, 5]];
        let wire = Mpdu::encode_downlink(7, 3, &lpdus);
        let parsed = Mpdu::parse(&wire).unwrap();
        assert!(parsed.crc_ok);
        assert_eq!(parsed.direction, MpduDirection::Downlink);
        assert_eq!(parsed.src_id, Some(7));
        assert_eq!(parsed.dst_id, Some(3));
        assert_eq!(parsed.blocks[0].lpdu_payloads, lpdus);
    }

    #[test]
    fn uplink_round_trips_multiple_blocks() {
        let blocks = vec![
            (0x2Bu8, vec![vec![0x4Fu8, 0xAA, 0xBB, 0xCC]]),
            (0x10u8, vec![vec![0x2Fu8, 1, 2], vec![0x3Fu8, 3, 4, 5]]),
        ];
        let wire = Mpdu::encode_uplink(&blocks);
        let parsed = Mpdu::parse(&wire).unwrap();
        assert!(parsed.crc_ok);
        assert_eq!(parsed.direction, MpduDirection::Uplink);
        assert_eq!(parsed.blocks.len(), 2);
        assert_eq!(parsed.blocks[0].ac_id, Some(0x2B));
        assert_eq!(parsed.blocks[1].lpdu_payloads.len(), 2);
    }

    #[test]
    fn corrupted_header_fails_fcs_and_is_not_dispatched() {
        let lpdus = vec![vec![0x0Du8, 1, 2]];
        let mut wire = Mpdu::encode_downlink(7, 3, &lpdus);
        wire[2] ^= 0xFF;
        let parsed = Mpdu::parse(&wire).unwrap();
        assert!(!parsed.crc_ok);
    }

    #[test]
    fn header_length_equal_to_minimum_accepts_zero_lpdus() {
        let wire = Mpdu::encode_downlink(1, 2, &[]);
        assert_eq!(wire.len(), 6 + 2);
        let parsed = Mpdu::parse(&wire).unwrap();
        assert!(parsed.crc_ok);
        assert!(parsed.blocks[0].lpdu_payloads.is_empty());
    }

    #[test]
    fn shorter_than_minimum_is_rejected() {
        assert!(Mpdu::parse(&[DOWNLINK_BIT, 0, 0, 0, 0]).is_err());
    }
}
