//! ACARS reassembly layer (§4.4), reached via HFNPDU enveloped data (type
//! `0xFF`, SOH `0x01`). Reassembles multi-fragment messages keyed on
//! direction, aircraft registration, and a receive-timestamp bucket so
//! unrelated sessions separated in time don't collide.

use std::collections::HashMap;
use std::sync::Mutex;

const SOH: u8 = 0x01;
const ETX: u8 = 0x03;
const ETB: u8 = 0x17;
const REG_LEN: usize = 7;
/// Fragments are bucketed to this many seconds so a stale half-message from
/// hours earlier never combines with an unrelated later one.
const TIMESTAMP_BUCKET_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcarsDirection {
    AirToGround,
    GroundToAir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcarsStatus {
    Unknown,
    /// More fragments are expected; not one of the final-state statuses
    /// counted in §7's disposition table, but reported so callers can
    /// suppress intermediate output.
    InProgress,
    Complete,
    Skipped,
    Duplicate,
    OutOfSequence,
    InvalidArgs,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct FragmentKey {
    direction: AcarsDirection,
    registration: String,
    timestamp_bucket: u64,
}

struct PendingMessage {
    buffer: Vec<u8>,
    next_block_id: u8,
}

struct CompletedRecord {
    bucket: u64,
    payload: Vec<u8>,
}

#[derive(Default)]
pub struct AcarsReassembler {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    pending: HashMap<FragmentKey, PendingMessage>,
    recently_completed: HashMap<FragmentKey, CompletedRecord>,
}

struct ParsedFrame<'a> {
    registration: String,
    block_id: u8,
    is_final: bool,
    text: &'a [u8],
}

fn parse_frame(raw: &[u8]) -> Option<ParsedFrame<'_>> {
    if raw.len() < 1 + REG_LEN + 1 + 1 || raw[0] != SOH {
        return None;
    }
    let registration = String::from_utf8_lossy(&raw[1..1 + REG_LEN])
        .trim_end()
        .to_string();
    let block_id = raw[1 + REG_LEN];
    let rest = &raw[1 + REG_LEN + 1..];
    let (text, terminator) = match rest.split_last() {
        Some((&t, head)) if t == ETX || t == ETB => (head, t),
        _ => return None,
    };
    Some(ParsedFrame {
        registration,
        block_id,
        is_final: terminator == ETX,
        text,
    })
}

impl AcarsReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one ACARS frame (as carried by an enveloped HFNPDU). Returns the
    /// status and, on `Complete`, the joined message payload.
    pub fn process(
        &self,
        direction: AcarsDirection,
        raw: &[u8],
        rx_timestamp_secs: u64,
    ) -> (AcarsStatus, Option<Vec<u8>>) {
        let Some(frame) = parse_frame(raw) else {
            return (AcarsStatus::InvalidArgs, None);
        };

        let bucket = rx_timestamp_secs / TIMESTAMP_BUCKET_SECS;
        let key = FragmentKey {
            direction,
            registration: frame.registration,
            timestamp_bucket: bucket,
        };

        let mut guard = self.inner.lock().unwrap();

        if !frame.is_final {
            let entry = guard.pending.entry(key).or_insert_with(|| PendingMessage {
                buffer: Vec::new(),
                next_block_id: frame.block_id,
            });
            if entry.buffer.is_empty() {
                entry.next_block_id = frame.block_id.wrapping_add(1);
                entry.buffer.extend_from_slice(frame.text);
                return (AcarsStatus::InProgress, None);
            }
            if frame.block_id != entry.next_block_id {
                return (AcarsStatus::OutOfSequence, None);
            }
            entry.buffer.extend_from_slice(frame.text);
            entry.next_block_id = entry.next_block_id.wrapping_add(1);
            return (AcarsStatus::InProgress, None);
        }

        if let Some(pending) = guard.pending.remove(&key) {
            if frame.block_id != pending.next_block_id {
                return (AcarsStatus::OutOfSequence, None);
            }
            let mut payload = pending.buffer;
            payload.extend_from_slice(frame.text);
            guard.recently_completed.insert(
                key,
                CompletedRecord {
                    bucket,
                    payload: payload.clone(),
                },
            );
            return (AcarsStatus::Complete, Some(payload));
        }

        if let Some(completed) = guard.recently_completed.get(&key) {
            if completed.bucket == bucket && completed.payload == frame.text {
                return (AcarsStatus::Duplicate, None);
            }
        }

        let payload = frame.text.to_vec();
        guard.recently_completed.insert(
            key,
            CompletedRecord {
                bucket,
                payload: payload.clone(),
            },
        );
        (AcarsStatus::Complete, Some(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(reg: &str, block_id: u8, text: &[u8], terminator: u8) -> Vec<u8> {
        let mut f = vec![SOH];
        let mut reg_padded = reg.as_bytes().to_vec();
        reg_padded.resize(REG_LEN, b' ');
        f.extend_from_slice(&reg_padded);
        f.push(block_id);
        f.extend_from_slice(text);
        f.push(terminator);
        f
    }

    #[test]
    fn two_fragment_message_completes_on_second_frame() {
        let reassembler = AcarsReassembler::new();
        let first = frame("N12345", 0, b"HELLO ", ETB);
        let second = frame("N12345", 1, b"WORLD", ETX);

        let (status1, payload1) = reassembler.process(AcarsDirection::AirToGround, &first, 1000);
        assert_eq!(status1, AcarsStatus::InProgress);
        assert!(payload1.is_none());

        let (status2, payload2) = reassembler.process(AcarsDirection::AirToGround, &second, 1000);
        assert_eq!(status2, AcarsStatus::Complete);
        assert_eq!(payload2.unwrap(), b"HELLO WORLD".to_vec());
    }

    #[test]
    fn single_fragment_message_completes_immediately() {
        let reassembler = AcarsReassembler::new();
        let f = frame("N54321", 0, b"STANDALONE", ETX);
        let (status, payload) = reassembler.process(AcarsDirection::GroundToAir, &f, 5000);
        assert_eq!(status, AcarsStatus::Complete);
        assert_eq!(payload.unwrap(), b"STANDALONE".to_vec());
    }

    #[test]
    fn out_of_order_block_id_is_rejected() {
        let reassembler = AcarsReassembler::new();
        let first = frame("N99999", 0, b"A", ETB);
        reassembler.process(AcarsDirection::AirToGround, &first, 1000);
        let bad_second = frame("N99999", 5, b"B", ETX);
        let (status, _) = reassembler.process(AcarsDirection::AirToGround, &bad_second, 1000);
        assert_eq!(status, AcarsStatus::OutOfSequence);
    }

    #[test]
    fn malformed_frame_without_soh_is_invalid() {
        let reassembler = AcarsReassembler::new();
        let (status, _) = reassembler.process(AcarsDirection::AirToGround, &[0x00, 1, 2, 3], 1000);
        assert_eq!(status, AcarsStatus::InvalidArgs);
    }
}
