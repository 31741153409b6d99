//! Decoded-message output records and their text/JSON renderers (§6, §11.4).
//!
//! A [`DecodedMessage`] is the terminal record the PDU decoder publishes
//! for each completed burst. The PDU chain itself is a [`PduTree`]: a node
//! plus an optional boxed child, mirroring the singly-linked SPDU→MPDU→
//! LPDU→HFNPDU→ACARS nesting described in `pdu::mod`. [`OutputFormat::Json`]
//! follows the schema in §6; [`OutputFormat::Text`] mirrors the
//! direction-aware `"Src GS… Dst AC…"` style of the reference formatter.

use crate::pdu::acars::AcarsDirection;
use crate::pdu::hfnpdu::HfnpduBody;
use crate::pdu::lpdu::LpduPayload;
use crate::pdu::mpdu::MpduDirection;
use crate::pdu::{AcarsStatus, Hfnpdu, Lpdu, Mpdu, Spdu};
use crate::pipeline::burst::{BurstMetadata, SlotType};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Basestation,
    Binary,
}

#[derive(Debug, Clone)]
pub enum PduNode {
    Spdu(Box<Spdu>),
    Mpdu(Box<Mpdu>),
    Lpdu(Box<Lpdu>),
    Hfnpdu(Box<Hfnpdu>),
    Acars {
        direction: AcarsDirection,
        status: AcarsStatus,
        payload: Option<Vec<u8>>,
    },
    /// FCS or parse failure: raw octets preserved, no fields filled in.
    Invalid { raw: Vec<u8>, reason: String },
}

/// One layer of the PDU chain plus whatever layer it unwrapped to, if any.
/// A node with no child is either a terminal layer (ACARS, most HFNPDU
/// bodies) or a layer that failed to parse further.
#[derive(Debug, Clone)]
pub struct PduTree {
    pub node: PduNode,
    pub child: Option<Box<PduTree>>,
}

impl PduTree {
    pub fn leaf(node: PduNode) -> Self {
        Self { node, child: None }
    }

    pub fn with_child(node: PduNode, child: PduTree) -> Self {
        Self { node, child: Some(Box::new(child)) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub ver: String,
}

#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub app: AppInfo,
    pub station: Option<String>,
    pub metadata: BurstMetadata,
    pub pdu: PduTree,
    /// `--raw-frames`: an additional hex-dump node alongside the parse
    /// tree, regardless of FCS outcome (§11.5).
    pub raw_frame_hex: Option<String>,
}

impl DecodedMessage {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "app": { "name": self.app.name, "ver": self.app.ver },
            "station": self.station,
            "t": {
                "sec": self.metadata.rx_timestamp_secs,
                "usec": self.metadata.rx_timestamp_usecs,
            },
            "freq": self.metadata.channel_freq_khz,
            "bit_rate": self.metadata.bit_rate_bps,
            "sig_level": self.metadata.sig_level_db,
            "noise_level": self.metadata.noise_level_db,
            "freq_skew": self.metadata.freq_err_hz,
            "slot": match self.metadata.slot { SlotType::Single => "S", SlotType::Double => "D" },
            "hfdl": pdu_tree_to_json(&self.pdu),
            "raw_frame": self.raw_frame_hex,
        })
    }

    /// Direction-aware `"Src GS… Dst AC…"` rendering, matching the
    /// reference decoder's `*_format_text` family.
    pub fn to_text(&self) -> String {
        let header = format!(
            "[{} kHz] bit_rate: {} bps slot: {}",
            self.metadata.channel_freq_khz,
            self.metadata.bit_rate_bps,
            match self.metadata.slot {
                SlotType::Single => 'S',
                SlotType::Double => 'D',
            }
        );
        format!("{header}\n{}", pdu_tree_to_text(&self.pdu))
    }
}

fn pdu_tree_to_json(tree: &PduTree) -> serde_json::Value {
    let mut node = match &tree.node {
        PduNode::Spdu(spdu) => serde_json::json!({
            "spdu": {
                "version": spdu.version,
                "systable_version": spdu.systable_version,
                "frame_index": spdu.frame_index,
                "crc_ok": spdu.crc_ok,
            }
        }),
        PduNode::Mpdu(mpdu) => serde_json::json!({
            "mpdu": {
                "direction": match mpdu.direction {
                    MpduDirection::Downlink => "downlink",
                    MpduDirection::Uplink => "uplink",
                },
                "crc_ok": mpdu.crc_ok,
                "lpdu_count": mpdu.blocks.iter().map(|b| b.lpdu_payloads.len()).sum::<usize>(),
            }
        }),
        PduNode::Lpdu(lpdu) => serde_json::json!({
            "lpdu": {
                "type": lpdu.lpdu_type,
                "crc_ok": lpdu.crc_ok,
            }
        }),
        PduNode::Hfnpdu(hfnpdu) => serde_json::json!({
            "hfnpdu": {
                "type": hfnpdu.type_code,
                "kind": hfnpdu_body_kind(&hfnpdu.body),
            }
        }),
        PduNode::Acars { direction, status, payload } => serde_json::json!({
            "acars": {
                "direction": match direction {
                    AcarsDirection::AirToGround => "air2ground",
                    AcarsDirection::GroundToAir => "ground2air",
                },
                "status": format!("{status:?}"),
                "text": payload.as_ref().map(|p| String::from_utf8_lossy(p).into_owned()),
            }
        }),
        PduNode::Invalid { reason, .. } => serde_json::json!({ "err": reason }),
    };
    if let Some(child) = &tree.child {
        node["child"] = pdu_tree_to_json(child);
    }
    node
}

fn hfnpdu_body_kind(body: &HfnpduBody) -> &'static str {
    match body {
        HfnpduBody::SystemTable { .. } => "system_table",
        HfnpduBody::PerformanceData { .. } => "performance_data",
        HfnpduBody::SystemTableRequest { .. } => "system_table_request",
        HfnpduBody::FrequencyData(_) => "frequency_data",
        HfnpduBody::DelayedEcho => "delayed_echo",
        HfnpduBody::Enveloped { .. } => "enveloped",
        HfnpduBody::Unknown { .. } => "unknown",
    }
}

fn pdu_tree_to_text(tree: &PduTree) -> String {
    let line = match &tree.node {
        PduNode::Spdu(spdu) => format!(
            "SPDU: systable_version={} frame_index={}",
            spdu.systable_version, spdu.frame_index
        ),
        PduNode::Mpdu(mpdu) => {
            let (src, dst) = match mpdu.direction {
                MpduDirection::Downlink => (
                    mpdu.src_id.map(|v| v.to_string()).unwrap_or_default(),
                    mpdu.dst_id.map(|v| v.to_string()).unwrap_or_default(),
                ),
                MpduDirection::Uplink => (
                    "GS".to_string(),
                    mpdu
                        .blocks
                        .first()
                        .and_then(|b| b.ac_id)
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                ),
            };
            format!("Src {src} Dst {dst}: {} LPDU(s)", mpdu.blocks.len())
        }
        PduNode::Lpdu(lpdu) => match &lpdu.payload {
            LpduPayload::LogonConfirm { icao, ac_id } => {
                format!("Logon confirm: icao={icao:#08x} ac_id={ac_id:#04x}")
            }
            LpduPayload::LogonDenied { icao, reason } => {
                format!("Logon denied: icao={icao:#08x} reason={reason:#04x}")
            }
            _ => format!("LPDU type {:#04x}", lpdu.lpdu_type),
        },
        PduNode::Hfnpdu(hfnpdu) => format!("HFNPDU type {:#04x}", hfnpdu.type_code),
        PduNode::Acars { status, payload, .. } => match payload {
            Some(bytes) => format!("ACARS [{status:?}]: {}", String::from_utf8_lossy(bytes)),
            None => format!("ACARS [{status:?}]"),
        },
        PduNode::Invalid { reason, .. } => format!("<invalid: {reason}>"),
    };
    match &tree.child {
        Some(child) => format!("{line}\n  {}", pdu_tree_to_text(child)),
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::spdu::Spdu;

    fn sample_metadata() -> BurstMetadata {
        BurstMetadata {
            rx_timestamp_secs: 1700,
            rx_timestamp_usecs: 0,
            channel_freq_khz: 13_257,
            bit_rate_bps: 1800,
            slot: SlotType::Single,
            freq_err_hz: 1.5,
            sig_level_db: -20.0,
            noise_level_db: -60.0,
        }
    }

    #[test]
    fn json_schema_carries_top_level_fields() {
        let msg = DecodedMessage {
            app: AppInfo { name: "hfdl-cli".into(), ver: "0".into() },
            station: Some("GANDER".into()),
            metadata: sample_metadata(),
            pdu: PduTree::leaf(PduNode::Invalid { raw: vec![1, 2], reason: "truncated".into() }),
            raw_frame_hex: None,
        };
        let json = msg.to_json();
        assert_eq!(json["freq"], 13_257);
        assert_eq!(json["slot"], "S");
        assert_eq!(json["t"]["sec"], 1700);
    }

    #[test]
    fn text_renderer_includes_channel_frequency() {
        let msg = DecodedMessage {
            app: AppInfo { name: "hfdl-cli".into(), ver: "0".into() },
            station: None,
            metadata: sample_metadata(),
            pdu: PduTree::leaf(PduNode::Invalid { raw: vec![], reason: "truncated".into() }),
            raw_frame_hex: None,
        };
        assert!(msg.to_text().contains("13257 kHz"));
    }

    #[test]
    fn spdu_json_node_reports_crc_status() {
        let raw = [0u8; 66];
        let spdu = Spdu::parse(&raw).unwrap();
        let tree = PduTree::leaf(PduNode::Spdu(Box::new(spdu)));
        let node = pdu_tree_to_json(&tree);
        assert_eq!(node["spdu"]["crc_ok"], false);
    }

    #[test]
    fn nested_child_is_rendered_in_json_and_text() {
        let inner = PduTree::leaf(PduNode::Acars {
            direction: AcarsDirection::AirToGround,
            status: AcarsStatus::Complete,
            payload: Some(b"HELLO".to_vec()),
        });
        let outer = PduTree::with_child(
            PduNode::Hfnpdu(Box::new(Hfnpdu {
                type_code: 0xFF,
                body: HfnpduBody::Enveloped { acars: Some(b"ignored".to_vec()) },
            })),
            inner,
        );
        let json = pdu_tree_to_json(&outer);
        assert_eq!(json["child"]["acars"]["text"], "HELLO");
        assert!(pdu_tree_to_text(&outer).contains("HELLO"));
    }
}
