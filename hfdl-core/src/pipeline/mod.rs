//! Pipeline orchestration (§5): a shared channelizer thread broadcasts
//! decimated wideband blocks to one thread per configured channel, each
//! running a [`crate::channel_worker::ChannelWorkerState`]; completed
//! bursts drain into a shared queue that a single PDU-decoder thread turns
//! into [`crate::output::DecodedMessage`] records.
//!
//! Threads communicate only through the types in this module: [`Queue`] for
//! point-to-point links, [`broadcast::ChannelizerBroadcast`] for the
//! channelizer's one-to-many fan-out, and [`shutdown::ShutdownState`] for
//! the two-level cancellation signal every thread polls at its suspension
//! points.

pub mod broadcast;
pub mod burst;
pub mod queue;
pub mod shutdown;

use broadcast::ChannelizerBroadcast;
use burst::BurstRecord;
use queue::{OverflowPolicy, Queue};
use shutdown::{ExitLevel, ShutdownState};

use crate::cache::AircraftCache;
use crate::channel_worker::ChannelWorkerState;
use crate::channelizer::Channelizer;
use crate::config::{ChannelWorkerConfig, ChannelizerConfig, QueueConfig};
use crate::errors::{HfdlError, Result};
use crate::output::{AppInfo, DecodedMessage, PduNode, PduTree};
use crate::pdu::acars::AcarsDirection;
use crate::pdu::hfnpdu::HfnpduBody;
use crate::pdu::mpdu::MpduDirection;
use crate::pdu::{AcarsReassembler, Hfnpdu, Lpdu, Mpdu, Spdu};
use crate::pdu::spdu::SPDU_LEN;
use crate::systable::{GroundStation, SystemTable};
use num_complex::Complex32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Everything a running pipeline hands back to its caller: the queue to
/// feed with wideband I/Q blocks, the queue to drain for decoded messages,
/// and the shutdown switch that stops it.
pub struct Pipeline {
    pub shutdown: Arc<ShutdownState>,
    pub input: Queue<Vec<Complex32>>,
    pub output: Queue<DecodedMessage>,
    workers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Block until every worker thread has exited. Call after requesting
    /// shutdown and draining the output queue to `None`.
    pub fn join(self) {
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

pub struct PipelineResources {
    pub aircraft_cache: Arc<AircraftCache>,
    pub system_table: Arc<SystemTable>,
    pub acars: Arc<AcarsReassembler>,
    pub app: AppInfo,
    /// `--raw-frames` (§11.5): attach a hex dump of the raw PDU octets to
    /// every MPDU-derived message alongside its parse tree.
    pub raw_frames: bool,
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Spin up the shared channelizer plus one worker thread per configured
/// channel, and a single PDU-decoder thread draining their combined burst
/// output. Returns immediately; threads run until `shutdown` reaches
/// [`ExitLevel::Force`] or the input queue's sender is dropped and fully
/// drained.
pub fn spawn(
    channelizer_config: ChannelizerConfig,
    channelizer_taps: Vec<f32>,
    channel_configs: Vec<ChannelWorkerConfig>,
    queue_config: QueueConfig,
    resources: PipelineResources,
) -> Result<Pipeline> {
    if channel_configs.is_empty() {
        return Err(HfdlError::Config(crate::errors::ConfigError::NoChannels));
    }

    let channelizer = Channelizer::create(&channelizer_config, &channelizer_taps)?;
    let shutdown = ShutdownState::new();

    let input: Queue<Vec<Complex32>> = Queue::new(1, OverflowPolicy::Backpressure);
    let burst_queue: Queue<BurstRecord> = Queue::new(
        queue_config.high_water_mark.max(16),
        OverflowPolicy::DropOnOverflow,
    );
    let output: Queue<DecodedMessage> = Queue::new(queue_config.high_water_mark, OverflowPolicy::Backpressure);

    let num_channels = channel_configs.len();
    let broadcast = ChannelizerBroadcast::<Vec<Complex32>>::new(num_channels);

    let mut workers = Vec::with_capacity(num_channels + 2);

    workers.push({
        let input = input.clone();
        let broadcast = broadcast.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || run_channelizer(channelizer, input, broadcast, shutdown, num_channels))
    });

    for cfg in channel_configs {
        let broadcast = broadcast.clone();
        let burst_queue = burst_queue.clone();
        workers.push(thread::spawn(move || run_channel_worker(cfg, broadcast, burst_queue)));
    }

    workers.push({
        let output = output.clone();
        thread::spawn(move || run_pdu_decoder(burst_queue, output, resources, num_channels))
    });

    Ok(Pipeline { shutdown, input, output, workers })
}

/// Pulls wideband blocks off `input`, channelizes each, and publishes the
/// result to every channel worker. Publishes one empty block per consumer
/// as an end-of-stream marker once the input is exhausted or shutdown
/// reaches `Force`.
fn run_channelizer(
    mut channelizer: Channelizer,
    input: Queue<Vec<Complex32>>,
    broadcast: Arc<ChannelizerBroadcast<Vec<Complex32>>>,
    shutdown: Arc<ShutdownState>,
    num_channels: usize,
) {
    let mut logger = crate::logging::HfdlLogger::default();
    loop {
        if shutdown.level() == ExitLevel::Force {
            break;
        }
        match input.recv_timeout(Duration::from_millis(200)) {
            Some(block) => match channelizer.process(&block) {
                Ok(samples) => broadcast.publish(Arc::new(samples)),
                Err(err) => logger.warn("CHANNELIZER", err),
            },
            None if shutdown.level() == ExitLevel::Graceful => break,
            None => {}
        }
    }
    for _ in 0..num_channels {
        broadcast.publish(Arc::new(Vec::new()));
    }
}

/// Feeds each sample of every broadcast block through one channel's DSP
/// chain and framer, forwarding completed bursts. An empty broadcast block
/// is the channelizer's end-of-stream marker: the worker forwards its own
/// [`BurstRecord::shutdown_marker`] so the PDU decoder can track how many
/// channels have finished, then exits.
fn run_channel_worker(
    config: ChannelWorkerConfig,
    broadcast: Arc<ChannelizerBroadcast<Vec<Complex32>>>,
    burst_queue: Queue<BurstRecord>,
) {
    let mut state = ChannelWorkerState::new(config);
    let mut generation = 0u64;
    loop {
        let block = broadcast.recv(&mut generation);
        if block.is_empty() {
            burst_queue.send(BurstRecord::shutdown_marker());
            break;
        }
        for &sample in block.iter() {
            if let Some(mut record) = state.process_sample(sample) {
                stamp_now(&mut record);
                burst_queue.send(record);
            }
        }
    }
}

fn stamp_now(record: &mut BurstRecord) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    record.metadata.rx_timestamp_secs = now.as_secs();
    record.metadata.rx_timestamp_usecs = now.subsec_micros();
}

/// Drains the shared burst queue, decodes each record's PDU chain, and
/// publishes one [`DecodedMessage`] per top-level PDU. Exits (dropping its
/// `output` sender, which propagates end-of-stream to whoever is draining
/// it) once every channel worker has reported its shutdown marker.
fn run_pdu_decoder(
    burst_queue: Queue<BurstRecord>,
    output: Queue<DecodedMessage>,
    resources: PipelineResources,
    num_channels: usize,
) {
    let shutdowns_seen = AtomicUsize::new(0);
    loop {
        let Some(record) = burst_queue.recv_timeout(Duration::from_millis(200)) else {
            continue;
        };
        if record.is_shutdown_marker() {
            if shutdowns_seen.fetch_add(1, Ordering::SeqCst) + 1 == num_channels {
                break;
            }
            continue;
        }

        let station = resources
            .system_table
            .station_for_frequency(record.metadata.channel_freq_khz)
            .map(|s| s.name);

        let is_mpdu = record.pdu.len() != SPDU_LEN;
        let raw_frame_hex = if resources.raw_frames && is_mpdu {
            Some(hex_dump(&record.pdu))
        } else {
            None
        };

        for pdu in decode_burst(&record, &resources) {
            let message = DecodedMessage {
                app: resources.app.clone(),
                station: station.clone(),
                metadata: record.metadata.clone(),
                pdu,
                raw_frame_hex: raw_frame_hex.clone(),
            };
            output.send(message);
        }
    }
}

/// Parses one burst's raw PDU octets into the SPDU/MPDU→LPDU→HFNPDU→ACARS
/// chain. Exactly `SPDU_LEN` octets are dispatched as a squitter; anything
/// else is an MPDU (§4.4). An MPDU carrying more than one LPDU yields one
/// tree per LPDU, each rooted at a clone of the shared MPDU node, since
/// `PduTree` is a singly-linked chain rather than a multi-child tree.
fn decode_burst(record: &BurstRecord, resources: &PipelineResources) -> Vec<PduTree> {
    if record.pdu.len() == SPDU_LEN {
        // The squitter's systable_version is informational only here; the
        // directory itself updates from HFNPDU type 0xD0 entries, not SPDUs.
        return match Spdu::parse(&record.pdu) {
            Ok(spdu) => vec![PduTree::leaf(PduNode::Spdu(Box::new(spdu)))],
            Err(err) => vec![invalid(&record.pdu, &err.to_string())],
        };
    }

    let mpdu = match Mpdu::parse(&record.pdu) {
        Ok(mpdu) => mpdu,
        Err(err) => return vec![invalid(&record.pdu, &err.to_string())],
    };

    let direction = match mpdu.direction {
        MpduDirection::Downlink => AcarsDirection::AirToGround,
        MpduDirection::Uplink => AcarsDirection::GroundToAir,
    };

    // A CRC failure on the MPDU header means the length table it carries
    // cannot be trusted either, so inner layers are not parsed (§7: "mark
    // PDU crc_ok=false, do not parse inner layers, emit with err flag").
    let mut trees = Vec::new();
    if mpdu.crc_ok {
        for block in &mpdu.blocks {
            for payload in &block.lpdu_payloads {
                let child = match Lpdu::parse(payload, record.metadata.channel_freq_khz, Some(&resources.aircraft_cache)) {
                    Ok(lpdu) => decode_lpdu(lpdu, direction, record.metadata.rx_timestamp_secs, resources),
                    Err(err) => invalid(payload, &err.to_string()),
                };
                trees.push(PduTree::with_child(PduNode::Mpdu(Box::new(mpdu.clone())), child));
            }
        }
    }
    if trees.is_empty() {
        trees.push(PduTree::leaf(PduNode::Mpdu(Box::new(mpdu))));
    }
    trees
}

fn decode_lpdu(
    lpdu: Lpdu,
    direction: AcarsDirection,
    rx_timestamp_secs: u64,
    resources: &PipelineResources,
) -> PduTree {
    use crate::pdu::lpdu::LpduPayload;

    let hfnpdu_bytes = if lpdu.crc_ok {
        match &lpdu.payload {
            LpduPayload::UnnumberedData { hfnpdu } | LpduPayload::UnnumberedAckedData { hfnpdu } => {
                Some(hfnpdu.clone())
            }
            _ => None,
        }
    } else {
        None
    };
    let Some(bytes) = hfnpdu_bytes else {
        return PduTree::leaf(PduNode::Lpdu(Box::new(lpdu)));
    };

    let hfnpdu = match Hfnpdu::parse(&bytes) {
        Ok(hfnpdu) => hfnpdu,
        Err(err) => {
            return PduTree::with_child(PduNode::Lpdu(Box::new(lpdu)), invalid(&bytes, &err.to_string()))
        }
    };

    if let HfnpduBody::SystemTable { systable_version, entry, .. } = &hfnpdu.body {
        // The wire format carries no station name; only id/location/frequencies.
        let station = GroundStation {
            id: entry.gs_id,
            name: String::new(),
            lat: entry.lat,
            lon: entry.lon,
            frequencies_khz: entry.frequencies_hz.iter().map(|hz| hz / 1000).collect(),
        };
        resources
            .system_table
            .update_if_newer(*systable_version as u32, vec![station]);
    }

    let acars_child = if let HfnpduBody::Enveloped { acars: Some(raw) } = &hfnpdu.body {
        let (status, payload) = resources.acars.process(direction, raw, rx_timestamp_secs);
        Some(PduTree::leaf(PduNode::Acars { direction, status, payload }))
    } else {
        None
    };

    let hfnpdu_tree = match acars_child {
        Some(child) => PduTree::with_child(PduNode::Hfnpdu(Box::new(hfnpdu)), child),
        None => PduTree::leaf(PduNode::Hfnpdu(Box::new(hfnpdu))),
    };
    PduTree::with_child(PduNode::Lpdu(Box::new(lpdu)), hfnpdu_tree)
}

fn invalid(raw: &[u8], reason: &str) -> PduTree {
    PduTree::leaf(PduNode::Invalid { raw: raw.to_vec(), reason: reason.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fec::fcs;
    use crate::pdu::acars::AcarsStatus;
    use crate::pdu::lpdu::TYPE_UNNUMBERED_DATA;

    fn resources() -> PipelineResources {
        PipelineResources {
            aircraft_cache: Arc::new(AircraftCache::new(600, 60)),
            system_table: Arc::new(SystemTable::new()),
            acars: Arc::new(AcarsReassembler::new()),
            app: AppInfo { name: "hfdl-cli".into(), ver: "0".into() },
            raw_frames: false,
        }
    }

    fn sample_burst(pdu: Vec<u8>) -> BurstRecord {
        BurstRecord {
            metadata: burst::BurstMetadata {
                rx_timestamp_secs: 1_000,
                rx_timestamp_usecs: 0,
                channel_freq_khz: 13_257,
                bit_rate_bps: 1800,
                slot: burst::SlotType::Single,
                freq_err_hz: 0.0,
                sig_level_db: -20.0,
                noise_level_db: -60.0,
            },
            pdu,
            flags: burst::BurstFlags::NONE,
        }
    }

    #[test]
    fn spdu_length_burst_decodes_as_squitter() {
        let record = sample_burst(vec![0u8; SPDU_LEN]);
        let trees = decode_burst(&record, &resources());
        assert_eq!(trees.len(), 1);
        assert!(matches!(trees[0].node, PduNode::Spdu(_)));
    }

    #[test]
    fn mpdu_chain_unwraps_to_acars_text() {
        let acars_frame = {
            let mut f = vec![0x01u8]; // SOH
            f.extend_from_slice(b"N12345 "); // 7-byte registration
            f.push(0); // block id
            f.extend_from_slice(b"HELLO WORLD");
            f.push(0x03); // ETX
            f
        };
        let mut hfnpdu_raw = vec![0xFFu8, 0xFF]; // marker, TYPE_ENVELOPED_DATA
        hfnpdu_raw.extend_from_slice(&acars_frame);

        let mut lpdu_body = vec![TYPE_UNNUMBERED_DATA];
        lpdu_body.extend_from_slice(&hfnpdu_raw);
        let lpdu_wire = fcs::append_fcs(&lpdu_body);

        let mpdu_wire = Mpdu::encode_downlink(7, 3, &[lpdu_wire]);
        let record = sample_burst(mpdu_wire);

        let trees = decode_burst(&record, &resources());
        assert_eq!(trees.len(), 1);

        let mpdu_node = &trees[0];
        assert!(matches!(mpdu_node.node, PduNode::Mpdu(_)));
        let lpdu_node = mpdu_node.child.as_ref().unwrap();
        assert!(matches!(lpdu_node.node, PduNode::Lpdu(_)));
        let hfnpdu_node = lpdu_node.child.as_ref().unwrap();
        assert!(matches!(hfnpdu_node.node, PduNode::Hfnpdu(_)));
        let acars_node = hfnpdu_node.child.as_ref().unwrap();
        match &acars_node.node {
            PduNode::Acars { status, payload, .. } => {
                assert_eq!(*status, AcarsStatus::Complete);
                assert_eq!(payload.as_deref(), Some(&b"HELLO WORLD"[..]));
            }
            other => panic!("expected an ACARS leaf, got {other:?}"),
        }
    }

    #[test]
    fn corrupted_mpdu_header_yields_no_lpdu_children() {
        let lpdu_wire = fcs::append_fcs(&[TYPE_UNNUMBERED_DATA, 0xFF, 0xFF, 0x01]);
        let mut mpdu_wire = Mpdu::encode_downlink(7, 3, &[lpdu_wire]);
        mpdu_wire[2] ^= 0xFF; // corrupt src_id, FCS now mismatches
        let record = sample_burst(mpdu_wire);

        let trees = decode_burst(&record, &resources());
        assert_eq!(trees.len(), 1);
        assert!(trees[0].child.is_none());
        match &trees[0].node {
            PduNode::Mpdu(mpdu) => assert!(!mpdu.crc_ok),
            other => panic!("expected an MPDU leaf, got {other:?}"),
        }
    }

    #[test]
    fn corrupted_lpdu_header_yields_no_hfnpdu_child() {
        let lpdu_body = vec![TYPE_UNNUMBERED_DATA, 0xFF, 0xFF, 0x01];
        let mut corrupted = fcs::append_fcs(&lpdu_body);
        corrupted[1] ^= 0xFF;

        let lpdu = Lpdu::parse(&corrupted, 13_257, None).unwrap();
        assert!(!lpdu.crc_ok);
        let tree = decode_lpdu(lpdu, AcarsDirection::AirToGround, 1_000, &resources());
        assert!(tree.child.is_none());
    }

    #[test]
    fn hex_dump_renders_lowercase_pairs() {
        assert_eq!(hex_dump(&[0xAB, 0x01, 0xFF]), "ab01ff");
    }

    #[test]
    fn spawn_rejects_empty_channel_list() {
        let err = spawn(
            ChannelizerConfig::default(),
            vec![0.0; 64],
            Vec::new(),
            QueueConfig::default(),
            resources(),
        );
        assert!(err.is_err());
    }
}
