mod config;
mod input;
mod logging;
mod telemetry;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use config::{BehaviorConfig, CliConfig, OutputSpec};
use hfdl_core::cache::AircraftCache;
use hfdl_core::config::{ChannelWorkerConfig, ChannelizerConfig, QueueConfig, SampleFormat};
use hfdl_core::dsp::matched_filter::rrc_taps;
use hfdl_core::output::{AppInfo, DecodedMessage, OutputFormat};
use hfdl_core::pdu::AcarsReassembler;
use hfdl_core::pipeline::{self, PipelineResources};
use hfdl_core::systable::SystemTable;
use logging::{DecodedSummary, LogEvent, StructuredLogger};
use telemetry::TelemetryAggregator;

#[derive(Parser, Debug)]
#[command(author, version, about = "HFDL SDR receiver/decoder", long_about = None)]
struct Cli {
    /// Channel frequencies to decode, in kHz. At least one is required.
    #[arg(required = true)]
    channels_khz: Vec<u32>,

    /// Load settings from a TOML config file (merged under CLI overrides).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read samples from this I/Q file instead of a live SDR device.
    #[arg(long, conflicts_with = "soapysdr")]
    iq_file: Option<PathBuf>,

    /// Device string for a live SoapySDR source (not implemented; parsed
    /// for CLI parity and rejected at startup, §11.1).
    #[arg(long, conflicts_with = "iq_file")]
    soapysdr: Option<String>,

    #[arg(long)]
    sample_rate: Option<u32>,

    #[arg(long, value_enum)]
    sample_format: Option<CliSampleFormat>,

    /// Tuned center frequency in kHz. Auto-computed from the requested
    /// channels if omitted (§11.6).
    #[arg(long)]
    centerfreq: Option<i64>,

    #[arg(long)]
    gain: Option<f64>,

    /// `k=v,k2=v2` gain-stage overrides.
    #[arg(long)]
    gain_elements: Option<String>,

    /// `<intype>:<format>:<sink>:k=v,...`, repeatable. Defaults to
    /// `decoded:text:file:path=-` if never given.
    #[arg(long = "output")]
    outputs: Vec<String>,

    #[arg(long)]
    utc: bool,

    #[arg(long)]
    milliseconds: bool,

    #[arg(long)]
    raw_frames: bool,

    #[arg(long)]
    output_mpdus: bool,

    #[arg(long)]
    output_queue_hwm: Option<usize>,

    #[arg(long)]
    station_id: Option<String>,

    #[arg(long)]
    system_table: Option<PathBuf>,

    #[arg(long)]
    system_table_save: Option<PathBuf>,

    /// `host:port`; parsed and logged only (§11.1).
    #[arg(long)]
    statsd: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliSampleFormat {
    Cu8,
    Cs16,
    Cf32,
}

impl From<CliSampleFormat> for SampleFormat {
    fn from(f: CliSampleFormat) -> Self {
        match f {
            CliSampleFormat::Cu8 => SampleFormat::Cu8,
            CliSampleFormat::Cs16 => SampleFormat::Cs16,
            CliSampleFormat::Cf32 => SampleFormat::Cf32,
        }
    }
}

fn parse_gain_elements(spec: &str) -> HashMap<String, String> {
    spec.split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| pair.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
        .collect()
}

/// Fold parsed CLI flags on top of a loaded (or default) `CliConfig`.
fn apply_cli_overrides(mut cfg: CliConfig, args: &Cli) -> Result<CliConfig> {
    if !args.channels_khz.is_empty() {
        cfg.channels_khz = args.channels_khz.clone();
    }
    if let Some(path) = &args.iq_file {
        cfg.input.iq_file = Some(path.clone());
    }
    if let Some(dev) = &args.soapysdr {
        cfg.input.soapysdr = Some(dev.clone());
    }
    if let Some(rate) = args.sample_rate {
        cfg.input.sample_rate_hz = rate;
    }
    if let Some(fmt) = args.sample_format {
        cfg.input.sample_format = fmt.into();
    }
    if let Some(centerfreq) = args.centerfreq {
        cfg.input.centerfreq_khz = Some(centerfreq);
    }
    if let Some(gain) = args.gain {
        cfg.input.gain_db = Some(gain);
    }
    if let Some(elements) = &args.gain_elements {
        cfg.input.gain_elements.extend(parse_gain_elements(elements));
    }
    for spec in &args.outputs {
        cfg.outputs.push(OutputSpec::parse(spec)?);
    }
    cfg.behavior = BehaviorConfig {
        utc: cfg.behavior.utc || args.utc,
        milliseconds: cfg.behavior.milliseconds || args.milliseconds,
        raw_frames: cfg.behavior.raw_frames || args.raw_frames,
        output_mpdus: cfg.behavior.output_mpdus || args.output_mpdus,
        output_queue_hwm: args.output_queue_hwm.unwrap_or(cfg.behavior.output_queue_hwm),
        station_id: args.station_id.clone().or(cfg.behavior.station_id),
        statsd: args.statsd.clone().or(cfg.behavior.statsd),
    };
    if let Some(path) = &args.system_table {
        cfg.system_table.path = Some(path.clone());
    }
    if let Some(path) = &args.system_table_save {
        cfg.system_table.save_path = Some(path.clone());
    }
    if args.verbose {
        cfg.logging.level = config::LogLevel::Debug;
    }
    Ok(cfg)
}

fn load_config(args: &Cli) -> Result<CliConfig> {
    let base = match &args.config {
        Some(path) => CliConfig::from_file(path)
            .wrap_err_with(|| format!("Failed to load config from {}", path.display()))?,
        None => CliConfig::default(),
    };
    let mut cfg = apply_cli_overrides(base, args)?;
    if cfg.outputs.is_empty() {
        cfg.outputs.push(OutputSpec::default());
    }
    if let Some(id) = &cfg.behavior.station_id {
        if id.len() > 255 {
            color_eyre::eyre::bail!("--station-id exceeds 255 characters");
        }
    }
    match (&cfg.input.iq_file, &cfg.input.soapysdr) {
        (Some(_), Some(_)) => color_eyre::eyre::bail!("specify exactly one of --iq-file or --soapysdr"),
        (None, None) => color_eyre::eyre::bail!("one of --iq-file or --soapysdr is required"),
        _ => {}
    }
    if cfg.input.centerfreq_khz.is_none() {
        cfg.input.centerfreq_khz = Some(cfg.compute_centerfreq_khz()?);
    }
    Ok(cfg)
}

/// Open the configured output sinks, keyed by their declared `intype`.
/// Only `decoded` is a real data stream in this build; others are accepted
/// for CLI parity and simply log that they were configured.
fn open_output_writers(outputs: &[OutputSpec]) -> Result<Vec<(OutputFormat, Box<dyn Write + Send>)>> {
    let mut writers = Vec::new();
    for spec in outputs {
        if spec.intype != "decoded" {
            continue;
        }
        let format = match spec.format.as_str() {
            "text" => OutputFormat::Text,
            "json" => OutputFormat::Json,
            "basestation" => OutputFormat::Basestation,
            "binary" => OutputFormat::Binary,
            other => color_eyre::eyre::bail!("unknown output format: {other}"),
        };
        let writer: Box<dyn Write + Send> = match spec.sink.as_str() {
            "file" => {
                let path = spec.params.get("path").map(String::as_str).unwrap_or("-");
                if path == "-" {
                    Box::new(std::io::stdout())
                } else {
                    Box::new(std::fs::File::create(path).wrap_err_with(|| format!("cannot open output file {path}"))?)
                }
            }
            other => color_eyre::eyre::bail!("unsupported output sink: {other}"),
        };
        writers.push((format, writer));
    }
    Ok(writers)
}

fn render(msg: &DecodedMessage, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => msg.to_text(),
        OutputFormat::Json => msg.to_json().to_string(),
        OutputFormat::Basestation | OutputFormat::Binary => msg.to_json().to_string(),
    }
}

fn run() -> Result<()> {
    let args = Cli::parse();
    let cfg = match load_config(&args) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("configuration error: {err:#}");
            std::process::exit(1);
        }
    };

    let mut logger = StructuredLogger::new(cfg.logging.clone())?;
    logger.log(LogEvent::Info {
        message: format!(
            "hfdl-cli starting: channels={:?} input={:?}",
            cfg.channels_khz, cfg.input
        ),
    })?;

    if cfg.input.soapysdr.is_some() {
        logger.log(LogEvent::Error {
            message: "SoapySDR input is not implemented in this build".to_string(),
            details: None,
        })?;
        std::process::exit(2);
    }
    if let Some(statsd) = &cfg.behavior.statsd {
        logger.log(LogEvent::Info {
            message: format!("would emit to statsd://{statsd}"),
        })?;
    }

    let mut writers = open_output_writers(&cfg.outputs)?;

    let channelizer_config = ChannelizerConfig {
        input_sample_rate_hz: cfg.input.sample_rate_hz,
        pre_decimation: 10,
        centerfreq_hz: cfg.input.centerfreq_khz.unwrap_or(0) * 1000,
        ..ChannelizerConfig::default()
    };
    let taps = rrc_taps(hfdl_core::config::SPS, 0.6, 6);
    let channel_configs: Vec<ChannelWorkerConfig> = cfg
        .channels_khz
        .iter()
        .map(|&freq| ChannelWorkerConfig {
            channel: hfdl_core::config::ChannelSpec { frequency_khz: freq },
            ..ChannelWorkerConfig::default()
        })
        .collect();

    let system_table = Arc::new(SystemTable::new());
    if let Some(path) = &cfg.system_table.path {
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read system table {}", path.display()))?;
        system_table
            .load_json(&json)
            .map_err(|e| color_eyre::eyre::eyre!("invalid system table: {e}"))?;
    }

    let resources = PipelineResources {
        aircraft_cache: Arc::new(AircraftCache::new(cfg.cache.ttl_secs, cfg.cache.expiration_interval_secs)),
        system_table: system_table.clone(),
        acars: Arc::new(AcarsReassembler::new()),
        app: AppInfo { name: "hfdl-cli".to_string(), ver: env!("CARGO_PKG_VERSION").to_string() },
        raw_frames: cfg.behavior.raw_frames,
    };

    let pipe = match pipeline::spawn(
        channelizer_config,
        taps,
        channel_configs,
        QueueConfig { high_water_mark: cfg.behavior.output_queue_hwm },
        resources,
    ) {
        Ok(p) => p,
        Err(err) => {
            logger.log(LogEvent::Error { message: format!("pipeline init failed: {err}"), details: None })?;
            std::process::exit(2);
        }
    };

    {
        let shutdown = pipe.shutdown.clone();
        ctrlc::set_handler(move || {
            if shutdown.is_running() {
                shutdown.request_graceful();
            } else {
                shutdown.request_force();
            }
        })
        .wrap_err("failed to install Ctrl-C handler")?;
    }

    let iq_path = cfg.input.iq_file.clone().expect("validated above");
    let input_queue = pipe.input.clone();
    let sample_format = cfg.input.sample_format;
    let input_shutdown = pipe.shutdown.clone();
    let reader_handle =
        std::thread::spawn(move || input::run_iq_file(&iq_path, sample_format, input_queue, input_shutdown));

    let mut telemetry = TelemetryAggregator::new(1.0);
    let start = std::time::Instant::now();

    while let Some(message) = pipe.output.recv_timeout(std::time::Duration::from_millis(500)) {
        let crc_ok = pdu_crc_ok(&message);
        let acars_status = pdu_acars_status(&message);
        telemetry.record_message(crc_ok, acars_status.as_deref());

        logger.log(LogEvent::Decoded(DecodedSummary {
            timestamp: chrono::Utc::now(),
            channel_freq_khz: message.metadata.channel_freq_khz,
            station: message.station.clone(),
            crc_ok,
            acars_status: acars_status.clone(),
        }))?;

        for (format, writer) in writers.iter_mut() {
            writeln!(writer, "{}", render(&message, *format))?;
        }

        if let Some(stats) = telemetry.sample(start.elapsed().as_secs_f64()) {
            logger.log(LogEvent::Statistics(stats))?;
        }
    }

    let _ = reader_handle.join();
    pipe.join();

    if let Some(path) = &cfg.system_table.save_path {
        let snapshot = serde_json::json!({ "version": system_table.version() });
        std::fs::write(path, snapshot.to_string()).wrap_err_with(|| format!("cannot write system table to {}", path.display()))?;
    }

    Ok(())
}

fn pdu_crc_ok(msg: &DecodedMessage) -> bool {
    use hfdl_core::output::PduNode;
    match &msg.pdu.node {
        PduNode::Spdu(s) => s.crc_ok,
        PduNode::Mpdu(m) => m.crc_ok,
        PduNode::Lpdu(l) => l.crc_ok,
        PduNode::Invalid { .. } => false,
        PduNode::Hfnpdu(_) | PduNode::Acars { .. } => true,
    }
}

fn pdu_acars_status(msg: &DecodedMessage) -> Option<String> {
    use hfdl_core::output::PduNode;
    fn walk(tree: &hfdl_core::output::PduTree) -> Option<String> {
        if let PduNode::Acars { status, .. } = &tree.node {
            return Some(format!("{status:?}"));
        }
        tree.child.as_deref().and_then(walk)
    }
    walk(&msg.pdu)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    run()
}
