//! Structured logging for burst/PDU decode events and periodic statistics.

use crate::config::{LogFormat, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Structured log event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// A decoded PDU message, in addition to whatever output sink it was
    /// also written to (this is the operational log, not the data stream).
    Decoded(DecodedSummary),

    /// Periodic statistics snapshot.
    Statistics(StatisticsEvent),

    Info { message: String },
    Warn { message: String },
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedSummary {
    pub timestamp: DateTime<Utc>,
    pub channel_freq_khz: u32,
    pub station: Option<String>,
    pub crc_ok: bool,
    pub acars_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub bursts_decoded: u64,
    pub fcs_failures: u64,
    pub acars_complete: u64,
    pub acars_other: u64,
    pub output_overflow_count: u64,
}

/// Logger that writes one `LogEvent` per line in the configured format.
pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config
                    .file_path
                    .as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("File path required for file logging"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self {
            config,
            writer,
            start_time: Utc::now(),
        })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => self.format_json(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event),
            LogFormat::Pretty => self.format_pretty(&event),
        };

        writeln!(self.writer, "{}", output)?;
        self.writer.flush()?;

        Ok(())
    }

    fn format_json(&self, event: &LogEvent) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }

    fn format_logfmt(&self, event: &LogEvent) -> String {
        let ts = Utc::now().to_rfc3339();
        match event {
            LogEvent::Decoded(d) => format!(
                "ts=\"{}\" type=decoded freq={} station=\"{}\" crc_ok={} acars=\"{}\"",
                ts,
                d.channel_freq_khz,
                d.station.as_deref().unwrap_or(""),
                d.crc_ok,
                d.acars_status.as_deref().unwrap_or("")
            ),
            LogEvent::Statistics(s) => format!(
                "ts=\"{}\" type=statistics duration_secs={:.2} bursts={} fcs_failures={} acars_complete={} output_overflow={}",
                ts, s.duration_secs, s.bursts_decoded, s.fcs_failures, s.acars_complete, s.output_overflow_count
            ),
            LogEvent::Info { message } => format!("ts=\"{}\" level=info msg=\"{}\"", ts, message),
            LogEvent::Warn { message } => format!("ts=\"{}\" level=warn msg=\"{}\"", ts, message),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("ts=\"{}\" level=error msg=\"{}\" details=\"{}\"", ts, message, d),
                None => format!("ts=\"{}\" level=error msg=\"{}\"", ts, message),
            },
        }
    }

    fn format_pretty(&self, event: &LogEvent) -> String {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match event {
            LogEvent::Decoded(d) => format!(
                "[{}] BURST [{} kHz] station={} crc_ok={} acars={}",
                ts,
                d.channel_freq_khz,
                d.station.as_deref().unwrap_or("?"),
                d.crc_ok,
                d.acars_status.as_deref().unwrap_or("-")
            ),
            LogEvent::Statistics(s) => format!(
                "[{}] STATS ({:.2}s): bursts={} fcs_failures={} acars_complete={} overflow={}",
                ts, s.duration_secs, s.bursts_decoded, s.fcs_failures, s.acars_complete, s.output_overflow_count
            ),
            LogEvent::Info { message } => format!("[{}] INFO: {}", ts, message),
            LogEvent::Warn { message } => format!("[{}] WARN: {}", ts, message),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("[{}] ERROR: {} | {}", ts, message, d),
                None => format!("[{}] ERROR: {}", ts, message),
            },
        }
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
