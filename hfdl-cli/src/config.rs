//! CLI-specific configuration structures for TOML-based configuration.

use color_eyre::eyre::{Context, Result};
use hfdl_core::config::{CacheConfig, SampleFormat, SystemTableConfig};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Deep merge JSON values - override takes precedence over base.
/// For objects, recursively merge; for arrays and primitives, override replaces base.
fn merge_json_values(base: &mut JsonValue, override_val: JsonValue) {
    match (base, override_val) {
        (JsonValue::Object(base_map), JsonValue::Object(override_map)) => {
            for (key, value) in override_map {
                if let Some(base_value) = base_map.get_mut(&key) {
                    merge_json_values(base_value, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_val, override_val) => {
            *base_val = override_val;
        }
    }
}

/// Accept both a single string and an array of strings for `include`.
fn deserialize_include_optional<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    let opt: Option<StringOrVec> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(Vec::new()),
        Some(StringOrVec::String(s)) => Ok(vec![s]),
        Some(StringOrVec::Vec(v)) => Ok(v),
    }
}

/// Complete CLI configuration bundle, loadable from TOML with `include` merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Optional path(s) to other config file(s) to include (relative to this
    /// config's directory). Supports single string or array of strings.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_include_optional")]
    pub include: Vec<String>,

    /// Requested channel frequencies in kHz (mandatory, §6).
    #[serde(default)]
    pub channels_khz: Vec<u32>,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub outputs: Vec<OutputSpec>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub system_table: SystemTableConfig,

    #[serde(default)]
    pub behavior: BehaviorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            channels_khz: Vec::new(),
            input: InputConfig::default(),
            outputs: Vec::new(),
            cache: CacheConfig::default(),
            system_table: SystemTableConfig::default(),
            behavior: BehaviorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Selects the sample producer: exactly one of `iq_file` or `soapysdr` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub iq_file: Option<PathBuf>,
    pub soapysdr: Option<String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,
    #[serde(default)]
    pub sample_format: SampleFormat,
    /// kHz; `None` means auto-compute the midpoint per §11.6.
    pub centerfreq_khz: Option<i64>,
    pub gain_db: Option<f64>,
    #[serde(default)]
    pub gain_elements: HashMap<String, String>,
}

fn default_sample_rate() -> u32 {
    192_000
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            iq_file: None,
            soapysdr: None,
            sample_rate_hz: default_sample_rate(),
            sample_format: SampleFormat::default(),
            centerfreq_khz: None,
            gain_db: None,
            gain_elements: HashMap::new(),
        }
    }
}

/// One `--output <intype>:<format>:<sink>:k=v,...` spec (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub intype: String,
    pub format: String,
    pub sink: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            intype: "decoded".to_string(),
            format: "text".to_string(),
            sink: "file".to_string(),
            params: HashMap::from([("path".to_string(), "-".to_string())]),
        }
    }
}

impl OutputSpec {
    /// Parse `intype:format:sink:k=v,k2=v2`.
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.splitn(4, ':').collect();
        if parts.len() < 3 {
            color_eyre::eyre::bail!("invalid output spec: {spec:?}");
        }
        let mut params = HashMap::new();
        if let Some(kv) = parts.get(3) {
            for pair in kv.split(',').filter(|s| !s.is_empty()) {
                let (k, v) = pair
                    .split_once('=')
                    .ok_or_else(|| color_eyre::eyre::eyre!("invalid output param {pair:?} in spec {spec:?}"))?;
                params.insert(k.to_string(), v.to_string());
            }
        }
        Ok(Self {
            intype: parts[0].to_string(),
            format: parts[1].to_string(),
            sink: parts[2].to_string(),
            params,
        })
    }
}

/// Behavioral flags (§6, §11.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default)]
    pub utc: bool,
    #[serde(default)]
    pub milliseconds: bool,
    #[serde(default)]
    pub raw_frames: bool,
    #[serde(default)]
    pub output_mpdus: bool,
    #[serde(default)]
    pub output_queue_hwm: usize,
    pub station_id: Option<String>,
    /// `host:port`; parsed and logged only, no live StatsD emission (§11.1).
    pub statsd: Option<String>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            utc: false,
            milliseconds: false,
            raw_frames: false,
            output_mpdus: false,
            output_queue_hwm: 0,
            station_id: None,
            statsd: None,
        }
    }
}

/// Structured-logging sink configuration, mirroring the teacher's CLI logger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

fn default_log_target() -> LogTarget {
    LogTarget::Stderr
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            target: default_log_target(),
            file_path: None,
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Convert CLI logging config to the core ring-buffer logger's config.
    pub fn to_core_log_config(&self) -> hfdl_core::logging::LogConfig {
        use hfdl_core::logging::{LogConfig as CoreLogConfig, LogLevel as CoreLogLevel};

        let level = match self.level {
            LogLevel::Debug => CoreLogLevel::Debug,
            LogLevel::Info => CoreLogLevel::Info,
            LogLevel::Warn => CoreLogLevel::Warn,
            LogLevel::Error => CoreLogLevel::Error,
        };

        CoreLogConfig {
            level,
            enable_timing: true,
            enable_carrier: true,
            enable_framing: true,
            enable_fec: true,
            max_entries: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Logfmt,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl CliConfig {
    /// Load configuration from a TOML file, resolving `include` directives
    /// as a deep merge with included files taking lower priority than this
    /// file's own fields.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let config_toml: toml::Value =
            toml::from_str(&content).wrap_err("Failed to parse TOML configuration")?;
        let mut config_json =
            serde_json::to_value(&config_toml).wrap_err("Failed to convert TOML to JSON")?;

        let includes = match config_json.get("include") {
            Some(JsonValue::String(s)) => vec![s.clone()],
            Some(JsonValue::Array(arr)) => arr.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
            _ => Vec::new(),
        };

        if let JsonValue::Object(ref mut map) = config_json {
            map.remove("include");
        }

        let mut base_json =
            serde_json::to_value(Self::default()).wrap_err("Failed to create default config")?;

        for include_path in &includes {
            let include_full_path = if Path::new(include_path).is_absolute() {
                PathBuf::from(include_path)
            } else {
                path.parent().unwrap_or_else(|| Path::new(".")).join(include_path)
            };

            let included_config = Self::from_file(&include_full_path)
                .wrap_err_with(|| format!("Failed to load included config: {}", include_full_path.display()))?;
            let included_json = serde_json::to_value(&included_config)
                .wrap_err("Failed to convert included config to JSON")?;
            merge_json_values(&mut base_json, included_json);
        }

        merge_json_values(&mut base_json, config_json);

        let config: CliConfig =
            serde_json::from_value(base_json).wrap_err("Failed to parse final configuration")?;
        Ok(config)
    }

    /// Midpoint of the requested channels, §11.6. Fails if the span is not
    /// smaller than the configured sample rate.
    pub fn compute_centerfreq_khz(&self) -> Result<i64> {
        let (min, max) = self
            .channels_khz
            .iter()
            .fold(None, |acc: Option<(u32, u32)>, &f| match acc {
                None => Some((f, f)),
                Some((lo, hi)) => Some((lo.min(f), hi.max(f))),
            })
            .ok_or_else(|| color_eyre::eyre::eyre!("no channel frequencies specified"))?;
        let span_khz = (max - min) as f64;
        let sample_rate_khz = self.input.sample_rate_hz as f64 / 1000.0;
        if span_khz >= sample_rate_khz {
            color_eyre::eyre::bail!(
                "requested channel span {span_khz} kHz >= sample rate {sample_rate_khz} kHz"
            );
        }
        Ok((min as i64 + max as i64) / 2)
    }
}
