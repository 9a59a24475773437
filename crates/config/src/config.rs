//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Keys that must be present in every configuration document
pub const REQUIRED_KEYS: &[&str] = &[
    "qp_value",
    "video_codec",
    "audio_codec",
    "preset_val",
    "op_extension",
    "input_folder",
    "output_folder",
    "archive_folder",
    "log_file",
    "csv_filename_pattern",
    "video_extensions",
    "retry_wait_seconds",
];

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// JSON parsing error
    Json(serde_json::Error),
    /// Top level of the document is not a table/object
    NotATable,
    /// One or more required keys are absent
    MissingKeys(Vec<String>),
    /// A present key holds an unusable value
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Json(e) => write!(f, "Failed to parse JSON config: {}", e),
            ConfigError::NotATable => write!(f, "Config document must be a table of keys"),
            ConfigError::MissingKeys(keys) => {
                write!(f, "Missing required config keys: {}", keys.join(", "))
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

fn default_encoder_bin() -> String {
    "ffmpeg".to_string()
}

fn default_probe_bin() -> String {
    "ffprobe".to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Constant quantization value passed as `-qp`
    pub qp_value: u32,
    /// Video codec passed as `-c:v` (e.g. `hevc_nvenc`)
    pub video_codec: String,
    /// Audio codec passed as `-c:a`
    pub audio_codec: String,
    /// Encoder preset passed as `-preset`
    pub preset_val: String,
    /// Extension of produced files, without the leading dot
    pub op_extension: String,
    /// Directory watched for new files
    pub input_folder: PathBuf,
    /// Directory receiving transcoded files
    pub output_folder: PathBuf,
    /// Directory receiving originals after a successful transcode
    pub archive_folder: PathBuf,
    /// Log file path
    pub log_file: PathBuf,
    /// strftime pattern for the per-run CSV report name
    pub csv_filename_pattern: String,
    /// Recognized input suffixes, matched case-insensitively
    pub video_extensions: Vec<String>,
    /// Idle wait between empty scans
    pub retry_wait_seconds: u64,
    /// Encoder executable
    #[serde(default = "default_encoder_bin")]
    pub encoder_bin: String,
    /// Probe executable
    #[serde(default = "default_probe_bin")]
    pub probe_bin: String,
}

/// Collect the required keys for which `present` returns false
fn missing_keys(present: impl Fn(&str) -> bool) -> Vec<String> {
    REQUIRED_KEYS
        .iter()
        .filter(|key| !present(key))
        .map(|key| key.to_string())
        .collect()
}

impl Config {
    /// Load configuration from a file
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as TOML.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::parse_json(&content)
        } else {
            Self::parse_toml(&content)
        }
    }

    /// Parse configuration from a TOML string
    ///
    /// Every missing required key is reported at once before deserializing.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        let missing = missing_keys(|key| table.contains_key(key));
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }
        let config: Config = toml::Value::Table(table).try_into()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string
    pub fn parse_json(content: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let object = value.as_object().ok_or(ConfigError::NotATable)?;
        let missing = missing_keys(|key| object.contains_key(key));
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }
        let config: Config = serde_json::from_value(value)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - BATCH_INPUT_FOLDER -> input_folder
    /// - BATCH_OUTPUT_FOLDER -> output_folder
    /// - BATCH_ARCHIVE_FOLDER -> archive_folder
    /// - BATCH_QP_VALUE -> qp_value
    /// - BATCH_RETRY_WAIT_SECONDS -> retry_wait_seconds
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("BATCH_INPUT_FOLDER") {
            if !val.is_empty() {
                self.input_folder = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("BATCH_OUTPUT_FOLDER") {
            if !val.is_empty() {
                self.output_folder = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("BATCH_ARCHIVE_FOLDER") {
            if !val.is_empty() {
                self.archive_folder = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("BATCH_QP_VALUE") {
            if let Ok(qp) = val.parse::<u32>() {
                self.qp_value = qp;
            }
        }

        if let Ok(val) = env::var("BATCH_RETRY_WAIT_SECONDS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.retry_wait_seconds = secs;
            }
        }
    }

    /// Reject empty values that would make the pipeline meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        let strings = [
            ("video_codec", self.video_codec.as_str()),
            ("audio_codec", self.audio_codec.as_str()),
            ("preset_val", self.preset_val.as_str()),
            ("op_extension", self.op_extension.as_str()),
            ("csv_filename_pattern", self.csv_filename_pattern.as_str()),
            ("encoder_bin", self.encoder_bin.as_str()),
            ("probe_bin", self.probe_bin.as_str()),
        ];
        for (key, value) in strings {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", key)));
            }
        }

        let paths = [
            ("input_folder", &self.input_folder),
            ("output_folder", &self.output_folder),
            ("archive_folder", &self.archive_folder),
            ("log_file", &self.log_file),
        ];
        for (key, value) in paths {
            if value.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", key)));
            }
        }

        if self.video_extensions.is_empty()
            || self.video_extensions.iter().any(|ext| ext.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "video_extensions must list at least one non-empty suffix".to_string(),
            ));
        }

        if self.retry_wait_seconds == 0 {
            return Err(ConfigError::Invalid(
                "retry_wait_seconds must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from file, apply environment overrides and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
