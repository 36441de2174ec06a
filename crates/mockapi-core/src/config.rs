use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use jsonschema::{validator_for, Validator};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::profile::DEFAULT_FALLBACK_BASE_DIR;
use crate::resolver::SiblingMatch;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 1024;

/// Minimum severity that reaches the log sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    All,
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    Off,
}

impl LogLevel {
    /// `tracing` has no fatal level; fatal messages are logged as errors.
    pub fn as_filter_directive(self) -> &'static str {
        match self {
            LogLevel::All | LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
            LogLevel::Off => "off",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(LogLevel::All),
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            "off" => Ok(LogLevel::Off),
            other => Err(ConfigError::Invalid(format!("unknown log level: {other}"))),
        }
    }
}

/// How often the access-log file rolls over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

/// Per-request access lines on the `http.access` target.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AccessLogConfig {
    pub enabled: bool,
    /// Keep one line out of every `sample_n` requests.
    pub sample_n: u64,
    /// Report the first `X-Forwarded-For`/`Forwarded` hop as the remote.
    pub trust_forward_headers: bool,
    /// Also write access lines to rolling files in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub rotation: LogRotation,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_n: 1,
            trust_forward_headers: false,
            directory: None,
            file_prefix: "http-access".to_string(),
            rotation: LogRotation::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Directory holding this profile's response files.
    pub response_file_base_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct MockServerConfig {
    pub port: u16,
    pub bind: String,
    /// Profile made active at startup; must name a registered profile.
    pub initial_active_profile: Option<String>,
    pub profiles: BTreeMap<String, ProfileConfig>,
    /// Every immediate subdirectory becomes a profile of the same name.
    pub profile_directory: Option<PathBuf>,
    /// Searched while no profile is active.
    pub fallback_base_dir: PathBuf,
    pub sibling_match: SiblingMatch,
    pub log_level: LogLevel,
    pub access_log: AccessLogConfig,
    pub concurrency_limit: usize,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            initial_active_profile: None,
            profiles: BTreeMap::new(),
            profile_directory: None,
            fallback_base_dir: PathBuf::from(DEFAULT_FALLBACK_BASE_DIR),
            sibling_match: SiblingMatch::default(),
            log_level: LogLevel::default(),
            access_log: AccessLogConfig::default(),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

impl MockServerConfig {
    pub fn with_profile(mut self, name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.profiles.insert(
            name.into(),
            ProfileConfig {
                response_file_base_path: dir.into(),
            },
        );
        self
    }

    pub fn with_initial_active_profile(mut self, name: impl Into<String>) -> Self {
        self.initial_active_profile = Some(name.into());
        self
    }

    /// With no profile source configured at all, serve `./resources/default`
    /// as the active `default` profile.
    pub fn apply_builtin_defaults(&mut self) {
        if self.profiles.is_empty() && self.profile_directory.is_none() {
            self.profiles.insert(
                DEFAULT_PROFILE.to_string(),
                ProfileConfig {
                    response_file_base_path: PathBuf::from("./resources/default"),
                },
            );
            if self.initial_active_profile.is_none() {
                self.initial_active_profile = Some(DEFAULT_PROFILE.to_string());
            }
        }
    }

    pub fn static_profiles(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.profiles
            .iter()
            .map(|(name, cfg)| (name.as_str(), cfg.response_file_base_path.as_path()))
    }
}

static CONFIG_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema_value = config_schema_json();
    validator_for(&schema_value).expect("valid schema")
});

/// JSON schema describing the configuration file.
///
/// # Panics
///
/// Panics if schema generation fails; this indicates a programming error.
pub fn config_schema_json() -> serde_json::Value {
    let schema = schemars::schema_for!(MockServerConfig);
    serde_json::to_value(&schema).expect("schema json")
}

pub fn parse_config(content: &str) -> Result<MockServerConfig, ConfigError> {
    let raw: toml::Value = toml::from_str(content)?;
    let json_value =
        serde_json::to_value(&raw).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    let validation_errors: Vec<_> = CONFIG_SCHEMA
        .iter_errors(&json_value)
        .map(|e| e.to_string())
        .collect();
    if !validation_errors.is_empty() {
        return Err(ConfigError::Invalid(validation_errors.join(", ")));
    }
    Ok(toml::from_str(content)?)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<MockServerConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}
