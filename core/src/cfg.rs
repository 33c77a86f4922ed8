use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::job::{JobDef, JobSpec};

/// Identifier used to compute per-app default directories.
#[derive(Clone, Copy)]
pub struct AppId {
    /// Reverse-DNS style qualifier, e.g. `"com"`.
    pub qualifier: &'static str,
    /// Organization or vendor name, e.g. `"quadrumane"`.
    pub organization: &'static str,
    /// Application name, e.g. `"syncer"`.
    pub application: &'static str,
}

/// Default location of the sync configuration.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/quadrumane/sync.yml";

/// Sync configuration as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Options shared by every job.
    pub global: Global,
    /// Ordered job definitions.
    #[serde(default)]
    pub jobs: Option<Vec<JobDef>>,
}

/// `global:` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    /// Tracing level to use if `RUST_LOG` is not set (e.g. `"info"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory holding the per-bucket lock files.
    #[serde(default)]
    pub lock_dir: Option<PathBuf>,
    /// Transfer tool settings.
    pub rclone: Rclone,
    /// Notification sink; reports are disabled when absent.
    #[serde(default)]
    pub report: Option<ReportConfig>,
}

/// `global.rclone:` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rclone {
    /// Transfer executable.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Kill the transfer after this many seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Filesystem locations.
    pub paths: Paths,
    /// Flag name to value; see [`OptionValue::to_flag`].
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
    /// Provider alias to backend prefix.
    #[serde(default)]
    pub providers: BTreeMap<String, String>,
}

/// `global.rclone.paths:` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    /// Directory for `<bucket>.log` and `<bucket>.last_success`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Transfer tool configuration file.
    pub conf_file: PathBuf,
}

/// Value of one transfer option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// `true` is a bare switch, `false` omits the flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value; the literal `switch_arg` is a bare switch.
    Text(String),
}

impl OptionValue {
    /// Render as a command line flag, or `None` when disabled.
    pub fn to_flag(&self, name: &str) -> Option<String> {
        match self {
            OptionValue::Bool(false) => None,
            OptionValue::Bool(true) => Some(format!("--{name}")),
            OptionValue::Text(s) if s == "switch_arg" => Some(format!("--{name}")),
            OptionValue::Text(s) => Some(format!("--{name}={s}")),
            OptionValue::Int(n) => Some(format!("--{name}={n}")),
            OptionValue::Float(f) => Some(format!("--{name}={f}")),
        }
    }
}

/// `global.report:` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Endpoint receiving the POSTed report.
    pub url: String,
    /// Pre-shared key used to encrypt the payload.
    #[serde(default)]
    pub psk_file: Option<PathBuf>,
    /// `backups_type` field of the payload.
    #[serde(default = "default_backups_type")]
    pub backups_type: String,
    /// Expected run time announced for every weekday in the payload.
    #[serde(default = "default_window")]
    pub window: String,
    /// Count a failed report as a job failure in the exit status.
    #[serde(default)]
    pub fail_on_error: bool,
}

fn default_log_level() -> String { "info".to_string() }
fn default_binary() -> String { "rclone".to_string() }
fn default_backups_type() -> String { "Syncer".to_string() }
fn default_window() -> String { "21:00".to_string() }

/// Resolved options for building a transfer invocation.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Executable name or path.
    pub binary: String,
    /// Value passed to `--config`.
    pub conf_file: PathBuf,
    /// Global flags, sorted by option name.
    pub flags: Vec<String>,
    /// Optional hard limit per transfer.
    pub timeout: Option<Duration>,
}

/// Global options with every default applied.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Log level fallback.
    pub log_level: String,
    /// Directory for logs and success timestamps.
    pub log_dir: PathBuf,
    /// Directory for lock files.
    pub lock_dir: PathBuf,
    /// Transfer tool options.
    pub transfer: TransferSettings,
    /// Notification sink.
    pub report: Option<ReportConfig>,
}

/// Read and parse a configuration file. `.toml` files use TOML, anything else YAML.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let txt = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    parse(path, &txt)
}

fn parse(path: &Path, txt: &str) -> Result<Config, ConfigError> {
    let parse_err = |message: String| ConfigError::Parse { path: path.to_path_buf(), message };
    if path.extension().is_some_and(|e| e == "toml") {
        toml::from_str(txt).map_err(|e| parse_err(e.to_string()))
    } else {
        serde_yaml::from_str(txt).map_err(|e| parse_err(e.to_string()))
    }
}

impl Config {
    /// Resolve global options, filling defaults for `app`.
    pub fn settings(&self, app: &AppId) -> Result<Settings, ConfigError> {
        let rclone = &self.global.rclone;
        let log_dir = match &rclone.paths.log_dir {
            Some(dir) => dir.clone(),
            None => default_log_dir(app)?,
        };
        let lock_dir = self.global.lock_dir.clone().unwrap_or_else(std::env::temp_dir);
        let flags = rclone
            .options
            .iter()
            .filter_map(|(name, value)| value.to_flag(name))
            .collect();
        Ok(Settings {
            log_level: self.global.log_level.clone(),
            log_dir,
            lock_dir,
            transfer: TransferSettings {
                binary: rclone.binary.clone(),
                conf_file: rclone.paths.conf_file.clone(),
                flags,
                timeout: rclone.timeout_secs.map(Duration::from_secs),
            },
            report: self.global.report.clone(),
        })
    }

    /// Build the ordered job list. An empty list is a configuration error.
    pub fn job_specs(&self) -> Result<Vec<JobSpec>, ConfigError> {
        let defs = self.jobs.as_deref().unwrap_or_default();
        if defs.is_empty() {
            return Err(ConfigError::NoJobs);
        }
        defs.iter()
            .map(|def| JobSpec::resolve(def, &self.global.rclone.providers))
            .collect()
    }
}

/// Per-user data directory used when `log_dir` is not configured.
pub fn default_log_dir(app: &AppId) -> Result<PathBuf, ConfigError> {
    let pd = ProjectDirs::from(app.qualifier, app.organization, app.application)
        .ok_or_else(|| ConfigError::LogDir("failed to resolve ProjectDirs".to_string()))?;
    Ok(pd.data_local_dir().join("logs"))
}
