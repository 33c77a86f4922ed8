use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Seconds in one day.
pub const DAY_SECS: u64 = 86_400;
/// Staleness window used when a job does not set `max_age_days`.
pub const DEFAULT_MAX_AGE_DAYS: u64 = 30;

/// Transfer verb passed to the transfer tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Copy new and changed files, never delete.
    Copy,
    /// Make target identical to source.
    Sync,
    /// Move files from source to target.
    Move,
    /// Two-way synchronization.
    Bisync,
    /// Compare source and target without transferring.
    Check,
}

impl SyncMode {
    /// Verb as understood by the transfer tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Copy => "copy",
            SyncMode::Sync => "sync",
            SyncMode::Move => "move",
            SyncMode::Bisync => "bisync",
            SyncMode::Check => "check",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the `jobs:` list, as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDef {
    /// Human label.
    pub title: String,
    /// Transfer verb.
    #[serde(rename = "type")]
    pub sync_mode: SyncMode,
    /// Source provider alias.
    pub source: String,
    /// Target provider alias.
    pub target: String,
    /// Provider alias to bucket name.
    pub buckets: BTreeMap<String, String>,
    /// Namespace the target by the source bucket name.
    #[serde(default)]
    pub create_subfolder: bool,
    /// Staleness window in days.
    #[serde(default)]
    pub max_age_days: Option<u64>,
}

/// Immutable description of one sync job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Human label.
    pub title: String,
    /// Transfer verb.
    pub sync_mode: SyncMode,
    /// Source bucket name; keys the lock and state files.
    pub bucket: String,
    /// `<backend>:<bucket>` of the source.
    pub source_endpoint: String,
    /// `<backend>:<bucket>[/<source bucket>/]` of the target.
    pub target_endpoint: String,
    /// Whether the target is namespaced by the source bucket.
    pub create_subfolder: bool,
    /// Staleness window in days, as configured.
    pub max_age_days: u64,
    /// Staleness window in seconds.
    pub max_age_seconds: u64,
}

impl JobSpec {
    /// Resolve provider aliases and buckets of `def` against `providers`.
    pub fn resolve(def: &JobDef, providers: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let (source_endpoint, bucket) = endpoint(def, &def.source, providers)?;
        let (mut target_endpoint, _) = endpoint(def, &def.target, providers)?;
        if def.create_subfolder {
            target_endpoint = format!("{target_endpoint}/{bucket}/");
        }
        let max_age_days = def.max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS);
        Ok(JobSpec {
            title: def.title.clone(),
            sync_mode: def.sync_mode,
            bucket,
            source_endpoint,
            target_endpoint,
            create_subfolder: def.create_subfolder,
            max_age_days,
            max_age_seconds: max_age_days.saturating_mul(DAY_SECS),
        })
    }
}

fn endpoint(
    def: &JobDef,
    alias: &str,
    providers: &BTreeMap<String, String>,
) -> Result<(String, String), ConfigError> {
    let backend = providers.get(alias).ok_or_else(|| ConfigError::UnknownProvider {
        job: def.title.clone(),
        alias: alias.to_string(),
    })?;
    let bucket = def.buckets.get(alias).ok_or_else(|| ConfigError::MissingBucket {
        job: def.title.clone(),
        alias: alias.to_string(),
    })?;
    Ok((format!("{backend}:{bucket}"), bucket.clone()))
}
