use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems; raised before any job is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("read config {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file could not be parsed.
    #[error("parse config {path}: {message}")]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
    /// No job listed in the configuration.
    #[error("no job listed in configuration")]
    NoJobs,
    /// A job references a provider alias that is not declared.
    #[error("job {job:?}: unknown provider alias {alias:?}")]
    UnknownProvider {
        /// Job title.
        job: String,
        /// Alias that failed to resolve.
        alias: String,
    },
    /// A job has no bucket for one of its provider aliases.
    #[error("job {job:?}: no bucket configured for provider {alias:?}")]
    MissingBucket {
        /// Job title.
        job: String,
        /// Alias without a bucket.
        alias: String,
    },
    /// No usable log directory could be resolved.
    #[error("cannot resolve a log directory: {0}")]
    LogDir(String),
}

/// Failure to read a persisted success timestamp.
#[derive(Debug, Error)]
pub enum StateError {
    /// The file exists but does not hold an epoch timestamp.
    #[error("malformed state file {path}: {content:?}")]
    Malformed {
        /// State file path.
        path: PathBuf,
        /// Offending content (trimmed).
        content: String,
    },
    /// The file exists but could not be read.
    #[error("read state file {path}: {source}")]
    Io {
        /// State file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Failure to take a bucket lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process holds the lock.
    #[error("lock {0} is held by another process")]
    Contended(PathBuf),
    /// The lock file could not be opened or locked.
    #[error("lock {path}: {source}")]
    Io {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
