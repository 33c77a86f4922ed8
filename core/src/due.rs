use std::fmt;

use tracing::{info, warn};

use crate::clock::format_local;
use crate::job::JobSpec;
use crate::store::StateStore;

/// Which jobs an invocation targets. Resolved once, before any due-ness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every configured job.
    All,
    /// No job at all.
    None,
    /// Only the job whose source bucket matches.
    Bucket(String),
}

impl Selection {
    /// `"all"` and `"none"` are keywords, anything else names a bucket.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "all" => Selection::All,
            "none" => Selection::None,
            bucket => Selection::Bucket(bucket.to_string()),
        }
    }

    /// Whether the job keyed by `bucket` is selected.
    pub fn includes(&self, bucket: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::None => false,
            Selection::Bucket(b) => b == bucket,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::None => f.write_str("none"),
            Selection::Bucket(b) => f.write_str(b),
        }
    }
}

/// Outcome of a due-ness check, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Excluded by the selection; wins over forcing.
    NotSelected,
    /// Forced by the caller.
    Forced,
    /// No success recorded yet.
    FirstRun,
    /// The state file could not be used; treated as a first run.
    StateUnusable,
    /// Last success is older than the staleness window.
    Stale {
        /// Epoch seconds of the last success.
        last_success: i64,
    },
    /// Last success is within the staleness window.
    TooRecent {
        /// Epoch seconds of the last success.
        last_success: i64,
    },
}

impl Verdict {
    /// Whether the job must run now.
    pub fn is_due(&self) -> bool {
        !matches!(self, Verdict::NotSelected | Verdict::TooRecent { .. })
    }
}

/// Decide whether `job` must run at `now` (epoch seconds).
///
/// Reads the job's success timestamp from `store` and nothing else.
pub fn check<S: StateStore>(
    job: &JobSpec,
    selection: &Selection,
    forced: bool,
    store: &S,
    now: i64,
) -> Verdict {
    if !selection.includes(&job.bucket) {
        info!("{}: SKIPPED - not the wanted bucket ({selection})", job.title);
        return Verdict::NotSelected;
    }
    if forced {
        info!("{}: TO RUN - forced by argument", job.title);
        return Verdict::Forced;
    }

    let last_success = match store.last_success(&job.bucket) {
        Ok(Some(ts)) => ts,
        Ok(None) => {
            info!("{}: TO RUN - first execution", job.title);
            return Verdict::FirstRun;
        }
        Err(e) => {
            warn!("{}: TO RUN - {e}, treating as first execution", job.title);
            return Verdict::StateUnusable;
        }
    };

    let when = format_local(last_success, "%Y-%m-%d at %H:%M:%S");
    let age = now.saturating_sub(last_success);
    if age >= 0 && age as u64 >= job.max_age_seconds {
        info!("{}: TO RUN - too old (last success on {when})", job.title);
        Verdict::Stale { last_success }
    } else {
        info!("{}: SKIPPED - too recent (last success on {when})", job.title);
        Verdict::TooRecent { last_success }
    }
}

/// Boolean form of [`check`].
pub fn is_due<S: StateStore>(
    job: &JobSpec,
    selection: &Selection,
    forced: bool,
    store: &S,
    now: i64,
) -> bool {
    check(job, selection, forced, store, now).is_due()
}
