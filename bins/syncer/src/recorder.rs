use sync_core::job::JobSpec;
use sync_core::report::{normalize_status, Outcome, Reporter};
use sync_core::store::StateStore;
use tracing::{error, info, warn};

use crate::runner::ExecutionResult;

/// Everything known about one executed job. Transfer and reporting failures
/// are kept apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub exit_code: i32,
    /// Success timestamp written by this run.
    pub recorded_at: Option<i64>,
    /// The transfer succeeded but its timestamp could not be written.
    pub state_failed: bool,
    /// The transfer succeeded but the report did not get through.
    pub report_failed: bool,
}

impl JobOutcome {
    /// Contribution to the aggregate exit status.
    pub fn contribution(&self, fail_on_report_error: bool) -> i64 {
        let mut n = i64::from(self.exit_code).abs();
        if self.state_failed {
            n += 1;
        }
        if self.report_failed && fail_on_report_error {
            n += 1;
        }
        n
    }
}

/// Persists success timestamps and forwards outcome reports.
pub struct Recorder<'a, S, R> {
    store: &'a S,
    reporter: &'a R,
}

impl<'a, S: StateStore, R: Reporter> Recorder<'a, S, R> {
    pub fn new(store: &'a S, reporter: &'a R) -> Self {
        Recorder { store, reporter }
    }

    /// Record `result` of `job` at `now`. Failures never touch the stored timestamp.
    pub async fn record(&self, job: &JobSpec, result: ExecutionResult, now: i64) -> JobOutcome {
        let mut out = JobOutcome {
            exit_code: result.exit_code,
            recorded_at: None,
            state_failed: false,
            report_failed: false,
        };

        if !result.success() {
            if result.ran {
                error!("{}: >>> Failed (exit code {})", job.title, result.exit_code);
            } else {
                error!("{}: >>> Failed (not started)", job.title);
            }
            return out;
        }

        info!("{}: >>> Success", job.title);
        match self.store.record_success(&job.bucket, now) {
            Ok(ts) => out.recorded_at = Some(ts),
            Err(e) => {
                error!("{}: success not recorded: {e:#}", job.title);
                out.state_failed = true;
            }
        }

        let outcome = Outcome {
            job_title: job.title.clone(),
            bucket: job.bucket.clone(),
            exit_code: normalize_status(result.exit_code),
            timestamp: now,
            max_age_days: job.max_age_days,
        };
        if let Err(e) = self.reporter.report(&outcome).await {
            warn!("{}: report not sent: {e:#}", job.title);
            out.report_failed = true;
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use sync_core::store::FsState;

    use crate::runner::tests::job;

    /// Collects outcomes; fails every call when `fail` is set.
    #[derive(Default)]
    pub(crate) struct MemReporter {
        pub(crate) sent: RefCell<Vec<Outcome>>,
        pub(crate) fail: bool,
    }

    impl Reporter for MemReporter {
        async fn report(&self, outcome: &Outcome) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("sink unreachable");
            }
            self.sent.borrow_mut().push(outcome.clone());
            Ok(())
        }
    }

    const NOW: i64 = 1_760_000_000;

    #[tokio::test]
    async fn success_writes_timestamp_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsState::new(dir.path());
        let rep = MemReporter::default();
        let out = Recorder::new(&store, &rep)
            .record(&job("a1"), ExecutionResult { exit_code: 0, ran: true }, NOW)
            .await;
        assert_eq!(out.recorded_at, Some(NOW));
        assert_eq!(out.contribution(false), 0);
        assert_eq!(store.last_success("a1").unwrap(), Some(NOW));
        let sent = rep.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bucket, "a1");
        assert_eq!(sent[0].max_age_days, 1);
        assert_eq!(sent[0].exit_code, 0);
    }

    #[tokio::test]
    async fn failure_leaves_timestamp_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsState::new(dir.path());
        store.record_success("a1", NOW - 90_000).unwrap();
        let rep = MemReporter::default();
        let out = Recorder::new(&store, &rep)
            .record(&job("a1"), ExecutionResult { exit_code: 2, ran: true }, NOW)
            .await;
        assert_eq!(out.recorded_at, None);
        assert_eq!(out.contribution(true), 2);
        assert_eq!(store.last_success("a1").unwrap(), Some(NOW - 90_000));
        assert!(rep.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn report_failure_keeps_the_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsState::new(dir.path());
        let rep = MemReporter { fail: true, ..Default::default() };
        let out = Recorder::new(&store, &rep)
            .record(&job("a1"), ExecutionResult { exit_code: 0, ran: true }, NOW)
            .await;
        assert!(out.report_failed);
        assert_eq!(out.exit_code, 0);
        assert_eq!(store.last_success("a1").unwrap(), Some(NOW));
        assert_eq!(out.contribution(false), 0);
        assert_eq!(out.contribution(true), 1);
    }

    #[tokio::test]
    async fn unwritable_state_counts_against_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        // State root below a regular file cannot be created.
        let store = FsState::new(blocker.join("state"));
        let rep = MemReporter::default();
        let out = Recorder::new(&store, &rep)
            .record(&job("a1"), ExecutionResult { exit_code: 0, ran: true }, NOW)
            .await;
        assert!(out.state_failed);
        assert_eq!(out.contribution(false), 1);
    }
}
