use sync_core::clock::now_secs;
use sync_core::due::{self, Selection};
use sync_core::job::JobSpec;
use sync_core::report::Reporter;
use sync_core::store::StateStore;
use thiserror::Error;
use tracing::{debug, info};

use crate::recorder::{JobOutcome, Recorder};
use crate::runner::{Interrupted, Runner};

/// Selection and flags, resolved before any job is looked at.
#[derive(Debug, Clone)]
pub struct Plan {
    pub selection: Selection,
    pub forced: bool,
    pub dry_run: bool,
    /// Log the full transfer command at info level.
    pub verbose: bool,
}

/// Terminal state of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Skipped,
    DrySkipped,
    Recorded(JobOutcome),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("no job listed in configuration")]
    NoJobs,
    #[error("interrupted by signal")]
    Interrupted,
}

impl From<Interrupted> for RunError {
    fn from(_: Interrupted) -> Self {
        RunError::Interrupted
    }
}

/// Per-job states in configuration order, plus the aggregate exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub jobs: Vec<(String, JobState)>,
    /// Sum of per-job contributions; any non-zero value means a failure.
    pub exit_code: i64,
}

/// Runs every due job, one after another.
pub struct Scheduler<S, R> {
    runner: Runner,
    store: S,
    reporter: R,
    fail_on_report_error: bool,
}

impl<S: StateStore, R: Reporter> Scheduler<S, R> {
    pub fn new(runner: Runner, store: S, reporter: R) -> Self {
        Scheduler { runner, store, reporter, fail_on_report_error: false }
    }

    /// Count a failed report as a job failure.
    pub fn fail_on_report_error(mut self, yes: bool) -> Self {
        self.fail_on_report_error = yes;
        self
    }

    pub async fn run_all(&self, jobs: &[JobSpec], plan: &Plan) -> Result<Summary, RunError> {
        if jobs.is_empty() {
            return Err(RunError::NoJobs);
        }

        let mut states = Vec::with_capacity(jobs.len());
        for job in jobs {
            if self.runner.shutdown().requested() {
                return Err(RunError::Interrupted);
            }
            let state = self.run_one(job, plan).await?;
            states.push((job.title.clone(), state));
        }

        let exit_code = states
            .iter()
            .map(|(_, st)| match st {
                JobState::Recorded(out) => out.contribution(self.fail_on_report_error),
                JobState::Skipped | JobState::DrySkipped => 0,
            })
            .sum();
        Ok(Summary { jobs: states, exit_code })
    }

    async fn run_one(&self, job: &JobSpec, plan: &Plan) -> Result<JobState, Interrupted> {
        if !due::is_due(job, &plan.selection, plan.forced, &self.store, now_secs()) {
            return Ok(JobState::Skipped);
        }

        let cmd = self.runner.invocation(job).command_line();
        if plan.verbose || plan.dry_run {
            info!("{cmd}");
        } else {
            debug!("{cmd}");
        }
        info!("{}: Running in {} mode", job.title, job.sync_mode);

        if plan.dry_run {
            info!("{}: >>> Dry run: skipping execution", job.title);
            return Ok(JobState::DrySkipped);
        }

        let result = self.runner.execute(job).await?;
        let recorder = Recorder::new(&self.store, &self.reporter);
        // Polled first so the timestamp is written before a pending stop is seen.
        tokio::select! {
            biased;
            outcome = recorder.record(job, result, now_secs()) => Ok(JobState::Recorded(outcome)),
            _ = self.runner.shutdown().wait() => Err(Interrupted),
        }
    }
}

/// Process exit status for an aggregate: 0 stays 0, anything else lands in 1..=255.
pub fn exit_status(aggregate: i64) -> u8 {
    if aggregate == 0 {
        0
    } else {
        aggregate.clamp(1, 255) as u8
    }
}
