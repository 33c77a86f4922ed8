mod recorder;
mod runner;
mod scheduler;
mod select;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use sync_core::cfg::{self, AppId, DEFAULT_CONFIG_PATH};
use sync_core::due::Selection;
use sync_core::logx;
use sync_core::report::{NoReporter, NtfyReporter};
use sync_core::store::FsState;
use tracing::{debug, error, info, warn};

use crate::runner::Runner;
use crate::scheduler::{exit_status, JobState, Plan, RunError, Scheduler};
use crate::shutdown::Shutdown;

const APP: AppId = AppId {
    qualifier: "com",
    organization: "quadrumane",
    application: env!("CARGO_PKG_NAME"),
};

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"), version, about = "Run due rclone sync jobs from a YAML configuration")]
struct Cli {
    /// Source bucket to sync, `all` or `none`
    #[arg(short, long, default_value = "all")]
    bucket: String,
    /// Ignore the schedule, run anyway
    #[arg(short, long)]
    force: bool,
    /// Never prompt for a bucket (scripting mode)
    #[arg(short, long)]
    silent: bool,
    /// Path to the sync configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// More logs (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only display, does not run the sync jobs
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = cfg::load(&cli.config);
    let level = logx::level_for(cli.verbose)
        .map(str::to_string)
        .or_else(|| loaded.as_ref().ok().map(|c| c.global.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    logx::init(&level);

    match run(cli, loaded).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#} - exiting");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli, loaded: Result<cfg::Config, sync_core::error::ConfigError>) -> anyhow::Result<u8> {
    let config = loaded?;
    let settings = config.settings(&APP)?;
    let jobs = config.job_specs()?;
    info!("{} jobs loaded from {}", jobs.len(), cli.config.display());

    let selection = select::resolve(Selection::parse(&cli.bucket), cli.silent, &jobs)?;
    let plan = Plan {
        selection,
        forced: cli.force,
        dry_run: cli.dry_run,
        verbose: cli.verbose > 0 || cli.dry_run,
    };

    let shutdown = Shutdown::install().context("install signal handlers")?;
    let runner = Runner::new(settings.transfer.clone(), settings.lock_dir.clone(), &settings.log_dir, shutdown);
    let store = FsState::new(&settings.log_dir);

    let result = match &settings.report {
        Some(rc) => {
            let reporter = NtfyReporter::from_config(rc)?;
            Scheduler::new(runner, store, reporter)
                .fail_on_report_error(rc.fail_on_error)
                .run_all(&jobs, &plan)
                .await
        }
        None => Scheduler::new(runner, store, NoReporter).run_all(&jobs, &plan).await,
    };

    match result {
        Ok(summary) => {
            for (title, state) in &summary.jobs {
                if let JobState::Recorded(out) = state {
                    debug!(
                        "{title}: exit={} recorded_at={:?} state_failed={} report_failed={}",
                        out.exit_code, out.recorded_at, out.state_failed, out.report_failed
                    );
                }
            }
            if summary.exit_code == 0 {
                info!("all due jobs succeeded");
            } else {
                warn!("one or more jobs failed (aggregate {})", summary.exit_code);
            }
            Ok(exit_status(summary.exit_code))
        }
        Err(RunError::Interrupted) => {
            error!("interrupted - remaining jobs not started");
            Ok(130)
        }
        Err(e) => Err(e.into()),
    }
}
