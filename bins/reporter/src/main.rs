use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use sync_core::cfg::{self, AppId, DEFAULT_CONFIG_PATH};
use sync_core::clock::now_secs;
use sync_core::logx;
use sync_core::report::{NtfyReporter, Outcome, Reporter};
use tracing::{error, info};

const APP: AppId = AppId {
    qualifier: "com",
    organization: "quadrumane",
    application: env!("CARGO_PKG_NAME"),
};

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"), version, about = "Send one backup status report")]
struct Cli {
    /// Client name, also the report title
    #[arg(long)]
    client: String,
    /// Machine or bucket the report is about
    #[arg(long)]
    vm: String,
    /// Exit status of the backup
    #[arg(long, allow_hyphen_values = true)]
    status: i32,
    /// Expected days between two backups
    #[arg(long, default_value_t = 1)]
    gap: u64,
    /// Path to the sync configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Log level override (info,debug,trace)
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logx::init(&cli.log);

    match send(&cli).await {
        Ok(()) => {
            info!("report sent for {}", cli.vm);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("report failed: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn send(cli: &Cli) -> anyhow::Result<()> {
    let settings = cfg::load(&cli.config)?.settings(&APP)?;
    let rc = settings.report.context("no `global.report` section in configuration")?;
    let reporter = NtfyReporter::from_config(&rc)?;
    let outcome = Outcome {
        job_title: cli.client.clone(),
        bucket: cli.vm.clone(),
        exit_code: cli.status,
        timestamp: now_secs(),
        max_age_days: cli.gap,
    };
    reporter.report(&outcome).await
}
