use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use sync_core::cfg::TransferSettings;
use sync_core::error::LockError;
use sync_core::job::JobSpec;
use sync_core::lock::BucketLock;
use sync_core::store::FsState;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};

use crate::shutdown::Shutdown;

/// Exit code reported when the transfer tool cannot be started.
pub const EXIT_SPAWN_FAILED: i32 = 127;
/// Exit code reported when the transfer hits its timeout.
pub const EXIT_TIMED_OUT: i32 = 124;

/// Program and arguments of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Space-joined form, for logs only.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What one execution attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    /// The attempt got past lock acquisition.
    pub ran: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A stop was requested; the pass must end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

/// Runs one transfer at a time under the job's bucket lock.
#[derive(Debug, Clone)]
pub struct Runner {
    transfer: TransferSettings,
    lock_dir: PathBuf,
    log_dir: PathBuf,
    logs: FsState,
    shutdown: Shutdown,
}

impl Runner {
    pub fn new(transfer: TransferSettings, lock_dir: PathBuf, log_dir: &Path, shutdown: Shutdown) -> Self {
        Runner {
            transfer,
            lock_dir,
            log_dir: log_dir.to_path_buf(),
            logs: FsState::new(log_dir),
            shutdown,
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// `<tool> <mode> --config <conf> <src> <dst> <flags...> --log-file=<log_dir>/<bucket>.log`
    pub fn invocation(&self, job: &JobSpec) -> Invocation {
        let mut args = vec![
            job.sync_mode.as_str().to_string(),
            "--config".to_string(),
            self.transfer.conf_file.display().to_string(),
            job.source_endpoint.clone(),
            job.target_endpoint.clone(),
        ];
        args.extend(self.transfer.flags.iter().cloned());
        args.push(format!("--log-file={}", self.logs.log_path(&job.bucket).display()));
        Invocation { program: self.transfer.binary.clone(), args }
    }

    /// Take the bucket lock, run the transfer, release the lock.
    ///
    /// Lock contention is a failed attempt (`exit_code = 1`, `ran = false`),
    /// never a wait.
    pub async fn execute(&self, job: &JobSpec) -> Result<ExecutionResult, Interrupted> {
        let lock = match BucketLock::try_acquire(&self.lock_dir, &job.bucket) {
            Ok(lock) => lock,
            Err(LockError::Contended(_)) => {
                warn!(
                    "{}: another process is already running for {}, skipping",
                    job.title, job.bucket
                );
                return Ok(ExecutionResult { exit_code: 1, ran: false });
            }
            Err(e) => {
                error!("{}: {e}", job.title);
                return Ok(ExecutionResult { exit_code: 1, ran: false });
            }
        };
        debug!("{}: holding {}", job.title, lock.path().display());

        // The tool opens its --log-file itself and fails when the directory is missing.
        if let Err(e) = fs::create_dir_all(&self.log_dir) {
            error!("{}: create log dir {}: {e}", job.title, self.log_dir.display());
            return Ok(ExecutionResult { exit_code: 1, ran: true });
        }

        let inv = self.invocation(job);
        let result = self.spawn_and_wait(job, &inv).await;
        drop(lock);
        result
    }

    async fn spawn_and_wait(&self, job: &JobSpec, inv: &Invocation) -> Result<ExecutionResult, Interrupted> {
        let mut child = match Command::new(&inv.program).args(&inv.args).kill_on_drop(true).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("{}: cannot start {}: {e}", job.title, inv.program);
                return Ok(ExecutionResult { exit_code: EXIT_SPAWN_FAILED, ran: true });
            }
        };

        let waited = tokio::select! {
            w = wait(&mut child, self.transfer.timeout) => w,
            _ = self.shutdown.wait() => Waited::Interrupted,
        };

        let exit_code = match waited {
            Waited::Exited(Ok(status)) => exit_code(status),
            Waited::Exited(Err(e)) => {
                error!("{}: waiting for {} failed: {e}", job.title, inv.program);
                1
            }
            Waited::TimedOut => {
                error!("{}: transfer timed out, killing it", job.title);
                let _ = child.kill().await;
                EXIT_TIMED_OUT
            }
            Waited::Interrupted => {
                error!("{}: interrupted, stopping transfer", job.title);
                let _ = child.kill().await;
                return Err(Interrupted);
            }
        };
        Ok(ExecutionResult { exit_code, ran: true })
    }
}

enum Waited {
    Exited(io::Result<ExitStatus>),
    TimedOut,
    Interrupted,
}

async fn wait(child: &mut Child, limit: Option<Duration>) -> Waited {
    match limit {
        Some(d) => match tokio::time::timeout(d, child.wait()).await {
            Ok(r) => Waited::Exited(r),
            Err(_) => Waited::TimedOut,
        },
        None => Waited::Exited(child.wait().await),
    }
}

/// Exit code of a finished child; `128 + signal` when it was killed.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}
