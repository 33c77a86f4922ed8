use std::io::{self, BufRead, IsTerminal, Write};

use sync_core::due::Selection;
use sync_core::job::JobSpec;
use tracing::info;

/// Ask the operator which bucket to sync when nothing narrower was given.
///
/// Only prompts for `all`, outside silent mode, and on a terminal.
pub fn resolve(selection: Selection, silent: bool, jobs: &[JobSpec]) -> io::Result<Selection> {
    if selection != Selection::All {
        info!("bucket to sync already known ({selection})");
        return Ok(selection);
    }
    if silent || !io::stdin().is_terminal() {
        return Ok(selection);
    }
    prompt(jobs, io::stdin().lock(), io::stdout().lock())
}

/// List the jobs on `out` and read one answer from `input`. Blank means `all`.
pub fn prompt<I: BufRead, O: Write>(jobs: &[JobSpec], mut input: I, mut out: O) -> io::Result<Selection> {
    writeln!(out, "Available jobs:")?;
    for job in jobs {
        writeln!(out, "  * {} - Bucket: {}", job.title, job.bucket)?;
    }
    write!(out, "\nEnter bucket name or 'all': ")?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok(if answer.is_empty() { Selection::All } else { Selection::parse(answer) })
}
