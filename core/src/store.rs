use anyhow::{Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::StateError;

/// Persisted run state, keyed by source bucket.
pub trait StateStore {
    /// Epoch seconds of the last successful run, `None` if it never succeeded.
    fn last_success(&self, bucket: &str) -> Result<Option<i64>, StateError>;
    /// Record a successful run at `ts`; returns the value actually stored.
    ///
    /// The stored value never moves backwards.
    fn record_success(&self, bucket: &str, ts: i64) -> Result<i64>;
}

/// State files under the configured log directory.
#[derive(Clone, Debug)]
pub struct FsState {
    root: PathBuf,
}

impl FsState {
    /// State rooted at `dir`. Nothing is created until the first write.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        FsState { root: dir.as_ref().to_path_buf() }
    }

    /// `<root>/<bucket>.last_success`
    pub fn success_path(&self, bucket: &str) -> PathBuf {
        self.root.join(format!("{bucket}.last_success"))
    }

    /// `<root>/<bucket>.log`, handed to the transfer tool.
    pub fn log_path(&self, bucket: &str) -> PathBuf {
        self.root.join(format!("{bucket}.log"))
    }
}

/// Parse an epoch timestamp; fractional values written by older tools are truncated.
fn parse_epoch(txt: &str) -> Option<i64> {
    let t = txt.trim();
    if let Ok(n) = t.parse::<i64>() {
        return Some(n);
    }
    match t.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Some(f.trunc() as i64),
        _ => None,
    }
}

impl StateStore for FsState {
    fn last_success(&self, bucket: &str) -> Result<Option<i64>, StateError> {
        let path = self.success_path(bucket);
        let txt = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StateError::Io { path, source }),
        };
        match parse_epoch(&txt) {
            Some(ts) => Ok(Some(ts)),
            None => Err(StateError::Malformed { path, content: txt.trim().to_string() }),
        }
    }

    fn record_success(&self, bucket: &str, ts: i64) -> Result<i64> {
        let path = self.success_path(bucket);
        let stored = match self.last_success(bucket) {
            Ok(Some(prev)) if prev > ts => prev,
            _ => ts,
        };
        fs::create_dir_all(&self.root)
            .with_context(|| format!("create state dir {}", self.root.display()))?;
        // Write temp then rename so readers never see a torn value.
        let tmp = path.with_extension("last_success.tmp");
        let mut f = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(stored.to_string().as_bytes())
            .and_then(|_| f.sync_all())
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("rename to {}", path.display()))?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_never_succeeded() {
        let dir = tempfile::tempdir().unwrap();
        let st = FsState::new(dir.path());
        assert_eq!(st.last_success("a1").unwrap(), None);
    }

    #[test]
    fn record_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let st = FsState::new(dir.path().join("nested"));
        assert_eq!(st.record_success("a1", 1_700_000_000).unwrap(), 1_700_000_000);
        assert_eq!(st.last_success("a1").unwrap(), Some(1_700_000_000));
        let raw = fs::read_to_string(st.success_path("a1")).unwrap();
        assert_eq!(raw, "1700000000");
        assert!(!st.success_path("a1").with_extension("last_success.tmp").exists());
    }

    #[test]
    fn stored_value_never_moves_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let st = FsState::new(dir.path());
        st.record_success("a1", 2_000).unwrap();
        assert_eq!(st.record_success("a1", 1_000).unwrap(), 2_000);
        assert_eq!(st.last_success("a1").unwrap(), Some(2_000));
        assert_eq!(st.record_success("a1", 3_000).unwrap(), 3_000);
    }

    #[test]
    fn fractional_and_malformed_values() {
        let dir = tempfile::tempdir().unwrap();
        let st = FsState::new(dir.path());
        fs::write(st.success_path("f"), "1712345678.918273\n").unwrap();
        assert_eq!(st.last_success("f").unwrap(), Some(1_712_345_678));

        fs::write(st.success_path("bad"), "yesterday").unwrap();
        match st.last_success("bad") {
            Err(StateError::Malformed { content, .. }) => assert_eq!(content, "yesterday"),
            other => panic!("unexpected {other:?}"),
        }
        // A malformed file does not block recording a new success.
        st.record_success("bad", 42).unwrap();
        assert_eq!(st.last_success("bad").unwrap(), Some(42));
    }

    #[test]
    fn paths_are_keyed_by_bucket() {
        let st = FsState::new("/var/log/sync");
        assert_eq!(st.success_path("a1"), PathBuf::from("/var/log/sync/a1.last_success"));
        assert_eq!(st.log_path("a1"), PathBuf::from("/var/log/sync/a1.log"));
    }
}
