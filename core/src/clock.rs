use chrono::{DateTime, Local, Utc};

/// Current epoch time in whole seconds.
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Render epoch seconds in local time with a `strftime` pattern.
pub fn format_local(ts: i64, pattern: &str) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.with_timezone(&Local).format(pattern).to_string(),
        None => ts.to_string(),
    }
}
