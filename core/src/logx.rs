use tracing_subscriber::{fmt, EnvFilter};

/// Initialize `tracing` once. Respects `RUST_LOG`; falls back to `default_level`.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Map a `-v` count to a level, or `None` to keep the configured one.
pub fn level_for(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}
