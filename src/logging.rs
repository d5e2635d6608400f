//! Structured logging (C16), feature-gated behind `tracing` so the library
//! stays dependency-light when embedded; the CLI binary always enables it.
//! Phase boundaries log at `info` with the counts an operator cares about
//! (`k`, `vertex_count`, `edge_count`, `thread_count`); per-vertex/per-edge
//! detail is `trace`, off by default even with logging enabled.

#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG`
/// (defaulting to `info`) as the process-wide default. Safe to call more
/// than once; later calls are no-ops if a subscriber is already set.
#[cfg(feature = "tracing")]
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// No-op when the `tracing` feature is disabled, so callers never need to
/// `cfg`-gate the call site itself.
#[cfg(not(feature = "tracing"))]
pub fn init() {}

/// Logs a build's phase boundary at `info`, or does nothing without the
/// `tracing` feature. Called once per phase (database load, MPHF build,
/// state population, extraction, metadata write) from [`crate::builder`].
#[cfg(feature = "tracing")]
pub fn phase(name: &str, k: usize, vertex_count: u64, edge_count: u64, thread_count: usize) {
    tracing::info!(
        phase = name,
        k,
        vertex_count,
        edge_count,
        thread_count,
        "cdBG build phase"
    );
}

#[cfg(not(feature = "tracing"))]
pub fn phase(_name: &str, _k: usize, _vertex_count: u64, _edge_count: u64, _thread_count: usize) {}

#[cfg(all(test, feature = "tracing"))]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn phase_emits_an_info_log_with_expected_fields() {
        phase("extraction", 31, 100, 250, 4);
        assert!(logs_contain("cdBG build phase"));
    }
}
