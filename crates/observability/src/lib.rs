//! Shared tracing/logging setup.
//!
//! The ledger engine itself only emits spans and events through `tracing`;
//! whether and how they are rendered is decided here, once, by whichever
//! process hosts the engine (service binary, test harness, benchmarks).

use tracing_subscriber::EnvFilter;

/// Initialize process-wide logging.
///
/// JSON lines on stderr, filtered via `RUST_LOG` (default `info`). Safe to
/// call multiple times; subsequent calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .with_target(false)
        .try_init();
}
