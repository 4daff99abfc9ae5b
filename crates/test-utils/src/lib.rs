//! Shared helpers for testwatch's integration tests: inventory and
//! identity builders plus scriptable in-memory executors.

pub mod builders;
pub mod fake_executor;

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber, once per process.
///
/// Output goes through `with_test_writer`, so the harness only shows it
/// for failing tests (or under `-- --nocapture`). Raise the level with
/// `RUST_LOG`, e.g. `RUST_LOG=testwatch=trace cargo test`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_test_writer()
            .init();
    });
}
