//! Shared helpers for integration tests.

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. Scope lifecycle events are emitted only when the crate is
/// built with the `tracing-integration` feature.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_ansi(false)
            .with_thread_ids(true)
            .try_init();
    });
}
