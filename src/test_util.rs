//! Shared test support.

/// Installs the test tracing subscriber. Safe to call from every test;
/// only the first call wins.
pub(crate) fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
