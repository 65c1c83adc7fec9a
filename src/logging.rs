use tracing_subscriber::EnvFilter;

/// Build the filter: RUST_LOG wins, otherwise the configured directive
fn build_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the stderr subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(default_directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(default_directive))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
