use tracing_subscriber::EnvFilter;

/// Initializes structured logging to stderr. `--log-level` is used as the
/// default filter directive, overridable by `RUST_LOG` the way
/// `EnvFilter` normally behaves.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
