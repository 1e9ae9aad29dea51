use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "orderflow=info,tower_http=info";

/// Installs the global subscriber. Logs go to stderr so that command
/// output on stdout stays machine-readable. Safe to call more than once.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
