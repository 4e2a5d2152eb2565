use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber for native hosts, filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
    if result.is_ok() {
        tracing::debug!("tracing initialized");
    }
}
