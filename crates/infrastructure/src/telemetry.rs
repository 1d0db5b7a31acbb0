//! Tracing subscriber initialization for engine hosts.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber, honoring `RUST_LOG` and
/// defaulting to `info`. Call once at process start.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
