use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "generator_service=info";

/// Default filter for an operator binary whose events carry its own crate
/// name as target.
pub fn directive_for_binary(binary: &str) -> String {
    format!("{DEFAULT_DIRECTIVE},{binary}=info")
}

/// Console logging for the daemon and the operator binaries.
pub fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second init (tests, embedded use) keeps the existing subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
