use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "SWITCHBOARD_LOG";

/// Installs the fmt subscriber once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
