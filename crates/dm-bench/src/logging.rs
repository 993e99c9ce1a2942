use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Install a subscriber that logs to stdout and honours `RUST_LOG`.
///
/// Defaults to the "info" level when the variable is unset.
pub fn init_subscriber() {
    let fmt_layer = fmt::layer().with_target(true);

    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
