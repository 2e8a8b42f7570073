use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "LYNX_LOG";

/// Installs the global subscriber, writing to stderr. `level_override`
/// wins over `LYNX_LOG`/`RUST_LOG`; with neither, only warnings show.
/// Later calls are no-ops.
pub fn init_tracing(level_override: Option<&str>) {
    INIT.call_once(|| {
        let filter = match level_override {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        };
        let layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);
        // Another subscriber may already be installed by an embedder.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init();
    });
}
