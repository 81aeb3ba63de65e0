//! Tracing subscriber setup.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a stderr fmt layer. `RUST_LOG` wins; otherwise `warn`, or `debug` when verbose.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    // A subscriber may already be installed by a host or a test harness.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
