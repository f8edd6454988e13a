//! Tracing subscriber setup.
//!
//! Log output goes to stdout through a fmt layer. Verbosity defaults to `info` and is controlled
//! with `RUST_LOG`, e.g.:
//!
//! ```bash
//! RUST_LOG=blogd=debug,tower_http=debug blogd serve
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
