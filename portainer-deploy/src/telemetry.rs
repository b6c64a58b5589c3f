//! Logging initialization.
//!
//! Output goes to stderr through a `tracing-subscriber` fmt layer so that the build pipeline
//! running the deployment captures it alongside its own output. Filtering follows `RUST_LOG` when
//! set, e.g.
//!
//! ```bash
//! # Log HTTP request and response bodies
//! export RUST_LOG="portainer_deploy=debug,info"
//! ```
//!
//! Without `RUST_LOG` the level is `info`, or the equivalent of the line above with `--verbose`.

use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "info";
const VERBOSE_FILTER: &str = "portainer_deploy=debug,info";

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry(verbose: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    debug!(verbose, "Telemetry initialized");
    Ok(())
}
