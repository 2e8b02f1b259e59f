//! Diagnostic logging to stderr.

use anyhow::{anyhow, Context, Result};
use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive, e.g. `taskscope_core=debug`.
pub const LOG_ENV_VAR: &str = "TASKSCOPE_LOG";

/// Level used when neither the environment nor the flags choose one.
///
/// `verbose` wins over the configured level, which wins over `warn`.
pub fn default_level(verbose: bool, configured: Option<&str>) -> Result<LevelFilter> {
    if verbose {
        return Ok(LevelFilter::DEBUG);
    }
    match configured {
        Some(level) => level
            .parse()
            .with_context(|| format!("invalid log level '{level}'")),
        None => Ok(LevelFilter::WARN),
    }
}

/// Install the global subscriber. `TASKSCOPE_LOG` overrides `default`.
pub fn init(default: LevelFilter) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}
