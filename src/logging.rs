//! Tracing subscriber setup.

use crate::config::LoggingConfig;
use crate::error::{MailQError, MailQResult};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Install a global `tracing` subscriber built from `config`.
///
/// `RUST_LOG` takes precedence over `config.level` when set. Fails if a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> MailQResult<()> {
    let level: tracing::Level = config.level.into();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.include_targets);

    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| MailQError::Logging {
        message: e.to_string(),
    })
}
