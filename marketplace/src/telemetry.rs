//! Tracing subscriber setup for binaries and tools embedding the replay core.

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Errors raised while installing the global subscriber.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The filter directives could not be parsed.
    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter {
        /// Rejected directives.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Tracing already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Install a `fmt` subscriber filtered by `config.filter`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for unparsable directives and
/// [`TelemetryError::AlreadyInitialized`] when called twice in one process.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: config.filter.clone(),
        reason: e.to_string(),
    })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(filter = %config.filter, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_directives() {
        let config = LoggingConfig {
            filter: "ticketsync=loudest".to_string(),
        };
        assert!(matches!(
            init_tracing(&config),
            Err(TelemetryError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn second_init_is_an_error() {
        let config = LoggingConfig {
            filter: "ticketsync=debug".to_string(),
        };
        let first = init_tracing(&config);
        let second = init_tracing(&config);
        // Another test in this binary may have installed a subscriber first.
        assert!(first.is_ok() || matches!(first, Err(TelemetryError::AlreadyInitialized(_))));
        assert!(matches!(second, Err(TelemetryError::AlreadyInitialized(_))));
    }
}
