//! Configuration management for ledger replay.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Replay configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Ledger node and log queries
    pub ledger: LedgerConfig,
    /// Off-chain content store
    pub content: ContentConfig,
    /// Diagnostics
    pub logging: LoggingConfig,
}

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// RPC endpoint of the ledger node
    pub rpc_url: String,
    /// First block worth querying (contract deployment)
    pub start_block: u64,
    /// Maximum number of blocks per gap query
    pub gap_batch_size: u64,
}

/// Content store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Content store API endpoint
    pub url: String,
    /// Per-payload fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
}

impl ContentConfig {
    /// Per-payload fetch timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives (e.g. `ticketsync=debug`)
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    #[must_use]
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            ledger: LedgerConfig {
                rpc_url: var("LEDGER_RPC_URL").unwrap_or_else(|| "http://localhost:8545".to_string()),
                start_block: var("LEDGER_START_BLOCK")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
                gap_batch_size: var("LEDGER_GAP_BATCH_SIZE")
                    .and_then(|s| s.parse().ok())
                    .filter(|size| *size > 0)
                    .unwrap_or(5000),
            },
            content: ContentConfig {
                url: var("CONTENT_STORE_URL").unwrap_or_else(|| "http://localhost:5001".to_string()),
                fetch_timeout_ms: var("CONTENT_FETCH_TIMEOUT_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            },
            logging: LoggingConfig {
                filter: var("RUST_LOG").unwrap_or_else(|| "ticketsync=info".to_string()),
            },
        }
    }
}
