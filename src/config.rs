//! Channel configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), with production defaults: a 30 second
//! heartbeat and a flat 5 second reconnect delay.

use std::time::Duration;

/// Default keep-alive interval while the connection is open.
const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Default delay before a reconnection attempt after an unexpected close.
/// Flat interval: there is deliberately no backoff and no retry cap.
const DEFAULT_RECONNECT_SECS: u64 = 5;

/// Notification channel configuration.
///
/// Loaded once at startup via [`ChannelConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Base address of the Regami API (e.g. `https://api.regami.app`).
    /// The scheme is upgraded to the WebSocket equivalent when connecting.
    pub base_url: String,

    /// Period between outgoing `ping` frames while the connection is open.
    pub heartbeat_interval: Duration,

    /// Fixed delay before the single reconnection attempt scheduled after
    /// an unexpected close.
    pub reconnect_delay: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_SECS),
        }
    }
}

impl ChannelConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable. Calls
    /// `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            base_url: std::env::var("REGAMI_API_URL").unwrap_or(defaults.base_url),
            heartbeat_interval: duration_from(
                std::env::var("REGAMI_WS_HEARTBEAT_SECS").ok().as_deref(),
                DEFAULT_HEARTBEAT_SECS,
            ),
            reconnect_delay: duration_from(
                std::env::var("REGAMI_WS_RECONNECT_SECS").ok().as_deref(),
                DEFAULT_RECONNECT_SECS,
            ),
        }
    }
}

/// Parses a seconds value, returning `default_secs` on missing or invalid
/// input.
fn duration_from(value: Option<&str>, default_secs: u64) -> Duration {
    let secs = value
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}
