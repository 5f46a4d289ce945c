// ABOUTME: Bot configuration with defaults, floors, and optional TOML parsing.
// ABOUTME: All knobs are programmatic; TOML is a convenience entry point.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Floor for the inter-action delay. Driving the UI faster than this risks
/// tripping the chat client's automation detection.
pub const MIN_SENDING_DELAY_MS: u64 = 100;

/// Floor for the poll interval so an empty inbox never busy-loops.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

fn default_sending_delay_ms() -> u64 {
    400
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_connect_timeout_ms() -> u64 {
    15_000
}

fn default_read_timeout_ms() -> u64 {
    10_000
}

/// How the event loop schedules message processing across endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// All messages, across all endpoints, processed one at a time in
    /// arrival order. No two plugin invocations ever overlap.
    #[default]
    Sequential,
    /// Distinct endpoints are dispatched concurrently; messages for the
    /// same endpoint still run in arrival order relative to each other.
    Concurrent,
}

/// Configuration for the bot core, supplied at assembly time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Minimum gap between the starts of two consecutive UI actions.
    #[serde(default = "default_sending_delay_ms")]
    pub sending_delay_ms: u64,
    /// Wait between poll cycles of the event loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Timeout for the initial backend connection.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Timeout for a single read of new messages.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Optional watchdog around each action's execution. A stuck backend
    /// call stalls every queued action behind it, so long-running
    /// deployments should set this.
    #[serde(default)]
    pub action_timeout_ms: Option<u64>,
    /// Bound on the number of queued actions. `None` leaves the queue
    /// unbounded; `Some(n)` makes submissions fail once n are pending.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    /// Message scheduling policy.
    #[serde(default)]
    pub dispatch_mode: DispatchMode,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            sending_delay_ms: default_sending_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            action_timeout_ms: None,
            queue_capacity: None,
            dispatch_mode: DispatchMode::Sequential,
        }
    }
}

impl BotConfig {
    /// Parse a config from TOML text and apply the safety floors.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(text).map_err(|e| Error::Invalid(format!("invalid config: {e}")))?;
        config.validate();
        Ok(config)
    }

    /// Clamp values that would make the bot unsafe or unusable.
    pub fn validate(&mut self) {
        if self.sending_delay_ms < MIN_SENDING_DELAY_MS {
            tracing::warn!(
                configured = self.sending_delay_ms,
                floor = MIN_SENDING_DELAY_MS,
                "sending delay below safety floor, clamping"
            );
            self.sending_delay_ms = MIN_SENDING_DELAY_MS;
        }
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            tracing::warn!(
                configured = self.poll_interval_ms,
                floor = MIN_POLL_INTERVAL_MS,
                "poll interval below floor, clamping"
            );
            self.poll_interval_ms = MIN_POLL_INTERVAL_MS;
        }
        if self.queue_capacity == Some(0) {
            tracing::warn!("queue capacity of 0 would reject every action, treating as unbounded");
            self.queue_capacity = None;
        }
    }

    pub fn sending_delay(&self) -> Duration {
        Duration::from_millis(self.sending_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout_ms.map(Duration::from_millis)
    }
}
