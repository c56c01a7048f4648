//! Configuration: the TOML settings file and the validated per-run stream
//! settings derived from it and the command line.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, StreamError};
use crate::protocol::Identity;

/// Default screen-share service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://amc.czcs.xyz";
/// Bounded frame queue size between capture and send.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub endpoint: EndpointConfig,
    pub stream: StreamDefaults,
    pub timing: TimingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Bootstrap POSTs go here, frames go to `<base_url>/<key>`.
    pub base_url: String,
    /// Identification header sent with every request.
    pub header_name: String,
    pub header_value: String,
}

/// Values used when the command line leaves them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDefaults {
    /// Display to capture (1-based).
    pub display_index: usize,
    /// Ceiling on one serialized frame envelope, in bytes.
    pub max_json_bytes: u64,
    /// Account name sent with every frame. Prompted for when empty.
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause after each captured frame.
    pub frame_delay_ms: u64,
    /// How long the producer waits on a full queue before dropping a frame.
    pub enqueue_timeout_ms: u64,
    /// How long the consumer waits on an empty queue before re-checking
    /// for cancellation.
    pub dequeue_timeout_ms: u64,
    pub request_timeout_secs: u64,
    /// How often the controller checks whether a worker gave up.
    pub poll_interval_ms: u64,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            header_name: "IHate".into(),
            header_value: "Zen".into(),
        }
    }
}

impl Default for StreamDefaults {
    fn default() -> Self {
        Self {
            display_index: 1,
            max_json_bytes: 300_000,
            user_name: String::new(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            frame_delay_ms: 50,
            enqueue_timeout_ms: 1000,
            dequeue_timeout_ms: 1000,
            request_timeout_secs: 5,
            poll_interval_ms: 1000,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl FileConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StreamError::config(e.to_string()))
    }
}

impl TimingConfig {
    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ── Stream config ────────────────────────────────────────────────

/// Everything a single streaming run needs to know about *what* to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub session_key: String,
    pub envelope_byte_budget: u64,
    /// 1-based display number
    pub display_index: usize,
    pub host_name: String,
    pub user_name: String,
}

impl StreamConfig {
    /// Reject anything that would make the session pointless or undefined.
    pub fn validate(&self) -> Result<()> {
        if self.session_key.trim().is_empty() {
            return Err(StreamError::config("session key cannot be empty"));
        }
        if self.user_name.trim().is_empty() {
            return Err(StreamError::config("username cannot be empty"));
        }
        if self.envelope_byte_budget == 0 {
            return Err(StreamError::config("max JSON bytes must be positive"));
        }
        if PixelBudget::from_envelope_bytes(self.envelope_byte_budget).max_pixels == 0 {
            return Err(StreamError::config(format!(
                "max JSON bytes {} leaves room for no pixels at all",
                self.envelope_byte_budget
            )));
        }
        if self.display_index == 0 {
            return Err(StreamError::config("display number starts at 1"));
        }
        Ok(())
    }

    pub fn identity(&self) -> Identity {
        Identity {
            host_name: self.host_name.clone(),
            user_name: self.user_name.clone(),
        }
    }

    pub fn budget(&self) -> PixelBudget {
        PixelBudget::from_envelope_bytes(self.envelope_byte_budget)
    }
}

/// How many raw pixels fit in an envelope of a given serialized size.
///
/// Base64 inflates by 4/3, so three quarters of the envelope is available
/// for raw bytes, and each RGBA pixel costs four of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBudget {
    pub max_raw_bytes: u64,
    pub max_pixels: u64,
}

impl PixelBudget {
    pub fn from_envelope_bytes(envelope_bytes: u64) -> Self {
        // floor(bytes * 0.75) without going through floats or overflowing
        let max_raw_bytes = envelope_bytes / 4 * 3 + envelope_bytes % 4 * 3 / 4;
        Self {
            max_raw_bytes,
            max_pixels: max_raw_bytes / 4,
        }
    }
}

/// Machine name for frame envelopes, "unknown" when the OS won't say.
pub fn local_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
