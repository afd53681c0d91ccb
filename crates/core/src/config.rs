//! Runtime configuration: device identity and protocol timing.

use crate::error::{Error, Result};
use crate::{pids, CORSAIR_VID};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Identity and timing used by the lighting and event channels.
///
/// Missing fields in a config file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// USB vendor ID to match.
    pub vendor_id: u16,
    /// USB product ID to match; also selects wireless or wired framing.
    pub product_id: u16,
    /// How often the keep-alive task re-sends the zone colors.
    pub keep_alive_interval_ms: u64,
    /// Pause after each initialization packet.
    pub settle_delay_ms: u64,
    /// Upper bound on one event read; also the read loop's stop latency.
    pub read_timeout_ms: u64,
    /// How long `stop_keep_alive` waits for the task to exit.
    pub keep_alive_stop_timeout_ms: u64,
    /// How long `stop_monitoring` waits for the read loop to exit.
    pub monitor_stop_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vendor_id: CORSAIR_VID,
            product_id: pids::HS80_WIRELESS,
            keep_alive_interval_ms: 5000,
            settle_delay_ms: 100,
            read_timeout_ms: 1000,
            keep_alive_stop_timeout_ms: 10_000,
            monitor_stop_timeout_ms: 2000,
        }
    }
}

impl Config {
    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        Self::from_json(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Parse a JSON config document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn keep_alive_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.keep_alive_stop_timeout_ms)
    }

    pub fn monitor_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor_stop_timeout_ms)
    }
}
