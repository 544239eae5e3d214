// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monitor configuration.
//!
//! Configuration is a JSON document. Every section is optional and falls
//! back to the defaults below, so the smallest useful file only lists the
//! broker host and the devices:
//!
//! ```json
//! {
//!   "broker": { "host": "10.1.10.115" },
//!   "devices": [
//!     { "name": "Cove", "type": "zone_controller" },
//!     { "name": "JungleDoor", "type": "embedded_node", "room": "Jungle" }
//!   ]
//! }
//! ```
//!
//! | Setting | Default |
//! |---------|---------|
//! | `broker.port` | 1883 |
//! | `namespace` | `MermaidsTale` |
//! | `timeouts.embedded_node_ms` | 3000 |
//! | `timeouts.zone_controller_ms` | 15000 |
//! | `timeouts.sweep_interval_ms` | 500 |
//! | `filter.delta_threshold` | 2 |
//! | `feed.capacity` | 200 |
//!
//! `WATCHTOWER_BROKER_HOST` and `WATCHTOWER_BROKER_PORT` override the
//! broker section when set.

mod device_entry;

pub use device_entry::DeviceEntry;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable overriding the broker host.
pub const ENV_BROKER_HOST: &str = "WATCHTOWER_BROKER_HOST";
/// Environment variable overriding the broker port.
pub const ENV_BROKER_PORT: &str = "WATCHTOWER_BROKER_PORT";

/// Complete monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Broker connection settings.
    pub broker: BrokerConfig,
    /// Topic namespace owned by the game devices.
    pub namespace: String,
    /// Devices to monitor.
    pub devices: Vec<DeviceEntry>,
    /// Feed filtering rules.
    pub filter: FilterSettings,
    /// Feed buffer settings.
    pub feed: FeedSettings,
    /// Probe timeouts.
    pub timeouts: ProbeTimeouts,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            namespace: "MermaidsTale".to_string(),
            devices: Vec::new(),
            filter: FilterSettings::default(),
            feed: FeedSettings::default(),
            timeouts: ProbeTimeouts::default(),
        }
    }
}

impl MonitorConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the document does not match the schema.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration file and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or an
    /// environment override is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_json_str(&contents)?;
        config.apply_env()?;
        tracing::info!(
            path = %path.display(),
            devices = config.devices.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Applies `WATCHTOWER_BROKER_HOST` / `WATCHTOWER_BROKER_PORT`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the port override is not a port number.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var(ENV_BROKER_HOST).ok(),
            std::env::var(ENV_BROKER_PORT).ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        host: Option<String>,
        port: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            self.broker.host = host;
        }
        if let Some(port) = port {
            self.broker.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{ENV_BROKER_PORT}={port}")))?;
        }
        Ok(())
    }

    /// Sets the broker address.
    #[must_use]
    pub fn with_broker(mut self, host: impl Into<String>, port: u16) -> Self {
        self.broker.host = host.into();
        self.broker.port = port;
        self
    }

    /// Sets the topic namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Adds a device.
    #[must_use]
    pub fn with_device(mut self, entry: DeviceEntry) -> Self {
        self.devices.push(entry);
        self
    }

    /// Replaces the filtering rules.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterSettings) -> Self {
        self.filter = filter;
        self
    }

    /// Replaces the probe timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: ProbeTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets the feed capacity.
    #[must_use]
    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed.capacity = capacity;
        self
    }

    /// Checks settings that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() || self.namespace.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "namespace must be a single topic level, got {:?}",
                self.namespace
            )));
        }
        if self.feed.capacity == 0 {
            return Err(ConfigError::Invalid("feed.capacity must be positive".to_string()));
        }
        if !self.filter.delta_threshold.is_finite() || self.filter.delta_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "filter.delta_threshold must be a non-negative number".to_string(),
            ));
        }
        if self.broker.max_packet_bytes == 0 {
            return Err(ConfigError::Invalid(
                "broker.max_packet_bytes must be positive".to_string(),
            ));
        }
        if self.timeouts.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts.sweep_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker TCP port.
    pub port: u16,
    /// MQTT keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// How long to wait for the broker to acknowledge the connection.
    pub connection_timeout_secs: u64,
    /// Largest MQTT packet accepted or sent, in bytes.
    ///
    /// The monitor subscribes to `#`, so this bounds every message on the
    /// broker. A larger packet ends the connection.
    pub max_packet_bytes: usize,
}

/// Default packet limit: 1 MiB, well above what fleet devices publish.
pub const DEFAULT_MAX_PACKET_BYTES: usize = 1024 * 1024;

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            keep_alive_secs: 60,
            connection_timeout_secs: 10,
            max_packet_bytes: DEFAULT_MAX_PACKET_BYTES,
        }
    }
}

impl BrokerConfig {
    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

/// Rules deciding which inbound messages reach the feed.
///
/// Topic patterns match as substrings of the topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Minimum change for a numeric sensor reading to be shown.
    pub delta_threshold: f64,
    /// Topics carrying numeric sensor readings.
    pub delta_topics: Vec<String>,
    /// Topics never shown.
    pub hidden_topics: Vec<String>,
    /// Topics whose repeated identical payloads are hidden.
    pub dedup_topics: Vec<String>,
    /// Extra non-namespace topic prefixes to show. Zone controller topic
    /// fragments are always included.
    pub zone_prefixes: Vec<String>,
    /// Number of recent outbound messages remembered for echo suppression.
    pub echo_capacity: usize,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            delta_threshold: 2.0,
            delta_topics: to_strings(&["/Hor", "/Ver", "/angle", "/distance"]),
            hidden_topics: to_strings(&["/heartbeat", "/get/heartbeat"]),
            dedup_topics: to_strings(&["/Loaded", "/Fired", "/triggered"]),
            zone_prefixes: Vec::new(),
            echo_capacity: 20,
        }
    }
}

/// Feed buffer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Maximum number of entries kept.
    pub capacity: usize,
    /// Maximum payload length stored per entry, in bytes.
    pub payload_budget: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            capacity: 200,
            payload_budget: 200,
        }
    }
}

/// How long probes may stay unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeTimeouts {
    /// Timeout for embedded nodes, in milliseconds.
    pub embedded_node_ms: u64,
    /// Timeout for zone controllers, in milliseconds. Longer, since they
    /// only answer on their next heartbeat.
    pub zone_controller_ms: u64,
    /// Period of the timeout sweep, in milliseconds.
    pub sweep_interval_ms: u64,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            embedded_node_ms: 3_000,
            zone_controller_ms: 15_000,
            sweep_interval_ms: 500,
        }
    }
}

impl ProbeTimeouts {
    /// Returns the embedded-node timeout.
    #[must_use]
    pub fn embedded_node(&self) -> Duration {
        Duration::from_millis(self.embedded_node_ms)
    }

    /// Returns the zone-controller timeout.
    #[must_use]
    pub fn zone_controller(&self) -> Duration {
        Duration::from_millis(self.zone_controller_ms)
    }

    /// Returns the sweep period.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
