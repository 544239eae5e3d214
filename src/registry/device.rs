// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monitored device types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{DeviceEntry, ProbeTimeouts};

/// Commands every embedded node understands when none are configured.
pub const DEFAULT_COMMANDS: [&str; 4] = ["PING", "STATUS", "RESET", "PUZZLE_RESET"];

/// How a device is monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// A room controller that reports liveness through `<topic>/get/...`
    /// heartbeats and is never pinged explicitly.
    #[serde(alias = "bac")]
    ZoneController,
    /// A microcontroller answering `PING` with `PONG` on its namespace topics.
    #[serde(alias = "esp32")]
    EmbeddedNode,
}

impl DeviceKind {
    /// Returns how long a probe of this kind may stay unanswered.
    #[must_use]
    pub fn probe_timeout(self, timeouts: &ProbeTimeouts) -> Duration {
        match self {
            Self::ZoneController => timeouts.zone_controller(),
            Self::EmbeddedNode => timeouts.embedded_node(),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZoneController => write!(f, "zone_controller"),
            Self::EmbeddedNode => write!(f, "embedded_node"),
        }
    }
}

/// Liveness of a device as last observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Never probed and never heard from.
    #[default]
    Unknown,
    /// Answered a probe or sent a heartbeat.
    Online,
    /// A probe went unanswered past its timeout.
    Offline,
    /// A probe is outstanding.
    Testing,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Presentation metadata carried through to the dashboard untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayInfo {
    /// Glyph shown on the device card.
    pub icon: String,
    /// Accent colour as a CSS hex string.
    pub color: String,
    /// Room the device is installed in.
    pub room: String,
    /// Slug of the device's documentation page, if any.
    pub docs_slug: Option<String>,
}

/// One monitored endpoint.
///
/// Identity fields are fixed at load time. Only the probe fields
/// (`status`, `last_probe_at`, `response_time_ms`, `last_error`) change,
/// and only through the health probe.
#[derive(Debug, Clone)]
pub struct Device {
    name: String,
    kind: DeviceKind,
    topic_base: String,
    display: DisplayInfo,
    supported_commands: Vec<String>,
    needs_protocol_upgrade: bool,
    pub(crate) status: DeviceStatus,
    pub(crate) last_probe_at: Option<DateTime<Utc>>,
    pub(crate) response_time_ms: Option<i64>,
    pub(crate) last_error: Option<String>,
}

impl Device {
    /// Builds a device in the `Unknown` state from its configuration entry.
    #[must_use]
    pub fn from_entry(entry: &DeviceEntry) -> Self {
        let topic_base = entry.topic.clone().unwrap_or_else(|| entry.name.clone());
        let room = entry.room.clone().unwrap_or_else(|| match entry.kind {
            DeviceKind::ZoneController => "Zone Controller".to_string(),
            DeviceKind::EmbeddedNode => String::new(),
        });
        let supported_commands = entry.commands.clone().unwrap_or_else(|| {
            DEFAULT_COMMANDS
                .iter()
                .map(|command| (*command).to_string())
                .collect()
        });

        Self {
            name: entry.name.clone(),
            kind: entry.kind,
            topic_base,
            display: DisplayInfo {
                icon: entry.icon.clone().unwrap_or_else(|| "📡".to_string()),
                color: entry.color.clone().unwrap_or_else(|| "#4A90D9".to_string()),
                room,
                docs_slug: entry.docs_slug.clone(),
            },
            supported_commands,
            needs_protocol_upgrade: entry.needs_protocol,
            status: DeviceStatus::Unknown,
            last_probe_at: None,
            response_time_ms: None,
            last_error: None,
        }
    }

    /// Returns the unique device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how the device is monitored.
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Returns the topic fragment used to address the device.
    #[must_use]
    pub fn topic_base(&self) -> &str {
        &self.topic_base
    }

    /// Returns the presentation metadata.
    #[must_use]
    pub fn display(&self) -> &DisplayInfo {
        &self.display
    }

    /// Returns the commands the device accepts, in configured order.
    #[must_use]
    pub fn supported_commands(&self) -> &[String] {
        &self.supported_commands
    }

    /// Returns whether the firmware still speaks the legacy protocol.
    #[must_use]
    pub fn needs_protocol_upgrade(&self) -> bool {
        self.needs_protocol_upgrade
    }

    /// Returns the current liveness status.
    #[must_use]
    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    /// Returns when the device was last probed or last changed state.
    #[must_use]
    pub fn last_probe_at(&self) -> Option<DateTime<Utc>> {
        self.last_probe_at
    }

    /// Returns the round-trip latency of the last successful probe.
    #[must_use]
    pub fn response_time_ms(&self) -> Option<i64> {
        self.response_time_ms
    }

    /// Returns the last diagnostic message.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Topic the device listens on for commands: `<ns>/<topic>/command`.
    #[must_use]
    pub fn command_topic(&self, namespace: &str) -> String {
        format!("{namespace}/{}/command", self.topic_base)
    }

    /// Topic the device reports status on: `<ns>/<topic>/status`.
    #[must_use]
    pub fn status_topic(&self, namespace: &str) -> String {
        format!("{namespace}/{}/status", self.topic_base)
    }

    /// Returns `true` if `topic` is a heartbeat from this zone controller.
    ///
    /// Heartbeats are any topic starting with `<topic>/get/`, compared
    /// case-insensitively. Always `false` for embedded nodes.
    #[must_use]
    pub fn is_heartbeat_topic(&self, topic: &str) -> bool {
        if self.kind != DeviceKind::ZoneController {
            return false;
        }
        let prefix = format!("{}/get/", self.topic_base).to_lowercase();
        topic.to_lowercase().starts_with(&prefix)
    }

    /// Topic an outbound command for this device is published on.
    ///
    /// Embedded nodes take every command on their command topic; zone
    /// controllers take `<topic>/set/<command in lowercase>`.
    #[must_use]
    pub fn outbound_topic(&self, namespace: &str, command: &str) -> String {
        match self.kind {
            DeviceKind::EmbeddedNode => self.command_topic(namespace),
            DeviceKind::ZoneController => {
                format!("{}/set/{}", self.topic_base, command.to_lowercase())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedded(name: &str) -> Device {
        Device::from_entry(&DeviceEntry::embedded_node(name))
    }

    #[test]
    fn entry_defaults_apply() {
        let device = embedded("JungleDoor");
        assert_eq!(device.topic_base(), "JungleDoor");
        assert_eq!(device.status(), DeviceStatus::Unknown);
        assert_eq!(device.supported_commands(), DEFAULT_COMMANDS);
        assert!(device.response_time_ms().is_none());
    }

    #[test]
    fn zone_controller_default_room() {
        let device = Device::from_entry(&DeviceEntry::zone_controller("Cove"));
        assert_eq!(device.display().room, "Zone Controller");
    }

    #[test]
    fn topic_override_is_used_for_addressing() {
        let device =
            Device::from_entry(&DeviceEntry::embedded_node("Captains-Cuffs").with_topic("CaptainsCuffs"));
        assert_eq!(
            device.command_topic("MermaidsTale"),
            "MermaidsTale/CaptainsCuffs/command"
        );
        assert_eq!(
            device.status_topic("MermaidsTale"),
            "MermaidsTale/CaptainsCuffs/status"
        );
    }

    #[test]
    fn heartbeat_matching_is_case_insensitive() {
        let cove = Device::from_entry(&DeviceEntry::zone_controller("Cove"));
        assert!(cove.is_heartbeat_topic("Cove/get/temp"));
        assert!(cove.is_heartbeat_topic("cove/GET/heartbeat"));
        assert!(!cove.is_heartbeat_topic("Cove/set/lights"));
        assert!(!cove.is_heartbeat_topic("CoveDoor/get/temp"));
    }

    #[test]
    fn embedded_nodes_never_heartbeat() {
        let door = embedded("JungleDoor");
        assert!(!door.is_heartbeat_topic("JungleDoor/get/anything"));
    }

    #[test]
    fn outbound_topic_by_kind() {
        let door = embedded("JungleDoor");
        assert_eq!(
            door.outbound_topic("MermaidsTale", "RESET"),
            "MermaidsTale/JungleDoor/command"
        );

        let cove = Device::from_entry(&DeviceEntry::zone_controller("Cove"));
        assert_eq!(cove.outbound_topic("MermaidsTale", "Lights_On"), "Cove/set/lights_on");
    }

    #[test]
    fn kind_deserializes_legacy_names() {
        let kind: DeviceKind = serde_json::from_str("\"esp32\"").unwrap();
        assert_eq!(kind, DeviceKind::EmbeddedNode);
        let kind: DeviceKind = serde_json::from_str("\"bac\"").unwrap();
        assert_eq!(kind, DeviceKind::ZoneController);
    }
}
