// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read models returned by the monitor.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::{Device, DeviceKind, DeviceStatus};

/// Point-in-time view of the whole fleet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    /// Whether the broker connection is up.
    pub connected: bool,
    /// Configured broker host.
    pub broker_host: String,
    /// Configured broker port.
    pub broker_port: u16,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Every registered device, in registration order.
    pub devices: Vec<DeviceSnapshot>,
    /// Devices per status.
    pub counts: StatusCounts,
}

impl StatusSummary {
    /// Returns the snapshot of `name`, if registered.
    #[must_use]
    pub fn device(&self, name: &str) -> Option<&DeviceSnapshot> {
        self.devices.iter().find(|d| d.name == name)
    }
}

/// Copy of one device's identity and health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    /// Configured device name.
    pub name: String,
    /// Embedded node or zone controller.
    pub kind: DeviceKind,
    /// Current health status.
    pub status: DeviceStatus,
    /// Dashboard icon.
    pub icon: String,
    /// Dashboard accent color.
    pub color: String,
    /// Room the device sits in.
    pub room: String,
    /// Topic base the device publishes under.
    pub topic: String,
    /// When the last ping started.
    pub last_probe_at: Option<DateTime<Utc>>,
    /// Round-trip time of the last answered ping, in milliseconds.
    pub response_ms: Option<i64>,
    /// Reason for the last failure, if any.
    pub error: Option<String>,
    /// Commands the device accepts.
    pub commands: Vec<String>,
    /// Whether the firmware still speaks the legacy protocol.
    pub needs_protocol: bool,
    /// Documentation page for the device.
    pub docs_slug: Option<String>,
}

impl From<&Device> for DeviceSnapshot {
    fn from(device: &Device) -> Self {
        let display = device.display();
        Self {
            name: device.name().to_string(),
            kind: device.kind(),
            status: device.status(),
            icon: display.icon.clone(),
            color: display.color.clone(),
            room: display.room.clone(),
            topic: device.topic_base().to_string(),
            last_probe_at: device.last_probe_at(),
            response_ms: device.response_time_ms(),
            error: device.last_error().map(str::to_string),
            commands: device.supported_commands().to_vec(),
            needs_protocol: device.needs_protocol_upgrade(),
            docs_slug: display.docs_slug.clone(),
        }
    }
}

/// Number of devices in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Devices answering pings or heartbeats.
    pub online: usize,
    /// Devices that missed their timeout.
    pub offline: usize,
    /// Devices not checked yet.
    pub unknown: usize,
    /// Devices with a ping in flight.
    pub testing: usize,
}

impl StatusCounts {
    /// Counts `statuses`.
    #[must_use]
    pub fn tally(statuses: impl IntoIterator<Item = DeviceStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                DeviceStatus::Online => counts.online += 1,
                DeviceStatus::Offline => counts.offline += 1,
                DeviceStatus::Unknown => counts.unknown += 1,
                DeviceStatus::Testing => counts.testing += 1,
            }
        }
        counts
    }

    /// Total number of devices counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.online + self.offline + self.unknown + self.testing
    }
}

/// Outcome of [`Monitor::send_command`](super::Monitor::send_command).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReceipt {
    /// Device the command was addressed to.
    pub device: String,
    /// The command as sent.
    pub command: String,
    /// Topic it was published on.
    pub topic: String,
    /// Whether the transport accepted the message.
    pub sent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceEntry;

    #[test]
    fn tally_counts_each_status() {
        let counts = StatusCounts::tally([
            DeviceStatus::Online,
            DeviceStatus::Online,
            DeviceStatus::Testing,
            DeviceStatus::Unknown,
        ]);
        assert_eq!(counts.online, 2);
        assert_eq!(counts.testing, 1);
        assert_eq!(counts.unknown, 1);
        assert_eq!(counts.offline, 0);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn snapshot_copies_display_metadata() {
        let entry = DeviceEntry::embedded_node("Compass")
            .with_room("Captain's Quarters")
            .with_docs_slug("compass");
        let device = Device::from_entry(&entry);

        let snapshot = DeviceSnapshot::from(&device);
        assert_eq!(snapshot.name, "Compass");
        assert_eq!(snapshot.topic, "Compass");
        assert_eq!(snapshot.room, "Captain's Quarters");
        assert_eq!(snapshot.docs_slug.as_deref(), Some("compass"));
        assert_eq!(snapshot.status, DeviceStatus::Unknown);
        assert!(snapshot.response_ms.is_none());
    }

    #[test]
    fn snapshot_serializes_every_field() {
        let device = Device::from_entry(&DeviceEntry::zone_controller("Cove"));
        let json = serde_json::to_value(DeviceSnapshot::from(&device)).unwrap();

        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "color",
                "commands",
                "docs_slug",
                "error",
                "icon",
                "kind",
                "last_probe_at",
                "name",
                "needs_protocol",
                "response_ms",
                "room",
                "status",
                "topic",
            ]
        );

        let counts = serde_json::to_value(StatusCounts::default()).unwrap();
        assert_eq!(counts.as_object().unwrap().len(), 4);
    }

    #[test]
    fn summary_serializes_counts() {
        let summary = StatusSummary {
            connected: false,
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            timestamp: Utc::now(),
            devices: Vec::new(),
            counts: StatusCounts::default(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["broker_port"], 1883);
        assert_eq!(json["counts"]["online"], 0);
    }
}
