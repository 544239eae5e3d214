// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monitor event types.

use serde::Serialize;

use crate::feed::FeedEntry;
use crate::registry::DeviceStatus;

/// Events emitted by the monitor.
///
/// # Examples
///
/// ```
/// use watchtower::event::MonitorEvent;
/// use watchtower::registry::DeviceStatus;
///
/// let event = MonitorEvent::status_changed("JungleDoor", DeviceStatus::Testing, DeviceStatus::Online);
/// assert_eq!(event.device(), Some("JungleDoor"));
/// assert!(event.is_status_change());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A message was added to the feed.
    Feed {
        /// The new feed entry.
        entry: FeedEntry,
    },

    /// A device changed status.
    StatusChanged {
        /// Name of the device.
        device: String,
        /// Status before the transition.
        previous: DeviceStatus,
        /// Status after the transition.
        current: DeviceStatus,
    },

    /// The broker connection came up or went down.
    ConnectionChanged {
        /// Whether the monitor is now connected.
        connected: bool,
    },
}

impl MonitorEvent {
    /// Returns the device this event concerns, if any.
    #[must_use]
    pub fn device(&self) -> Option<&str> {
        match self {
            Self::Feed { entry } => entry.device.as_deref(),
            Self::StatusChanged { device, .. } => Some(device),
            Self::ConnectionChanged { .. } => None,
        }
    }

    /// Returns `true` if this is a feed event.
    #[must_use]
    pub fn is_feed(&self) -> bool {
        matches!(self, Self::Feed { .. })
    }

    /// Returns `true` if this is a status transition.
    #[must_use]
    pub fn is_status_change(&self) -> bool {
        matches!(self, Self::StatusChanged { .. })
    }

    /// Returns `true` if this is a connection event.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionChanged { .. })
    }

    /// Creates a feed event.
    #[must_use]
    pub fn feed(entry: FeedEntry) -> Self {
        Self::Feed { entry }
    }

    /// Creates a status transition event.
    #[must_use]
    pub fn status_changed(
        device: impl Into<String>,
        previous: DeviceStatus,
        current: DeviceStatus,
    ) -> Self {
        Self::StatusChanged {
            device: device.into(),
            previous,
            current,
        }
    }

    /// Creates a connection event.
    #[must_use]
    pub fn connection_changed(connected: bool) -> Self {
        Self::ConnectionChanged { connected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Direction;

    #[test]
    fn feed_event_reports_attributed_device() {
        let entry = FeedEntry::new(Direction::Inbound, "Cove/get/temp", "21", Some("Cove".into()));
        let event = MonitorEvent::feed(entry);
        assert!(event.is_feed());
        assert_eq!(event.device(), Some("Cove"));
    }

    #[test]
    fn connection_event_has_no_device() {
        let event = MonitorEvent::connection_changed(false);
        assert!(event.is_connection());
        assert!(event.device().is_none());
    }

    #[test]
    fn status_event_serializes_with_kind_tag() {
        let event =
            MonitorEvent::status_changed("Cove", DeviceStatus::Unknown, DeviceStatus::Online);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "status_changed");
        assert_eq!(json["previous"], "unknown");
        assert_eq!(json["current"], "online");
    }
}
