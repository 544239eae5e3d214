// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device configuration entries.

use serde::{Deserialize, Serialize};

use crate::registry::DeviceKind;

/// Static description of one monitored device.
///
/// # Examples
///
/// ```
/// use watchtower::config::DeviceEntry;
///
/// let entry = DeviceEntry::embedded_node("Captains-Cuffs")
///     .with_topic("CaptainsCuffs")
///     .with_room("Captain's Cabin")
///     .with_commands(["PING", "STATUS", "UNLOCK"]);
///
/// assert_eq!(entry.topic.as_deref(), Some("CaptainsCuffs"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Unique device name.
    pub name: String,
    /// How the device is monitored.
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Topic fragment; defaults to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Room the device is installed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Dashboard glyph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Dashboard accent colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Accepted commands; defaults to `PING, STATUS, RESET, PUZZLE_RESET`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
    /// Firmware still speaks the legacy protocol.
    #[serde(default)]
    pub needs_protocol: bool,
    /// Slug of the device's documentation page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_slug: Option<String>,
}

impl DeviceEntry {
    fn new(name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            topic: None,
            room: None,
            icon: None,
            color: None,
            commands: None,
            needs_protocol: false,
            docs_slug: None,
        }
    }

    /// Creates an entry for a zone controller.
    #[must_use]
    pub fn zone_controller(name: impl Into<String>) -> Self {
        Self::new(name, DeviceKind::ZoneController)
    }

    /// Creates an entry for an embedded node.
    #[must_use]
    pub fn embedded_node(name: impl Into<String>) -> Self {
        Self::new(name, DeviceKind::EmbeddedNode)
    }

    /// Sets the topic fragment.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the room.
    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Sets the dashboard glyph and colour.
    #[must_use]
    pub fn with_display(mut self, icon: impl Into<String>, color: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self.color = Some(color.into());
        self
    }

    /// Replaces the accepted command set.
    #[must_use]
    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = Some(commands.into_iter().map(Into::into).collect());
        self
    }

    /// Flags the device as needing a firmware protocol upgrade.
    #[must_use]
    pub fn with_protocol_upgrade(mut self) -> Self {
        self.needs_protocol = true;
        self
    }

    /// Sets the documentation slug.
    #[must_use]
    pub fn with_docs_slug(mut self, slug: impl Into<String>) -> Self {
        self.docs_slug = Some(slug.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal_entry() {
        let entry: DeviceEntry =
            serde_json::from_str(r#"{"name": "Cove", "type": "zone_controller"}"#).unwrap();
        assert_eq!(entry, DeviceEntry::zone_controller("Cove"));
    }

    #[test]
    fn deserialize_full_entry() {
        let json = r##"{
            "name": "Cannon1",
            "type": "esp32",
            "topic": "Cannon1",
            "room": "Ship Deck",
            "icon": "💣",
            "color": "#4A90D9",
            "commands": ["PING", "FIRE"],
            "needs_protocol": true,
            "docs_slug": "new-cannons"
        }"##;
        let entry: DeviceEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, DeviceKind::EmbeddedNode);
        assert_eq!(entry.commands, Some(vec!["PING".to_string(), "FIRE".to_string()]));
        assert!(entry.needs_protocol);
        assert_eq!(entry.docs_slug.as_deref(), Some("new-cannons"));
    }

    #[test]
    fn builder_chain() {
        let entry = DeviceEntry::embedded_node("Compass")
            .with_display("🧭", "#4A90D9")
            .with_protocol_upgrade()
            .with_docs_slug("compass");
        assert_eq!(entry.icon.as_deref(), Some("🧭"));
        assert!(entry.needs_protocol);
        assert_eq!(entry.docs_slug.as_deref(), Some("compass"));
    }
}
