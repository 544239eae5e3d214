// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static catalog of monitored devices.
//!
//! The registry is built once from configuration. Its membership never
//! changes afterwards; only the probe fields of each [`Device`] do.
//!
//! # Examples
//!
//! ```
//! use watchtower::config::DeviceEntry;
//! use watchtower::registry::{DeviceKind, DeviceRegistry};
//!
//! let registry = DeviceRegistry::load(&[
//!     DeviceEntry::zone_controller("Cove"),
//!     DeviceEntry::embedded_node("JungleDoor"),
//! ])?;
//!
//! assert_eq!(registry.len(), 2);
//! assert_eq!(registry.lookup("Cove").map(|d| d.kind()), Some(DeviceKind::ZoneController));
//! # Ok::<(), watchtower::error::ConfigError>(())
//! ```

mod device;

pub use device::{DEFAULT_COMMANDS, Device, DeviceKind, DeviceStatus, DisplayInfo};

use std::collections::HashMap;

use crate::config::DeviceEntry;
use crate::error::ConfigError;

/// The set of monitored devices, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    by_name: HashMap<String, usize>,
}

impl DeviceRegistry {
    /// Builds the registry from configuration entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateDevice`] if two entries share a name,
    /// or [`ConfigError::Invalid`] if a name is empty.
    pub fn load(entries: &[DeviceEntry]) -> Result<Self, ConfigError> {
        let mut devices = Vec::with_capacity(entries.len());
        let mut by_name = HashMap::with_capacity(entries.len());

        for entry in entries {
            if entry.name.trim().is_empty() {
                return Err(ConfigError::Invalid("device name must not be empty".to_string()));
            }
            if by_name.insert(entry.name.clone(), devices.len()).is_some() {
                return Err(ConfigError::DuplicateDevice(entry.name.clone()));
            }
            devices.push(Device::from_entry(entry));
        }

        tracing::debug!(count = devices.len(), "Loaded device registry");
        Ok(Self { devices, by_name })
    }

    /// Returns the device with this name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Device> {
        self.by_name.get(name).map(|&index| &self.devices[index])
    }

    pub(crate) fn lookup_mut(&mut self, name: &str) -> Option<&mut Device> {
        let index = *self.by_name.get(name)?;
        self.devices.get_mut(index)
    }

    /// Iterates over all devices in configuration order.
    pub fn all(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub(crate) fn all_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.iter_mut()
    }

    /// Returns the names of all devices in configuration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name().to_string()).collect()
    }

    /// Returns the number of registered devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if no devices are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Finds the device addressed by a topic fragment.
    #[must_use]
    pub fn by_topic_base(&self, topic_base: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.topic_base() == topic_base)
    }

    /// Attributes a topic to a device name for display.
    ///
    /// `<ns>/<fragment>/...` resolves to the device whose topic fragment is
    /// `<fragment>`; any other topic resolves through its first segment.
    /// Unregistered fragments are returned verbatim.
    #[must_use]
    pub fn attribute(&self, namespace: &str, topic: &str) -> Option<String> {
        let mut parts = topic.split('/');
        let first = parts.next().filter(|s| !s.is_empty())?;
        let fragment = if first == namespace {
            parts.next().filter(|s| !s.is_empty())?
        } else {
            first
        };

        Some(
            self.by_topic_base(fragment)
                .map_or_else(|| fragment.to_string(), |d| d.name().to_string()),
        )
    }

    /// Topic fragments of every zone controller.
    #[must_use]
    pub fn zone_prefixes(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter(|d| d.kind() == DeviceKind::ZoneController)
            .map(|d| d.topic_base().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceRegistry {
        DeviceRegistry::load(&[
            DeviceEntry::zone_controller("Cove"),
            DeviceEntry::embedded_node("JungleDoor"),
            DeviceEntry::embedded_node("Captains-Cuffs").with_topic("CaptainsCuffs"),
        ])
        .unwrap()
    }

    #[test]
    fn load_preserves_order() {
        let registry = sample();
        assert_eq!(registry.names(), vec!["Cove", "JungleDoor", "Captains-Cuffs"]);
        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = DeviceRegistry::load(&[
            DeviceEntry::embedded_node("Cannon1"),
            DeviceEntry::embedded_node("Cannon1"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateDevice(name) if name == "Cannon1"));
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = DeviceRegistry::load(&[DeviceEntry::embedded_node(" ")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn lookup_unknown_returns_none() {
        assert!(sample().lookup("NoSuchDevice").is_none());
    }

    #[test]
    fn attribute_namespace_topic_to_device_name() {
        let registry = sample();
        assert_eq!(
            registry.attribute("MermaidsTale", "MermaidsTale/CaptainsCuffs/status"),
            Some("Captains-Cuffs".to_string())
        );
        assert_eq!(
            registry.attribute("MermaidsTale", "MermaidsTale/GameStart"),
            Some("GameStart".to_string())
        );
    }

    #[test]
    fn attribute_zone_topic_by_first_segment() {
        let registry = sample();
        assert_eq!(
            registry.attribute("MermaidsTale", "Cove/get/temp"),
            Some("Cove".to_string())
        );
        assert_eq!(registry.attribute("MermaidsTale", ""), None);
        assert_eq!(registry.attribute("MermaidsTale", "MermaidsTale"), None);
    }

    #[test]
    fn zone_prefixes_lists_zone_controllers_only() {
        assert_eq!(sample().zone_prefixes(), vec!["Cove"]);
    }
}
