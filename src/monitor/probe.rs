// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device liveness state machine.
//!
//! ```text
//!            ping                      reply / heartbeat
//! Unknown ─────────▶ Testing ────────────────────────────▶ Online
//!    │                  │                                    ▲
//!    │                  │ sweep: timeout(kind) elapsed        │
//!    │                  ▼                                    │
//!    │               Offline                                 │
//!    │                                                       │
//!    └───────────── zone-controller heartbeat ───────────────┘
//! ```
//!
//! Any state goes back to `Testing` on the next ping. Zone-controller
//! heartbeats set `Online` from every state. The sweep only acts on
//! `Testing`, so a zone controller that stops heartbeating after reaching
//! `Online` stays `Online` until it is pinged again.
//!
//! Every method takes the current time explicitly; the monitor passes the
//! wall clock.

use chrono::{DateTime, Utc};

use crate::config::ProbeTimeouts;
use crate::error::Error;
use crate::registry::{Device, DeviceKind, DeviceRegistry, DeviceStatus};

/// Payload sent to embedded nodes to request a reply.
pub const PING_PAYLOAD: &str = "PING";
/// Payload embedded nodes reply with.
pub const PONG_PAYLOAD: &str = "PONG";
/// Diagnostic recorded when a probe times out.
pub const NO_RESPONSE: &str = "No response";

/// A status change applied to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    /// Name of the device.
    pub device: String,
    /// Status before.
    pub previous: DeviceStatus,
    /// Status after.
    pub current: DeviceStatus,
}

/// What starting a probe requires of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeStart {
    /// `(topic, payload)` to publish, or `None` when the device is probed
    /// passively by waiting for its heartbeat.
    pub ping: Option<(String, String)>,
    /// The status change, if the device was not already `Testing`.
    pub transition: Option<StatusTransition>,
}

/// Drives device status from probes, inbound traffic, and the clock.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    namespace: String,
    timeouts: ProbeTimeouts,
}

impl HealthProbe {
    /// Creates a probe for devices under `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>, timeouts: ProbeTimeouts) -> Self {
        Self {
            namespace: namespace.into(),
            timeouts,
        }
    }

    /// Returns the configured timeouts.
    #[must_use]
    pub fn timeouts(&self) -> &ProbeTimeouts {
        &self.timeouts
    }

    /// Puts `name` into `Testing` and clears its previous latency.
    ///
    /// A probe already in flight is superseded: only the newest probe
    /// timestamp counts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDevice`] if `name` is not registered.
    pub fn begin(
        &self,
        registry: &mut DeviceRegistry,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<ProbeStart, Error> {
        let device = registry
            .lookup_mut(name)
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))?;

        let transition = set_status(device, DeviceStatus::Testing);
        device.last_probe_at = Some(now);
        device.response_time_ms = None;

        let ping = match device.kind() {
            DeviceKind::EmbeddedNode => Some((
                device.command_topic(&self.namespace),
                PING_PAYLOAD.to_string(),
            )),
            DeviceKind::ZoneController => None,
        };

        Ok(ProbeStart { ping, transition })
    }

    /// Applies one inbound message to every device it concerns.
    ///
    /// - A zone controller whose heartbeat topic matches goes `Online`
    ///   whatever its state.
    /// - An embedded node in `Testing` goes `Online` on any message on its
    ///   status topic, or on `PONG` on its command topic.
    ///
    /// All devices are checked, so overlapping probes resolve independently.
    pub fn observe(
        &self,
        registry: &mut DeviceRegistry,
        topic: &str,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Vec<StatusTransition> {
        let mut transitions = Vec::new();

        for device in registry.all_mut() {
            let responded = match device.kind() {
                DeviceKind::ZoneController => device.is_heartbeat_topic(topic),
                DeviceKind::EmbeddedNode => {
                    device.status() == DeviceStatus::Testing
                        && self.is_reply(device, topic, payload)
                }
            };
            if !responded {
                continue;
            }

            if device.status() == DeviceStatus::Testing {
                device.response_time_ms = device
                    .last_probe_at
                    .map(|sent| (now - sent).num_milliseconds().max(0));
            }
            if device.kind() == DeviceKind::ZoneController {
                device.last_probe_at = Some(now);
            }
            device.last_error = None;

            if let Some(transition) = set_status(device, DeviceStatus::Online) {
                tracing::info!(
                    device = %transition.device,
                    response_ms = ?device.response_time_ms,
                    "Device responded"
                );
                transitions.push(transition);
            }
        }

        transitions
    }

    /// Marks every `Testing` device whose probe is older than its timeout
    /// as `Offline`.
    pub fn sweep(&self, registry: &mut DeviceRegistry, now: DateTime<Utc>) -> Vec<StatusTransition> {
        let mut transitions = Vec::new();

        for device in registry.all_mut() {
            if device.status() != DeviceStatus::Testing {
                continue;
            }
            let Some(sent) = device.last_probe_at else {
                continue;
            };
            let Ok(elapsed) = (now - sent).to_std() else {
                continue;
            };
            if elapsed <= device.kind().probe_timeout(&self.timeouts) {
                continue;
            }

            device.last_error = Some(NO_RESPONSE.to_string());
            if let Some(transition) = set_status(device, DeviceStatus::Offline) {
                tracing::info!(
                    device = %transition.device,
                    elapsed = ?elapsed,
                    "Probe timed out"
                );
                transitions.push(transition);
            }
        }

        transitions
    }

    fn is_reply(&self, device: &Device, topic: &str, payload: &str) -> bool {
        topic == device.status_topic(&self.namespace)
            || (topic == device.command_topic(&self.namespace) && payload == PONG_PAYLOAD)
    }
}

fn set_status(device: &mut Device, status: DeviceStatus) -> Option<StatusTransition> {
    let previous = device.status;
    device.status = status;
    (previous != status).then(|| StatusTransition {
        device: device.name().to_string(),
        previous,
        current: status,
    })
}
