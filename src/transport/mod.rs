// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker transport abstraction.
//!
//! The monitor never talks to an MQTT library directly. A transport hands
//! it two things:
//!
//! - a [`Publisher`] for fire-and-forget outbound messages, and
//! - a channel of [`TransportEvent`]s consumed by one dispatcher task.
//!
//! [`MqttTransport`] provides both over `rumqttc`. Tests and alternative
//! buses can supply their own.

#[cfg(feature = "mqtt")]
mod mqtt;

#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

use crate::error::ProtocolError;

/// Channel depth between a transport and the dispatcher.
pub const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Something that happened on the broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A message arrived on a subscribed topic.
    Message {
        /// Topic the message was published on.
        topic: String,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
    /// The connection was lost. No further events follow.
    Disconnected {
        /// Why the connection ended, when known.
        reason: Option<String>,
    },
}

impl TransportEvent {
    /// Creates a message event.
    #[must_use]
    pub fn message(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::Message {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Outbound half of a transport.
///
/// Publishing is best-effort and must not block: implementations queue the
/// message and return. There is no acknowledgement and no retry.
pub trait Publisher: Send + Sync {
    /// Queues `payload` for publication on `topic`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the message could not be queued.
    fn publish(&self, topic: &str, payload: &str) -> Result<(), ProtocolError>;
}

/// Subscriptions every monitor connection makes under `namespace`.
///
/// `#` feeds the live view; the namespace wildcards carry embedded-node
/// replies; `+/get/#` carries zone-controller heartbeats.
#[must_use]
pub fn monitor_subscriptions(namespace: &str) -> Vec<String> {
    vec![
        "#".to_string(),
        format!("{namespace}/+/status"),
        format!("{namespace}/+/command"),
        "+/get/#".to_string(),
    ]
}

/// Decodes a payload as trimmed UTF-8, replacing invalid sequences rather
/// than dropping the message.
#[must_use]
pub fn decode_payload(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.trim().to_string(),
        Err(_) => String::from_utf8_lossy(payload).trim().to_string(),
    }
}
