// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker connection slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::ProtocolError;
use crate::transport::Publisher;

/// Holds the current publisher and the connected flag.
///
/// The flag is the single source of truth for "connected" and is read
/// without taking the monitor's state lock.
pub(crate) struct ConnectionManager {
    host: String,
    port: u16,
    connected: AtomicBool,
    publisher: RwLock<Option<Arc<dyn Publisher>>>,
}

impl ConnectionManager {
    pub(crate) fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connected: AtomicBool::new(false),
            publisher: RwLock::new(None),
        }
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Installs `publisher` and marks the connection up.
    ///
    /// Returns `true` if the monitor was previously disconnected.
    pub(crate) fn attach(&self, publisher: Arc<dyn Publisher>) -> bool {
        *self.publisher.write() = Some(publisher);
        !self.connected.swap(true, Ordering::AcqRel)
    }

    /// Drops the publisher and marks the connection down.
    ///
    /// Returns `true` if the monitor was previously connected.
    pub(crate) fn detach(&self) -> bool {
        let was_connected = self.connected.swap(false, Ordering::AcqRel);
        self.publisher.write().take();
        was_connected
    }

    pub(crate) fn publish(&self, topic: &str, payload: &str) -> Result<(), ProtocolError> {
        let publisher = self
            .publisher
            .read()
            .clone()
            .ok_or(ProtocolError::NotAttached)?;
        publisher.publish(topic, payload)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, String)>>);

    impl Publisher for Recorder {
        fn publish(&self, topic: &str, payload: &str) -> Result<(), ProtocolError> {
            self.0.lock().push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    #[test]
    fn publish_without_publisher_fails() {
        let connection = ConnectionManager::new("localhost", 1883);
        assert!(matches!(
            connection.publish("Cove/set/lights", "LIGHTS"),
            Err(ProtocolError::NotAttached)
        ));
    }

    #[test]
    fn attach_and_detach_track_flag() {
        let connection = ConnectionManager::new("localhost", 1883);
        let recorder = Arc::new(Recorder::default());

        assert!(connection.attach(recorder.clone()));
        assert!(connection.is_connected());
        assert!(!connection.attach(recorder.clone()));

        connection.publish("Cove/set/lights", "LIGHTS").unwrap();
        assert_eq!(recorder.0.lock().len(), 1);

        assert!(connection.detach());
        assert!(!connection.is_connected());
        assert!(!connection.detach());
    }
}
