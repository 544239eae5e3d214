// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fleet health monitor.
//!
//! [`Monitor`] ties the pieces together:
//!
//! - the [`DeviceRegistry`] with every device's health,
//! - the [`FilterPipeline`] deciding what reaches the feed,
//! - the [`EventFeed`] of recent traffic,
//! - the [`HealthProbe`] state machine, and
//! - the broker connection.
//!
//! Registry, filter, and feed live behind one mutex so each inbound message
//! and each operation sees and leaves a consistent state. The lock is never
//! held across a publish or an `.await`.

mod connection;
mod probe;
mod summary;

pub use probe::{HealthProbe, NO_RESPONSE, PING_PAYLOAD, PONG_PAYLOAD, ProbeStart, StatusTransition};
pub use summary::{CommandReceipt, DeviceSnapshot, StatusCounts, StatusSummary};

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::error::Error;
use crate::event::{EventBus, MonitorEvent};
use crate::feed::{Direction, EventFeed, FeedEntry};
use crate::filter::{FilterPipeline, Verdict};
use crate::registry::DeviceRegistry;
use crate::transport::{Publisher, TransportEvent, decode_payload};

use connection::ConnectionManager;

/// State guarded by the monitor lock.
#[derive(Debug)]
struct Shared {
    registry: DeviceRegistry,
    filter: FilterPipeline,
    feed: EventFeed,
}

#[derive(Debug)]
struct Inner {
    config: MonitorConfig,
    probe: HealthProbe,
    state: Mutex<Shared>,
    connection: ConnectionManager,
    events: EventBus,
    /// Serializes `connect` so only one transport is ever opened.
    #[cfg(feature = "mqtt")]
    connecting: tokio::sync::Mutex<()>,
}

/// Health monitor for one fleet on one broker.
///
/// Cheap to clone; clones share the same state.
///
/// # Examples
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use watchtower::config::{DeviceEntry, MonitorConfig};
/// use watchtower::monitor::Monitor;
///
/// #[tokio::main]
/// async fn main() -> watchtower::Result<()> {
///     let config = MonitorConfig::default()
///         .with_broker("10.1.10.115", 1883)
///         .with_device(DeviceEntry::embedded_node("JungleDoor"))
///         .with_device(DeviceEntry::zone_controller("Cove"));
///
///     let monitor = Monitor::new(config)?;
///     monitor.connect().await?;
///     let _sweeper = monitor.spawn_sweeper(CancellationToken::new());
///
///     monitor.ping_device("JungleDoor")?;
///     let summary = monitor.status_summary();
///     println!("{} online", summary.counts.online);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    /// Builds a disconnected monitor from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or lists a
    /// device twice.
    pub fn new(config: MonitorConfig) -> Result<Self, Error> {
        config.validate()?;
        let registry = DeviceRegistry::load(&config.devices)?;
        let filter = FilterPipeline::new(
            config.namespace.clone(),
            registry.zone_prefixes(),
            &config.filter,
        );
        let feed = EventFeed::new(config.feed.capacity);

        tracing::info!(
            namespace = %config.namespace,
            devices = registry.len(),
            zone_prefixes = ?filter.zone_prefixes(),
            "Monitor initialized"
        );

        let inner = Inner {
            probe: HealthProbe::new(config.namespace.clone(), config.timeouts),
            connection: ConnectionManager::new(config.broker.host.clone(), config.broker.port),
            state: Mutex::new(Shared {
                registry,
                filter,
                feed,
            }),
            events: EventBus::new(),
            #[cfg(feature = "mqtt")]
            connecting: tokio::sync::Mutex::new(()),
            config,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Returns the configuration the monitor was built from.
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Returns whether a broker connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Subscribes to feed, status, and connection events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the names of all registered devices in registration order.
    #[must_use]
    pub fn device_names(&self) -> Vec<String> {
        self.inner.state.lock().registry.names()
    }

    /// Returns a snapshot of one device.
    #[must_use]
    pub fn device(&self, name: &str) -> Option<DeviceSnapshot> {
        self.inner
            .state
            .lock()
            .registry
            .lookup(name)
            .map(DeviceSnapshot::from)
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connects to the configured broker and starts dispatching its traffic.
    ///
    /// Does nothing if already connected. Concurrent callers wait for the
    /// first attempt and share its connection. A single attempt is made; on
    /// failure the monitor stays disconnected and keeps serving reads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the broker cannot be reached.
    #[cfg(feature = "mqtt")]
    pub async fn connect(&self) -> Result<(), Error> {
        use crate::transport::{MqttTransport, monitor_subscriptions};

        let _connecting = self.inner.connecting.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let subscriptions = monitor_subscriptions(&self.inner.config.namespace);
        let (transport, inbound) =
            MqttTransport::connect(&self.inner.config.broker, &subscriptions).await?;

        self.attach(Arc::new(transport));
        self.spawn_dispatcher(inbound);
        Ok(())
    }

    /// Installs `publisher` as the outbound path and marks the monitor
    /// connected.
    pub fn attach(&self, publisher: Arc<dyn Publisher>) {
        if self.inner.connection.attach(publisher) {
            tracing::info!(
                host = %self.inner.connection.host(),
                port = self.inner.connection.port(),
                "Monitor connected"
            );
            self.inner.events.publish(MonitorEvent::connection_changed(true));
        }
    }

    /// Drops the current publisher and marks the monitor disconnected.
    pub fn disconnect(&self) {
        self.handle_disconnect(None);
    }

    /// Spawns the task that feeds transport events into the monitor.
    ///
    /// The task ends when the channel closes, after a
    /// [`TransportEvent::Disconnected`], or once every handle to the monitor
    /// is dropped.
    pub fn spawn_dispatcher(&self, mut inbound: mpsc::Receiver<TransportEvent>) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let monitor = Monitor { inner };
                match event {
                    TransportEvent::Message { topic, payload } => {
                        monitor.handle_message(&topic, &payload);
                    }
                    TransportEvent::Disconnected { reason } => {
                        monitor.handle_disconnect(reason);
                        break;
                    }
                }
            }
            tracing::debug!("Dispatcher stopped");
        })
    }

    /// Processes one inbound message.
    ///
    /// The message goes through the filter and, if shown, into the feed.
    /// It is always offered to the health probe, so suppressed heartbeats
    /// and echoes still count as liveness evidence.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) {
        let payload = decode_payload(payload);
        let now = Utc::now();
        let namespace = &self.inner.config.namespace;

        let (entry, transitions) = {
            let mut state = self.inner.state.lock();
            let verdict = state.filter.evaluate(topic, &payload);

            let entry = match verdict {
                Verdict::Shown => {
                    let device = state.registry.attribute(namespace, topic);
                    let entry = FeedEntry::at(now, Direction::Inbound, topic, payload.as_str(), device)
                        .with_payload_budget(self.inner.config.feed.payload_budget);
                    state.feed.push(entry.clone());
                    Some(entry)
                }
                Verdict::Hidden(reason) => {
                    tracing::trace!(topic = %topic, %reason, "Message suppressed");
                    None
                }
            };

            let transitions = self
                .inner
                .probe
                .observe(&mut state.registry, topic, &payload, now);
            (entry, transitions)
        };

        if let Some(entry) = entry {
            self.inner.events.publish(MonitorEvent::feed(entry));
        }
        self.publish_transitions(transitions);
    }

    /// Marks the connection lost. No reconnect is attempted.
    pub fn handle_disconnect(&self, reason: Option<String>) {
        if self.inner.connection.detach() {
            match &reason {
                Some(reason) => tracing::warn!(reason = %reason, "Monitor disconnected"),
                None => tracing::info!("Monitor disconnected"),
            }
            self.inner.events.publish(MonitorEvent::connection_changed(false));
        }
    }

    // =========================================================================
    // Probing
    // =========================================================================

    /// Starts a liveness probe on `name`.
    ///
    /// Embedded nodes are sent `PING` on their command topic, recorded in
    /// the feed as an outbound entry. Zone controllers are probed
    /// passively: the device enters `Testing` and waits for its next
    /// heartbeat.
    ///
    /// A failed publish is logged and not reported: the device stays in
    /// `Testing` and the sweep times it out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDevice`] if `name` is not registered, or
    /// [`Error::NotConnected`] if there is no broker connection.
    pub fn ping_device(&self, name: &str) -> Result<(), Error> {
        let (start, entry) = {
            let mut state = self.inner.state.lock();
            if state.registry.lookup(name).is_none() {
                return Err(Error::UnknownDevice(name.to_string()));
            }
            if !self.is_connected() {
                return Err(Error::NotConnected);
            }

            let now = Utc::now();
            let start = self.inner.probe.begin(&mut state.registry, name, now)?;
            let entry = start.ping.as_ref().map(|(topic, payload)| {
                state.filter.track_outbound(topic.as_str(), payload.as_str());
                let entry = FeedEntry::at(
                    now,
                    Direction::Outbound,
                    topic.as_str(),
                    payload.as_str(),
                    Some(name.to_string()),
                );
                state.feed.push(entry.clone());
                entry
            });
            (start, entry)
        };

        if let Some(entry) = entry {
            self.inner.events.publish(MonitorEvent::feed(entry));
        }
        self.publish_transitions(start.transition);

        match start.ping {
            Some((topic, payload)) => {
                tracing::debug!(device = %name, topic = %topic, "Pinging device");
                if let Err(e) = self.inner.connection.publish(&topic, &payload) {
                    tracing::warn!(device = %name, error = %e, "Failed to publish ping");
                }
            }
            None => {
                tracing::debug!(device = %name, "Waiting for zone controller heartbeat");
            }
        }
        Ok(())
    }

    /// Pings every registered device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if there is no broker connection.
    pub fn ping_all(&self) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let names = self.device_names();
        tracing::info!(devices = names.len(), "Pinging all devices");
        for name in names {
            self.ping_device(&name)?;
        }
        Ok(())
    }

    /// Publishes an application command to `name`.
    ///
    /// Embedded nodes receive `command` on `<namespace>/<topic>/command`;
    /// zone controllers on `<topic>/set/<command lowercased>`. The message
    /// is recorded in the feed and its echo suppressed once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDevice`] if `name` is not registered, or
    /// [`Error::NotConnected`] if there is no broker connection.
    pub fn send_command(&self, name: &str, command: &str) -> Result<CommandReceipt, Error> {
        let namespace = &self.inner.config.namespace;

        let (topic, entry) = {
            let mut state = self.inner.state.lock();
            let topic = state
                .registry
                .lookup(name)
                .ok_or_else(|| Error::UnknownDevice(name.to_string()))?
                .outbound_topic(namespace, command);
            if !self.is_connected() {
                return Err(Error::NotConnected);
            }

            state.filter.track_outbound(topic.as_str(), command);

            let entry = FeedEntry::new(Direction::Outbound, topic.as_str(), command, Some(name.to_string()))
                .with_payload_budget(self.inner.config.feed.payload_budget);
            state.feed.push(entry.clone());
            (topic, entry)
        };

        self.inner.events.publish(MonitorEvent::feed(entry));

        let sent = match self.inner.connection.publish(&topic, command) {
            Ok(()) => {
                tracing::info!(device = %name, command = %command, topic = %topic, "Command sent");
                true
            }
            Err(e) => {
                tracing::warn!(device = %name, command = %command, error = %e, "Failed to send command");
                false
            }
        };

        Ok(CommandReceipt {
            device: name.to_string(),
            command: command.to_string(),
            topic,
            sent,
        })
    }

    // =========================================================================
    // Sweeping
    // =========================================================================

    /// Times out overdue probes against the wall clock.
    pub fn sweep(&self) -> Vec<StatusTransition> {
        self.sweep_at(Utc::now())
    }

    /// Times out probes that are overdue at `now`.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Vec<StatusTransition> {
        let transitions = {
            let mut state = self.inner.state.lock();
            self.inner.probe.sweep(&mut state.registry, now)
        };
        self.publish_transitions(transitions.iter().cloned());
        transitions
    }

    /// Spawns a task sweeping every `timeouts.sweep_interval_ms` until
    /// `cancel` fires or the monitor is dropped.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let period = self.inner.config.timeouts.sweep_interval();
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        Monitor { inner }.sweep();
                    }
                }
            }
            tracing::debug!("Sweeper stopped");
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns a consistent snapshot of the fleet.
    ///
    /// Overdue probes are timed out first, so the snapshot never shows a
    /// device stuck in `Testing` past its timeout.
    #[must_use]
    pub fn status_summary(&self) -> StatusSummary {
        let now = Utc::now();
        let (summary, transitions) = {
            let mut state = self.inner.state.lock();
            let transitions = self.inner.probe.sweep(&mut state.registry, now);

            let devices: Vec<DeviceSnapshot> =
                state.registry.all().map(DeviceSnapshot::from).collect();
            let counts = StatusCounts::tally(devices.iter().map(|d| d.status));

            let summary = StatusSummary {
                connected: self.is_connected(),
                broker_host: self.inner.connection.host().to_string(),
                broker_port: self.inner.connection.port(),
                timestamp: now,
                devices,
                counts,
            };
            (summary, transitions)
        };

        self.publish_transitions(transitions);
        summary
    }

    /// Returns up to `limit` feed entries, newest first.
    #[must_use]
    pub fn feed(&self, limit: usize) -> Vec<FeedEntry> {
        self.inner.state.lock().feed.read(limit)
    }

    fn publish_transitions(&self, transitions: impl IntoIterator<Item = StatusTransition>) {
        for t in transitions {
            self.inner
                .events
                .publish(MonitorEvent::status_changed(t.device, t.previous, t.current));
        }
    }
}
