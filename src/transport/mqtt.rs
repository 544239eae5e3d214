// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport over `rumqttc`.
//!
//! One connection, one attempt. The event loop task stops at the first
//! connection error instead of letting `rumqttc` reconnect, so a lost
//! broker shows up as a single [`TransportEvent::Disconnected`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::BrokerConfig;
use crate::error::ProtocolError;

use super::{INBOUND_CHANNEL_CAPACITY, Publisher, TransportEvent};

/// Requests buffered between the client handle and the event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// A live broker connection.
///
/// # Examples
///
/// ```no_run
/// use watchtower::config::BrokerConfig;
/// use watchtower::transport::{MqttTransport, Publisher, monitor_subscriptions};
///
/// # async fn example() -> Result<(), watchtower::error::ProtocolError> {
/// let config = BrokerConfig { host: "10.1.10.115".into(), ..BrokerConfig::default() };
/// let (transport, mut inbound) =
///     MqttTransport::connect(&config, &monitor_subscriptions("MermaidsTale")).await?;
///
/// transport.publish("MermaidsTale/JungleDoor/command", "PING")?;
/// while let Some(event) = inbound.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct MqttTransport {
    client: AsyncClient,
    host: String,
    port: u16,
    connected: Arc<AtomicBool>,
    event_loop: JoinHandle<()>,
}

impl MqttTransport {
    /// Connects to the broker and subscribes to `subscriptions`.
    ///
    /// Waits for the broker's acknowledgement up to the configured
    /// connection timeout. Never retries.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the host is empty, the broker refuses or
    /// cannot be reached, the acknowledgement times out, or a subscription
    /// request fails.
    pub async fn connect(
        config: &BrokerConfig,
        subscriptions: &[String],
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), ProtocolError> {
        if config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let client_id = format!("watchtower_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let mut mqtt_options = MqttOptions::new(&client_id, &config.host, config.port);
        mqtt_options.set_keep_alive(config.keep_alive());
        mqtt_options.set_clean_session(true);
        mqtt_options.set_max_packet_size(config.max_packet_bytes, config.max_packet_bytes);

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let (connack_tx, connack_rx) = oneshot::channel();
        let connected = Arc::new(AtomicBool::new(false));

        tracing::info!(
            host = %config.host,
            port = config.port,
            client_id = %client_id,
            "Connecting to MQTT broker"
        );

        let event_loop = tokio::spawn(handle_events(
            event_loop,
            inbound_tx,
            connack_tx,
            Arc::clone(&connected),
        ));

        let timeout = config.connection_timeout();
        let outcome = match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(ProtocolError::ConnectionFailed(reason)),
            Ok(Err(_)) => Err(ProtocolError::ConnectionFailed(
                "MQTT event loop terminated unexpectedly".to_string(),
            )),
            Err(_) => Err(ProtocolError::ConnectionFailed(format!(
                "MQTT connection timeout after {}s",
                timeout.as_secs()
            ))),
        };
        if let Err(e) = outcome {
            event_loop.abort();
            return Err(e);
        }

        for filter in subscriptions {
            if let Err(e) = client.subscribe(filter, QoS::AtMostOnce).await {
                event_loop.abort();
                return Err(ProtocolError::Mqtt(e));
            }
        }
        tracing::debug!(?subscriptions, "Subscribed to monitor topics");

        tracing::info!(host = %config.host, port = config.port, "Connected to MQTT broker");
        let transport = Self {
            client,
            host: config.host.clone(),
            port: config.port,
            connected,
            event_loop,
        };
        Ok((transport, inbound_rx))
    }

    /// Returns whether the connection is still up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!(host = %self.host, port = self.port, "Disconnecting from MQTT broker");
        self.client.disconnect().await?;
        self.connected.store(false, Ordering::Release);
        Ok(())
    }
}

impl Publisher for MqttTransport {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), ProtocolError> {
        tracing::debug!(topic = %topic, payload = %payload, "Publishing MQTT message");
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(ProtocolError::Mqtt)
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Drives the `rumqttc` event loop until the first error or disconnect.
async fn handle_events(
    mut event_loop: EventLoop,
    inbound_tx: mpsc::Sender<TransportEvent>,
    connack_tx: oneshot::Sender<Result<(), String>>,
    connected: Arc<AtomicBool>,
) {
    use rumqttc::{Event, Packet};

    let mut connack_tx = Some(connack_tx);

    let reason = loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::trace!(topic = %publish.topic, "MQTT message received");
                let event = TransportEvent::Message {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                };
                if inbound_tx.send(event).await.is_err() {
                    tracing::debug!("Inbound receiver dropped, stopping MQTT event loop");
                    break None;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                break Some("broker closed the connection".to_string());
            }
            Ok(_) => {}
            Err(e) => {
                break Some(e.to_string());
            }
        }
    };

    connected.store(false, Ordering::Release);

    if let Some(tx) = connack_tx.take() {
        let _ = tx.send(Err(reason.unwrap_or_else(|| "event loop stopped".to_string())));
        return;
    }

    if let Some(reason) = reason {
        tracing::warn!(reason = %reason, "MQTT connection lost");
        let _ = inbound_tx
            .send(TransportEvent::Disconnected {
                reason: Some(reason),
            })
            .await;
    }
}
