// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT transport using mockforge-mqtt.

#![cfg(feature = "mqtt")]

use std::time::Duration;

use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use tokio::time::sleep;
use watchtower::config::{BrokerConfig, DeviceEntry, MonitorConfig};
use watchtower::transport::{MqttTransport, Publisher, monitor_subscriptions};
use watchtower::{DeviceStatus, Error, Monitor, ProtocolError};

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to bind
    sleep(Duration::from_millis(500)).await;
}

fn broker(port: u16) -> BrokerConfig {
    BrokerConfig {
        host: "127.0.0.1".to_string(),
        port,
        connection_timeout_secs: 2,
        ..BrokerConfig::default()
    }
}

// ============================================================================
// MqttTransport
// ============================================================================

mod transport {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let result = MqttTransport::connect(&broker(port), &monitor_subscriptions("MermaidsTale")).await;
        assert!(result.is_ok(), "Failed to connect: {:?}", result.err());

        let (transport, _inbound) = result.unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.host(), "127.0.0.1");
        assert_eq!(transport.port(), port);
    }

    #[tokio::test]
    async fn publish_is_queued() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (transport, _inbound) = MqttTransport::connect(&broker(port), &[]).await.unwrap();
        assert!(transport.publish("MermaidsTale/JungleDoor/command", "PING").is_ok());
    }

    #[tokio::test]
    async fn connect_refused_fails() {
        let port = get_test_port();

        let result = MqttTransport::connect(&broker(port), &[]).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn empty_host_is_invalid() {
        let config = BrokerConfig {
            host: String::new(),
            ..BrokerConfig::default()
        };
        let result = MqttTransport::connect(&config, &[]).await;
        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn disconnect_clears_flag() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (transport, _inbound) = MqttTransport::connect(&broker(port), &[]).await.unwrap();
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
    }
}

// ============================================================================
// Monitor over MQTT
// ============================================================================

mod monitor {
    use super::*;

    fn config(port: u16) -> MonitorConfig {
        let mut config = MonitorConfig::default()
            .with_device(DeviceEntry::embedded_node("JungleDoor"))
            .with_device(DeviceEntry::zone_controller("Cove"));
        config.broker = broker(port);
        config
    }

    #[tokio::test]
    async fn connect_then_ping() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let monitor = Monitor::new(config(port)).unwrap();
        monitor.connect().await.unwrap();
        assert!(monitor.is_connected());

        monitor.ping_device("JungleDoor").unwrap();
        assert_eq!(
            monitor.device("JungleDoor").unwrap().status,
            DeviceStatus::Testing
        );
        assert!(monitor.status_summary().connected);
    }

    #[tokio::test]
    async fn connect_twice_is_noop() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let monitor = Monitor::new(config(port)).unwrap();
        monitor.connect().await.unwrap();
        monitor.connect().await.unwrap();
        assert!(monitor.is_connected());
    }

    #[tokio::test]
    async fn concurrent_connects_open_one_connection() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let monitor = Monitor::new(config(port)).unwrap();
        let mut events = monitor.subscribe();

        let (first, second) = tokio::join!(monitor.connect(), monitor.connect());
        first.unwrap();
        second.unwrap();
        assert!(monitor.is_connected());

        assert!(events.try_recv().unwrap().is_connection());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn oversized_message_keeps_monitor_connected() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let monitor = Monitor::new(config(port)).unwrap();
        monitor.connect().await.unwrap();

        let (camera, _inbound) = MqttTransport::connect(&broker(port), &[]).await.unwrap();
        let frame = "x".repeat(20_000);
        camera.publish("MermaidsTale/Cam/status", &frame).unwrap();
        camera.publish("MermaidsTale/GameStart", "triggered").unwrap();
        sleep(Duration::from_millis(500)).await;

        assert!(monitor.is_connected());
        monitor.ping_device("JungleDoor").unwrap();
        assert!(
            monitor
                .feed(10)
                .iter()
                .all(|entry| entry.payload.len() <= monitor.config().feed.payload_budget)
        );
    }

    #[tokio::test]
    async fn unreachable_broker_leaves_monitor_offline() {
        let port = get_test_port();

        let monitor = Monitor::new(config(port)).unwrap();
        let result = monitor.connect().await;
        assert!(matches!(result, Err(Error::Protocol(_))));

        assert!(!monitor.is_connected());
        assert!(matches!(monitor.ping_device("JungleDoor"), Err(Error::NotConnected)));

        let summary = monitor.status_summary();
        assert!(!summary.connected);
        assert_eq!(summary.counts.unknown, 2);
    }
}
