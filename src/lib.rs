// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `WatchTower` - health monitoring for MQTT-connected escape-room devices.
//!
//! The monitor joins one MQTT broker, tracks the liveness of a configured
//! fleet, and keeps a filtered feed of recent traffic for a live dashboard.
//!
//! # Device Kinds
//!
//! - **Embedded nodes** (ESP32 props) answer `PING` with `PONG` under
//!   `<namespace>/<topic>/{command,status}`.
//! - **Zone controllers** (room-level BAC units) are never pinged. They are
//!   alive while they publish under `<topic>/get/...`.
//!
//! # Device Status
//!
//! Every device is `Unknown` until probed or heard from, `Testing` while a
//! probe is outstanding, then `Online` or `Offline`. A periodic sweep turns
//! overdue probes into `Offline` (3 s for embedded nodes, 15 s for zone
//! controllers by default).
//!
//! # Quick Start
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use watchtower::{DeviceEntry, Monitor, MonitorConfig};
//!
//! #[tokio::main]
//! async fn main() -> watchtower::Result<()> {
//!     let config = MonitorConfig::default()
//!         .with_broker("10.1.10.115", 1883)
//!         .with_device(DeviceEntry::embedded_node("JungleDoor"))
//!         .with_device(DeviceEntry::zone_controller("Cove").with_room("Mermaid's Cove"));
//!
//!     let monitor = Monitor::new(config)?;
//!     if let Err(e) = monitor.connect().await {
//!         eprintln!("running offline: {e}");
//!     }
//!
//!     let cancel = CancellationToken::new();
//!     let _sweeper = monitor.spawn_sweeper(cancel.clone());
//!
//!     monitor.ping_device("JungleDoor")?;
//!     let receipt = monitor.send_command("Cove", "LIGHTS_ON")?;
//!     println!("sent {} to {}", receipt.command, receipt.topic);
//!
//!     for device in monitor.status_summary().devices {
//!         println!("{}: {}", device.name, device.status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Live Events
//!
//! ```no_run
//! # fn example(monitor: &watchtower::Monitor) {
//! let mut events = monitor.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod filter;
pub mod monitor;
pub mod registry;
pub mod transport;

pub use config::{BrokerConfig, DeviceEntry, FeedSettings, FilterSettings, MonitorConfig, ProbeTimeouts};
pub use error::{ConfigError, Error, ProtocolError, Result};
pub use event::{EventBus, MonitorEvent};
pub use feed::{Direction, EventFeed, FeedEntry};
pub use filter::{FilterPipeline, SuppressReason, Verdict};
pub use monitor::{
    CommandReceipt, DeviceSnapshot, HealthProbe, Monitor, StatusCounts, StatusSummary,
    StatusTransition,
};
pub use registry::{Device, DeviceKind, DeviceRegistry, DeviceStatus, DisplayInfo};
#[cfg(feature = "mqtt")]
pub use transport::MqttTransport;
pub use transport::{Publisher, TransportEvent};
