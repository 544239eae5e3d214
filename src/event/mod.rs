// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live event stream for dashboard push updates.
//!
//! The monitor publishes a [`MonitorEvent`] for every feed entry, every
//! device status transition, and every broker connection change. The
//! [`EventBus`] uses tokio's broadcast channel so any number of consumers
//! (server-sent-event handlers, loggers) can follow along.
//!
//! # Examples
//!
//! ```
//! use watchtower::event::{EventBus, MonitorEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(MonitorEvent::connection_changed(true));
//! assert!(rx.try_recv().unwrap().is_connection());
//! ```

mod event_bus;
mod monitor_event;

pub use event_bus::EventBus;
pub use monitor_event::MonitorEvent;
