// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded buffer of recent transport traffic for the live dashboard.
//!
//! The feed keeps the newest entries up to a fixed capacity and evicts the
//! oldest beyond it. Reads are always newest first.
//!
//! # Examples
//!
//! ```
//! use watchtower::feed::{Direction, EventFeed, FeedEntry};
//!
//! let mut feed = EventFeed::new(2);
//! feed.push(FeedEntry::new(Direction::Inbound, "MermaidsTale/GameStart", "triggered", None));
//! feed.push(FeedEntry::new(Direction::Outbound, "Cove/set/lights", "LIGHTS", Some("Cove".into())));
//! feed.push(FeedEntry::new(Direction::Inbound, "Cove/get/temp", "21", Some("Cove".into())));
//!
//! let recent = feed.read(10);
//! assert_eq!(recent.len(), 2);
//! assert_eq!(recent[0].topic, "Cove/get/temp");
//! ```

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of entries kept.
pub const DEFAULT_CAPACITY: usize = 200;

/// Which way a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Received from the broker.
    #[serde(rename = "RX")]
    Inbound,
    /// Published by the monitor.
    #[serde(rename = "TX")]
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "RX"),
            Self::Outbound => write!(f, "TX"),
        }
    }
}

/// One message shown in the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    /// When the message was seen or sent.
    pub timestamp: DateTime<Utc>,
    /// Which way it travelled.
    pub direction: Direction,
    /// Full topic.
    pub topic: String,
    /// Payload, possibly truncated.
    pub payload: String,
    /// Device the topic is attributed to.
    pub device: Option<String>,
}

impl FeedEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(
        direction: Direction,
        topic: impl Into<String>,
        payload: impl Into<String>,
        device: Option<String>,
    ) -> Self {
        Self::at(Utc::now(), direction, topic, payload, device)
    }

    /// Creates an entry with an explicit timestamp.
    #[must_use]
    pub fn at(
        timestamp: DateTime<Utc>,
        direction: Direction,
        topic: impl Into<String>,
        payload: impl Into<String>,
        device: Option<String>,
    ) -> Self {
        Self {
            timestamp,
            direction,
            topic: topic.into(),
            payload: payload.into(),
            device,
        }
    }

    /// Truncates the payload to at most `budget` bytes on a character boundary.
    #[must_use]
    pub fn with_payload_budget(mut self, budget: usize) -> Self {
        truncate_to_boundary(&mut self.payload, budget);
        self
    }
}

/// Fixed-capacity feed, newest entry at the front.
#[derive(Debug, Clone)]
pub struct EventFeed {
    entries: VecDeque<FeedEntry>,
    capacity: usize,
}

impl EventFeed {
    /// Creates an empty feed holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds an entry as the newest, evicting the oldest past capacity.
    pub fn push(&mut self, entry: FeedEntry) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Returns up to `limit` entries, newest first.
    #[must_use]
    pub fn read(&self, limit: usize) -> Vec<FeedEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    /// Returns the number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the feed holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the maximum number of entries held.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn truncate_to_boundary(text: &mut String, budget: usize) {
    if text.len() <= budget {
        return;
    }
    let mut end = budget;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn entry(topic: &str) -> FeedEntry {
        FeedEntry::new(Direction::Inbound, topic, "x", None)
    }

    #[test]
    fn read_is_newest_first() {
        let mut feed = EventFeed::new(10);
        feed.push(entry("first"));
        feed.push(entry("second"));
        feed.push(entry("third"));

        let topics: Vec<_> = feed.read(10).into_iter().map(|e| e.topic).collect();
        assert_eq!(topics, vec!["third", "second", "first"]);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut feed = EventFeed::new(3);
        for i in 0..5 {
            feed.push(entry(&format!("t{i}")));
        }

        assert_eq!(feed.len(), 3);
        let topics: Vec<_> = feed.read(10).into_iter().map(|e| e.topic).collect();
        assert_eq!(topics, vec!["t4", "t3", "t2"]);
    }

    #[test]
    fn read_respects_limit() {
        let mut feed = EventFeed::default();
        for i in 0..10 {
            feed.push(entry(&format!("t{i}")));
        }
        assert_eq!(feed.read(4).len(), 4);
        assert_eq!(feed.read(0).len(), 0);
        assert_eq!(feed.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn timestamps_never_increase_when_read() {
        let base = Utc::now();
        let mut feed = EventFeed::new(50);
        for i in 0..20 {
            feed.push(FeedEntry::at(
                base + TimeDelta::milliseconds(i),
                Direction::Inbound,
                "t",
                "p",
                None,
            ));
        }

        let entries = feed.read(50);
        assert!(entries.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn payload_budget_truncates_on_char_boundary() {
        let entry = FeedEntry::new(Direction::Inbound, "t", "aé", None).with_payload_budget(2);
        assert_eq!(entry.payload, "a");

        let entry = FeedEntry::new(Direction::Inbound, "t", "short", None).with_payload_budget(200);
        assert_eq!(entry.payload, "short");
    }

    #[test]
    fn direction_serializes_as_rx_tx() {
        assert_eq!(serde_json::to_string(&Direction::Inbound).unwrap(), "\"RX\"");
        assert_eq!(serde_json::to_string(&Direction::Outbound).unwrap(), "\"TX\"");
    }
}
