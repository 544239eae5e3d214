// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feed filtering for inbound messages.
//!
//! Every inbound message runs through the same ordered rules. The first
//! rule that hides a message decides; a message no rule hides is shown.
//!
//! ```text
//! (topic, payload)
//!       │
//!       ├─ outside namespace and zone prefixes ─▶ Hidden(Namespace)
//!       ├─ matches a hidden pattern ───────────▶ Hidden(HiddenTopic)
//!       ├─ pending echo of our own publish ────▶ Hidden(Echo)       (consumes it)
//!       ├─ same payload as last time ──────────▶ Hidden(Duplicate)  (dedup topics)
//!       ├─ numeric change below threshold ─────▶ Hidden(Delta)      (delta topics)
//!       └─────────────────────────────────────▶ Shown
//! ```
//!
//! The namespace and hidden-topic rules never touch the caches.
//!
//! # Examples
//!
//! ```
//! use watchtower::config::FilterSettings;
//! use watchtower::filter::{FilterPipeline, SuppressReason, Verdict};
//!
//! let mut filter = FilterPipeline::new("MermaidsTale", vec![], &FilterSettings::default());
//!
//! filter.track_outbound("MermaidsTale/JungleDoor/command", "PING");
//! assert_eq!(
//!     filter.evaluate("MermaidsTale/JungleDoor/command", "PING"),
//!     Verdict::Hidden(SuppressReason::Echo)
//! );
//! assert!(filter.evaluate("MermaidsTale/JungleDoor/command", "PING").is_shown());
//! ```

mod numeric;

pub use numeric::last_number;

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::config::FilterSettings;

/// Why a message was kept out of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressReason {
    /// Topic is outside the game namespace and every zone prefix.
    Namespace,
    /// Topic matches a hidden pattern (heartbeats).
    HiddenTopic,
    /// The monitor published this exact message itself.
    Echo,
    /// Same payload as the previous message on this topic.
    Duplicate,
    /// Numeric reading moved less than the threshold.
    Delta,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Namespace => "namespace",
            Self::HiddenTopic => "hidden topic",
            Self::Echo => "echo",
            Self::Duplicate => "duplicate",
            Self::Delta => "delta",
        };
        f.write_str(reason)
    }
}

/// Outcome of filtering one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The message belongs in the feed.
    Shown,
    /// The message is kept out of the feed.
    Hidden(SuppressReason),
}

impl Verdict {
    /// Returns `true` if the message belongs in the feed.
    #[must_use]
    pub fn is_shown(self) -> bool {
        matches!(self, Self::Shown)
    }
}

/// Stateful feed filter.
///
/// Holds the echo list and the per-topic caches used for duplicate and
/// delta suppression. Not synchronized: the monitor keeps it behind the
/// same lock as the registry and the feed.
#[derive(Debug, Clone)]
pub struct FilterPipeline {
    namespace: String,
    zone_prefixes: Vec<String>,
    hidden_topics: Vec<String>,
    dedup_topics: Vec<String>,
    delta_topics: Vec<String>,
    delta_threshold: f64,
    echo_capacity: usize,
    /// Newest first.
    recent_outbound: VecDeque<(String, String)>,
    last_numeric: HashMap<String, f64>,
    last_payload: HashMap<String, String>,
}

impl FilterPipeline {
    /// Creates a filter for `namespace`.
    ///
    /// `zone_prefixes` are merged with the prefixes listed in `settings`.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        zone_prefixes: Vec<String>,
        settings: &FilterSettings,
    ) -> Self {
        let mut prefixes = zone_prefixes;
        for extra in &settings.zone_prefixes {
            if !prefixes.contains(extra) {
                prefixes.push(extra.clone());
            }
        }

        Self {
            namespace: namespace.into(),
            zone_prefixes: prefixes,
            hidden_topics: settings.hidden_topics.clone(),
            dedup_topics: settings.dedup_topics.clone(),
            delta_topics: settings.delta_topics.clone(),
            delta_threshold: settings.delta_threshold,
            echo_capacity: settings.echo_capacity,
            recent_outbound: VecDeque::with_capacity(settings.echo_capacity),
            last_numeric: HashMap::new(),
            last_payload: HashMap::new(),
        }
    }

    /// Decides whether an inbound message is shown, updating the caches.
    pub fn evaluate(&mut self, topic: &str, payload: &str) -> Verdict {
        if !self.in_scope(topic) {
            return Verdict::Hidden(SuppressReason::Namespace);
        }

        if matches_any(topic, &self.hidden_topics) {
            return Verdict::Hidden(SuppressReason::HiddenTopic);
        }

        if self.take_echo(topic, payload) {
            return Verdict::Hidden(SuppressReason::Echo);
        }

        if matches_any(topic, &self.dedup_topics) {
            let previous = self
                .last_payload
                .insert(topic.to_string(), payload.to_string());
            if previous.as_deref() == Some(payload) {
                return Verdict::Hidden(SuppressReason::Duplicate);
            }
        }

        if matches_any(topic, &self.delta_topics)
            && let Some(value) = last_number(payload)
        {
            if let Some(&previous) = self.last_numeric.get(topic)
                && (value - previous).abs() < self.delta_threshold
            {
                return Verdict::Hidden(SuppressReason::Delta);
            }
            self.last_numeric.insert(topic.to_string(), value);
        }

        Verdict::Shown
    }

    /// Remembers a message the monitor is about to publish so its echo is
    /// hidden once.
    pub fn track_outbound(&mut self, topic: impl Into<String>, payload: impl Into<String>) {
        if self.echo_capacity == 0 {
            return;
        }
        self.recent_outbound.push_front((topic.into(), payload.into()));
        self.recent_outbound.truncate(self.echo_capacity);
    }

    /// Number of outbound messages still awaiting their echo.
    #[must_use]
    pub fn pending_echoes(&self) -> usize {
        self.recent_outbound.len()
    }

    /// Returns the prefixes accepted outside the namespace.
    #[must_use]
    pub fn zone_prefixes(&self) -> &[String] {
        &self.zone_prefixes
    }

    fn in_scope(&self, topic: &str) -> bool {
        topic.contains(self.namespace.as_str()) || matches_any(topic, &self.zone_prefixes)
    }

    fn take_echo(&mut self, topic: &str, payload: &str) -> bool {
        let position = self
            .recent_outbound
            .iter()
            .position(|(t, p)| t == topic && p == payload);
        match position {
            Some(index) => {
                self.recent_outbound.remove(index);
                true
            }
            None => false,
        }
    }
}

fn matches_any(topic: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| topic.contains(pattern.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "MermaidsTale";

    fn pipeline() -> FilterPipeline {
        FilterPipeline::new(NS, vec!["Cove".to_string()], &FilterSettings::default())
    }

    #[test]
    fn foreign_topics_are_hidden() {
        let mut filter = pipeline();
        assert_eq!(
            filter.evaluate("zigbee2mqtt/lamp", "ON"),
            Verdict::Hidden(SuppressReason::Namespace)
        );
    }

    #[test]
    fn namespace_and_zone_topics_are_shown() {
        let mut filter = pipeline();
        assert!(filter.evaluate("MermaidsTale/GameStart", "triggered").is_shown());
        assert!(filter.evaluate("Cove/get/temp", "21").is_shown());
    }

    #[test]
    fn settings_prefixes_extend_zone_prefixes() {
        let settings = FilterSettings {
            zone_prefixes: vec!["Lobby".to_string(), "Cove".to_string()],
            ..FilterSettings::default()
        };
        let filter = FilterPipeline::new(NS, vec!["Cove".to_string()], &settings);
        assert_eq!(filter.zone_prefixes(), ["Cove", "Lobby"]);
    }

    #[test]
    fn heartbeats_are_hidden_without_side_effects() {
        let mut filter = pipeline();
        filter.track_outbound("Cove/get/heartbeat", "1");
        assert_eq!(
            filter.evaluate("Cove/get/heartbeat", "1"),
            Verdict::Hidden(SuppressReason::HiddenTopic)
        );
        assert_eq!(filter.pending_echoes(), 1);
    }

    #[test]
    fn echo_suppression_is_one_shot() {
        let mut filter = pipeline();
        filter.track_outbound("MermaidsTale/JungleDoor/command", "PING");

        assert_eq!(
            filter.evaluate("MermaidsTale/JungleDoor/command", "PING"),
            Verdict::Hidden(SuppressReason::Echo)
        );
        assert!(filter.evaluate("MermaidsTale/JungleDoor/command", "PING").is_shown());
    }

    #[test]
    fn echo_requires_exact_pair() {
        let mut filter = pipeline();
        filter.track_outbound("MermaidsTale/JungleDoor/command", "PING");
        assert!(filter.evaluate("MermaidsTale/JungleDoor/command", "PONG").is_shown());
        assert_eq!(filter.pending_echoes(), 1);
    }

    #[test]
    fn repeated_sends_suppress_repeated_echoes() {
        let mut filter = pipeline();
        filter.track_outbound("MermaidsTale/Compass/command", "RESET");
        filter.track_outbound("MermaidsTale/Compass/command", "RESET");

        assert!(!filter.evaluate("MermaidsTale/Compass/command", "RESET").is_shown());
        assert!(!filter.evaluate("MermaidsTale/Compass/command", "RESET").is_shown());
        assert!(filter.evaluate("MermaidsTale/Compass/command", "RESET").is_shown());
    }

    #[test]
    fn echo_list_evicts_oldest() {
        let settings = FilterSettings {
            echo_capacity: 2,
            ..FilterSettings::default()
        };
        let mut filter = FilterPipeline::new(NS, vec![], &settings);
        filter.track_outbound("MermaidsTale/A/command", "PING");
        filter.track_outbound("MermaidsTale/B/command", "PING");
        filter.track_outbound("MermaidsTale/C/command", "PING");

        assert_eq!(filter.pending_echoes(), 2);
        assert!(filter.evaluate("MermaidsTale/A/command", "PING").is_shown());
        assert!(!filter.evaluate("MermaidsTale/C/command", "PING").is_shown());
    }

    #[test]
    fn duplicate_suppression_tracks_baseline() {
        let mut filter = pipeline();
        let topic = "MermaidsTale/Cannon1/Loaded";

        assert!(filter.evaluate(topic, "triggered").is_shown());
        assert_eq!(
            filter.evaluate(topic, "triggered"),
            Verdict::Hidden(SuppressReason::Duplicate)
        );
        assert!(filter.evaluate(topic, "reset").is_shown());
        assert!(filter.evaluate(topic, "triggered").is_shown());
    }

    #[test]
    fn duplicates_on_other_topics_are_shown() {
        let mut filter = pipeline();
        assert!(filter.evaluate("MermaidsTale/GameStart", "triggered").is_shown());
        assert!(filter.evaluate("MermaidsTale/GameStart", "triggered").is_shown());
    }

    #[test]
    fn delta_suppression_against_last_shown_value() {
        let mut filter = pipeline();
        let topic = "MermaidsTale/Cannon1/Hor";

        assert!(filter.evaluate(topic, "10").is_shown());
        assert_eq!(
            filter.evaluate(topic, "10.5"),
            Verdict::Hidden(SuppressReason::Delta)
        );
        assert!(filter.evaluate(topic, "13").is_shown());
    }

    #[test]
    fn suppressed_delta_does_not_move_baseline() {
        let mut filter = pipeline();
        let topic = "MermaidsTale/Cannon2/Hor";

        assert!(filter.evaluate(topic, "10").is_shown());
        assert!(!filter.evaluate(topic, "11.5").is_shown());
        // 11.9 is within 2 of 10, the last value shown
        assert!(!filter.evaluate(topic, "11.9").is_shown());
        assert!(filter.evaluate(topic, "12").is_shown());
    }

    #[test]
    fn delta_uses_last_number_in_payload() {
        let mut filter = pipeline();
        let topic = "MermaidsTale/Wheel/angle";

        assert!(filter.evaluate(topic, "pos 3 angle 90").is_shown());
        assert!(!filter.evaluate(topic, "pos 50 angle 91").is_shown());
    }

    #[test]
    fn non_numeric_delta_payload_is_shown() {
        let mut filter = pipeline();
        let topic = "MermaidsTale/Cannon1/Hor";

        assert!(filter.evaluate(topic, "calibrating").is_shown());
        assert!(filter.evaluate(topic, "calibrating").is_shown());
    }

    #[test]
    fn zero_echo_capacity_disables_tracking() {
        let settings = FilterSettings {
            echo_capacity: 0,
            ..FilterSettings::default()
        };
        let mut filter = FilterPipeline::new(NS, vec![], &settings);
        filter.track_outbound("MermaidsTale/A/command", "PING");
        assert_eq!(filter.pending_echoes(), 0);
    }
}
