// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numeric token extraction for sensor payloads.

use std::sync::LazyLock;

use regex::Regex;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a literal
    Regex::new(r"[-+]?\d*\.?\d+").unwrap()
});

/// Returns the last number appearing in `payload`.
///
/// Sensors publish either a bare reading (`"42.5"`) or a labelled one
/// (`"Hor: -12"`); the reading is always the final number.
///
/// # Examples
///
/// ```
/// use watchtower::filter::last_number;
///
/// assert_eq!(last_number("Hor: -12"), Some(-12.0));
/// assert_eq!(last_number("pos 3 angle 90.5"), Some(90.5));
/// assert_eq!(last_number("calibrating"), None);
/// ```
#[must_use]
pub fn last_number(payload: &str) -> Option<f64> {
    NUMBER
        .find_iter(payload)
        .last()
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_integer() {
        assert_eq!(last_number("10"), Some(10.0));
    }

    #[test]
    fn signed_and_fractional() {
        assert_eq!(last_number("-3.25"), Some(-3.25));
        assert_eq!(last_number("+7"), Some(7.0));
        assert_eq!(last_number(".5"), Some(0.5));
    }

    #[test]
    fn json_payload_takes_final_value() {
        assert_eq!(last_number(r#"{"x": 1, "distance": 142}"#), Some(142.0));
    }

    #[test]
    fn no_digits() {
        assert_eq!(last_number(""), None);
        assert_eq!(last_number("PONG"), None);
    }
}
