// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `WatchTower` monitor.
//!
//! Configuration problems are fatal at startup, broker problems are
//! recoverable (the monitor keeps serving an offline dashboard), and
//! requests naming an unregistered device come back as a structured
//! [`Error::UnknownDevice`].

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Communication with the broker failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No device with this name is registered.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// The monitor has no active broker connection.
    #[error("MQTT not connected")]
    NotConnected,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid JSON for this schema.
    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),

    /// Two device entries share the same name.
    #[error("duplicate device name: {0}")]
    DuplicateDevice(String),

    /// A setting has a value the monitor cannot work with.
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Errors related to the broker connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The MQTT client rejected a request.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A publish was attempted with no transport attached.
    #[error("no transport attached")]
    NotAttached,
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_device_display() {
        let err = Error::UnknownDevice("NoSuchDevice".to_string());
        assert_eq!(err.to_string(), "unknown device: NoSuchDevice");
    }

    #[test]
    fn error_from_config_error() {
        let err: Error = ConfigError::DuplicateDevice("Cove".to_string()).into();
        assert!(matches!(err, Error::Config(ConfigError::DuplicateDevice(name)) if name == "Cove"));
    }

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::ConnectionFailed("refused".to_string());
        assert_eq!(err.to_string(), "connection failed: refused");
    }

    #[test]
    fn not_connected_display() {
        assert_eq!(Error::NotConnected.to_string(), "MQTT not connected");
    }
}
