// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `watchtower` daemon.
//!
//! Usage: `watchtower [CONFIG.json]`
//!
//! The config path may also come from `WATCHTOWER_CONFIG`. Without one the
//! built-in defaults are used (local broker, empty fleet). Log verbosity
//! follows `RUST_LOG`.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use watchtower::{Monitor, MonitorConfig, MonitorEvent};

const ENV_CONFIG: &str = "WATCHTOWER_CONFIG";
const DIGEST_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> watchtower::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchtower=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    let monitor = Monitor::new(config)?;

    if let Err(e) = monitor.connect().await {
        tracing::warn!(error = %e, "Broker unreachable, running in offline mode");
    }

    let cancel = CancellationToken::new();
    let sweeper = monitor.spawn_sweeper(cancel.clone());
    let logger = tokio::spawn(log_transitions(monitor.clone(), cancel.clone()));

    if monitor.is_connected()
        && let Err(e) = monitor.ping_all()
    {
        tracing::warn!(error = %e, "Initial ping failed, continuing");
    }

    let mut digest = tokio::time::interval(DIGEST_INTERVAL);
    digest.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                }
                break;
            }
            _ = digest.tick() => log_digest(&monitor),
        }
    }

    tracing::info!("Shutting down");
    cancel.cancel();
    monitor.disconnect();
    let _ = tokio::join!(sweeper, logger);
    Ok(())
}

fn load_config() -> Result<MonitorConfig, watchtower::ConfigError> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(ENV_CONFIG).ok());

    match path {
        Some(path) => MonitorConfig::load(path),
        None => {
            tracing::info!("No config file given, using defaults");
            let mut config = MonitorConfig::default();
            config.apply_env()?;
            Ok(config)
        }
    }
}

fn log_digest(monitor: &Monitor) {
    let summary = monitor.status_summary();
    tracing::info!(
        connected = summary.connected,
        online = summary.counts.online,
        offline = summary.counts.offline,
        testing = summary.counts.testing,
        unknown = summary.counts.unknown,
        "Fleet status"
    );
}

async fn log_transitions(monitor: Monitor, cancel: CancellationToken) {
    let mut events = monitor.subscribe();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(MonitorEvent::StatusChanged { device, previous, current }) => {
                    tracing::info!(device = %device, %previous, %current, "Status changed");
                }
                Ok(MonitorEvent::ConnectionChanged { connected }) => {
                    tracing::info!(connected, "Connection changed");
                }
                Ok(MonitorEvent::Feed { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
