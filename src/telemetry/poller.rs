//! Telemetry endpoint client and the steady live poll

use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::fallback::local_snapshot;
use super::snapshot::{HistoryEntry, StatsSnapshot};

/// Where a snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Endpoint,
    Fallback,
}

/// A snapshot ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub snapshot: StatsSnapshot,
    pub source: SnapshotSource,
}

/// Telemetry endpoint errors
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Telemetry request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Telemetry endpoint returned status {0}")]
    Status(u16),

    #[error("No history endpoint configured")]
    NoHistoryEndpoint,
}

/// HTTP client for the snapshot and history endpoints
#[derive(Clone)]
pub struct TelemetryClient {
    client: Client,
    snapshot_url: String,
    history_url: Option<String>,
}

impl TelemetryClient {
    pub fn new(snapshot_url: impl Into<String>, history_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            snapshot_url: snapshot_url.into(),
            history_url,
        }
    }

    pub fn has_history(&self) -> bool {
        self.history_url.is_some()
    }

    /// Fetch the live snapshot
    pub async fn fetch_snapshot(&self) -> Result<StatsSnapshot, TelemetryError> {
        let response = self.client.get(&self.snapshot_url).send().await?;

        if !response.status().is_success() {
            return Err(TelemetryError::Status(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }

    /// Live snapshot, or a locally built one if the endpoint fails in any way
    pub async fn sample(&self) -> TelemetrySample {
        match self.fetch_snapshot().await {
            Ok(snapshot) => TelemetrySample {
                snapshot,
                source: SnapshotSource::Endpoint,
            },
            Err(e) => {
                warn!(url = %self.snapshot_url, error = %e, "Telemetry unreachable, using local fallback");
                TelemetrySample {
                    snapshot: local_snapshot(),
                    source: SnapshotSource::Fallback,
                }
            }
        }
    }

    /// Fetch up to `limit` history rows, keeping the most recent if the
    /// endpoint ignores the limit
    pub async fn fetch_history(&self, limit: usize) -> Result<Vec<HistoryEntry>, TelemetryError> {
        let url = self
            .history_url
            .as_deref()
            .ok_or(TelemetryError::NoHistoryEndpoint)?;

        let response = self
            .client
            .get(url)
            .query(&[("limit", limit)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TelemetryError::Status(response.status().as_u16()));
        }

        let mut entries: Vec<HistoryEntry> = response.json().await?;
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        debug!(count = entries.len(), "Fetched telemetry history");
        Ok(entries)
    }
}

/// Background task sampling the endpoint at a fixed interval.
///
/// Each fetch is awaited before the next tick, so a hung request delays only
/// this poller. Samples are handed to the session over a channel.
pub struct TelemetryPoller {
    handle: Option<JoinHandle<()>>,
}

impl TelemetryPoller {
    pub fn spawn(
        client: TelemetryClient,
        period: Duration,
        samples_tx: mpsc::Sender<TelemetrySample>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let sample = client.sample().await;
                if samples_tx.send(sample).await.is_err() {
                    debug!("Telemetry receiver dropped, stopping poller");
                    break;
                }
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
