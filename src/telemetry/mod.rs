//! Host telemetry: live polling, local fallback, bounded history and views

pub mod chart;
pub mod fallback;
pub mod poller;
pub mod ring;
pub mod snapshot;

pub use chart::{sparkline, HistoryView, LongRangeChart, HISTORY_LIMIT};
pub use poller::{SnapshotSource, TelemetryClient, TelemetryError, TelemetryPoller, TelemetrySample};
pub use ring::{RingBuffer, UsageHistory, HISTORY_CAPACITY};
pub use snapshot::{HistoryEntry, StatsSnapshot, UsageSample};
