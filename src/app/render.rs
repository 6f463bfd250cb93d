//! Boundary to the rendering collaborator

use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, trace};

use crate::game::{LocalPlayerState, VisualEffect};
use crate::telemetry::{sparkline, LongRangeChart, TelemetrySample, UsageHistory};
use crate::ws::{ConnectionState, RemoteEntity};

/// Everything the scene needs to draw, pushed from the session loop
pub trait RenderSink: Send {
    /// Called every tick with the predicted local pose
    fn local_player(&mut self, player: &LocalPlayerState);

    /// Called every tick with the reconciled remote roster
    fn remote_entities(&mut self, entities: &HashMap<String, RemoteEntity>);

    /// Called every tick with live attack effects, oldest first
    fn effects(&mut self, effects: &VecDeque<VisualEffect>);

    /// Called after each telemetry sample lands in the buffers
    fn telemetry(&mut self, history: &UsageHistory, latest: &TelemetrySample);

    /// Called when the long-range view gets data, or `None` when it closes
    fn history_chart(&mut self, chart: Option<&LongRangeChart>);

    fn connection(&mut self, _state: ConnectionState) {}
}

/// Headless sink that writes the scene state to the log
#[derive(Debug, Default)]
pub struct LogSink {
    remote_count: usize,
}

impl RenderSink for LogSink {
    fn local_player(&mut self, player: &LocalPlayerState) {
        if player.moving {
            trace!(
                x = player.position.x,
                z = player.position.z,
                facing = player.facing,
                "Local pose"
            );
        }
    }

    fn remote_entities(&mut self, entities: &HashMap<String, RemoteEntity>) {
        if entities.len() != self.remote_count {
            self.remote_count = entities.len();
            debug!(count = self.remote_count, "Remote players");
        }
    }

    fn effects(&mut self, effects: &VecDeque<VisualEffect>) {
        if !effects.is_empty() {
            trace!(count = effects.len(), "Attack effects");
        }
    }

    fn telemetry(&mut self, history: &UsageHistory, latest: &TelemetrySample) {
        debug!(
            source = ?latest.source,
            cpu = %sparkline(history.cpu.iter()),
            mem = %sparkline(history.memory.iter()),
            gpu = %sparkline(history.gpu.iter()),
            "Telemetry"
        );
    }

    fn history_chart(&mut self, chart: Option<&LongRangeChart>) {
        match chart {
            Some(chart) => info!(
                columns = chart.points().len(),
                span_secs = chart.span().map(|span| span.num_seconds()).unwrap_or(0),
                "Long-range chart ready"
            ),
            None => debug!("Long-range chart closed"),
        }
    }

    fn connection(&mut self, state: ConnectionState) {
        info!(?state, "Authority connection");
    }
}
