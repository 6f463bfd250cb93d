//! Projections of telemetry for the two display views

use chrono::{DateTime, Utc};
use tracing::debug;

use super::snapshot::{clamp_percent, HistoryEntry};

const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Most history rows the detail view asks for
pub const HISTORY_LIMIT: usize = 600;

/// Default number of columns in the long-range chart
pub const CHART_WIDTH: usize = 120;

/// Render 0-100 percentages as block glyphs, newest last
pub fn sparkline<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a f64>,
{
    values
        .into_iter()
        .map(|value| {
            let level = (clamp_percent(*value) / 100.0 * (BLOCKS.len() - 1) as f64).round() as usize;
            BLOCKS[level.min(BLOCKS.len() - 1)]
        })
        .collect()
}

/// One column of the long-range chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    /// Timestamp of the first entry folded into this column
    pub timestamp: DateTime<Utc>,
    pub cpu: f64,
    pub memory: f64,
    pub gpu: f64,
}

/// History reduced to a fixed number of averaged columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LongRangeChart {
    points: Vec<ChartPoint>,
}

impl LongRangeChart {
    pub fn from_history(entries: &[HistoryEntry], width: usize) -> Self {
        if entries.is_empty() || width == 0 {
            return Self::default();
        }

        let mut ordered: Vec<&HistoryEntry> = entries.iter().collect();
        ordered.sort_by_key(|entry| entry.timestamp);

        let per_column = ordered.len().div_ceil(width);
        let points = ordered
            .chunks(per_column)
            .map(|column| {
                let n = column.len() as f64;
                let (cpu, memory, gpu) = column.iter().fold((0.0, 0.0, 0.0), |acc, entry| {
                    let usage = entry.stats.usage();
                    (acc.0 + usage.cpu, acc.1 + usage.memory, acc.2 + usage.gpu)
                });
                ChartPoint {
                    timestamp: column[0].timestamp,
                    cpu: cpu / n,
                    memory: memory / n,
                    gpu: gpu / n,
                }
            })
            .collect();

        Self { points }
    }

    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Time covered from the first to the last column
    pub fn span(&self) -> Option<chrono::Duration> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some(last.timestamp - first.timestamp)
    }
}

/// State of the on-demand long-range view.
///
/// History is fetched once each time the view opens. Results that arrive
/// after the view was closed, or for an earlier opening, are ignored.
#[derive(Debug)]
pub struct HistoryView {
    open: bool,
    generation: u64,
    width: usize,
    chart: Option<LongRangeChart>,
}

impl HistoryView {
    pub fn new(width: usize) -> Self {
        Self {
            open: false,
            generation: 0,
            width,
            chart: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open the view. Returns the request generation to fetch for, or
    /// `None` if it was already open.
    pub fn open(&mut self) -> Option<u64> {
        if self.open {
            return None;
        }
        self.open = true;
        self.generation += 1;
        self.chart = None;
        Some(self.generation)
    }

    pub fn close(&mut self) {
        self.open = false;
        self.chart = None;
    }

    /// Install fetched history. Returns whether it was used.
    pub fn accept(&mut self, generation: u64, entries: &[HistoryEntry]) -> bool {
        if !self.open || generation != self.generation {
            debug!(generation, current = self.generation, "Dropping stale history result");
            return false;
        }
        self.chart = Some(LongRangeChart::from_history(entries, self.width));
        true
    }

    pub fn chart(&self) -> Option<&LongRangeChart> {
        self.chart.as_ref()
    }
}

impl Default for HistoryView {
    fn default() -> Self {
        Self::new(CHART_WIDTH)
    }
}
