//! Time-series history of raw network statistics.
//!
//! The graph pipeline only ever reads a suffix of this history each frame.
//! Values and timestamps are kept in ring buffers of identical capacity and are
//! always pushed together, so forward index `i` of a metric's value buffer and
//! of the shared timestamp buffer refer to the same raw sample.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ring_buffer::RingBuffer;

/// Identifier of a tracked statistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(pub u32);

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "metric#{}", self.0)
    }
}

/// How raw samples of a metric are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Point-in-time measurement, e.g. round-trip time.
    #[default]
    Gauge,
    /// Accumulation over the preceding interval, e.g. bytes sent.
    Counter,
}

/// Rate at which a history receives samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRate {
    #[default]
    EveryTick,
    PerSecond,
}

/// Read access to raw samples, as consumed by the graph pipeline.
pub trait SampleHistory {
    /// Timestamps (seconds) shared by every metric of this history.
    fn timestamps(&self) -> &RingBuffer<f64>;

    fn values(&self, metric: MetricId) -> Option<&RingBuffer<f32>>;

    fn kind(&self, metric: MetricId) -> MetricKind;
}

struct Series {
    kind: MetricKind,
    values: RingBuffer<f32>,
}

/// Single-rate history with one shared timestamp buffer.
pub struct StatHistory {
    capacity: usize,
    timestamps: RingBuffer<f64>,
    series: HashMap<MetricId, Series>,
}

impl StatHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            timestamps: RingBuffer::new(capacity),
            series: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Start tracking a metric. Registering an already tracked metric only
    /// updates its kind.
    ///
    /// Past samples of a newly registered metric are back-filled with zeros so
    /// that its values stay aligned with the shared timestamps.
    pub fn register(&mut self, metric: MetricId, kind: MetricKind) {
        let len = self.timestamps.len();
        let capacity = self.capacity;
        let series = self.series.entry(metric).or_insert_with(|| {
            let mut values = RingBuffer::new(capacity);
            for _ in 0..len {
                values.push_back(0.0);
            }
            Series { kind, values }
        });
        series.kind = kind;
    }

    pub fn metrics(&self) -> impl Iterator<Item = MetricId> + '_ {
        self.series.keys().copied()
    }

    /// Append one raw sample for every registered metric. Metrics missing from
    /// `samples` receive 0.0; unregistered metrics in `samples` are ignored.
    pub fn record(&mut self, timestamp: f64, samples: &[(MetricId, f32)]) {
        self.timestamps.push_back(timestamp);
        for (id, series) in self.series.iter_mut() {
            let value = samples
                .iter()
                .find(|(m, _)| m == id)
                .map(|&(_, v)| v)
                .unwrap_or(0.0);
            series.values.push_back(value);
        }
    }
}

impl SampleHistory for StatHistory {
    fn timestamps(&self) -> &RingBuffer<f64> {
        &self.timestamps
    }

    fn values(&self, metric: MetricId) -> Option<&RingBuffer<f32>> {
        self.series.get(&metric).map(|s| &s.values)
    }

    fn kind(&self, metric: MetricId) -> MetricKind {
        self.series.get(&metric).map(|s| s.kind).unwrap_or_default()
    }
}

/// Per-tick history plus a per-second aggregate of it.
pub struct MultiRateHistory {
    every_tick: StatHistory,
    per_second: StatHistory,
    /// Whole second currently being accumulated.
    current_second: Option<i64>,
    accumulator: HashMap<MetricId, (f64, u32)>,
    scratch: Vec<(MetricId, f32)>,
}

impl MultiRateHistory {
    pub fn new(tick_capacity: usize, second_capacity: usize) -> Self {
        Self {
            every_tick: StatHistory::new(tick_capacity),
            per_second: StatHistory::new(second_capacity),
            current_second: None,
            accumulator: HashMap::new(),
            scratch: Vec::new(),
        }
    }

    pub fn register(&mut self, metric: MetricId, kind: MetricKind) {
        self.every_tick.register(metric, kind);
        self.per_second.register(metric, kind);
    }

    pub fn history(&self, rate: SampleRate) -> &StatHistory {
        match rate {
            SampleRate::EveryTick => &self.every_tick,
            SampleRate::PerSecond => &self.per_second,
        }
    }

    /// Record one simulation tick. When the tick falls into a new whole second
    /// the previous second is flushed into the per-second history, stamped with
    /// the boundary time.
    ///
    /// Every whole second skipped without a tick still gets a per-second
    /// sample: gauges repeat their last value and counters read zero.
    pub fn record_tick(&mut self, timestamp: f64, samples: &[(MetricId, f32)]) {
        let second = timestamp.floor() as i64;
        match self.current_second {
            Some(current) if second > current => {
                self.flush_second((current + 1) as f64);
                // Older idle seconds would be evicted straight away.
                let capacity = self.per_second.capacity() as i64;
                let first_idle = (current + 2).max(second - capacity + 1);
                for boundary in first_idle..=second {
                    self.flush_idle_second(boundary as f64);
                }
                self.current_second = Some(second);
            }
            None => self.current_second = Some(second),
            _ => {}
        }

        self.every_tick.record(timestamp, samples);
        for &(metric, value) in samples {
            let entry = self.accumulator.entry(metric).or_insert((0.0, 0));
            entry.0 += value as f64;
            entry.1 += 1;
        }
    }

    fn flush_second(&mut self, boundary: f64) {
        self.scratch.clear();
        for (&metric, &(sum, count)) in self.accumulator.iter() {
            if count == 0 {
                continue;
            }
            let value = match self.every_tick.kind(metric) {
                MetricKind::Gauge => sum / count as f64,
                MetricKind::Counter => sum,
            };
            self.scratch.push((metric, value as f32));
        }
        self.per_second.record(boundary, &self.scratch);
        for entry in self.accumulator.values_mut() {
            *entry = (0.0, 0);
        }
    }

    fn flush_idle_second(&mut self, boundary: f64) {
        let per_second = &self.per_second;
        self.scratch.clear();
        self.scratch.extend(
            per_second
                .metrics()
                .filter(|&metric| per_second.kind(metric) == MetricKind::Gauge)
                .filter_map(|metric| per_second.values(metric)?.newest().map(|&v| (metric, v))),
        );
        self.per_second.record(boundary, &self.scratch);
    }
}
