//! Resampling of raw samples into fixed-width graph points.
//!
//! Each graph point integrates a contiguous span `[a, b)` of raw-sample index
//! space, where the span width is the (possibly fractional) samples-per-point
//! ratio. Partial samples at either end of the span are weighted by their
//! overlap with it.

use std::collections::HashSet;

use crate::history::{MetricId, MetricKind, SampleHistory};
use crate::ring_buffer::RingBuffer;

/// Position in raw-sample index space, threaded through consecutive sampling calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct SampleCursor(pub f64);

/// Values and timestamps of one metric, aligned so index 0 is the oldest
/// sample present in both buffers.
#[derive(Clone, Copy)]
pub struct SampleWindow<'a> {
    values: &'a RingBuffer<f32>,
    timestamps: &'a RingBuffer<f64>,
    value_offset: usize,
    time_offset: usize,
    len: usize,
}

impl<'a> SampleWindow<'a> {
    pub fn new(values: &'a RingBuffer<f32>, timestamps: &'a RingBuffer<f64>) -> Self {
        let len = values.len().min(timestamps.len());
        Self {
            values,
            timestamps,
            value_offset: values.len() - len,
            time_offset: timestamps.len() - len,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn value(&self, i: usize) -> f64 {
        self.values[self.value_offset + i] as f64
    }

    fn timestamp(&self, i: usize) -> f64 {
        self.timestamps[self.time_offset + i]
    }

    /// Time at which sample `k` starts, i.e. the end of sample `k - 1`.
    /// The start of the first sample is extrapolated from the first interval.
    fn boundary_time(&self, k: usize) -> f64 {
        if k > 0 {
            return self.timestamp(k - 1);
        }
        let first = self.timestamp(0);
        if self.len >= 2 {
            first - (self.timestamp(1) - first)
        } else {
            first - 1.0
        }
    }

    /// Wall-clock time at a fractional position in sample index space.
    fn time_at(&self, position: f64) -> f64 {
        let k = position.floor() as usize;
        let frac = position - k as f64;
        let start = self.boundary_time(k);
        if frac <= 0.0 || k >= self.len {
            return start;
        }
        start + (self.boundary_time(k + 1) - start) * frac
    }

    /// Overlap-weighted sum of values over `[a, b)`.
    fn weighted_sum(&self, a: f64, b: f64) -> f64 {
        let first = a.floor() as usize;
        let last = b.floor() as usize;

        // A span starting on a whole index gives the first sample full weight
        // and the sample at `last` zero weight.
        let mut sum = self.value(first) * (((first + 1) as f64).min(b) - a);
        if last > first {
            for i in first + 1..last {
                sum += self.value(i);
            }
            if last < self.len {
                sum += self.value(last) * (b - last as f64);
            }
        }
        sum
    }

    fn clamp_span(&self, cursor: SampleCursor, samples_per_point: f64) -> (f64, f64) {
        let count = self.len as f64;
        let a = cursor.0.clamp(0.0, count);
        let b = (cursor.0 + samples_per_point).clamp(0.0, count);
        (a, b)
    }
}

/// Time-weighted average of a gauge over the next span.
///
/// Returns the value and the cursor for the next point. An empty span yields
/// 0.0 and leaves the cursor unchanged.
pub fn sample_gauge(window: &SampleWindow<'_>, cursor: SampleCursor, samples_per_point: f64) -> (f32, SampleCursor) {
    let (a, b) = window.clamp_span(cursor, samples_per_point);
    if b <= a {
        return (0.0, cursor);
    }
    let value = window.weighted_sum(a, b) / (b - a);
    (value as f32, SampleCursor(b))
}

/// Rate of a counter over the next span: overlap-weighted accumulation divided
/// by the elapsed wall-clock time of the span.
///
/// Falls back to dividing by the span width when the span has no duration.
pub fn sample_counter(window: &SampleWindow<'_>, cursor: SampleCursor, samples_per_point: f64) -> (f32, SampleCursor) {
    let (a, b) = window.clamp_span(cursor, samples_per_point);
    if b <= a {
        return (0.0, cursor);
    }
    let sum = window.weighted_sum(a, b);
    let elapsed = window.time_at(b) - window.time_at(a);
    let value = if elapsed > 0.0 { sum / elapsed } else { sum / (b - a) };
    (value as f32, SampleCursor(b))
}

/// Per-metric graph points, one ring buffer of `point_count` values per tracked
/// metric. Buffer lengths always equal the point count.
#[derive(Default)]
pub struct DataSampler {
    points: Vec<RingBuffer<f32>>,
    point_count: usize,
    warned_missing: HashSet<MetricId>,
}

impl DataSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stat_count(&self) -> usize {
        self.points.len()
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Values of metric `stat`, oldest point first.
    pub fn points(&self, stat: usize) -> &RingBuffer<f32> {
        &self.points[stat]
    }

    /// Value of metric `stat` at point `p` (0 = leftmost).
    pub fn value(&self, stat: usize, p: usize) -> f32 {
        self.points[stat][p]
    }

    /// Match the stat and point counts, keeping the most recent points of
    /// surviving metrics. New slots are zero.
    pub fn resize(&mut self, stat_count: usize, point_count: usize) {
        if stat_count == self.points.len() && point_count == self.point_count {
            return;
        }
        log::debug!(
            "Resizing sampler: {} stats x {} points -> {} stats x {} points",
            self.points.len(),
            self.point_count,
            stat_count,
            point_count
        );
        self.points.truncate(stat_count);
        for buffer in self.points.iter_mut() {
            buffer.set_capacity(point_count);
            buffer.pad_front(0.0);
        }
        while self.points.len() < stat_count {
            let mut buffer = RingBuffer::new(point_count);
            buffer.reset_filled(point_count, 0.0);
            self.points.push(buffer);
        }
        self.point_count = point_count;
    }

    /// Push `points_to_advance` new points for every metric.
    ///
    /// The new points span the raw samples ending `unconsumed` samples before
    /// the newest one, so they line up with what the synchronizer committed.
    pub fn fill<H: SampleHistory + ?Sized>(
        &mut self,
        history: &H,
        metrics: &[MetricId],
        points_to_advance: usize,
        samples_per_point: f64,
        unconsumed: f64,
    ) {
        if points_to_advance == 0 || self.point_count == 0 {
            return;
        }
        // Points older than the window would be evicted straight away.
        let skipped = points_to_advance.saturating_sub(self.point_count);
        let produced = points_to_advance - skipped;

        let timestamps = history.timestamps();
        for (stat, &metric) in metrics.iter().enumerate().take(self.points.len()) {
            let buffer = &mut self.points[stat];
            let Some(values) = history.values(metric) else {
                if self.warned_missing.insert(metric) {
                    log::warn!("No history for {} - plotting zeros", metric);
                }
                for _ in 0..produced {
                    buffer.push_back(0.0);
                }
                continue;
            };

            let window = SampleWindow::new(values, timestamps);
            let start = window.len() as f64 - unconsumed - points_to_advance as f64 * samples_per_point;
            let mut cursor = SampleCursor(start + skipped as f64 * samples_per_point);
            let kind = history.kind(metric);
            for _ in 0..produced {
                let (value, next) = match kind {
                    MetricKind::Gauge => sample_gauge(&window, cursor, samples_per_point),
                    MetricKind::Counter => sample_counter(&window, cursor, samples_per_point),
                };
                // Spans entirely before the oldest retained sample leave the cursor in place.
                cursor = if next == cursor {
                    SampleCursor(cursor.0 + samples_per_point)
                } else {
                    next
                };
                buffer.push_back(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::StatHistory;

    fn buffers(values: &[f32], times: &[f64]) -> (RingBuffer<f32>, RingBuffer<f64>) {
        let mut v = RingBuffer::new(values.len());
        let mut t = RingBuffer::new(times.len());
        for &x in values {
            v.push_back(x);
        }
        for &x in times {
            t.push_back(x);
        }
        (v, t)
    }

    fn sample_all(
        window: &SampleWindow<'_>,
        samples_per_point: f64,
        f: fn(&SampleWindow<'_>, SampleCursor, f64) -> (f32, SampleCursor),
    ) -> Vec<f32> {
        let mut cursor = SampleCursor(0.0);
        let mut out = Vec::new();
        loop {
            let (value, next) = f(window, cursor, samples_per_point);
            if next == cursor {
                break;
            }
            out.push(value);
            cursor = next;
        }
        out
    }

    #[test]
    fn test_gauge_unit_stride_reproduces_input() {
        let (v, t) = buffers(&[4.0, 5.0, 7.0, 9.0], &[1.0, 2.0, 3.0, 4.0]);
        let window = SampleWindow::new(&v, &t);
        assert_eq!(sample_all(&window, 1.0, sample_gauge), vec![4.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_gauge_stride_two_averages_pairs() {
        let (v, t) = buffers(&[4.0, 5.0, 7.0, 9.0], &[1.0, 2.0, 3.0, 4.0]);
        let window = SampleWindow::new(&v, &t);
        assert_eq!(sample_all(&window, 2.0, sample_gauge), vec![4.5, 8.0]);
    }

    #[test]
    fn test_gauge_fractional_stride() {
        let (v, t) = buffers(&[4.0, 8.0], &[1.0, 2.0]);
        let window = SampleWindow::new(&v, &t);
        // [0, 1.5): 4 * 1 + 8 * 0.5 = 8 over 1.5; [1.5, 2): 8.
        let out = sample_all(&window, 1.5, sample_gauge);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 8.0 / 1.5).abs() < 1e-5);
        assert!((out[1] - 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_gauge_oversampling_repeats_values() {
        let (v, t) = buffers(&[4.0, 8.0], &[1.0, 2.0]);
        let window = SampleWindow::new(&v, &t);
        assert_eq!(sample_all(&window, 0.5, sample_gauge), vec![4.0, 4.0, 8.0, 8.0]);
    }

    #[test]
    fn test_counter_even_spacing_matches_gauge() {
        let (v, t) = buffers(&[4.0, 5.0, 7.0, 9.0], &[1.0, 2.0, 3.0, 4.0]);
        let window = SampleWindow::new(&v, &t);
        assert_eq!(sample_all(&window, 1.0, sample_counter), vec![4.0, 5.0, 7.0, 9.0]);
        assert_eq!(sample_all(&window, 2.0, sample_counter), vec![4.5, 8.0]);
    }

    #[test]
    fn test_counter_uneven_spacing_changes_divisor_only() {
        // Sample intervals: 0.5 (extrapolated), 0.5, 2.0, 0.5.
        let (v, t) = buffers(&[4.0, 5.0, 7.0, 9.0], &[1.0, 1.5, 3.5, 4.0]);
        let window = SampleWindow::new(&v, &t);
        let out = sample_all(&window, 1.0, sample_counter);
        assert_eq!(out, vec![8.0, 10.0, 3.5, 18.0]);
    }

    #[test]
    fn test_counter_oversampling_splits_rate() {
        let (v, t) = buffers(&[6.0], &[10.0]);
        let window = SampleWindow::new(&v, &t);
        // Single sample, extrapolated one second long, spread over two points.
        assert_eq!(sample_all(&window, 0.5, sample_counter), vec![6.0, 6.0]);
    }

    #[test]
    fn test_span_clamped_to_history() {
        let (v, t) = buffers(&[2.0, 4.0], &[1.0, 2.0]);
        let window = SampleWindow::new(&v, &t);
        let (value, cursor) = sample_gauge(&window, SampleCursor(-1.0), 2.0);
        assert_eq!(value, 2.0);
        assert_eq!(cursor, SampleCursor(1.0));

        let (value, cursor) = sample_gauge(&window, SampleCursor(2.0), 1.0);
        assert_eq!(value, 0.0);
        assert_eq!(cursor, SampleCursor(2.0));
    }

    #[test]
    fn test_fill_pushes_newest_points() {
        let metric = MetricId(7);
        let mut history = StatHistory::new(16);
        history.register(metric, MetricKind::Gauge);
        for (i, v) in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0].into_iter().enumerate() {
            history.record(i as f64, &[(metric, v)]);
        }

        let mut sampler = DataSampler::new();
        sampler.resize(1, 4);
        sampler.fill(&history, &[metric], 2, 2.0, 0.0);
        let points: Vec<f32> = sampler.points(0).iter().copied().collect();
        assert_eq!(points, vec![0.0, 0.0, 3.5, 5.5]);

        // One sample left unread shifts the span back by one.
        sampler.fill(&history, &[metric], 1, 2.0, 1.0);
        assert_eq!(*sampler.points(0).from_back(1), 4.5);
    }

    #[test]
    fn test_fill_skips_points_beyond_window() {
        let metric = MetricId(1);
        let mut history = StatHistory::new(16);
        history.register(metric, MetricKind::Gauge);
        for i in 0..10 {
            history.record(i as f64, &[(metric, i as f32)]);
        }
        let mut sampler = DataSampler::new();
        sampler.resize(1, 3);
        sampler.fill(&history, &[metric], 10, 1.0, 0.0);
        let points: Vec<f32> = sampler.points(0).iter().copied().collect();
        assert_eq!(points, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_fill_missing_metric_plots_zero() {
        let history = StatHistory::new(4);
        let mut sampler = DataSampler::new();
        sampler.resize(1, 2);
        sampler.fill(&history, &[MetricId(3)], 1, 1.0, 0.0);
        assert_eq!(sampler.points(0).len(), 2);
        assert_eq!(*sampler.points(0).from_back(1), 0.0);
    }

    #[test]
    fn test_resize_keeps_recent_points() {
        let mut sampler = DataSampler::new();
        sampler.resize(1, 4);
        let metric = MetricId(1);
        let mut history = StatHistory::new(8);
        history.register(metric, MetricKind::Gauge);
        for i in 0..4 {
            history.record(i as f64, &[(metric, (i + 1) as f32)]);
        }
        sampler.fill(&history, &[metric], 4, 1.0, 0.0);
        sampler.resize(2, 2);
        assert_eq!(sampler.points(0).iter().copied().collect::<Vec<_>>(), vec![3.0, 4.0]);
        assert_eq!(sampler.points(1).iter().copied().collect::<Vec<_>>(), vec![0.0, 0.0]);
        sampler.resize(2, 3);
        assert_eq!(sampler.points(0).iter().copied().collect::<Vec<_>>(), vec![0.0, 3.0, 4.0]);
    }
}
