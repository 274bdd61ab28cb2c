//! Converts raw-sample arrivals into a number of graph points to scroll by.
//!
//! Raw samples arrive unevenly per frame while each graph point represents a
//! possibly fractional number of samples. The synchronizer remembers the last
//! raw sample it consumed and the unused fraction of that sample, so every raw
//! sample is accounted for exactly once across frames.

use crate::ring_buffer::RingBuffer;

/// Tolerance used to snap accumulated floating-point error onto whole samples.
const SNAP_EPSILON: f64 = 1e-6;

#[derive(Clone, Debug, Default)]
pub struct SampleSynchronizer {
    /// Timestamp of the newest raw sample that has been (at least partly) consumed.
    last_consumed: Option<f64>,
    /// Unused fraction of the last consumed sample, always in `[0, 1)`.
    remainder: f64,
    /// Samples still unread after the last committed advance.
    unconsumed: f64,
}

impl SampleSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn remainder(&self) -> f64 {
        self.remainder
    }

    pub fn last_consumed(&self) -> Option<f64> {
        self.last_consumed
    }

    /// Raw samples (possibly fractional) at the newest end of the history that
    /// were left unread by the last call that advanced.
    pub fn unconsumed(&self) -> f64 {
        self.unconsumed
    }

    /// Number of whole raw samples newer than the last consumed one.
    pub fn count_unread(&self, timestamps: &RingBuffer<f64>) -> usize {
        match self.last_consumed {
            None => timestamps.len(),
            Some(last) => timestamps
                .iter()
                .rev()
                .take_while(|&&t| t > last)
                .count(),
        }
    }

    /// Work out how many graph points the newly arrived samples fill.
    ///
    /// State is only committed when at least one point is advanced.
    pub fn compute_points_to_advance(
        &mut self,
        timestamps: &RingBuffer<f64>,
        samples_per_point: f64,
    ) -> usize {
        if !(samples_per_point > 0.0) {
            return 0;
        }
        let unread_whole = self.count_unread(timestamps);
        let unread = unread_whole as f64 + self.remainder;

        let points = ((unread / samples_per_point) + SNAP_EPSILON).floor();
        if points <= 0.0 {
            self.unconsumed = unread;
            return 0;
        }

        let samples_read = points * samples_per_point;
        let leftover = (unread - samples_read).max(0.0);

        // Whole samples touched by this read, counted from the oldest unread one.
        let consumed = ((samples_read - self.remainder) - SNAP_EPSILON).ceil().max(0.0) as usize;
        let consumed = consumed.min(unread_whole);
        if consumed > 0 {
            let back_index = unread_whole - consumed + 1;
            self.last_consumed = timestamps.get_from_back(back_index).copied();
        }

        let mut remainder = leftover.fract();
        if remainder < SNAP_EPSILON || remainder > 1.0 - SNAP_EPSILON {
            remainder = 0.0;
        }
        self.remainder = remainder;
        self.unconsumed = leftover;

        points as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `per_frame` sample counts through a timestamp buffer of `capacity`.
    fn run_schedule(per_frame: &[usize], capacity: usize, samples_per_point: f64) -> (Vec<usize>, SampleSynchronizer) {
        let mut timestamps = RingBuffer::new(capacity);
        let mut sync = SampleSynchronizer::new();
        let mut tick = 0u32;
        let mut advances = Vec::new();
        for &count in per_frame {
            for _ in 0..count {
                tick += 1;
                timestamps.push_back(tick as f64 / 60.0);
            }
            advances.push(sync.compute_points_to_advance(&timestamps, samples_per_point));
        }
        (advances, sync)
    }

    const SCHEDULE: [usize; 9] = [1, 0, 2, 0, 1, 5, 0, 3, 7];

    #[test]
    fn test_single_slot_history_sees_one_sample_per_frame() {
        let (advances, _) = run_schedule(&SCHEDULE, 1, 1.0);
        assert_eq!(advances, vec![1, 0, 1, 0, 1, 1, 0, 1, 1]);
    }

    #[test]
    fn test_capacity_limits_visible_samples() {
        let (advances, _) = run_schedule(&SCHEDULE, 3, 1.0);
        assert_eq!(advances, vec![1, 0, 2, 0, 1, 3, 0, 3, 3]);

        let (advances, _) = run_schedule(&SCHEDULE, 8, 1.0);
        assert_eq!(advances, SCHEDULE.to_vec());
    }

    #[test]
    fn test_fractional_ratio_carries_remainder() {
        let (advances, sync) = run_schedule(&[1, 1, 1, 1], 16, 1.5);
        assert_eq!(advances, vec![0, 1, 1, 0]);
        assert!(sync.remainder().abs() < 1e-9);

        let (advances, sync) = run_schedule(&[1, 1, 1], 16, 0.4);
        // 2.5 points per sample: 2, then 3 (0.2 carried), then 2.
        assert_eq!(advances, vec![2, 3, 2]);
        assert!(sync.remainder() >= 0.0 && sync.remainder() < 1.0);
    }

    #[test]
    fn test_never_reads_more_than_emitted() {
        let ratios = [0.3, 0.75, 1.0, 1.7, 2.0, 3.25];
        let schedule = [3, 0, 1, 7, 2, 0, 0, 5, 1, 1, 9, 4];
        for &ratio in &ratios {
            let mut timestamps = RingBuffer::new(64);
            let mut sync = SampleSynchronizer::new();
            let mut emitted = 0usize;
            let mut read = 0.0f64;
            let mut tick = 0;
            for &count in &schedule {
                for _ in 0..count {
                    tick += 1;
                    timestamps.push_back(tick as f64);
                }
                emitted += count;
                read += sync.compute_points_to_advance(&timestamps, ratio) as f64 * ratio;
                assert!(read <= emitted as f64 + 1e-6, "ratio {}: read {} > emitted {}", ratio, read, emitted);
                assert!(sync.remainder() >= 0.0 && sync.remainder() < 1.0);
                assert!(sync.unconsumed() < ratio + 1e-6);
            }
            assert!(emitted as f64 - read < ratio + 1e-6, "ratio {}: {} unread", ratio, emitted as f64 - read);
        }
    }

    #[test]
    fn test_no_new_samples_does_not_mutate() {
        let mut timestamps = RingBuffer::new(8);
        let mut sync = SampleSynchronizer::new();
        timestamps.push_back(1.0);
        assert_eq!(sync.compute_points_to_advance(&timestamps, 2.0), 0);
        assert_eq!(sync.last_consumed(), None);
        timestamps.push_back(2.0);
        assert_eq!(sync.compute_points_to_advance(&timestamps, 2.0), 1);
        assert_eq!(sync.last_consumed(), Some(2.0));
        assert_eq!(sync.compute_points_to_advance(&timestamps, 2.0), 0);
        assert_eq!(sync.last_consumed(), Some(2.0));
    }
}
