//! Fixed-capacity circular buffer used as the storage primitive of the graph pipeline.
//!
//! Elements are addressed either from the front (`buf[0]` is the oldest) or from
//! the back (`buf.from_back(1)` is the newest). Once the buffer is full every push
//! evicts the oldest element, so steady-state use never allocates.

use std::ops::{Index, IndexMut};

#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    /// Physical index of the oldest element.
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a value, evicting the oldest one when the buffer is full.
    /// Returns the evicted value, if any.
    pub fn push_back(&mut self, value: T) -> Option<T> {
        if self.capacity == 0 {
            return None;
        }
        if self.data.len() < self.capacity {
            // The buffer only wraps once it is full, so `head` is still 0 here.
            self.data.push(value);
            None
        } else {
            let evicted = std::mem::replace(&mut self.data[self.head], value);
            self.head = (self.head + 1) % self.capacity;
            Some(evicted)
        }
    }

    /// Change the capacity, keeping the `min(len, new_capacity)` most recent
    /// elements. Older elements are shifted out first.
    pub fn set_capacity(&mut self, new_capacity: usize) {
        if new_capacity == self.capacity {
            return;
        }
        self.data.rotate_left(self.head);
        self.head = 0;
        let len = self.data.len();
        if len > new_capacity {
            self.data.drain(..len - new_capacity);
        }
        if new_capacity > self.data.capacity() {
            self.data.reserve_exact(new_capacity - self.data.len());
        } else {
            self.data.shrink_to(new_capacity);
        }
        self.capacity = new_capacity;
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
    }

    /// Forward access, 0 is the oldest element.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.data.len() {
            Some(&self.data[self.physical(index)])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.data.len() {
            let i = self.physical(index);
            Some(&mut self.data[i])
        } else {
            None
        }
    }

    /// Backward access, 1 is the newest element.
    pub fn get_from_back(&self, index: usize) -> Option<&T> {
        if index == 0 || index > self.data.len() {
            return None;
        }
        self.get(self.data.len() - index)
    }

    /// Backward access, 1 is the newest element.
    ///
    /// # Panics
    /// Panics if `index` is not in `1..=len`.
    pub fn from_back(&self, index: usize) -> &T {
        match self.get_from_back(index) {
            Some(v) => v,
            None => panic!(
                "ring buffer backward index {} out of range for length {}",
                index,
                self.data.len()
            ),
        }
    }

    pub fn newest(&self) -> Option<&T> {
        self.get_from_back(1)
    }

    pub fn oldest(&self) -> Option<&T> {
        self.get(0)
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (back, front) = self.data.split_at(self.head);
        front.iter().chain(back.iter())
    }

    fn physical(&self, index: usize) -> usize {
        let i = self.head + index;
        if i >= self.data.len() {
            i - self.data.len()
        } else {
            i
        }
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Resize to `capacity` and fill every slot with `value`.
    pub fn reset_filled(&mut self, capacity: usize, value: T) {
        self.clear();
        self.set_capacity(capacity);
        self.data.resize(capacity, value);
    }

    /// Push `value` at the front until the buffer is full, keeping existing
    /// elements as the most recent ones.
    pub fn pad_front(&mut self, value: T) {
        let missing = self.capacity - self.data.len();
        if missing == 0 {
            return;
        }
        self.data.rotate_left(self.head);
        self.head = 0;
        self.data.splice(0..0, std::iter::repeat(value).take(missing));
    }
}

impl<T: Copy + Into<f64>> RingBuffer<T> {
    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&v| v.into()).sum()
    }

    /// Mean of all elements; NaN when empty.
    pub fn average(&self) -> f64 {
        if self.data.is_empty() {
            return f64::NAN;
        }
        self.sum() / self.data.len() as f64
    }
}

impl<T: Copy + PartialOrd> RingBuffer<T> {
    pub fn max(&self) -> Option<T> {
        self.data
            .iter()
            .copied()
            .fold(None, |acc, v| match acc {
                Some(m) if m >= v => Some(m),
                _ => Some(v),
            })
    }

    pub fn min(&self) -> Option<T> {
        self.data
            .iter()
            .copied()
            .fold(None, |acc, v| match acc {
                Some(m) if m <= v => Some(m),
                _ => Some(v),
            })
    }
}

impl<T> Index<usize> for RingBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(v) => v,
            None => panic!(
                "ring buffer index {} out of range for length {}",
                index,
                self.data.len()
            ),
        }
    }
}

impl<T> IndexMut<usize> for RingBuffer<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.data.len();
        match self.get_mut(index) {
            Some(v) => v,
            None => panic!("ring buffer index {} out of range for length {}", index, len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(buf: &RingBuffer<i32>) -> Vec<i32> {
        buf.iter().copied().collect()
    }

    #[test]
    fn test_push_within_capacity() {
        let mut buf = RingBuffer::new(3);
        assert!(buf.is_empty());
        assert_eq!(buf.push_back(1), None);
        assert_eq!(buf.push_back(2), None);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf[0], 1);
        assert_eq!(*buf.from_back(1), 2);
    }

    #[test]
    fn test_push_past_capacity_keeps_last_pushes() {
        for extra in 0..10 {
            let mut buf = RingBuffer::new(4);
            let total = 4 + extra;
            for i in 0..total {
                buf.push_back(i);
            }
            assert_eq!(buf.len(), 4);
            assert_eq!(buf[0], total - 4);
            assert_eq!(*buf.from_back(1), total - 1);
            assert_eq!(buf.oldest(), Some(&(total - 4)));
            assert_eq!(buf.newest(), Some(&(total - 1)));
            assert_eq!(contents(&buf), (total - 4..total).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_push_returns_evicted() {
        let mut buf = RingBuffer::new(2);
        buf.push_back(10);
        buf.push_back(20);
        assert_eq!(buf.push_back(30), Some(10));
        assert_eq!(buf.push_back(40), Some(20));
    }

    #[test]
    fn test_zero_capacity_discards() {
        let mut buf = RingBuffer::new(0);
        assert_eq!(buf.push_back(1), None);
        assert!(buf.is_empty());
        assert!(buf.get(0).is_none());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_forward_index_out_of_range() {
        let mut buf = RingBuffer::new(3);
        buf.push_back(1);
        let _ = buf[1];
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_backward_index_zero_is_out_of_range() {
        let mut buf = RingBuffer::new(3);
        buf.push_back(1);
        let _ = buf.from_back(0);
    }

    #[test]
    fn test_checked_access() {
        let mut buf = RingBuffer::new(2);
        buf.push_back(5);
        assert_eq!(buf.get(0), Some(&5));
        assert_eq!(buf.get(1), None);
        assert_eq!(buf.get_from_back(1), Some(&5));
        assert_eq!(buf.get_from_back(2), None);
    }

    #[test]
    fn test_shrink_keeps_most_recent() {
        let mut buf = RingBuffer::new(5);
        for i in 1..=7 {
            buf.push_back(i);
        }
        assert_eq!(contents(&buf), vec![3, 4, 5, 6, 7]);
        buf.set_capacity(3);
        assert_eq!(buf.capacity(), 3);
        assert_eq!(contents(&buf), vec![5, 6, 7]);
        buf.push_back(8);
        assert_eq!(contents(&buf), vec![6, 7, 8]);
    }

    #[test]
    fn test_grow_keeps_everything() {
        let mut buf = RingBuffer::new(3);
        for i in 1..=5 {
            buf.push_back(i);
        }
        buf.set_capacity(5);
        assert_eq!(contents(&buf), vec![3, 4, 5]);
        buf.push_back(6);
        buf.push_back(7);
        assert_eq!(contents(&buf), vec![3, 4, 5, 6, 7]);
        buf.push_back(8);
        assert_eq!(contents(&buf), vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_shrink_partially_filled() {
        let mut buf = RingBuffer::new(6);
        buf.push_back(1);
        buf.push_back(2);
        buf.set_capacity(4);
        assert_eq!(contents(&buf), vec![1, 2]);
        buf.set_capacity(1);
        assert_eq!(contents(&buf), vec![2]);
    }

    #[test]
    fn test_pad_front() {
        let mut buf = RingBuffer::new(4);
        buf.push_back(7);
        buf.push_back(8);
        buf.pad_front(0);
        assert_eq!(contents(&buf), vec![0, 0, 7, 8]);
    }

    #[test]
    fn test_reductions() {
        let mut buf: RingBuffer<f32> = RingBuffer::new(3);
        assert!(buf.average().is_nan());
        assert_eq!(buf.max(), None);
        for v in [1.0, 4.0, 2.0, 3.0] {
            buf.push_back(v);
        }
        assert!((buf.sum() - 9.0).abs() < 1e-9);
        assert!((buf.average() - 3.0).abs() < 1e-9);
        assert_eq!(buf.max(), Some(4.0));
        assert_eq!(buf.min(), Some(2.0));
    }
}
