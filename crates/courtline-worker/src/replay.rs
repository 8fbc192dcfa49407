//! Bounded per-stream frame history for replay clips.

use std::collections::VecDeque;

/// Ring buffer that evicts its oldest entry when full.
#[derive(Debug, Clone)]
pub struct ReplayBuffer<T> {
    frames: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> ReplayBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, frame: T) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The last `floor(duration * fps)` frames, oldest first.
    ///
    /// Over-long requests return everything buffered. `None` when the
    /// buffer is empty.
    pub fn extract_tail(&self, duration_secs: f64, fps: u32) -> Option<Vec<T>> {
        if self.frames.is_empty() {
            return None;
        }

        let wanted = (duration_secs * fps as f64).floor();
        let count = if wanted.is_finite() && wanted > 0.0 {
            (wanted as usize).min(self.frames.len())
        } else {
            0
        };

        let skip = self.frames.len() - count;
        Some(self.frames.iter().skip(skip).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut buffer = ReplayBuffer::new(3);
        for i in 0..5 {
            buffer.push(i);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.extract_tail(100.0, 1), Some(vec![2, 3, 4]));
    }

    #[test]
    fn test_tail_is_chronological() {
        let mut buffer = ReplayBuffer::new(100);
        for i in 0..40 {
            buffer.push(i);
        }
        let tail = buffer.extract_tail(0.5, 10).unwrap();
        assert_eq!(tail, vec![35, 36, 37, 38, 39]);
    }

    #[test]
    fn test_over_long_request_returns_all() {
        let mut buffer = ReplayBuffer::new(100);
        for i in 0..40 {
            buffer.push(i);
        }
        assert_eq!(buffer.extract_tail(5.0, 10).unwrap().len(), 40);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer: ReplayBuffer<u8> = ReplayBuffer::new(10);
        assert!(buffer.extract_tail(5.0, 30).is_none());
    }

    #[test]
    fn test_fractional_count_floors() {
        let mut buffer = ReplayBuffer::new(10);
        for i in 0..10 {
            buffer.push(i);
        }
        assert_eq!(buffer.extract_tail(0.25, 10).unwrap(), vec![8, 9]);
    }
}
