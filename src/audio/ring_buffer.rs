//! Rolling window of recent samples for partial inference
//! Holds the last 6 seconds of 16 kHz audio, overwritten FIFO when full

use log::debug;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Thread-safe fixed-capacity ring of i16 samples.
///
/// One producer (the capture callback) appends; the partial scheduler takes
/// snapshots. All access goes through the internal lock so a snapshot is
/// atomic with respect to appends.
pub struct RingBuffer {
    inner: Mutex<VecDeque<i16>>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append samples, dropping the oldest when the window is full.
    pub fn append(&self, samples: &[i16]) {
        let mut buf = self.inner.lock().unwrap();

        // A block larger than the whole window only keeps its tail
        if samples.len() >= self.capacity {
            debug!(
                "Ring buffer received oversized block ({} samples), keeping last {}",
                samples.len(),
                self.capacity
            );
            buf.clear();
            buf.extend(&samples[samples.len() - self.capacity..]);
            return;
        }

        let overflow = (buf.len() + samples.len()).saturating_sub(self.capacity);
        buf.drain(..overflow);
        buf.extend(samples);
    }

    /// Contiguous copy of the most recent `min(count, max_samples)` samples
    /// in chronological order.
    pub fn snapshot(&self, max_samples: usize) -> Vec<i16> {
        let buf = self.inner.lock().unwrap();
        let n = buf.len().min(max_samples);
        buf.iter().skip(buf.len() - n).copied().collect()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_append_and_snapshot_order() {
        let ring = RingBuffer::new(8);
        ring.append(&[1, 2, 3]);
        ring.append(&[4, 5]);
        assert_eq!(ring.count(), 5);
        assert_eq!(ring.snapshot(100), vec![1, 2, 3, 4, 5]);
        assert_eq!(ring.snapshot(2), vec![4, 5]);
    }

    #[test]
    fn test_wraps_fifo_at_capacity() {
        let ring = RingBuffer::new(4);
        ring.append(&[1, 2, 3, 4]);
        ring.append(&[5, 6]);
        assert_eq!(ring.count(), 4);
        assert_eq!(ring.snapshot(100), vec![3, 4, 5, 6]);

        // Once full, the count stays pinned at capacity
        ring.append(&[7]);
        assert_eq!(ring.count(), 4);
        assert_eq!(ring.snapshot(100), vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_oversized_block_keeps_tail() {
        let ring = RingBuffer::new(3);
        ring.append(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(ring.snapshot(100), vec![5, 6, 7]);
    }

    #[test]
    fn test_clear_resets_count() {
        let ring = RingBuffer::new(4);
        ring.append(&[1, 2, 3, 4]);
        ring.clear();
        assert_eq!(ring.count(), 0);
        assert!(ring.snapshot(100).is_empty());
    }

    #[test]
    fn test_concurrent_snapshot_is_a_suffix() {
        let ring = Arc::new(RingBuffer::new(1000));
        let writer = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                for i in 0..5000i16 {
                    ring.append(&[i]);
                }
            })
        };

        for _ in 0..200 {
            let snap = ring.snapshot(64);
            // Samples are appended in increasing order, so any atomic
            // snapshot must be strictly consecutive
            for pair in snap.windows(2) {
                assert_eq!(pair[1], pair[0] + 1);
            }
        }
        writer.join().unwrap();

        assert_eq!(ring.count(), 1000);
        let snap = ring.snapshot(1000);
        assert_eq!(snap.first().copied(), Some(4000));
        assert_eq!(snap.last().copied(), Some(4999));
    }
}
