//! Bounded sample store with a monotonic global write index.
//!
//! The acquisition side calls [`SampleRingBuffer::write`] with small frames;
//! the streaming side polls [`SampleRingBuffer::read_since`] with the index it
//! last saw. Samples older than the capacity are dropped silently, so readers
//! must poll at least once per retention window.

use std::sync::Mutex;

struct Inner {
    samples: Vec<f32>,
    /// Next write position in `samples`.
    head: usize,
    /// Number of valid samples (saturates at capacity).
    len: usize,
    total_written: u64,
}

/// Circular store of the most recent `capacity` audio samples.
pub struct SampleRingBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl SampleRingBuffer {
    /// Create a buffer holding at most `capacity` samples.
    ///
    /// A zero capacity is bumped to one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                samples: vec![0.0; capacity],
                head: 0,
                len: 0,
                total_written: 0,
            }),
        }
    }

    /// Create a buffer sized for `seconds` of audio at `sample_rate`.
    pub fn with_duration(sample_rate: u32, seconds: u32) -> Self {
        Self::new(sample_rate as usize * seconds as usize)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(s) => s,
            Err(p) => p.into_inner(),
        }
    }

    /// Maximum number of retained samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a frame, overwriting the oldest samples once full.
    pub fn write(&self, frame: &[f32]) {
        if frame.is_empty() {
            return;
        }
        let mut state = self.lock();
        state.total_written += frame.len() as u64;

        // Only the tail of an oversized frame can survive.
        let frame = if frame.len() > self.capacity {
            &frame[frame.len() - self.capacity..]
        } else {
            frame
        };

        let head = state.head;
        let first = (self.capacity - head).min(frame.len());
        state.samples[head..head + first].copy_from_slice(&frame[..first]);
        let rest = frame.len() - first;
        if rest > 0 {
            state.samples[..rest].copy_from_slice(&frame[first..]);
        }
        state.head = (head + frame.len()) % self.capacity;
        state.len = (state.len + frame.len()).min(self.capacity);
    }

    /// Everything written after global index `last`, plus the new index.
    ///
    /// Returns an empty vector when nothing new exists or when `last` lies
    /// beyond the current counter (the buffer was cleared). Samples older than
    /// the retention window are truncated.
    pub fn read_since(&self, last: u64) -> (Vec<f32>, u64) {
        let state = self.lock();
        let total = state.total_written;
        let available = total.saturating_sub(last);
        if available == 0 {
            return (Vec::new(), total);
        }

        let count = (available.min(state.len as u64)) as usize;
        let start = (state.head + self.capacity - count) % self.capacity;
        let mut out = Vec::with_capacity(count);
        let first = (self.capacity - start).min(count);
        out.extend_from_slice(&state.samples[start..start + first]);
        if count > first {
            out.extend_from_slice(&state.samples[..count - first]);
        }
        (out, total)
    }

    /// Global number of samples written since creation or the last clear.
    pub fn total_written(&self) -> u64 {
        self.lock().total_written
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.lock().len
    }

    /// Whether no samples are retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all samples and reset the global counter to zero.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.head = 0;
        state.len = 0;
        state.total_written = 0;
    }
}

impl std::fmt::Debug for SampleRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SampleRingBuffer")
            .field("capacity", &self.capacity)
            .field("len", &state.len)
            .field("total_written", &state.total_written)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ramp(from: usize, to: usize) -> Vec<f32> {
        (from..to).map(|i| i as f32).collect()
    }

    #[test]
    fn overwrite_keeps_last_capacity_samples() {
        let ring = SampleRingBuffer::new(8);
        // 13 samples in uneven chunks.
        ring.write(&ramp(0, 3));
        ring.write(&ramp(3, 10));
        ring.write(&ramp(10, 13));

        let (samples, index) = ring.read_since(0);
        assert_eq!(index, 13);
        assert_eq!(samples, ramp(5, 13));
    }

    #[test]
    fn read_since_returns_only_new_samples() {
        let ring = SampleRingBuffer::new(16);
        ring.write(&ramp(0, 4));
        let (first, idx) = ring.read_since(0);
        assert_eq!(first, ramp(0, 4));

        ring.write(&ramp(4, 7));
        let (second, idx2) = ring.read_since(idx);
        assert_eq!(second, ramp(4, 7));
        assert_eq!(idx2, 7);
    }

    #[test]
    fn freshness_without_new_writes() {
        let ring = SampleRingBuffer::new(4);
        ring.write(&[0.1, 0.2]);
        let (_, idx) = ring.read_since(0);
        let (again, idx2) = ring.read_since(idx);
        assert!(again.is_empty());
        assert_eq!(idx2, idx);
    }

    #[test]
    fn frame_larger_than_capacity_keeps_tail() {
        let ring = SampleRingBuffer::new(4);
        ring.write(&ramp(0, 10));
        let (samples, idx) = ring.read_since(0);
        assert_eq!(idx, 10);
        assert_eq!(samples, ramp(6, 10));
    }

    #[test]
    fn stale_reader_is_truncated() {
        let ring = SampleRingBuffer::new(4);
        ring.write(&ramp(0, 2));
        let (_, idx) = ring.read_since(0);
        ring.write(&ramp(2, 12));
        let (samples, idx2) = ring.read_since(idx);
        assert_eq!(idx2, 12);
        assert_eq!(samples, ramp(8, 12));
    }

    #[test]
    fn clear_resets_counter_and_contents() {
        let ring = SampleRingBuffer::new(4);
        ring.write(&ramp(0, 3));
        ring.clear();
        assert_eq!(ring.total_written(), 0);
        assert!(ring.is_empty());

        // A reader holding an index from before the clear sees nothing.
        let (samples, idx) = ring.read_since(3);
        assert!(samples.is_empty());
        assert_eq!(idx, 0);

        ring.write(&[0.5]);
        let (samples, idx) = ring.read_since(idx);
        assert_eq!(samples, vec![0.5]);
        assert_eq!(idx, 1);
    }

    #[test]
    fn zero_capacity_is_usable() {
        let ring = SampleRingBuffer::new(0);
        ring.write(&[1.0, 2.0]);
        assert_eq!(ring.read_since(0), (vec![2.0], 2));
    }

    #[test]
    fn concurrent_writer_and_reader_see_every_sample_in_order() {
        let ring = Arc::new(SampleRingBuffer::new(4096));
        let writer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                for chunk in 0..100 {
                    ring.write(&ramp(chunk * 10, chunk * 10 + 10));
                }
            })
        };

        let mut seen = Vec::new();
        let mut idx = 0;
        while idx < 1000 {
            let (samples, next) = ring.read_since(idx);
            seen.extend(samples);
            idx = next;
            std::thread::yield_now();
        }
        assert!(writer.join().is_ok());
        assert_eq!(seen, ramp(0, 1000));
    }
}
