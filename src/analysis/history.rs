// History module - bounded FIFO of past bucket vectors with smoothing
//
// Capacity W is fixed at construction. Once full, each push recycles the
// oldest vector's allocation, so steady-state pushes from the capture
// callback never allocate.

use std::collections::VecDeque;

use crate::config::SmoothingPolicy;

pub struct BucketHistory {
    capacity: usize,
    bucket_count: usize,
    frames: VecDeque<Vec<f32>>,
}

impl BucketHistory {
    /// # Panics
    /// Panics if `capacity` or `bucket_count` is 0
    pub fn new(capacity: usize, bucket_count: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        assert!(bucket_count > 0, "bucket_count must be greater than 0");
        Self {
            capacity,
            bucket_count,
            frames: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Most recently pushed vector
    pub fn newest(&self) -> Option<&[f32]> {
        self.frames.back().map(Vec::as_slice)
    }

    /// Vectors from newest to oldest
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &[f32]> {
        self.frames.iter().rev().map(Vec::as_slice)
    }

    /// Append one bucket vector, evicting the oldest when at capacity
    ///
    /// # Panics
    /// Panics if `levels.len()` differs from the bucket count
    pub fn push(&mut self, levels: &[f32]) {
        assert_eq!(
            levels.len(),
            self.bucket_count,
            "bucket vector length mismatch"
        );

        if self.frames.len() == self.capacity {
            if let Some(mut recycled) = self.frames.pop_front() {
                recycled.copy_from_slice(levels);
                self.frames.push_back(recycled);
                return;
            }
        }
        self.frames.push_back(levels.to_vec());
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Write the smoothed bucket vector into `out`
    ///
    /// Normalizes over the frames actually present, so a partially filled
    /// window (startup) is not biased toward zero. An empty history yields
    /// all zeros.
    pub fn aggregate(&self, policy: SmoothingPolicy, out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.bucket_count);
        out.iter_mut().for_each(|v| *v = 0.0);
        if self.frames.is_empty() {
            return;
        }

        let mut weight_sum = 0.0_f32;
        for (position, frame) in self.frames.iter().rev().enumerate() {
            let weight = match policy {
                SmoothingPolicy::Uniform => 1.0,
                SmoothingPolicy::WeightedDecay => self.decay_weight(position),
            };
            weight_sum += weight;
            for (acc, value) in out.iter_mut().zip(frame) {
                *acc += weight * value;
            }
        }

        if weight_sum > 0.0 {
            out.iter_mut().for_each(|v| *v /= weight_sum);
        }
    }

    /// `((W - p) / W)^2` for window position `p` (0 = newest)
    fn decay_weight(&self, position: usize) -> f32 {
        let w = self.capacity as f32;
        let ratio = (w - position as f32) / w;
        ratio * ratio
    }
}
