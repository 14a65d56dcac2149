// FrameAccumulator - fixed-size analysis frames from arbitrary-sized chunks
//
// The capture callback delivers samples in whatever chunk size the host
// picks. This accumulator copies them into a single pre-allocated frame and,
// each time the frame fills, applies the window in place and hands the frame
// to the caller. A chunk that straddles a frame edge completes the current
// frame and starts the next one within the same call.
//
// Real-time safety: the frame and window are allocated once in `new`; `push`
// never allocates.

use crate::config::WindowKind;

use super::window;

pub struct FrameAccumulator {
    frame: Vec<f32>,
    window: Vec<f32>,
    position: usize,
    frames_emitted: u64,
    // Interleaved sample frame split across pushes
    group_sum: f32,
    group_len: usize,
}

impl FrameAccumulator {
    /// Create an accumulator for frames of `frame_len` samples
    ///
    /// # Panics
    /// Panics if `frame_len` is 0
    pub fn new(frame_len: usize, kind: WindowKind) -> Self {
        assert!(frame_len > 0, "frame_len must be greater than 0");
        Self {
            frame: vec![0.0; frame_len],
            window: window::coefficients(kind, frame_len),
            position: 0,
            frames_emitted: 0,
            group_sum: 0.0,
            group_len: 0,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame.len()
    }

    /// Samples buffered toward the next frame
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Append mono samples, invoking `on_frame` once per completed frame
    ///
    /// # Returns
    /// Number of frames completed by this call
    pub fn push<F>(&mut self, samples: &[f32], mut on_frame: F) -> usize
    where
        F: FnMut(&[f32]),
    {
        let mut completed = 0;
        let mut remaining = samples;

        while !remaining.is_empty() {
            let space = self.frame.len() - self.position;
            let take = space.min(remaining.len());
            self.frame[self.position..self.position + take].copy_from_slice(&remaining[..take]);
            self.position += take;
            remaining = &remaining[take..];

            if self.position == self.frame.len() {
                self.emit(&mut on_frame);
                completed += 1;
            }
        }

        completed
    }

    /// Append interleaved samples, downmixing each sample frame to mono by averaging
    ///
    /// Chunks may end partway through a sample frame; the remainder is carried
    /// into the next call so channel alignment is kept across pushes.
    pub fn push_interleaved<F>(&mut self, samples: &[f32], channels: usize, mut on_frame: F) -> usize
    where
        F: FnMut(&[f32]),
    {
        if channels <= 1 {
            return self.push(samples, on_frame);
        }

        let mut completed = 0;
        for &sample in samples {
            self.group_sum += sample;
            self.group_len += 1;
            if self.group_len < channels {
                continue;
            }

            self.frame[self.position] = self.group_sum / channels as f32;
            self.group_sum = 0.0;
            self.group_len = 0;
            self.position += 1;

            if self.position == self.frame.len() {
                self.emit(&mut on_frame);
                completed += 1;
            }
        }
        completed
    }

    /// Drop any partially accumulated samples
    pub fn reset(&mut self) {
        self.position = 0;
        self.group_sum = 0.0;
        self.group_len = 0;
    }

    fn emit<F>(&mut self, on_frame: &mut F)
    where
        F: FnMut(&[f32]),
    {
        for (sample, coeff) in self.frame.iter_mut().zip(&self.window) {
            *sample *= coeff;
        }
        on_frame(&self.frame);
        self.frames_emitted += 1;
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_fill_emits_nothing() {
        let mut acc = FrameAccumulator::new(8, WindowKind::Hann);
        let emitted = acc.push(&[1.0; 7], |_| panic!("no frame expected"));
        assert_eq!(emitted, 0);
        assert_eq!(acc.position(), 7);
    }

    #[test]
    fn chunk_straddling_frame_edge_continues_accumulation() {
        let mut acc = FrameAccumulator::new(8, WindowKind::Hamming);
        let mut frames = Vec::new();

        acc.push(&[1.0; 5], |f| frames.push(f.to_vec()));
        assert!(frames.is_empty());

        let emitted = acc.push(&[1.0; 6], |f| frames.push(f.to_vec()));
        assert_eq!(emitted, 1);
        assert_eq!(frames.len(), 1);
        assert_eq!(acc.position(), 3);

        // Constant input means the emitted frame is exactly the window
        let expected = window::coefficients(WindowKind::Hamming, 8);
        for (got, want) in frames[0].iter().zip(&expected) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn large_chunk_emits_multiple_frames() {
        let mut acc = FrameAccumulator::new(4, WindowKind::Hann);
        let mut count = 0;
        let emitted = acc.push(&[0.5; 17], |_| count += 1);
        assert_eq!(emitted, 4);
        assert_eq!(count, 4);
        assert_eq!(acc.position(), 1);
        assert_eq!(acc.frames_emitted(), 4);
    }

    #[test]
    fn window_is_applied_per_sample() {
        let mut acc = FrameAccumulator::new(5, WindowKind::Hann);
        let input = [2.0, 2.0, 2.0, 2.0, 2.0];
        let mut out = Vec::new();
        acc.push(&input, |f| out.extend_from_slice(f));
        assert!(out[0].abs() < 1e-6);
        assert!((out[2] - 2.0).abs() < 1e-6);
        assert!(out[4].abs() < 1e-6);
    }

    #[test]
    fn interleaved_stereo_is_averaged() {
        let mut acc = FrameAccumulator::new(3, WindowKind::Hamming);
        // Pre-window mono values: 0.5, 1.0, 0.0
        let stereo = [0.0, 1.0, 1.0, 1.0, -1.0, 1.0];
        let mut out = Vec::new();
        let emitted = acc.push_interleaved(&stereo, 2, |f| out.extend_from_slice(f));
        assert_eq!(emitted, 1);

        let w = window::coefficients(WindowKind::Hamming, 3);
        assert!((out[0] - 0.5 * w[0]).abs() < 1e-6);
        assert!((out[1] - 1.0 * w[1]).abs() < 1e-6);
        assert!(out[2].abs() < 1e-6);
    }

    #[test]
    fn interleaved_split_mid_frame_keeps_channel_alignment() {
        // L = 1.0, R = -1.0 averages to 0.0 on every sample frame
        let stereo: Vec<f32> = (0..16).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();

        let mut whole = FrameAccumulator::new(8, WindowKind::Hann);
        let mut expected = Vec::new();
        whole.push_interleaved(&stereo, 2, |f| expected.extend_from_slice(f));

        let mut split = FrameAccumulator::new(8, WindowKind::Hann);
        let mut actual = Vec::new();
        let first = split.push_interleaved(&stereo[..3], 2, |f| actual.extend_from_slice(f));
        assert_eq!(first, 0);
        assert_eq!(split.position(), 1);
        let second = split.push_interleaved(&stereo[3..], 2, |f| actual.extend_from_slice(f));
        assert_eq!(second, 1);

        assert_eq!(split.position(), 0);
        assert_eq!(actual, expected);
        assert!(actual.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn reset_discards_partial_sample_frame() {
        let mut acc = FrameAccumulator::new(2, WindowKind::Hann);
        acc.push_interleaved(&[5.0], 2, |_| {});
        acc.reset();
        let mut out = Vec::new();
        acc.push_interleaved(&[1.0, -1.0, 1.0, -1.0], 2, |f| out.extend_from_slice(f));
        assert!(out.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut acc = FrameAccumulator::new(4, WindowKind::Hann);
        acc.push(&[1.0; 3], |_| {});
        acc.reset();
        assert_eq!(acc.position(), 0);
        let emitted = acc.push(&[1.0; 3], |_| {});
        assert_eq!(emitted, 0);
    }

    #[test]
    #[should_panic(expected = "frame_len must be greater than 0")]
    fn zero_frame_len_panics() {
        FrameAccumulator::new(0, WindowKind::Hann);
    }
}
