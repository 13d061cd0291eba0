//! Frame timing utilities for offline export.
//!
//! Export never samples a wall clock: every frame is addressed by its index
//! and its timestamp is derived from the export range start and frame rate.
//! This module provides:
//! - Frame count for a millisecond range
//! - Exact (possibly fractional) timestamp of a frame index

/// Tolerance absorbing float noise when a range is an exact multiple of the
/// frame interval.
const FRAME_EPSILON: f64 = 1e-9;

/// Maps frame indices to animation timestamps for a fixed frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    /// Range start in milliseconds.
    start_ms: f64,

    /// Target frames per second.
    fps: u32,
}

impl FrameClock {
    /// Create a clock anchored at `start_ms`.
    pub fn new(start_ms: f64, fps: u32) -> Self {
        Self { start_ms, fps }
    }

    /// Number of frames needed to cover `[start, end)`:
    /// `ceil((end - start) / 1000 * fps)`.
    pub fn total_frames(&self, end_ms: f64) -> u64 {
        let duration_ms = end_ms - self.start_ms;
        if duration_ms <= 0.0 || self.fps == 0 {
            return 0;
        }
        let frames = duration_ms * self.fps as f64 / 1000.0;
        // Any positive range shows at least one frame.
        ((frames - FRAME_EPSILON).ceil() as u64).max(1)
    }

    /// Timestamp of frame `index` in milliseconds: `start + index * 1000 / fps`.
    pub fn timestamp_ms(&self, index: u64) -> f64 {
        self.start_ms + (index as f64 * 1000.0) / self.fps as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_total_frames_exact_multiple() {
        let clock = FrameClock::new(0.0, 30);
        assert_eq!(clock.total_frames(5000.0), 150);
        assert_eq!(clock.total_frames(10_000.0), 300);
    }

    #[test]
    fn test_total_frames_rounds_partial_frame_up() {
        let clock = FrameClock::new(0.0, 30);
        // 1010ms at 30fps = 30.3 frames
        assert_eq!(clock.total_frames(1010.0), 31);
    }

    #[test]
    fn test_total_frames_empty_range() {
        let clock = FrameClock::new(2000.0, 24);
        assert_eq!(clock.total_frames(2000.0), 0);
        assert_eq!(clock.total_frames(1000.0), 0);
    }

    #[test]
    fn test_timestamp_is_fractional_at_non_divisor_fps() {
        let clock = FrameClock::new(500.0, 30);
        assert_eq!(clock.timestamp_ms(0), 500.0);
        assert!((clock.timestamp_ms(1) - 533.333_333).abs() < 1e-3);
        assert!((clock.timestamp_ms(30) - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn test_tiny_positive_range_still_has_one_frame() {
        let clock = FrameClock::new(0.0, 30);
        assert_eq!(clock.total_frames(1e-10), 1);
        assert_eq!(clock.total_frames(0.001), 1);
    }

    proptest! {
        #[test]
        fn prop_total_frames_matches_formula(
            start in 0u32..100_000,
            len in 1u32..600_000,
            fps in 1u32..=240,
        ) {
            let start = start as f64;
            let clock = FrameClock::new(start, fps);
            let got = clock.total_frames(start + len as f64);
            prop_assert_eq!(got, ((len as u64) * fps as u64).div_ceil(1000));
        }

        #[test]
        fn prop_last_frame_starts_before_end(
            len in 1u32..600_000,
            fps in 1u32..=240,
        ) {
            let clock = FrameClock::new(0.0, fps);
            let total = clock.total_frames(len as f64);
            prop_assert!(total >= 1);
            prop_assert!(clock.timestamp_ms(total - 1) < len as f64);
            prop_assert!(clock.timestamp_ms(total) >= len as f64 - 1e-6);
        }
    }
}
