//! Export request types and validation.
//!
//! An [`ExportSpec`] is fixed for the lifetime of one export session. All
//! derived quantities (frame count, frame timestamps, batch partition,
//! memory estimate) are computed from it deterministically.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use kinetype_common::clock::FrameClock;
use kinetype_common::config::QualityPreset;
use kinetype_common::error::{ExportError, ExportResult};

use crate::batch::{partition, Batch};

/// Smallest accepted output edge in pixels.
pub const MIN_DIMENSION: u32 = 16;

/// Largest accepted output edge in pixels.
pub const MAX_DIMENSION: u32 = 8192;

/// Highest accepted frame rate.
pub const MAX_FPS: u32 = 240;

/// Bytes per RGBA pixel.
pub const BYTES_PER_PIXEL: u64 = 4;

/// Memory a single batch may hold in decoded frames before the recommended
/// batch size shrinks.
pub const BATCH_MEMORY_BUDGET_BYTES: u64 = 512 * 1024 * 1024;

/// Bounds for the recommended batch size.
pub const MIN_RECOMMENDED_BATCH: u64 = 30;
pub const MAX_RECOMMENDED_BATCH: u64 = 300;

/// Caller input describing one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSpec {
    /// Range start (inclusive) in milliseconds of animation time.
    pub start_ms: f64,

    /// Range end (exclusive) in milliseconds of animation time.
    pub end_ms: f64,

    /// Output frame rate.
    pub fps: u32,

    /// Output resolution in pixels.
    pub width: u32,
    pub height: u32,

    /// Final video path.
    pub output_path: PathBuf,

    /// Ask the render engine to draw debug overlays into captured frames.
    #[serde(default)]
    pub include_overlays: bool,

    /// Mux an audio track into the final video.
    #[serde(default)]
    pub include_audio: bool,

    /// Audio source chosen by the caller; required when `include_audio` is set.
    #[serde(default)]
    pub audio_path: Option<PathBuf>,

    /// Frames per encoded segment.
    pub batch_size: u32,

    /// Encoder quality preset.
    #[serde(default)]
    pub quality: QualityPreset,
}

/// Result of the pure estimation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEstimate {
    /// Frames the export will capture.
    pub total_frames: u64,

    /// Size of one raw RGBA frame.
    pub frame_bytes: u64,

    /// Segments produced with the requested batch size.
    pub batch_count: usize,

    /// Raw frame memory one batch represents at the requested batch size.
    pub peak_memory_per_batch: u64,

    /// Batch size keeping one batch within the memory budget.
    pub recommended_batch_size: u32,
}

impl ExportSpec {
    /// Create a spec with default batch size, no overlays and no audio.
    pub fn new(
        start_ms: f64,
        end_ms: f64,
        fps: u32,
        width: u32,
        height: u32,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            start_ms,
            end_ms,
            fps,
            width,
            height,
            output_path: output_path.into(),
            include_overlays: false,
            include_audio: false,
            audio_path: None,
            batch_size: 150,
            quality: QualityPreset::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_audio(mut self, audio_path: impl Into<PathBuf>) -> Self {
        self.include_audio = true;
        self.audio_path = Some(audio_path.into());
        self
    }

    pub fn with_overlays(mut self, include_overlays: bool) -> Self {
        self.include_overlays = include_overlays;
        self
    }

    pub fn with_quality(mut self, quality: QualityPreset) -> Self {
        self.quality = quality;
        self
    }

    /// Check the spec is renderable. Every later stage assumes this passed.
    pub fn validate(&self) -> ExportResult<()> {
        if !self.start_ms.is_finite() || !self.end_ms.is_finite() {
            return Err(ExportError::validation("Time range must be finite"));
        }
        if self.start_ms < 0.0 {
            return Err(ExportError::validation(format!(
                "Start time must not be negative (got {}ms)",
                self.start_ms
            )));
        }
        if self.end_ms <= self.start_ms {
            return Err(ExportError::validation(format!(
                "Duration must be positive (start {}ms, end {}ms)",
                self.start_ms, self.end_ms
            )));
        }
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(ExportError::validation(format!(
                "Frame rate must be within 1..={MAX_FPS} (got {})",
                self.fps
            )));
        }
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
                return Err(ExportError::validation(format!(
                    "Output {name} must be within {MIN_DIMENSION}..={MAX_DIMENSION} (got {value})"
                )));
            }
            // yuv420p subsamples chroma 2x2.
            if value % 2 != 0 {
                return Err(ExportError::validation(format!(
                    "Output {name} must be even (got {value})"
                )));
            }
        }
        if self.batch_size == 0 {
            return Err(ExportError::validation("Batch size must be at least 1"));
        }
        if self.output_path.file_name().is_none() {
            return Err(ExportError::validation(format!(
                "Output path has no file name: {}",
                self.output_path.display()
            )));
        }
        if self.include_audio && self.audio_path.is_none() {
            return Err(ExportError::validation(
                "Audio was requested but no audio source was given",
            ));
        }
        Ok(())
    }

    pub fn clock(&self) -> FrameClock {
        FrameClock::new(self.start_ms, self.fps)
    }

    /// `ceil((end - start) / 1000 * fps)`.
    pub fn total_frames(&self) -> u64 {
        self.clock().total_frames(self.end_ms)
    }

    /// Animation time shown by frame `index`.
    pub fn frame_timestamp_ms(&self, index: u64) -> f64 {
        self.clock().timestamp_ms(index)
    }

    /// Exact byte length of one captured RGBA frame.
    pub fn frame_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * BYTES_PER_PIXEL
    }

    /// Audio file to mux, if audio was requested.
    pub fn audio_track(&self) -> Option<&Path> {
        if self.include_audio {
            self.audio_path.as_deref()
        } else {
            None
        }
    }

    /// Batch partition of the full frame range.
    pub fn batches(&self) -> Vec<Batch> {
        partition(self.total_frames(), self.batch_size as u64)
    }

    /// Frame count, batch layout and memory figures, without side effects.
    pub fn estimate(&self) -> ExportEstimate {
        let total_frames = self.total_frames();
        let frame_bytes = self.frame_bytes();
        let batch_size = self.batch_size.max(1) as u64;

        let budget_frames = BATCH_MEMORY_BUDGET_BYTES / frame_bytes.max(1);
        let recommended = budget_frames
            .clamp(MIN_RECOMMENDED_BATCH, MAX_RECOMMENDED_BATCH)
            .min(total_frames.max(1));

        ExportEstimate {
            total_frames,
            frame_bytes,
            batch_count: total_frames.div_ceil(batch_size) as usize,
            peak_memory_per_batch: batch_size.min(total_frames.max(1)) * frame_bytes,
            recommended_batch_size: recommended as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(end_ms: f64, fps: u32) -> ExportSpec {
        ExportSpec::new(0.0, end_ms, fps, 1280, 720, "/tmp/out.mp4")
    }

    #[test]
    fn test_valid_spec_passes() {
        assert!(spec(5000.0, 30).validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        let mut s = spec(5000.0, 30);
        s.end_ms = 0.0;
        assert!(matches!(s.validate(), Err(ExportError::Validation { .. })));
        s.end_ms = -10.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_sub_frame_range_exports_one_frame() {
        let s = ExportSpec::new(0.0, 1e-10, 30, 16, 16, "/tmp/out.mp4");
        assert!(s.validate().is_ok());
        assert_eq!(s.total_frames(), 1);
        assert_eq!(s.batches().len(), 1);
        assert_eq!(s.estimate().batch_count, 1);
    }

    #[test]
    fn test_rejects_zero_fps() {
        assert!(matches!(
            spec(5000.0, 0).validate(),
            Err(ExportError::Validation { .. })
        ));
    }

    #[test]
    fn test_rejects_resolution_out_of_bounds() {
        let mut s = spec(5000.0, 30);
        s.width = 8;
        assert!(s.validate().is_err());
        s.width = 9000;
        assert!(s.validate().is_err());
        s.width = 1281;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_rejects_audio_flag_without_source() {
        let mut s = spec(5000.0, 30);
        s.include_audio = true;
        assert!(s.validate().is_err());
        let s = spec(5000.0, 30).with_audio("/tmp/song.mp3");
        assert!(s.validate().is_ok());
        assert_eq!(s.audio_track(), Some(Path::new("/tmp/song.mp3")));
    }

    #[test]
    fn test_audio_track_ignored_when_flag_off() {
        let mut s = spec(5000.0, 30).with_audio("/tmp/song.mp3");
        s.include_audio = false;
        assert_eq!(s.audio_track(), None);
    }

    #[test]
    fn test_frame_timestamps_offset_by_start() {
        let s = ExportSpec::new(1500.0, 2500.0, 25, 640, 360, "/tmp/out.mp4");
        assert_eq!(s.total_frames(), 25);
        assert_eq!(s.frame_timestamp_ms(0), 1500.0);
        assert_eq!(s.frame_timestamp_ms(1), 1540.0);
        assert_eq!(s.frame_timestamp_ms(24), 2460.0);
    }

    #[test]
    fn test_estimate_single_batch() {
        let estimate = spec(5000.0, 30).with_batch_size(150).estimate();
        assert_eq!(estimate.total_frames, 150);
        assert_eq!(estimate.batch_count, 1);
        assert_eq!(estimate.frame_bytes, 1280 * 720 * 4);
        assert_eq!(estimate.peak_memory_per_batch, 150 * 1280 * 720 * 4);
    }

    #[test]
    fn test_estimate_recommends_smaller_batches_for_large_frames() {
        let mut s = spec(60_000.0, 30);
        s.width = 3840;
        s.height = 2160;
        let estimate = s.estimate();
        // 3840x2160x4 = 33,177,600 bytes; 512MiB holds 16 of them.
        assert_eq!(estimate.recommended_batch_size, MIN_RECOMMENDED_BATCH as u32);

        let mut small = spec(60_000.0, 30);
        small.width = 320;
        small.height = 240;
        assert_eq!(
            small.estimate().recommended_batch_size,
            MAX_RECOMMENDED_BATCH as u32
        );
    }

    #[test]
    fn test_estimate_recommendation_capped_by_frame_count() {
        let s = ExportSpec::new(0.0, 500.0, 30, 320, 240, "/tmp/out.mp4");
        assert_eq!(s.estimate().recommended_batch_size, 15);
    }

    #[test]
    fn test_spec_json_defaults() {
        let s: ExportSpec = serde_json::from_str(
            r#"{"start_ms":0,"end_ms":1000,"fps":30,"width":640,"height":360,
                "output_path":"out.mp4","batch_size":30}"#,
        )
        .unwrap();
        assert!(!s.include_audio);
        assert!(!s.include_overlays);
        assert_eq!(s.quality, QualityPreset::Standard);
    }
}
