//! Encoder service interface consumed by batch encoding and composition.

use std::path::PathBuf;

use async_trait::async_trait;

use kinetype_common::config::QualityPreset;
use kinetype_export_model::batch::Batch;

/// One batch worth of frames to encode into a segment.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    /// The batch being encoded.
    pub batch: Batch,

    /// Frame files in display order, `batch.len()` entries.
    pub frames: Vec<PathBuf>,

    /// printf-style pattern the frame files follow (`.../frame_%06d.png`);
    /// `batch.start` is the first number in the sequence.
    pub frame_pattern: PathBuf,

    /// Output frame rate.
    pub fps: u32,

    /// Output resolution.
    pub width: u32,
    pub height: u32,

    /// Encoder quality preset.
    pub quality: QualityPreset,

    /// Where the segment must be written.
    pub output: PathBuf,
}

/// Ordered segments to join into the final video.
#[derive(Debug, Clone)]
pub struct ConcatRequest {
    /// Segment files in batch order.
    pub segments: Vec<PathBuf>,

    /// Audio track to mux, already selected by the caller.
    pub audio: Option<PathBuf>,

    /// Length of the concatenated video; audio is trimmed to it.
    pub duration_secs: f64,

    /// Where the joined file must be written.
    pub output: PathBuf,
}

/// Backend turning image sequences into video segments and joining them.
#[async_trait]
pub trait EncoderService: Send + Sync {
    /// Encode one batch of frames; returns the written segment path.
    async fn encode_image_sequence(&self, request: SegmentRequest) -> anyhow::Result<PathBuf>;

    /// Losslessly concatenate segments (in the given order), optionally muxing
    /// audio; returns the written file path.
    async fn concatenate_segments(&self, request: ConcatRequest) -> anyhow::Result<PathBuf>;

    /// Check if this backend can run on the system.
    async fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}
