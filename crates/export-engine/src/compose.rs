//! Final composition of batch segments into the output file.
//!
//! The encoder writes into a hidden sibling of the requested output path,
//! and only a verified, non-empty file is renamed into place. Any failure
//! (or dropping the future) deletes the partial file, so the caller-visible
//! path either holds a complete video or is untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kinetype_common::error::{ExportError, ExportResult};
use kinetype_export_model::progress::ExportPhase;

use crate::batch_encode::EncodedBatch;
use crate::encoder::{ConcatRequest, EncoderService};
use crate::progress::ProgressReporter;

/// Joins ordered segments, with optional audio, into the final video.
pub struct Composer {
    encoder: Arc<dyn EncoderService>,
}

impl Composer {
    pub fn new(encoder: Arc<dyn EncoderService>) -> Self {
        Self { encoder }
    }

    /// Concatenate `segments` in batch order into `output`.
    ///
    /// `tag` makes the temporary file name unique per session.
    pub async fn compose(
        &self,
        segments: &[EncodedBatch],
        audio: Option<&Path>,
        duration_secs: f64,
        output: &Path,
        tag: &str,
        progress: &mut ProgressReporter<'_>,
    ) -> ExportResult<PathBuf> {
        progress.phase(ExportPhase::Composing, "Joining segments");
        check_order(segments)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let partial = tempfile::TempPath::try_from_path(partial_path(output, tag))?;
        tracing::info!(
            encoder = self.encoder.name(),
            segments = segments.len(),
            audio = ?audio,
            partial = %partial.display(),
            "Composing output"
        );

        let request = ConcatRequest {
            segments: segments.iter().map(|s| s.segment_path.clone()).collect(),
            audio: audio.map(Path::to_path_buf),
            duration_secs,
            output: partial.to_path_buf(),
        };
        let written = self
            .encoder
            .concatenate_segments(request)
            .await
            .map_err(|e| ExportError::compose(format!("{e:#}")))?;
        if written != *partial {
            return Err(ExportError::compose(format!(
                "encoder wrote {} instead of {}",
                written.display(),
                partial.display()
            )));
        }

        let size = std::fs::metadata(&partial)
            .map_err(|e| ExportError::compose(format!("composed file missing: {e}")))?
            .len();
        if size == 0 {
            return Err(ExportError::compose("composed file is empty"));
        }

        partial.persist(output).map_err(|e| {
            ExportError::compose(format!(
                "failed to move composed file to {}: {}",
                output.display(),
                e.error
            ))
        })?;

        tracing::info!(output = %output.display(), bytes = size, "Output written");
        Ok(output.to_path_buf())
    }
}

/// Segments must be exactly batches `0..n` in order.
fn check_order(segments: &[EncodedBatch]) -> ExportResult<()> {
    if segments.is_empty() {
        return Err(ExportError::compose("no segments to compose"));
    }
    let mut expected_start = 0u64;
    for (position, segment) in segments.iter().enumerate() {
        if segment.batch.index != position || segment.batch.start != expected_start {
            return Err(ExportError::continuity(format!(
                "segment {} (frames {}..{}) found at position {position}, expected frame {expected_start}",
                segment.batch.index, segment.batch.start, segment.batch.end
            )));
        }
        expected_start = segment.batch.end;
    }
    Ok(())
}

/// Hidden sibling of `output` used while composing:
/// `out/video.mp4` -> `out/.video.<tag>.partial.mp4`.
pub fn partial_path(output: &Path, tag: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match output.extension() {
        Some(ext) => format!(".{stem}.{tag}.partial.{}", ext.to_string_lossy()),
        None => format!(".{stem}.{tag}.partial"),
    };
    output.with_file_name(name)
}
