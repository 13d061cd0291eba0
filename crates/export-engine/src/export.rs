//! Exporter: the caller-facing entry point of the pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use kinetype_common::config::ExportDefaults;
use kinetype_common::error::{ExportError, ExportResult};
use kinetype_export_model::lifecycle::SessionState;
use kinetype_export_model::progress::{ExportPhase, ExportProgress};
use kinetype_export_model::spec::{ExportEstimate, ExportSpec};

use crate::batch_encode::BatchEncoder;
use crate::capture::{CaptureSettings, FrameCapture};
use crate::compose::Composer;
use crate::encoder::EncoderService;
use crate::frame_store::FrameStore;
use crate::progress::ProgressReporter;
use crate::render::RenderEngine;
use crate::session::ExportSession;

/// Pipeline limits applied to every export run by an [`Exporter`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Capture retry, timeout and reclamation pacing.
    pub capture: CaptureSettings,

    /// Batch encodes allowed in flight at once.
    pub encode_concurrency: usize,

    /// Bound for one batch encode.
    pub encode_timeout: Duration,

    /// Parent directory for session working directories.
    pub work_dir: Option<PathBuf>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from(&ExportDefaults::default())
    }
}

impl From<&ExportDefaults> for ExportSettings {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            capture: CaptureSettings::from(defaults),
            encode_concurrency: defaults.encode_concurrency.max(1),
            encode_timeout: defaults.encode_timeout(),
            work_dir: defaults.work_dir.clone(),
        }
    }
}

/// Why an export did not produce a file, and how far it got.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExportFailure {
    #[source]
    pub error: ExportError,

    /// Last progress reported before the failure, if any.
    pub last_progress: Option<ExportProgress>,
}

impl ExportFailure {
    fn rejected(error: ExportError) -> Self {
        Self {
            error,
            last_progress: None,
        }
    }
}

/// Runs exports against one render engine, one at a time.
pub struct Exporter {
    render: Arc<dyn RenderEngine>,
    encoder: Arc<dyn EncoderService>,
    settings: ExportSettings,
    running: AtomicBool,
    active: Mutex<Option<CancellationToken>>,
}

/// Clears the running flag when an export ends, however it ends.
struct RunGuard<'a> {
    exporter: &'a Exporter,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.exporter.active.lock() {
            *active = None;
        }
        self.exporter.running.store(false, Ordering::SeqCst);
    }
}

impl Exporter {
    pub fn new(
        render: Arc<dyn RenderEngine>,
        encoder: Arc<dyn EncoderService>,
        settings: ExportSettings,
    ) -> Self {
        Self {
            render,
            encoder,
            settings,
            running: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }

    /// Render, encode and compose `spec` into its output path.
    ///
    /// Rejected with [`ExportError::AlreadyRunning`] while another export on
    /// this exporter is in progress; the running export is unaffected.
    pub async fn start<F>(&self, spec: ExportSpec, on_progress: F) -> Result<PathBuf, ExportFailure>
    where
        F: Fn(ExportProgress) + Send + Sync,
    {
        let (_guard, cancel) = self.begin().map_err(ExportFailure::rejected)?;
        let mut reporter = ProgressReporter::new(&on_progress);

        match self.run(spec, cancel, &mut reporter).await {
            Ok(path) => Ok(path),
            Err(error) => Err(ExportFailure {
                error,
                last_progress: reporter.last().cloned(),
            }),
        }
    }

    /// Ask the running export to stop at its next frame or batch boundary.
    ///
    /// Returns whether an export was running.
    pub fn cancel(&self) -> bool {
        let active = match self.active.lock() {
            Ok(active) => active,
            Err(poisoned) => poisoned.into_inner(),
        };
        match active.as_ref() {
            Some(token) => {
                tracing::info!("Export cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Frame count and memory figures for `spec`, without exporting.
    pub fn estimate(&self, spec: &ExportSpec) -> ExportResult<ExportEstimate> {
        estimate(spec)
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn begin(&self) -> ExportResult<(RunGuard<'_>, CancellationToken)> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Rejected export request: another export is running");
            return Err(ExportError::AlreadyRunning);
        }
        let guard = RunGuard { exporter: self };
        let cancel = CancellationToken::new();
        let mut active = self
            .active
            .lock()
            .map_err(|_| ExportError::session("exporter state poisoned"))?;
        *active = Some(cancel.clone());
        Ok((guard, cancel))
    }

    async fn run(
        &self,
        spec: ExportSpec,
        cancel: CancellationToken,
        progress: &mut ProgressReporter<'_>,
    ) -> ExportResult<PathBuf> {
        progress.phase(ExportPhase::Preparing, "Preparing export");
        spec.validate()?;

        let mut session = ExportSession::open(spec, self.settings.work_dir.as_deref(), cancel)?;

        let span = tracing::info_span!("export", session = %session.id());
        match self.drive(&mut session, progress).instrument(span).await {
            Ok(path) => {
                if let Err(err) = session.finish(SessionState::Completed) {
                    tracing::warn!(error = %err, "Failed to remove export working directory");
                }
                tracing::info!(output = %path.display(), "Export finished");
                Ok(path)
            }
            Err(err) => {
                let outcome = if err.is_cancelled() {
                    SessionState::Cancelled
                } else {
                    SessionState::Failed
                };
                tracing::error!(
                    session = %session.id(),
                    state = %session.state(),
                    error = %err,
                    "Export aborted"
                );
                if let Err(close_err) = session.finish(outcome) {
                    tracing::warn!(error = %close_err, "Failed to remove export working directory");
                }
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        session: &mut ExportSession,
        progress: &mut ProgressReporter<'_>,
    ) -> ExportResult<PathBuf> {
        let spec = session.spec().clone();
        let total_frames = session.total_frames();
        let batches = spec.batches();
        tracing::info!(
            session = %session.id(),
            output = %spec.output_path.display(),
            start_ms = spec.start_ms,
            end_ms = spec.end_ms,
            fps = spec.fps,
            frames = total_frames,
            batches = batches.len(),
            "Starting export"
        );
        progress.counted(ExportPhase::Preparing, 1, 1);

        session.checkpoint()?;
        session.advance(SessionState::Capturing)?;
        let mut store = FrameStore::open(session.frames_dir(), spec.width, spec.height)?;
        let capture = FrameCapture::new(
            self.render.clone(),
            self.settings.capture,
            session.cancel_token(),
        );
        capture
            .capture_all(&spec, &mut store, progress)
            .instrument(tracing::info_span!("capture", frames = total_frames))
            .await?;

        session.checkpoint()?;
        session.advance(SessionState::Encoding)?;
        let encoded = BatchEncoder::new(
            self.encoder.clone(),
            self.settings.encode_concurrency,
            self.settings.encode_timeout,
        )
        .encode_batches(
            &spec,
            &batches,
            &store,
            &session.segments_dir(),
            &session.cancel_token(),
            progress,
        )
        .instrument(tracing::info_span!("encode", batches = batches.len()))
        .await?;

        // Past this point cancellation is no longer honoured.
        session.checkpoint()?;
        session.advance(SessionState::Composing)?;
        let duration_secs = total_frames as f64 / spec.fps as f64;
        let output = Composer::new(self.encoder.clone())
            .compose(
                &encoded,
                spec.audio_track(),
                duration_secs,
                &spec.output_path,
                &session.id().simple().to_string(),
                progress,
            )
            .instrument(tracing::info_span!("compose", segments = encoded.len()))
            .await?;

        session.advance(SessionState::Finalizing)?;
        confirm_output(&output)?;
        progress.phase(ExportPhase::Finalizing, "Export complete");
        Ok(output)
    }
}

/// Validate `spec` and compute its estimate.
pub fn estimate(spec: &ExportSpec) -> ExportResult<ExportEstimate> {
    spec.validate()?;
    Ok(spec.estimate())
}

fn confirm_output(path: &Path) -> ExportResult<()> {
    let meta = std::fs::metadata(path)
        .map_err(|e| ExportError::compose(format!("output {} missing: {e}", path.display())))?;
    if meta.len() == 0 {
        return Err(ExportError::compose(format!(
            "output {} is empty",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_defaults() {
        let defaults = ExportDefaults {
            encode_concurrency: 0,
            capture_attempts: 5,
            ..ExportDefaults::default()
        };
        let settings = ExportSettings::from(&defaults);
        assert_eq!(settings.encode_concurrency, 1);
        assert_eq!(settings.capture.attempts, 5);
        assert_eq!(settings.encode_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_estimate_validates_first() {
        let spec = ExportSpec::new(0.0, 0.0, 30, 640, 360, "out.mp4");
        assert!(matches!(estimate(&spec), Err(ExportError::Validation { .. })));

        let spec = ExportSpec::new(0.0, 10_000.0, 30, 640, 360, "out.mp4");
        let est = estimate(&spec).unwrap();
        assert_eq!(est.total_frames, 300);
        assert_eq!(est.batch_count, 2);
    }

    #[test]
    fn test_failure_displays_inner_error() {
        let failure = ExportFailure::rejected(ExportError::AlreadyRunning);
        assert_eq!(
            failure.to_string(),
            "An export is already running on this exporter"
        );
        assert!(failure.last_progress.is_none());
    }
}
