//! Frame capture orchestration ("seek and snap").
//!
//! For every frame index in increasing order:
//!
//! ```text
//! cancelled? ── gate.acquire ── pause ── seek_to(ts) ── capture_pixels
//!                                                            │
//!        progress ◄── gate.release ◄── persist ◄── validate ◄┘
//! ```
//!
//! Frame `i` is fully persisted before frame `i + 1` is requested.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use kinetype_common::config::ExportDefaults;
use kinetype_common::error::{ExportError, ExportResult};
use kinetype_export_model::progress::ExportPhase;
use kinetype_export_model::spec::ExportSpec;

use crate::frame_store::{validate_frame, FrameStore};
use crate::gate::Gate;
use crate::progress::ProgressReporter;
use crate::render::RenderEngine;

/// Retry and pacing limits for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Attempts per frame for engine errors and timeouts.
    pub attempts: u32,

    /// Bound for one pause + seek + capture.
    pub timeout: Duration,

    /// Frames between `reclaim_resources` hints (0 disables them).
    pub reclaim_interval: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&ExportDefaults::default())
    }
}

impl From<&ExportDefaults> for CaptureSettings {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            attempts: defaults.capture_attempts.max(1),
            timeout: defaults.capture_timeout(),
            reclaim_interval: defaults.reclaim_interval,
        }
    }
}

/// Drives the render engine through every frame of a spec.
pub struct FrameCapture {
    engine: Arc<dyn RenderEngine>,
    gate: Gate,
    cancel: CancellationToken,
    settings: CaptureSettings,
}

impl FrameCapture {
    /// Single-permit capture tied to the session's cancellation token.
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        settings: CaptureSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            gate: Gate::new("capture", 1, cancel.clone()),
            cancel,
            settings,
        }
    }

    /// Capture and persist every frame of `spec` into `store`.
    ///
    /// Returns the number of frames stored.
    pub async fn capture_all(
        &self,
        spec: &ExportSpec,
        store: &mut FrameStore,
        progress: &mut ProgressReporter<'_>,
    ) -> ExportResult<u64> {
        let total = spec.total_frames();
        tracing::info!(
            engine = self.engine.name(),
            total_frames = total,
            fps = spec.fps,
            width = spec.width,
            height = spec.height,
            "Capturing frames"
        );
        progress.counted(ExportPhase::Capturing, 0, total);

        for index in store.frames_completed()..total {
            if self.cancel.is_cancelled() {
                tracing::info!(frame = index, "Capture stopped by cancellation");
                return Err(ExportError::Cancelled);
            }

            let permit = self.gate.acquire().await?;
            let timestamp_ms = spec.frame_timestamp_ms(index);
            let rgba = self.capture_frame(spec, index, timestamp_ms).await?;
            store.persist(index, rgba).await?;
            permit.release();

            let done = index + 1;
            if self.settings.reclaim_interval > 0 && done % self.settings.reclaim_interval == 0 {
                tracing::debug!(frame = index, "Requesting render resource reclamation");
                self.engine.reclaim_resources().await;
            }
            progress.counted(ExportPhase::Capturing, done, total);
        }

        Ok(store.frames_completed())
    }

    /// Seek and snap one frame, retrying engine failures and timeouts.
    ///
    /// A buffer of the wrong size is rejected at once: the engine answered,
    /// and asking again would not change the scene it rendered.
    async fn capture_frame(
        &self,
        spec: &ExportSpec,
        index: u64,
        timestamp_ms: f64,
    ) -> ExportResult<Vec<u8>> {
        let attempts = self.settings.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.settings.timeout, self.seek_and_snap(spec, timestamp_ms))
                .await
            {
                Ok(Ok(rgba)) => {
                    validate_frame(index, spec.width, spec.height, &rgba)?;
                    tracing::debug!(frame = index, timestamp_ms, attempt, "Frame captured");
                    return Ok(rgba);
                }
                Ok(Err(err)) => {
                    last_error = format!("{err:#}");
                }
                Err(_) => {
                    last_error = format!("timed out after {:?}", self.settings.timeout);
                }
            }
            tracing::warn!(
                frame = index,
                timestamp_ms,
                attempt,
                max_attempts = attempts,
                error = %last_error,
                "Frame capture attempt failed"
            );
        }

        Err(ExportError::capture(
            index,
            format!("gave up after {attempts} attempts: {last_error}"),
        ))
    }

    async fn seek_and_snap(&self, spec: &ExportSpec, timestamp_ms: f64) -> anyhow::Result<Vec<u8>> {
        self.engine.pause().await?;
        self.engine.seek_to(timestamp_ms).await?;
        self.engine
            .capture_pixels(spec.width, spec.height, spec.include_overlays)
            .await
    }
}
