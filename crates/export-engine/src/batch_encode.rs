//! Batch encoding coordination.
//!
//! Batches are submitted in index order; up to `concurrency` encodes run at
//! once on a [`JoinSet`]. Completion order is arbitrary, so results are slotted
//! back by batch index for composition.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use kinetype_common::error::{ExportError, ExportResult};
use kinetype_export_model::batch::{check_continuity, Batch};
use kinetype_export_model::progress::ExportPhase;
use kinetype_export_model::spec::ExportSpec;

use crate::encoder::{EncoderService, SegmentRequest};
use crate::frame_store::FrameStore;
use crate::gate::Gate;
use crate::progress::ProgressReporter;

/// A batch together with the segment it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub batch: Batch,
    pub segment_path: PathBuf,
}

type BatchOutcome = (usize, ExportResult<PathBuf>);

/// Runs the encoder service over every batch of a spec.
pub struct BatchEncoder {
    encoder: Arc<dyn EncoderService>,
    concurrency: usize,
    timeout: Duration,
}

impl BatchEncoder {
    pub fn new(encoder: Arc<dyn EncoderService>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            encoder,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Encode the batch partition of `spec` into `segments_dir`.
    pub async fn encode_all(
        &self,
        spec: &ExportSpec,
        store: &FrameStore,
        segments_dir: &Path,
        cancel: &CancellationToken,
        progress: &mut ProgressReporter<'_>,
    ) -> ExportResult<Vec<EncodedBatch>> {
        let batches = spec.batches();
        self.encode_batches(spec, &batches, store, segments_dir, cancel, progress)
            .await
    }

    /// Encode an explicit, ordered list of batches.
    pub async fn encode_batches(
        &self,
        spec: &ExportSpec,
        batches: &[Batch],
        store: &FrameStore,
        segments_dir: &Path,
        cancel: &CancellationToken,
        progress: &mut ProgressReporter<'_>,
    ) -> ExportResult<Vec<EncodedBatch>> {
        let total = batches.len();
        tracing::info!(
            encoder = self.encoder.name(),
            batches = total,
            concurrency = self.concurrency,
            "Encoding batches"
        );
        progress.counted(ExportPhase::Encoding, 0, total as u64);

        // A failed batch cancels this token to stop our own submissions
        // without cancelling the whole session.
        let phase_cancel = cancel.child_token();
        let gate = Gate::new("encode", self.concurrency, phase_cancel.clone());
        let mut segments: Vec<Option<PathBuf>> = vec![None; total];
        let mut completed = 0u64;
        let mut in_flight: JoinSet<BatchOutcome> = JoinSet::new();

        for (position, batch) in batches.iter().enumerate() {
            let continuity = match position {
                0 => check_first(batch),
                _ => check_continuity(&batches[position - 1], batch),
            };
            if let Err(err) = continuity {
                tracing::error!(batch = batch.index, error = %err, "Batch partition is inconsistent");
                in_flight.abort_all();
                return Err(err);
            }

            let acquired = loop {
                tokio::select! {
                    biased;
                    Some(joined) = in_flight.join_next() => {
                        if let Err(err) = absorb(joined, &mut segments) {
                            phase_cancel.cancel();
                            in_flight.abort_all();
                            return Err(err);
                        }
                        completed += 1;
                        progress.counted(ExportPhase::Encoding, completed, total as u64);
                    }
                    acquired = gate.acquire() => break acquired,
                }
            };
            let permit = match acquired {
                Ok(permit) => permit,
                Err(err) => {
                    tracing::info!(
                        next_batch = batch.index,
                        in_flight = in_flight.len(),
                        "Batch submission stopped; waiting for in-flight encodes"
                    );
                    while in_flight.join_next().await.is_some() {}
                    return Err(err);
                }
            };

            let request = SegmentRequest {
                batch: *batch,
                frames: store.paths(batch.frames())?,
                frame_pattern: store.pattern(),
                fps: spec.fps,
                width: spec.width,
                height: spec.height,
                quality: spec.quality,
                output: segments_dir.join(batch.segment_file_name()),
            };
            let encoder = self.encoder.clone();
            let timeout = self.timeout;
            let index = batch.index;
            tracing::debug!(batch = index, start = batch.start, end = batch.end, "Submitting batch");
            in_flight.spawn(async move {
                let result = encode_one(encoder.as_ref(), request, timeout).await;
                permit.release();
                (index, result)
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = absorb(joined, &mut segments) {
                phase_cancel.cancel();
                in_flight.abort_all();
                return Err(err);
            }
            completed += 1;
            progress.counted(ExportPhase::Encoding, completed, total as u64);
        }

        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        batches
            .iter()
            .map(|batch| {
                let segment_path = segments[batch.index].take().ok_or_else(|| {
                    ExportError::continuity(format!("batch {} produced no segment", batch.index))
                })?;
                Ok(EncodedBatch {
                    batch: *batch,
                    segment_path,
                })
            })
            .collect()
    }
}

fn check_first(batch: &Batch) -> ExportResult<()> {
    if batch.index != 0 || batch.start != 0 {
        return Err(ExportError::continuity(format!(
            "first batch is #{} starting at frame {}",
            batch.index, batch.start
        )));
    }
    Ok(())
}

async fn encode_one(
    encoder: &dyn EncoderService,
    request: SegmentRequest,
    timeout: Duration,
) -> ExportResult<PathBuf> {
    let index = request.batch.index;
    let started = std::time::Instant::now();
    match tokio::time::timeout(timeout, encoder.encode_image_sequence(request)).await {
        Ok(Ok(path)) => {
            tracing::debug!(
                batch = index,
                elapsed_ms = started.elapsed().as_millis(),
                segment = %path.display(),
                "Batch encoded"
            );
            Ok(path)
        }
        Ok(Err(err)) => Err(ExportError::encode(index, format!("{err:#}"))),
        Err(_) => Err(ExportError::encode(
            index,
            format!("timed out after {timeout:?}"),
        )),
    }
}

fn absorb(
    joined: Result<BatchOutcome, JoinError>,
    segments: &mut [Option<PathBuf>],
) -> ExportResult<()> {
    let (index, result) = joined.map_err(|err| {
        ExportError::Other(anyhow::anyhow!("batch encode task failed: {err}"))
    })?;
    let path = match result {
        Ok(path) => path,
        Err(err) => {
            tracing::error!(batch = index, error = %err, "Batch encode failed; aborting remaining batches");
            return Err(err);
        }
    };
    let slot = segments.get_mut(index).ok_or_else(|| {
        ExportError::continuity(format!("batch index {index} outside the partition"))
    })?;
    *slot = Some(path);
    Ok(())
}
