//! Export session lifecycle.
//!
//! An [`ExportSession`] owns everything one export creates: the working
//! directory (frames and segments), the lifecycle state and the
//! cancellation token. The working directory is a [`tempfile::TempDir`], so
//! it disappears on every exit path: explicit [`ExportSession::finish`],
//! early `?` returns, and unwinding.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use kinetype_common::error::{ExportError, ExportResult};
use kinetype_export_model::lifecycle::SessionState;
use kinetype_export_model::spec::ExportSpec;

const FRAMES_DIR: &str = "frames";
const SEGMENTS_DIR: &str = "segments";

/// In-memory and on-disk state of one export.
#[derive(Debug)]
pub struct ExportSession {
    id: Uuid,
    spec: ExportSpec,
    state: SessionState,
    total_frames: u64,
    workdir: Option<tempfile::TempDir>,
    work_path: PathBuf,
    cancel: CancellationToken,
    started_at: String,
    started: Instant,
}

impl ExportSession {
    /// Allocate the working directory and enter `Preparing`.
    ///
    /// The directory is created under `work_root` when given, otherwise in
    /// the system temp directory.
    pub fn open(
        spec: ExportSpec,
        work_root: Option<&Path>,
        cancel: CancellationToken,
    ) -> ExportResult<Self> {
        let id = Uuid::new_v4();
        let prefix = format!("kinetype-export-{}-", id.simple());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let workdir = match work_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        let work_path = workdir.path().to_path_buf();
        std::fs::create_dir_all(work_path.join(FRAMES_DIR))?;
        std::fs::create_dir_all(work_path.join(SEGMENTS_DIR))?;

        let total_frames = spec.total_frames();
        tracing::info!(
            session = %id,
            workdir = %work_path.display(),
            total_frames,
            "Export session opened"
        );

        Ok(Self {
            id,
            spec,
            state: SessionState::Preparing,
            total_frames,
            workdir: Some(workdir),
            work_path,
            cancel,
            started_at: chrono::Utc::now().to_rfc3339(),
            started: Instant::now(),
        })
    }

    /// Move along the happy path. Terminal states go through [`finish`].
    ///
    /// [`finish`]: ExportSession::finish
    pub fn advance(&mut self, next: SessionState) -> ExportResult<()> {
        if next.is_terminal() || !self.state.can_transition_to(next) {
            return Err(ExportError::session(format!(
                "illegal transition {} -> {}",
                self.state, next
            )));
        }
        tracing::debug!(session = %self.id, from = %self.state, to = %next, "Session transition");
        self.state = next;
        Ok(())
    }

    /// Enter a terminal state and delete the working directory.
    pub fn finish(mut self, outcome: SessionState) -> ExportResult<()> {
        if !outcome.is_terminal() || !self.state.can_transition_to(outcome) {
            return Err(ExportError::session(format!(
                "illegal terminal transition {} -> {}",
                self.state, outcome
            )));
        }
        self.state = outcome;
        tracing::info!(
            session = %self.id,
            state = %outcome,
            started_at = %self.started_at,
            elapsed_secs = self.started.elapsed().as_secs_f64(),
            "Export session closed"
        );
        match self.workdir.take() {
            Some(dir) => dir.close().map_err(ExportError::from),
            None => Ok(()),
        }
    }

    /// Fail with `Cancelled` if the session was cancelled.
    pub fn checkpoint(&self) -> ExportResult<()> {
        if self.cancel.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn spec(&self) -> &ExportSpec {
        &self.spec
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_path
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.work_path.join(FRAMES_DIR)
    }

    pub fn segments_dir(&self) -> PathBuf {
        self.work_path.join(SEGMENTS_DIR)
    }
}

impl Drop for ExportSession {
    fn drop(&mut self) {
        if self.workdir.is_some() {
            tracing::warn!(
                session = %self.id,
                state = %self.state,
                "Export session dropped without finishing; removing working directory"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(root: &Path) -> ExportSession {
        let spec = ExportSpec::new(0.0, 1000.0, 30, 64, 64, root.join("out.mp4"));
        ExportSession::open(spec, Some(root), CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_open_creates_layout() {
        let root = tempfile::tempdir().unwrap();
        let session = open(root.path());
        assert_eq!(session.state(), SessionState::Preparing);
        assert_eq!(session.total_frames(), 30);
        assert!(session.frames_dir().is_dir());
        assert!(session.segments_dir().is_dir());
        assert!(session.work_dir().starts_with(root.path()));
    }

    #[test]
    fn test_finish_removes_workdir() {
        let root = tempfile::tempdir().unwrap();
        let mut session = open(root.path());
        let workdir = session.work_dir().to_path_buf();
        session.advance(SessionState::Capturing).unwrap();
        std::fs::write(session.frames_dir().join("frame_000000.png"), b"x").unwrap();

        session.finish(SessionState::Failed).unwrap();
        assert!(!workdir.exists());
    }

    #[test]
    fn test_drop_removes_workdir() {
        let root = tempfile::tempdir().unwrap();
        let session = open(root.path());
        let workdir = session.work_dir().to_path_buf();
        drop(session);
        assert!(!workdir.exists());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut session = open(root.path());
        assert!(matches!(
            session.advance(SessionState::Composing),
            Err(ExportError::Session { .. })
        ));
        assert!(session.advance(SessionState::Completed).is_err());
        assert_eq!(session.state(), SessionState::Preparing);
    }

    #[test]
    fn test_cancel_observed_at_checkpoint() {
        let root = tempfile::tempdir().unwrap();
        let session = open(root.path());
        assert!(session.checkpoint().is_ok());
        session.cancel();
        assert!(session.is_cancelled());
        assert!(matches!(session.checkpoint(), Err(ExportError::Cancelled)));
    }

    #[test]
    fn test_sessions_get_distinct_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = open(root.path());
        let b = open(root.path());
        assert_ne!(a.id(), b.id());
        assert_ne!(a.work_dir(), b.work_dir());
    }
}
