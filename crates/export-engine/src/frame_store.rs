//! On-disk staging of captured frames.
//!
//! One PNG per frame under `<session>/frames/frame_NNNNNN.png`, plus an
//! explicit index → path map. The store only ever grows by appending the
//! next index, so its contents are always a dense prefix `[0, n)` of the
//! frame sequence.

use std::ops::Range;
use std::path::{Path, PathBuf};

use kinetype_common::error::{ExportError, ExportResult};
use kinetype_export_model::spec::BYTES_PER_PIXEL;

/// printf-style name of frame files, as understood by image-sequence encoders.
pub const FRAME_PATTERN: &str = "frame_%06d.png";

/// File name of frame `index`.
pub fn frame_file_name(index: u64) -> String {
    format!("frame_{index:06}.png")
}

/// Check a captured buffer is a complete RGBA frame of the requested size.
pub fn validate_frame(index: u64, width: u32, height: u32, rgba: &[u8]) -> ExportResult<()> {
    let expected = width as u64 * height as u64 * BYTES_PER_PIXEL;
    if rgba.is_empty() {
        return Err(ExportError::capture(index, "render engine returned an empty buffer"));
    }
    if rgba.len() as u64 != expected {
        return Err(ExportError::capture(
            index,
            format!(
                "buffer length {} does not match {width}x{height} RGBA ({expected} bytes)",
                rgba.len()
            ),
        ));
    }
    Ok(())
}

/// Session-scoped frame directory.
#[derive(Debug)]
pub struct FrameStore {
    dir: PathBuf,
    width: u32,
    height: u32,
    frames: Vec<PathBuf>,
}

impl FrameStore {
    /// Create (or reuse) `dir` for frames of the given size.
    pub fn open(dir: impl Into<PathBuf>, width: u32, height: u32) -> ExportResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            width,
            height,
            frames: Vec::new(),
        })
    }

    /// Encode and store frame `index`.
    ///
    /// `index` must be the next frame in sequence. The buffer is validated
    /// before anything touches disk, and a failed write leaves no file behind.
    pub async fn persist(&mut self, index: u64, rgba: Vec<u8>) -> ExportResult<PathBuf> {
        let expected = self.frames_completed();
        if index != expected {
            return Err(ExportError::continuity(format!(
                "frame {index} persisted out of order; next expected frame is {expected}"
            )));
        }
        validate_frame(index, self.width, self.height, &rgba)?;

        let path = self.dir.join(frame_file_name(index));
        let (width, height) = (self.width, self.height);
        let target = path.clone();
        let written = tokio::task::spawn_blocking(move || {
            let result =
                image::save_buffer(&target, &rgba, width, height, image::ExtendedColorType::Rgba8);
            if result.is_err() {
                let _ = std::fs::remove_file(&target);
            }
            result
        })
        .await
        .map_err(|e| ExportError::capture(index, format!("frame writer task failed: {e}")))?;

        written.map_err(|e| {
            ExportError::capture(index, format!("failed to write {}: {e}", path.display()))
        })?;

        tracing::trace!(frame = index, path = %path.display(), "Frame persisted");
        self.frames.push(path.clone());
        Ok(path)
    }

    /// Number of frames stored; also the next index `persist` accepts.
    pub fn frames_completed(&self) -> u64 {
        self.frames.len() as u64
    }

    pub fn path(&self, index: u64) -> Option<&Path> {
        self.frames.get(index as usize).map(PathBuf::as_path)
    }

    /// Ordered paths of a stored frame range.
    pub fn paths(&self, range: Range<u64>) -> ExportResult<Vec<PathBuf>> {
        if range.end > self.frames_completed() || range.start > range.end {
            return Err(ExportError::continuity(format!(
                "frames {}..{} requested but only {} are stored",
                range.start,
                range.end,
                self.frames_completed()
            )));
        }
        Ok(self.frames[range.start as usize..range.end as usize].to_vec())
    }

    /// Full printf-style path pattern of the frame files.
    pub fn pattern(&self) -> PathBuf {
        self.dir.join(FRAME_PATTERN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> Vec<u8> {
        vec![value; (width * height * 4) as usize]
    }

    #[tokio::test]
    async fn test_persist_sequential_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FrameStore::open(tmp.path().join("frames"), 16, 8).unwrap();

        for index in 0..3 {
            let path = store.persist(index, solid(16, 8, index as u8 * 40)).await.unwrap();
            assert!(path.ends_with(frame_file_name(index)));
            assert!(path.exists());
        }

        assert_eq!(store.frames_completed(), 3);
        let decoded = image::open(store.path(1).unwrap()).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (16, 8));
        assert_eq!(decoded.get_pixel(0, 0).0, [40, 40, 40, 40]);
    }

    #[tokio::test]
    async fn test_out_of_order_frame_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FrameStore::open(tmp.path(), 16, 8).unwrap();
        let err = store.persist(1, solid(16, 8, 0)).await.unwrap_err();
        assert!(matches!(err, ExportError::Continuity { .. }));
        assert_eq!(store.frames_completed(), 0);
    }

    #[tokio::test]
    async fn test_short_buffer_rejected_without_touching_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FrameStore::open(tmp.path(), 100, 100).unwrap();

        let err = store.persist(0, vec![0u8; 39_000]).await.unwrap_err();
        assert!(matches!(err, ExportError::Capture { frame: 0, .. }));
        assert_eq!(store.frames_completed(), 0);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);

        // The store is still usable for the same index.
        store.persist(0, solid(100, 100, 7)).await.unwrap();
        assert_eq!(store.frames_completed(), 1);
    }

    #[test]
    fn test_validate_frame_rejects_empty() {
        assert!(matches!(
            validate_frame(4, 10, 10, &[]),
            Err(ExportError::Capture { frame: 4, .. })
        ));
        assert!(validate_frame(4, 10, 10, &[0u8; 400]).is_ok());
    }

    #[tokio::test]
    async fn test_paths_range_bounds() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FrameStore::open(tmp.path(), 16, 16).unwrap();
        for index in 0..4 {
            store.persist(index, solid(16, 16, 1)).await.unwrap();
        }
        let paths = store.paths(1..3).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("frame_000001.png"));
        assert!(store.paths(2..5).is_err());
        assert!(store.pattern().ends_with(FRAME_PATTERN));
    }
}
