//! Render engine interface consumed by frame capture.

use async_trait::async_trait;

/// The animation renderer driven during export.
///
/// Implementations hold a single mutable scene; the pipeline guarantees at
/// most one call is in flight at a time.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Stop any live playback clock so it cannot move the scene.
    async fn pause(&self) -> anyhow::Result<()>;

    /// Jump to `timestamp_ms` and return only once every dependent piece of
    /// state (including externally driven media) reflects that time.
    async fn seek_to(&self, timestamp_ms: f64) -> anyhow::Result<()>;

    /// Rasterize the current scene into a `width * height * 4` RGBA buffer,
    /// row-major.
    async fn capture_pixels(
        &self,
        width: u32,
        height: u32,
        include_overlays: bool,
    ) -> anyhow::Result<Vec<u8>>;

    /// Hint that caches may be dropped to bound peak memory.
    async fn reclaim_resources(&self) {}

    /// Engine name for logs.
    fn name(&self) -> &str;
}
