//! Deterministic test-pattern render engine.
//!
//! Renders a colour field that drifts with time plus a playhead bar sweeping
//! across once per second. Pixels are a pure function of the timestamp, so
//! two captures at the same time are byte-identical. Used by the CLI to
//! exercise the full pipeline without the desktop renderer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::render::RenderEngine;

/// Period of the playhead sweep (ms).
const SWEEP_MS: f64 = 1000.0;

/// Overlay border thickness (px).
const OVERLAY_BORDER: u32 = 2;

#[derive(Debug, Default)]
pub struct TestPatternEngine {
    current_ms: Mutex<f64>,
    paused: AtomicBool,
    reclaims: AtomicU64,
}

impl TestPatternEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reclamation hints received.
    pub fn reclaim_count(&self) -> u64 {
        self.reclaims.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Render the frame for `timestamp_ms`.
    pub fn render(timestamp_ms: f64, width: u32, height: u32, include_overlays: bool) -> Vec<u8> {
        let mut buf = vec![0u8; width as usize * height as usize * 4];
        let phase = (timestamp_ms.rem_euclid(SWEEP_MS)) / SWEEP_MS;
        let playhead = (phase * width as f64) as u32;
        let drift = ((timestamp_ms / 40.0) as u64 % 256) as u8;

        for y in 0..height {
            for x in 0..width {
                let offset = (y as usize * width as usize + x as usize) * 4;
                let pixel = &mut buf[offset..offset + 4];
                let on_playhead = x.abs_diff(playhead) <= 1;
                let on_border = include_overlays
                    && (x < OVERLAY_BORDER
                        || y < OVERLAY_BORDER
                        || x >= width.saturating_sub(OVERLAY_BORDER)
                        || y >= height.saturating_sub(OVERLAY_BORDER));

                let rgba = if on_border {
                    [255, 0, 64, 255]
                } else if on_playhead {
                    [255, 255, 255, 255]
                } else {
                    [
                        (x * 255 / width.max(1)) as u8,
                        (y * 255 / height.max(1)) as u8,
                        drift,
                        255,
                    ]
                };
                pixel.copy_from_slice(&rgba);
            }
        }
        buf
    }
}

#[async_trait]
impl RenderEngine for TestPatternEngine {
    async fn pause(&self) -> anyhow::Result<()> {
        self.paused.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn seek_to(&self, timestamp_ms: f64) -> anyhow::Result<()> {
        if !timestamp_ms.is_finite() {
            anyhow::bail!("cannot seek to {timestamp_ms}");
        }
        let mut current = self
            .current_ms
            .lock()
            .map_err(|_| anyhow::anyhow!("pattern clock poisoned"))?;
        *current = timestamp_ms;
        Ok(())
    }

    async fn capture_pixels(
        &self,
        width: u32,
        height: u32,
        include_overlays: bool,
    ) -> anyhow::Result<Vec<u8>> {
        let timestamp_ms = *self
            .current_ms
            .lock()
            .map_err(|_| anyhow::anyhow!("pattern clock poisoned"))?;
        let frame = tokio::task::spawn_blocking(move || {
            Self::render(timestamp_ms, width, height, include_overlays)
        })
        .await?;
        Ok(frame)
    }

    async fn reclaim_resources(&self) {
        self.reclaims.fetch_add(1, Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        "test-pattern"
    }
}
