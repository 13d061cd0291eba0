//! Kinetype Export Engine
//!
//! Deterministic, frame-exact video export for lyric animations. Frames are
//! captured one at a time from a paused render engine, persisted as an image
//! sequence, encoded in fixed-size batches and joined into the final file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! RenderEngine ── seek/snap ──► FrameStore (frames/frame_%06d.png)
//!                                     │
//!                        ┌────────────┼────────────┐
//!                        ▼            ▼            ▼
//!                   batch 0000   batch 0001 ... batch N   (≤ K in flight)
//!                        │            │            │
//!                        └──── segments/segment_%04d.mp4
//!                                     │
//!                           concat (+ audio) ──► output.mp4
//! ```
//!
//! Progress is one monotonic percentage across all phases, and the session
//! working directory is removed whatever the outcome.

pub mod batch_encode;
pub mod capture;
pub mod compose;
pub mod encoder;
pub mod export;
pub mod ffmpeg;
pub mod frame_store;
pub mod gate;
pub mod pattern;
pub mod progress;
pub mod render;
pub mod session;

pub use encoder::{ConcatRequest, EncoderService, SegmentRequest};
pub use export::{estimate, ExportFailure, ExportSettings, Exporter};
pub use ffmpeg::FfmpegEncoder;
pub use pattern::TestPatternEngine;
pub use render::RenderEngine;
