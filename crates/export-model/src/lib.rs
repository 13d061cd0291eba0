//! Kinetype Export Model
//!
//! Defines the data contracts of the export pipeline:
//! - **Spec:** What the caller asked for (time range, frame rate, resolution, output)
//! - **Batch:** Contiguous frame ranges encoded into one segment each
//! - **Lifecycle:** Session states and the legal transitions between them
//! - **Progress:** Phase-scoped progress observations reported to the caller
//!
//! Everything here is pure data; the pipeline that acts on it lives in
//! `kinetype-export`.

pub mod batch;
pub mod lifecycle;
pub mod progress;
pub mod spec;

pub use batch::*;
pub use lifecycle::*;
pub use progress::*;
pub use spec::*;
