//! Kinetype Common Utilities
//!
//! Shared infrastructure for all Kinetype crates:
//! - Error taxonomy and result alias for the export pipeline
//! - Frame clock (frame counts and exact frame timestamps)
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
