//! Export progress observations.
//!
//! Each phase owns a fixed slice of the overall 0–100 scale:
//!
//! ```text
//! Preparing   0 ──  5
//! Capturing   5 ── 85   (frames captured / total frames)
//! Encoding   85 ── 95   (batches encoded / total batches)
//! Composing  95
//! Finalizing      100   (only after the output file is confirmed)
//! ```

use serde::{Deserialize, Serialize};

/// Non-terminal export phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportPhase {
    Preparing,
    Capturing,
    Encoding,
    Composing,
    Finalizing,
}

impl ExportPhase {
    /// Overall-percentage slice `(low, high)` this phase reports into.
    pub fn range(&self) -> (f64, f64) {
        match self {
            Self::Preparing => (0.0, 5.0),
            Self::Capturing => (5.0, 85.0),
            Self::Encoding => (85.0, 95.0),
            Self::Composing => (95.0, 95.0),
            Self::Finalizing => (100.0, 100.0),
        }
    }

    /// Scale `current / total` into this phase's slice.
    pub fn percent(&self, current: u64, total: u64) -> f64 {
        let (low, high) = self.range();
        if total == 0 {
            return low;
        }
        let fraction = (current as f64 / total as f64).clamp(0.0, 1.0);
        low + (high - low) * fraction
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Capturing => "capturing",
            Self::Encoding => "encoding",
            Self::Composing => "composing",
            Self::Finalizing => "finalizing",
        }
    }
}

/// One progress observation delivered to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProgress {
    /// Active phase.
    pub phase: ExportPhase,

    /// Overall progress in `[0, 100]`, never decreasing within a session.
    pub percent: f64,

    /// Items finished in the active phase (frames or batches).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,

    /// Items the active phase will process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    /// Human-readable status line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExportProgress {
    /// Progress at the start of `phase` with no counters.
    pub fn at_phase_start(phase: ExportPhase) -> Self {
        Self {
            phase,
            percent: phase.range().0,
            current: None,
            total: None,
            message: None,
        }
    }

    /// Progress for `current` of `total` items in `phase`.
    pub fn counted(phase: ExportPhase, current: u64, total: u64) -> Self {
        Self {
            phase,
            percent: phase.percent(current, total),
            current: Some(current),
            total: Some(total),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
