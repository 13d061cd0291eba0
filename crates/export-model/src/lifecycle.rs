//! Export session lifecycle states.

use serde::{Deserialize, Serialize};

use crate::progress::ExportPhase;

/// Where an export session is in its lifecycle.
///
/// The happy path is `Preparing -> Capturing -> Encoding -> Composing ->
/// Finalizing -> Completed`. `Cancelled` and `Failed` are reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Preparing,
    Capturing,
    Encoding,
    Composing,
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// The state that follows this one on the happy path.
    pub fn successor(&self) -> Option<SessionState> {
        match self {
            Self::Preparing => Some(Self::Capturing),
            Self::Capturing => Some(Self::Encoding),
            Self::Encoding => Some(Self::Composing),
            Self::Composing => Some(Self::Finalizing),
            Self::Finalizing => Some(Self::Completed),
            Self::Completed | Self::Cancelled | Self::Failed => None,
        }
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Cancelled | Self::Failed => true,
            other => self.successor() == Some(other),
        }
    }

    /// Progress phase for non-terminal states.
    pub fn phase(&self) -> Option<ExportPhase> {
        match self {
            Self::Preparing => Some(ExportPhase::Preparing),
            Self::Capturing => Some(ExportPhase::Capturing),
            Self::Encoding => Some(ExportPhase::Encoding),
            Self::Composing => Some(ExportPhase::Composing),
            Self::Finalizing => Some(ExportPhase::Finalizing),
            Self::Completed | Self::Cancelled | Self::Failed => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Capturing => "capturing",
            Self::Encoding => "encoding",
            Self::Composing => "composing",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
