//! Pipeline lifecycle states with validated transitions.
//!
//! Upload: Received -> Validating -> Valid -> Extracting -> Extracted -> Stored
//!                                                      \-> ExtractionFailed -> StoredWithoutAnalysis
//!                                \-> Invalid -> Rejected
//!
//! Export: Requested -> [Estimating ->] Rendering -> Delivered | Failed

use serde::Serialize;

use super::error::{AppError, Result};

/// Lifecycle of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Received,
    Validating,
    Valid,
    Invalid,
    Extracting,
    Extracted,
    ExtractionFailed,
    Stored,
    StoredWithoutAnalysis,
    Rejected,
}

impl UploadState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Stored | Self::StoredWithoutAnalysis | Self::Rejected
        )
    }
}

/// Lifecycle of one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Requested,
    Estimating,
    Rendering,
    Delivered,
    Failed,
}

impl ExportState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

/// States that know their own legal successors.
pub trait Lifecycle: Copy + std::fmt::Debug + PartialEq {
    /// Whether `self -> to` is an allowed transition.
    fn can_transition(self, to: Self) -> bool;
}

impl Lifecycle for UploadState {
    fn can_transition(self, to: Self) -> bool {
        use UploadState::{
            Extracted, Extracting, ExtractionFailed, Invalid, Received, Rejected, Stored,
            StoredWithoutAnalysis, Valid, Validating,
        };
        matches!(
            (self, to),
            (Received, Validating)
                | (Validating, Valid | Invalid)
                | (Valid, Extracting)
                | (Extracting, Extracted | ExtractionFailed)
                | (Extracted, Stored)
                | (ExtractionFailed, StoredWithoutAnalysis)
                | (Invalid, Rejected)
        )
    }
}

impl Lifecycle for ExportState {
    fn can_transition(self, to: Self) -> bool {
        use ExportState::{Delivered, Estimating, Failed, Rendering, Requested};
        matches!(
            (self, to),
            (Requested, Estimating | Rendering | Failed)
                | (Estimating, Rendering | Failed)
                | (Rendering, Delivered | Failed)
        )
    }
}

/// Tracks the current state of one request and rejects illegal moves.
#[derive(Debug, Clone)]
pub struct Tracker<S: Lifecycle> {
    label: String,
    state: S,
}

impl<S: Lifecycle> Tracker<S> {
    /// Start tracking a request in its initial state.
    pub fn new(label: impl Into<String>, initial: S) -> Self {
        Self {
            label: label.into(),
            state: initial,
        }
    }

    /// Current state.
    pub fn state(&self) -> S {
        self.state
    }

    /// Move to `to`.
    ///
    /// # Errors
    /// Returns error if the transition is not allowed from the current state.
    pub fn advance(&mut self, to: S) -> Result<()> {
        if !self.state.can_transition(to) {
            return Err(AppError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{to:?}"),
            });
        }
        tracing::debug!(request = %self.label, from = ?self.state, to = ?to, "State transition");
        self.state = to;
        Ok(())
    }
}
