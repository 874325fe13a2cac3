//! Scan workflow state machine.
//!
//! Pure: `transition` only decides the next state. The driver in the parent
//! module performs the I/O and feeds the resulting events back in.

use bodega_core::{PendingConfirmation, ScanResult};

use super::outcome::ScanFailure;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Validating,
    /// A move is in flight. `pending` is set when committing a pallet
    /// confirmation, so an abort or failure can return to it.
    Committing { pending: Option<PendingConfirmation> },
    AwaitingConfirmation(PendingConfirmation),
    Succeeded(ScanResult),
    Failed {
        failure: ScanFailure,
        pending: Option<PendingConfirmation>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    ScanSubmitted,
    ValidationFailed(ScanFailure),
    BoxAccepted,
    PalletAccepted(PendingConfirmation),
    Confirmed,
    IssueReported,
    Cancelled,
    CommitSucceeded(ScanResult),
    CommitFailed(ScanFailure),
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event {event} is not valid in state {state}")]
pub struct TransitionError {
    pub state: &'static str,
    pub event: &'static str,
}

impl ScanState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Committing { .. } => "committing",
            Self::AwaitingConfirmation(_) => "awaitingConfirmation",
            Self::Succeeded(_) => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }

    /// The pallet waiting for the operator, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingConfirmation> {
        match self {
            Self::AwaitingConfirmation(pending) => Some(pending),
            Self::Committing { pending } | Self::Failed { pending, .. } => pending.as_ref(),
            _ => None,
        }
    }

    /// Validating or committing.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Validating | Self::Committing { .. })
    }

    /// Apply `event`, consuming the current state.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when `event` has no edge from this state.
    pub fn transition(self, event: ScanEvent) -> Result<ScanState, TransitionError> {
        use ScanEvent as E;
        use ScanState as S;

        let next = match (self, event) {
            (S::Idle | S::Succeeded(_) | S::Failed { .. }, E::ScanSubmitted) => S::Validating,

            (S::Validating, E::ValidationFailed(failure)) => S::Failed { failure, pending: None },
            (S::Validating, E::BoxAccepted) => S::Committing { pending: None },
            (S::Validating, E::PalletAccepted(pending)) => S::AwaitingConfirmation(pending),

            (S::AwaitingConfirmation(pending) | S::Failed { pending: Some(pending), .. }, E::Confirmed) => {
                S::Committing { pending: Some(pending) }
            }
            (S::AwaitingConfirmation(_) | S::Failed { pending: Some(_), .. }, E::IssueReported | E::Cancelled) => {
                S::Idle
            }

            (S::Committing { .. }, E::CommitSucceeded(result)) => S::Succeeded(result),
            (S::Committing { pending }, E::CommitFailed(failure)) => S::Failed { failure, pending },
            (S::Committing { pending: Some(pending) }, E::Aborted) => S::AwaitingConfirmation(pending),
            (S::Committing { pending: None }, E::Aborted) => S::Idle,

            (S::Succeeded(result), E::Confirmed) => S::Succeeded(result),

            // Dismissing a finished step.
            (S::Idle | S::Succeeded(_) | S::Failed { pending: None, .. }, E::Cancelled) => S::Idle,

            (state, event) => {
                return Err(TransitionError {
                    state: state.name(),
                    event: event.name(),
                })
            }
        };
        Ok(next)
    }
}

impl ScanEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ScanSubmitted => "scanSubmitted",
            Self::ValidationFailed(_) => "validationFailed",
            Self::BoxAccepted => "boxAccepted",
            Self::PalletAccepted(_) => "palletAccepted",
            Self::Confirmed => "confirmed",
            Self::IssueReported => "issueReported",
            Self::Cancelled => "cancelled",
            Self::CommitSucceeded(_) => "commitSucceeded",
            Self::CommitFailed(_) => "commitFailed",
            Self::Aborted => "aborted",
        }
    }
}
