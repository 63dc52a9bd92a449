//! Ballot reinsertion
//!
//! A printed sheet fed back in for review moves through
//! `waiting → loading → validating` and then either leaves the family for
//! `presenting_ballot` or lands in `reinserted_invalid_ballot`, which only
//! the hardware can leave once the sheet is removed. Outside the family there
//! is no reinsertion state at all.

use crate::status::paper::PaperHandlerStatus;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BallotReinsertionState {
    WaitingForBallotReinsertion,
    LoadingReinsertedBallot,
    ValidatingReinsertedBallot,
    /// The sheet is not a ballot for this session (wrong precinct, blank, ...)
    ReinsertedInvalidBallot,
}

impl BallotReinsertionState {
    pub fn from_paper_status(status: PaperHandlerStatus) -> Option<Self> {
        match status {
            PaperHandlerStatus::WaitingForBallotReinsertion => Some(Self::WaitingForBallotReinsertion),
            PaperHandlerStatus::LoadingReinsertedBallot => Some(Self::LoadingReinsertedBallot),
            PaperHandlerStatus::ValidatingReinsertedBallot => Some(Self::ValidatingReinsertedBallot),
            PaperHandlerStatus::ReinsertedInvalidBallot => Some(Self::ReinsertedInvalidBallot),
            _ => None,
        }
    }

    /// Forward steps the hardware is expected to take within the family
    pub fn can_advance_to(self, next: Self) -> bool {
        use BallotReinsertionState::*;
        matches!(
            (self, next),
            (WaitingForBallotReinsertion, LoadingReinsertedBallot)
                | (LoadingReinsertedBallot, ValidatingReinsertedBallot)
                | (ValidatingReinsertedBallot, ReinsertedInvalidBallot)
                | (ReinsertedInvalidBallot, WaitingForBallotReinsertion)
        )
    }

    /// Whether the screen should tell the voter their sheet was rejected
    pub fn is_invalid_sheet(self) -> bool {
        self == Self::ReinsertedInvalidBallot
    }
}

/// How a paper status change relates to the reinsertion flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReinsertionTransition {
    Entered(BallotReinsertionState),
    Advanced {
        from: BallotReinsertionState,
        to: BallotReinsertionState,
    },
    Exited {
        from: BallotReinsertionState,
        to: PaperHandlerStatus,
    },
    /// A step inside the family that the hardware should not take
    Unexpected {
        from: BallotReinsertionState,
        to: BallotReinsertionState,
    },
}

/// Follows the paper status across updates and classifies each change
///
/// Diagnostic only: the screen selector reads the paper status directly, so
/// the tracker never gates a screen. An unexpected step is returned to the
/// caller for logging and the tracker adopts the new state.
#[derive(Debug, Default)]
pub struct BallotReinsertionFlow {
    current: Option<BallotReinsertionState>,
}

impl BallotReinsertionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<BallotReinsertionState> {
        self.current
    }

    pub fn observe(&mut self, status: PaperHandlerStatus) -> Option<ReinsertionTransition> {
        let next = BallotReinsertionState::from_paper_status(status);
        let transition = match (self.current, next) {
            (None, None) => None,
            (None, Some(to)) => Some(ReinsertionTransition::Entered(to)),
            (Some(from), None) => Some(ReinsertionTransition::Exited { from, to: status }),
            (Some(from), Some(to)) if from == to => None,
            (Some(from), Some(to)) if from.can_advance_to(to) => {
                Some(ReinsertionTransition::Advanced { from, to })
            }
            (Some(from), Some(to)) => Some(ReinsertionTransition::Unexpected { from, to }),
        };
        self.current = next;
        transition
    }
}
