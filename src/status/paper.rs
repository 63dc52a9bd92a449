//! Paper-handler status as reported by the hardware collaborator
//!
//! This layer only observes these values; every transition between them is
//! driven by the paper handler itself.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperHandlerStatus {
    NotAcceptingPaper,
    AcceptingPaper,
    LoadingPaper,
    LoadingNewSheet,
    ValidatingNewSheet,
    InsertedInvalidNewSheet,
    InsertedPreprintedBallot,
    WaitingForBallotData,
    PrintingBallot,
    Scanning,
    Interpreting,
    PresentingBallot,
    BlankPageInterpretation,
    PaperReloaded,
    EjectingToFront,
    EjectingToRear,
    #[serde(rename = "waiting_for_invalidated_ballot_confirmation.paper_present")]
    WaitingForInvalidatedBallotConfirmationPaperPresent,
    #[serde(rename = "waiting_for_invalidated_ballot_confirmation.paper_absent")]
    WaitingForInvalidatedBallotConfirmationPaperAbsent,
    Jammed,
    JamCleared,
    ResettingStateMachineAfterJam,
    AcceptingPaperAfterJam,
    LoadingPaperAfterJam,
    WaitingForBallotReinsertion,
    LoadingReinsertedBallot,
    ValidatingReinsertedBallot,
    ReinsertedInvalidBallot,
    CoverOpenUnauthorized,
    PollWorkerAuthEndedUnexpectedly,
    PaperHandlerDiagnostic,
    PatDeviceConnected,
    BallotAccepted,
    ResettingStateMachineAfterSuccess,
    EmptyBallotBox,
    UnrecoverableError,
    NoHardware,
}

/// Grouping of paper-handler statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperFamily {
    Idle,
    AcceptingPaper,
    Loading,
    Printing,
    Presenting,
    Ejecting,
    Invalidation,
    Jam,
    Reinsertion,
    Alarm,
    Diagnostic,
    Terminal,
}

impl PaperHandlerStatus {
    /// Every status, in declaration order
    pub const ALL: [PaperHandlerStatus; 36] = {
        use PaperHandlerStatus::*;
        [
            NotAcceptingPaper,
            AcceptingPaper,
            LoadingPaper,
            LoadingNewSheet,
            ValidatingNewSheet,
            InsertedInvalidNewSheet,
            InsertedPreprintedBallot,
            WaitingForBallotData,
            PrintingBallot,
            Scanning,
            Interpreting,
            PresentingBallot,
            BlankPageInterpretation,
            PaperReloaded,
            EjectingToFront,
            EjectingToRear,
            WaitingForInvalidatedBallotConfirmationPaperPresent,
            WaitingForInvalidatedBallotConfirmationPaperAbsent,
            Jammed,
            JamCleared,
            ResettingStateMachineAfterJam,
            AcceptingPaperAfterJam,
            LoadingPaperAfterJam,
            WaitingForBallotReinsertion,
            LoadingReinsertedBallot,
            ValidatingReinsertedBallot,
            ReinsertedInvalidBallot,
            CoverOpenUnauthorized,
            PollWorkerAuthEndedUnexpectedly,
            PaperHandlerDiagnostic,
            PatDeviceConnected,
            BallotAccepted,
            ResettingStateMachineAfterSuccess,
            EmptyBallotBox,
            UnrecoverableError,
            NoHardware,
        ]
    };

    // No wildcard arm: a new status must be placed in a family here.
    pub fn family(self) -> PaperFamily {
        use PaperHandlerStatus::*;
        match self {
            NotAcceptingPaper => PaperFamily::Idle,
            AcceptingPaper => PaperFamily::AcceptingPaper,
            LoadingPaper
            | LoadingNewSheet
            | ValidatingNewSheet
            | InsertedInvalidNewSheet
            | InsertedPreprintedBallot
            | WaitingForBallotData => PaperFamily::Loading,
            PrintingBallot | Scanning | Interpreting => PaperFamily::Printing,
            PresentingBallot | BlankPageInterpretation | PaperReloaded => PaperFamily::Presenting,
            EjectingToFront | EjectingToRear => PaperFamily::Ejecting,
            WaitingForInvalidatedBallotConfirmationPaperPresent
            | WaitingForInvalidatedBallotConfirmationPaperAbsent => PaperFamily::Invalidation,
            Jammed
            | JamCleared
            | ResettingStateMachineAfterJam
            | AcceptingPaperAfterJam
            | LoadingPaperAfterJam => PaperFamily::Jam,
            WaitingForBallotReinsertion
            | LoadingReinsertedBallot
            | ValidatingReinsertedBallot
            | ReinsertedInvalidBallot => PaperFamily::Reinsertion,
            CoverOpenUnauthorized | PollWorkerAuthEndedUnexpectedly => PaperFamily::Alarm,
            PaperHandlerDiagnostic | PatDeviceConnected => PaperFamily::Diagnostic,
            BallotAccepted
            | ResettingStateMachineAfterSuccess
            | EmptyBallotBox
            | UnrecoverableError
            | NoHardware => PaperFamily::Terminal,
        }
    }

    pub fn is_reinsertion(self) -> bool {
        self.family() == PaperFamily::Reinsertion
    }

    /// Jam recovery in progress (the jam itself is not included)
    pub fn is_jam_cleared(self) -> bool {
        self.family() == PaperFamily::Jam && self != PaperHandlerStatus::Jammed
    }

    /// States in which the poll worker must keep their card inserted until
    /// the voter session has fully started
    pub fn requires_poll_worker_auth(self) -> bool {
        use PaperHandlerStatus::*;
        matches!(
            self,
            InsertedInvalidNewSheet
                | InsertedPreprintedBallot
                | LoadingNewSheet
                | LoadingPaper
                | ValidatingNewSheet
        )
    }

    pub fn as_str(self) -> &'static str {
        use PaperHandlerStatus::*;
        match self {
            NotAcceptingPaper => "not_accepting_paper",
            AcceptingPaper => "accepting_paper",
            LoadingPaper => "loading_paper",
            LoadingNewSheet => "loading_new_sheet",
            ValidatingNewSheet => "validating_new_sheet",
            InsertedInvalidNewSheet => "inserted_invalid_new_sheet",
            InsertedPreprintedBallot => "inserted_preprinted_ballot",
            WaitingForBallotData => "waiting_for_ballot_data",
            PrintingBallot => "printing_ballot",
            Scanning => "scanning",
            Interpreting => "interpreting",
            PresentingBallot => "presenting_ballot",
            BlankPageInterpretation => "blank_page_interpretation",
            PaperReloaded => "paper_reloaded",
            EjectingToFront => "ejecting_to_front",
            EjectingToRear => "ejecting_to_rear",
            WaitingForInvalidatedBallotConfirmationPaperPresent => {
                "waiting_for_invalidated_ballot_confirmation.paper_present"
            }
            WaitingForInvalidatedBallotConfirmationPaperAbsent => {
                "waiting_for_invalidated_ballot_confirmation.paper_absent"
            }
            Jammed => "jammed",
            JamCleared => "jam_cleared",
            ResettingStateMachineAfterJam => "resetting_state_machine_after_jam",
            AcceptingPaperAfterJam => "accepting_paper_after_jam",
            LoadingPaperAfterJam => "loading_paper_after_jam",
            WaitingForBallotReinsertion => "waiting_for_ballot_reinsertion",
            LoadingReinsertedBallot => "loading_reinserted_ballot",
            ValidatingReinsertedBallot => "validating_reinserted_ballot",
            ReinsertedInvalidBallot => "reinserted_invalid_ballot",
            CoverOpenUnauthorized => "cover_open_unauthorized",
            PollWorkerAuthEndedUnexpectedly => "poll_worker_auth_ended_unexpectedly",
            PaperHandlerDiagnostic => "paper_handler_diagnostic",
            PatDeviceConnected => "pat_device_connected",
            BallotAccepted => "ballot_accepted",
            ResettingStateMachineAfterSuccess => "resetting_state_machine_after_success",
            EmptyBallotBox => "empty_ballot_box",
            UnrecoverableError => "unrecoverable_error",
            NoHardware => "no_hardware",
        }
    }
}

impl fmt::Display for PaperHandlerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
