//! The screen model
//!
//! A [`Screen`] identifies what the kiosk renders and carries only the data
//! needed to pick copy and affordances; layout is the renderer's concern.

pub mod poll_worker;
pub mod reinsertion;
pub mod selector;

pub use poll_worker::{PollWorkerScreen, poll_worker_screen};
pub use reinsertion::{BallotReinsertionFlow, BallotReinsertionState, ReinsertionTransition};
pub use selector::{KioskSnapshot, PRECEDENCE, Resolved, Rule, matching_rules, select};

use crate::status::paper::PaperHandlerStatus;
use crate::types::{BallotStyleId, ElectionKey, PollsState, PrecinctId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "menu", rename_all = "snake_case")]
pub enum ElectionManagerScreen {
    Menu,
    /// The card belongs to a different election than the one loaded
    ReplaceElection {
        card_election: ElectionKey,
        loaded_election: ElectionKey,
    },
    /// No election loaded yet; offers configuration
    Unconfigured,
}

/// Page within the voter flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "page", content = "state", rename_all = "snake_case")]
pub enum VoterPage {
    Reinsertion(BallotReinsertionState),
    PrintingBallot,
    PatDeviceCalibration,
    StartVoting,
    MarkingBallot,
}

/// Headline and instructions for the insert-card screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsertCardCopy {
    pub headline: &'static str,
    pub instructions: &'static str,
}

impl InsertCardCopy {
    pub fn for_polls_state(polls_state: PollsState) -> Self {
        let (headline, instructions) = match polls_state {
            PollsState::PollsClosedInitial => ("Polls Closed", "Insert Poll Worker card to open."),
            PollsState::PollsOpen => ("Insert Card", "Insert Card to print your official ballot."),
            PollsState::PollsPaused => ("Voting Paused", "Insert Poll Worker card to resume voting."),
            PollsState::PollsClosedFinal => ("Polls Closed", "Voting is complete."),
        };
        Self {
            headline,
            instructions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    /// A source is still in flight; render nothing
    Loading,
    SetupCardReader,
    NoPaperHandler,
    CoverOpenAlarm,
    ValidateBallot,
    CardBackwards,
    SetupPower,
    UnlockMachine,
    Vendor,
    SystemAdministrator {
        is_machine_configured: bool,
        can_reset_polls_to_paused: bool,
    },
    ElectionManager(ElectionManagerScreen),
    UnrecoverableError,
    Jammed {
        votes_present: bool,
    },
    JamCleared {
        status: PaperHandlerStatus,
    },
    PollWorkerAuthEndedUnexpectedly,
    WrongElection {
        poll_worker_card: bool,
    },
    EmptyBallotBox,
    CastingBallot,
    BallotCast,
    BlankPageInterpretation,
    BallotInvalidated {
        paper_present: bool,
    },
    PollWorker(PollWorkerScreen),
    PostVotingInstructions,
    VoterFlow {
        ballot_style_id: BallotStyleId,
        precinct_id: PrecinctId,
        page: VoterPage,
        still_voting_prompt: bool,
        is_live_mode: bool,
    },
    InsertCard {
        polls_state: PollsState,
        copy: InsertCardCopy,
    },
    Unconfigured,
    /// Replaces the whole tree after a failed mutation
    ErrorBoundary {
        message: String,
        restart_available: bool,
        recoverable: bool,
    },
}

impl Screen {
    pub fn insert_card(polls_state: PollsState) -> Self {
        Screen::InsertCard {
            polls_state,
            copy: InsertCardCopy::for_polls_state(polls_state),
        }
    }

    /// Stable identifier for logs and assertions
    pub fn id(&self) -> &'static str {
        match self {
            Screen::Loading => "loading",
            Screen::SetupCardReader => "setup_card_reader",
            Screen::NoPaperHandler => "no_paper_handler",
            Screen::CoverOpenAlarm => "cover_open_alarm",
            Screen::ValidateBallot => "validate_ballot",
            Screen::CardBackwards => "card_backwards",
            Screen::SetupPower => "setup_power",
            Screen::UnlockMachine => "unlock_machine",
            Screen::Vendor => "vendor",
            Screen::SystemAdministrator { .. } => "system_administrator",
            Screen::ElectionManager(ElectionManagerScreen::ReplaceElection { .. }) => "replace_election",
            Screen::ElectionManager(_) => "election_manager",
            Screen::UnrecoverableError => "unrecoverable_error",
            Screen::Jammed { .. } => "jammed",
            Screen::JamCleared { .. } => "jam_cleared",
            Screen::PollWorkerAuthEndedUnexpectedly => "poll_worker_auth_ended_unexpectedly",
            Screen::WrongElection { .. } => "wrong_election",
            Screen::EmptyBallotBox => "empty_ballot_box",
            Screen::CastingBallot => "casting_ballot",
            Screen::BallotCast => "ballot_cast",
            Screen::BlankPageInterpretation => "blank_page_interpretation",
            Screen::BallotInvalidated { .. } => "ballot_invalidated",
            Screen::PollWorker(_) => "poll_worker",
            Screen::PostVotingInstructions => "post_voting_instructions",
            Screen::VoterFlow { .. } => "voter_flow",
            Screen::InsertCard { .. } => "insert_card",
            Screen::Unconfigured => "unconfigured",
            Screen::ErrorBoundary { .. } => "error_boundary",
        }
    }

    pub fn is_voter_flow(&self) -> bool {
        matches!(self, Screen::VoterFlow { .. })
    }

    pub fn is_insert_card(&self) -> bool {
        matches!(self, Screen::InsertCard { .. })
    }
}
