//! Screen selection
//!
//! [`select`] maps a snapshot of every status source to exactly one
//! [`Screen`]. The decision is an ordered table of named rules
//! ([`PRECEDENCE`]); the first rule that returns `Some` wins and the last rule
//! always matches. Selection is pure: timers and mutations live in the
//! session layer.

use crate::config::KioskConfig;
use crate::screen::poll_worker::poll_worker_screen;
use crate::screen::reinsertion::BallotReinsertionState;
use crate::screen::{ElectionManagerScreen, Screen, VoterPage};
use crate::session::store::SessionSnapshot;
use crate::status::auth::{AuthStatus, LoggedOutReason, Role};
use crate::status::election_config::ElectionConfig;
use crate::status::paper::{PaperFamily, PaperHandlerStatus};
use crate::types::DevicePresence;

/// Everything the selector looks at; `None` means the source is still loading
#[derive(Debug, Clone, PartialEq)]
pub struct KioskSnapshot {
    pub auth: Option<AuthStatus>,
    pub paper_status: Option<PaperHandlerStatus>,
    pub election: Option<ElectionConfig>,
    pub devices: Option<DevicePresence>,
    pub session: SessionSnapshot,
    pub low_battery_threshold: f64,
}

impl Default for KioskSnapshot {
    fn default() -> Self {
        Self {
            auth: None,
            paper_status: None,
            election: None,
            devices: None,
            session: SessionSnapshot::default(),
            low_battery_threshold: KioskConfig::default().low_battery_threshold,
        }
    }
}

impl KioskSnapshot {
    /// Borrow every source, or `None` while any is unresolved
    pub fn resolve(&self) -> Option<Resolved<'_>> {
        if !self.session.initialized_from_storage {
            return None;
        }
        Some(Resolved {
            auth: self.auth.as_ref()?,
            paper: self.paper_status?,
            election: self.election.as_ref()?,
            devices: self.devices.as_ref()?,
            session: &self.session,
            low_battery_threshold: self.low_battery_threshold,
        })
    }
}

/// A snapshot with every source present
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub auth: &'a AuthStatus,
    pub paper: PaperHandlerStatus,
    pub election: &'a ElectionConfig,
    pub devices: &'a DevicePresence,
    pub session: &'a SessionSnapshot,
    pub low_battery_threshold: f64,
}

impl Resolved<'_> {
    fn is_configured(&self) -> bool {
        self.election.is_configured()
    }
}

/// One row of the precedence table
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&Resolved<'_>) -> Option<Screen>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Highest precedence first
pub const PRECEDENCE: &[Rule] = &[
    Rule { name: "card_reader_missing", apply: card_reader_missing },
    Rule { name: "paper_handler_missing", apply: paper_handler_missing },
    Rule { name: "cover_open", apply: cover_open },
    Rule { name: "presenting_ballot", apply: presenting_ballot },
    Rule { name: "card_backwards", apply: card_backwards },
    Rule { name: "low_battery", apply: low_battery },
    Rule { name: "checking_pin", apply: checking_pin },
    Rule { name: "vendor", apply: vendor },
    Rule { name: "system_administrator", apply: system_administrator },
    Rule { name: "election_manager", apply: election_manager },
    Rule { name: "unrecoverable_error", apply: unrecoverable_error },
    Rule { name: "paper_jam", apply: paper_jam },
    Rule { name: "poll_worker_auth_ended", apply: poll_worker_auth_ended },
    Rule { name: "wrong_election", apply: wrong_election },
    Rule { name: "ballot_box", apply: ballot_box },
    Rule { name: "ballot_review", apply: ballot_review },
    Rule { name: "poll_worker", apply: poll_worker },
    Rule { name: "post_voting_instructions", apply: post_voting_instructions },
    Rule { name: "voter_flow", apply: voter_flow },
    Rule { name: "insert_card", apply: insert_card },
    Rule { name: "unconfigured", apply: unconfigured },
];

pub fn select(snapshot: &KioskSnapshot) -> Screen {
    let Some(resolved) = snapshot.resolve() else {
        return Screen::Loading;
    };
    PRECEDENCE
        .iter()
        .find_map(|rule| (rule.apply)(&resolved))
        .unwrap_or(Screen::Unconfigured)
}

/// Names of every rule that would match, in precedence order
pub fn matching_rules(snapshot: &KioskSnapshot) -> Vec<&'static str> {
    match snapshot.resolve() {
        Some(resolved) => PRECEDENCE
            .iter()
            .filter(|rule| (rule.apply)(&resolved).is_some())
            .map(|rule| rule.name)
            .collect(),
        None => Vec::new(),
    }
}

// =============================================================================
// HARDWARE
// =============================================================================

fn card_reader_missing(s: &Resolved<'_>) -> Option<Screen> {
    s.auth
        .is_logged_out_with(LoggedOutReason::NoCardReader)
        .then_some(Screen::SetupCardReader)
}

fn paper_handler_missing(s: &Resolved<'_>) -> Option<Screen> {
    (s.paper == PaperHandlerStatus::NoHardware).then_some(Screen::NoPaperHandler)
}

fn cover_open(s: &Resolved<'_>) -> Option<Screen> {
    (s.paper == PaperHandlerStatus::CoverOpenUnauthorized).then_some(Screen::CoverOpenAlarm)
}

// A voter who just printed must be able to review regardless of the card.
fn presenting_ballot(s: &Resolved<'_>) -> Option<Screen> {
    (s.paper == PaperHandlerStatus::PresentingBallot).then_some(Screen::ValidateBallot)
}

fn card_backwards(s: &Resolved<'_>) -> Option<Screen> {
    s.auth
        .is_logged_out_with(LoggedOutReason::CardError)
        .then_some(Screen::CardBackwards)
}

fn low_battery(s: &Resolved<'_>) -> Option<Screen> {
    s.devices
        .is_low_battery(s.low_battery_threshold)
        .then_some(Screen::SetupPower)
}

// =============================================================================
// OPERATORS
// =============================================================================

fn checking_pin(s: &Resolved<'_>) -> Option<Screen> {
    matches!(s.auth, AuthStatus::CheckingPin { .. }).then_some(Screen::UnlockMachine)
}

fn vendor(s: &Resolved<'_>) -> Option<Screen> {
    matches!(s.auth.role(), Some(Role::Vendor)).then_some(Screen::Vendor)
}

fn system_administrator(s: &Resolved<'_>) -> Option<Screen> {
    matches!(s.auth.role(), Some(Role::SystemAdministrator)).then(|| Screen::SystemAdministrator {
        is_machine_configured: s.election.election_definition.is_some(),
        can_reset_polls_to_paused: s.election.polls_state.can_reset_to_paused(),
    })
}

fn election_manager(s: &Resolved<'_>) -> Option<Screen> {
    if !matches!(s.auth.role(), Some(Role::ElectionManager)) {
        return None;
    }
    let menu = match &s.election.election_definition {
        None => ElectionManagerScreen::Unconfigured,
        Some(definition) => {
            let loaded_election = definition.election_key();
            match s.auth.card_election_key() {
                Some(card_election) if *card_election != loaded_election => {
                    ElectionManagerScreen::ReplaceElection {
                        card_election: card_election.clone(),
                        loaded_election,
                    }
                }
                _ => ElectionManagerScreen::Menu,
            }
        }
    };
    Some(Screen::ElectionManager(menu))
}

// =============================================================================
// PAPER HANDLER FAULTS
// =============================================================================

fn unrecoverable_error(s: &Resolved<'_>) -> Option<Screen> {
    (s.paper == PaperHandlerStatus::UnrecoverableError).then_some(Screen::UnrecoverableError)
}

fn paper_jam(s: &Resolved<'_>) -> Option<Screen> {
    if s.paper == PaperHandlerStatus::Jammed {
        return Some(Screen::Jammed {
            votes_present: s.session.has_votes(),
        });
    }
    s.paper
        .is_jam_cleared()
        .then_some(Screen::JamCleared { status: s.paper })
}

// The poll worker pulled their card before the voter session was fully set up.
fn poll_worker_auth_ended(s: &Resolved<'_>) -> Option<Screen> {
    let auth_lost = s.auth.is_cardless_voter() || s.auth.logged_out_reason().is_some();
    (s.paper == PaperHandlerStatus::PollWorkerAuthEndedUnexpectedly
        || (s.paper.requires_poll_worker_auth() && auth_lost))
        .then_some(Screen::PollWorkerAuthEndedUnexpectedly)
}

// =============================================================================
// CONFIGURED MACHINE
// =============================================================================

fn wrong_election(s: &Resolved<'_>) -> Option<Screen> {
    if !s.is_configured() {
        return None;
    }
    match s.auth.logged_out_reason()? {
        LoggedOutReason::PollWorkerWrongElection => Some(Screen::WrongElection {
            poll_worker_card: true,
        }),
        LoggedOutReason::WrongElection => Some(Screen::WrongElection {
            poll_worker_card: false,
        }),
        _ => None,
    }
}

fn ballot_box(s: &Resolved<'_>) -> Option<Screen> {
    if !s.is_configured() {
        return None;
    }
    match s.paper {
        PaperHandlerStatus::EmptyBallotBox => Some(Screen::EmptyBallotBox),
        PaperHandlerStatus::EjectingToRear => Some(Screen::CastingBallot),
        PaperHandlerStatus::BallotAccepted | PaperHandlerStatus::ResettingStateMachineAfterSuccess => {
            Some(Screen::BallotCast)
        }
        _ => None,
    }
}

fn ballot_review(s: &Resolved<'_>) -> Option<Screen> {
    if !s.is_configured() || !(s.auth.is_poll_worker() || s.auth.is_cardless_voter()) {
        return None;
    }
    match s.paper {
        PaperHandlerStatus::BlankPageInterpretation => Some(Screen::BlankPageInterpretation),
        PaperHandlerStatus::WaitingForInvalidatedBallotConfirmationPaperPresent => {
            Some(Screen::BallotInvalidated { paper_present: true })
        }
        PaperHandlerStatus::WaitingForInvalidatedBallotConfirmationPaperAbsent => {
            Some(Screen::BallotInvalidated {
                paper_present: false,
            })
        }
        _ => None,
    }
}

fn poll_worker(s: &Resolved<'_>) -> Option<Screen> {
    if !s.is_configured() || !s.auth.is_poll_worker() {
        return None;
    }
    Some(Screen::PollWorker(poll_worker_screen(
        s.auth.poll_worker_activation(),
        s.paper,
        s.election.polls_state,
        s.session,
    )))
}

fn post_voting_instructions(s: &Resolved<'_>) -> Option<Screen> {
    (s.is_configured() && s.election.polls_state.is_open() && s.session.show_post_voting_instructions)
        .then_some(Screen::PostVotingInstructions)
}

fn voter_flow(s: &Resolved<'_>) -> Option<Screen> {
    if !s.is_configured() || !s.election.polls_state.is_open() {
        return None;
    }
    let voter = s.auth.cardless_voter()?;
    // Paper status lags the hand-off; wait until a sheet is actually loading.
    if matches!(
        s.paper,
        PaperHandlerStatus::AcceptingPaper | PaperHandlerStatus::NotAcceptingPaper
    ) {
        return None;
    }
    Some(Screen::VoterFlow {
        ballot_style_id: voter.ballot_style_id.clone(),
        precinct_id: voter.precinct_id.clone(),
        page: voter_page(s),
        still_voting_prompt: s.session.still_voting_prompt,
        is_live_mode: s.session.is_live_mode,
    })
}

fn voter_page(s: &Resolved<'_>) -> VoterPage {
    if let Some(state) = BallotReinsertionState::from_paper_status(s.paper) {
        return VoterPage::Reinsertion(state);
    }
    match s.paper.family() {
        PaperFamily::Printing => VoterPage::PrintingBallot,
        _ if s.paper == PaperHandlerStatus::PatDeviceConnected => VoterPage::PatDeviceCalibration,
        _ if s.session.has_votes() => VoterPage::MarkingBallot,
        _ => VoterPage::StartVoting,
    }
}

fn insert_card(s: &Resolved<'_>) -> Option<Screen> {
    s.is_configured()
        .then(|| Screen::insert_card(s.election.polls_state))
}

fn unconfigured(_: &Resolved<'_>) -> Option<Screen> {
    Some(Screen::Unconfigured)
}
