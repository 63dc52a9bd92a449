//! Poll-worker screens
//!
//! `menu → voter_session_active → hand-off | reset`. A partly marked ballot
//! left behind by a voter blocks the menu until the poll worker deals with
//! it, so a second session cannot be started on top of it.

use crate::session::store::SessionSnapshot;
use crate::status::auth::CardlessVoterUser;
use crate::status::paper::PaperHandlerStatus;
use crate::types::PollsState;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollWorkerScreen {
    /// Ballot style selection and poll controls
    Menu {
        polls_state: PollsState,
        ballots_printed_count: u32,
        is_live_mode: bool,
    },
    /// A session is activated; waiting for the poll worker to hand off
    VoterSessionActive { voter: CardlessVoterUser },
    /// A voter's ballot is still pending
    SessionInProgress { votes_count: usize },
    /// The poll worker reloaded paper mid-session
    PaperReloaded { votes_selected: bool },
}

pub fn poll_worker_screen(
    activation: Option<&CardlessVoterUser>,
    paper_status: PaperHandlerStatus,
    polls_state: PollsState,
    session: &SessionSnapshot,
) -> PollWorkerScreen {
    if paper_status == PaperHandlerStatus::PaperReloaded {
        return PollWorkerScreen::PaperReloaded {
            votes_selected: session.has_votes(),
        };
    }

    if session.has_votes() && paper_status != PaperHandlerStatus::BlankPageInterpretation {
        return PollWorkerScreen::SessionInProgress {
            votes_count: session.votes_count,
        };
    }

    match activation {
        Some(voter) => PollWorkerScreen::VoterSessionActive {
            voter: voter.clone(),
        },
        None => PollWorkerScreen::Menu {
            polls_state,
            ballots_printed_count: session.ballots_printed_count,
            is_live_mode: session.is_live_mode,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter() -> CardlessVoterUser {
        CardlessVoterUser {
            ballot_style_id: "12".to_string(),
            precinct_id: "23".to_string(),
        }
    }

    fn session(votes_count: usize) -> SessionSnapshot {
        SessionSnapshot {
            initialized_from_storage: true,
            votes_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_menu_without_activation() {
        let screen = poll_worker_screen(
            None,
            PaperHandlerStatus::NotAcceptingPaper,
            PollsState::PollsOpen,
            &session(0),
        );
        assert!(matches!(screen, PollWorkerScreen::Menu { .. }));
    }

    #[test]
    fn test_activated_session_awaits_hand_off() {
        let screen = poll_worker_screen(
            Some(&voter()),
            PaperHandlerStatus::AcceptingPaper,
            PollsState::PollsOpen,
            &session(0),
        );
        assert_eq!(screen, PollWorkerScreen::VoterSessionActive { voter: voter() });
    }

    #[test]
    fn test_pending_ballot_blocks_menu() {
        for activation in [None, Some(voter())] {
            let screen = poll_worker_screen(
                activation.as_ref(),
                PaperHandlerStatus::WaitingForBallotData,
                PollsState::PollsOpen,
                &session(2),
            );
            assert_eq!(screen, PollWorkerScreen::SessionInProgress { votes_count: 2 });
        }
    }

    #[test]
    fn test_blank_page_does_not_block_menu() {
        let screen = poll_worker_screen(
            None,
            PaperHandlerStatus::BlankPageInterpretation,
            PollsState::PollsOpen,
            &session(2),
        );
        assert!(matches!(screen, PollWorkerScreen::Menu { .. }));
    }

    #[test]
    fn test_paper_reloaded() {
        let screen = poll_worker_screen(
            Some(&voter()),
            PaperHandlerStatus::PaperReloaded,
            PollsState::PollsOpen,
            &session(1),
        );
        assert_eq!(screen, PollWorkerScreen::PaperReloaded { votes_selected: true });
    }
}
