//! Voter session lifecycle
//!
//! [`SessionLifecycleController`] is the only component that issues
//! mutations to the backend and the only writer of the [`VotingSession`].
//! Backend failures are returned unchanged; nothing here retries.

use crate::backend::{Backend, STATE_KEY, Storage};
use crate::config::KioskConfig;
use crate::session::store::{PersistedSessionState, VotingSession};
use crate::status::auth::{AuthStatus, CardlessVoterUser};
use crate::status::election_config::{ElectionConfig, ElectionConfigSource};
use crate::types::{BallotStyleId, ContestId, PollsState, PrecinctId, PrecinctSelection, Vote};
use crate::{Error, Result, session_error};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct SessionLifecycleController {
    backend: Arc<dyn Backend>,
    storage: Arc<dyn Storage>,
    session: VotingSession,
    election: ElectionConfigSource,
    vote_save_delay: Duration,
}

impl SessionLifecycleController {
    pub fn new(backend: Arc<dyn Backend>, storage: Arc<dyn Storage>, config: &KioskConfig) -> Self {
        Self {
            backend,
            storage,
            session: VotingSession::new(),
            election: ElectionConfigSource::new(),
            vote_save_delay: config.vote_save_delay(),
        }
    }

    pub fn session(&self) -> &VotingSession {
        &self.session
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Last fetched election configuration, if still valid
    pub fn election_config(&self) -> Option<&ElectionConfig> {
        self.election.cached()
    }

    pub async fn load_election_config(&mut self) -> Result<ElectionConfig> {
        self.election
            .load(self.backend.as_ref(), self.storage.as_ref())
            .await
    }

    pub async fn refresh_election_config(&mut self) -> Result<ElectionConfig> {
        self.election
            .refresh(self.backend.as_ref(), self.storage.as_ref())
            .await
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Restore session metadata written before the last restart
    ///
    /// A stored value that no longer parses is discarded rather than failing
    /// startup.
    pub async fn hydrate(&mut self) -> Result<()> {
        let stored = self
            .storage
            .get(STATE_KEY)
            .await
            .map_err(|e| Error::storage(format!("reading {STATE_KEY}: {e}")))?;
        let persisted = match stored {
            Some(value) => match serde_json::from_value::<PersistedSessionState>(value) {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::warn!("⚠️  Discarding unreadable persisted session state: {}", e);
                    None
                }
            },
            None => None,
        };

        self.session.hydrate(persisted);
        tracing::info!(
            "📦 Session hydrated: ballots_printed={}, live_mode={}, votes={}",
            self.session.ballots_printed_count(),
            self.session.is_live_mode(),
            self.session.votes().len()
        );
        Ok(())
    }

    /// Write the session to storage if anything is due; returns whether it did
    pub async fn persist_if_dirty(&mut self) -> Result<bool> {
        let now = Instant::now();
        if !self.session.persist_due(now, self.vote_save_delay) {
            return Ok(false);
        }
        let value = serde_json::to_value(self.session.persisted_state())?;
        self.storage
            .set(STATE_KEY, value)
            .await
            .map_err(|e| Error::storage(format!("writing {STATE_KEY}: {e}")))?;
        self.session.mark_persisted(now);
        tracing::trace!("Session state persisted");
        Ok(true)
    }

    // =========================================================================
    // VOTER SESSION
    // =========================================================================

    /// Activate a cardless voter session
    ///
    /// The paper handler is put into accepting state first; the backend
    /// session is only started once that succeeds, and the session is only
    /// marked active locally once both succeed.
    pub async fn start_session(
        &mut self,
        precinct_id: &PrecinctId,
        ballot_style_id: &BallotStyleId,
    ) -> Result<()> {
        let config = self
            .election
            .cached()
            .ok_or_else(|| session_error!("Cannot start a voter session before the election is loaded"))?;
        let definition = config
            .election_definition
            .as_ref()
            .ok_or_else(|| session_error!("Cannot start a voter session on an unconfigured machine"))?;

        if definition.election.precinct(precinct_id).is_none() {
            return Err(Error::validation(format!("precinct_id: unknown precinct {}", precinct_id)));
        }
        if !definition
            .election
            .ballot_style_serves(ballot_style_id, precinct_id)
        {
            return Err(Error::validation(format!(
                "ballot_style_id: {} is not issued in precinct {}",
                ballot_style_id, precinct_id
            )));
        }
        if config
            .precinct_selection
            .as_ref()
            .is_some_and(|selection| !selection.includes(precinct_id))
        {
            return Err(Error::validation(format!(
                "precinct_id: {} is not served by this machine",
                precinct_id
            )));
        }

        self.backend.set_accepting_paper_state().await?;
        self.backend
            .start_cardless_voter_session(precinct_id, ballot_style_id)
            .await?;

        self.session.activate(CardlessVoterUser {
            ballot_style_id: ballot_style_id.clone(),
            precinct_id: precinct_id.clone(),
        });
        tracing::info!(
            "🗳️  Voter session started: session={}, precinct={}, ballot_style={}",
            self.session.session_id(),
            precinct_id,
            ballot_style_id
        );
        Ok(())
    }

    /// Set (or with `None`, clear) the vote for one contest
    pub fn update_vote(&mut self, contest_id: ContestId, vote: Option<Vote>) -> bool {
        self.session.update_vote(contest_id, vote)
    }

    /// Checkpoint the ballot without waiting for the save delay
    pub async fn force_save_vote(&mut self) -> Result<()> {
        self.session.force_save_vote();
        self.persist_if_dirty().await?;
        Ok(())
    }

    /// Discard the ballot locally without contacting the backend
    ///
    /// Callers that still hold a backend voter session go through
    /// [`end_and_reset`](Self::end_and_reset) instead.
    pub fn reset_session(&mut self, show_post_voting_instructions: bool) {
        tracing::info!(
            "🔄 Voter session reset: session={}, show_instructions={}",
            self.session.session_id(),
            show_post_voting_instructions
        );
        self.session.reset(show_post_voting_instructions);
    }

    /// End the backend voter session, then clear the local ballot
    ///
    /// Votes stay in place if the backend call fails.
    pub async fn end_and_reset(&mut self, show_post_voting_instructions: bool) -> Result<()> {
        self.backend.end_cardless_voter_session().await?;
        self.reset_session(show_post_voting_instructions);
        Ok(())
    }

    pub async fn print_ballot(&mut self, pdf_data: &[u8]) -> Result<()> {
        self.backend.print_ballot(pdf_data).await?;
        self.session.record_ballot_printed();
        tracing::info!(
            "🖨️  Ballot printed: session={}, count={}",
            self.session.session_id(),
            self.session.ballots_printed_count()
        );
        Ok(())
    }

    /// Voter accepted the printed ballot
    pub async fn confirm_cast(&mut self) -> Result<()> {
        self.backend.validate_ballot().await?;
        tracing::info!("✅ Ballot cast: session={}", self.session.session_id());
        self.session.reset(true);
        Ok(())
    }

    /// Voter rejected the printed ballot
    pub async fn invalidate_ballot(&mut self) -> Result<()> {
        self.backend.invalidate_ballot().await?;
        tracing::info!("Ballot invalidated by voter: session={}", self.session.session_id());
        Ok(())
    }

    /// Poll worker confirmed the invalidated sheet was removed
    pub async fn confirm_invalidate_ballot(&mut self) -> Result<()> {
        self.backend.confirm_invalidate_ballot().await?;
        self.session.reset(false);
        Ok(())
    }

    pub async fn hide_post_voting_instructions(&mut self) -> Result<()> {
        self.end_and_reset(false).await
    }

    /// Clear the ballot when the card is removed
    ///
    /// Only a transition into a card-absent logout counts, and only after
    /// hydration so restored votes are not wiped at startup. Returns whether
    /// the session was reset.
    pub fn end_session_on_logout(&mut self, previous: &AuthStatus, current: &AuthStatus) -> bool {
        if !self.session.initialized_from_storage() {
            return false;
        }
        if previous.is_card_absent() || !current.is_card_absent() {
            return false;
        }
        tracing::info!(
            "🔒 Card removed ({} → {}), clearing session",
            previous.label(),
            current.label()
        );
        self.session.reset(false);
        true
    }

    // =========================================================================
    // OPERATOR ACTIONS
    // =========================================================================

    pub async fn check_pin(&self, pin: &str) -> Result<()> {
        self.backend.check_pin(pin).await
    }

    fn current_polls_state(&self) -> Result<PollsState> {
        self.election
            .cached()
            .map(|config| config.polls_state)
            .ok_or_else(|| session_error!("Election configuration has not been loaded"))
    }

    pub async fn set_polls_state(&mut self, next: PollsState) -> Result<()> {
        let current = self.current_polls_state()?;
        if !current.can_transition_to(next) {
            return Err(Error::validation(format!(
                "polls_state: cannot move from {} to {}",
                current, next
            )));
        }
        self.backend.set_polls_state(next).await?;
        tracing::info!("📋 Polls state changed: {} → {}", current, next);
        self.refresh_election_config().await?;
        Ok(())
    }

    pub async fn reset_polls_to_paused(&mut self) -> Result<()> {
        let current = self.current_polls_state()?;
        if !current.can_reset_to_paused() {
            return Err(Error::validation(format!(
                "polls_state: cannot reset to paused from {}",
                current
            )));
        }
        self.backend.set_polls_state(PollsState::PollsPaused).await?;
        tracing::info!("📋 Polls reset to paused");
        self.refresh_election_config().await?;
        Ok(())
    }

    pub async fn set_test_mode(&mut self, is_test_mode: bool) -> Result<()> {
        self.backend.set_test_mode(is_test_mode).await?;
        self.session.set_live_mode(!is_test_mode);
        tracing::info!("Test mode set: {}", is_test_mode);
        Ok(())
    }

    pub async fn set_precinct_selection(&mut self, selection: PrecinctSelection) -> Result<()> {
        if let PrecinctSelection::SinglePrecinct { precinct_id } = &selection {
            let known = self
                .election
                .cached()
                .and_then(|config| config.election_definition.as_ref())
                .is_some_and(|definition| definition.election.precinct(precinct_id).is_some());
            if !known {
                return Err(Error::validation(format!("precinct_id: unknown precinct {}", precinct_id)));
            }
        }
        self.backend.set_precinct_selection(&selection).await?;
        self.session.reset_ballots_printed_count();
        self.refresh_election_config().await?;
        Ok(())
    }

    /// Remove the election and everything derived from it
    pub async fn unconfigure_machine(&mut self) -> Result<()> {
        self.backend.unconfigure_machine().await?;
        self.storage.clear().await?;
        self.session.unconfigure();
        tracing::info!("🧹 Machine unconfigured");
        self.refresh_election_config().await?;
        Ok(())
    }

    pub async fn power_down(&self) -> Result<()> {
        tracing::info!("⏻ Requesting power down");
        self.backend.power_down().await
    }

    pub async fn reboot(&self) -> Result<()> {
        tracing::info!("Requesting reboot");
        self.backend.reboot().await
    }
}
