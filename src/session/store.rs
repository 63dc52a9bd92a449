//! Session-scoped mutable state
//!
//! [`VotingSession`] keeps its fields private; the lifecycle controller is the
//! only writer and goes through the methods below. Everything else reads a
//! [`SessionSnapshot`].

use crate::status::auth::CardlessVoterUser;
use crate::types::{ContestId, Vote, VotesDict};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// The part of the session written under the `state` storage key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSessionState {
    #[serde(default)]
    pub ballots_printed_count: u32,
    #[serde(default)]
    pub is_live_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes: Option<VotesDict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_voter: Option<CardlessVoterUser>,
}

/// Read-only view of the session handed to the screen selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    pub initialized_from_storage: bool,
    pub votes_count: usize,
    pub show_post_voting_instructions: bool,
    pub is_live_mode: bool,
    pub ballots_printed_count: u32,
    /// Set by the idle manager while the "are you still voting?" prompt is up
    pub still_voting_prompt: bool,
}

impl SessionSnapshot {
    pub fn has_votes(&self) -> bool {
        self.votes_count > 0
    }
}

#[derive(Debug)]
pub struct VotingSession {
    session_id: Uuid,
    votes: VotesDict,
    ballots_printed_count: u32,
    is_live_mode: bool,
    show_post_voting_instructions: bool,
    initialized_from_storage: bool,
    active_voter: Option<CardlessVoterUser>,

    last_vote_update_at: Option<Instant>,
    last_vote_save_at: Option<Instant>,
    force_save_vote: bool,
    votes_dirty: bool,
    metadata_dirty: bool,
}

impl Default for VotingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VotingSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            votes: VotesDict::new(),
            ballots_printed_count: 0,
            is_live_mode: false,
            show_post_voting_instructions: false,
            initialized_from_storage: false,
            active_voter: None,
            last_vote_update_at: None,
            last_vote_save_at: None,
            force_save_vote: false,
            votes_dirty: false,
            metadata_dirty: false,
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn votes(&self) -> &VotesDict {
        &self.votes
    }

    pub fn has_votes(&self) -> bool {
        !self.votes.is_empty()
    }

    pub fn ballots_printed_count(&self) -> u32 {
        self.ballots_printed_count
    }

    pub fn is_live_mode(&self) -> bool {
        self.is_live_mode
    }

    pub fn show_post_voting_instructions(&self) -> bool {
        self.show_post_voting_instructions
    }

    pub fn initialized_from_storage(&self) -> bool {
        self.initialized_from_storage
    }

    pub fn active_voter(&self) -> Option<&CardlessVoterUser> {
        self.active_voter.as_ref()
    }

    pub fn snapshot(&self, still_voting_prompt: bool) -> SessionSnapshot {
        SessionSnapshot {
            initialized_from_storage: self.initialized_from_storage,
            votes_count: self.votes.len(),
            show_post_voting_instructions: self.show_post_voting_instructions,
            is_live_mode: self.is_live_mode,
            ballots_printed_count: self.ballots_printed_count,
            still_voting_prompt,
        }
    }

    pub fn persisted_state(&self) -> PersistedSessionState {
        PersistedSessionState {
            ballots_printed_count: self.ballots_printed_count,
            is_live_mode: self.is_live_mode,
            votes: (!self.votes.is_empty()).then(|| self.votes.clone()),
            active_voter: self.active_voter.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Writes (controller only)
    // -------------------------------------------------------------------------

    /// Load persisted state; the store counts as initialized afterwards even
    /// when nothing was stored
    pub(crate) fn hydrate(&mut self, persisted: Option<PersistedSessionState>) {
        if let Some(persisted) = persisted {
            self.ballots_printed_count = persisted.ballots_printed_count;
            self.is_live_mode = persisted.is_live_mode;
            self.votes = persisted.votes.unwrap_or_default();
            self.active_voter = persisted.active_voter;
        }
        self.initialized_from_storage = true;
    }

    /// Returns whether the stored ballot changed
    pub(crate) fn update_vote(&mut self, contest_id: ContestId, vote: Option<Vote>) -> bool {
        let changed = match vote {
            Some(vote) => {
                if self.votes.get(&contest_id) == Some(&vote) {
                    false
                } else {
                    self.votes.insert(contest_id, vote);
                    true
                }
            }
            None => self.votes.remove(&contest_id).is_some(),
        };

        if changed {
            self.votes_dirty = true;
            self.last_vote_update_at = Some(Instant::now());
        }
        changed
    }

    pub(crate) fn force_save_vote(&mut self) {
        self.force_save_vote = true;
    }

    /// Begin a fresh voter session with an empty ballot
    pub(crate) fn activate(&mut self, voter: CardlessVoterUser) {
        self.session_id = Uuid::new_v4();
        self.votes.clear();
        self.show_post_voting_instructions = false;
        self.active_voter = Some(voter);
        self.votes_dirty = true;
        self.metadata_dirty = true;
    }

    /// Discard the voter's ballot
    pub(crate) fn reset(&mut self, show_post_voting_instructions: bool) {
        self.votes.clear();
        self.active_voter = None;
        self.show_post_voting_instructions = show_post_voting_instructions;
        self.force_save_vote = false;
        self.votes_dirty = true;
        self.metadata_dirty = true;
        self.session_id = Uuid::new_v4();
    }

    pub(crate) fn record_ballot_printed(&mut self) {
        self.ballots_printed_count += 1;
        self.metadata_dirty = true;
    }

    /// Changing the mode starts a fresh count
    pub(crate) fn set_live_mode(&mut self, is_live_mode: bool) {
        if self.is_live_mode != is_live_mode {
            self.is_live_mode = is_live_mode;
            self.ballots_printed_count = 0;
            self.metadata_dirty = true;
        }
    }

    /// Called when the operator confirms a new precinct
    pub(crate) fn reset_ballots_printed_count(&mut self) {
        self.ballots_printed_count = 0;
        self.metadata_dirty = true;
    }

    /// Forget everything tied to the previous election
    pub(crate) fn unconfigure(&mut self) {
        self.reset(false);
        self.ballots_printed_count = 0;
        self.is_live_mode = false;
    }

    // -------------------------------------------------------------------------
    // Persistence bookkeeping
    // -------------------------------------------------------------------------

    /// Whether the persisted state should be written now
    ///
    /// Metadata changes are written immediately; ballot changes wait until the
    /// voter has paused for `vote_save_delay`, unless a save was forced.
    pub fn persist_due(&self, now: Instant, vote_save_delay: Duration) -> bool {
        if !self.initialized_from_storage {
            return false;
        }
        if self.metadata_dirty || (self.votes_dirty && self.force_save_vote) {
            return true;
        }
        match (self.votes_dirty, self.last_vote_update_at) {
            (true, Some(updated_at)) => now.saturating_duration_since(updated_at) >= vote_save_delay,
            (true, None) => true,
            (false, _) => false,
        }
    }

    pub(crate) fn mark_persisted(&mut self, now: Instant) {
        self.metadata_dirty = false;
        self.votes_dirty = false;
        self.force_save_vote = false;
        self.last_vote_save_at = Some(now);
    }

    pub fn last_vote_save_at(&self) -> Option<Instant> {
        self.last_vote_save_at
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

    fn vote(candidate: &str) -> Vote {
        Vote::Candidate(vec![candidate.to_string()])
    }

    #[test]
    fn test_update_vote_is_idempotent() {
        let mut session = VotingSession::new();
        session.activate(voter());

        assert!(session.update_vote("mayor".to_string(), Some(vote("alice"))));
        let once = session.votes().clone();

        assert!(!session.update_vote("mayor".to_string(), Some(vote("alice"))));
        assert_eq!(session.votes(), &once);

        assert!(session.update_vote("mayor".to_string(), Some(vote("bob"))));
        assert!(session.update_vote("mayor".to_string(), None));
        assert!(!session.update_vote("mayor".to_string(), None));
        assert!(!session.has_votes());
    }

    #[test]
    fn test_reset_clears_votes_and_sets_instructions_flag() {
        let mut session = VotingSession::new();
        session.activate(voter());
        session.update_vote("mayor".to_string(), Some(vote("alice")));
        let before = session.session_id();

        session.reset(true);
        assert!(session.votes().is_empty());
        assert!(session.show_post_voting_instructions());
        assert!(session.active_voter().is_none());
        assert_ne!(session.session_id(), before);

        session.reset(false);
        assert!(!session.show_post_voting_instructions());
    }

    #[test]
    fn test_ballot_count_survives_voter_sessions() {
        let mut session = VotingSession::new();
        session.record_ballot_printed();
        session.record_ballot_printed();
        session.reset(true);
        session.activate(voter());
        assert_eq!(session.ballots_printed_count(), 2);

        session.set_live_mode(false);
        assert_eq!(session.ballots_printed_count(), 2, "unchanged mode keeps the count");

        session.set_live_mode(true);
        assert_eq!(session.ballots_printed_count(), 0);

        session.record_ballot_printed();
        session.reset_ballots_printed_count();
        assert_eq!(session.ballots_printed_count(), 0);
    }

    #[test]
    fn test_hydrate_restores_persisted_state() {
        let mut session = VotingSession::new();
        assert!(!session.initialized_from_storage());

        let mut votes = VotesDict::new();
        votes.insert("mayor".to_string(), vote("alice"));
        session.hydrate(Some(PersistedSessionState {
            ballots_printed_count: 7,
            is_live_mode: true,
            votes: Some(votes),
            active_voter: Some(voter()),
        }));

        assert!(session.initialized_from_storage());
        assert_eq!(session.ballots_printed_count(), 7);
        assert!(session.is_live_mode());
        assert!(session.has_votes());
        assert_eq!(session.active_voter(), Some(&voter()));

        let mut empty = VotingSession::new();
        empty.hydrate(None);
        assert!(empty.initialized_from_storage());
        assert_eq!(empty.ballots_printed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vote_saves_are_debounced_unless_forced() {
        let delay = Duration::from_secs(1);
        let mut session = VotingSession::new();
        session.hydrate(None);
        assert!(!session.persist_due(Instant::now(), delay));

        session.update_vote("mayor".to_string(), Some(vote("alice")));
        assert!(!session.persist_due(Instant::now(), delay));

        tokio::time::advance(delay).await;
        assert!(session.persist_due(Instant::now(), delay));
        session.mark_persisted(Instant::now());
        assert!(!session.persist_due(Instant::now(), delay));

        session.update_vote("council".to_string(), Some(vote("carol")));
        session.force_save_vote();
        assert!(session.persist_due(Instant::now(), delay));
    }

    #[test]
    fn test_persisted_state_omits_empty_ballot() {
        let session = VotingSession::new();
        let value = serde_json::to_value(session.persisted_state()).unwrap();
        assert!(value.get("votes").is_none());
        assert_eq!(value["ballotsPrintedCount"], 0);
    }
}
