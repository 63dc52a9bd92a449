//! Shared fixtures for the integration suites
//!
//! `MockBackend` records every call in order, can be told to fail a named
//! operation, and notes how many votes the published session held at the
//! moment `end_cardless_voter_session` was requested.

#![allow(dead_code)]

use async_trait::async_trait;
use ballot_kiosk::{
    Backend, KioskConfig, KioskEvent, KioskRuntime, MemoryStorage, Result, Screen, Storage,
    backend::ElectionState,
    session::SessionSnapshot,
    status::{AuthStatus, CardUser, CardlessVoterUser, LoggedIn, LoggedOutReason, Role, StatusUpdate},
    status::PaperHandlerStatus,
    types::{
        BallotStyleId, DevicePresence, ElectionDefinition, PollsState, PrecinctId,
        PrecinctSelection,
    },
    backend_error,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub const ELECTION_JSON: &str = r#"{
    "id": "general-2026",
    "title": "General Election",
    "date": "2026-11-03",
    "precincts": [
        {"id": "23", "name": "North Lake"},
        {"id": "24", "name": "South Lake"}
    ],
    "ballotStyles": [
        {"id": "12", "precincts": ["23"]},
        {"id": "13", "precincts": ["23", "24"]}
    ]
}"#;

pub fn election_definition() -> ElectionDefinition {
    ElectionDefinition::from_json(ELECTION_JSON).expect("fixture election parses")
}

// =============================================================================
// AUTH FIXTURES
// =============================================================================

fn card_user() -> CardUser {
    CardUser {
        jurisdiction: "state-of-hamilton".to_string(),
        election_key: Some(election_definition().election_key()),
    }
}

pub fn logged_in(role: Role) -> AuthStatus {
    AuthStatus::LoggedIn(LoggedIn {
        role,
        user: card_user(),
        session_expires_at: Utc::now() + ChronoDuration::hours(12),
    })
}

pub fn logged_out(reason: LoggedOutReason) -> AuthStatus {
    AuthStatus::LoggedOut { reason }
}

pub fn voter(ballot_style_id: &str, precinct_id: &str) -> CardlessVoterUser {
    CardlessVoterUser {
        ballot_style_id: ballot_style_id.to_string(),
        precinct_id: precinct_id.to_string(),
    }
}

pub fn poll_worker(activation: Option<CardlessVoterUser>) -> AuthStatus {
    logged_in(Role::PollWorker {
        cardless_voter: activation,
    })
}

pub fn cardless_voter(ballot_style_id: &str, precinct_id: &str) -> AuthStatus {
    logged_in(Role::CardlessVoter(voter(ballot_style_id, precinct_id)))
}

// =============================================================================
// MOCK BACKEND
// =============================================================================

#[derive(Debug)]
struct MockState {
    auth: AuthStatus,
    paper: PaperHandlerStatus,
    devices: DevicePresence,
    election_definition: Option<ElectionDefinition>,
    polls_state: PollsState,
    precinct_selection: Option<PrecinctSelection>,
}

pub struct MockBackend {
    state: Mutex<MockState>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashSet<String>>,
    session_observer: Mutex<Option<watch::Receiver<SessionSnapshot>>>,
    votes_at_end_session: Mutex<Vec<usize>>,
}

impl MockBackend {
    /// A configured machine serving all precincts
    pub fn configured(polls_state: PollsState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                auth: logged_out(LoggedOutReason::NoCard),
                paper: PaperHandlerStatus::NotAcceptingPaper,
                devices: DevicePresence::default(),
                election_definition: Some(election_definition()),
                polls_state,
                precinct_selection: Some(PrecinctSelection::AllPrecincts),
            }),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashSet::new()),
            session_observer: Mutex::new(None),
            votes_at_end_session: Mutex::new(Vec::new()),
        })
    }

    pub fn unconfigured() -> Arc<Self> {
        let backend = Self::configured(PollsState::PollsClosedInitial);
        {
            let mut state = backend.state.lock().unwrap();
            state.election_definition = None;
            state.precinct_selection = None;
        }
        backend
    }

    pub fn fail(&self, operation: &str) {
        self.failures.lock().unwrap().insert(operation.to_string());
    }

    pub fn succeed(&self, operation: &str) {
        self.failures.lock().unwrap().remove(operation);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.split('(').next() == Some(operation))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Watch the runtime's published session so calls can record it
    pub fn observe_session(&self, receiver: watch::Receiver<SessionSnapshot>) {
        *self.session_observer.lock().unwrap() = Some(receiver);
    }

    pub fn votes_at_end_session(&self) -> Vec<usize> {
        self.votes_at_end_session.lock().unwrap().clone()
    }

    pub fn set_auth(&self, auth: AuthStatus) {
        self.state.lock().unwrap().auth = auth;
    }

    pub fn set_paper(&self, paper: PaperHandlerStatus) {
        self.state.lock().unwrap().paper = paper;
    }

    pub fn set_devices(&self, devices: DevicePresence) {
        self.state.lock().unwrap().devices = devices;
    }

    pub fn auth(&self) -> AuthStatus {
        self.state.lock().unwrap().auth.clone()
    }

    pub fn polls_state(&self) -> PollsState {
        self.state.lock().unwrap().polls_state
    }

    fn record(&self, call: String) -> Result<()> {
        let operation = call.split('(').next().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(call);
        if self.failures.lock().unwrap().contains(&operation) {
            return Err(backend_error!(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn get_auth_status(&self) -> Result<AuthStatus> {
        self.record("get_auth_status".to_string())?;
        Ok(self.state.lock().unwrap().auth.clone())
    }

    async fn get_paper_handler_status(&self) -> Result<PaperHandlerStatus> {
        self.record("get_paper_handler_status".to_string())?;
        Ok(self.state.lock().unwrap().paper)
    }

    async fn get_device_status(&self) -> Result<DevicePresence> {
        self.record("get_device_status".to_string())?;
        Ok(self.state.lock().unwrap().devices)
    }

    async fn get_election_definition(&self) -> Result<Option<ElectionDefinition>> {
        self.record("get_election_definition".to_string())?;
        Ok(self.state.lock().unwrap().election_definition.clone())
    }

    async fn get_election_state(&self) -> Result<ElectionState> {
        self.record("get_election_state".to_string())?;
        Ok(ElectionState {
            polls_state: self.state.lock().unwrap().polls_state,
        })
    }

    async fn get_precinct_selection(&self) -> Result<Option<PrecinctSelection>> {
        self.record("get_precinct_selection".to_string())?;
        Ok(self.state.lock().unwrap().precinct_selection.clone())
    }

    async fn check_pin(&self, pin: &str) -> Result<()> {
        self.record(format!("check_pin({pin})"))
    }

    async fn set_accepting_paper_state(&self) -> Result<()> {
        self.record("set_accepting_paper_state".to_string())?;
        self.state.lock().unwrap().paper = PaperHandlerStatus::AcceptingPaper;
        Ok(())
    }

    async fn start_cardless_voter_session(
        &self,
        precinct_id: &PrecinctId,
        ballot_style_id: &BallotStyleId,
    ) -> Result<()> {
        self.record(format!(
            "start_cardless_voter_session({precinct_id},{ballot_style_id})"
        ))?;
        let mut state = self.state.lock().unwrap();
        if let AuthStatus::LoggedIn(logged_in) = &mut state.auth {
            if let Role::PollWorker { cardless_voter } = &mut logged_in.role {
                *cardless_voter = Some(voter(ballot_style_id, precinct_id));
            }
        }
        Ok(())
    }

    async fn end_cardless_voter_session(&self) -> Result<()> {
        let votes = self
            .session_observer
            .lock()
            .unwrap()
            .as_ref()
            .map(|receiver| receiver.borrow().votes_count);
        if let Some(votes) = votes {
            self.votes_at_end_session.lock().unwrap().push(votes);
        }
        self.record("end_cardless_voter_session".to_string())?;
        let mut state = self.state.lock().unwrap();
        state.auth = logged_out(LoggedOutReason::NoCard);
        state.paper = PaperHandlerStatus::NotAcceptingPaper;
        Ok(())
    }

    async fn print_ballot(&self, pdf_data: &[u8]) -> Result<()> {
        self.record(format!("print_ballot({})", pdf_data.len()))?;
        self.state.lock().unwrap().paper = PaperHandlerStatus::PrintingBallot;
        Ok(())
    }

    async fn validate_ballot(&self) -> Result<()> {
        self.record("validate_ballot".to_string())?;
        self.state.lock().unwrap().paper = PaperHandlerStatus::EjectingToRear;
        Ok(())
    }

    async fn invalidate_ballot(&self) -> Result<()> {
        self.record("invalidate_ballot".to_string())?;
        self.state.lock().unwrap().paper =
            PaperHandlerStatus::WaitingForInvalidatedBallotConfirmationPaperPresent;
        Ok(())
    }

    async fn confirm_invalidate_ballot(&self) -> Result<()> {
        self.record("confirm_invalidate_ballot".to_string())?;
        self.state.lock().unwrap().paper = PaperHandlerStatus::NotAcceptingPaper;
        Ok(())
    }

    async fn set_polls_state(&self, polls_state: PollsState) -> Result<()> {
        self.record(format!("set_polls_state({polls_state})"))?;
        self.state.lock().unwrap().polls_state = polls_state;
        Ok(())
    }

    async fn set_test_mode(&self, is_test_mode: bool) -> Result<()> {
        self.record(format!("set_test_mode({is_test_mode})"))
    }

    async fn set_precinct_selection(&self, selection: &PrecinctSelection) -> Result<()> {
        self.record("set_precinct_selection".to_string())?;
        self.state.lock().unwrap().precinct_selection = Some(selection.clone());
        Ok(())
    }

    async fn unconfigure_machine(&self) -> Result<()> {
        self.record("unconfigure_machine".to_string())?;
        let mut state = self.state.lock().unwrap();
        state.election_definition = None;
        state.precinct_selection = None;
        state.polls_state = PollsState::PollsClosedInitial;
        Ok(())
    }

    async fn power_down(&self) -> Result<()> {
        self.record("power_down".to_string())
    }

    async fn reboot(&self) -> Result<()> {
        self.record("reboot".to_string())
    }
}

// =============================================================================
// RUNTIME HELPERS
// =============================================================================

pub struct Harness {
    pub backend: Arc<MockBackend>,
    pub storage: Arc<MemoryStorage>,
    pub runtime: KioskRuntime,
}

impl Harness {
    pub async fn new(backend: Arc<MockBackend>) -> Result<Self> {
        Self::with_storage(backend, Arc::new(MemoryStorage::new())).await
    }

    pub async fn with_storage(backend: Arc<MockBackend>, storage: Arc<MemoryStorage>) -> Result<Self> {
        let mut runtime = KioskRuntime::new(
            KioskConfig::for_testing(),
            backend.clone() as Arc<dyn Backend>,
            storage.clone() as Arc<dyn Storage>,
        )?;
        backend.observe_session(runtime.subscribe_session());
        runtime.initialize().await?;
        Ok(Self {
            backend,
            storage,
            runtime,
        })
    }

    /// Deliver what the pollers would currently report
    pub async fn poll(&mut self) {
        let (auth, paper, devices) = {
            let state = self.backend.state.lock().unwrap();
            (state.auth.clone(), state.paper, state.devices)
        };
        self.runtime
            .handle_event(KioskEvent::Status(StatusUpdate::Auth(auth)))
            .await;
        self.runtime
            .handle_event(KioskEvent::Status(StatusUpdate::PaperHandler(paper)))
            .await;
        self.runtime
            .handle_event(KioskEvent::Status(StatusUpdate::Devices(devices)))
            .await;
    }

    pub async fn set_auth(&mut self, auth: AuthStatus) {
        self.backend.set_auth(auth);
        self.poll().await;
    }

    pub async fn set_paper(&mut self, paper: PaperHandlerStatus) {
        self.backend.set_paper(paper);
        self.poll().await;
    }

    pub fn screen(&self) -> Screen {
        self.runtime.current_screen().clone()
    }

    pub async fn stored_state(&self) -> Option<serde_json::Value> {
        self.storage
            .get(ballot_kiosk::backend::STATE_KEY)
            .await
            .expect("memory storage never fails")
    }
}
