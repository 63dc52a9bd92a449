//! The kiosk event loop
//!
//! [`KioskRuntime`] is the single merge point: pollers, timers and the
//! frontend all post [`KioskEvent`]s into one channel, and the runtime applies
//! them one at a time. After every event it re-runs the screen selector,
//! brings the timers in line with the new screen and publishes the result on
//! `watch` channels.

use crate::backend::{Backend, Storage};
use crate::config::KioskConfig;
use crate::screen::reinsertion::{BallotReinsertionFlow, BallotReinsertionState, ReinsertionTransition};
use crate::screen::{KioskSnapshot, Screen, select};
use crate::session::controller::SessionLifecycleController;
use crate::session::idle::{IdleAction, IdleTimeoutManager, KioskIdleTimer};
use crate::session::store::SessionSnapshot;
use crate::session::timer::{ScopedTimer, TimerKind};
use crate::status::auth::AuthStatus;
use crate::status::poller::{PollerHandle, StatusSource, StatusUpdate, spawn_poller};
use crate::types::{BallotStyleId, ContestId, PollsState, PrecinctId, PrecinctSelection, Vote};
use crate::{Error, Result, session_error};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Requests from the rendered screens
#[derive(Debug, Clone, PartialEq)]
pub enum KioskCommand {
    StartSession {
        precinct_id: PrecinctId,
        ballot_style_id: BallotStyleId,
    },
    UpdateVote {
        contest_id: ContestId,
        vote: Option<Vote>,
    },
    ForceSaveVote,
    /// Ends the backend voter session before the ballot is cleared
    ResetSession {
        show_post_voting_instructions: bool,
    },
    PrintBallot {
        pdf_data: Vec<u8>,
    },
    ConfirmCast,
    InvalidateBallot,
    ConfirmInvalidateBallot,
    HidePostVotingInstructions,
    CheckPin {
        pin: String,
    },
    SetPollsState(PollsState),
    ResetPollsToPaused,
    SetTestMode(bool),
    SetPrecinctSelection(PrecinctSelection),
    UnconfigureMachine,
    /// Offered by the error screen once the restart delay has passed
    Restart,
}

impl KioskCommand {
    pub fn name(&self) -> &'static str {
        match self {
            KioskCommand::StartSession { .. } => "start_session",
            KioskCommand::UpdateVote { .. } => "update_vote",
            KioskCommand::ForceSaveVote => "force_save_vote",
            KioskCommand::ResetSession { .. } => "reset_session",
            KioskCommand::PrintBallot { .. } => "print_ballot",
            KioskCommand::ConfirmCast => "confirm_cast",
            KioskCommand::InvalidateBallot => "invalidate_ballot",
            KioskCommand::ConfirmInvalidateBallot => "confirm_invalidate_ballot",
            KioskCommand::HidePostVotingInstructions => "hide_post_voting_instructions",
            KioskCommand::CheckPin { .. } => "check_pin",
            KioskCommand::SetPollsState(_) => "set_polls_state",
            KioskCommand::ResetPollsToPaused => "reset_polls_to_paused",
            KioskCommand::SetTestMode(_) => "set_test_mode",
            KioskCommand::SetPrecinctSelection(_) => "set_precinct_selection",
            KioskCommand::UnconfigureMachine => "unconfigure_machine",
            KioskCommand::Restart => "restart",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KioskEvent {
    Status(StatusUpdate),
    /// An administrative change happened outside this runtime
    ElectionConfigInvalidated,
    /// Keyboard, pointer or accessible-controller input
    UserActivity,
    TimerFired {
        kind: TimerKind,
        generation: u64,
    },
    Command(KioskCommand),
    /// A source produced a value that must never occur
    Fatal(String),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ErrorBoundary {
    message: String,
    restart_available: bool,
    recoverable: bool,
}

pub struct KioskRuntime {
    config: KioskConfig,
    controller: SessionLifecycleController,
    snapshot: KioskSnapshot,
    reinsertion: BallotReinsertionFlow,

    idle: IdleTimeoutManager,
    kiosk_idle: KioskIdleTimer,
    post_voting_instructions: ScopedTimer,
    error_restart: ScopedTimer,
    error: Option<ErrorBoundary>,

    screen: Screen,
    events_tx: mpsc::UnboundedSender<KioskEvent>,
    events_rx: mpsc::UnboundedReceiver<KioskEvent>,
    screen_tx: watch::Sender<Screen>,
    session_tx: watch::Sender<SessionSnapshot>,
    pollers: Vec<PollerHandle>,
}

impl KioskRuntime {
    /// Build a runtime; no tasks are started until [`spawn_pollers`](Self::spawn_pollers)
    pub fn new(config: KioskConfig, backend: Arc<dyn Backend>, storage: Arc<dyn Storage>) -> Result<Self> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (screen_tx, _) = watch::channel(Screen::Loading);
        let (session_tx, _) = watch::channel(SessionSnapshot::default());

        Ok(Self {
            controller: SessionLifecycleController::new(backend, storage, &config),
            snapshot: KioskSnapshot {
                low_battery_threshold: config.low_battery_threshold,
                ..Default::default()
            },
            reinsertion: BallotReinsertionFlow::new(),
            idle: IdleTimeoutManager::new(
                config.idle_timeout(),
                config.idle_reset_timeout(),
                events_tx.clone(),
            ),
            kiosk_idle: KioskIdleTimer::new(config.quit_kiosk_idle(), events_tx.clone()),
            post_voting_instructions: ScopedTimer::new(TimerKind::PostVotingInstructions, events_tx.clone()),
            error_restart: ScopedTimer::new(TimerKind::ErrorRestart, events_tx.clone()),
            error: None,
            screen: Screen::Loading,
            events_tx,
            events_rx,
            screen_tx,
            session_tx,
            pollers: Vec::new(),
            config,
        })
    }

    /// Channel for posting events into the loop
    pub fn sender(&self) -> mpsc::UnboundedSender<KioskEvent> {
        self.events_tx.clone()
    }

    pub fn subscribe_screen(&self) -> watch::Receiver<Screen> {
        self.screen_tx.subscribe()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<SessionSnapshot> {
        self.session_tx.subscribe()
    }

    pub fn current_screen(&self) -> &Screen {
        &self.screen
    }

    pub fn snapshot(&self) -> &KioskSnapshot {
        &self.snapshot
    }

    pub fn controller(&self) -> &SessionLifecycleController {
        &self.controller
    }

    pub fn config(&self) -> &KioskConfig {
        &self.config
    }

    /// Where the last paper status left the reinsertion flow
    pub fn reinsertion_state(&self) -> Option<BallotReinsertionState> {
        self.reinsertion.current()
    }

    /// Hydrate the session and fetch the election configuration
    pub async fn initialize(&mut self) -> Result<()> {
        self.controller.hydrate().await?;
        self.controller.load_election_config().await?;
        self.reconcile().await;
        Ok(())
    }

    pub fn spawn_pollers(&mut self) {
        let backend = Arc::clone(self.controller.backend());
        for (source, interval) in [
            (StatusSource::Auth, self.config.auth_poll_interval()),
            (StatusSource::PaperHandler, self.config.paper_poll_interval()),
            (StatusSource::Devices, self.config.device_poll_interval()),
        ] {
            self.pollers.push(spawn_poller(
                source,
                Arc::clone(&backend),
                interval,
                self.events_tx.clone(),
            ));
        }
        tracing::info!("📡 Status pollers started: {}", self.pollers.len());
    }

    pub async fn stop_pollers(&mut self) {
        for poller in self.pollers.drain(..) {
            tracing::debug!("Stopping {} poller", poller.source().name());
            poller.stop().await;
        }
    }

    /// Wait for the next event and apply it; `false` once the loop should exit
    pub async fn step(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => self.handle_event(event).await,
            None => false,
        }
    }

    /// Initialize, start polling and process events until shutdown
    pub async fn run(mut self) -> Result<()> {
        self.initialize().await?;
        self.spawn_pollers();

        let mut save_tick = tokio::time::interval(self.config.vote_save_delay());
        save_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("🚀 Kiosk runtime started");
        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    let Some(event) = event else { break };
                    if !self.handle_event(event).await {
                        break;
                    }
                }
                _ = save_tick.tick() => self.persist().await,
            }
        }

        self.stop_pollers().await;
        self.persist().await;
        tracing::info!("🛑 Kiosk runtime stopped");
        Ok(())
    }

    /// Apply one event; `false` once the loop should exit
    pub async fn handle_event(&mut self, event: KioskEvent) -> bool {
        match event {
            KioskEvent::Status(update) => self.apply_status(update),
            KioskEvent::ElectionConfigInvalidated => {
                if let Err(e) = self.controller.refresh_election_config().await {
                    self.enter_error_boundary(&e);
                }
            }
            KioskEvent::UserActivity => {
                if self.idle.record_activity() {
                    tracing::debug!("Still-voting prompt dismissed");
                }
                self.kiosk_idle.record_activity();
            }
            KioskEvent::TimerFired { kind, generation } => self.on_timer(kind, generation).await,
            KioskEvent::Command(command) => {
                let _ = self.dispatch(command).await;
                return true;
            }
            KioskEvent::Fatal(message) => self.enter_error_boundary(&Error::invariant(message)),
            KioskEvent::Shutdown => return false,
        }
        self.reconcile().await;
        true
    }

    /// Run one command; a failure also replaces the screen with the error boundary
    pub async fn dispatch(&mut self, command: KioskCommand) -> Result<()> {
        let name = command.name();
        let result = self.execute(command).await;
        if let Err(e) = &result {
            tracing::error!("❌ Command {} failed: {}", name, e);
            self.enter_error_boundary(e);
        }
        self.reconcile().await;
        result
    }

    async fn execute(&mut self, command: KioskCommand) -> Result<()> {
        if let Some(error) = &self.error {
            return match command {
                KioskCommand::Restart if error.restart_available => self.controller.reboot().await,
                _ => {
                    tracing::warn!("⚠️  Ignoring {} while the error screen is up", command.name());
                    Ok(())
                }
            };
        }

        self.idle.record_activity();
        self.kiosk_idle.record_activity();

        match command {
            KioskCommand::StartSession {
                precinct_id,
                ballot_style_id,
            } => {
                self.check_can_start_session()?;
                self.controller.start_session(&precinct_id, &ballot_style_id).await
            }
            KioskCommand::UpdateVote { contest_id, vote } => {
                self.controller.update_vote(contest_id, vote);
                Ok(())
            }
            KioskCommand::ForceSaveVote => self.controller.force_save_vote().await,
            KioskCommand::ResetSession {
                show_post_voting_instructions,
            } => self.controller.end_and_reset(show_post_voting_instructions).await,
            KioskCommand::PrintBallot { pdf_data } => self.controller.print_ballot(&pdf_data).await,
            KioskCommand::ConfirmCast => self.controller.confirm_cast().await,
            KioskCommand::InvalidateBallot => self.controller.invalidate_ballot().await,
            KioskCommand::ConfirmInvalidateBallot => self.controller.confirm_invalidate_ballot().await,
            KioskCommand::HidePostVotingInstructions => {
                self.post_voting_instructions.disarm();
                self.controller.hide_post_voting_instructions().await
            }
            KioskCommand::CheckPin { pin } => self.controller.check_pin(&pin).await,
            KioskCommand::SetPollsState(next) => self.controller.set_polls_state(next).await,
            KioskCommand::ResetPollsToPaused => self.controller.reset_polls_to_paused().await,
            KioskCommand::SetTestMode(is_test_mode) => self.controller.set_test_mode(is_test_mode).await,
            KioskCommand::SetPrecinctSelection(selection) => {
                self.controller.set_precinct_selection(selection).await
            }
            KioskCommand::UnconfigureMachine => self.controller.unconfigure_machine().await,
            KioskCommand::Restart => Ok(()),
        }
    }

    fn apply_status(&mut self, update: StatusUpdate) {
        match update {
            StatusUpdate::Auth(auth) => {
                let previous: Option<AuthStatus> = self.snapshot.auth.replace(auth.clone());
                if let Some(previous) = previous {
                    if previous.label() != auth.label() {
                        tracing::debug!("Auth: {} → {}", previous.label(), auth.label());
                    }
                    self.controller.end_session_on_logout(&previous, &auth);
                }
            }
            StatusUpdate::PaperHandler(status) => {
                match self.reinsertion.observe(status) {
                    Some(ReinsertionTransition::Unexpected { from, to }) => {
                        tracing::warn!("⚠️  Unexpected reinsertion step: {:?} → {:?}", from, to);
                    }
                    Some(ReinsertionTransition::Exited { from, to }) => {
                        tracing::debug!("Reinsertion ended: {:?} → {}", from, to);
                    }
                    Some(transition) => tracing::debug!("Reinsertion: {:?}", transition),
                    None => {}
                }
                self.snapshot.paper_status = Some(status);
            }
            StatusUpdate::Devices(devices) => {
                self.snapshot.devices = Some(devices);
            }
        }
    }

    /// Only a poll worker holding their card may activate a voter, and only
    /// while the polls are open
    fn check_can_start_session(&self) -> Result<()> {
        if !self.snapshot.auth.as_ref().is_some_and(AuthStatus::is_poll_worker) {
            return Err(session_error!("Only a poll worker can start a voter session"));
        }
        let polls_state = self
            .controller
            .election_config()
            .map(|config| config.polls_state);
        if polls_state != Some(PollsState::PollsOpen) {
            return Err(session_error!(
                "Cannot start a voter session while polls are {}",
                polls_state.map_or_else(|| "unknown".to_string(), |state| state.to_string())
            ));
        }
        Ok(())
    }

    async fn on_timer(&mut self, kind: TimerKind, generation: u64) {
        let result = match kind {
            TimerKind::VoterIdle => match self.idle.on_fired(generation) {
                IdleAction::EndSession => self.controller.end_and_reset(false).await,
                IdleAction::ShowPrompt | IdleAction::Ignore => Ok(()),
            },
            TimerKind::KioskIdle => {
                if self.kiosk_idle.on_fired(generation) {
                    self.controller.power_down().await
                } else {
                    Ok(())
                }
            }
            TimerKind::PostVotingInstructions => {
                if self.post_voting_instructions.accept(generation) {
                    self.controller.hide_post_voting_instructions().await
                } else {
                    Ok(())
                }
            }
            TimerKind::ErrorRestart => {
                if self.error_restart.accept(generation) {
                    if let Some(error) = self.error.as_mut() {
                        error.restart_available = true;
                    }
                }
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::error!("❌ {} timer action failed: {}", kind.name(), e);
            self.enter_error_boundary(&e);
        }
    }

    fn enter_error_boundary(&mut self, error: &Error) {
        let recoverable = !error.is_fatal();
        tracing::error!(
            "🚨 Entering error boundary (recoverable={}): {}",
            recoverable,
            error
        );
        self.error = Some(ErrorBoundary {
            message: error.to_string(),
            restart_available: false,
            recoverable,
        });
        if recoverable {
            self.error_restart.arm(self.config.error_restart_delay());
        } else {
            self.error_restart.disarm();
        }
    }

    fn compute_screen(&mut self) -> Screen {
        self.snapshot.election = self.controller.election_config().cloned();
        self.snapshot.session = self.controller.session().snapshot(self.idle.is_prompting());
        match &self.error {
            Some(error) => Screen::ErrorBoundary {
                message: error.message.clone(),
                restart_available: error.restart_available,
                recoverable: error.recoverable,
            },
            None => select(&self.snapshot),
        }
    }

    fn sync_timers(&mut self, screen: &Screen) {
        self.idle
            .sync(screen.is_voter_flow() && self.controller.session().has_votes());

        let card_absent = self
            .snapshot
            .auth
            .as_ref()
            .is_some_and(AuthStatus::is_card_absent);
        self.kiosk_idle.sync(screen.is_insert_card() && card_absent);

        let showing_instructions = *screen == Screen::PostVotingInstructions;
        if showing_instructions && !self.post_voting_instructions.is_armed() {
            self.post_voting_instructions
                .arm(self.config.post_voting_instructions_timeout());
        } else if !showing_instructions && self.post_voting_instructions.is_armed() {
            self.post_voting_instructions.disarm();
        }
    }

    /// Re-select, align timers with the result and publish
    async fn reconcile(&mut self) {
        let screen = self.compute_screen();
        self.sync_timers(&screen);
        // Disarming the idle timer can drop the prompt, so select again.
        let screen = self.compute_screen();

        if screen != self.screen {
            tracing::debug!("🖥️  Screen: {} → {}", self.screen.id(), screen.id());
            self.screen = screen.clone();
            self.screen_tx.send_replace(screen);
        }

        let session = self.snapshot.session.clone();
        self.session_tx.send_if_modified(|current| {
            if *current == session {
                false
            } else {
                *current = session;
                true
            }
        });

        self.persist().await;
    }

    async fn persist(&mut self) {
        if let Err(e) = self.controller.persist_if_dirty().await {
            tracing::warn!("⚠️  Failed to persist session state: {}", e);
        }
    }
}
