//! Inactivity handling
//!
//! [`IdleTimeoutManager`] watches a voter with a partly marked ballot:
//! after `idle_timeout` it asks whether they are still voting, and after a
//! further `idle_reset_timeout` without activity it asks for the session to be
//! ended. [`KioskIdleTimer`] powers the machine down when the insert-card
//! screen has been left alone.

use crate::runtime::KioskEvent;
use crate::session::timer::{ScopedTimer, TimerKind};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStage {
    Inactive,
    /// Waiting for the first timeout
    Watching,
    /// The prompt is up; the next fire ends the session
    Prompting,
}

/// What the runtime should do about a voter idle fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    ShowPrompt,
    EndSession,
    Ignore,
}

#[derive(Debug)]
pub struct IdleTimeoutManager {
    stage: IdleStage,
    timer: ScopedTimer,
    idle_timeout: Duration,
    idle_reset_timeout: Duration,
}

impl IdleTimeoutManager {
    pub fn new(
        idle_timeout: Duration,
        idle_reset_timeout: Duration,
        events: mpsc::UnboundedSender<KioskEvent>,
    ) -> Self {
        Self {
            stage: IdleStage::Inactive,
            timer: ScopedTimer::new(TimerKind::VoterIdle, events),
            idle_timeout,
            idle_reset_timeout,
        }
    }

    pub fn stage(&self) -> IdleStage {
        self.stage
    }

    pub fn is_prompting(&self) -> bool {
        self.stage == IdleStage::Prompting
    }

    /// Arm or disarm to match the current screen
    ///
    /// `eligible` is true while the voter flow is on screen with a non-empty
    /// ballot. Becoming eligible starts stage one; losing eligibility drops any
    /// pending fire.
    pub fn sync(&mut self, eligible: bool) {
        match (eligible, self.stage) {
            (true, IdleStage::Inactive) => {
                self.stage = IdleStage::Watching;
                self.timer.arm(self.idle_timeout);
            }
            (false, IdleStage::Watching | IdleStage::Prompting) => self.disarm(),
            _ => {}
        }
    }

    /// Voter touched the screen; returns whether the prompt was dismissed
    pub fn record_activity(&mut self) -> bool {
        if self.stage == IdleStage::Inactive {
            return false;
        }
        let was_prompting = self.is_prompting();
        self.stage = IdleStage::Watching;
        self.timer.arm(self.idle_timeout);
        was_prompting
    }

    pub fn on_fired(&mut self, generation: u64) -> IdleAction {
        if !self.timer.accept(generation) {
            return IdleAction::Ignore;
        }
        match self.stage {
            IdleStage::Watching => {
                self.stage = IdleStage::Prompting;
                self.timer.arm(self.idle_reset_timeout);
                tracing::info!("⏳ Voter idle, showing still-voting prompt");
                IdleAction::ShowPrompt
            }
            IdleStage::Prompting => {
                self.stage = IdleStage::Inactive;
                tracing::info!("⏳ Voter idle prompt expired, ending session");
                IdleAction::EndSession
            }
            IdleStage::Inactive => IdleAction::Ignore,
        }
    }

    pub fn disarm(&mut self) {
        self.stage = IdleStage::Inactive;
        self.timer.disarm();
    }
}

/// Power-down timer for an unattended insert-card screen
#[derive(Debug)]
pub struct KioskIdleTimer {
    timer: ScopedTimer,
    timeout: Duration,
}

impl KioskIdleTimer {
    pub fn new(timeout: Duration, events: mpsc::UnboundedSender<KioskEvent>) -> Self {
        Self {
            timer: ScopedTimer::new(TimerKind::KioskIdle, events),
            timeout,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// `eligible` is true on the insert-card screen with no card present
    pub fn sync(&mut self, eligible: bool) {
        if eligible && !self.timer.is_armed() {
            self.timer.arm(self.timeout);
        } else if !eligible && self.timer.is_armed() {
            self.timer.disarm();
        }
    }

    pub fn record_activity(&mut self) {
        if self.timer.is_armed() {
            self.timer.arm(self.timeout);
        }
    }

    /// Whether the fire is current and the machine should power down
    pub fn on_fired(&mut self, generation: u64) -> bool {
        self.timer.accept(generation)
    }
}
