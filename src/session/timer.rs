//! Scoped one-shot timers
//!
//! A [`TimerGuard`] owns the task that will deliver a
//! [`KioskEvent::TimerFired`] after its delay; dropping the guard aborts the
//! task. Every fire carries the generation it was armed with, and
//! [`ScopedTimer::accept`] only honours the current generation, so a fire that
//! raced a disarm is ignored.

use crate::runtime::KioskEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which logical timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Voter inactivity, both prompt and reset stages
    VoterIdle,
    /// Insert-card screen inactivity
    KioskIdle,
    PostVotingInstructions,
    ErrorRestart,
}

impl TimerKind {
    pub fn name(self) -> &'static str {
        match self {
            TimerKind::VoterIdle => "voter_idle",
            TimerKind::KioskIdle => "kiosk_idle",
            TimerKind::PostVotingInstructions => "post_voting_instructions",
            TimerKind::ErrorRestart => "error_restart",
        }
    }
}

/// A pending fire; aborted when dropped
#[derive(Debug)]
pub struct TimerGuard {
    kind: TimerKind,
    generation: u64,
    task: JoinHandle<()>,
}

impl TimerGuard {
    pub fn start(
        kind: TimerKind,
        generation: u64,
        delay: Duration,
        events: mpsc::UnboundedSender<KioskEvent>,
    ) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(KioskEvent::TimerFired { kind, generation });
        });
        Self {
            kind,
            generation,
            task,
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One logical timer with at most one pending fire
#[derive(Debug)]
pub struct ScopedTimer {
    kind: TimerKind,
    generation: u64,
    guard: Option<TimerGuard>,
    events: mpsc::UnboundedSender<KioskEvent>,
}

impl ScopedTimer {
    pub fn new(kind: TimerKind, events: mpsc::UnboundedSender<KioskEvent>) -> Self {
        Self {
            kind,
            generation: 0,
            guard: None,
            events,
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_armed(&self) -> bool {
        self.guard.is_some()
    }

    /// Replace any pending fire with a new one `delay` from now
    pub fn arm(&mut self, delay: Duration) -> u64 {
        self.generation += 1;
        self.guard = Some(TimerGuard::start(
            self.kind,
            self.generation,
            delay,
            self.events.clone(),
        ));
        tracing::trace!(
            "Timer armed: kind={}, generation={}, delay={:?}",
            self.kind.name(),
            self.generation,
            delay
        );
        self.generation
    }

    pub fn disarm(&mut self) {
        if self.guard.take().is_some() {
            tracing::trace!("Timer disarmed: kind={}", self.kind.name());
        }
        self.generation += 1;
    }

    /// Consume a fire; `false` for a stale generation or a disarmed timer
    pub fn accept(&mut self, generation: u64) -> bool {
        if self.guard.is_none() || generation != self.generation {
            tracing::debug!(
                "Ignoring stale timer fire: kind={}, generation={}, current={}",
                self.kind.name(),
                generation,
                self.generation
            );
            return false;
        }
        self.guard = None;
        true
    }
}
