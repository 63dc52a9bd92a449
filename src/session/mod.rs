//! Voter session state, its lifecycle and its timers

pub mod controller;
pub mod idle;
pub mod store;
pub mod timer;

pub use controller::SessionLifecycleController;
pub use idle::{IdleAction, IdleStage, IdleTimeoutManager, KioskIdleTimer};
pub use store::{PersistedSessionState, SessionSnapshot, VotingSession};
pub use timer::{ScopedTimer, TimerGuard, TimerKind};
