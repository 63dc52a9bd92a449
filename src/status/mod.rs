//! Status sources: card identity, paper handler, devices and election config

pub mod auth;
pub mod election_config;
pub mod paper;
pub mod poller;

pub use auth::{AuthStatus, CardUser, CardlessVoterUser, LoggedIn, LoggedOutReason, Role};
pub use election_config::{ElectionConfig, ElectionConfigSource};
pub use paper::{PaperFamily, PaperHandlerStatus};
pub use poller::{PollerHandle, StatusSource, StatusUpdate, spawn_poller};
