//! Collaborator interfaces: the kiosk backend and local storage
//!
//! Every backend call is a single logical request; success or failure is the
//! only signal the session core inspects.

use crate::Result;
use crate::status::auth::AuthStatus;
use crate::status::paper::PaperHandlerStatus;
use crate::types::{
    BallotStyleId, DevicePresence, ElectionDefinition, PollsState, PrecinctId, PrecinctSelection,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage key for the locally cached election definition
pub const ELECTION_DEFINITION_KEY: &str = "electionDefinition";

/// Storage key for persisted session metadata
pub const STATE_KEY: &str = "state";

/// Election state as held by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionState {
    pub polls_state: PollsState,
}

/// Requests the session core makes of the kiosk backend
#[async_trait]
pub trait Backend: Send + Sync {
    // Polled status sources
    async fn get_auth_status(&self) -> Result<AuthStatus>;
    async fn get_paper_handler_status(&self) -> Result<PaperHandlerStatus>;
    async fn get_device_status(&self) -> Result<DevicePresence>;

    // Election configuration, fetched on demand
    async fn get_election_definition(&self) -> Result<Option<ElectionDefinition>>;
    async fn get_election_state(&self) -> Result<ElectionState>;
    async fn get_precinct_selection(&self) -> Result<Option<PrecinctSelection>>;

    // Auth
    async fn check_pin(&self, pin: &str) -> Result<()>;

    // Voter sessions
    async fn set_accepting_paper_state(&self) -> Result<()>;
    async fn start_cardless_voter_session(
        &self,
        precinct_id: &PrecinctId,
        ballot_style_id: &BallotStyleId,
    ) -> Result<()>;
    async fn end_cardless_voter_session(&self) -> Result<()>;

    // Ballot handling
    async fn print_ballot(&self, pdf_data: &[u8]) -> Result<()>;
    async fn validate_ballot(&self) -> Result<()>;
    async fn invalidate_ballot(&self) -> Result<()>;
    async fn confirm_invalidate_ballot(&self) -> Result<()>;

    // Administration
    async fn set_polls_state(&self, polls_state: PollsState) -> Result<()>;
    async fn set_test_mode(&self, is_test_mode: bool) -> Result<()>;
    async fn set_precinct_selection(&self, selection: &PrecinctSelection) -> Result<()>;
    async fn unconfigure_machine(&self) -> Result<()>;

    // System requests
    async fn power_down(&self) -> Result<()>;
    async fn reboot(&self) -> Result<()>;
}

/// Key/value storage for state that must survive a restart
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
    /// Remove every key
    async fn clear(&self) -> Result<()>;
}

/// In-process storage, used on development machines and in tests
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed storage with existing entries
    pub fn with_entries(entries: impl IntoIterator<Item = (String, serde_json::Value)>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}
