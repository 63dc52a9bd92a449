//! Election definition, poll state and precinct selection
//!
//! Unlike auth and paper status these change only on administrative action,
//! so they are fetched once and re-fetched after an invalidation rather than
//! polled.

use crate::{Error, Result};
use crate::backend::{Backend, ELECTION_DEFINITION_KEY, Storage};
use crate::types::{ElectionDefinition, PollsState, PrecinctSelection};
use serde::{Deserialize, Serialize};

/// Snapshot of the machine's election configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionConfig {
    pub election_definition: Option<ElectionDefinition>,
    pub polls_state: PollsState,
    pub precinct_selection: Option<PrecinctSelection>,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            election_definition: None,
            polls_state: PollsState::PollsClosedInitial,
            precinct_selection: None,
        }
    }
}

impl ElectionConfig {
    /// An election is loaded and a precinct has been chosen
    pub fn is_configured(&self) -> bool {
        self.election_definition.is_some() && self.precinct_selection.is_some()
    }
}

/// Fetch-once cache over the backend's election queries
#[derive(Debug, Default)]
pub struct ElectionConfigSource {
    cached: Option<ElectionConfig>,
}

impl ElectionConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self) -> Option<&ElectionConfig> {
        self.cached.as_ref()
    }

    /// Drop the cached value so the next `load` goes to the backend
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Return the cached config, fetching it if it has been invalidated
    ///
    /// A freshly fetched election definition is written through to storage
    /// so it can be inspected after a restart.
    pub async fn load(&mut self, backend: &dyn Backend, storage: &dyn Storage) -> Result<ElectionConfig> {
        if let Some(config) = &self.cached {
            return Ok(config.clone());
        }

        let election_definition = backend.get_election_definition().await?;
        let election_state = backend.get_election_state().await?;
        let precinct_selection = backend.get_precinct_selection().await?;

        if let Some(definition) = &election_definition {
            storage
                .set(ELECTION_DEFINITION_KEY, serde_json::to_value(definition)?)
                .await
                .map_err(|e| Error::storage(format!("writing {ELECTION_DEFINITION_KEY}: {e}")))?;
        }

        let config = ElectionConfig {
            election_definition,
            polls_state: election_state.polls_state,
            precinct_selection,
        };

        tracing::debug!(
            "Election config loaded: configured={}, polls={}",
            config.is_configured(),
            config.polls_state
        );

        self.cached = Some(config.clone());
        Ok(config)
    }

    /// Invalidate and fetch again
    pub async fn refresh(&mut self, backend: &dyn Backend, storage: &dyn Storage) -> Result<ElectionConfig> {
        self.invalidate();
        self.load(backend, storage).await
    }
}
