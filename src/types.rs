//! # Core Types for the Kiosk Session Core
//!
//! Election configuration, poll states, ballot selections and device
//! presence shared by the status sources, the session store and the
//! screen selector.
//!
//! ## Type Categories
//!
//! ### Identifiers
//! Plain string aliases ([`ContestId`], [`PrecinctId`], [`BallotStyleId`]) as
//! they arrive from the election definition.
//!
//! ### Election configuration
//! - [`ElectionDefinition`]: the parsed election plus its ballot hash
//! - [`ElectionKey`]: what a card carries to identify its election
//! - [`PrecinctSelection`]: which precinct(s) the machine serves
//! - [`PollsState`]: the poll lifecycle
//!
//! ### Ballot
//! - [`Vote`] and [`VotesDict`]: the voter's in-progress selections
//!
//! ## Usage Examples
//!
//! ```rust
//! use ballot_kiosk::types::*;
//!
//! let raw = r#"{
//!     "id": "general-2026",
//!     "title": "General Election",
//!     "date": "2026-11-03",
//!     "precincts": [{"id": "23", "name": "North"}],
//!     "ballotStyles": [{"id": "12", "precincts": ["23"]}]
//! }"#;
//! let definition = ElectionDefinition::from_json(raw).unwrap();
//!
//! assert!(definition.election.ballot_style_serves("12", "23"));
//! assert_eq!(definition.ballot_hash.len(), 64);
//! assert!(PollsState::PollsOpen.can_transition_to(PollsState::PollsPaused));
//! ```

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type ContestId = String;
pub type CandidateId = String;
pub type PrecinctId = String;
pub type BallotStyleId = String;

/// Identifies an election on a smart card
///
/// Two elections are the same election when both the id and the date match;
/// the kiosk compares the key on an election manager's card against the
/// loaded definition to decide whether to offer replacing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElectionKey {
    pub id: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precinct {
    pub id: PrecinctId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotStyle {
    pub id: BallotStyleId,
    /// Precincts this ballot style may be issued in
    pub precincts: Vec<PrecinctId>,
}

/// The subset of an election definition this core needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Election {
    pub id: String,
    pub title: String,
    pub date: String,
    pub precincts: Vec<Precinct>,
    pub ballot_styles: Vec<BallotStyle>,
}

impl Election {
    pub fn key(&self) -> ElectionKey {
        ElectionKey {
            id: self.id.clone(),
            date: self.date.clone(),
        }
    }

    pub fn ballot_style(&self, id: &str) -> Option<&BallotStyle> {
        self.ballot_styles.iter().find(|style| style.id == id)
    }

    pub fn precinct(&self, id: &str) -> Option<&Precinct> {
        self.precincts.iter().find(|precinct| precinct.id == id)
    }

    /// Whether a ballot style exists and may be issued in the given precinct
    pub fn ballot_style_serves(&self, ballot_style_id: &str, precinct_id: &str) -> bool {
        self.ballot_style(ballot_style_id)
            .is_some_and(|style| style.precincts.iter().any(|p| p == precinct_id))
    }
}

/// A loaded election together with the hash of the data it was parsed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDefinition {
    pub election: Election,
    /// Hex encoded blake3 digest of the raw election data
    pub ballot_hash: String,
}

impl ElectionDefinition {
    /// Parse an election from its raw JSON, hashing the exact bytes received
    pub fn from_json(raw: &str) -> Result<Self> {
        let election: Election = serde_json::from_str(raw)?;
        let ballot_hash = hex::encode(blake3::hash(raw.as_bytes()).as_bytes());
        Ok(Self {
            election,
            ballot_hash,
        })
    }

    pub fn election_key(&self) -> ElectionKey {
        self.election.key()
    }
}

/// Which precincts the machine is configured to serve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrecinctSelection {
    AllPrecincts,
    SinglePrecinct { precinct_id: PrecinctId },
}

impl PrecinctSelection {
    pub fn includes(&self, precinct_id: &str) -> bool {
        match self {
            Self::AllPrecincts => true,
            Self::SinglePrecinct { precinct_id: selected } => selected == precinct_id,
        }
    }
}

/// Poll lifecycle
///
/// `polls_closed_initial → polls_open ⇄ polls_paused`, and either open state
/// may close for good. The only way out of `polls_closed_final` is an
/// administrative reset to `polls_paused`, which is requested separately
/// (see [`PollsState::can_reset_to_paused`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollsState {
    PollsClosedInitial,
    PollsOpen,
    PollsPaused,
    PollsClosedFinal,
}

impl PollsState {
    /// Whether a poll worker may move the polls from `self` to `next`
    pub fn can_transition_to(self, next: PollsState) -> bool {
        use PollsState::*;
        matches!(
            (self, next),
            (PollsClosedInitial, PollsOpen)
                | (PollsOpen, PollsPaused)
                | (PollsPaused, PollsOpen)
                | (PollsOpen, PollsClosedFinal)
                | (PollsPaused, PollsClosedFinal)
        )
    }

    /// Only a system administrator may do this, and only from the final state
    pub fn can_reset_to_paused(self) -> bool {
        self == PollsState::PollsClosedFinal
    }

    pub fn is_open(self) -> bool {
        self == PollsState::PollsOpen
    }
}

impl fmt::Display for PollsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PollsState::PollsClosedInitial => "polls_closed_initial",
            PollsState::PollsOpen => "polls_open",
            PollsState::PollsPaused => "polls_paused",
            PollsState::PollsClosedFinal => "polls_closed_final",
        };
        f.write_str(label)
    }
}

/// A voter's selection in one contest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "selections", rename_all = "snake_case")]
pub enum Vote {
    Candidate(Vec<CandidateId>),
    YesNo(Vec<String>),
}

impl Vote {
    pub fn is_empty(&self) -> bool {
        match self {
            Vote::Candidate(selections) | Vote::YesNo(selections) => selections.is_empty(),
        }
    }
}

/// Selections keyed by contest; ordering carries no meaning
pub type VotesDict = BTreeMap<ContestId, Vote>;

/// Battery reading from the power subsystem
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryInfo {
    /// Charge fraction in `0.0..=1.0`
    pub level: f64,
    pub discharging: bool,
}

impl BatteryInfo {
    pub fn is_low(&self, threshold: f64) -> bool {
        self.discharging && self.level < threshold
    }
}

/// Presence of peripherals not covered by the auth and paper sources
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DevicePresence {
    /// `None` on machines without a battery
    pub battery: Option<BatteryInfo>,
    pub accessible_controller_connected: bool,
}

impl DevicePresence {
    pub fn is_low_battery(&self, threshold: f64) -> bool {
        self.battery.is_some_and(|battery| battery.is_low(threshold))
    }

    pub fn is_discharging(&self) -> bool {
        self.battery.is_some_and(|battery| battery.discharging)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_election_definition_hash_is_stable() {
        let first = fixtures::election_definition();
        let second = fixtures::election_definition();
        assert_eq!(first.ballot_hash, second.ballot_hash);
        assert_eq!(first.ballot_hash.len(), 64);

        let altered = fixtures::ELECTION_JSON.replace("North Lake", "North Shore");
        let third = ElectionDefinition::from_json(&altered).unwrap();
        assert_ne!(first.ballot_hash, third.ballot_hash);
        assert_eq!(first.election_key(), third.election_key());
    }

    #[test]
    fn test_ballot_style_serves_precinct() {
        let election = fixtures::election_definition().election;
        assert!(election.ballot_style_serves("12", "23"));
        assert!(!election.ballot_style_serves("12", "24"));
        assert!(election.ballot_style_serves("13", "24"));
        assert!(!election.ballot_style_serves("99", "23"));
    }

    #[test]
    fn test_polls_state_transitions() {
        use PollsState::*;
        assert!(PollsClosedInitial.can_transition_to(PollsOpen));
        assert!(PollsOpen.can_transition_to(PollsPaused));
        assert!(PollsPaused.can_transition_to(PollsOpen));
        assert!(PollsPaused.can_transition_to(PollsClosedFinal));

        assert!(!PollsClosedInitial.can_transition_to(PollsPaused));
        assert!(!PollsClosedFinal.can_transition_to(PollsOpen));
        assert!(!PollsClosedFinal.can_transition_to(PollsPaused));
        assert!(PollsClosedFinal.can_reset_to_paused());
        assert!(!PollsOpen.can_reset_to_paused());
    }

    #[test]
    fn test_precinct_selection() {
        assert!(PrecinctSelection::AllPrecincts.includes("23"));
        let single = PrecinctSelection::SinglePrecinct {
            precinct_id: "23".to_string(),
        };
        assert!(single.includes("23"));
        assert!(!single.includes("24"));
    }

    #[test]
    fn test_low_battery_requires_discharging() {
        let charging = DevicePresence {
            battery: Some(BatteryInfo { level: 0.1, discharging: false }),
            accessible_controller_connected: true,
        };
        assert!(!charging.is_low_battery(0.25));

        let draining = DevicePresence {
            battery: Some(BatteryInfo { level: 0.1, discharging: true }),
            accessible_controller_connected: true,
        };
        assert!(draining.is_low_battery(0.25));
        assert!(!DevicePresence::default().is_low_battery(0.25));
    }

    #[test]
    fn test_vote_serialization_shape() {
        let vote = Vote::Candidate(vec!["alice".to_string()]);
        let json = serde_json::to_value(&vote).unwrap();
        assert_eq!(json["type"], "candidate");
        assert_eq!(json["selections"][0], "alice");
        assert!(Vote::YesNo(vec![]).is_empty());
    }
}
