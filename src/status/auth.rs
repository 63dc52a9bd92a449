//! Card-based operator and voter identity
//!
//! The backend reports auth as a flat record (`status`, `role`, `user`,
//! `cardlessVoterUser`, ...). Inside the crate it is a sum type in which a
//! cardless voter activation can only hang off a poll worker, so the
//! conversion from the wire form is where a malformed combination is caught.

use crate::types::{BallotStyleId, ElectionKey, PrecinctId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why nobody is logged in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggedOutReason {
    NoCard,
    CardError,
    WrongElection,
    PollWorkerWrongElection,
    NoCardReader,
    SessionExpired,
}

impl LoggedOutReason {
    /// Reasons that mean the slot is empty rather than holding a bad card
    pub fn is_card_absent(self) -> bool {
        matches!(self, LoggedOutReason::NoCard | LoggedOutReason::SessionExpired)
    }
}

/// Holder of an operator card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUser {
    pub jurisdiction: String,
    /// Election the card was programmed for; absent on system administrator
    /// and vendor cards
    pub election_key: Option<ElectionKey>,
}

/// A voter session activated by a poll worker, identified by precinct and
/// ballot style
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardlessVoterUser {
    pub ballot_style_id: BallotStyleId,
    pub precinct_id: PrecinctId,
}

/// Logged-in role, with the data each role may carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    SystemAdministrator,
    ElectionManager,
    /// `cardless_voter` is set once the poll worker has activated a voter
    /// session and is still holding their card
    PollWorker {
        cardless_voter: Option<CardlessVoterUser>,
    },
    /// The poll worker removed their card; the voter is now authenticated
    CardlessVoter(CardlessVoterUser),
    Vendor,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::SystemAdministrator => "system_administrator",
            Role::ElectionManager => "election_manager",
            Role::PollWorker { .. } => "poll_worker",
            Role::CardlessVoter(_) => "cardless_voter",
            Role::Vendor => "vendor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedIn {
    pub role: Role,
    /// Card holder; for a cardless voter this is the poll worker who
    /// activated the session
    pub user: CardUser,
    pub session_expires_at: DateTime<Utc>,
}

/// Current card/operator identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AuthStatusWire", into = "AuthStatusWire")]
pub enum AuthStatus {
    LoggedOut {
        reason: LoggedOutReason,
    },
    CheckingPin {
        user: CardUser,
        wrong_pin_entered_at: Option<DateTime<Utc>>,
    },
    LoggedIn(LoggedIn),
}

impl Default for AuthStatus {
    fn default() -> Self {
        AuthStatus::LoggedOut {
            reason: LoggedOutReason::NoCard,
        }
    }
}

impl AuthStatus {
    /// Parse the backend's JSON representation
    pub fn from_wire(value: serde_json::Value) -> Result<Self> {
        let wire: AuthStatusWire = serde_json::from_value(value)?;
        AuthStatus::try_from(wire)
    }

    pub fn logged_out_reason(&self) -> Option<LoggedOutReason> {
        match self {
            AuthStatus::LoggedOut { reason } => Some(*reason),
            _ => None,
        }
    }

    pub fn is_logged_out_with(&self, reason: LoggedOutReason) -> bool {
        self.logged_out_reason() == Some(reason)
    }

    /// No card in the reader (including an expired session)
    pub fn is_card_absent(&self) -> bool {
        self.logged_out_reason().is_some_and(LoggedOutReason::is_card_absent)
    }

    pub fn role(&self) -> Option<&Role> {
        match self {
            AuthStatus::LoggedIn(logged_in) => Some(&logged_in.role),
            _ => None,
        }
    }

    pub fn is_poll_worker(&self) -> bool {
        matches!(self.role(), Some(Role::PollWorker { .. }))
    }

    pub fn is_cardless_voter(&self) -> bool {
        matches!(self.role(), Some(Role::CardlessVoter(_)))
    }

    /// The authenticated cardless voter, once the poll worker has handed off
    pub fn cardless_voter(&self) -> Option<&CardlessVoterUser> {
        match self.role() {
            Some(Role::CardlessVoter(voter)) => Some(voter),
            _ => None,
        }
    }

    /// The voter session a poll worker has activated but not yet handed off
    pub fn poll_worker_activation(&self) -> Option<&CardlessVoterUser> {
        match self.role() {
            Some(Role::PollWorker { cardless_voter }) => cardless_voter.as_ref(),
            _ => None,
        }
    }

    /// Election key on the inserted card, if any
    pub fn card_election_key(&self) -> Option<&ElectionKey> {
        match self {
            AuthStatus::LoggedIn(logged_in) => logged_in.user.election_key.as_ref(),
            AuthStatus::CheckingPin { user, .. } => user.election_key.as_ref(),
            AuthStatus::LoggedOut { .. } => None,
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            AuthStatus::LoggedOut { .. } => "logged_out",
            AuthStatus::CheckingPin { .. } => "checking_pin",
            AuthStatus::LoggedIn(logged_in) => logged_in.role.name(),
        }
    }
}

// =============================================================================
// WIRE FORM
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireRole {
    SystemAdministrator,
    ElectionManager,
    PollWorker,
    CardlessVoter,
    Vendor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WireUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election_key: Option<ElectionKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ballot_style_id: Option<BallotStyleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precinct_id: Option<PrecinctId>,
}

impl From<CardUser> for WireUser {
    fn from(user: CardUser) -> Self {
        Self {
            jurisdiction: Some(user.jurisdiction),
            election_key: user.election_key,
            ..Self::default()
        }
    }
}

impl WireUser {
    fn into_card_user(self) -> CardUser {
        CardUser {
            jurisdiction: self.jurisdiction.unwrap_or_default(),
            election_key: self.election_key,
        }
    }
}

/// Flat auth record as exchanged with the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthStatusWire {
    LoggedOut {
        reason: LoggedOutReason,
    },
    CheckingPin {
        user: WireUser,
        #[serde(rename = "wrongPinEnteredAt", default, skip_serializing_if = "Option::is_none")]
        wrong_pin_entered_at: Option<DateTime<Utc>>,
    },
    LoggedIn {
        role: WireRole,
        user: WireUser,
        #[serde(rename = "sessionExpiresAt")]
        session_expires_at: DateTime<Utc>,
        #[serde(rename = "cardlessVoterUser", default, skip_serializing_if = "Option::is_none")]
        cardless_voter_user: Option<CardlessVoterUser>,
    },
}

impl TryFrom<AuthStatusWire> for AuthStatus {
    type Error = Error;

    fn try_from(wire: AuthStatusWire) -> Result<Self> {
        match wire {
            AuthStatusWire::LoggedOut { reason } => Ok(AuthStatus::LoggedOut { reason }),
            AuthStatusWire::CheckingPin {
                user,
                wrong_pin_entered_at,
            } => Ok(AuthStatus::CheckingPin {
                user: user.into_card_user(),
                wrong_pin_entered_at,
            }),
            AuthStatusWire::LoggedIn {
                role,
                user,
                session_expires_at,
                cardless_voter_user,
            } => {
                let role = match (role, cardless_voter_user) {
                    (WireRole::PollWorker, cardless_voter) => Role::PollWorker { cardless_voter },
                    (WireRole::CardlessVoter, None) => {
                        let (Some(ballot_style_id), Some(precinct_id)) =
                            (user.ballot_style_id.clone(), user.precinct_id.clone())
                        else {
                            return Err(Error::invariant(
                                "cardless voter auth without ballot style and precinct",
                            ));
                        };
                        Role::CardlessVoter(CardlessVoterUser {
                            ballot_style_id,
                            precinct_id,
                        })
                    }
                    (other, Some(_)) => {
                        return Err(Error::invariant(format!(
                            "cardlessVoterUser present on {other:?} auth"
                        )));
                    }
                    (WireRole::SystemAdministrator, None) => Role::SystemAdministrator,
                    (WireRole::ElectionManager, None) => Role::ElectionManager,
                    (WireRole::Vendor, None) => Role::Vendor,
                };

                Ok(AuthStatus::LoggedIn(LoggedIn {
                    role,
                    user: user.into_card_user(),
                    session_expires_at,
                }))
            }
        }
    }
}

impl From<AuthStatus> for AuthStatusWire {
    fn from(status: AuthStatus) -> Self {
        match status {
            AuthStatus::LoggedOut { reason } => AuthStatusWire::LoggedOut { reason },
            AuthStatus::CheckingPin {
                user,
                wrong_pin_entered_at,
            } => AuthStatusWire::CheckingPin {
                user: user.into(),
                wrong_pin_entered_at,
            },
            AuthStatus::LoggedIn(LoggedIn {
                role,
                user,
                session_expires_at,
            }) => {
                let mut wire_user = WireUser::from(user);
                let (wire_role, cardless_voter_user) = match role {
                    Role::SystemAdministrator => (WireRole::SystemAdministrator, None),
                    Role::ElectionManager => (WireRole::ElectionManager, None),
                    Role::PollWorker { cardless_voter } => (WireRole::PollWorker, cardless_voter),
                    Role::CardlessVoter(voter) => {
                        wire_user.ballot_style_id = Some(voter.ballot_style_id);
                        wire_user.precinct_id = Some(voter.precinct_id);
                        (WireRole::CardlessVoter, None)
                    }
                    Role::Vendor => (WireRole::Vendor, None),
                };
                AuthStatusWire::LoggedIn {
                    role: wire_role,
                    user: wire_user,
                    session_expires_at,
                    cardless_voter_user,
                }
            }
        }
    }
}
