//! Session contract model: the state machine the SUT is expected to obey.
//!
//! [`predict`] is the oracle. It maps a classified request (operation,
//! session state, token/key classes, upstream health) to the outcome the
//! contract allows. Where the contract is deliberately ambiguous (401 vs 403
//! for credential failures, 500 vs 504 for a dead auth upstream) the
//! prediction carries the full accepted set instead of narrowing to one code.

use serde::{Deserialize, Serialize};

use crate::outcome::{Outcome, ResultField};
use crate::token;

/// The three operations of the session API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionOp {
    Login,
    Action,
    Logout,
}

impl SessionOp {
    /// Wire value of the `action` form field.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Action => "ACTION",
            Self::Logout => "LOGOUT",
        }
    }
}

impl std::fmt::Display for SessionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Per-token session state. `LoggedOut` is both the initial and the
/// post-LOGOUT state; the SUT holds the real store, the harness only tracks
/// what the contract says the store should contain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    LoggedOut,
    LoggedIn,
}

/// Health of one upstream dependency, as configured on the mock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamHealth {
    #[default]
    Healthy,
    Down,
}

impl UpstreamHealth {
    /// Classify a stubbed status code: any 2xx means the upstream answers
    /// usefully, anything else counts as down.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        if status >= 200 && status < 300 {
            Self::Healthy
        } else {
            Self::Down
        }
    }
}

/// How the token field of a request classifies under the format predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    Missing,
    Malformed,
    WellFormed,
}

impl TokenClass {
    /// Classify an optional token field.
    #[must_use]
    pub fn of(token: Option<&str>) -> Self {
        match token {
            None => Self::Missing,
            Some(t) if token::is_well_formed(t) => Self::WellFormed,
            Some(_) => Self::Malformed,
        }
    }
}

/// How the `X-Api-Key` header classifies against the configured secret.
/// Absent means the header was not sent at all, which is distinct from an
/// empty value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyClass {
    Absent,
    Empty,
    Mismatch,
    Valid,
}

impl KeyClass {
    /// Classify an optional header value.
    #[must_use]
    pub fn of(provided: Option<&str>, configured: &str) -> Self {
        match provided {
            None => Self::Absent,
            Some("") => Self::Empty,
            Some(k) if token::is_valid_api_key(Some(k), configured) => Self::Valid,
            Some(_) => Self::Mismatch,
        }
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// One classified request against the SUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractEvent {
    pub op: SessionOp,
    pub state: SessionState,
    pub token: TokenClass,
    pub key: KeyClass,
    pub auth: UpstreamHealth,
    pub action_upstream: UpstreamHealth,
}

/// What the contract requires of the `result` body field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultExpectation {
    MustBeOk,
    MustBeError,
    Unchecked,
}

/// Contract-allowed outcome for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    /// Accepted status codes. More than one entry where the contract is
    /// deliberately ambiguous.
    pub statuses: Vec<u16>,
    pub result: ResultExpectation,
    /// Session state after the SUT processes the request.
    pub next_state: SessionState,
}

impl Prediction {
    fn unchanged(statuses: Vec<u16>, result: ResultExpectation, state: SessionState) -> Self {
        Self {
            statuses,
            result,
            next_state: state,
        }
    }

    /// Whether an observed outcome satisfies this prediction.
    #[must_use]
    pub fn accepts(&self, outcome: &Outcome) -> bool {
        self.status_accepts(outcome.status) && self.result_accepts(outcome.result)
    }

    #[must_use]
    pub fn status_accepts(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }

    #[must_use]
    pub fn result_accepts(&self, result: Option<ResultField>) -> bool {
        match self.result {
            ResultExpectation::MustBeOk => result == Some(ResultField::Ok),
            ResultExpectation::MustBeError => result == Some(ResultField::Error),
            ResultExpectation::Unchecked => true,
        }
    }

    /// Render the accepted set for failure messages, e.g. `"401|403"`.
    #[must_use]
    pub fn expected_label(&self) -> String {
        self.statuses
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// The contract oracle.
///
/// Gate order: credentials first, then token format, then per-operation
/// rules. ACTION and LOGOUT consult the auth upstream before the session
/// store; LOGIN rejects a duplicate session before calling out.
#[must_use]
pub fn predict(event: &ContractEvent) -> Prediction {
    use ResultExpectation::{MustBeError, MustBeOk, Unchecked};

    if !event.key.is_valid() {
        return Prediction::unchanged(vec![401, 403], Unchecked, event.state);
    }
    if event.token != TokenClass::WellFormed {
        return Prediction::unchanged(vec![400], MustBeError, event.state);
    }

    match event.op {
        SessionOp::Login => match (event.state, event.auth) {
            (SessionState::LoggedIn, _) => {
                Prediction::unchanged(vec![409], Unchecked, event.state)
            }
            (SessionState::LoggedOut, UpstreamHealth::Down) => {
                Prediction::unchanged(vec![500, 504], Unchecked, event.state)
            }
            (SessionState::LoggedOut, UpstreamHealth::Healthy) => Prediction {
                statuses: vec![200],
                result: MustBeOk,
                next_state: SessionState::LoggedIn,
            },
        },
        SessionOp::Action => {
            if event.auth == UpstreamHealth::Down {
                return Prediction::unchanged(vec![500], Unchecked, event.state);
            }
            match (event.state, event.action_upstream) {
                (SessionState::LoggedOut, _) => {
                    Prediction::unchanged(vec![400], MustBeError, event.state)
                }
                (SessionState::LoggedIn, UpstreamHealth::Down) => {
                    Prediction::unchanged(vec![500], Unchecked, event.state)
                }
                (SessionState::LoggedIn, UpstreamHealth::Healthy) => {
                    Prediction::unchanged(vec![200], MustBeOk, event.state)
                }
            }
        }
        SessionOp::Logout => {
            if event.auth == UpstreamHealth::Down {
                return Prediction::unchanged(vec![500], Unchecked, event.state);
            }
            Prediction {
                statuses: vec![200],
                result: Unchecked,
                next_state: SessionState::LoggedOut,
            }
        }
    }
}
