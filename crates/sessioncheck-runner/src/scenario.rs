//! Scenario vocabulary: ordered steps against the SUT with per-step
//! expectations.
//!
//! A scenario never touches the network itself; the runner resolves specs to
//! wire values, drives the client and the mock, and checks each outcome.

use sessioncheck_core::{ResultField, SessionOp};

use crate::mock::StubRule;

/// How a send step fills the token form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSpec {
    /// The scenario's fresh per-run token
    Fresh,
    /// A fixed literal, e.g. a malformed token
    Literal(&'static str),
    /// Field left off the wire
    Missing,
}

/// How a send step fills the action form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSpec {
    Op(SessionOp),
    /// Field left off the wire
    Missing,
}

impl ActionSpec {
    pub(crate) const fn wire_value(self) -> Option<&'static str> {
        match self {
            Self::Op(op) => Some(op.wire_name()),
            Self::Missing => None,
        }
    }

    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::Op(op) => op.wire_name(),
            Self::Missing => "(no action)",
        }
    }
}

/// How a send step fills the `X-Api-Key` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    /// The configured secret
    Valid,
    /// A wrong, non-empty value
    Wrong,
    /// Sent, but empty
    Empty,
    /// Header omitted entirely
    Absent,
}

/// Assertion attached to a send step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    /// Check against the contract oracle's prediction. Requires an
    /// [`ActionSpec::Op`] step, since the oracle is keyed by operation.
    Model,
    /// Accept any of these statuses; the body is not inspected
    Status(Vec<u16>),
    /// Accept any of these statuses with a required result field
    StatusAndResult(Vec<u16>, ResultField),
    /// Byte-identical (status and body) to the labeled earlier step
    IdenticalTo(&'static str),
}

/// One request against the SUT.
#[derive(Debug, Clone)]
pub struct SendStep {
    pub label: Option<&'static str>,
    pub token: TokenSpec,
    pub action: ActionSpec,
    pub api_key: KeySpec,
    pub expect: Expect,
}

impl SendStep {
    /// Fresh token, valid key, oracle-checked: the common shape.
    #[must_use]
    pub const fn op(op: SessionOp) -> Self {
        Self {
            label: None,
            token: TokenSpec::Fresh,
            action: ActionSpec::Op(op),
            api_key: KeySpec::Valid,
            expect: Expect::Model,
        }
    }

    /// Request with the action field left off the wire. Outside the state
    /// machine, so the expectation must be explicit.
    #[must_use]
    pub const fn missing_action(expect: Expect) -> Self {
        Self {
            label: None,
            token: TokenSpec::Fresh,
            action: ActionSpec::Missing,
            api_key: KeySpec::Valid,
            expect,
        }
    }

    /// Name this step so a later step can assert an identical outcome.
    #[must_use]
    pub const fn labeled(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: TokenSpec) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub const fn with_key(mut self, api_key: KeySpec) -> Self {
        self.api_key = api_key;
        self
    }

    #[must_use]
    pub fn with_expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }
}

/// One scenario step.
#[derive(Debug, Clone)]
pub enum Step {
    /// Install or replace an upstream stub rule
    Stub(StubRule),
    /// Send a request and assert its outcome
    Send(SendStep),
}

/// Named, ordered list of steps. Each scenario runs against freshly reset
/// mocks and draws its own token, so no scenario depends on another.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub steps: Vec<Step>,
}

impl Scenario {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn stub(mut self, rule: StubRule) -> Self {
        self.steps.push(Step::Stub(rule));
        self
    }

    #[must_use]
    pub fn send(mut self, step: SendStep) -> Self {
        self.steps.push(Step::Send(step));
        self
    }

    /// Number of requests this scenario issues (cleanup excluded).
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, Step::Send(_)))
            .count()
    }

    /// Send steps in order.
    pub fn sends(&self) -> impl Iterator<Item = &SendStep> {
        self.steps.iter().filter_map(|s| match s {
            Step::Send(send) => Some(send),
            Step::Stub(_) => None,
        })
    }
}
