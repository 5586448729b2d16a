//! Failure taxonomy and structured representation
//!
//! A failure records one scenario step whose observed outcome broke the
//! contract, plus enough request/response context to reproduce it by hand.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Severity;

/// What went wrong with one scenario step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// Observed status code outside the contract's accepted set
    StatusMismatch,
    /// `result` body field contradicted the contract
    ResultMismatch,
    /// Repeated call produced a different wire outcome
    IdempotenceViolation,
    /// Connection-level failure before any response arrived
    Transport,
    /// Client-side deadline exceeded. Distinct from an asserted-and-matched
    /// 504: an unbounded hang is a harness defect, not a SUT outcome.
    Timeout,
}

impl FailureType {
    /// Default severity for this failure type
    #[must_use]
    pub const fn default_severity(self) -> Severity {
        match self {
            Self::StatusMismatch
            | Self::ResultMismatch
            | Self::IdempotenceViolation
            | Self::Timeout => Severity::Critical,
            Self::Transport => Severity::Error,
        }
    }

    /// Human-readable description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::StatusMismatch => "Status code outside the contract's accepted set",
            Self::ResultMismatch => "Result field contradicts the contract",
            Self::IdempotenceViolation => "Repeated call produced a different outcome",
            Self::Transport => "Connection failed before a response arrived",
            Self::Timeout => "Client-side deadline exceeded",
        }
    }
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Snapshot of HTTP request for reproduction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Snapshot of HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSnapshot {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub latency_ms: u64,
}

/// A single failure case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Failure {
    /// Unique identifier within the run
    pub id: String,
    /// Scenario that produced the failure
    pub scenario: String,
    /// Operation label, e.g. "LOGIN" or "(no action)"
    pub operation: String,
    /// Actual status code received, absent on transport failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Accepted outcome, e.g. "401|403" or "identical to step first-logout"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Type of failure
    pub failure_type: FailureType,
    /// Severity level
    pub severity: Severity,
    /// Full request for reproduction
    pub request: RequestSnapshot,
    /// Response received (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
    /// Additional context
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
}

impl Failure {
    /// Create a new failure with the type's default severity
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        scenario: impl Into<String>,
        operation: impl Into<String>,
        failure_type: FailureType,
        request: RequestSnapshot,
    ) -> Self {
        Self {
            id: id.into(),
            scenario: scenario.into(),
            operation: operation.into(),
            status_code: None,
            expected: None,
            failure_type,
            severity: failure_type.default_severity(),
            request,
            response: None,
            context: HashMap::new(),
        }
    }

    /// Record the observed status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Record what the contract would have accepted
    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Add response to failure
    #[must_use]
    pub fn with_response(mut self, response: ResponseSnapshot) -> Self {
        self.response = Some(response);
        self
    }

    /// Add context entry
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Override severity
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}
