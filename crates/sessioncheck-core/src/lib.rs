//! sessioncheck-core: Contract oracle and verdict logic for session API
//! verification
//!
//! This crate provides the pure half of the harness: the token/credential
//! predicates, the session state machine used as the oracle for expected
//! outcomes, and the types for representing failures, severities, and
//! pass/fail verdicts. All network code lives in `sessioncheck-runner`.

pub mod config;
pub mod contract;
pub mod outcome;
pub mod report;
pub mod repro;
pub mod token;
pub mod verdict;

pub use config::{Config, ConfigError};
pub use contract::{
    ContractEvent, KeyClass, Prediction, ResultExpectation, SessionOp, SessionState, TokenClass,
    UpstreamHealth, predict,
};
pub use outcome::{Outcome, ResultField};
pub use report::{ReportError, RunReport, ScenarioReport, StepRecord, write_report};
pub use repro::to_http_file;
pub use token::{TOKEN_LENGTH, generate, is_valid_api_key, is_well_formed};
pub use verdict::{
    Failure, FailureType, RequestSnapshot, ResponseSnapshot, Severity, Verdict, VerdictPolicy,
    VerdictStatus,
};
