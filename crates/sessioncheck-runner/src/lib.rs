//! sessioncheck-runner: scenario execution against the SUT
//!
//! Composes the upstream mock, the SUT client, and the contract oracle from
//! `sessioncheck-core` into a sequential scenario runner.

pub mod client;
pub mod mock;
pub mod runner;
pub mod scenario;
pub mod suite;

pub use client::{ClientError, SessionClient};
pub use mock::{ACTION_PATH, AUTH_PATH, MockError, RecordedRequest, StubRule, UpstreamMock};
pub use runner::{RunnerError, SuiteRunner};
pub use scenario::{ActionSpec, Expect, KeySpec, Scenario, SendStep, Step, TokenSpec};
pub use suite::builtin_suite;
