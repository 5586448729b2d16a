//! Scenario execution: isolation ritual, oracle tracking, cleanup.
//!
//! Per scenario: reset the mock, install healthy defaults for both upstream
//! paths, draw a fresh token, walk the steps while tracking what the
//! contract says the SUT's session store should contain, and finish with a
//! cleanup LOGOUT for every token that logged in, regardless of assertion
//! outcome, so one scenario's failure never leaks session state into the
//! next.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;

use sessioncheck_core::{
    Config, ContractEvent, Failure, FailureType, KeyClass, Outcome, Prediction, ResponseSnapshot,
    RunReport, ScenarioReport, SessionOp, SessionState, StepRecord, TokenClass, UpstreamHealth,
    generate, predict,
};

use crate::client::{ClientError, SessionClient};
use crate::mock::{ACTION_PATH, AUTH_PATH, StubRule, UpstreamMock};
use crate::scenario::{ActionSpec, Expect, KeySpec, Scenario, SendStep, Step, TokenSpec};

/// Canonical wrong key for [`KeySpec::Wrong`] steps.
const WRONG_API_KEY: &str = "INVALID_API_KEY";

/// Drives scenarios against the SUT through a passed-in mock controller.
pub struct SuiteRunner {
    base_url: String,
    api_key: String,
    timeout: Duration,
    stop_on_failure: bool,
    filter: Option<String>,
    quiet: bool,
}

impl SuiteRunner {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            stop_on_failure: false,
            filter: None,
            quiet: false,
        }
    }

    /// Stop after the first failed scenario (fast-fail for CI).
    #[must_use]
    pub fn with_stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    /// Run only scenarios whose name contains the given substring.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    /// Suppress progress output.
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Run scenarios sequentially against the SUT, driving the given mock.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed. Per-request
    /// trouble is recorded as scenario failures, not returned.
    pub fn run(
        &self,
        scenarios: &[Scenario],
        mock: &UpstreamMock,
    ) -> Result<RunReport, RunnerError> {
        let client = SessionClient::new(&self.base_url, self.timeout)?;
        let mut rng = SmallRng::from_entropy();

        let selected: Vec<&Scenario> = scenarios
            .iter()
            .filter(|s| {
                self.filter
                    .as_deref()
                    .is_none_or(|f| s.name.contains(f))
            })
            .collect();

        if !self.quiet {
            eprintln!(
                "Running {} scenarios against {}...",
                selected.len(),
                self.base_url
            );
        }

        let mut report = RunReport {
            total: 0,
            passed: 0,
            failed: 0,
            scenarios: Vec::new(),
            errors: Vec::new(),
        };

        for scenario in selected {
            let scenario_report = self.run_scenario(scenario, &client, mock, &mut rng);
            report.total += 1;
            if scenario_report.passed {
                report.passed += 1;
                if !self.quiet {
                    eprintln!("  {}: OK", scenario.name);
                }
            } else {
                report.failed += 1;
                if !self.quiet {
                    eprintln!(
                        "  {}: {} failures",
                        scenario.name,
                        scenario_report.failures.len()
                    );
                }
            }
            let stop = self.stop_on_failure && !scenario_report.passed;
            report.scenarios.push(scenario_report);
            if stop {
                if !self.quiet {
                    eprintln!("Stopped early: failure detected (--stop-on-failure)");
                }
                break;
            }
        }

        Ok(report)
    }

    fn run_scenario(
        &self,
        scenario: &Scenario,
        client: &SessionClient,
        mock: &UpstreamMock,
        rng: &mut SmallRng,
    ) -> ScenarioReport {
        mock.reset();
        mock.stub_healthy(AUTH_PATH);
        mock.stub_healthy(ACTION_PATH);

        let fresh_token = generate(rng);
        let mut tracker = Tracker::new();
        let mut labeled: HashMap<&'static str, Outcome> = HashMap::new();
        let mut logged_in: HashSet<String> = HashSet::new();
        let mut steps = Vec::new();
        let mut failures = Vec::new();

        for step in &scenario.steps {
            match step {
                Step::Stub(rule) => {
                    tracker.observe_stub(rule);
                    mock.stub(rule.clone());
                }
                Step::Send(send) => {
                    let token_value: Option<&str> = match send.token {
                        TokenSpec::Fresh => Some(fresh_token.as_str()),
                        TokenSpec::Literal(t) => Some(t),
                        TokenSpec::Missing => None,
                    };
                    let action_value = send.action.wire_value();
                    let key_value: Option<&str> = match send.api_key {
                        KeySpec::Valid => Some(self.api_key.as_str()),
                        KeySpec::Wrong => Some(WRONG_API_KEY),
                        KeySpec::Empty => Some(""),
                        KeySpec::Absent => None,
                    };

                    let request = client.request_snapshot(token_value, action_value, key_value);
                    let outcome = match client.send(token_value, action_value, key_value) {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            let failure_type = match err {
                                ClientError::Timeout(_) => FailureType::Timeout,
                                _ => FailureType::Transport,
                            };
                            failures.push(
                                Failure::new(
                                    failure_id(scenario.name, failures.len()),
                                    scenario.name,
                                    send.action.label(),
                                    failure_type,
                                    request,
                                )
                                .with_context("error", err.to_string()),
                            );
                            break;
                        }
                    };

                    steps.push(StepRecord {
                        label: send.label.map(str::to_string),
                        operation: send.action.label().to_string(),
                        request: request.clone(),
                        response: ResponseSnapshot {
                            status_code: outcome.status,
                            body: (!outcome.body.is_empty()).then(|| outcome.body.clone()),
                            latency_ms: outcome.latency_ms,
                        },
                    });
                    if let Some(label) = send.label {
                        labeled.insert(label, outcome.clone());
                    }

                    let check = self.check_send(
                        send,
                        token_value,
                        &outcome,
                        &mut tracker,
                        &mut logged_in,
                        &labeled,
                    );

                    if let Err((failure_type, expected)) = check {
                        failures.push(
                            Failure::new(
                                failure_id(scenario.name, failures.len()),
                                scenario.name,
                                send.action.label(),
                                failure_type,
                                request,
                            )
                            .with_status(outcome.status)
                            .with_expected(expected)
                            .with_response(ResponseSnapshot {
                                status_code: outcome.status,
                                body: (!outcome.body.is_empty()).then(|| outcome.body.clone()),
                                latency_ms: outcome.latency_ms,
                            }),
                        );
                        // Later oracle predictions would build on a state the
                        // SUT never reached; stop here, cleanup still runs.
                        break;
                    }
                }
            }
        }

        // Cleanup: restore a healthy /auth, then log out every token this
        // scenario logged in, regardless of assertion outcome.
        if !logged_in.is_empty() {
            mock.stub_healthy(AUTH_PATH);
            for token in &logged_in {
                let _ = client.send(
                    Some(token),
                    Some(SessionOp::Logout.wire_name()),
                    Some(&self.api_key),
                );
            }
        }

        ScenarioReport {
            name: scenario.name.to_string(),
            passed: failures.is_empty(),
            steps,
            failures,
        }
    }

    /// Check one outcome against the step's expectation. On success, advance
    /// the oracle state. On mismatch, return the failure type and a label of
    /// what would have been accepted.
    fn check_send(
        &self,
        send: &SendStep,
        token_value: Option<&str>,
        outcome: &Outcome,
        tracker: &mut Tracker,
        logged_in: &mut HashSet<String>,
        labeled: &HashMap<&'static str, Outcome>,
    ) -> Result<(), (FailureType, String)> {
        match &send.expect {
            Expect::Model => {
                let ActionSpec::Op(op) = send.action else {
                    // Guarded by the suite tests; unreachable for builtins.
                    return Err((
                        FailureType::StatusMismatch,
                        "scenario bug: oracle check without an operation".to_string(),
                    ));
                };
                let event = ContractEvent {
                    op,
                    state: tracker.state_of(token_value),
                    token: TokenClass::of(token_value),
                    key: KeyClass::of(
                        match send.api_key {
                            KeySpec::Valid => Some(self.api_key.as_str()),
                            KeySpec::Wrong => Some(WRONG_API_KEY),
                            KeySpec::Empty => Some(""),
                            KeySpec::Absent => None,
                        },
                        &self.api_key,
                    ),
                    auth: tracker.auth,
                    action_upstream: tracker.action_upstream,
                };
                let prediction = predict(&event);
                if prediction.accepts(outcome) {
                    advance_state(&event, &prediction, token_value, tracker, logged_in);
                    Ok(())
                } else if prediction.status_accepts(outcome.status) {
                    Err((FailureType::ResultMismatch, result_label(&prediction)))
                } else {
                    Err((FailureType::StatusMismatch, prediction.expected_label()))
                }
            }
            Expect::Status(statuses) => {
                if statuses.contains(&outcome.status) {
                    Ok(())
                } else {
                    Err((FailureType::StatusMismatch, join_statuses(statuses)))
                }
            }
            Expect::StatusAndResult(statuses, result) => {
                if !statuses.contains(&outcome.status) {
                    Err((FailureType::StatusMismatch, join_statuses(statuses)))
                } else if outcome.result != Some(*result) {
                    Err((
                        FailureType::ResultMismatch,
                        format!("result {result:?}"),
                    ))
                } else {
                    Ok(())
                }
            }
            Expect::IdenticalTo(label) => match labeled.get(label) {
                Some(first) if first.same_wire_outcome(outcome) => Ok(()),
                Some(_) => Err((
                    FailureType::IdempotenceViolation,
                    format!("identical to step {label}"),
                )),
                None => Err((
                    FailureType::IdempotenceViolation,
                    format!("scenario bug: no step labeled {label}"),
                )),
            },
        }
    }
}

/// Advance the tracked session state after a matched oracle prediction. Only
/// a well-formed token under valid credentials can move the SUT's store.
fn advance_state(
    event: &ContractEvent,
    prediction: &Prediction,
    token_value: Option<&str>,
    tracker: &mut Tracker,
    logged_in: &mut HashSet<String>,
) {
    if event.token != TokenClass::WellFormed || !event.key.is_valid() {
        return;
    }
    if let Some(token) = token_value {
        if prediction.next_state == SessionState::LoggedIn {
            logged_in.insert(token.to_string());
        }
        tracker.set_state(token, prediction.next_state);
    }
}

fn result_label(prediction: &Prediction) -> String {
    format!(
        "{} with result {:?}",
        prediction.expected_label(),
        prediction.result
    )
}

fn join_statuses(statuses: &[u16]) -> String {
    statuses
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

fn failure_id(scenario: &str, seq: usize) -> String {
    format!("{scenario}#{seq}")
}

/// What the contract says the shared state should look like right now:
/// per-token session states plus the stubbed upstream healths.
struct Tracker {
    auth: UpstreamHealth,
    action_upstream: UpstreamHealth,
    states: HashMap<String, SessionState>,
}

impl Tracker {
    fn new() -> Self {
        Self {
            auth: UpstreamHealth::Healthy,
            action_upstream: UpstreamHealth::Healthy,
            states: HashMap::new(),
        }
    }

    fn observe_stub(&mut self, rule: &StubRule) {
        let health = UpstreamHealth::from_status(rule.status);
        match rule.path.as_str() {
            AUTH_PATH => self.auth = health,
            ACTION_PATH => self.action_upstream = health,
            _ => {}
        }
    }

    fn state_of(&self, token: Option<&str>) -> SessionState {
        token
            .and_then(|t| self.states.get(t))
            .copied()
            .unwrap_or_default()
    }

    fn set_state(&mut self, token: &str, state: SessionState) {
        self.states.insert(token.to_string(), state);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Client(#[from] ClientError),
}

// Integration coverage lives in tests/conformance.rs, where the runner
// drives a reference SUT. The tests here exercise the loop against the mock
// standing in as a degenerate SUT that answers from a fixed stub.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::builtin_suite;

    const SUT_PATH: &str = "/endpoint";

    fn sut_stub(status: u16, body: &str) -> StubRule {
        StubRule {
            method: "POST".to_string(),
            path: SUT_PATH.to_string(),
            status,
            content_type: "application/json".to_string(),
            body: body.to_string(),
        }
    }

    fn runner_for(mock: &UpstreamMock) -> SuiteRunner {
        let config = Config {
            base_url: format!("{}{SUT_PATH}", mock.base_url()),
            api_key: "qazWSXedc".to_string(),
            ..Config::default()
        };
        SuiteRunner::from_config(&config).with_quiet(true)
    }

    #[test]
    fn matching_outcome_passes() {
        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        let runner = runner_for(&mock);

        // Stubbed SUT answers 200 OK; the oracle predicts exactly that for a
        // first login.
        let scenarios = [Scenario::new("first login")
            .stub(sut_stub(200, r#"{"result":"OK"}"#))
            .send(SendStep::op(SessionOp::Login))];

        let report = runner.run(&scenarios, &mock).unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.passed, 1);
        assert!(report.scenarios[0].passed);
        assert_eq!(report.scenarios[0].steps.len(), 1);
    }

    #[test]
    fn status_mismatch_is_recorded_with_expected_set() {
        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        let runner = runner_for(&mock);

        // Action without login must be 400/ERROR; the stub answers 200 OK.
        let scenarios = [Scenario::new("gate check")
            .stub(sut_stub(200, r#"{"result":"OK"}"#))
            .send(SendStep::op(SessionOp::Action))];

        let report = runner.run(&scenarios, &mock).unwrap();
        assert_eq!(report.failed, 1);
        let failure = &report.scenarios[0].failures[0];
        assert_eq!(failure.failure_type, FailureType::StatusMismatch);
        assert_eq!(failure.status_code, Some(200));
        assert_eq!(failure.expected.as_deref(), Some("400"));
    }

    #[test]
    fn result_mismatch_when_status_matches_but_body_disagrees() {
        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        let runner = runner_for(&mock);

        // 200 with result ERROR: status acceptable for login, body is not.
        let scenarios = [Scenario::new("body check")
            .stub(sut_stub(200, r#"{"result":"ERROR"}"#))
            .send(SendStep::op(SessionOp::Login))];

        let report = runner.run(&scenarios, &mock).unwrap();
        let failure = &report.scenarios[0].failures[0];
        assert_eq!(failure.failure_type, FailureType::ResultMismatch);
    }

    #[test]
    fn failed_scenario_stops_before_later_steps() {
        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        let runner = runner_for(&mock);

        let scenarios = [Scenario::new("aborts")
            .stub(sut_stub(200, r#"{"result":"ERROR"}"#))
            .send(SendStep::op(SessionOp::Login))
            .send(SendStep::op(SessionOp::Action))];

        let report = runner.run(&scenarios, &mock).unwrap();
        assert_eq!(report.scenarios[0].steps.len(), 1, "second send skipped");
    }

    #[test]
    fn idempotence_check_passes_on_identical_bodies() {
        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        let runner = runner_for(&mock);

        let scenarios = [Scenario::new("stable logout")
            .stub(sut_stub(200, r#"{"result":"OK"}"#))
            .send(SendStep::op(SessionOp::Logout).labeled("first"))
            .send(SendStep::op(SessionOp::Logout).with_expect(Expect::IdenticalTo("first")))];

        let report = runner.run(&scenarios, &mock).unwrap();
        assert_eq!(report.passed, 1, "{:?}", report.scenarios[0].failures);
    }

    #[test]
    fn explicit_status_and_result_expectation_is_checked() {
        use sessioncheck_core::ResultField;

        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        let runner = runner_for(&mock);

        let scenarios = [Scenario::new("explicit expectation")
            .stub(sut_stub(400, r#"{"result":"OK"}"#))
            .send(
                SendStep::op(SessionOp::Login).with_expect(Expect::StatusAndResult(
                    vec![400],
                    ResultField::Error,
                )),
            )];

        let report = runner.run(&scenarios, &mock).unwrap();
        let failure = &report.scenarios[0].failures[0];
        assert_eq!(failure.failure_type, FailureType::ResultMismatch);
    }

    #[test]
    fn transport_failure_is_recorded_not_propagated() {
        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        // Nothing listens on the SUT side.
        let config = Config {
            base_url: "http://127.0.0.1:1/endpoint".to_string(),
            api_key: "qazWSXedc".to_string(),
            request_timeout_secs: 2,
            ..Config::default()
        };
        let runner = SuiteRunner::from_config(&config).with_quiet(true);

        let scenarios = [Scenario::new("dead sut").send(SendStep::op(SessionOp::Login))];
        let report = runner.run(&scenarios, &mock).unwrap();

        assert_eq!(report.failed, 1);
        let failure = &report.scenarios[0].failures[0];
        assert_eq!(failure.failure_type, FailureType::Transport);
        assert_eq!(failure.status_code, None);
    }

    #[test]
    fn stop_on_failure_aborts_the_run() {
        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        let runner = runner_for(&mock).with_stop_on_failure(true);

        let scenarios = [
            Scenario::new("fails first")
                .stub(sut_stub(200, r#"{"result":"OK"}"#))
                .send(SendStep::op(SessionOp::Action)),
            Scenario::new("never runs")
                .stub(sut_stub(200, r#"{"result":"OK"}"#))
                .send(SendStep::op(SessionOp::Login)),
        ];

        let report = runner.run(&scenarios, &mock).unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.scenarios.len(), 1);
    }

    #[test]
    fn filter_selects_by_substring() {
        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        let runner = runner_for(&mock).with_filter(Some("logout".to_string()));

        let suite = builtin_suite();
        let report = runner.run(&suite, &mock).unwrap();

        let expected = suite.iter().filter(|s| s.name.contains("logout")).count() as u64;
        assert_eq!(report.total, expected);
        assert!(report.total > 0);
    }

    #[test]
    fn scenario_isolation_resets_the_mock() {
        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        let runner = runner_for(&mock);

        // First scenario leaves a degraded /auth behind; the second must not
        // see it. Oracle: second login succeeds only with healthy defaults.
        let scenarios = [
            Scenario::new("degrades auth")
                .stub(sut_stub(500, r#"{"result":"ERROR"}"#))
                .stub(StubRule::degraded(AUTH_PATH, 500))
                .send(SendStep::op(SessionOp::Login)),
            Scenario::new("clean start")
                .stub(sut_stub(200, r#"{"result":"OK"}"#))
                .send(SendStep::op(SessionOp::Login)),
        ];

        let report = runner.run(&scenarios, &mock).unwrap();
        assert_eq!(report.passed, 2, "{:#?}", report.all_failures());
    }
}
