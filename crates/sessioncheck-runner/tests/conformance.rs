//! End-to-end conformance run: the builtin suite against an in-test
//! reference implementation of the session API.
//!
//! The reference SUT obeys the documented contract exactly, including the
//! `/auth`-before-session-store order on ACTION and LOGOUT. Against it the
//! whole suite must pass; against a variant with one seeded defect, the
//! matching scenario must fail with the matching failure type.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tiny_http::{Header, Response, Server};

use sessioncheck_core::{Config, FailureType, is_well_formed};
use sessioncheck_runner::{SuiteRunner, UpstreamMock, builtin_suite};

const API_KEY: &str = "qazWSXedc";
const OK_BODY: &str = r#"{"result":"OK"}"#;
const ERROR_BODY: &str = r#"{"result":"ERROR"}"#;

/// Which contract rule the reference SUT deliberately breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Defect {
    None,
    /// Second LOGIN on an active session answers 200 instead of 409
    AllowDoubleLogin,
    /// ACTION works without a session
    SkipSessionCheck,
    /// LOGOUT responses carry a counter, so repeats differ byte-wise
    UnstableLogoutBody,
    /// Token format is never checked
    SkipTokenValidation,
}

struct ReferenceSut {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReferenceSut {
    fn start(upstream_base: String, defect: Defect) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let handle = std::thread::spawn(move || {
            let http = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap();
            let mut sessions: HashSet<String> = HashSet::new();
            let mut logout_seq: u64 = 0;

            while !flag.load(Ordering::SeqCst) {
                match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(mut request)) => {
                        let mut body = String::new();
                        let _ = request.as_reader().read_to_string(&mut body);
                        let api_key = request
                            .headers()
                            .iter()
                            .find(|h| h.field.equiv("X-Api-Key"))
                            .map(|h| h.value.to_string());

                        let (status, payload) = handle_request(
                            &http,
                            &upstream_base,
                            defect,
                            &mut sessions,
                            &mut logout_seq,
                            api_key.as_deref(),
                            &body,
                        );
                        let response = Response::from_string(payload)
                            .with_status_code(status)
                            .with_header(
                                Header::from_bytes("Content-Type", "application/json").unwrap(),
                            );
                        let _ = request.respond(response);
                    }
                    Ok(None) => {}
                    Err(_) => break,
                }
            }
        });

        Self {
            addr,
            shutdown,
            handle: Some(handle),
        }
    }

    fn endpoint(&self) -> String {
        format!("http://{}/endpoint", self.addr)
    }
}

impl Drop for ReferenceSut {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_request(
    http: &reqwest::blocking::Client,
    upstream_base: &str,
    defect: Defect,
    sessions: &mut HashSet<String>,
    logout_seq: &mut u64,
    api_key: Option<&str>,
    body: &str,
) -> (u16, String) {
    // Credential gate first, then field validation, then the operation.
    if api_key.is_none_or(|k| k.is_empty() || k != API_KEY) {
        return (401, ERROR_BODY.to_string());
    }

    let fields = parse_form(body);
    let (Some(token), Some(action)) = (fields.get("token"), fields.get("action")) else {
        return (400, ERROR_BODY.to_string());
    };
    if defect != Defect::SkipTokenValidation && !is_well_formed(token) {
        return (400, ERROR_BODY.to_string());
    }

    match action.as_str() {
        "LOGIN" => {
            if sessions.contains(token) {
                if defect == Defect::AllowDoubleLogin {
                    return (200, OK_BODY.to_string());
                }
                return (409, ERROR_BODY.to_string());
            }
            if !upstream_ok(http, upstream_base, "/auth") {
                return (500, ERROR_BODY.to_string());
            }
            sessions.insert(token.clone());
            (200, OK_BODY.to_string())
        }
        "ACTION" => {
            if !upstream_ok(http, upstream_base, "/auth") {
                return (500, ERROR_BODY.to_string());
            }
            if !sessions.contains(token) && defect != Defect::SkipSessionCheck {
                return (400, ERROR_BODY.to_string());
            }
            if !upstream_ok(http, upstream_base, "/doAction") {
                return (500, ERROR_BODY.to_string());
            }
            (200, OK_BODY.to_string())
        }
        "LOGOUT" => {
            if !upstream_ok(http, upstream_base, "/auth") {
                return (500, ERROR_BODY.to_string());
            }
            sessions.remove(token);
            if defect == Defect::UnstableLogoutBody {
                *logout_seq += 1;
                return (200, format!(r#"{{"result":"OK","seq":{logout_seq}}}"#));
            }
            (200, OK_BODY.to_string())
        }
        _ => (400, ERROR_BODY.to_string()),
    }
}

fn upstream_ok(http: &reqwest::blocking::Client, base: &str, path: &str) -> bool {
    http.post(format!("{base}{path}"))
        .send()
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}

fn parse_form(body: &str) -> HashMap<String, String> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((percent_decode(k), percent_decode(v)))
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn run_suite(defect: Defect) -> sessioncheck_core::RunReport {
    let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
    let sut = ReferenceSut::start(mock.base_url(), defect);

    let config = Config {
        base_url: sut.endpoint(),
        api_key: API_KEY.to_string(),
        mock_addr: mock.local_addr().to_string(),
        ..Config::default()
    };
    let runner = SuiteRunner::from_config(&config).with_quiet(true);
    runner.run(&builtin_suite(), &mock).unwrap()
}

#[test]
fn conforming_sut_passes_every_scenario() {
    let report = run_suite(Defect::None);
    assert_eq!(report.failed, 0, "failures: {:#?}", report.all_failures());
    assert_eq!(report.passed, report.total);
    assert!(report.is_pass());
}

#[test]
fn double_login_defect_is_caught() {
    let report = run_suite(Defect::AllowDoubleLogin);
    let failures = report.all_failures();
    assert!(
        failures.iter().any(|f| {
            f.scenario.contains("repeated login") && f.failure_type == FailureType::StatusMismatch
        }),
        "failures: {failures:#?}"
    );
}

#[test]
fn missing_session_gate_is_caught() {
    let report = run_suite(Defect::SkipSessionCheck);
    let failures = report.all_failures();
    assert!(
        failures
            .iter()
            .any(|f| f.scenario.contains("action without login")),
        "failures: {failures:#?}"
    );
    assert!(
        failures
            .iter()
            .any(|f| f.scenario.contains("action after logout")),
        "failures: {failures:#?}"
    );
}

#[test]
fn unstable_logout_body_breaks_idempotence() {
    let report = run_suite(Defect::UnstableLogoutBody);
    let failures = report.all_failures();
    assert!(
        failures
            .iter()
            .any(|f| f.failure_type == FailureType::IdempotenceViolation),
        "failures: {failures:#?}"
    );
}

#[test]
fn skipped_token_validation_is_caught() {
    let report = run_suite(Defect::SkipTokenValidation);
    let failures = report.all_failures();
    // Every malformed-token scenario should now see a success where the
    // contract demands 400.
    assert!(
        failures.iter().any(|f| {
            f.scenario.contains("short token") && f.failure_type == FailureType::StatusMismatch
        }),
        "failures: {failures:#?}"
    );
}

#[test]
fn fault_injection_is_observed_by_the_sut() {
    // Sanity check on the coupling: a run drives real traffic through the
    // mock's /auth and /doAction stubs.
    let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
    let sut = ReferenceSut::start(mock.base_url(), Defect::None);

    let config = Config {
        base_url: sut.endpoint(),
        api_key: API_KEY.to_string(),
        mock_addr: mock.local_addr().to_string(),
        ..Config::default()
    };
    let runner = SuiteRunner::from_config(&config)
        .with_quiet(true)
        .with_filter(Some("action after login succeeds".to_string()));
    let report = runner.run(&builtin_suite(), &mock).unwrap();

    assert_eq!(report.passed, 1, "{:#?}", report.all_failures());
    // LOGIN hit /auth, ACTION hit /auth + /doAction, cleanup LOGOUT hit
    // /auth again.
    assert_eq!(mock.requests_to("/doAction"), 1);
    assert!(mock.requests_to("/auth") >= 3);
}
