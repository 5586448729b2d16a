//! Fault-injection mock for the SUT's upstream dependencies.
//!
//! Stands in for `/auth` and `/doAction` at a fixed network address: the SUT
//! must be configured to call this listener, a test-environment contract the
//! harness cannot infer. Scenarios install stub rules; the serve thread
//! answers every request from the rule table and records it in the call
//! history. Unmatched requests get a 404.

use std::collections::HashMap;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tiny_http::{Header, Response, Server};

/// Upstream path the SUT calls for credential verification.
pub const AUTH_PATH: &str = "/auth";

/// Upstream path the SUT calls for the business action.
pub const ACTION_PATH: &str = "/doAction";

/// Canned response for one `(method, path)` pair. Last write wins; scenarios
/// are expected to define at most one rule per path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubRule {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl StubRule {
    /// Healthy upstream: `200 {"result":"OK"}`.
    #[must_use]
    pub fn healthy(path: &str) -> Self {
        Self {
            method: "POST".to_string(),
            path: path.to_string(),
            status: 200,
            content_type: "application/json".to_string(),
            body: r#"{"result":"OK"}"#.to_string(),
        }
    }

    /// Degraded upstream: the given status with `{"result":"ERROR"}`.
    #[must_use]
    pub fn degraded(path: &str, status: u16) -> Self {
        Self {
            status,
            body: r#"{"result":"ERROR"}"#.to_string(),
            ..Self::healthy(path)
        }
    }
}

/// One request the mock answered, for post-hoc inspection.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[derive(Default)]
struct MockState {
    rules: Mutex<HashMap<(String, String), StubRule>>,
    history: Mutex<Vec<RecordedRequest>>,
    shutdown: AtomicBool,
}

/// Programmable upstream stand-in, bound to one listener for the duration of
/// the run. Dropping it stops the serve thread and frees the port.
pub struct UpstreamMock {
    state: Arc<MockState>,
    addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl UpstreamMock {
    /// Bind the listener and start serving.
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound.
    pub fn start(addr: &str) -> Result<Self, MockError> {
        let server =
            Server::http(addr).map_err(|e| MockError::Bind(addr.to_string(), e.to_string()))?;
        let local = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| MockError::Bind(addr.to_string(), "no IP listen address".to_string()))?;

        let state = Arc::new(MockState::default());
        let serve_state = Arc::clone(&state);
        let handle = std::thread::spawn(move || serve(&server, &serve_state));

        Ok(Self {
            state,
            addr: local,
            handle: Some(handle),
        })
    }

    /// Actual bound address (useful with port 0).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the listener, e.g. `http://127.0.0.1:8888`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Clear all stub rules and the call history. Runs before every
    /// scenario; a rule leaking across scenarios is a harness bug, not a
    /// SUT bug.
    pub fn reset(&self) {
        self.rules().clear();
        self.history_lock().clear();
    }

    /// Install or replace the rule for the rule's `(method, path)`.
    pub fn stub(&self, rule: StubRule) {
        let key = (rule.method.clone(), rule.path.clone());
        self.rules().insert(key, rule);
    }

    /// Shorthand: healthy `200 {"result":"OK"}` for `path`.
    pub fn stub_healthy(&self, path: &str) {
        self.stub(StubRule::healthy(path));
    }

    /// Shorthand: `{"result":"ERROR"}` with the given status for `path`.
    pub fn stub_degraded(&self, path: &str, status: u16) {
        self.stub(StubRule::degraded(path, status));
    }

    /// All requests answered since the last reset.
    #[must_use]
    pub fn history(&self) -> Vec<RecordedRequest> {
        self.history_lock().clone()
    }

    /// How many requests hit `path` since the last reset.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> usize {
        self.history_lock().iter().filter(|r| r.path == path).count()
    }

    fn rules(&self) -> MutexGuard<'_, HashMap<(String, String), StubRule>> {
        self.state.rules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn history_lock(&self) -> MutexGuard<'_, Vec<RecordedRequest>> {
        self.state
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for UpstreamMock {
    fn drop(&mut self) {
        self.state.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(server: &Server, state: &MockState) {
    while !state.shutdown.load(Ordering::SeqCst) {
        match server.recv_timeout(Duration::from_millis(50)) {
            Ok(Some(mut request)) => {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);

                let method = request.method().to_string();
                let path = request
                    .url()
                    .split('?')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                let headers = request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.to_string()))
                    .collect();

                state
                    .history
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(RecordedRequest {
                        method: method.clone(),
                        path: path.clone(),
                        headers,
                        body,
                    });

                let rule = state
                    .rules
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&(method, path))
                    .cloned();

                let response = match rule {
                    Some(rule) => {
                        let mut response =
                            Response::from_string(rule.body).with_status_code(rule.status);
                        if let Ok(header) =
                            Header::from_bytes("Content-Type", rule.content_type.as_bytes())
                        {
                            response = response.with_header(header);
                        }
                        response
                    }
                    None => {
                        Response::from_string("{}").with_status_code(tiny_http::StatusCode(404))
                    }
                };
                let _ = request.respond(response);
            }
            Ok(None) => {}
            Err(_) => break,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Cannot bind mock listener on {0}: {1}")]
    Bind(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> (UpstreamMock, reqwest::blocking::Client) {
        let mock = UpstreamMock::start("127.0.0.1:0").unwrap();
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        (mock, client)
    }

    fn post(client: &reqwest::blocking::Client, mock: &UpstreamMock, path: &str) -> (u16, String) {
        let response = client
            .post(format!("{}{path}", mock.base_url()))
            .send()
            .unwrap();
        let status = response.status().as_u16();
        (status, response.text().unwrap())
    }

    #[test]
    fn stubbed_path_answers_with_the_rule() {
        let (mock, client) = start();
        mock.stub_healthy(AUTH_PATH);

        let (status, body) = post(&client, &mock, AUTH_PATH);
        assert_eq!(status, 200);
        assert_eq!(body, r#"{"result":"OK"}"#);
    }

    #[test]
    fn unmatched_request_is_404() {
        let (mock, client) = start();
        let (status, _) = post(&client, &mock, "/unknown");
        assert_eq!(status, 404);
    }

    #[test]
    fn method_is_part_of_the_key() {
        let (mock, client) = start();
        mock.stub_healthy(AUTH_PATH);

        let response = client
            .get(format!("{}{AUTH_PATH}", mock.base_url()))
            .send()
            .unwrap();
        assert_eq!(response.status().as_u16(), 404, "rule is POST-only");
    }

    #[test]
    fn last_write_wins() {
        let (mock, client) = start();
        mock.stub_healthy(AUTH_PATH);
        mock.stub_degraded(AUTH_PATH, 500);

        let (status, body) = post(&client, &mock, AUTH_PATH);
        assert_eq!(status, 500);
        assert_eq!(body, r#"{"result":"ERROR"}"#);
    }

    #[test]
    fn reset_clears_rules_and_history() {
        let (mock, client) = start();
        mock.stub_healthy(AUTH_PATH);
        post(&client, &mock, AUTH_PATH);
        assert_eq!(mock.requests_to(AUTH_PATH), 1);

        mock.reset();
        assert_eq!(mock.requests_to(AUTH_PATH), 0);
        let (status, _) = post(&client, &mock, AUTH_PATH);
        assert_eq!(status, 404, "rule gone after reset");
    }

    #[test]
    fn history_records_method_path_and_body() {
        let (mock, client) = start();
        mock.stub_healthy(ACTION_PATH);

        client
            .post(format!("{}{ACTION_PATH}", mock.base_url()))
            .body("payload=1")
            .send()
            .unwrap();

        let history = mock.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].method, "POST");
        assert_eq!(history[0].path, ACTION_PATH);
        assert_eq!(history[0].body, "payload=1");
    }

    #[test]
    fn history_records_headers() {
        let (mock, client) = start();
        mock.stub_healthy(AUTH_PATH);

        client
            .post(format!("{}{AUTH_PATH}", mock.base_url()))
            .header("X-Probe", "abc")
            .send()
            .unwrap();

        let history = mock.history();
        assert!(
            history[0]
                .headers
                .iter()
                .any(|(k, v)| k.eq_ignore_ascii_case("x-probe") && v == "abc")
        );
    }

    #[test]
    fn degraded_rule_carries_custom_status() {
        let (mock, client) = start();
        mock.stub_degraded(ACTION_PATH, 503);
        let (status, body) = post(&client, &mock, ACTION_PATH);
        assert_eq!(status, 503);
        assert_eq!(body, r#"{"result":"ERROR"}"#);
    }
}
