//! Blocking HTTP client for the SUT endpoint.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sessioncheck_core::{Outcome, RequestSnapshot};

/// Sends single-attempt form posts to the SUT. No retries and no hidden
/// recovery: a retry is a scenario-level decision, never the client's.
pub struct SessionClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl SessionClient {
    /// Build a client with the given per-request deadline.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    /// Send one request. `None` fields stay off the wire entirely: a missing
    /// form field is not an empty one, and a missing `X-Api-Key` header is
    /// not an empty header; the 401-vs-403 boundary tests depend on the
    /// difference. Field values pass through literally, so the SUT's own
    /// required-field validation is what gets exercised.
    ///
    /// # Errors
    ///
    /// `Timeout` when the client deadline elapses, `Transport` for
    /// connection-level failures.
    pub fn send(
        &self,
        token: Option<&str>,
        action: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<Outcome, ClientError> {
        let mut form: Vec<(&str, &str)> = Vec::new();
        if let Some(t) = token {
            form.push(("token", t));
        }
        if let Some(a) = action {
            form.push(("action", a));
        }

        let mut request = self
            .http
            .post(&self.base_url)
            .header("Accept", "application/json")
            .form(&form);
        if let Some(key) = api_key {
            request = request.header("X-Api-Key", key);
        }

        let start = Instant::now();
        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(e.to_string())
            } else {
                ClientError::Transport(e.to_string())
            }
        })?;
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(Outcome::new(status, body, latency_ms))
    }

    /// Snapshot of the request `send` would issue, for reports and repro
    /// files.
    #[must_use]
    pub fn request_snapshot(
        &self,
        token: Option<&str>,
        action: Option<&str>,
        api_key: Option<&str>,
    ) -> RequestSnapshot {
        let mut headers =
            HashMap::from([("Accept".to_string(), "application/json".to_string())]);
        if let Some(key) = api_key {
            headers.insert("X-Api-Key".to_string(), key.to_string());
        }
        RequestSnapshot {
            method: "POST".to_string(),
            url: self.base_url.clone(),
            headers,
            body: form_body(token, action),
        }
    }
}

fn form_body(token: Option<&str>, action: Option<&str>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(t) = token {
        parts.push(format!("token={t}"));
    }
    if let Some(a) = action {
        parts.push(format!("action={a}"));
    }
    (!parts.is_empty()).then(|| parts.join("&"))
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP client build error: {0}")]
    Build(String),
    #[error("request deadline exceeded: {0}")]
    Timeout(String),
    #[error("transport error: {0}")]
    Transport(String),
}
