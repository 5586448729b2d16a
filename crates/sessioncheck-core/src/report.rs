//! Run report: machine-readable record of every scenario, step and failure.
//!
//! One `report.json` per run. Secret header values are masked by default so
//! reports can be attached to CI artifacts without leaking the API key.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::verdict::{Failure, RequestSnapshot, ResponseSnapshot};

/// Headers that should be masked in reports for security.
const SENSITIVE_HEADERS: &[&str] = &["x-api-key", "authorization", "cookie", "set-cookie"];

/// Mask value for redacted headers.
const MASK: &str = "***";

/// Request/response pair for one executed step.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StepRecord {
    /// Step label when the scenario named it (idempotence anchors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Operation label, e.g. "LOGIN" or "(no action)"
    pub operation: String,
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,
}

/// Outcome of one scenario.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioReport {
    pub name: String,
    pub passed: bool,
    /// Steps actually executed (a failed scenario stops early)
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<Failure>,
}

/// Complete run output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    /// Scenarios executed
    pub total: u64,
    /// Scenarios that passed every assertion
    pub passed: u64,
    /// Scenarios with at least one failure
    pub failed: u64,
    pub scenarios: Vec<ScenarioReport>,
    /// Run-level errors (mock bind failure, cleanup trouble, etc.)
    #[serde(default)]
    pub errors: Vec<String>,
}

impl RunReport {
    /// All failures across scenarios, in execution order.
    #[must_use]
    pub fn all_failures(&self) -> Vec<Failure> {
        self.scenarios
            .iter()
            .flat_map(|s| s.failures.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.failed == 0 && self.errors.is_empty() && self.total > 0
    }
}

/// Write the report as pretty JSON to `<dir>/report.json`.
///
/// Returns the written path.
///
/// # Errors
///
/// Returns error if the directory cannot be created or the file cannot be
/// written.
pub fn write_report(
    report: &RunReport,
    dir: &Path,
    mask_secrets: bool,
) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| ReportError::Io(format!("create {}: {e}", dir.display())))?;

    let to_write = if mask_secrets {
        mask_report(report)
    } else {
        report.clone()
    };

    let path = dir.join("report.json");
    let json = serde_json::to_string_pretty(&to_write)
        .map_err(|e| ReportError::Serialize(e.to_string()))?;
    std::fs::write(&path, json)
        .map_err(|e| ReportError::Io(format!("write {}: {e}", path.display())))?;

    Ok(path)
}

/// Returns true if the header name matches a known sensitive header (case-insensitive).
fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|&h| name.eq_ignore_ascii_case(h))
}

fn mask_request(request: &mut RequestSnapshot) {
    for (key, value) in request.headers.iter_mut() {
        if is_sensitive_header(key) {
            *value = MASK.to_string();
        }
    }
}

/// Mask sensitive headers in every snapshot of the report.
fn mask_report(report: &RunReport) -> RunReport {
    let mut masked = report.clone();
    for scenario in &mut masked.scenarios {
        for step in &mut scenario.steps {
            mask_request(&mut step.request);
        }
        for failure in &mut scenario.failures {
            mask_request(&mut failure.request);
        }
    }
    masked
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
}
