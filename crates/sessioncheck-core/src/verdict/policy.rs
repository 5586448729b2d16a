//! Verdict policy - determines how failures are filtered and judged

use super::{Failure, FailureType, Severity};

/// Policy for filtering and judging failures
#[derive(Debug, Clone)]
pub struct VerdictPolicy {
    /// Strict mode: warnings become errors
    pub strict: bool,
    /// Status codes to ignore
    pub ignore_status_codes: Vec<u16>,
    /// Failure types to ignore
    pub ignore_failure_types: Vec<FailureType>,
    /// Minimum severity to report (below this = ignored)
    pub min_severity: Severity,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            strict: true, // Default is strict - explicit opt-out required
            ignore_status_codes: vec![],
            ignore_failure_types: vec![],
            min_severity: Severity::Warning,
        }
    }
}

impl VerdictPolicy {
    /// Create a lenient policy (warnings don't fail)
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Default::default()
        }
    }

    /// Filter failures according to policy
    #[must_use]
    pub fn filter(&self, failures: Vec<Failure>) -> Vec<Failure> {
        failures
            .into_iter()
            .filter(|f| self.should_report(f))
            .collect()
    }

    /// Check if a failure should be reported
    fn should_report(&self, failure: &Failure) -> bool {
        // Check ignore lists
        if failure
            .status_code
            .is_some_and(|s| self.ignore_status_codes.contains(&s))
        {
            return false;
        }
        if self.ignore_failure_types.contains(&failure.failure_type) {
            return false;
        }
        // Check minimum severity
        if failure.severity < self.min_severity {
            return false;
        }
        true
    }

    /// Determine final exit code from failures and run-level errors.
    ///
    /// Returns the highest exit code among all failures,
    /// or 3 if there were errors (harness/tool trouble, no verdict reached).
    #[must_use]
    pub fn exit_code(&self, failures: &[Failure], has_errors: bool) -> i32 {
        let failure_code = failures
            .iter()
            .map(|f| f.severity.exit_code(self.strict))
            .max()
            .unwrap_or(0);

        if failure_code > 0 {
            return failure_code;
        }

        // Errors (mock bind failure, etc.) → exit 3 (tool error)
        if has_errors {
            return 3;
        }

        0
    }

    /// Determine verdict from scenario counts and filtered failures.
    ///
    /// PASS requires **all** scenarios to pass and at least one to run.
    /// Any failure or run-level error → FAIL.
    #[must_use]
    pub fn verdict(
        &self,
        failures: &[Failure],
        total: u64,
        passed: u64,
        error_count: u64,
    ) -> Verdict {
        let has_errors = error_count > 0;
        let exit_code = self.exit_code(failures, has_errors);

        // PASS iff every scenario passed (passed == total)
        let status = if passed == total && total > 0 && !has_errors {
            VerdictStatus::Pass
        } else {
            VerdictStatus::Fail
        };

        let reason = if status == VerdictStatus::Pass {
            "All scenarios passed".to_string()
        } else if total == 0 {
            "No scenarios were run".to_string()
        } else {
            let mut parts = Vec::new();
            if !failures.is_empty() {
                let critical = failures
                    .iter()
                    .filter(|f| f.severity == Severity::Critical)
                    .count();
                let error = failures
                    .iter()
                    .filter(|f| f.severity == Severity::Error)
                    .count();
                parts.push(format!(
                    "{} failures ({} critical, {} error) across {} scenarios",
                    failures.len(),
                    critical,
                    error,
                    total - passed
                ));
            }
            if has_errors {
                parts.push(format!("{error_count} errors (harness)"));
            }
            parts.join("; ")
        };

        Verdict {
            status,
            exit_code,
            reason,
        }
    }
}

/// Final verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub exit_code: i32,
    pub reason: String,
}

/// Pass or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}
