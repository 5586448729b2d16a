//! HTTP file generator - converts failures to .http format

use crate::verdict::{Failure, RequestSnapshot};

/// Generate .http file content from failures
pub fn to_http_file(failures: &[Failure], base_url_var: &str) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "# Auto-generated reproduction cases ({} failures)",
        failures.len()
    ));
    lines.push(format!("# Base URL variable: {{{{{base_url_var}}}}}"));
    lines.push(String::new());

    for (idx, failure) in failures.iter().enumerate() {
        let status = failure
            .status_code
            .map_or_else(|| "no response".to_string(), |s| s.to_string());
        lines.push(format!(
            "### [{idx}] {} - {} ({status})",
            failure.severity, failure.failure_type
        ));
        lines.push(format!("# Scenario: {}", failure.scenario));
        if let Some(expected) = &failure.expected {
            lines.push(format!("# Expected: {expected}"));
        }

        // Request line
        let url = if failure.request.url.starts_with("http") {
            failure.request.url.clone()
        } else {
            format!("{{{{{base_url_var}}}}}{}", failure.request.url)
        };
        lines.push(format!("{} {}", failure.request.method, url));

        // Headers
        for (key, value) in &failure.request.headers {
            if !matches!(key.to_lowercase().as_str(), "host" | "content-length") {
                lines.push(format!("{key}: {value}"));
            }
        }

        // Body
        if let Some(body) = &failure.request.body {
            if !failure.request.headers.contains_key("Content-Type") {
                lines.push("Content-Type: application/x-www-form-urlencoded".to_string());
            }
            lines.push(String::new());
            lines.push(body.clone());
        }

        lines.push(String::new());
        lines.push("###".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Generate a single request as .http format
pub fn request_to_http(request: &RequestSnapshot, comment: Option<&str>) -> String {
    let mut lines = Vec::new();

    if let Some(c) = comment {
        lines.push(format!("### {c}"));
    }

    lines.push(format!("{} {}", request.method, request.url));

    for (key, value) in &request.headers {
        lines.push(format!("{key}: {value}"));
    }

    if let Some(body) = &request.body {
        lines.push(String::new());
        lines.push(body.clone());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::FailureType;
    use std::collections::HashMap;

    fn sample_failure() -> Failure {
        let request = RequestSnapshot {
            method: "POST".to_string(),
            url: "http://localhost:8080/endpoint".to_string(),
            headers: HashMap::from([("X-Api-Key".to_string(), "***".to_string())]),
            body: Some("token=A123456789012345678901234567890Z&action=ACTION".to_string()),
        };

        Failure::new(
            "f1",
            "action without login rejected",
            "ACTION",
            FailureType::StatusMismatch,
            request,
        )
        .with_status(200)
        .with_expected("400")
    }

    #[test]
    fn generates_http_file_header() {
        let failures = vec![sample_failure()];
        let output = to_http_file(&failures, "base_url");

        assert!(output.contains("# Auto-generated reproduction cases (1 failures)"));
        assert!(output.contains("{{base_url}}"));
    }

    #[test]
    fn generates_request_with_method_and_url() {
        let failures = vec![sample_failure()];
        let output = to_http_file(&failures, "base_url");

        assert!(output.contains("POST http://localhost:8080/endpoint"));
    }

    #[test]
    fn includes_scenario_and_expected() {
        let failures = vec![sample_failure()];
        let output = to_http_file(&failures, "base_url");

        assert!(output.contains("# Scenario: action without login rejected"));
        assert!(output.contains("# Expected: 400"));
    }

    #[test]
    fn includes_headers_and_form_body() {
        let failures = vec![sample_failure()];
        let output = to_http_file(&failures, "base_url");

        assert!(output.contains("X-Api-Key: ***"));
        assert!(output.contains("Content-Type: application/x-www-form-urlencoded"));
        assert!(output.contains("token=A123456789012345678901234567890Z&action=ACTION"));
    }

    #[test]
    fn includes_severity_and_status() {
        let failures = vec![sample_failure()];
        let output = to_http_file(&failures, "base_url");

        assert!(output.contains("critical"));
        assert!(output.contains("(200)"));
    }

    #[test]
    fn transport_failure_shows_no_response() {
        let mut failure = sample_failure();
        failure.status_code = None;
        let output = to_http_file(&[failure], "base_url");
        assert!(output.contains("(no response)"));
    }

    #[test]
    fn request_to_http_basic() {
        let request = RequestSnapshot {
            method: "POST".to_string(),
            url: "http://localhost:8888/auth".to_string(),
            headers: HashMap::new(),
            body: None,
        };

        let output = request_to_http(&request, Some("Upstream probe"));

        assert!(output.contains("### Upstream probe"));
        assert!(output.contains("POST http://localhost:8888/auth"));
    }
}
