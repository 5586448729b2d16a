//! Observed outcome of one request against the SUT.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The `result` field of the SUT's JSON response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultField {
    Ok,
    Error,
}

/// Shape of a terminal response body: `{"result": "OK"}` / `{"result": "ERROR"}`.
#[derive(Deserialize)]
struct ResultBody {
    result: ResultField,
}

/// Status, body and parsed result field for one request.
///
/// The raw body is kept verbatim: idempotence assertions compare bytes, not
/// parsed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Outcome {
    /// HTTP status code
    pub status: u16,
    /// Response body, untouched
    pub body: String,
    /// Parsed `result` field; `None` when the body is not the contract shape
    pub result: Option<ResultField>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

impl Outcome {
    /// Build from raw response parts. The result field is parsed leniently:
    /// a body that is not a JSON object with a `result` of `"OK"` or
    /// `"ERROR"` yields `None` rather than an error, since several contract
    /// rows leave the body unspecified.
    #[must_use]
    pub fn new(status: u16, body: String, latency_ms: u64) -> Self {
        let result = serde_json::from_str::<ResultBody>(&body)
            .ok()
            .map(|b| b.result);
        Self {
            status,
            body,
            result,
            latency_ms,
        }
    }

    /// Byte-identical comparison used by idempotence assertions: same status
    /// and exactly the same body.
    #[must_use]
    pub fn same_wire_outcome(&self, other: &Self) -> bool {
        self.status == other.status && self.body == other.body
    }
}
