//! Failure taxonomy for request outcomes.
//!
//! A tagged sum type with a uniform `category`/message abstraction and
//! per-variant data, matched on directly rather than queried through a
//! type test — replaces the class-of-status-code categorization an HTTP
//! client module might otherwise reach for with something that also
//! covers header and schema validation failures.

use std::collections::HashMap;
use std::fmt;

use reqwest::header::HeaderMap;

/// One thing that went wrong with a request, recorded on its `RequestOutcome`.
///
/// An empty failure list means the outcome succeeded outright.
#[derive(Debug, Clone)]
pub enum Failure {
    /// The request could not be delivered, or the response could not be read.
    TransportError { message: String },

    /// A wire response was received but its status disagreed with configuration.
    StatusCodeViolation { observed: u16, expected: u16 },

    /// One or more required response headers were missing or mismatched.
    HeaderViolation { missing: HashMap<String, String> },

    /// The response body failed JSON-schema validation.
    SchemaViolation { errors: Vec<String> },
}

impl Failure {
    /// Stable grouping key, used as the map key in `AggregatedStats::failure_counts`.
    pub fn category(&self) -> &'static str {
        match self {
            Failure::TransportError { .. } => "transport_error",
            Failure::StatusCodeViolation { .. } => "status_code_violation",
            Failure::HeaderViolation { .. } => "header_violation",
            Failure::SchemaViolation { .. } => "schema_violation",
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> String {
        match self {
            Failure::TransportError { message } => message.clone(),
            Failure::StatusCodeViolation { observed, expected } => {
                format!("expected status {expected}, got {observed}")
            }
            Failure::HeaderViolation { missing } => {
                let mut names: Vec<_> = missing.keys().cloned().collect();
                names.sort();
                format!("missing or mismatched headers: {}", names.join(", "))
            }
            Failure::SchemaViolation { errors } => errors.join("; "),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category(), self.message())
    }
}

/// The header- and schema-validation boundary the core calls through.
///
/// A pure `response -> Vec<Failure>` contract — the core only depends on
/// this trait, not on any particular JSON-Schema engine. `DefaultValidator`
/// below is a minimal, literal implementation (exact header match,
/// structural JSON-type check) adequate for this crate's own tests; a
/// real deployment is expected to supply its own.
pub trait Validator: Send + Sync {
    /// Compare required response headers against what came back on the wire.
    fn validate_headers(
        &self,
        expected: &HashMap<String, String>,
        actual: &HeaderMap,
    ) -> Vec<Failure>;

    /// Validate a response body against a JSON-schema document.
    fn validate_schema(&self, body: &[u8], schema: &str) -> Vec<Failure>;
}

/// Literal, dependency-free implementation of the `Validator` boundary.
///
/// Header checks are an exact string match. Schema checks only verify the
/// body parses as JSON and, when the schema itself is a JSON object with a
/// `required` array, that those top-level keys are present — enough to
/// exercise the boundary in tests without pulling in a schema engine the
/// spec treats as external.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValidator;

impl Validator for DefaultValidator {
    fn validate_headers(
        &self,
        expected: &HashMap<String, String>,
        actual: &HeaderMap,
    ) -> Vec<Failure> {
        if expected.is_empty() {
            return Vec::new();
        }

        let mut missing = HashMap::new();
        for (name, expected_value) in expected {
            let matches = actual
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(|v| v == expected_value)
                .unwrap_or(false);
            if !matches {
                missing.insert(name.clone(), expected_value.clone());
            }
        }

        if missing.is_empty() {
            Vec::new()
        } else {
            vec![Failure::HeaderViolation { missing }]
        }
    }

    fn validate_schema(&self, body: &[u8], schema: &str) -> Vec<Failure> {
        let parsed: serde_json::Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                return vec![Failure::SchemaViolation {
                    errors: vec![format!("response body is not valid JSON: {e}")],
                }]
            }
        };

        let schema: serde_json::Value = match serde_json::from_str(schema) {
            Ok(v) => v,
            Err(e) => {
                return vec![Failure::SchemaViolation {
                    errors: vec![format!("schema document is not valid JSON: {e}")],
                }]
            }
        };

        let required = schema
            .get("required")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();

        let mut errors = Vec::new();
        for field in required {
            if let Some(name) = field.as_str() {
                if parsed.get(name).is_none() {
                    errors.push(format!("missing required field '{name}'"));
                }
            }
        }

        if errors.is_empty() {
            Vec::new()
        } else {
            vec![Failure::SchemaViolation { errors }]
        }
    }
}
