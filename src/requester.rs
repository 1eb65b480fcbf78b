//! Executes one HTTP transaction and produces a `RequestOutcome`.
//!
//! Issue the call, measure connect/response/total time, then classify the
//! result against the configured expectations in a fixed order —
//! transport failure first (nothing else is knowable), then status, then
//! headers and schema independently (either or both may fail on the same
//! response).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tracing::debug;

use crate::config::RequestSpec;
use crate::errors::{Failure, Validator};
use crate::types::RequestOutcome;

/// Owns everything needed to fire one request and grade its outcome.
pub struct Requester {
    client: reqwest::Client,
    spec: RequestSpec,
    validator: Option<Arc<dyn Validator>>,
}

impl Requester {
    pub fn new(client: reqwest::Client, spec: RequestSpec, validator: Option<Arc<dyn Validator>>) -> Self {
        Self {
            client,
            spec,
            validator,
        }
    }

    /// Runs the configured request once. Never panics or returns `Err` —
    /// every failure mode is represented in the returned outcome's
    /// `failures` list instead.
    pub async fn execute(&self) -> RequestOutcome {
        let start = Instant::now();
        let mut failures = Vec::new();

        // Connect-time approximation: when keep-alive reuse is expected,
        // the pooled connection is almost certainly warm, so we charge
        // zero connect time rather than pretend to measure a reused
        // socket's (nonexistent) handshake. Otherwise we pay for a
        // dedicated pre-flight TCP connect to the same host:port, purely
        // to produce a connect-time sample; the real request still goes
        // through reqwest's own connection handling.
        let connect_time = if self.spec.keep_alive {
            Duration::ZERO
        } else {
            self.measure_connect_time().await
        };

        let request_bytes = self.spec.body.len() as u64;

        let mut builder = self
            .client
            .request(self.spec.method.clone(), &self.spec.url)
            .timeout(self.spec.timeout);

        for (name, value) in &self.spec.headers {
            builder = builder.header(name, value);
        }
        if !self.spec.body.is_empty() {
            builder = builder.body(self.spec.body.clone());
        }

        let response_start = Instant::now();
        let send_result = builder.send().await;

        let outcome = match send_result {
            Err(e) => {
                failures.push(Failure::TransportError {
                    message: format!("request failed: {e}"),
                });
                RequestOutcome {
                    start,
                    finish: Instant::now(),
                    connect_time,
                    response_time: response_start.elapsed(),
                    total_time: start.elapsed(),
                    request_bytes,
                    response_bytes: 0,
                    failures,
                }
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let headers = response.headers().clone();

                if status != self.spec.expected_status {
                    failures.push(Failure::StatusCodeViolation {
                        observed: status,
                        expected: self.spec.expected_status,
                    });
                }

                let body = match response.bytes().await {
                    Ok(b) => b,
                    Err(e) => {
                        failures.push(Failure::TransportError {
                            message: format!("failed to read response body: {e}"),
                        });
                        bytes::Bytes::new()
                    }
                };
                let response_time = response_start.elapsed();
                let response_bytes = body.len() as u64;

                if let Some(validator) = &self.validator {
                    if !self.spec.expected_headers.is_empty() {
                        failures.extend(validator.validate_headers(&self.spec.expected_headers, &headers));
                    }
                    if let Some(schema) = &self.spec.json_schema {
                        failures.extend(validator.validate_schema(&body, schema));
                    }
                }

                RequestOutcome {
                    start,
                    finish: Instant::now(),
                    connect_time,
                    response_time,
                    total_time: start.elapsed(),
                    request_bytes,
                    response_bytes,
                    failures,
                }
            }
        };

        debug!(
            valid = outcome.is_valid(),
            total_ms = outcome.total_time.as_millis() as u64,
            "request completed"
        );

        outcome
    }

    /// Dedicated pre-flight connect, used only when keep-alive reuse is
    /// not expected to produce a meaningful sample from the pooled client.
    /// Runs on the async runtime rather than blocking a worker thread.
    async fn measure_connect_time(&self) -> Duration {
        let host = match reqwest::Url::parse(&self.spec.url) {
            Ok(url) => {
                let host = url.host_str().unwrap_or("").to_string();
                let port = url
                    .port_or_known_default()
                    .unwrap_or(if url.scheme() == "https" { 443 } else { 80 });
                format!("{host}:{port}")
            }
            Err(_) => return Duration::ZERO,
        };

        let connect_start = Instant::now();
        match TcpStream::connect(&host).await {
            Ok(_) => connect_start.elapsed(),
            Err(_) => Duration::ZERO,
        }
    }
}
