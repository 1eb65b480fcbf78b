//! Configuration data model.
//!
//! A full CLI flag parser and configuration loader live outside this
//! crate — this module only owns the typed shape the core consumes
//! (`RequestSpec`, `ExecutionConfig`, `SloConfig`) plus a minimal
//! `Config::from_env` loader adequate to run the example binary. A
//! production deployment is expected to supply its own richer loader
//! (file + flags + env merge, hot reload, …) ahead of this boundary.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::ClientConfig;
use crate::load_models::RampPolicy;
use crate::utils::parse_duration_string;

/// Configuration errors with descriptive messages.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("mTLS configuration incomplete: both CLIENT_CERT_PATH and CLIENT_KEY_PATH must be set together, or neither")]
    IncompleteMtls,

    #[error("Invalid duration format for {var}: {message}")]
    InvalidDuration { var: String, message: String },

    #[error("URL validation failed: {0}")]
    InvalidUrl(String),

    #[error("{mode} mode requires {required}")]
    MissingModeParams { mode: String, required: String },
}

/// The three operational modes this engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Single-request validation: `requests_to_issue = 1`, `concurrency = 1`.
    Validate,
    /// Sustained-load scaling with a fixed total request count.
    Scale,
    /// Ramp-to-failure: offered load grows until SLOs are breached.
    Fail,
}

/// Everything the Requester needs to perform one HTTP transaction.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub keep_alive: bool,
    pub keep_alive_idle: Duration,
    pub expected_status: u16,
    pub expected_headers: HashMap<String, String>,
    pub json_schema: Option<String>,
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self {
            method: reqwest::Method::GET,
            url: String::new(),
            headers: HashMap::new(),
            body: Vec::new(),
            timeout: Duration::from_secs(30),
            tls_handshake_timeout: Duration::from_secs(10),
            keep_alive: true,
            keep_alive_idle: Duration::from_secs(90),
            expected_status: 200,
            expected_headers: HashMap::new(),
            json_schema: None,
        }
    }
}

/// Execution parameters: mode, pacing, concurrency, and cadences.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub mode: Mode,
    pub concurrency: usize,
    pub requests_to_issue: u64,
    pub max_execution_time: Duration,
    pub warm_up: Duration,
    pub analysis_cadence: Duration,
    pub throughput_cadence: Duration,
    pub render_cadence: Duration,
    pub heartbeat_interval: Duration,
    pub throughput_window: Duration,
    /// Ordered, values in (0,1). Every percentile array in `AggregatedStats`
    /// is index-aligned with this list.
    pub quantiles: Vec<f64>,
    /// Ramp-to-failure rate policy (ignored outside `Mode::Fail`).
    pub ramp: RampPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Scale,
            concurrency: 10,
            requests_to_issue: 100,
            max_execution_time: Duration::from_secs(2 * 60 * 60),
            warm_up: Duration::ZERO,
            analysis_cadence: Duration::from_millis(200),
            throughput_cadence: Duration::from_millis(500),
            render_cadence: Duration::from_millis(200),
            heartbeat_interval: Duration::from_millis(100),
            throughput_window: Duration::from_secs(5),
            quantiles: vec![0.5, 0.9, 0.95, 0.99],
            ramp: RampPolicy::new(10.0, 1.0),
        }
    }
}

/// Service-level-objective thresholds. `latency_budgets` is index-aligned
/// with `ExecutionConfig::quantiles`.
#[derive(Debug, Clone)]
pub struct SloConfig {
    /// Percentage points (0-100), compared directly against
    /// `AggregatedStats::harvest`.
    pub harvest_pct: f64,
    /// Percentage points (0-100), compared directly against
    /// `AggregatedStats::yield_pct`.
    pub yield_pct: f64,
    pub throughput_responses_per_sec: f64,
    pub latency_budgets: Vec<Duration>,
}

impl Default for SloConfig {
    fn default() -> Self {
        Self {
            harvest_pct: 0.0,
            yield_pct: 0.0,
            throughput_responses_per_sec: 0.0,
            latency_budgets: Vec::new(),
        }
    }
}

/// Top-level configuration for one load test run.
#[derive(Debug, Clone)]
pub struct Config {
    pub request: RequestSpec,
    pub execution: ExecutionConfig,
    pub slo: SloConfig,
    pub skip_tls_verify: bool,
    pub resolve_target_addr: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
    pub custom_headers: Option<String>,
}

fn env_required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.into()))
}

fn env_parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: name.into(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables. Intentionally
    /// minimal — a thin glue layer for the example binary, not a full CLI
    /// loader.
    pub fn from_env() -> Result<Self, ConfigError> {
        let target_url = env_required("TARGET_URL")?;
        if !target_url.starts_with("http://") && !target_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(
                "TARGET_URL must start with http:// or https://".into(),
            ));
        }

        let method_str = env::var("REQUEST_METHOD").unwrap_or_else(|_| "GET".to_string());
        let method = method_str
            .parse::<reqwest::Method>()
            .map_err(|e| ConfigError::InvalidValue {
                var: "REQUEST_METHOD".into(),
                message: e.to_string(),
            })?;

        let concurrency: usize = env_parse_or("CONCURRENCY", 10)?;
        if concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                var: "CONCURRENCY".into(),
                message: "must be greater than 0".into(),
            });
        }

        let mode_str = env::var("MODE").unwrap_or_else(|_| "scale".to_string());
        let mode = match mode_str.as_str() {
            "validate" => Mode::Validate,
            "scale" => Mode::Scale,
            "fail" => Mode::Fail,
            other => {
                return Err(ConfigError::InvalidValue {
                    var: "MODE".into(),
                    message: format!("unknown mode '{other}', expected validate|scale|fail"),
                })
            }
        };

        let requests_to_issue: u64 = if mode == Mode::Validate {
            1
        } else {
            env_parse_or("REQUESTS_TO_ISSUE", 100)?
        };

        let max_execution_time_str =
            env::var("MAX_EXECUTION_TIME").unwrap_or_else(|_| "2h".to_string());
        let max_execution_time =
            parse_duration_string(&max_execution_time_str).map_err(|e| {
                ConfigError::InvalidDuration {
                    var: "MAX_EXECUTION_TIME".into(),
                    message: e,
                }
            })?;

        let ramp_initial_rate: f64 = env_parse_or("RAMP_INITIAL_RATE", 10.0)?;
        let ramp_step: f64 = env_parse_or("RAMP_STEP_RPS", 1.0)?;

        let skip_tls_verify = env_bool("SKIP_TLS_VERIFY", false);
        let resolve_target_addr = env::var("RESOLVE_TARGET_ADDR").ok();
        let client_cert_path = env::var("CLIENT_CERT_PATH").ok();
        let client_key_path = env::var("CLIENT_KEY_PATH").ok();
        let custom_headers = env::var("CUSTOM_HEADERS").ok();

        if client_cert_path.is_some() != client_key_path.is_some() {
            return Err(ConfigError::IncompleteMtls);
        }

        let concurrency = if mode == Mode::Validate { 1 } else { concurrency };

        let mut execution = ExecutionConfig {
            mode,
            concurrency,
            requests_to_issue,
            max_execution_time,
            ramp: RampPolicy::new(ramp_initial_rate, ramp_step),
            ..Default::default()
        };
        execution.warm_up = match env::var("WARM_UP") {
            Ok(s) => parse_duration_string(&s).map_err(|e| ConfigError::InvalidDuration {
                var: "WARM_UP".into(),
                message: e,
            })?,
            Err(_) => Duration::ZERO,
        };

        Ok(Config {
            request: RequestSpec {
                method,
                url: target_url,
                ..Default::default()
            },
            execution,
            slo: SloConfig::default(),
            skip_tls_verify,
            resolve_target_addr,
            client_cert_path,
            client_key_path,
            custom_headers,
        })
    }

    /// Creates a ClientConfig from this Config.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            skip_tls_verify: self.skip_tls_verify,
            resolve_target_addr: self.resolve_target_addr.clone(),
            client_cert_path: self.client_cert_path.clone(),
            client_key_path: self.client_key_path.clone(),
            custom_headers: self.custom_headers.clone(),
            pool_config: None,
        }
    }

    /// A default configuration for tests.
    pub fn for_testing() -> Self {
        Config {
            request: RequestSpec {
                url: "https://example.com".into(),
                ..Default::default()
            },
            execution: ExecutionConfig::default(),
            slo: SloConfig::default(),
            skip_tls_verify: false,
            resolve_target_addr: None,
            client_cert_path: None,
            client_key_path: None,
            custom_headers: None,
        }
    }
}
