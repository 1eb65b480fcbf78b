//! Streaming load-execution and analysis pipeline: a worker pool drives an
//! HTTP target at a configured concurrency and rate, records per-request
//! timing and validation outcomes, aggregates them into percentiles,
//! throughput, and harvest/yield figures, and arbitrates shutdown once the
//! run completes, breaches its configured SLOs, or is interrupted.
//!
//! CLI flag parsing, JSON-schema/header validation engines, and the
//! terminal/web presentation layer are external collaborators reached only
//! through this crate's [`errors::Validator`] trait and
//! [`types::AggregatedStats`] stream.

pub mod accumulator;
pub mod analyser;
pub mod client;
pub mod config;
pub mod connection_pool;
pub mod coordinator;
pub mod errors;
pub mod load_models;
pub mod percentiles;
pub mod requester;
pub mod signal;
pub mod slo;
pub mod throughput;
pub mod types;
pub mod utils;
pub mod worker;
