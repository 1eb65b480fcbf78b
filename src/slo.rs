//! SLO pass/fail verdict.
//!
//! Four checks in a fixed order — harvest, yield, throughput, then each
//! configured percentile budget in turn — returning on the first
//! violation. Order matters: it is what makes `failure_description` name
//! the most fundamental problem (nothing harvested) rather than a
//! downstream symptom (latency budget blown because almost nothing
//! completed).

use crate::config::SloConfig;
use crate::types::AggregatedStats;

/// Evaluates `stats` against `slo`, returning `(overall_failure, description)`.
///
/// `description` is `None` when every check passes.
pub fn evaluate(stats: &AggregatedStats, slo: &SloConfig) -> (bool, Option<String>) {
    if stats.harvest < slo.harvest_pct {
        return (
            true,
            Some(format!(
                "harvest of {:.2}% is below expected harvest of {:.2}%",
                stats.harvest, slo.harvest_pct
            )),
        );
    }

    if stats.yield_pct < slo.yield_pct {
        return (
            true,
            Some(format!(
                "yield of {:.2}% is below expected yield of {:.2}%",
                stats.yield_pct, slo.yield_pct
            )),
        );
    }

    if stats.throughput_responses_per_sec < slo.throughput_responses_per_sec {
        return (
            true,
            Some(format!(
                "throughput of {:.2} resp/s is below expected throughput of {:.2} resp/s",
                stats.throughput_responses_per_sec, slo.throughput_responses_per_sec
            )),
        );
    }

    for (index, budget) in slo.latency_budgets.iter().enumerate() {
        if index >= stats.latency_percentiles.total.len() {
            break;
        }
        let observed = stats.latency_percentiles.total[index];
        if observed > *budget {
            let quantile = stats
                .configured_quantiles
                .get(index)
                .copied()
                .unwrap_or(f64::NAN);
            return (
                true,
                Some(format!(
                    "p{:.0} latency of {:?} is longer than expected budget of {:?}",
                    quantile * 100.0,
                    observed,
                    budget
                )),
            );
        }
    }

    (false, None)
}
