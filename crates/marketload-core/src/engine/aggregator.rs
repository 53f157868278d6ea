use std::collections::BTreeMap;

use crate::client::Endpoint;
use crate::results::{AggregatedMetric, RunResult};

/// Combine per-worker, per-endpoint metrics into run-level totals.
///
/// For every endpoint observed by at least one worker:
/// - `total_successes` and `total_errors` are plain sums;
/// - `weighted_average_latency_ms` is the success-count-weighted mean of
///   the per-worker averages, `sum(avg_w * succ_w) / sum(succ_w)`,
///   truncated to whole milliseconds and defined as 0 when no call
///   succeeded anywhere.
///
/// Workers that never attempted an endpoint contribute nothing — their
/// entry is absent, not zero-weighted — so workers with few observations
/// do not bias the mean.
pub fn aggregate(result: &RunResult) -> BTreeMap<Endpoint, AggregatedMetric> {
    #[derive(Default)]
    struct Totals {
        successes: u64,
        errors: u64,
        weighted_latency_sum: u64,
    }

    let mut totals: BTreeMap<Endpoint, Totals> = BTreeMap::new();
    for worker in result.workers() {
        for (endpoint, metric) in worker {
            let entry = totals.entry(*endpoint).or_default();
            entry.successes += metric.success_count;
            entry.errors += metric.error_count;
            entry.weighted_latency_sum += metric.average_latency_ms * metric.success_count;
        }
    }

    totals
        .into_iter()
        .map(|(endpoint, t)| {
            let weighted_average_latency_ms = if t.successes > 0 {
                t.weighted_latency_sum / t.successes
            } else {
                0
            };
            (
                endpoint,
                AggregatedMetric {
                    weighted_average_latency_ms,
                    total_successes: t.successes,
                    total_errors: t.errors,
                },
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{EndpointMetric, WorkerResult};

    fn metric(avg: u64, succ: u64, err: u64) -> EndpointMetric {
        EndpointMetric {
            average_latency_ms: avg,
            success_count: succ,
            error_count: err,
        }
    }

    fn worker(entries: &[(Endpoint, EndpointMetric)]) -> Option<WorkerResult> {
        Some(entries.iter().cloned().collect())
    }

    #[test]
    fn empty_run_result_aggregates_to_nothing() {
        let result = RunResult::from_slots(vec![None, None]);
        assert!(aggregate(&result).is_empty());
    }

    #[test]
    fn single_reporter_aggregation_is_identity() {
        let result = RunResult::from_slots(vec![worker(&[(
            Endpoint::ProductGet,
            metric(150, 20, 3),
        )])]);

        let aggregated = aggregate(&result);
        let product_get = &aggregated[&Endpoint::ProductGet];
        assert_eq!(product_get.weighted_average_latency_ms, 150);
        assert_eq!(product_get.total_successes, 20);
        assert_eq!(product_get.total_errors, 3);
    }

    #[test]
    fn zero_weight_worker_contributes_nothing_to_average() {
        // {100ms / 10 successes} + {200ms avg recorded, 0 successes}.
        let result = RunResult::from_slots(vec![
            worker(&[(Endpoint::ProductGet, metric(100, 10, 0))]),
            worker(&[(Endpoint::ProductGet, metric(200, 0, 5))]),
        ]);

        let aggregated = aggregate(&result);
        let product_get = &aggregated[&Endpoint::ProductGet];
        assert_eq!(product_get.weighted_average_latency_ms, 100);
        assert_eq!(product_get.total_successes, 10);
        assert_eq!(product_get.total_errors, 5);
    }

    #[test]
    fn weighted_average_favours_heavier_worker() {
        // (100*30 + 200*10) / 40 = 125
        let result = RunResult::from_slots(vec![
            worker(&[(Endpoint::CartPut, metric(100, 30, 0))]),
            worker(&[(Endpoint::CartPut, metric(200, 10, 0))]),
        ]);

        let aggregated = aggregate(&result);
        assert_eq!(aggregated[&Endpoint::CartPut].weighted_average_latency_ms, 125);
    }

    #[test]
    fn weighted_average_truncates_to_integer() {
        // (100*1 + 101*2) / 3 = 100.67 -> 100
        let result = RunResult::from_slots(vec![
            worker(&[(Endpoint::OrderPost, metric(100, 1, 0))]),
            worker(&[(Endpoint::OrderPost, metric(101, 2, 0))]),
        ]);

        let aggregated = aggregate(&result);
        assert_eq!(
            aggregated[&Endpoint::OrderPost].weighted_average_latency_ms,
            100
        );
    }

    #[test]
    fn all_error_endpoint_has_zero_average_but_counts_errors() {
        let result = RunResult::from_slots(vec![
            worker(&[(Endpoint::CartPut, metric(0, 0, 4))]),
            worker(&[(Endpoint::CartPut, metric(0, 0, 2))]),
        ]);

        let aggregated = aggregate(&result);
        let cart_put = &aggregated[&Endpoint::CartPut];
        assert_eq!(cart_put.weighted_average_latency_ms, 0);
        assert_eq!(cart_put.total_successes, 0);
        assert_eq!(cart_put.total_errors, 6);
    }

    #[test]
    fn absent_endpoints_stay_absent() {
        // No worker attempted cart or order; the aggregated map must not
        // invent zero entries for them.
        let result = RunResult::from_slots(vec![
            worker(&[(Endpoint::ProductGet, metric(90, 5, 0))]),
            worker(&[(Endpoint::ProductGet, metric(110, 5, 1))]),
        ]);

        let aggregated = aggregate(&result);
        assert_eq!(aggregated.len(), 1);
        assert!(!aggregated.contains_key(&Endpoint::CartPut));
        assert!(!aggregated.contains_key(&Endpoint::OrderPost));
    }

    #[test]
    fn aborted_workers_are_skipped() {
        let result = RunResult::from_slots(vec![
            None,
            worker(&[(Endpoint::ProductGet, metric(100, 10, 0))]),
            None,
        ]);

        let aggregated = aggregate(&result);
        assert_eq!(aggregated[&Endpoint::ProductGet].total_successes, 10);
    }

    #[test]
    fn endpoints_are_combined_independently() {
        let result = RunResult::from_slots(vec![
            worker(&[
                (Endpoint::ProductGet, metric(100, 10, 1)),
                (Endpoint::CartPut, metric(50, 2, 0)),
            ]),
            worker(&[(Endpoint::ProductGet, metric(200, 10, 0))]),
        ]);

        let aggregated = aggregate(&result);
        assert_eq!(
            aggregated[&Endpoint::ProductGet].weighted_average_latency_ms,
            150
        );
        assert_eq!(aggregated[&Endpoint::ProductGet].total_errors, 1);
        assert_eq!(aggregated[&Endpoint::CartPut].weighted_average_latency_ms, 50);
        assert_eq!(aggregated[&Endpoint::CartPut].total_successes, 2);
    }
}
