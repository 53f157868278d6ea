use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::Endpoint;
use crate::config::RunConfig;

// ---------------------------------------------------------------------------
// EndpointMetric
// ---------------------------------------------------------------------------

/// Per-endpoint metrics accumulated by a single worker over its run.
/// Immutable once handed to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EndpointMetric {
    /// Arithmetic mean of the successful calls' latencies in whole
    /// milliseconds; 0 when no call succeeded.
    pub average_latency_ms: u64,
    pub success_count: u64,
    pub error_count: u64,
}

/// One worker's final metrics, keyed by endpoint. An endpoint is present
/// only if the worker attempted it at least once.
pub type WorkerResult = BTreeMap<Endpoint, EndpointMetric>;

// ---------------------------------------------------------------------------
// RunResult
// ---------------------------------------------------------------------------

/// The ordered collection of per-worker results for one run.
///
/// Each worker owns exactly one slot, written once after its loop
/// terminates. A `None` slot means the worker aborted during
/// authentication and produced no result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RunResult {
    slots: Vec<Option<WorkerResult>>,
}

impl RunResult {
    pub(crate) fn new(account_count: u32) -> Self {
        Self {
            slots: vec![None; account_count as usize],
        }
    }

    pub(crate) fn set(&mut self, index: u32, result: Option<WorkerResult>) {
        self.slots[index as usize] = result;
    }

    /// Number of worker slots (equal to the configured account count).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The result produced by the worker at `index`, if any.
    pub fn worker(&self, index: u32) -> Option<&WorkerResult> {
        self.slots.get(index as usize).and_then(|s| s.as_ref())
    }

    /// Iterate over the results of workers that completed normally.
    pub fn workers(&self) -> impl Iterator<Item = &WorkerResult> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Worker indices that produced no result (fatal authentication error).
    pub fn missing_workers(&self) -> Vec<u32> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i as u32)
            .collect()
    }
}

#[cfg(test)]
impl RunResult {
    /// Assemble a result directly from slots, bypassing the coordinator.
    pub fn from_slots(slots: Vec<Option<WorkerResult>>) -> Self {
        Self { slots }
    }
}

// ---------------------------------------------------------------------------
// AggregatedMetric
// ---------------------------------------------------------------------------

/// Run-level metrics for one endpoint, combined across all workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AggregatedMetric {
    /// Success-count-weighted mean of the per-worker average latencies,
    /// truncated to whole milliseconds; 0 when no call succeeded anywhere.
    pub weighted_average_latency_ms: u64,
    pub total_successes: u64,
    pub total_errors: u64,
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// Everything the report renderer needs: the aggregated metrics plus the
/// original run parameters, sufficient to label a chart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RunReport {
    pub duration_seconds: u64,
    pub virtual_users_per_account: u32,
    pub concurrent_users: u32,
    pub conversion_multiplier: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub metrics: BTreeMap<Endpoint, AggregatedMetric>,
}

impl RunReport {
    pub fn new(
        config: &RunConfig,
        metrics: BTreeMap<Endpoint, AggregatedMetric>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            duration_seconds: config.duration_seconds(),
            virtual_users_per_account: config.virtual_users_per_account(),
            concurrent_users: config.concurrent_users(),
            conversion_multiplier: config.conversion_multiplier(),
            started_at,
            finished_at,
            metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
