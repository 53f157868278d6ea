use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::client::ShopClient;
use crate::config::RunConfig;
use crate::engine::session::{run_session, ThreadRngSampler};
use crate::results::{RunResult, WorkerResult};

// ---------------------------------------------------------------------------
// RunEvent
// ---------------------------------------------------------------------------

/// An event emitted by the coordinator during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Emitted after each tenth of the run duration has elapsed.
    Progress { percent: u8 },

    /// All workers have joined; the run result is complete.
    Complete,
}

// ---------------------------------------------------------------------------
// RunCoordinator
// ---------------------------------------------------------------------------

/// Orchestrates one load-generation run: spawns one worker per account,
/// waits out the configured duration in ten increments (emitting a
/// [`RunEvent::Progress`] after each), sets the shared stop signal, and
/// joins all workers before handing back the completed [`RunResult`].
///
/// The stop signal is level-triggered: workers poll it at their iteration
/// boundary and are never preempted mid-call, so the join step tolerates
/// each worker taking up to one more full visit to exit. There is no
/// cancellation path other than the duration timer.
pub struct RunCoordinator {
    config: RunConfig,
    client: Arc<dyn ShopClient>,
}

impl RunCoordinator {
    pub fn new(config: RunConfig, client: Arc<dyn ShopClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute the run to completion. Events are delivered on `events`; a
    /// closed receiver is tolerated (events are then dropped).
    pub async fn run(&self, events: mpsc::Sender<RunEvent>) -> RunResult {
        let cancel = CancellationToken::new();
        let account_count = self.config.account_count();

        tracing::info!(
            accounts = account_count,
            duration_seconds = self.config.duration_seconds(),
            virtual_users = self.config.virtual_users_per_account(),
            "starting run"
        );

        let mut workers: JoinSet<(u32, Option<WorkerResult>)> = JoinSet::new();
        for index in 0..account_count {
            let config = self.config.clone();
            let client = Arc::clone(&self.client);
            let cancel = cancel.clone();
            workers.spawn(async move {
                let mut sampler = ThreadRngSampler::new();
                let result =
                    run_session(index, &config, client.as_ref(), &mut sampler, &cancel).await;
                (index, result)
            });
        }

        // Ten equal sleep increments; the signal fires only after the last.
        let increment = self.config.progress_increment();
        for step in 1..=10u8 {
            sleep(increment).await;
            let percent = step * 10;
            tracing::info!(percent, "run progress");
            let _ = events.send(RunEvent::Progress { percent }).await;
        }
        cancel.cancel();
        tracing::info!("duration elapsed, stop signal set");

        // Barrier: the result becomes immutable once every worker joined.
        let mut result = RunResult::new(account_count);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, worker_result)) => {
                    if worker_result.is_none() {
                        tracing::warn!(worker = index, "worker produced no result");
                    }
                    result.set(index, worker_result);
                }
                Err(e) => {
                    // The slot stays empty, same as a fatal auth error.
                    tracing::error!(error = %e, "worker task failed");
                }
            }
        }

        let _ = events.send(RunEvent::Complete).await;
        tracing::info!(
            completed = result.workers().count(),
            missing = result.missing_workers().len(),
            "run finished"
        );
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
