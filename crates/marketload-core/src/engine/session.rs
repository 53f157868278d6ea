use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::client::{Endpoint, Product, ShopClient};
use crate::config::{RunConfig, AVG_SESSION_TIME_SECS, THINK_MU, THINK_SIGMA};
use crate::results::{EndpointMetric, WorkerResult};

// ---------------------------------------------------------------------------
// Sampler — injectable randomness
// ---------------------------------------------------------------------------

/// Source of the random draws a session makes. Injectable so tests can
/// script exact sequences and verify the state machine precisely.
pub trait Sampler: Send {
    /// Gaussian noise added to the think time, in seconds.
    fn think_time_noise(&mut self) -> f64;

    /// Uniform draw in [0, 1) compared against the conversion threshold.
    fn conversion_draw(&mut self) -> f64;

    /// Uniform pick of a product index in `0..len`. Never called with
    /// `len == 0`.
    fn pick_index(&mut self, len: usize) -> usize;
}

/// Production sampler backed by a per-worker RNG.
pub struct ThreadRngSampler {
    rng: SmallRng,
    think_noise: Normal<f64>,
}

impl ThreadRngSampler {
    pub fn new() -> Self {
        Self::from_rng(SmallRng::from_entropy())
    }

    pub fn from_rng(rng: SmallRng) -> Self {
        Self {
            rng,
            think_noise: Normal::new(THINK_MU, THINK_SIGMA)
                .expect("think-time sigma is a positive constant"),
        }
    }
}

impl Default for ThreadRngSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for ThreadRngSampler {
    fn think_time_noise(&mut self) -> f64 {
        self.think_noise.sample(&mut self.rng)
    }

    fn conversion_draw(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn pick_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

// ---------------------------------------------------------------------------
// MetricRecorder
// ---------------------------------------------------------------------------

/// Incremental per-endpoint counters for one worker.
#[derive(Debug, Clone, Default)]
struct MetricRecorder {
    successes: u64,
    errors: u64,
    latency_sum_ms: u64,
}

impl MetricRecorder {
    fn success(&mut self, latency_ms: u64) {
        self.successes += 1;
        self.latency_sum_ms += latency_ms;
    }

    fn error(&mut self) {
        self.errors += 1;
    }

    fn attempted(&self) -> bool {
        self.successes > 0 || self.errors > 0
    }

    /// Mean of the successful calls' latencies, truncated; 0 when no call
    /// succeeded.
    fn finalize(&self) -> EndpointMetric {
        let average_latency_ms = if self.successes > 0 {
            self.latency_sum_ms / self.successes
        } else {
            0
        };
        EndpointMetric {
            average_latency_ms,
            success_count: self.successes,
            error_count: self.errors,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Phase of one simulated buyer's journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    LoggedOut,
    Authenticating,
    Browsing,
    Deciding,
    AddingToCart,
    PlacingOrder,
}

/// State machine for one simulated buyer: the current journey phase, the
/// most recent catalog response, and the accumulated per-endpoint metrics.
///
/// The transition methods encode the journey; [`run_session`] drives them
/// against a [`ShopClient`]. Every error path re-enters `Browsing` — no
/// backoff, no retry budget, so a degraded target never sees amplified
/// load.
pub(crate) struct SessionState {
    phase: SessionPhase,
    catalog: Vec<Product>,
    product: MetricRecorder,
    cart: MetricRecorder,
    order: MetricRecorder,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            phase: SessionPhase::LoggedOut,
            catalog: Vec::new(),
            product: MetricRecorder::default(),
            cart: MetricRecorder::default(),
            order: MetricRecorder::default(),
        }
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub(crate) fn begin_authentication(&mut self) {
        self.phase = SessionPhase::Authenticating;
    }

    pub(crate) fn authenticated(&mut self) {
        self.phase = SessionPhase::Browsing;
    }

    /// Catalog read failed: count the error and restart the visit.
    pub(crate) fn catalog_failed(&mut self) {
        self.product.error();
        self.phase = SessionPhase::Browsing;
    }

    /// Catalog read succeeded: record it and move on to the conversion
    /// decision.
    pub(crate) fn catalog_loaded(&mut self, catalog: Vec<Product>, latency_ms: u64) {
        self.product.success(latency_ms);
        self.catalog = catalog;
        self.phase = SessionPhase::Deciding;
    }

    /// Resolve the conversion decision. Returns the chosen product for a
    /// converting visit, or `None` to restart at `Browsing`.
    ///
    /// An empty catalog can never convert — there is nothing to buy.
    pub(crate) fn decide(
        &mut self,
        draw: f64,
        threshold: f64,
        sampler: &mut dyn Sampler,
    ) -> Option<Product> {
        if draw >= threshold || self.catalog.is_empty() {
            self.phase = SessionPhase::Browsing;
            return None;
        }
        let chosen = self.catalog[sampler.pick_index(self.catalog.len())].clone();
        self.phase = SessionPhase::AddingToCart;
        Some(chosen)
    }

    /// Cart write failed: count the error and restart the visit.
    pub(crate) fn cart_failed(&mut self) {
        self.cart.error();
        self.phase = SessionPhase::Browsing;
    }

    /// Cart write succeeded: record it and proceed to the order.
    pub(crate) fn cart_added(&mut self, latency_ms: u64) {
        self.cart.success(latency_ms);
        self.phase = SessionPhase::PlacingOrder;
    }

    /// Order completed either way; both outcomes loop back to `Browsing`.
    pub(crate) fn order_completed(&mut self, ok: bool, latency_ms: u64) {
        if ok {
            self.order.success(latency_ms);
        } else {
            self.order.error();
        }
        self.phase = SessionPhase::Browsing;
    }

    /// Terminal transition: finalize the worker's result. Endpoints appear
    /// only if they were attempted at least once.
    pub(crate) fn shutdown(&mut self) -> WorkerResult {
        self.phase = SessionPhase::LoggedOut;
        let mut result = BTreeMap::new();
        for (endpoint, recorder) in [
            (Endpoint::ProductGet, &self.product),
            (Endpoint::CartPut, &self.cart),
            (Endpoint::OrderPost, &self.order),
        ] {
            if recorder.attempted() {
                result.insert(endpoint, recorder.finalize());
            }
        }
        result
    }
}

// ---------------------------------------------------------------------------
// run_session — the worker loop
// ---------------------------------------------------------------------------

/// Drive one buyer session until the stop signal is observed.
///
/// The worker:
/// 1. sleeps a staggered initial delay proportional to `1 / (index + 1)`
///    to desynchronize worker starts,
/// 2. logs in once — on failure it aborts and returns `None` (the one
///    unrecoverable error),
/// 3. loops visits until `cancel` is set, checking the signal only at the
///    top of each iteration (a call in flight is never aborted),
/// 4. logs out exactly once and finalizes its [`WorkerResult`].
pub async fn run_session(
    index: u32,
    config: &RunConfig,
    client: &dyn ShopClient,
    sampler: &mut dyn Sampler,
    cancel: &CancellationToken,
) -> Option<WorkerResult> {
    // Desynchronize request bursts across workers.
    let stagger = Duration::from_secs_f64(AVG_SESSION_TIME_SECS as f64 / (index + 1) as f64);
    sleep(stagger).await;

    let mut state = SessionState::new();
    state.begin_authentication();

    let credential = match client.login(index).await {
        Ok(credential) => credential,
        Err(e) => {
            tracing::warn!(worker = index, error = %e, "authentication failed, worker aborting");
            return None;
        }
    };
    state.authenticated();
    tracing::debug!(worker = index, "session authenticated");

    let threshold = config.conversion_threshold();

    while !cancel.is_cancelled() {
        let (catalog, outcome) = client.get_catalog(&credential).await;
        if !outcome.ok {
            state.catalog_failed();
            continue;
        }
        state.catalog_loaded(catalog.unwrap_or_default(), outcome.latency_ms());

        // Think time models real user dwell between browsing and deciding;
        // more virtual users sharing the account means shorter dwell each.
        let think_secs = (AVG_SESSION_TIME_SECS as f64 + sampler.think_time_noise())
            / config.virtual_users_per_account() as f64;
        sleep(Duration::from_secs_f64(think_secs.max(0.0))).await;

        let draw = sampler.conversion_draw();
        let Some(product) = state.decide(draw, threshold, sampler) else {
            continue;
        };
        tracing::debug!(worker = index, product = %product.product_name, "visit converted");

        let outcome = client.put_cart(&credential, &product, index).await;
        if !outcome.ok {
            state.cart_failed();
            continue;
        }
        state.cart_added(outcome.latency_ms());

        let outcome = client.post_order(&credential, &product, index).await;
        state.order_completed(outcome.ok, outcome.latency_ms());
    }

    client.logout(&credential).await;
    let result = state.shutdown();
    tracing::debug!(
        worker = index,
        endpoints = result.len(),
        phase = ?state.phase(),
        "session finished"
    );
    Some(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
