use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MarketloadError;

pub mod http;

pub use http::{HttpShopClient, HttpShopClientBuilder};

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// The three logical endpoints a buyer session exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Endpoint {
    #[serde(rename = "product.get")]
    ProductGet,
    #[serde(rename = "cart.put")]
    CartPut,
    #[serde(rename = "order.post")]
    OrderPost,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Endpoint::ProductGet => "product.get",
            Endpoint::CartPut => "cart.put",
            Endpoint::OrderPost => "order.post",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// A catalog entry as returned by the products API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_name: String,
    pub seller_username: String,
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Opaque session credential obtained from login and released via logout.
#[derive(Debug, Clone)]
pub struct Credential {
    access_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

// ---------------------------------------------------------------------------
// CallOutcome
// ---------------------------------------------------------------------------

/// Binary success/failure outcome of one endpoint call plus its elapsed
/// wall-clock duration. Success is determined solely by a transport-level
/// success indicator (HTTP 200); all other outcomes are failures.
#[derive(Debug, Clone, Copy)]
pub struct CallOutcome {
    pub ok: bool,
    pub latency: Duration,
}

impl CallOutcome {
    pub fn success(latency: Duration) -> Self {
        Self { ok: true, latency }
    }

    pub fn failure(latency: Duration) -> Self {
        Self { ok: false, latency }
    }

    /// Elapsed time in whole milliseconds, rounded down.
    pub fn latency_ms(&self) -> u64 {
        self.latency.as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// ShopClient
// ---------------------------------------------------------------------------

/// Boundary to the remote shop services. The engine consumes only this
/// contract; [`HttpShopClient`] is the production implementation and tests
/// substitute mocks.
///
/// Endpoint-call failures are reported through [`CallOutcome`] and never
/// escalate; only [`ShopClient::login`] can fail fatally.
#[async_trait]
pub trait ShopClient: Send + Sync {
    /// Obtain a session credential for the given account index. A failure
    /// here is the one unrecoverable error in a worker's lifetime.
    async fn login(&self, account_id: u32) -> Result<Credential, MarketloadError>;

    /// Invalidate a session credential. Called exactly once per worker on
    /// shutdown; failures are logged by the implementation, never surfaced.
    async fn logout(&self, credential: &Credential);

    /// Read the product catalog. The product list is `Some` exactly when
    /// the outcome is successful.
    async fn get_catalog(&self, credential: &Credential)
        -> (Option<Vec<Product>>, CallOutcome);

    /// Add the chosen product to the account's cart.
    async fn put_cart(
        &self,
        credential: &Credential,
        product: &Product,
        account_id: u32,
    ) -> CallOutcome;

    /// Place an order for the chosen product.
    async fn post_order(
        &self,
        credential: &Credential,
        product: &Product,
        account_id: u32,
    ) -> CallOutcome;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
