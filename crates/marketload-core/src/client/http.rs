use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::client::{CallOutcome, Credential, Product, ShopClient};
use crate::error::MarketloadError;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`HttpShopClient`].
///
/// The four endpoint URLs are required; everything else has defaults. The
/// request timeout is a transport-level setting — the engine itself never
/// aborts a call in flight.
pub struct HttpShopClientBuilder {
    products_url: Option<String>,
    carts_url: Option<String>,
    orders_url: Option<String>,
    auth_url: Option<String>,
    username_shard: String,
    timeout: Duration,
    user_agent: String,
}

impl Default for HttpShopClientBuilder {
    fn default() -> Self {
        Self {
            products_url: None,
            carts_url: None,
            orders_url: None,
            auth_url: None,
            username_shard: "FaxyBuyer".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("marketload/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpShopClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn products_url(mut self, url: impl Into<String>) -> Self {
        self.products_url = Some(url.into());
        self
    }

    pub fn carts_url(mut self, url: impl Into<String>) -> Self {
        self.carts_url = Some(url.into());
        self
    }

    pub fn orders_url(mut self, url: impl Into<String>) -> Self {
        self.orders_url = Some(url.into());
        self
    }

    /// Base URL of the identity provider; login and logout are issued to
    /// `<auth_url>/login` and `<auth_url>/logout`.
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    /// Prefix of the per-account buyer usernames; account index is appended.
    pub fn username_shard(mut self, shard: impl Into<String>) -> Self {
        self.username_shard = shard.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn build(self) -> Result<HttpShopClient, MarketloadError> {
        let products_url = require_url("products", self.products_url)?;
        let carts_url = require_url("carts", self.carts_url)?;
        let orders_url = require_url("orders", self.orders_url)?;
        let auth_url = require_url("auth", self.auth_url)?;

        let inner = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(self.user_agent)
            .build()?;

        Ok(HttpShopClient {
            inner,
            products_url,
            carts_url,
            orders_url,
            auth_url,
            username_shard: self.username_shard,
        })
    }
}

fn require_url(name: &str, url: Option<String>) -> Result<String, MarketloadError> {
    let url = url.ok_or_else(|| {
        MarketloadError::Validation(format!("{name} endpoint URL is not configured"))
    })?;
    let trimmed = url.trim();
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(MarketloadError::Validation(format!(
            "{name} endpoint URL must start with http:// or https:// (got: {url})"
        )));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartRequest {
    buyer_username: String,
    added_timestamp: i64,
    seller_username: String,
    product_name: String,
    quantity: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest {
    buyer_username: String,
    status: String,
    seller_username: String,
    product_name: String,
    quantity: String,
}

// ---------------------------------------------------------------------------
// HttpShopClient
// ---------------------------------------------------------------------------

/// reqwest-backed implementation of [`ShopClient`] targeting the deployed
/// products/carts/orders APIs plus the identity provider.
///
/// All virtual users of a run share one instance (and therefore one
/// connection pool).
#[derive(Debug)]
pub struct HttpShopClient {
    inner: reqwest::Client,
    products_url: String,
    carts_url: String,
    orders_url: String,
    auth_url: String,
    username_shard: String,
}

impl HttpShopClient {
    pub fn builder() -> HttpShopClientBuilder {
        HttpShopClientBuilder::new()
    }

    /// Login username for an account index: shard prefix + index. The same
    /// value doubles as the password on the test accounts.
    fn username(&self, account_id: u32) -> String {
        format!("{}{}", self.username_shard, account_id)
    }

    /// The buyer identity carried in cart and order payloads.
    fn buyer_username(&self, account_id: u32) -> String {
        self.username(account_id).to_lowercase()
    }
}

#[async_trait::async_trait]
impl ShopClient for HttpShopClient {
    async fn login(&self, account_id: u32) -> Result<Credential, MarketloadError> {
        let username = self.username(account_id);
        let body = LoginRequest {
            password: username.clone(),
            username,
        };

        let response = self
            .inner
            .post(format!("{}/login", self.auth_url))
            .json(&body)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(MarketloadError::Auth {
                account_id,
                message: format!("login returned status {}", response.status()),
            });
        }

        let login: LoginResponse = response.json().await?;
        Ok(Credential::new(login.access_token))
    }

    async fn logout(&self, credential: &Credential) {
        let result = self
            .inner
            .post(format!("{}/logout", self.auth_url))
            .query(&[("accessToken", credential.access_token())])
            .send()
            .await;

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {}
            Ok(response) => {
                tracing::warn!(status = %response.status(), "logout rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "logout request failed");
            }
        }
    }

    async fn get_catalog(
        &self,
        _credential: &Credential,
    ) -> (Option<Vec<Product>>, CallOutcome) {
        let start = Instant::now();
        let response = self.inner.get(&self.products_url).send().await;
        let latency = start.elapsed();

        let response = match response {
            Ok(r) if r.status() == reqwest::StatusCode::OK => r,
            Ok(r) => {
                tracing::debug!(status = %r.status(), "catalog read failed");
                return (None, CallOutcome::failure(latency));
            }
            Err(e) => {
                tracing::debug!(error = %e, "catalog read failed");
                return (None, CallOutcome::failure(latency));
            }
        };

        // An unparsable body counts as a failed call; the engine draws no
        // distinction between error classes.
        match response.json::<Vec<Product>>().await {
            Ok(products) => (Some(products), CallOutcome::success(latency)),
            Err(e) => {
                tracing::debug!(error = %e, "catalog response body invalid");
                (None, CallOutcome::failure(latency))
            }
        }
    }

    async fn put_cart(
        &self,
        _credential: &Credential,
        product: &Product,
        account_id: u32,
    ) -> CallOutcome {
        let body = CartRequest {
            buyer_username: self.buyer_username(account_id),
            added_timestamp: chrono::Utc::now().timestamp_millis(),
            seller_username: product.seller_username.clone(),
            product_name: product.product_name.clone(),
            quantity: "1".to_string(),
        };

        let start = Instant::now();
        let response = self.inner.put(&self.carts_url).json(&body).send().await;
        let latency = start.elapsed();

        match response {
            Ok(r) if r.status() == reqwest::StatusCode::OK => CallOutcome::success(latency),
            Ok(r) => {
                tracing::debug!(status = %r.status(), "cart write failed");
                CallOutcome::failure(latency)
            }
            Err(e) => {
                tracing::debug!(error = %e, "cart write failed");
                CallOutcome::failure(latency)
            }
        }
    }

    async fn post_order(
        &self,
        credential: &Credential,
        product: &Product,
        account_id: u32,
    ) -> CallOutcome {
        let body = OrderRequest {
            buyer_username: self.buyer_username(account_id),
            status: "drafted".to_string(),
            seller_username: product.seller_username.clone(),
            product_name: product.product_name.clone(),
            quantity: "1".to_string(),
        };

        let start = Instant::now();
        let response = self
            .inner
            .post(&self.orders_url)
            .query(&[("accessToken", credential.access_token())])
            .json(&body)
            .send()
            .await;
        let latency = start.elapsed();

        match response {
            Ok(r) if r.status() == reqwest::StatusCode::OK => CallOutcome::success(latency),
            Ok(r) => {
                tracing::debug!(status = %r.status(), "order write failed");
                CallOutcome::failure(latency)
            }
            Err(e) => {
                tracing::debug!(error = %e, "order write failed");
                CallOutcome::failure(latency)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
