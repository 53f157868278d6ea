mod render;

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use marketload_core::client::HttpShopClient;
use marketload_core::config::RunConfig;
use marketload_core::engine::{aggregate, RunCoordinator, RunEvent};
use marketload_core::results::RunReport;

/// Buyer-session load generator for the marketplace APIs.
///
/// Simulates independent buyer sessions (browse, decide, cart, order)
/// against the deployed products/carts/orders services for a fixed
/// duration, then prints per-endpoint latency and call-count statistics.
///
/// Endpoint URLs are read from the environment: PRODUCTS_API_ENDPOINT,
/// CARTS_API_ENDPOINT, ORDERS_API_ENDPOINT, AUTH_API_ENDPOINT, and
/// optionally BUYER_USERNAME_SHARD.
#[derive(Debug, Parser)]
#[command(name = "marketload", version)]
struct Args {
    /// Test length in seconds (minimum 600).
    duration_seconds: u64,

    /// Virtual users sharing each buyer account (minimum 1).
    virtual_users: u32,

    /// Conversion rate multiplier (>= 0; 0 disables conversions).
    conversion_multiplier: f64,

    /// Print the aggregated report as JSON instead of text.
    #[arg(long)]
    json: bool,
}

fn require_env(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("environment variable {name} is not set"))
}

fn client_from_env() -> Result<HttpShopClient, String> {
    let mut builder = HttpShopClient::builder()
        .products_url(require_env("PRODUCTS_API_ENDPOINT")?)
        .carts_url(require_env("CARTS_API_ENDPOINT")?)
        .orders_url(require_env("ORDERS_API_ENDPOINT")?)
        .auth_url(require_env("AUTH_API_ENDPOINT")?);

    if let Ok(shard) = std::env::var("BUYER_USERNAME_SHARD") {
        builder = builder.username_shard(shard);
    }

    builder.build().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match RunConfig::new(
        args.duration_seconds,
        args.virtual_users,
        args.conversion_multiplier,
    ) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            eprintln!(
                "usage: marketload-cli [test length in seconds] [virtual users per account] [conversion rate multiplier]"
            );
            return ExitCode::FAILURE;
        }
    };

    let client = match client_from_env() {
        Ok(client) => Arc::new(client),
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let (tx, mut rx) = mpsc::channel(16);
    let progress_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::Progress { percent } => {
                    tracing::info!("completion percentage: {percent}%");
                }
                RunEvent::Complete => break,
            }
        }
    });

    let coordinator = RunCoordinator::new(config.clone(), client);
    let started_at = Utc::now();
    let result = coordinator.run(tx).await;
    let finished_at = Utc::now();
    let _ = progress_task.await;

    for index in 0..config.account_count() {
        match result.worker(index) {
            Some(worker) => {
                let summary = serde_json::to_string(worker).unwrap_or_default();
                tracing::info!(worker = index, result = %summary, "worker result");
            }
            None => tracing::warn!(worker = index, "worker aborted without a result"),
        }
    }

    let metrics = aggregate(&result);
    let report = RunReport::new(&config, metrics, started_at, finished_at);

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("failed to serialize report: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{}", render::render_text(&report));
    }

    ExitCode::SUCCESS
}
