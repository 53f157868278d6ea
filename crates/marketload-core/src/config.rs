use std::time::Duration;

use serde::Serialize;

use crate::error::MarketloadError;

// ---------------------------------------------------------------------------
// Fixed run constants
// ---------------------------------------------------------------------------

/// Number of buyer accounts (and therefore workers) per run.
pub const ACCOUNT_COUNT: u32 = 5;

/// Base probability that a browsing visit converts into a cart/order attempt.
pub const BASE_CONVERSION_RATE: f64 = 0.0271;

/// Mean simulated session length in seconds. Drives both the staggered
/// worker start and the per-visit think time.
pub const AVG_SESSION_TIME_SECS: u64 = 38;

/// Mean of the Gaussian noise added to the think time, in seconds.
pub const THINK_MU: f64 = 10.0;

/// Standard deviation of the Gaussian think-time noise, in seconds.
pub const THINK_SIGMA: f64 = 3.0;

/// Shortest run the harness accepts.
pub const MIN_DURATION_SECS: u64 = 600;

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Immutable configuration for a single load-generation run.
///
/// Constructed once via [`RunConfig::new`], which validates every field
/// before any worker is spawned. An invalid configuration prevents the run
/// entirely.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RunConfig {
    duration_seconds: u64,
    virtual_users_per_account: u32,
    conversion_multiplier: f64,
    account_count: u32,
    base_conversion_rate: f64,
}

impl RunConfig {
    /// Validate the three user-supplied run parameters and build a config.
    pub fn new(
        duration_seconds: u64,
        virtual_users_per_account: u32,
        conversion_multiplier: f64,
    ) -> Result<Self, MarketloadError> {
        if duration_seconds < MIN_DURATION_SECS {
            return Err(MarketloadError::Validation(format!(
                "test length must be at least {MIN_DURATION_SECS} seconds (got {duration_seconds})"
            )));
        }
        if virtual_users_per_account < 1 {
            return Err(MarketloadError::Validation(
                "virtual users per account must be at least 1".to_string(),
            ));
        }
        if !conversion_multiplier.is_finite() || conversion_multiplier < 0.0 {
            return Err(MarketloadError::Validation(format!(
                "conversion rate multiplier must be a finite number >= 0 (got {conversion_multiplier})"
            )));
        }

        Ok(Self {
            duration_seconds,
            virtual_users_per_account,
            conversion_multiplier,
            account_count: ACCOUNT_COUNT,
            base_conversion_rate: BASE_CONVERSION_RATE,
        })
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn virtual_users_per_account(&self) -> u32 {
        self.virtual_users_per_account
    }

    pub fn conversion_multiplier(&self) -> f64 {
        self.conversion_multiplier
    }

    pub fn account_count(&self) -> u32 {
        self.account_count
    }

    pub fn base_conversion_rate(&self) -> f64 {
        self.base_conversion_rate
    }

    /// Effective conversion threshold a uniform [0,1) draw is compared
    /// against: `base_conversion_rate * conversion_multiplier`.
    pub fn conversion_threshold(&self) -> f64 {
        self.base_conversion_rate * self.conversion_multiplier
    }

    /// Total concurrently connected simulated users across all accounts.
    pub fn concurrent_users(&self) -> u32 {
        self.virtual_users_per_account * self.account_count
    }

    /// One tenth of the run duration; the coordinator sleeps in ten of
    /// these increments, emitting a progress notification after each.
    pub fn progress_increment(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds as f64 / 10.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
