pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod results;

pub use error::MarketloadError;
