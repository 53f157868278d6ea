#[derive(Debug, thiserror::Error)]
pub enum MarketloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed for account {account_id}: {message}")]
    Auth { account_id: u32, message: String },

    #[error("Engine error: {0}")]
    Engine(String),
}
