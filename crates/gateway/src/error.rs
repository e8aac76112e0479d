use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Exchange error {0}: {1}")]
    Exchange(i32, String),

    #[error("Failed to deserialize exchange response: {0}")]
    Deserialization(String),

    #[error("Invalid data in exchange response: {0}")]
    InvalidData(String),

    #[error("No price data available for {0}")]
    NoData(String),
}
