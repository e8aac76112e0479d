use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Not enough samples for signal evaluation: need {needed}, have {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("An error occurred during indicator calculation: {0}")]
    Indicator(String),

    #[error("Strategy received invalid parameters: {0}")]
    InvalidParameters(String),
}
