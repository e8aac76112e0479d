use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Daily realized loss {0} has reached the configured limit {1}")]
    DailyLossLimitReached(Decimal, Decimal),

    #[error("Already at the maximum of {0} concurrent positions")]
    MaxConcurrentPositions(usize),

    #[error("Available margin {available} would fall below the floor {floor}")]
    InsufficientMargin { available: Decimal, floor: Decimal },
}
