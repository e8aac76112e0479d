use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] gateway::error::GatewayError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] strategy::StrategyError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] persistence::PersistenceError),

    #[error("Risk check refused entry: {0}")]
    Risk(#[from] risk::RiskError),

    #[error("Order rejected for {instrument}: {detail}")]
    OrderRejected { instrument: String, detail: String },

    #[error("Bad market data for {instrument}: {detail}")]
    DataQuality { instrument: String, detail: String },

    #[error("Instrument {0} is not in the configured basket")]
    UnknownInstrument(String),
}
