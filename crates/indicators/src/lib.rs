//! Pure technical-indicator functions over price-sample windows.
//!
//! Every function here is a pure function of its input slice: no state, no
//! I/O, identical input always yields identical output. All arithmetic is
//! `Decimal`; callers get `None` when the window is too short rather than a
//! partial result computed on a warmup prefix.

pub mod bands;
pub mod classify;
pub mod levels;
pub mod momentum;
pub mod moving;

pub use bands::{bollinger, BollingerBands};
pub use classify::{classify_structure, classify_trend, PriceStructure, Trend};
pub use levels::{average_volume, resistance, support};
pub use momentum::{macd, rsi, stochastic_k, MacdOutput};
pub use moving::{ema, ema_series, sma};
