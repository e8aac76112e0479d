use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::BTreeMap;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub signal: SignalParams,
    pub risk: RiskLimits,
    pub schedule: Schedule,
    /// The traded basket. Every instrument the engine touches must have an
    /// entry here; startup fails fast on a missing one rather than silently
    /// defaulting a position size.
    pub instruments: BTreeMap<String, InstrumentConfig>,
    pub api: ApiConfig,
    pub telegram: TelegramConfig,
}

/// Per-instrument trading parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    /// Fixed order quantity in base currency (e.g. 0.002 BTC).
    pub quantity: Decimal,
    /// Leverage to set on the exchange at startup.
    pub leverage: u8,
}

/// Parameters for signal generation and position management.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalParams {
    /// Kline bucket size (e.g. "5m").
    pub interval: String,
    /// Number of buckets retained per instrument. Must cover the longest
    /// indicator window (200-period EMA), so ≥ 201.
    pub window_cap: usize,
    /// The last completed bucket's volume must exceed the prior-window
    /// average by this multiplier for the volume gate to pass.
    pub volume_multiplier: Decimal,
    /// Number of completed buckets averaged for the volume gate.
    pub volume_lookback: usize,
    /// Minimum composite momentum score in [0, 1] to emit a signal.
    pub momentum_threshold: Decimal,
    /// Half-width of the swing-structure window, in buckets.
    pub structure_lookback: usize,
    /// Protective stop distance from entry, as a fraction (0.05 = 5%).
    pub stop_loss_pct: Decimal,
    /// Take-profit distance from entry, as a fraction.
    pub take_profit_pct: Decimal,
    /// Trailing distance from the high-water mark, as a fraction.
    pub trail_pct: Decimal,
    /// How long a losing exit blocks re-entry, in seconds.
    pub loss_cooldown_secs: u64,
    /// When set, every stop-out starts the loss cooldown, even one the
    /// trailing stop turned into a profit. Off by default: a winning exit
    /// leaves the instrument immediately re-enterable.
    #[serde(default)]
    pub cooldown_on_winning_stop: bool,
    /// How long a rejected order blocks retries, in seconds.
    pub failed_order_cooldown_secs: u64,
}

/// Hard limits evaluated by the exposure guard before every entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskLimits {
    /// Trading halts for the day once realized losses reach this amount
    /// (quote currency, positive number).
    pub max_daily_loss: Decimal,
    pub max_concurrent_positions: usize,
    /// Entries are refused when available margin would drop below this floor.
    pub min_available_margin: Decimal,
}

/// Cadence of the periodic engine tasks, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct Schedule {
    pub decision_interval_secs: u64,
    pub monitor_interval_secs: u64,
    pub sweep_interval_secs: u64,
    pub history_refresh_secs: u64,
    /// Resting orders on an idle instrument older than this are cancelled by
    /// the stale-order sweep.
    pub stale_order_max_age_secs: u64,
    /// Bound on waiting for another task's per-instrument lock. A timeout is
    /// a skipped tick, not an error.
    pub lock_timeout_ms: u64,
}

/// API credentials for both environments.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub production: ApiKeys,
    pub testnet: ApiKeys,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeys {
    pub key: String,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

impl Settings {
    /// Startup validation. Rejects configurations the engine cannot run
    /// safely rather than limping along with defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one instrument must be configured".to_string(),
            ));
        }
        for (instrument, cfg) in &self.instruments {
            if cfg.quantity <= Decimal::ZERO {
                return Err(ConfigError::ValidationError(format!(
                    "instrument {instrument} has non-positive quantity {}",
                    cfg.quantity
                )));
            }
            if cfg.leverage == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "instrument {instrument} has zero leverage"
                )));
            }
        }
        if self.signal.window_cap < 201 {
            return Err(ConfigError::ValidationError(format!(
                "window_cap {} is below the 201 buckets the 200-period EMA needs",
                self.signal.window_cap
            )));
        }
        for (name, pct) in [
            ("stop_loss_pct", self.signal.stop_loss_pct),
            ("take_profit_pct", self.signal.take_profit_pct),
            ("trail_pct", self.signal.trail_pct),
        ] {
            if pct <= Decimal::ZERO || pct >= dec!(1) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0 and 1, got {pct}"
                )));
            }
        }
        if self.signal.volume_multiplier <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "volume_multiplier must be positive".to_string(),
            ));
        }
        if self.signal.momentum_threshold < Decimal::ZERO || self.signal.momentum_threshold > dec!(1)
        {
            return Err(ConfigError::ValidationError(
                "momentum_threshold must be within [0, 1]".to_string(),
            ));
        }
        if self.risk.max_concurrent_positions == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrent_positions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Settings {
        Settings {
            signal: SignalParams {
                interval: "5m".to_string(),
                window_cap: 250,
                volume_multiplier: dec!(1.5),
                volume_lookback: 20,
                momentum_threshold: dec!(0.55),
                structure_lookback: 10,
                stop_loss_pct: dec!(0.05),
                take_profit_pct: dec!(0.013),
                trail_pct: dec!(0.05),
                loss_cooldown_secs: 1800,
                cooldown_on_winning_stop: false,
                failed_order_cooldown_secs: 300,
            },
            risk: RiskLimits {
                max_daily_loss: dec!(200),
                max_concurrent_positions: 3,
                min_available_margin: dec!(50),
            },
            schedule: Schedule {
                decision_interval_secs: 5,
                monitor_interval_secs: 5,
                sweep_interval_secs: 60,
                history_refresh_secs: 3600,
                stale_order_max_age_secs: 300,
                lock_timeout_ms: 1000,
            },
            instruments: BTreeMap::from([(
                "BTCUSDT".to_string(),
                InstrumentConfig { quantity: dec!(0.002), leverage: 10 },
            )]),
            api: ApiConfig {
                production: ApiKeys { key: String::new(), secret: String::new() },
                testnet: ApiKeys { key: String::new(), secret: String::new() },
            },
            telegram: TelegramConfig { token: String::new(), chat_id: String::new() },
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn zero_quantity_instrument_rejected() {
        let mut s = base();
        s.instruments.get_mut("BTCUSDT").unwrap().quantity = Decimal::ZERO;
        assert!(s.validate().is_err());
    }

    #[test]
    fn short_window_rejected() {
        let mut s = base();
        s.signal.window_cap = 100;
        assert!(s.validate().is_err());
    }

    #[test]
    fn empty_basket_rejected() {
        let mut s = base();
        s.instruments.clear();
        assert!(s.validate().is_err());
    }
}
