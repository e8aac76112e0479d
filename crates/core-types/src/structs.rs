use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{CooldownKind, Direction, OrderSide, OrderStatus, OrderType};

/// One completed (or in-progress) price/volume bucket for an instrument.
///
/// Windows of these are kept in insertion order, newest last. All monetary
/// fields are `Decimal`: repeated percentage arithmetic must not accumulate
/// binary floating-point error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// A directional trade signal produced by the signal generator.
///
/// Immutable once created. While the resulting position is open, this is the
/// authoritative reference for its stop and target levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: Uuid,
    pub instrument: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Option<Decimal>,
    /// Composite momentum confidence in [0, 1].
    pub confidence: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Trailing-stop bookkeeping for one open position.
///
/// `high_water_mark` is the best price observed since entry (highest for a
/// long, lowest for a short) and only ever moves in the favorable direction.
/// `stop_level` is non-decreasing for longs and non-increasing for shorts
/// across accepted updates. Persisted on every accepted update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingStopState {
    pub instrument: String,
    pub direction: Direction,
    pub high_water_mark: Decimal,
    pub stop_level: Decimal,
    pub partial_profit_taken: bool,
    pub updated_at: DateTime<Utc>,
}

impl TrailingStopState {
    /// Seeds fresh state at entry: the high-water mark starts at the entry
    /// price and the stop at the signal's protective level.
    pub fn seed(
        instrument: impl Into<String>,
        direction: Direction,
        entry_price: Decimal,
        stop_level: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            direction,
            high_water_mark: entry_price,
            stop_level,
            partial_profit_taken: false,
            updated_at: now,
        }
    }
}

/// A timed block on re-entering an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldown {
    pub until: DateTime<Utc>,
    pub kind: CooldownKind,
}

impl Cooldown {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }
}

/// A request to place an order on the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: Uuid,
    pub instrument: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    /// Reduce-only orders can only shrink an existing position. Used for
    /// take-profit targets so a stale target can never open a fresh position.
    pub reduce_only: bool,
}

impl OrderRequest {
    pub fn market(instrument: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            client_order_id: Uuid::new_v4(),
            instrument: instrument.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            reduce_only: false,
        }
    }

    pub fn reduce_only_limit(
        instrument: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            client_order_id: Uuid::new_v4(),
            instrument: instrument.into(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            reduce_only: true,
        }
    }
}

/// The exchange's acknowledgment of a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: i64,
    pub client_order_id: Uuid,
    pub instrument: String,
    pub status: OrderStatus,
    pub executed_qty: Decimal,
    pub avg_price: Decimal,
}

/// A resting order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: i64,
    pub instrument: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub reduce_only: bool,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
}

/// An open position as reported by the exchange. Ground truth for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub instrument: String,
    pub direction: Direction,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Account margin balances as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub available: Decimal,
    pub locked: Decimal,
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn cooldown_expires() {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        let cd = Cooldown {
            until: now + chrono::Duration::minutes(30),
            kind: CooldownKind::Loss,
        };
        assert!(cd.is_active(now));
        assert!(!cd.is_active(now + chrono::Duration::minutes(30)));
    }

    #[test]
    fn seeded_trailing_state_starts_at_entry() {
        let now = Utc::now();
        let state = TrailingStopState::seed("BTCUSDT", Direction::Long, dec!(100), dec!(95), now);
        assert_eq!(state.high_water_mark, dec!(100));
        assert_eq!(state.stop_level, dec!(95));
        assert!(!state.partial_profit_taken);
    }
}
