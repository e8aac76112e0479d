use chrono::{DateTime, Utc};
use core_types::{CooldownKind, Direction, ExitReason};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The top-level engine event enum.
///
/// `#[serde(tag = "type", content = "payload")]` serializes each variant as
/// `{"type": "...", "payload": {...}}`, which keeps log lines and any future
/// downstream consumers uniform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// The engine finished startup and reconciliation.
    Started { timestamp: DateTime<Utc>, instruments: Vec<String> },
    /// A new position was opened from a signal.
    PositionOpened {
        instrument: String,
        direction: Direction,
        entry_price: Decimal,
        quantity: Decimal,
        stop_loss: Decimal,
        confidence: Decimal,
    },
    /// A position was fully closed.
    PositionClosed {
        instrument: String,
        direction: Direction,
        exit_price: Decimal,
        realized_pnl: Decimal,
        reason: ExitReason,
    },
    /// The trailing stop for an instrument was ratcheted to a new level.
    StopAdvanced {
        instrument: String,
        high_water_mark: Decimal,
        stop_level: Decimal,
    },
    /// An entry or exit order was rejected by the exchange.
    OrderRejected { instrument: String, detail: String },
    /// An instrument entered a cooldown window.
    CooldownStarted {
        instrument: String,
        kind: CooldownKind,
        until: DateTime<Utc>,
    },
    /// A persisted position was re-adopted after a restart.
    PositionRecovered {
        instrument: String,
        direction: Direction,
        stop_level: Decimal,
    },
    /// Something went wrong that an operator should know about.
    EngineError { detail: String },
}
