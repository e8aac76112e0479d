use serde::{Deserialize, Serialize};

/// The direction of a trade signal or open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Returns the order side that opens a position in this direction.
    pub fn entry_side(&self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        }
    }

    /// Returns the order side that closes a position in this direction.
    pub fn exit_side(&self) -> OrderSide {
        self.entry_side().opposite()
    }
}

// Wire format matches the exchange ("BUY"/"SELL").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side of the order.
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// The lifecycle status of an order as reported by the exchange.
///
/// Statuses the exchange reports that we do not recognize map to `Unknown`.
/// `Unknown` is deliberately *not* terminal: the lifecycle manager must never
/// conclude a position is closed from a status it cannot interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    Unknown,
}

impl OrderStatus {
    /// Maps an exchange status string to our internal representation.
    pub fn from_exchange(raw: &str) -> Self {
        match raw {
            "NEW" => OrderStatus::New,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" => OrderStatus::Canceled,
            "REJECTED" => OrderStatus::Rejected,
            "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Expired,
            _ => OrderStatus::Unknown,
        }
    }

    /// True if the order can no longer fill. `Unknown` is not terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    /// True if the placement itself failed outright.
    pub fn is_failure(&self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired)
    }
}

/// Why a cooldown was started on an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CooldownKind {
    /// The last position closed at a loss; re-entry is blocked until expiry.
    Loss,
    /// An order submission was rejected; throttles retry storms.
    FailedOrder,
}

/// How a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLossHit,
    TakeProfitHit,
    /// Closed outside the engine (operator action or an exchange-side fill we
    /// did not initiate this tick).
    External,
}
