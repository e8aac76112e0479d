//! Pre-entry exposure checks.
//!
//! The guard is a stateless predicate: the engine hands it a snapshot of what
//! it currently knows (open slot count, today's realized P&L, margin) and the
//! guard says yes or no. It owns no bookkeeping of its own.

pub mod error;

pub use error::RiskError;

use configuration::RiskLimits;
use core_types::AccountBalance;
use rust_decimal::Decimal;

/// What the engine knows at the moment it wants to open a position.
#[derive(Debug, Clone)]
pub struct ExposureSnapshot {
    pub open_positions: usize,
    /// Realized P&L since UTC midnight; negative when losing.
    pub daily_realized_pnl: Decimal,
    pub balance: AccountBalance,
}

/// The budget/exposure predicate evaluated before every entry.
pub trait ExposureGuard: Send + Sync {
    /// `Ok(())` if a new position may be opened, otherwise the limit that
    /// blocks it.
    fn approve(&self, snapshot: &ExposureSnapshot) -> Result<(), RiskError>;
}

/// Enforces the static limits from configuration, checked in order of
/// severity: daily loss first, then slot count, then margin.
#[derive(Debug, Clone)]
pub struct StaticLimitsGuard {
    limits: RiskLimits,
}

impl StaticLimitsGuard {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }
}

impl ExposureGuard for StaticLimitsGuard {
    fn approve(&self, snapshot: &ExposureSnapshot) -> Result<(), RiskError> {
        let realized_loss = -snapshot.daily_realized_pnl;
        if realized_loss >= self.limits.max_daily_loss {
            return Err(RiskError::DailyLossLimitReached(
                realized_loss,
                self.limits.max_daily_loss,
            ));
        }
        if snapshot.open_positions >= self.limits.max_concurrent_positions {
            return Err(RiskError::MaxConcurrentPositions(
                self.limits.max_concurrent_positions,
            ));
        }
        if snapshot.balance.available < self.limits.min_available_margin {
            return Err(RiskError::InsufficientMargin {
                available: snapshot.balance.available,
                floor: self.limits.min_available_margin,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limits() -> RiskLimits {
        RiskLimits {
            max_daily_loss: dec!(200),
            max_concurrent_positions: 3,
            min_available_margin: dec!(50),
        }
    }

    fn snapshot() -> ExposureSnapshot {
        ExposureSnapshot {
            open_positions: 1,
            daily_realized_pnl: dec!(-20),
            balance: AccountBalance { available: dec!(500), locked: dec!(100), total: dec!(600) },
        }
    }

    #[test]
    fn healthy_snapshot_is_approved() {
        assert!(StaticLimitsGuard::new(limits()).approve(&snapshot()).is_ok());
    }

    #[test]
    fn daily_loss_limit_blocks_entry() {
        let mut s = snapshot();
        s.daily_realized_pnl = dec!(-200);
        let err = StaticLimitsGuard::new(limits()).approve(&s).unwrap_err();
        assert!(matches!(err, RiskError::DailyLossLimitReached(..)));
    }

    #[test]
    fn daily_profit_never_blocks() {
        let mut s = snapshot();
        s.daily_realized_pnl = dec!(1000);
        assert!(StaticLimitsGuard::new(limits()).approve(&s).is_ok());
    }

    #[test]
    fn slot_limit_blocks_entry() {
        let mut s = snapshot();
        s.open_positions = 3;
        let err = StaticLimitsGuard::new(limits()).approve(&s).unwrap_err();
        assert!(matches!(err, RiskError::MaxConcurrentPositions(3)));
    }

    #[test]
    fn margin_floor_blocks_entry() {
        let mut s = snapshot();
        s.balance.available = dec!(49);
        let err = StaticLimitsGuard::new(limits()).approve(&s).unwrap_err();
        assert!(matches!(err, RiskError::InsufficientMargin { .. }));
    }
}
