//! Per-instrument lifecycle state and the shared engine state map.
//!
//! Each instrument owns exactly one slot behind its own `tokio::sync::Mutex`.
//! There is no global lock: the decision, monitor, and sweep tasks contend
//! only on the instruments they are currently touching. Every task acquires a
//! slot through [`lock_slot`], which bounds the wait; a timeout means the
//! other task keeps the slot and this tick is skipped.

use chrono::{DateTime, NaiveDate, Utc};
use core_types::{Cooldown, PriceSample, Signal, TrailingStopState};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strategy::EntryGuard;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Where an instrument is in its position lifecycle.
///
/// `Opening` and `Closing` are held across the order round-trip so that no
/// other task can act on a slot whose exchange state is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Opening,
    Active,
    Closing,
}

/// Everything the engine tracks for one instrument.
#[derive(Debug)]
pub struct InstrumentState {
    pub phase: Phase,
    /// The signal that opened the current position, if any. Authoritative for
    /// the take-profit target while the position is open.
    pub signal: Option<Signal>,
    /// Position size in base currency while a position is open.
    pub quantity: Decimal,
    pub trailing: Option<TrailingStopState>,
    pub cooldown: Option<Cooldown>,
    /// Rolling kline window, oldest first, last element in progress.
    pub window: Vec<PriceSample>,
}

impl InstrumentState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            signal: None,
            quantity: Decimal::ZERO,
            trailing: None,
            cooldown: None,
            window: Vec::new(),
        }
    }

    /// Returns the slot to `Idle`, keeping only the window and cooldown.
    pub fn clear_position(&mut self) {
        self.phase = Phase::Idle;
        self.signal = None;
        self.quantity = Decimal::ZERO;
        self.trailing = None;
    }
}

/// The [`EntryGuard`] view the signal generator gets while the engine holds
/// the slot lock. Reads the locked state directly, so a decide/open race
/// cannot happen.
pub struct SlotGuard<'a> {
    pub state: &'a InstrumentState,
}

impl EntryGuard for SlotGuard<'_> {
    fn position_active(&self, _instrument: &str) -> bool {
        self.state.phase != Phase::Idle
    }

    fn active_cooldown(&self, _instrument: &str, now: DateTime<Utc>) -> Option<Cooldown> {
        self.state.cooldown.filter(|c| c.is_active(now))
    }
}

/// Realized P&L accumulator that resets at UTC midnight.
#[derive(Debug)]
pub struct DailyLedger {
    day: NaiveDate,
    realized_pnl: Decimal,
}

impl DailyLedger {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { day: now.date_naive(), realized_pnl: Decimal::ZERO }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day {
            debug!(from = %self.day, to = %today, "daily ledger rolled over");
            self.day = today;
            self.realized_pnl = Decimal::ZERO;
        }
    }

    pub fn record(&mut self, now: DateTime<Utc>, pnl: Decimal) {
        self.roll(now);
        self.realized_pnl += pnl;
    }

    pub fn realized(&mut self, now: DateTime<Utc>) -> Decimal {
        self.roll(now);
        self.realized_pnl
    }
}

/// The shared state map for all configured instruments.
pub struct EngineState {
    slots: BTreeMap<String, Arc<Mutex<InstrumentState>>>,
    open_count: AtomicUsize,
    pub ledger: Mutex<DailyLedger>,
}

impl EngineState {
    pub fn new(instruments: impl IntoIterator<Item = String>, now: DateTime<Utc>) -> Self {
        let slots = instruments
            .into_iter()
            .map(|i| (i, Arc::new(Mutex::new(InstrumentState::new()))))
            .collect();
        Self {
            slots,
            open_count: AtomicUsize::new(0),
            ledger: Mutex::new(DailyLedger::new(now)),
        }
    }

    pub fn slot(&self, instrument: &str) -> Option<Arc<Mutex<InstrumentState>>> {
        self.slots.get(instrument).cloned()
    }

    pub fn instruments(&self) -> impl Iterator<Item = &String> {
        self.slots.keys()
    }

    pub fn open_positions(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn position_opened(&self) {
        self.open_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn position_closed(&self) {
        self.open_count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Acquires a slot within the configured bound.
///
/// `None` means another task held the slot for the whole wait; the caller
/// skips its tick and tries again on the next one.
pub async fn lock_slot(
    slot: &Arc<Mutex<InstrumentState>>,
    timeout: Duration,
) -> Option<MutexGuard<'_, InstrumentState>> {
    match tokio::time::timeout(timeout, slot.lock()).await {
        Ok(guard) => Some(guard),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn ledger_resets_at_utc_midnight() {
        let day1 = Utc.with_ymd_and_hms(2026, 4, 1, 23, 50, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 4, 2, 0, 5, 0).unwrap();

        let mut ledger = DailyLedger::new(day1);
        ledger.record(day1, dec!(-120));
        assert_eq!(ledger.realized(day1), dec!(-120));
        assert_eq!(ledger.realized(day2), dec!(0));
    }

    #[tokio::test]
    async fn contended_slot_times_out() {
        let state = EngineState::new(["BTCUSDT".to_string()], Utc::now());
        let slot = state.slot("BTCUSDT").unwrap();
        let held = slot.lock().await;

        let result = lock_slot(&slot, Duration::from_millis(10)).await;
        assert!(result.is_none());
        drop(held);

        let result = lock_slot(&slot, Duration::from_millis(10)).await;
        assert!(result.is_some());
    }

    #[test]
    fn guard_reflects_phase_and_cooldown() {
        let now = Utc::now();
        let mut st = InstrumentState::new();
        {
            let guard = SlotGuard { state: &st };
            assert!(!guard.position_active("BTCUSDT"));
        }
        st.phase = Phase::Opening;
        let guard = SlotGuard { state: &st };
        assert!(guard.position_active("BTCUSDT"));
        assert!(guard.active_cooldown("BTCUSDT", now).is_none());
    }
}
