//! The position lifecycle engine.
//!
//! Owns all mutable trading state and is the only component that talks to the
//! gateway, the stop store, and the signal generator. Four periodic tasks
//! drive it (see [`scheduler`]): decision ticks evaluate entries, monitor
//! ticks manage open positions, the sweep cancels stale resting orders, and
//! the history task heals kline windows.
//!
//! Every tick handler is per-instrument and starts by taking that
//! instrument's slot lock with a bounded wait. A lock timeout is an ordinary
//! skipped tick. Gateway failures abort the tick with an error the scheduler
//! logs; they never poison the slot state.

pub mod error;
pub mod history;
pub mod scheduler;
pub mod state;

pub use error::EngineError;
pub use state::{EngineState, InstrumentState, Phase};

use crate::state::{lock_slot, SlotGuard};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use configuration::{Schedule, Settings};
use core_types::{
    Cooldown, CooldownKind, Direction, ExitReason, OrderRequest, PositionSnapshot, Signal,
    TrailingStopState,
};
use events::EngineEvent;
use gateway::Gateway;
use persistence::StopStore;
use risk::{ExposureGuard, ExposureSnapshot, StaticLimitsGuard};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use strategy::{SignalGenerator, Verdict};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How many klines an incremental window refresh asks for. Enough to cover a
/// few missed ticks; the history task does the full heal.
const INCREMENTAL_FETCH: usize = 5;

pub struct Engine {
    gateway: Arc<dyn Gateway>,
    settings: Settings,
    generator: SignalGenerator,
    exposure: StaticLimitsGuard,
    store: Mutex<StopStore>,
    state: EngineState,
    events: broadcast::Sender<EngineEvent>,
}

impl Engine {
    pub fn new(
        settings: Settings,
        gateway: Arc<dyn Gateway>,
        store: StopStore,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let now = Utc::now();
        let state = EngineState::new(settings.instruments.keys().cloned(), now);
        let generator = SignalGenerator::new(settings.signal.clone());
        let exposure = StaticLimitsGuard::new(settings.risk.clone());
        Self { gateway, settings, generator, exposure, store: Mutex::new(store), state, events }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.settings.schedule
    }

    pub fn instrument_names(&self) -> Vec<String> {
        self.state.instruments().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.schedule.lock_timeout_ms)
    }

    fn emit(&self, event: EngineEvent) {
        // A send error only means nobody is subscribed.
        let _ = self.events.send(event);
    }

    /// Surfaces a tick failure to event subscribers (the Telegram alerter).
    pub fn publish_error(&self, detail: impl Into<String>) {
        self.emit(EngineEvent::EngineError { detail: detail.into() });
    }

    /// One-time startup: applies configured leverage, adopts any positions
    /// the exchange already holds, and announces readiness.
    pub async fn start(&self) -> Result<(), EngineError> {
        for (instrument, cfg) in &self.settings.instruments {
            if let Err(e) = self.gateway.set_leverage(instrument, cfg.leverage).await {
                warn!(instrument, error = %e, "failed to set leverage, keeping exchange default");
            }
        }
        self.recover_all().await?;
        self.emit(EngineEvent::Started {
            timestamp: Utc::now(),
            instruments: self.instrument_names(),
        });
        info!(instruments = ?self.instrument_names(), "engine started");
        Ok(())
    }

    /// Adopts exchange positions into engine state after a restart.
    ///
    /// Idempotent: a slot that is already out of `Idle` is left alone, and
    /// adoption itself places no orders, so running this twice changes
    /// nothing. Persisted trailing state takes precedence over re-seeding
    /// from the entry price, otherwise the stop would forget everything the
    /// position already earned.
    pub async fn recover_all(&self) -> Result<(), EngineError> {
        let positions = self.gateway.get_positions().await?;
        let mut live: Vec<String> = Vec::new();

        for position in positions {
            let Some(slot) = self.state.slot(&position.instrument) else {
                warn!(instrument = %position.instrument, "exchange holds a position outside the configured basket, leaving it alone");
                continue;
            };
            live.push(position.instrument.clone());
            let mut st = slot.lock().await;
            if st.phase != Phase::Idle {
                continue;
            }
            self.adopt_position(&mut st, &position).await?;
        }

        // Records for positions that no longer exist are leftovers from a
        // close the process did not live to finish.
        let mut store = self.store.lock().await;
        for instrument in store.instruments() {
            if !live.contains(&instrument) {
                info!(instrument, "purging stop record with no matching position");
                if let Err(e) = store.remove(&instrument) {
                    warn!(instrument, error = %e, "failed to purge stop record");
                }
            }
        }
        Ok(())
    }

    async fn adopt_position(
        &self,
        st: &mut InstrumentState,
        position: &PositionSnapshot,
    ) -> Result<(), EngineError> {
        let now = Utc::now();
        let persisted = { self.store.lock().await.get(&position.instrument).cloned() };
        let trailing = match persisted {
            Some(t) => t,
            None => {
                let stop = match position.direction {
                    Direction::Long => {
                        position.entry_price * (Decimal::ONE - self.settings.signal.stop_loss_pct)
                    }
                    Direction::Short => {
                        position.entry_price * (Decimal::ONE + self.settings.signal.stop_loss_pct)
                    }
                };
                let seeded = TrailingStopState::seed(
                    &position.instrument,
                    position.direction,
                    position.entry_price,
                    stop,
                    now,
                );
                if let Err(e) = self.store.lock().await.upsert(seeded.clone()) {
                    warn!(instrument = %position.instrument, error = %e, "failed to persist re-seeded stop state");
                }
                seeded
            }
        };

        // The original target is policy, so it can be rebuilt from the entry
        // price. Re-place it only when no reduce-only order already rests,
        // otherwise every restart would stack another one.
        let target = match position.direction {
            Direction::Long => {
                position.entry_price * (Decimal::ONE + self.settings.signal.take_profit_pct)
            }
            Direction::Short => {
                position.entry_price * (Decimal::ONE - self.settings.signal.take_profit_pct)
            }
        };
        if !trailing.partial_profit_taken {
            let has_target_order = match self.gateway.get_open_orders(&position.instrument).await {
                Ok(orders) => orders.iter().any(|o| o.reduce_only),
                Err(e) => {
                    warn!(instrument = %position.instrument, error = %e, "could not list resting orders, not re-placing target");
                    true
                }
            };
            if !has_target_order {
                let request = OrderRequest::reduce_only_limit(
                    &position.instrument,
                    position.direction.exit_side(),
                    position.quantity,
                    target,
                );
                if let Err(e) = self.gateway.place_order(&request).await {
                    warn!(instrument = %position.instrument, error = %e, "failed to re-place target order");
                }
            }
        }

        st.signal = Some(Signal {
            signal_id: Uuid::new_v4(),
            instrument: position.instrument.clone(),
            direction: position.direction,
            entry_price: position.entry_price,
            stop_loss: trailing.stop_level,
            take_profit: (!trailing.partial_profit_taken).then_some(target),
            confidence: Decimal::ZERO,
            reason: "adopted from exchange after restart".to_string(),
            created_at: now,
        });
        st.quantity = position.quantity;
        st.trailing = Some(trailing.clone());
        st.phase = Phase::Active;
        self.state.position_opened();

        info!(
            instrument = %position.instrument,
            stop = %trailing.stop_level,
            "recovered open position"
        );
        self.emit(EngineEvent::PositionRecovered {
            instrument: position.instrument.clone(),
            direction: position.direction,
            stop_level: trailing.stop_level,
        });
        Ok(())
    }

    /// One decision tick for one instrument: refresh the window, run the
    /// signal gates, and open a position if everything agrees.
    pub async fn on_decision_tick(&self, instrument: &str) -> Result<(), EngineError> {
        let slot = self
            .state
            .slot(instrument)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument.to_string()))?;
        let Some(mut st) = lock_slot(&slot, self.lock_timeout()).await else {
            debug!(instrument, "slot busy, decision tick skipped");
            return Ok(());
        };

        self.refresh_window(instrument, &mut st, false).await?;

        let now = Utc::now();
        let verdict = {
            let guard = SlotGuard { state: &st };
            self.generator.evaluate(instrument, &st.window, &guard, now)?
        };
        let signal = match verdict {
            Verdict::Emit(signal) => signal,
            Verdict::Reject(reason) => {
                debug!(instrument, ?reason, "no entry");
                return Ok(());
            }
        };

        let balance = self.gateway.get_balance().await?;
        let snapshot = ExposureSnapshot {
            open_positions: self.state.open_positions(),
            daily_realized_pnl: self.state.ledger.lock().await.realized(now),
            balance,
        };
        if let Err(refusal) = self.exposure.approve(&snapshot) {
            info!(instrument, %refusal, "exposure guard refused entry");
            return Ok(());
        }

        self.open_position(instrument, &mut st, signal, now).await
    }

    async fn open_position(
        &self,
        instrument: &str,
        st: &mut InstrumentState,
        signal: Signal,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let cfg = self
            .settings
            .instruments
            .get(instrument)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument.to_string()))?;

        st.phase = Phase::Opening;
        let request = OrderRequest::market(instrument, signal.direction.entry_side(), cfg.quantity);
        let ack = match self.gateway.place_order(&request).await {
            Ok(ack) if !ack.status.is_failure() => ack,
            Ok(ack) => {
                return self.entry_failed(instrument, st, now, format!("status {:?}", ack.status));
            }
            Err(e) => return self.entry_failed(instrument, st, now, e.to_string()),
        };

        let entry_price = if ack.avg_price > Decimal::ZERO { ack.avg_price } else { signal.entry_price };
        let trailing = TrailingStopState::seed(
            instrument,
            signal.direction,
            entry_price,
            signal.stop_loss,
            now,
        );
        if let Err(e) = self.store.lock().await.upsert(trailing.clone()) {
            warn!(instrument, error = %e, "failed to persist seeded stop state, continuing in memory");
        }

        if let Some(tp) = signal.take_profit {
            let tp_request = OrderRequest::reduce_only_limit(
                instrument,
                signal.direction.exit_side(),
                cfg.quantity,
                tp,
            );
            if let Err(e) = self.gateway.place_order(&tp_request).await {
                warn!(instrument, error = %e, "failed to place take-profit order, monitor will handle the exit");
            }
        }

        info!(
            instrument,
            direction = ?signal.direction,
            entry = %entry_price,
            stop = %signal.stop_loss,
            "position opened"
        );
        self.emit(EngineEvent::PositionOpened {
            instrument: instrument.to_string(),
            direction: signal.direction,
            entry_price,
            quantity: cfg.quantity,
            stop_loss: signal.stop_loss,
            confidence: signal.confidence,
        });

        st.signal = Some(Signal { entry_price, ..signal });
        st.quantity = cfg.quantity;
        st.trailing = Some(trailing);
        st.phase = Phase::Active;
        self.state.position_opened();
        Ok(())
    }

    /// A failed entry releases the slot and throttles retries.
    fn entry_failed(
        &self,
        instrument: &str,
        st: &mut InstrumentState,
        now: DateTime<Utc>,
        detail: String,
    ) -> Result<(), EngineError> {
        let until =
            now + ChronoDuration::seconds(self.settings.signal.failed_order_cooldown_secs as i64);
        st.clear_position();
        st.cooldown = Some(Cooldown { until, kind: CooldownKind::FailedOrder });

        error!(instrument, detail, "entry order failed");
        self.emit(EngineEvent::OrderRejected {
            instrument: instrument.to_string(),
            detail: detail.clone(),
        });
        self.emit(EngineEvent::CooldownStarted {
            instrument: instrument.to_string(),
            kind: CooldownKind::FailedOrder,
            until,
        });
        Err(EngineError::OrderRejected { instrument: instrument.to_string(), detail })
    }

    /// One monitor tick for one instrument: ratchet the trailing stop and
    /// exit when the stop or target is crossed.
    pub async fn on_monitor_tick(&self, instrument: &str) -> Result<(), EngineError> {
        let slot = self
            .state
            .slot(instrument)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument.to_string()))?;
        let Some(mut st) = lock_slot(&slot, self.lock_timeout()).await else {
            debug!(instrument, "slot busy, monitor tick skipped");
            return Ok(());
        };
        if st.phase != Phase::Active {
            return Ok(());
        }

        let positions = self.gateway.get_positions().await?;
        let Some(position) = positions.into_iter().find(|p| p.instrument == instrument) else {
            // The exchange no longer holds it: the take-profit limit filled
            // or someone closed it by hand.
            let mark = self.gateway.get_last_price(instrument).await?;
            let reason = self.classify_external_exit(&st, mark);
            return self.finalize_close(instrument, &mut st, mark, reason, false).await;
        };

        let direction = position.direction;
        let mark = position.mark_price;
        let trail_pct = self.settings.signal.trail_pct;
        let now = Utc::now();

        if st.trailing.is_none() {
            warn!(instrument, "active position without trailing state, re-seeding");
            let stop = match direction {
                Direction::Long => {
                    position.entry_price * (Decimal::ONE - self.settings.signal.stop_loss_pct)
                }
                Direction::Short => {
                    position.entry_price * (Decimal::ONE + self.settings.signal.stop_loss_pct)
                }
            };
            st.trailing = Some(TrailingStopState::seed(
                instrument,
                direction,
                position.entry_price,
                stop,
                now,
            ));
        }
        let Some(trailing) = st.trailing.as_mut() else {
            return Ok(());
        };

        // Ratchet: the high-water mark and the stop only ever move in the
        // favorable direction.
        let mut advanced = false;
        match direction {
            Direction::Long => {
                if mark > trailing.high_water_mark {
                    trailing.high_water_mark = mark;
                    let candidate = trailing.high_water_mark * (Decimal::ONE - trail_pct);
                    if candidate > trailing.stop_level {
                        trailing.stop_level = candidate;
                        advanced = true;
                    }
                    trailing.updated_at = now;
                }
            }
            Direction::Short => {
                if mark < trailing.high_water_mark {
                    trailing.high_water_mark = mark;
                    let candidate = trailing.high_water_mark * (Decimal::ONE + trail_pct);
                    if candidate < trailing.stop_level {
                        trailing.stop_level = candidate;
                        advanced = true;
                    }
                    trailing.updated_at = now;
                }
            }
        }

        let stop_level = trailing.stop_level;
        let high_water_mark = trailing.high_water_mark;
        if advanced {
            let snapshot = trailing.clone();
            if let Err(e) = self.store.lock().await.upsert(snapshot) {
                warn!(instrument, error = %e, "failed to persist advanced stop, continuing in memory");
            }
            debug!(instrument, hwm = %high_water_mark, stop = %stop_level, "trailing stop advanced");
            self.emit(EngineEvent::StopAdvanced {
                instrument: instrument.to_string(),
                high_water_mark,
                stop_level,
            });
        }

        // Strict cross: touching the stop exactly is not a hit.
        let crossed = match direction {
            Direction::Long => mark < stop_level,
            Direction::Short => mark > stop_level,
        };
        if crossed {
            info!(instrument, %mark, stop = %stop_level, "stop crossed, closing");
            return self
                .finalize_close(instrument, &mut st, mark, ExitReason::StopLossHit, true)
                .await;
        }

        // Fallback for the take-profit target: normally the resting
        // reduce-only limit fills on the exchange, but a gap past the target
        // between ticks is taken at market. One-shot per position.
        let target = st.signal.as_ref().and_then(|s| s.take_profit);
        let already_taken =
            st.trailing.as_ref().map(|t| t.partial_profit_taken).unwrap_or(true);
        if let Some(target) = target {
            let reached = match direction {
                Direction::Long => mark >= target,
                Direction::Short => mark <= target,
            };
            if reached && !already_taken {
                if let Some(t) = st.trailing.as_mut() {
                    t.partial_profit_taken = true;
                    t.updated_at = now;
                    let snapshot = t.clone();
                    if let Err(e) = self.store.lock().await.upsert(snapshot) {
                        warn!(instrument, error = %e, "failed to persist profit-taken flag");
                    }
                }
                info!(instrument, %mark, %target, "take-profit reached, closing");
                return self
                    .finalize_close(instrument, &mut st, mark, ExitReason::TakeProfitHit, true)
                    .await;
            }
        }
        Ok(())
    }

    fn classify_external_exit(&self, st: &InstrumentState, mark: Decimal) -> ExitReason {
        let Some(signal) = st.signal.as_ref() else { return ExitReason::External };
        match (signal.take_profit, signal.direction) {
            (Some(tp), Direction::Long) if mark >= tp => ExitReason::TakeProfitHit,
            (Some(tp), Direction::Short) if mark <= tp => ExitReason::TakeProfitHit,
            _ => ExitReason::External,
        }
    }

    /// Winds a position down: cancels resting orders, flattens on the
    /// exchange when we initiated the exit, books the P&L, drops the
    /// persisted stop, and applies the loss cooldown when it was a losing
    /// stop-out. A winning exit leaves the slot immediately re-enterable.
    async fn finalize_close(
        &self,
        instrument: &str,
        st: &mut InstrumentState,
        exit_hint: Decimal,
        reason: ExitReason,
        needs_exit_order: bool,
    ) -> Result<(), EngineError> {
        st.phase = Phase::Closing;
        let direction = st
            .signal
            .as_ref()
            .map(|s| s.direction)
            .or_else(|| st.trailing.as_ref().map(|t| t.direction))
            .unwrap_or(Direction::Long);
        let quantity = st.quantity;
        let now = Utc::now();

        match self.gateway.get_open_orders(instrument).await {
            Ok(orders) => {
                for order in orders {
                    if let Err(e) = self.gateway.cancel_order(instrument, order.order_id).await {
                        warn!(instrument, order_id = order.order_id, error = %e, "failed to cancel resting order");
                    }
                }
            }
            Err(e) => warn!(instrument, error = %e, "could not list resting orders during close"),
        }

        let mut exit_price = exit_hint;
        if needs_exit_order {
            let request = OrderRequest::market(instrument, direction.exit_side(), quantity);
            match self.gateway.place_order(&request).await {
                Ok(ack) if !ack.status.is_failure() => {
                    if ack.avg_price > Decimal::ZERO {
                        exit_price = ack.avg_price;
                    }
                }
                Ok(ack) => {
                    // Still on the exchange; stay active and retry next tick.
                    st.phase = Phase::Active;
                    return Err(EngineError::OrderRejected {
                        instrument: instrument.to_string(),
                        detail: format!("exit order status {:?}", ack.status),
                    });
                }
                Err(e) => {
                    st.phase = Phase::Active;
                    return Err(e.into());
                }
            }
        }

        let entry_price =
            st.signal.as_ref().map(|s| s.entry_price).unwrap_or(exit_price);
        let realized_pnl = match direction {
            Direction::Long => (exit_price - entry_price) * quantity,
            Direction::Short => (entry_price - exit_price) * quantity,
        };
        self.state.ledger.lock().await.record(now, realized_pnl);

        if let Err(e) = self.store.lock().await.remove(instrument) {
            warn!(instrument, error = %e, "failed to remove persisted stop state");
        }

        st.clear_position();
        self.state.position_closed();

        let cools_down = realized_pnl < Decimal::ZERO
            || self.settings.signal.cooldown_on_winning_stop;
        if reason == ExitReason::StopLossHit && cools_down {
            let until =
                now + ChronoDuration::seconds(self.settings.signal.loss_cooldown_secs as i64);
            st.cooldown = Some(Cooldown { until, kind: CooldownKind::Loss });
            self.emit(EngineEvent::CooldownStarted {
                instrument: instrument.to_string(),
                kind: CooldownKind::Loss,
                until,
            });
        }

        info!(
            instrument,
            ?reason,
            exit = %exit_price,
            pnl = %realized_pnl,
            "position closed"
        );
        self.emit(EngineEvent::PositionClosed {
            instrument: instrument.to_string(),
            direction,
            exit_price,
            realized_pnl,
            reason,
        });
        Ok(())
    }

    /// Cancels resting orders on idle instruments that have outlived the
    /// configured age. Orders belonging to an open position are resting on
    /// purpose and are never touched.
    pub async fn on_stale_order_sweep(&self, instrument: &str) -> Result<(), EngineError> {
        let slot = self
            .state
            .slot(instrument)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument.to_string()))?;
        let Ok(st) = slot.try_lock() else {
            return Ok(());
        };
        if st.phase != Phase::Idle {
            return Ok(());
        }

        let cutoff = Utc::now()
            - ChronoDuration::seconds(self.settings.schedule.stale_order_max_age_secs as i64);
        let orders = self.gateway.get_open_orders(instrument).await?;
        for order in orders {
            if order.placed_at < cutoff {
                info!(instrument, order_id = order.order_id, "cancelling stale order");
                if let Err(e) = self.gateway.cancel_order(instrument, order.order_id).await {
                    warn!(instrument, order_id = order.order_id, error = %e, "stale order cancel failed");
                }
            }
        }
        drop(st);
        Ok(())
    }

    /// Full window heal for one instrument.
    pub async fn on_history_refresh(&self, instrument: &str) -> Result<(), EngineError> {
        let slot = self
            .state
            .slot(instrument)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument.to_string()))?;
        let Some(mut st) = lock_slot(&slot, self.lock_timeout()).await else {
            debug!(instrument, "slot busy, history refresh skipped");
            return Ok(());
        };
        self.refresh_window(instrument, &mut st, true).await
    }

    async fn refresh_window(
        &self,
        instrument: &str,
        st: &mut InstrumentState,
        full: bool,
    ) -> Result<(), EngineError> {
        let cap = self.settings.signal.window_cap;
        let limit = if full || st.window.len() + INCREMENTAL_FETCH < cap {
            cap
        } else {
            INCREMENTAL_FETCH
        };
        let bucket = history::bucket_duration(&self.settings.signal.interval).ok_or_else(|| {
            EngineError::DataQuality {
                instrument: instrument.to_string(),
                detail: format!("unrecognized kline interval {:?}", self.settings.signal.interval),
            }
        })?;
        let fresh = self
            .gateway
            .fetch_recent_samples(instrument, &self.settings.signal.interval, limit)
            .await?;
        history::validate_samples(instrument, &fresh, bucket, Utc::now())?;
        if full {
            st.window = fresh;
            if st.window.len() > cap {
                let excess = st.window.len() - cap;
                st.window.drain(..excess);
            }
        } else {
            history::merge_samples(&mut st.window, fresh, cap);
        }
        Ok(())
    }

    /// Read-only view of the slot map, used by the integration tests to
    /// inspect lifecycle state.
    pub fn state(&self) -> &EngineState {
        &self.state
    }
}
