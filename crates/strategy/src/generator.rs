use crate::error::StrategyError;
use crate::scorer::{CompositeScorer, MomentumScorer};
use crate::EntryGuard;
use chrono::{DateTime, Utc};
use configuration::SignalParams;
use core_types::{CooldownKind, Direction, PriceSample, Signal};
use indicators::{average_volume, classify_structure, classify_trend, PriceStructure, Trend};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

/// The outcome of one decision-tick evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Emit(Signal),
    Reject(RejectReason),
}

/// Which gate rejected, and with what evidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// The instrument already holds (or is acquiring) a position slot.
    SlotOccupied,
    CoolingDown(CooldownKind),
    Trend,
    Volume { ratio: Decimal },
    Momentum { score: Decimal },
    Structure(PriceStructure),
}

/// Evaluates the sequential signal gates over a price window.
///
/// Stateless between ticks: the only inputs are the window, the clock, and
/// the [`EntryGuard`] view. Rejecting at any gate is side-effect-free, so the
/// generator is safe to call repeatedly and concurrently across instruments.
///
/// Gate order is fixed (trend, volume, momentum, structure) and evaluation
/// stops at the first rejection; a window that fails the trend gate never
/// reaches the momentum scorer.
pub struct SignalGenerator {
    params: SignalParams,
    scorer: Box<dyn MomentumScorer>,
}

impl SignalGenerator {
    pub fn new(params: SignalParams) -> Self {
        Self::with_scorer(params, Box::new(CompositeScorer))
    }

    /// Injects a scorer. Production uses [`CompositeScorer`]; tests use this
    /// seam for call-count instrumentation.
    pub fn with_scorer(params: SignalParams, scorer: Box<dyn MomentumScorer>) -> Self {
        Self { params, scorer }
    }

    /// Runs the gates for one instrument against the current window.
    ///
    /// The final element of `window` is the in-progress bucket: it supplies
    /// the entry price but is excluded from every indicator and from the
    /// volume ratio, because its partial volume would bias the ratio
    /// unpredictably.
    pub fn evaluate(
        &self,
        instrument: &str,
        window: &[PriceSample],
        guard: &dyn EntryGuard,
        now: DateTime<Utc>,
    ) -> Result<Verdict, StrategyError> {
        // Eligibility comes first so a decide/open race is impossible.
        if guard.position_active(instrument) {
            return Ok(Verdict::Reject(RejectReason::SlotOccupied));
        }
        if let Some(cooldown) = guard.active_cooldown(instrument, now) {
            return Ok(Verdict::Reject(RejectReason::CoolingDown(cooldown.kind)));
        }

        let needed = self.required_window();
        if window.len() < needed {
            return Err(StrategyError::InsufficientData { needed, got: window.len() });
        }
        let completed = &window[..window.len() - 1];
        let closes: Vec<Decimal> = completed.iter().map(|s| s.close).collect();

        // Gate 1: trend. A mixed EMA stack is untradeable.
        let direction = match classify_trend(&closes)
            .ok_or_else(|| StrategyError::Indicator("ema stack".to_string()))?
        {
            Trend::Bullish => Direction::Long,
            Trend::Bearish => Direction::Short,
            Trend::Sideways => {
                debug!(instrument, "trend gate rejected: sideways EMA stack");
                return Ok(Verdict::Reject(RejectReason::Trend));
            }
        };

        // Gate 2: volume. The last completed bucket against the average of
        // the `volume_lookback` buckets before it.
        let last_completed = completed.last().expect("window length checked above");
        let prior = &completed[..completed.len() - 1];
        let avg = average_volume(prior, self.params.volume_lookback)
            .ok_or_else(|| StrategyError::Indicator("average volume".to_string()))?;
        if avg.is_zero() {
            debug!(instrument, "volume gate rejected: zero average volume");
            return Ok(Verdict::Reject(RejectReason::Volume { ratio: Decimal::ZERO }));
        }
        let ratio = last_completed.volume / avg;
        if ratio <= self.params.volume_multiplier {
            debug!(instrument, %ratio, "volume gate rejected");
            return Ok(Verdict::Reject(RejectReason::Volume { ratio }));
        }

        // Gate 3: momentum, for the direction the trend implies.
        let momentum = self.scorer.score(completed, direction)?;
        if momentum.score < self.params.momentum_threshold {
            debug!(instrument, score = %momentum.score, "momentum gate rejected");
            return Ok(Verdict::Reject(RejectReason::Momentum { score: momentum.score }));
        }

        // Gate 4: swing structure must agree with the direction.
        let structure = classify_structure(completed, self.params.structure_lookback)
            .ok_or_else(|| StrategyError::Indicator("swing structure".to_string()))?;
        let structure_ok = matches!(
            (direction, structure),
            (Direction::Long, PriceStructure::HigherHighs)
                | (Direction::Short, PriceStructure::LowerLows)
        );
        if !structure_ok {
            debug!(instrument, ?structure, "structure gate rejected");
            return Ok(Verdict::Reject(RejectReason::Structure(structure)));
        }

        let entry = window.last().expect("window length checked above").close;
        let (stop_loss, take_profit) = match direction {
            Direction::Long => (
                entry * (Decimal::ONE - self.params.stop_loss_pct),
                entry * (Decimal::ONE + self.params.take_profit_pct),
            ),
            Direction::Short => (
                entry * (Decimal::ONE + self.params.stop_loss_pct),
                entry * (Decimal::ONE - self.params.take_profit_pct),
            ),
        };

        Ok(Verdict::Emit(Signal {
            signal_id: Uuid::new_v4(),
            instrument: instrument.to_string(),
            direction,
            entry_price: entry,
            stop_loss,
            take_profit: Some(take_profit),
            confidence: momentum.score,
            reason: format!(
                "trend {direction:?}, volume x{ratio:.2}, momentum {:.2}, structure {structure:?}",
                momentum.score
            ),
            created_at: now,
        }))
    }

    /// Smallest window (including the in-progress bucket) the gates can run on.
    fn required_window(&self) -> usize {
        let trend = 200;
        let volume = self.params.volume_lookback + 1;
        let structure = self.params.structure_lookback * 2;
        trend.max(volume).max(structure) + 1
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::scorer::MomentumScore;
    use crate::scorer::ScoreComponents;
    use chrono::{Duration, TimeZone};
    use core_types::Cooldown;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub fn params() -> SignalParams {
        SignalParams {
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
            failed_order_cooldown_secs: 300,
            cooldown_on_winning_stop: false,
        }
    }

    fn window_from_closes(closes: Vec<Decimal>) -> Vec<PriceSample> {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| PriceSample {
                open_time: start + Duration::minutes(5 * i as i64),
                close_time: start + Duration::minutes(5 * (i as i64 + 1)),
                high: close + dec!(0.3),
                low: close - dec!(0.3),
                close,
                volume: dec!(1000),
            })
            .collect()
    }

    /// Steadily rising zigzag: +0.5 / −0.2 alternation keeps the trend and
    /// swing structure bullish while holding RSI inside its favorable zone.
    pub fn bullish_window(n: usize) -> Vec<PriceSample> {
        let mut closes = Vec::with_capacity(n);
        let mut price = dec!(100);
        for i in 0..n {
            price += if i % 2 == 0 { dec!(0.5) } else { dec!(-0.2) };
            closes.push(price);
        }
        window_from_closes(closes)
    }

    /// Mirror of [`bullish_window`]: falling zigzag from a higher base.
    pub fn bearish_window(n: usize) -> Vec<PriceSample> {
        let mut closes = Vec::with_capacity(n);
        let mut price = dec!(500);
        for i in 0..n {
            price += if i % 2 == 0 { dec!(-0.5) } else { dec!(0.2) };
            closes.push(price);
        }
        window_from_closes(closes)
    }

    fn flat_window(n: usize) -> Vec<PriceSample> {
        window_from_closes(vec![dec!(100); n])
    }

    /// Marks the last *completed* bucket with `multiple` times the base volume.
    fn boost_completed_volume(window: &mut [PriceSample], multiple: Decimal) {
        let idx = window.len() - 2;
        window[idx].volume = dec!(1000) * multiple;
    }

    struct OpenGuard;
    impl EntryGuard for OpenGuard {
        fn position_active(&self, _: &str) -> bool {
            false
        }
        fn active_cooldown(&self, _: &str, _: DateTime<Utc>) -> Option<Cooldown> {
            None
        }
    }

    struct BlockedGuard {
        active: bool,
        cooldown: Option<Cooldown>,
    }
    impl EntryGuard for BlockedGuard {
        fn position_active(&self, _: &str) -> bool {
            self.active
        }
        fn active_cooldown(&self, _: &str, now: DateTime<Utc>) -> Option<Cooldown> {
            self.cooldown.filter(|c| c.is_active(now))
        }
    }

    /// Counts scorer invocations for gate-ordering assertions.
    struct CountingScorer {
        calls: Arc<AtomicUsize>,
        inner: CompositeScorer,
    }
    impl MomentumScorer for CountingScorer {
        fn score(
            &self,
            samples: &[PriceSample],
            direction: Direction,
        ) -> Result<MomentumScore, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.score(samples, direction)
        }
    }

    /// Always fully confident; lets tests reach the structure gate.
    struct MaxScorer;
    impl MomentumScorer for MaxScorer {
        fn score(
            &self,
            _: &[PriceSample],
            _: Direction,
        ) -> Result<MomentumScore, StrategyError> {
            Ok(MomentumScore {
                score: dec!(1.0),
                components: ScoreComponents {
                    rsi: dec!(0.20),
                    macd: dec!(0.20),
                    ema: dec!(0.25),
                    bollinger: dec!(0.15),
                    stochastic: dec!(0.20),
                },
            })
        }
    }

    #[test]
    fn surging_volume_in_uptrend_emits_long_signal() {
        let mut window = bullish_window(250);
        boost_completed_volume(&mut window, dec!(2.0));
        let generator = SignalGenerator::new(params());
        let verdict = generator.evaluate("BTCUSDT", &window, &OpenGuard, Utc::now()).unwrap();

        let Verdict::Emit(signal) = verdict else {
            panic!("expected a signal, got {verdict:?}");
        };
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.instrument, "BTCUSDT");
        let entry = window.last().unwrap().close;
        assert_eq!(signal.entry_price, entry);
        assert_eq!(signal.stop_loss, entry * dec!(0.95));
        assert_eq!(signal.take_profit, Some(entry * dec!(1.013)));
        assert!(signal.confidence >= dec!(0.55));
        assert!(signal.confidence <= dec!(1.0));
    }

    #[test]
    fn downtrend_emits_short_with_stop_above_entry() {
        let mut window = bearish_window(250);
        boost_completed_volume(&mut window, dec!(2.0));
        let generator = SignalGenerator::new(params());
        let verdict = generator.evaluate("ETHUSDT", &window, &OpenGuard, Utc::now()).unwrap();

        let Verdict::Emit(signal) = verdict else {
            panic!("expected a signal, got {verdict:?}");
        };
        assert_eq!(signal.direction, Direction::Short);
        assert!(signal.stop_loss > signal.entry_price);
        assert!(signal.take_profit.unwrap() < signal.entry_price);
    }

    #[test]
    fn tepid_volume_is_rejected() {
        // Same window as the emitting case, but the completed bucket only
        // printed 1.2x the average against a 1.5x multiplier.
        let mut window = bullish_window(250);
        boost_completed_volume(&mut window, dec!(1.2));
        let generator = SignalGenerator::new(params());
        let verdict = generator.evaluate("BTCUSDT", &window, &OpenGuard, Utc::now()).unwrap();
        assert!(matches!(verdict, Verdict::Reject(RejectReason::Volume { .. })));
    }

    #[test]
    fn sideways_trend_never_reaches_the_scorer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = SignalGenerator::with_scorer(
            params(),
            Box::new(CountingScorer { calls: Arc::clone(&calls), inner: CompositeScorer }),
        );
        let verdict =
            generator.evaluate("BTCUSDT", &flat_window(250), &OpenGuard, Utc::now()).unwrap();
        assert_eq!(verdict, Verdict::Reject(RejectReason::Trend));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn occupied_slot_is_refused_before_any_math() {
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = SignalGenerator::with_scorer(
            params(),
            Box::new(CountingScorer { calls: Arc::clone(&calls), inner: CompositeScorer }),
        );
        let guard = BlockedGuard { active: true, cooldown: None };
        let mut window = bullish_window(250);
        boost_completed_volume(&mut window, dec!(2.0));
        let verdict = generator.evaluate("BTCUSDT", &window, &guard, Utc::now()).unwrap();
        assert_eq!(verdict, Verdict::Reject(RejectReason::SlotOccupied));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn loss_cooldown_blocks_entry_until_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let cooldown =
            Cooldown { until: now + Duration::minutes(30), kind: CooldownKind::Loss };
        let guard = BlockedGuard { active: false, cooldown: Some(cooldown) };
        let mut window = bullish_window(250);
        boost_completed_volume(&mut window, dec!(2.0));
        let generator = SignalGenerator::new(params());

        let verdict = generator.evaluate("BTCUSDT", &window, &guard, now).unwrap();
        assert_eq!(verdict, Verdict::Reject(RejectReason::CoolingDown(CooldownKind::Loss)));

        // Same guard after expiry: the gate sequence runs again.
        let later = now + Duration::minutes(31);
        let verdict = generator.evaluate("BTCUSDT", &window, &guard, later).unwrap();
        assert!(matches!(verdict, Verdict::Emit(_)));
    }

    #[test]
    fn choppy_structure_rejects_even_with_perfect_momentum() {
        let mut window = bullish_window(250);
        boost_completed_volume(&mut window, dec!(2.0));
        // One deep wick in the recent half: higher high plus lower low reads
        // as choppy expansion.
        let idx = window.len() - 5;
        window[idx].low = dec!(80);
        let generator = SignalGenerator::with_scorer(params(), Box::new(MaxScorer));
        let verdict = generator.evaluate("BTCUSDT", &window, &OpenGuard, Utc::now()).unwrap();
        assert_eq!(
            verdict,
            Verdict::Reject(RejectReason::Structure(PriceStructure::Choppy))
        );
    }

    #[test]
    fn short_window_aborts_the_tick() {
        let generator = SignalGenerator::new(params());
        let err =
            generator.evaluate("BTCUSDT", &bullish_window(120), &OpenGuard, Utc::now()).unwrap_err();
        assert!(matches!(err, StrategyError::InsufficientData { .. }));
    }
}
