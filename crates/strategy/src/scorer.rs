use crate::error::StrategyError;
use core_types::{Direction, PriceSample};
use indicators::{bollinger, classify_trend, macd, rsi, stochastic_k, Trend};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Component weights. A tunable policy, not a contract, but they must sum to
// 1.0 and each sub-score must be zero outside its favorable zone so a single
// bad indicator cannot be masked by the others.
const RSI_WEIGHT: Decimal = dec!(0.20);
const MACD_WEIGHT: Decimal = dec!(0.20);
const EMA_WEIGHT: Decimal = dec!(0.25);
const BOLLINGER_WEIGHT: Decimal = dec!(0.15);
const STOCHASTIC_WEIGHT: Decimal = dec!(0.20);

const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_STD_DEV: Decimal = dec!(2);
const STOCHASTIC_PERIOD: usize = 14;

/// The scorer needs the full EMA stack, so the 200-period EMA dominates.
const MIN_SAMPLES: usize = 200;

/// Per-indicator contribution to the composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreComponents {
    pub rsi: Decimal,
    pub macd: Decimal,
    pub ema: Decimal,
    pub bollinger: Decimal,
    pub stochastic: Decimal,
}

/// Composite momentum confidence for a proposed direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumScore {
    /// In [0, 1]; the sum of the component contributions.
    pub score: Decimal,
    pub components: ScoreComponents,
}

/// Scores momentum for a proposed direction over a price window.
///
/// Implementations must be pure: identical input windows always yield
/// identical scores. The trait seam exists so tests can observe whether (and
/// how often) the generator consults the scorer.
pub trait MomentumScorer: Send + Sync {
    fn score(&self, samples: &[PriceSample], direction: Direction)
        -> Result<MomentumScore, StrategyError>;
}

/// The production scorer: a weighted blend of RSI, MACD, EMA stack,
/// Bollinger position, and stochastic %K.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeScorer;

impl MomentumScorer for CompositeScorer {
    fn score(
        &self,
        samples: &[PriceSample],
        direction: Direction,
    ) -> Result<MomentumScore, StrategyError> {
        if samples.len() < MIN_SAMPLES {
            return Err(StrategyError::InsufficientData {
                needed: MIN_SAMPLES,
                got: samples.len(),
            });
        }
        let closes: Vec<Decimal> = samples.iter().map(|s| s.close).collect();
        let last_close = *closes.last().expect("non-empty window");

        let indicator_err = |name: &str| StrategyError::Indicator(name.to_string());

        let rsi_value = rsi(&closes, RSI_PERIOD).ok_or_else(|| indicator_err("rsi"))?;
        let macd_out = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)
            .ok_or_else(|| indicator_err("macd"))?;
        let trend = classify_trend(&closes).ok_or_else(|| indicator_err("ema stack"))?;
        let bands = bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_STD_DEV)
            .ok_or_else(|| indicator_err("bollinger"))?;
        let k = stochastic_k(samples, STOCHASTIC_PERIOD).ok_or_else(|| indicator_err("stochastic"))?;

        // Each component is all-or-nothing: its full weight inside the
        // favorable zone for the proposed direction, zero outside.
        let components = match direction {
            Direction::Long => ScoreComponents {
                // Momentum confirmed but not yet overbought.
                rsi: zone(rsi_value > dec!(50) && rsi_value < dec!(75), RSI_WEIGHT),
                macd: zone(macd_out.macd > macd_out.signal, MACD_WEIGHT),
                ema: zone(trend == Trend::Bullish, EMA_WEIGHT),
                // Riding the upper half of the bands.
                bollinger: zone(last_close > bands.middle, BOLLINGER_WEIGHT),
                stochastic: zone(k > dec!(50), STOCHASTIC_WEIGHT),
            },
            Direction::Short => ScoreComponents {
                rsi: zone(rsi_value < dec!(50) && rsi_value > dec!(25), RSI_WEIGHT),
                macd: zone(macd_out.macd < macd_out.signal, MACD_WEIGHT),
                ema: zone(trend == Trend::Bearish, EMA_WEIGHT),
                bollinger: zone(last_close < bands.middle, BOLLINGER_WEIGHT),
                stochastic: zone(k < dec!(50), STOCHASTIC_WEIGHT),
            },
        };

        let score = components.rsi
            + components.macd
            + components.ema
            + components.bollinger
            + components.stochastic;

        Ok(MomentumScore { score, components })
    }
}

fn zone(favorable: bool, weight: Decimal) -> Decimal {
    if favorable { weight } else { Decimal::ZERO }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::tests::{bearish_window, bullish_window};

    #[test]
    fn weights_sum_to_one() {
        let total = RSI_WEIGHT + MACD_WEIGHT + EMA_WEIGHT + BOLLINGER_WEIGHT + STOCHASTIC_WEIGHT;
        assert_eq!(total, dec!(1.0));
    }

    #[test]
    fn scorer_is_deterministic() {
        let window = bullish_window(250);
        let a = CompositeScorer.score(&window, Direction::Long).unwrap();
        let b = CompositeScorer.score(&window, Direction::Long).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bullish_window_scores_high_for_long() {
        let window = bullish_window(250);
        let out = CompositeScorer.score(&window, Direction::Long).unwrap();
        // EMA stack, Bollinger position, and stochastic all favor the long.
        assert_eq!(out.components.ema, EMA_WEIGHT);
        assert_eq!(out.components.bollinger, BOLLINGER_WEIGHT);
        assert_eq!(out.components.stochastic, STOCHASTIC_WEIGHT);
        assert!(out.score >= dec!(0.60));
        assert!(out.score <= dec!(1.0));
    }

    #[test]
    fn bullish_window_scores_low_for_short() {
        let window = bullish_window(250);
        let out = CompositeScorer.score(&window, Direction::Short).unwrap();
        assert_eq!(out.components.ema, Decimal::ZERO);
        assert_eq!(out.components.bollinger, Decimal::ZERO);
        assert!(out.score < dec!(0.5));
    }

    #[test]
    fn bearish_window_scores_high_for_short() {
        let window = bearish_window(250);
        let out = CompositeScorer.score(&window, Direction::Short).unwrap();
        assert_eq!(out.components.ema, EMA_WEIGHT);
        assert!(out.score >= dec!(0.60));
    }

    #[test]
    fn short_window_is_insufficient_data() {
        let window = bullish_window(50);
        let err = CompositeScorer.score(&window, Direction::Long).unwrap_err();
        assert!(matches!(err, StrategyError::InsufficientData { .. }));
    }
}
