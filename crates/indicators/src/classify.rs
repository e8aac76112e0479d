use crate::moving::ema;
use core_types::PriceSample;
use rust_decimal::Decimal;

/// Long-window trend direction from the 20/50/200-period EMA stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

/// Recent swing structure over two adjacent half-windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceStructure {
    HigherHighs,
    LowerLows,
    Choppy,
}

/// Classifies trend by EMA stack ordering.
///
/// Bullish only when EMA20 > EMA50 > EMA200, bearish only on the strict
/// mirror ordering. Any mixed stack is sideways; the trend gate treats that
/// as untradeable. Needs at least 200 closes.
pub fn classify_trend(closes: &[Decimal]) -> Option<Trend> {
    let e20 = ema(closes, 20)?;
    let e50 = ema(closes, 50)?;
    let e200 = ema(closes, 200)?;
    if e20 > e50 && e50 > e200 {
        Some(Trend::Bullish)
    } else if e20 < e50 && e50 < e200 {
        Some(Trend::Bearish)
    } else {
        Some(Trend::Sideways)
    }
}

/// Classifies swing structure by comparing the most recent `half` samples
/// against the `half` samples before them.
///
/// Higher-highs requires the recent half to print a higher high without
/// undercutting the prior low; lower-lows is the mirror. Everything else is
/// choppy.
pub fn classify_structure(samples: &[PriceSample], half: usize) -> Option<PriceStructure> {
    if half == 0 || samples.len() < half * 2 {
        return None;
    }
    let recent = &samples[samples.len() - half..];
    let prior = &samples[samples.len() - half * 2..samples.len() - half];

    let recent_high = recent.iter().map(|s| s.high).max()?;
    let recent_low = recent.iter().map(|s| s.low).min()?;
    let prior_high = prior.iter().map(|s| s.high).max()?;
    let prior_low = prior.iter().map(|s| s.low).min()?;

    if recent_high > prior_high && recent_low >= prior_low {
        Some(PriceStructure::HigherHighs)
    } else if recent_low < prior_low && recent_high <= prior_high {
        Some(PriceStructure::LowerLows)
    } else {
        Some(PriceStructure::Choppy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn sample(high: Decimal, low: Decimal) -> PriceSample {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        PriceSample { open_time: t, close_time: t, high, low, close: low, volume: dec!(1000) }
    }

    #[test]
    fn rising_series_is_bullish() {
        let closes: Vec<Decimal> = (0..250).map(|i| dec!(100) + Decimal::from(i) / dec!(4)).collect();
        assert_eq!(classify_trend(&closes), Some(Trend::Bullish));
    }

    #[test]
    fn falling_series_is_bearish() {
        let closes: Vec<Decimal> = (0..250).map(|i| dec!(500) - Decimal::from(i)).collect();
        assert_eq!(classify_trend(&closes), Some(Trend::Bearish));
    }

    #[test]
    fn flat_series_is_sideways() {
        let closes = vec![dec!(100); 250];
        assert_eq!(classify_trend(&closes), Some(Trend::Sideways));
    }

    #[test]
    fn trend_needs_200_closes() {
        let closes: Vec<Decimal> = (0..150).map(Decimal::from).collect();
        assert_eq!(classify_trend(&closes), None);
    }

    #[test]
    fn ascending_swings_are_higher_highs() {
        let samples: Vec<PriceSample> = (0..20)
            .map(|i| sample(dec!(100) + Decimal::from(i), dec!(95) + Decimal::from(i)))
            .collect();
        assert_eq!(classify_structure(&samples, 10), Some(PriceStructure::HigherHighs));
    }

    #[test]
    fn descending_swings_are_lower_lows() {
        let samples: Vec<PriceSample> = (0..20)
            .map(|i| sample(dec!(200) - Decimal::from(i), dec!(195) - Decimal::from(i)))
            .collect();
        assert_eq!(classify_structure(&samples, 10), Some(PriceStructure::LowerLows));
    }

    #[test]
    fn expanding_range_is_choppy() {
        // Recent half prints both a higher high and a lower low.
        let mut samples: Vec<PriceSample> = (0..10).map(|_| sample(dec!(105), dec!(95))).collect();
        samples.extend((0..10).map(|_| sample(dec!(110), dec!(90))));
        assert_eq!(classify_structure(&samples, 10), Some(PriceStructure::Choppy));
    }
}
