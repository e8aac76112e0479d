use core_types::PriceSample;
use rust_decimal::Decimal;

/// The highest high over the last `lookback` samples, the breakout ceiling.
pub fn resistance(samples: &[PriceSample], lookback: usize) -> Option<Decimal> {
    if lookback == 0 || samples.len() < lookback {
        return None;
    }
    samples[samples.len() - lookback..].iter().map(|s| s.high).max()
}

/// The lowest low over the last `lookback` samples, the breakdown floor.
pub fn support(samples: &[PriceSample], lookback: usize) -> Option<Decimal> {
    if lookback == 0 || samples.len() < lookback {
        return None;
    }
    samples[samples.len() - lookback..].iter().map(|s| s.low).min()
}

/// Average traded volume over the last `lookback` samples.
pub fn average_volume(samples: &[PriceSample], lookback: usize) -> Option<Decimal> {
    if lookback == 0 || samples.len() < lookback {
        return None;
    }
    let sum: Decimal = samples[samples.len() - lookback..].iter().map(|s| s.volume).sum();
    Some(sum / Decimal::from(lookback))
}
