use rust_decimal::Decimal;

/// Simple moving average over the last `period` values.
pub fn sma(values: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let sum: Decimal = window.iter().copied().sum();
    Some(sum / Decimal::from(period))
}

/// Exponential moving average series.
///
/// Seeded with the SMA of the first `period` values, then smoothed with
/// alpha = 2 / (period + 1). `out[i]` corresponds to `values[period - 1 + i]`,
/// so the series is `values.len() - period + 1` long.
pub fn ema_series(values: &[Decimal], period: usize) -> Option<Vec<Decimal>> {
    if period == 0 || values.len() < period {
        return None;
    }
    let seed: Decimal = values[..period].iter().copied().sum::<Decimal>() / Decimal::from(period);
    let alpha = Decimal::from(2) / Decimal::from(period + 1);
    let one = Decimal::ONE;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for value in &values[period..] {
        prev = *value * alpha + prev * (one - alpha);
        out.push(prev);
    }
    Some(out)
}

/// The latest exponential moving average value over `values`.
pub fn ema(values: &[Decimal], period: usize) -> Option<Decimal> {
    ema_series(values, period).and_then(|s| s.last().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sma_averages_tail() {
        let values = vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)];
        assert_eq!(sma(&values, 3), Some(dec!(4)));
        assert_eq!(sma(&values, 5), Some(dec!(3)));
    }

    #[test]
    fn sma_short_window_is_none() {
        assert_eq!(sma(&[dec!(1), dec!(2)], 3), None);
        assert_eq!(sma(&[], 1), None);
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let values = vec![dec!(10); 30];
        assert_eq!(ema(&values, 10), Some(dec!(10)));
    }

    #[test]
    fn ema_tracks_rising_series_above_older_values() {
        let values: Vec<Decimal> = (1..=50).map(Decimal::from).collect();
        let fast = ema(&values, 5).unwrap();
        let slow = ema(&values, 20).unwrap();
        // A faster EMA hugs a rising series more closely.
        assert!(fast > slow);
        assert!(fast < dec!(50));
    }

    #[test]
    fn ema_series_alignment() {
        let values: Vec<Decimal> = (1..=10).map(Decimal::from).collect();
        let series = ema_series(&values, 4).unwrap();
        assert_eq!(series.len(), 7);
        // Seed is the SMA of the first 4 values.
        assert_eq!(series[0], dec!(2.5));
    }
}
