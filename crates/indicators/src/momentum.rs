use crate::moving::ema_series;
use core_types::PriceSample;
use rust_decimal::Decimal;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Relative Strength Index over the last `period` price changes.
///
/// Uses plain averages of gains and losses over the lookback (not Wilder
/// smoothing), which keeps the value a pure function of the visible window.
pub fn rsi(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let tail = &closes[closes.len() - period - 1..];
    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;
    for pair in tail.windows(2) {
        let change = pair[1] - pair[0];
        if change > Decimal::ZERO {
            gains += change;
        } else {
            losses -= change;
        }
    }
    if losses.is_zero() {
        return Some(HUNDRED);
    }
    let rs = gains / losses;
    Some(HUNDRED - HUNDRED / (Decimal::ONE + rs))
}

/// MACD line, signal line, and histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    pub macd: Decimal,
    pub signal: Decimal,
    pub histogram: Decimal,
}

/// Moving Average Convergence Divergence.
///
/// Standard formulation: `macd = EMA(fast) - EMA(slow)`, signal is an EMA of
/// the macd series. Needs `slow + signal - 1` closes for a full signal line.
pub fn macd(
    closes: &[Decimal],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdOutput> {
    if fast == 0 || slow <= fast || signal_period == 0 {
        return None;
    }
    let fast_series = ema_series(closes, fast)?;
    let slow_series = ema_series(closes, slow)?;

    // Both series end at the last close; align them from the back.
    let len = slow_series.len().min(fast_series.len());
    let fast_tail = &fast_series[fast_series.len() - len..];
    let slow_tail = &slow_series[slow_series.len() - len..];
    let macd_series: Vec<Decimal> = fast_tail
        .iter()
        .zip(slow_tail.iter())
        .map(|(f, s)| *f - *s)
        .collect();

    let signal_series = ema_series(&macd_series, signal_period)?;
    let macd_value = *macd_series.last()?;
    let signal_value = *signal_series.last()?;
    Some(MacdOutput {
        macd: macd_value,
        signal: signal_value,
        histogram: macd_value - signal_value,
    })
}

/// Stochastic oscillator %K over the last `period` samples, in [0, 100].
///
/// A flat window (highest high equals lowest low) reads as a neutral 50.
pub fn stochastic_k(samples: &[PriceSample], period: usize) -> Option<Decimal> {
    if period == 0 || samples.len() < period {
        return None;
    }
    let window = &samples[samples.len() - period..];
    let highest = window.iter().map(|s| s.high).max()?;
    let lowest = window.iter().map(|s| s.low).min()?;
    let close = window.last()?.close;
    let range = highest - lowest;
    if range.is_zero() {
        return Some(Decimal::from(50));
    }
    Some((close - lowest) / range * HUNDRED)
}
