use crate::moving::sma;
use rust_decimal::{Decimal, MathematicalOps};

/// Bollinger Bands: SMA middle band with bands `k` standard deviations away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
}

/// Bollinger Bands over the last `period` closes.
///
/// Uses the population standard deviation, matching the common charting
/// convention. Returns `None` when the window is too short or the variance
/// square root is not representable.
pub fn bollinger(closes: &[Decimal], period: usize, k: Decimal) -> Option<BollingerBands> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let middle = sma(closes, period)?;
    let window = &closes[closes.len() - period..];
    let variance: Decimal = window
        .iter()
        .map(|c| {
            let d = *c - middle;
            d * d
        })
        .sum::<Decimal>()
        / Decimal::from(period);
    let std_dev = variance.sqrt()?;
    let offset = std_dev * k;
    Some(BollingerBands {
        upper: middle + offset,
        middle,
        lower: middle - offset,
    })
}
