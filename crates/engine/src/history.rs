//! Kline window maintenance and data-quality checks.
//!
//! Indicator math silently produces garbage on bad input, so every batch from
//! the gateway is validated before it touches a window. A batch that fails
//! validation is dropped whole and the tick that wanted it is skipped.

use crate::error::EngineError;
use chrono::{DateTime, Duration, Utc};
use core_types::PriceSample;
use rust_decimal::Decimal;

/// Widest hole tolerated between consecutive buckets, in bucket widths. The
/// exchange occasionally skips a bucket; anything wider means the batch is
/// not the contiguous window the indicators assume.
const MAX_GAP_BUCKETS: i32 = 3;

/// How far behind `now` the newest bucket may have closed before the whole
/// batch is considered stale.
const MAX_STALE_BUCKETS: i32 = 3;

/// Parses a kline interval string ("30s", "5m", "1h", "1d") into the bucket
/// width it denotes.
pub fn bucket_duration(interval: &str) -> Option<Duration> {
    let split = interval.len().checked_sub(1)?;
    let (value, unit) = interval.split_at(split);
    let value: i64 = value.parse().ok()?;
    if value <= 0 {
        return None;
    }
    match unit {
        "s" => Some(Duration::seconds(value)),
        "m" => Some(Duration::minutes(value)),
        "h" => Some(Duration::hours(value)),
        "d" => Some(Duration::days(value)),
        _ => None,
    }
}

/// Rejects batches the indicators cannot be trusted on: empty, out of order,
/// gapped, stale, or containing non-positive prices or inverted high/low.
pub fn validate_samples(
    instrument: &str,
    samples: &[PriceSample],
    bucket: Duration,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if samples.is_empty() {
        return Err(EngineError::DataQuality {
            instrument: instrument.to_string(),
            detail: "empty kline batch".to_string(),
        });
    }
    for pair in samples.windows(2) {
        if pair[1].open_time <= pair[0].open_time {
            return Err(EngineError::DataQuality {
                instrument: instrument.to_string(),
                detail: format!(
                    "klines out of order: {} then {}",
                    pair[0].open_time, pair[1].open_time
                ),
            });
        }
        if pair[1].open_time - pair[0].open_time > bucket * MAX_GAP_BUCKETS {
            return Err(EngineError::DataQuality {
                instrument: instrument.to_string(),
                detail: format!(
                    "implausible gap between {} and {}",
                    pair[0].open_time, pair[1].open_time
                ),
            });
        }
    }
    // The last bucket may still be in progress, so its close_time sits in
    // the future; a close far in the past means the feed went quiet.
    let newest = &samples[samples.len() - 1];
    if now - newest.close_time > bucket * MAX_STALE_BUCKETS {
        return Err(EngineError::DataQuality {
            instrument: instrument.to_string(),
            detail: format!("stale klines: newest bucket closed at {}", newest.close_time),
        });
    }
    for sample in samples {
        if sample.close <= Decimal::ZERO || sample.low <= Decimal::ZERO {
            return Err(EngineError::DataQuality {
                instrument: instrument.to_string(),
                detail: format!("non-positive price at {}", sample.open_time),
            });
        }
        if sample.high < sample.low {
            return Err(EngineError::DataQuality {
                instrument: instrument.to_string(),
                detail: format!("high below low at {}", sample.open_time),
            });
        }
        if sample.volume < Decimal::ZERO {
            return Err(EngineError::DataQuality {
                instrument: instrument.to_string(),
                detail: format!("negative volume at {}", sample.open_time),
            });
        }
    }
    Ok(())
}

/// Merges a fresh batch into the rolling window.
///
/// A fresh sample with the same `open_time` as the window's last element is
/// the in-progress bucket being updated in place. Newer samples append;
/// anything older is already held and is ignored. The window is then trimmed
/// from the front to `cap`.
pub fn merge_samples(window: &mut Vec<PriceSample>, fresh: Vec<PriceSample>, cap: usize) {
    for sample in fresh {
        match window.last() {
            Some(last) if sample.open_time == last.open_time => {
                let idx = window.len() - 1;
                window[idx] = sample;
            }
            Some(last) if sample.open_time > last.open_time => window.push(sample),
            Some(_) => {}
            None => window.push(sample),
        }
    }
    if window.len() > cap {
        let excess = window.len() - cap;
        window.drain(..excess);
    }
}
