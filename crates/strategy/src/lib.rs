//! Trading decision logic: the momentum scorer and the gated signal generator.
//!
//! This is a pure logic crate. It has no knowledge of the gateway, the
//! scheduler, or persistence; it depends only on `core-types`, `indicators`,
//! and `configuration`. The engine supplies the two things decision logic
//! needs from the outside world: a price window and an [`EntryGuard`] view of
//! the instrument's slot.

pub mod error;
pub mod generator;
pub mod scorer;

pub use error::StrategyError;
pub use generator::{RejectReason, SignalGenerator, Verdict};
pub use scorer::{CompositeScorer, MomentumScore, MomentumScorer, ScoreComponents};

use chrono::{DateTime, Utc};
use core_types::Cooldown;

/// Read-only view of an instrument's entry eligibility.
///
/// The signal generator checks this itself, not the caller, so a decision
/// tick can never race an open: the engine implements this on the same
/// per-instrument state it holds locked while the generator runs.
pub trait EntryGuard {
    /// True while the instrument holds (or is acquiring) a position slot.
    fn position_active(&self, instrument: &str) -> bool;

    /// The instrument's cooldown, if one is still running at `now`.
    fn active_cooldown(&self, instrument: &str, now: DateTime<Utc>) -> Option<Cooldown>;
}
