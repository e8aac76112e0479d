//! Durable trailing-stop state, one record per instrument.
//!
//! A protective stop must survive a process restart, so every accepted
//! trailing-stop update is written through to disk before the lifecycle call
//! that made it returns. The store is a single JSON file keyed by instrument:
//! small, human-inspectable, and trivially atomic to reason about at this
//! record count (a handful of instruments).
//!
//! A missing or unreadable file is a valid state and reads as an empty
//! store. Durability degrades gracefully: a failed write is reported to the
//! caller, who logs it and continues on in-memory state rather than halting
//! trading.

pub mod error;

pub use error::PersistenceError;

use core_types::TrailingStopState;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Write-through store mapping instrument → [`TrailingStopState`].
#[derive(Debug)]
pub struct StopStore {
    path: PathBuf,
    records: HashMap<String, TrailingStopState>,
}

impl StopStore {
    /// Opens the store, loading any prior records.
    ///
    /// Corrupt or partially-written state falls back to an empty store with a
    /// warning; it must never crash the process.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "stop-state file is corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { path, records }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, instrument: &str) -> Option<&TrailingStopState> {
        self.records.get(instrument)
    }

    /// Inserts or replaces the record for an instrument and flushes to disk.
    pub fn upsert(&mut self, state: TrailingStopState) -> Result<(), PersistenceError> {
        self.records.insert(state.instrument.clone(), state);
        self.flush()
    }

    /// Removes the record for an instrument (position closed) and flushes.
    /// Removing an absent record is a no-op.
    pub fn remove(&mut self, instrument: &str) -> Result<(), PersistenceError> {
        if self.records.remove(instrument).is_none() {
            return Ok(());
        }
        self.flush()
    }

    /// Instruments that currently have a persisted record.
    pub fn instruments(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::Direction;
    use rust_decimal_macros::dec;

    fn state(instrument: &str) -> TrailingStopState {
        TrailingStopState::seed(instrument, Direction::Long, dec!(100), dec!(95), Utc::now())
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StopStore::open(dir.path().join("stops.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stops.json");

        let mut store = StopStore::open(&path);
        let mut s = state("BTCUSDT");
        s.high_water_mark = dec!(110);
        s.stop_level = dec!(104.5);
        store.upsert(s.clone()).unwrap();
        drop(store);

        let reopened = StopStore::open(&path);
        let loaded = reopened.get("BTCUSDT").unwrap();
        assert_eq!(loaded.high_water_mark, dec!(110));
        assert_eq!(loaded.stop_level, dec!(104.5));
    }

    #[test]
    fn corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stops.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = StopStore::open(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn remove_deletes_only_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stops.json");

        let mut store = StopStore::open(&path);
        store.upsert(state("BTCUSDT")).unwrap();
        store.upsert(state("ETHUSDT")).unwrap();
        store.remove("BTCUSDT").unwrap();
        drop(store);

        let reopened = StopStore::open(&path);
        assert!(reopened.get("BTCUSDT").is_none());
        assert!(reopened.get("ETHUSDT").is_some());
    }

    #[test]
    fn removing_absent_record_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = StopStore::open(dir.path().join("stops.json"));
        assert!(store.remove("BTCUSDT").is_ok());
    }
}
