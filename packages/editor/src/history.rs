//! # Version History
//!
//! Append-only snapshot log, instantiated once per engine.
//!
//! ## Design
//!
//! - Entries are partitioned into *manual* (user-requested "save
//!   version") and *automatic* (every other commit)
//! - Manual entries are never capped; automatic entries are capped at
//!   [`AUTOMATIC_HISTORY_LIMIT`]
//! - When the cap is exceeded, the oldest automatic entry survives
//!   alongside the most recent `limit - 1`, so a "genesis" snapshot is
//!   preserved under heavy automatic churn — plain FIFO truncation
//!   would lose it
//! - Restore/delete work by index against the live list; an
//!   out-of-range index is a caller bug, logged and ignored

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maximum number of automatic entries kept per engine.
pub const AUTOMATIC_HISTORY_LIMIT: usize = 20;

/// An immutable snapshot of a document plus metadata. Never mutated
/// after creation, only deleted by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry<S> {
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub is_manual: bool,
    pub snapshot: S,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Bounded, dual-track snapshot log.
#[derive(Debug)]
pub struct HistoryTracker<S> {
    entries: Vec<HistoryEntry<S>>,
    /// Index of the entry currently restored as the live document;
    /// `None` means the live document is ahead of history.
    current: Option<usize>,
    max_automatic: usize,
}

impl<S> Default for HistoryTracker<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> HistoryTracker<S> {
    pub fn new() -> Self {
        Self::with_limit(AUTOMATIC_HISTORY_LIMIT)
    }

    pub fn with_limit(max_automatic: usize) -> Self {
        Self {
            entries: Vec::new(),
            current: None,
            max_automatic,
        }
    }

    /// Seed from persisted entries, replacing anything held so far.
    pub fn initialize_from(&mut self, entries: Vec<HistoryEntry<S>>) {
        self.entries = entries;
        self.current = None;
        self.enforce_limit();
    }

    pub fn entries(&self) -> &[HistoryEntry<S>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn automatic_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_manual).count()
    }

    pub fn manual_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_manual).count()
    }

    /// Append an entry and enforce the automatic retention bound.
    pub fn commit(&mut self, entry: HistoryEntry<S>) {
        self.entries.push(entry);
        self.enforce_limit();
    }

    /// Mark `index` as the live document and return its entry so the
    /// engine can re-hydrate the snapshot. Out-of-range indices are
    /// rejected with a diagnostic.
    pub fn restore(&mut self, index: usize) -> Option<&HistoryEntry<S>> {
        if index >= self.entries.len() {
            warn!(index, len = self.entries.len(), "history restore index out of range");
            return None;
        }
        self.current = Some(index);
        Some(&self.entries[index])
    }

    /// Delete the entry at `index`, shifting the current pointer so it
    /// keeps referencing the same logical entry. Deleting the current
    /// entry resets the pointer to "live".
    pub fn delete(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            warn!(index, len = self.entries.len(), "history delete index out of range");
            return false;
        }
        self.entries.remove(index);
        match self.current {
            Some(current) if index == current => self.current = None,
            Some(current) if index < current => self.current = Some(current - 1),
            _ => {}
        }
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    fn enforce_limit(&mut self) {
        if self.automatic_count() <= self.max_automatic {
            return;
        }

        let mut automatic = Vec::new();
        let mut manual = Vec::new();
        for entry in self.entries.drain(..) {
            if entry.is_manual {
                manual.push(entry);
            } else {
                automatic.push(entry);
            }
        }
        automatic.sort_by_key(|e| e.timestamp);

        if self.max_automatic == 0 {
            manual.sort_by_key(|e| e.timestamp);
            self.entries = manual;
            self.current = None;
            return;
        }

        // genesis snapshot plus the most recent (limit - 1)
        let recent_start = automatic.len() - (self.max_automatic - 1);
        let mut kept: Vec<HistoryEntry<S>> = Vec::with_capacity(self.max_automatic);
        let mut rest = automatic.split_off(1);
        kept.append(&mut automatic);
        kept.extend(rest.split_off(recent_start - 1));

        kept.extend(manual);
        kept.sort_by_key(|e| e.timestamp);
        self.entries = kept;

        // indices shifted wholesale; the pointer no longer names the
        // same logical entry
        self.current = None;
    }
}
