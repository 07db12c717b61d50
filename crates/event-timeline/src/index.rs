//! Inverted indices for filtering a log snapshot.
//!
//! This module provides:
//! - [`FilterIndex`]: kind, status and direction indices built in one pass
//! - Union within a dimension, intersection across dimensions
//!
//! Positions in the snapshot serve as entry identity, so two entries with
//! identical contents are never collapsed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::types::{Direction, Entry, EntryStatus, FilterSpec};

/// Immutable snapshot of the log that an index is built over.
pub type Snapshot = Arc<[Arc<Entry>]>;

/// Multi-dimensional index over a log snapshot.
///
/// Maintains indices for:
/// - Kind → positions
/// - Status → positions
/// - Direction → positions
#[derive(Debug, Clone)]
pub struct FilterIndex {
    snapshot: Snapshot,
    generation: u64,
    by_kind: HashMap<String, Vec<usize>>,
    by_status: HashMap<EntryStatus, Vec<usize>>,
    by_direction: HashMap<Direction, Vec<usize>>,
}

impl FilterIndex {
    /// Indexes `snapshot` in a single pass.
    ///
    /// `generation` identifies the log state the snapshot was taken from.
    #[must_use]
    pub fn build(snapshot: Snapshot, generation: u64) -> Self {
        let mut by_kind: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_status: HashMap<EntryStatus, Vec<usize>> = HashMap::new();
        let mut by_direction: HashMap<Direction, Vec<usize>> = HashMap::new();

        for (pos, entry) in snapshot.iter().enumerate() {
            by_kind.entry(entry.kind.clone()).or_default().push(pos);
            by_status.entry(entry.status).or_default().push(pos);
            by_direction.entry(entry.direction).or_default().push(pos);
        }

        Self {
            snapshot,
            generation,
            by_kind,
            by_status,
            by_direction,
        }
    }

    /// Log generation this index was built from.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The indexed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    /// Returns true if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Positions of entries with the given kind.
    #[must_use]
    pub fn by_kind(&self, kind: &str) -> &[usize] {
        self.by_kind.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Positions of entries with the given status.
    #[must_use]
    pub fn by_status(&self, status: EntryStatus) -> &[usize] {
        self.by_status.get(&status).map(Vec::as_slice).unwrap_or_default()
    }

    /// Positions of entries with the given direction.
    #[must_use]
    pub fn by_direction(&self, direction: Direction) -> &[usize] {
        self.by_direction.get(&direction).map(Vec::as_slice).unwrap_or_default()
    }

    /// Positions matching any of the given kinds.
    #[must_use]
    pub fn by_kinds(&self, kinds: &[String]) -> BTreeSet<usize> {
        union(kinds.iter().map(|kind| self.by_kind(kind)))
    }

    /// Positions matching any of the given statuses.
    #[must_use]
    pub fn by_statuses(&self, statuses: &[EntryStatus]) -> BTreeSet<usize> {
        union(statuses.iter().map(|&status| self.by_status(status)))
    }

    /// Positions matching any of the given directions.
    #[must_use]
    pub fn by_directions(&self, directions: &[Direction]) -> BTreeSet<usize> {
        union(directions.iter().map(|&direction| self.by_direction(direction)))
    }

    /// Entries matching `filter`, in log order.
    #[must_use]
    pub fn filter(&self, filter: &FilterSpec) -> Vec<Arc<Entry>> {
        if filter.is_unrestricted() {
            return self.snapshot.to_vec();
        }

        let mut selected: Option<BTreeSet<usize>> = None;
        if !filter.kinds.is_empty() {
            selected = Some(intersect(selected, self.by_kinds(&filter.kinds)));
        }
        if !filter.statuses.is_empty() {
            selected = Some(intersect(selected, self.by_statuses(&filter.statuses)));
        }
        if !filter.directions.is_empty() {
            selected = Some(intersect(selected, self.by_directions(&filter.directions)));
        }

        let in_range = |entry: &&Arc<Entry>| filter.time_range.contains(entry.timestamp);
        match selected {
            Some(positions) => positions
                .into_iter()
                .filter_map(|pos| self.snapshot.get(pos))
                .filter(in_range)
                .cloned()
                .collect(),
            None => self.snapshot.iter().filter(in_range).cloned().collect(),
        }
    }
}

fn union<'a>(buckets: impl Iterator<Item = &'a [usize]>) -> BTreeSet<usize> {
    buckets.flat_map(|bucket| bucket.iter().copied()).collect()
}

fn intersect(current: Option<BTreeSet<usize>>, next: BTreeSet<usize>) -> BTreeSet<usize> {
    match current {
        None => next,
        Some(current) => current.intersection(&next).copied().collect(),
    }
}
