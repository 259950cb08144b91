//! Per-run record of executed strategies

use std::collections::BTreeSet;

use serde::Serialize;

use crate::merge::AppliedFusion;
use crate::types::{MovieId, StrategyKind};

/// One executed iteration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub iteration: usize,
    pub strategy: StrategyKind,
    pub query: String,
    pub movie_ids: Vec<MovieId>,
    pub degraded: bool,
    pub fusion: AppliedFusion,
    pub rationale: String,
}

/// Ordered history plus the set of `(strategy, query)` pairs already tried.
///
/// Queries are compared after trimming and lowercasing, so `"Tom Hanks"` and
/// `" tom hanks"` count as the same attempt.
#[derive(Debug, Clone, Default)]
pub struct RunHistory {
    entries: Vec<HistoryEntry>,
    tried: BTreeSet<(StrategyKind, String)>,
}

fn pair_key(query: &str) -> String {
    query.trim().to_lowercase()
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_tried(&self, strategy: StrategyKind, query: &str) -> bool {
        self.tried.contains(&(strategy, pair_key(query)))
    }

    /// Append an entry. Returns `false` (and records nothing) for a repeated pair.
    pub fn record(&mut self, entry: HistoryEntry) -> bool {
        if !self.tried.insert((entry.strategy, pair_key(&entry.query))) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any iteration used this strategy
    pub fn has_run(&self, strategy: StrategyKind) -> bool {
        self.entries.iter().any(|e| e.strategy == strategy)
    }

    /// Tried pairs in deterministic order
    pub fn tried_pairs(&self) -> impl Iterator<Item = (StrategyKind, &str)> {
        self.tried.iter().map(|(kind, query)| (*kind, query.as_str()))
    }

    pub fn into_entries(self) -> Vec<HistoryEntry> {
        self.entries
    }
}
