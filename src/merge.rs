//! Candidate pool and fusion of per-strategy result sets
//!
//! Every non-empty result set of a run contributes to the pool. The fusion
//! applied to a new set is picked from the pair it forms with the previous
//! contributing strategy:
//! - broad + broad: union, pool score is the max across strategies
//! - any pair involving a filter: intersection against the ranked pool,
//!   weighted sum favoring filters
//! - empty intersection: weighted union of every contributing set, with
//!   filter hits lifted above broad-only hits
//!
//! Once a filter has narrowed the pool, later broad sets only re-score the
//! ranked movies; they never add or evict members.
//!
//! Evidence is never dropped. An intersection narrows which entries are
//! ranked, but every entry keeps its best score and the strategies that
//! surfaced it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MergeConfig;
use crate::types::{rank_order, MovieId, ResultSet, StrategyFamily, StrategyKind};

/// Requested fusion mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Pick per strategy pair from the family table
    Auto,
    Union,
    Intersection,
}

impl MergeMode {
    /// Resolve `Auto` for a pair of strategies. Only two broad-recall
    /// strategies are unioned.
    pub fn resolve(self, previous: StrategyKind, current: StrategyKind) -> MergeMode {
        match self {
            MergeMode::Auto => {
                let both_broad = previous.family() == StrategyFamily::BroadRecall
                    && current.family() == StrategyFamily::BroadRecall;
                if both_broad {
                    MergeMode::Union
                } else {
                    MergeMode::Intersection
                }
            }
            explicit => explicit,
        }
    }
}

/// How an intersection decides membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntersectionMode {
    /// Filters narrow the pool; broad sets narrow it only before any filter ran
    Auto,
    /// Every set narrows the pool
    Strict,
    /// Movies found by at least `min_intersection_matches` sets of the run
    Loose,
}

/// Fusion actually applied by one merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedFusion {
    /// First non-empty result set of the run
    Seed,
    Union,
    Intersection,
    /// Broad evidence re-scored the filtered pool without changing membership
    Refine,
    WeightedFallback,
    /// Empty result set; the pool is unchanged
    Skipped,
}

/// Aggregated evidence for one movie
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolEntry {
    pub movie_id: MovieId,
    /// Best aggregated score seen so far; only ever raised
    pub score: f32,
    pub found_by: BTreeSet<StrategyKind>,
    /// Best raw score per strategy
    pub strategy_scores: BTreeMap<StrategyKind, f32>,
}

impl PoolEntry {
    fn new(movie_id: MovieId) -> Self {
        Self {
            movie_id,
            score: 0.0,
            found_by: BTreeSet::new(),
            strategy_scores: BTreeMap::new(),
        }
    }

    fn raise(&mut self, score: f32) {
        if score > self.score {
            self.score = score;
        }
    }

    fn record(&mut self, kind: StrategyKind, score: f32) {
        self.found_by.insert(kind);
        self.strategy_scores
            .entry(kind)
            .and_modify(|best| {
                if score > *best {
                    *best = score;
                }
            })
            .or_insert(score);
    }

    fn has_filter_evidence(&self) -> bool {
        self.found_by
            .iter()
            .any(|kind| kind.family() == StrategyFamily::Filter)
    }
}

/// One non-empty result set, kept for multi-way scoring
#[derive(Debug, Clone)]
struct Contribution {
    strategy: StrategyKind,
    scores: HashMap<MovieId, f32>,
}

impl From<&ResultSet> for Contribution {
    fn from(set: &ResultSet) -> Self {
        let mut scores = HashMap::with_capacity(set.len());
        for candidate in &set.candidates {
            let best = scores.entry(candidate.movie_id).or_insert(candidate.score);
            if candidate.score > *best {
                *best = candidate.score;
            }
        }
        Self {
            strategy: set.strategy,
            scores,
        }
    }
}

/// Run-scoped working set of candidates
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    entries: BTreeMap<MovieId, PoolEntry>,
    /// Entries that take part in the final ranking
    retained: BTreeSet<MovieId>,
    contributions: Vec<Contribution>,
    /// A filter-family set has contributed
    filtered: bool,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of movies currently ranked
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Every movie surfaced during the run, ranked or not
    pub fn surfaced(&self) -> usize {
        self.entries.len()
    }

    /// Non-empty result sets merged so far
    pub fn contributing_sets(&self) -> usize {
        self.contributions.len()
    }

    pub fn get(&self, movie_id: MovieId) -> Option<&PoolEntry> {
        self.entries.get(&movie_id)
    }

    pub fn contains(&self, movie_id: MovieId) -> bool {
        self.retained.contains(&movie_id)
    }

    /// Ranked entries: score descending, ties by ascending id
    pub fn ranked(&self) -> Vec<&PoolEntry> {
        let mut ranked: Vec<&PoolEntry> = self
            .retained
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect();
        ranked.sort_by(|a, b| rank_order(a.score, a.movie_id, b.score, b.movie_id));
        ranked
    }

    pub fn top(&self, n: usize) -> Vec<&PoolEntry> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }

    fn entry(&mut self, movie_id: MovieId) -> &mut PoolEntry {
        self.entries
            .entry(movie_id)
            .or_insert_with(|| PoolEntry::new(movie_id))
    }

    fn record_all(&mut self, results: &ResultSet) {
        for candidate in &results.candidates {
            self.entry(candidate.movie_id)
                .record(results.strategy, candidate.score);
        }
    }
}

/// What one merge did to the pool
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub fusion: AppliedFusion,
    /// Ranked movies also found by the new set (0 for unions)
    pub overlap: usize,
    /// Ranked pool size after the merge
    pub pool_size: usize,
}

/// Family-aware fusion of result sets into a [`CandidatePool`]
#[derive(Debug, Clone)]
pub struct MergeEngine {
    config: MergeConfig,
}

impl MergeEngine {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    fn family_weight(&self, kind: StrategyKind) -> f32 {
        match kind.family() {
            StrategyFamily::Filter => self.config.filter_weight,
            StrategyFamily::BroadRecall => self.config.broad_weight,
        }
    }

    /// Merge one strategy's result set into `pool`
    pub fn merge(&self, pool: &mut CandidatePool, current: &ResultSet) -> MergeOutcome {
        pool.record_all(current);
        if current.is_empty() {
            debug!("{} returned nothing, pool unchanged", current.strategy);
            return self.outcome(pool, AppliedFusion::Skipped, 0);
        }

        let previous = pool.contributions.last().map(|c| c.strategy);
        let filtered_before = pool.filtered;
        pool.contributions.push(Contribution::from(current));
        pool.filtered |= current.strategy.family() == StrategyFamily::Filter;

        let Some(previous) = previous else {
            self.union(pool, current);
            return self.outcome(pool, AppliedFusion::Seed, 0);
        };

        let broad = current.strategy.family() == StrategyFamily::BroadRecall;
        let protect_filtered = filtered_before
            && broad
            && self.config.mode != MergeMode::Union
            && self.config.intersection_mode == IntersectionMode::Auto;
        if protect_filtered {
            let overlap = self.refine(pool, current);
            return self.outcome(pool, AppliedFusion::Refine, overlap);
        }

        match self.config.mode.resolve(previous, current.strategy) {
            MergeMode::Union | MergeMode::Auto => {
                self.union(pool, current);
                self.outcome(pool, AppliedFusion::Union, 0)
            }
            MergeMode::Intersection => {
                let members = self.intersection_members(pool, current);
                if members.is_empty() {
                    debug!(
                        "Empty intersection of {} with the pool, falling back to weighted union",
                        current.strategy
                    );
                    self.weighted_union(pool);
                    self.outcome(pool, AppliedFusion::WeightedFallback, 0)
                } else {
                    let overlap = members.len();
                    self.retain_scored(pool, members);
                    self.outcome(pool, AppliedFusion::Intersection, overlap)
                }
            }
        }
    }

    fn outcome(&self, pool: &CandidatePool, fusion: AppliedFusion, overlap: usize) -> MergeOutcome {
        MergeOutcome {
            fusion,
            overlap,
            pool_size: pool.len(),
        }
    }

    fn union(&self, pool: &mut CandidatePool, current: &ResultSet) {
        for candidate in &current.candidates {
            pool.entry(candidate.movie_id).raise(candidate.score);
            pool.retained.insert(candidate.movie_id);
        }
    }

    /// Movies that survive an intersection with `current`
    fn intersection_members(&self, pool: &CandidatePool, current: &ResultSet) -> BTreeSet<MovieId> {
        match self.config.intersection_mode {
            IntersectionMode::Auto | IntersectionMode::Strict => current
                .candidates
                .iter()
                .map(|c| c.movie_id)
                .filter(|id| pool.retained.contains(id))
                .collect(),
            IntersectionMode::Loose => {
                let required = self
                    .config
                    .min_intersection_matches
                    .clamp(1, pool.contributions.len());
                pool.entries
                    .keys()
                    .copied()
                    .filter(|id| self.matches(pool, *id) >= required)
                    .collect()
            }
        }
    }

    fn matches(&self, pool: &CandidatePool, movie_id: MovieId) -> usize {
        pool.contributions
            .iter()
            .filter(|c| c.scores.contains_key(&movie_id))
            .count()
    }

    /// Weighted sum over every contributing set that found the movie, plus a
    /// bonus per extra set
    fn intersection_score(&self, pool: &CandidatePool, movie_id: MovieId) -> f32 {
        let mut score = 0.0;
        let mut matched = 0usize;
        for contribution in &pool.contributions {
            if let Some(s) = contribution.scores.get(&movie_id) {
                score += self.family_weight(contribution.strategy) * s;
                matched += 1;
            }
        }
        score + self.config.completeness_bonus * matched.saturating_sub(1) as f32
    }

    fn retain_scored(&self, pool: &mut CandidatePool, members: BTreeSet<MovieId>) {
        let scored: Vec<(MovieId, f32)> = members
            .iter()
            .map(|id| (*id, self.intersection_score(pool, *id)))
            .collect();
        for (movie_id, score) in scored {
            pool.entry(movie_id).raise(score);
        }
        pool.retained = members;
    }

    /// Re-score ranked movies that `current` also found. Returns that overlap.
    fn refine(&self, pool: &mut CandidatePool, current: &ResultSet) -> usize {
        let scored: Vec<(MovieId, f32)> = current
            .candidates
            .iter()
            .filter(|c| pool.retained.contains(&c.movie_id))
            .map(|c| (c.movie_id, self.intersection_score(pool, c.movie_id)))
            .collect();
        let overlap = scored.len();
        for (movie_id, score) in scored {
            pool.entry(movie_id).raise(score);
        }
        overlap
    }

    /// Union of every contributing set. Broad-only hits are scored first; filter
    /// hits are then lifted above the best of them.
    fn weighted_union(&self, pool: &mut CandidatePool) {
        let mut best: BTreeMap<MovieId, f32> = BTreeMap::new();
        for contribution in &pool.contributions {
            let weight =
                self.family_weight(contribution.strategy) * self.config.boost(contribution.strategy);
            for (movie_id, s) in &contribution.scores {
                let score = weight * s;
                let slot = best.entry(*movie_id).or_insert(score);
                if score > *slot {
                    *slot = score;
                }
            }
        }

        let (filter_hits, broad_only): (Vec<_>, Vec<_>) = best
            .into_iter()
            .partition(|(id, _)| pool.get(*id).is_some_and(PoolEntry::has_filter_evidence));

        let mut ceiling = 0.0f32;
        for (movie_id, score) in broad_only {
            let entry = pool.entry(movie_id);
            entry.raise(score);
            ceiling = ceiling.max(entry.score);
            pool.retained.insert(movie_id);
        }
        for (movie_id, score) in filter_hits {
            pool.entry(movie_id).raise(ceiling + score);
            pool.retained.insert(movie_id);
        }
    }
}
