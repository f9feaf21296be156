//! Bounded FIFO memoization of expensive objective evaluations.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use ag_types::ParamValue;

/// One component of a cache key. Continuous values are scaled to 1e-4 and
/// stored as integers so the key is hashable and immune to float noise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyAtom {
    Int(i64),
    Scaled(i64),
    Text(String),
}

/// Cache key built from decoded, rounded coordinates rather than the raw
/// solver vector, so distinct encodings that decode to the same logical
/// parameters collapse to one slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<KeyAtom>);

impl CacheKey {
    pub fn from_values(values: &[ParamValue]) -> Self {
        Self(
            values
                .iter()
                .map(|v| match v {
                    ParamValue::Int(i) => KeyAtom::Int(*i),
                    ParamValue::Float(f) => KeyAtom::Scaled((f * 1e4).round() as i64),
                    ParamValue::Text(s) => KeyAtom::Text(s.clone()),
                })
                .collect(),
        )
    }
}

/// Counters describing cache effectiveness over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }

    /// Fold another worker's counters into this one for reporting.
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.insertions += other.insertions;
        self.evictions += other.evictions;
    }
}

/// Bounded score cache with oldest-inserted-first eviction.
///
/// FIFO rather than LRU: within one run, exact-coordinate repeats are rare,
/// so insertion order stands in for expected reuse. Single-owner, unlocked.
#[derive(Debug)]
pub struct EvaluationCache {
    entries: HashMap<CacheKey, f64>,
    order: VecDeque<CacheKey>,
    capacity: usize,
    stats: CacheStats,
}

impl EvaluationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            stats: CacheStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<f64> {
        match self.entries.get(key) {
            Some(&score) => {
                self.stats.hits += 1;
                Some(score)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert a score, evicting the single oldest entry past capacity.
    pub fn put(&mut self, key: CacheKey, score: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key.clone(), score).is_none() {
            self.order.push_back(key);
            self.stats.insertions += 1;
        }
        if self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
            }
        }
    }

    /// Empty the cache and reset its counters. Called at the start of every
    /// fresh solver invocation so stale scores cannot leak across runs.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.stats = CacheStats::default();
    }
}
