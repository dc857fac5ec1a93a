//! Per-cycle scratch space
//!
//! A [`Batch`] is owned by one [`Processor::process`](crate::Processor::process)
//! call. Behaviors read point values through it, queue store queries on it
//! and register pending results in it. Queries issued during one lookup pass
//! are answered before the next pass starts, so every lookup is a cache read.
//!
//! ## Lookup passes
//!
//! | Pass | Phase | Behaviors |
//! |---|---|---|
//! | 1 | [`Phase::IssueQueries`] | queue the queries they will need |
//! | 2 | [`Phase::ConsumeQueries`] | read answers, queue follow-up queries |
//! | 3+ | [`Phase::Ready`] | nothing left to do |

use std::collections::BTreeMap;
use std::sync::Arc;

use relval_model::{DateTime, Metadata, PointId, PointValue};
use relval_store::StoreValuesQuery;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::result::{ResultKey, ResultValue};

/// Lookup phase derived from the pass counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    IssueQueries,
    ConsumeQueries,
    Ready,
}

/// Counters reported after a batch completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub notices: usize,
    pub queries: usize,
    pub store_values: usize,
    pub results: usize,
    pub conflicts: usize,
    pub unchanged: usize,
}

impl std::ops::AddAssign for BatchStats {
    fn add_assign(&mut self, other: Self) {
        self.notices += other.notices;
        self.queries += other.queries;
        self.store_values += other.store_values;
        self.results += other.results;
        self.conflicts += other.conflicts;
        self.unchanged += other.unchanged;
    }
}

pub struct Batch {
    metadata: Arc<Metadata>,
    lookup_pass: u32,
    notices: Vec<PointValue>,
    input_values: FxHashMap<PointId, BTreeMap<DateTime, PointValue>>,
    results: BTreeMap<ResultKey, ResultValue>,
    issued: FxHashSet<StoreValuesQuery>,
    pending: Vec<StoreValuesQuery>,
    updates: Vec<PointValue>,
    stats: BatchStats,
}

impl Batch {
    pub fn new(metadata: Arc<Metadata>) -> Self {
        Self {
            metadata,
            lookup_pass: 0,
            notices: Vec::new(),
            input_values: FxHashMap::default(),
            results: BTreeMap::new(),
            issued: FxHashSet::default(),
            pending: Vec::new(),
            updates: Vec::new(),
            stats: BatchStats::default(),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    // ========================================================================
    // Lookup passes
    // ========================================================================

    pub fn lookup_pass(&self) -> u32 {
        self.lookup_pass
    }

    /// Restart pass counting for a new lookup phase (trigger or select)
    pub fn begin_lookup(&mut self) {
        self.lookup_pass = 0;
    }

    pub fn next_lookup_pass(&mut self) -> u32 {
        self.lookup_pass += 1;
        self.lookup_pass
    }

    pub fn phase(&self) -> Phase {
        match self.lookup_pass {
            0 | 1 => Phase::IssueQueries,
            2 => Phase::ConsumeQueries,
            _ => Phase::Ready,
        }
    }

    // ========================================================================
    // Input values
    // ========================================================================

    /// Record a notice; it also answers lookups for its (point, stamp)
    pub fn accept_notice(&mut self, notice: PointValue) {
        if let Some(stamp) = notice.stamp {
            self.input_values
                .entry(notice.point)
                .or_default()
                .insert(stamp, notice.clone());
            self.notices.push(notice);
            self.stats.notices += 1;
        }
    }

    pub fn notices(&self) -> &[PointValue] {
        &self.notices
    }

    /// Queue a query unless an identical one was already issued in this batch
    pub fn add_store_values_query(&mut self, query: StoreValuesQuery) {
        if self.issued.insert(query.clone()) {
            trace!("Query {} {:?}", query.point, query.interval);
            self.pending.push(query);
            self.stats.queries += 1;
        }
    }

    pub fn has_pending_queries(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_queries(&mut self) -> Vec<StoreValuesQuery> {
        std::mem::take(&mut self.pending)
    }

    /// Cache store answers; values already known from notices are kept
    pub fn accept_store_values(&mut self, values: Vec<PointValue>) {
        for value in values {
            let Some(stamp) = value.stamp else {
                continue;
            };
            self.input_values
                .entry(value.point)
                .or_default()
                .entry(stamp)
                .or_insert(value);
            self.stats.store_values += 1;
        }
    }

    /// Answer `query` from cached values; absent when nothing matches
    pub fn get_point_value(&self, query: &StoreValuesQuery) -> PointValue {
        self.input_values
            .get(&query.point)
            .and_then(|series| query.apply(series).into_iter().next())
            .unwrap_or_else(|| PointValue::absent(query.point))
    }

    /// Every cached value answering `query`, ascending
    pub fn get_point_values(&self, query: &StoreValuesQuery) -> Vec<PointValue> {
        self.input_values
            .get(&query.point)
            .map(|series| query.apply(series))
            .unwrap_or_default()
    }

    // ========================================================================
    // Result registry
    // ========================================================================

    pub fn result(&self, key: ResultKey) -> Option<&ResultValue> {
        self.results.get(&key)
    }

    pub fn result_mut(&mut self, key: ResultKey) -> Option<&mut ResultValue> {
        self.results.get_mut(&key)
    }

    /// Keys of all pending results, ordered by (point, stamp)
    pub fn result_keys(&self) -> Vec<ResultKey> {
        self.results.keys().copied().collect()
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Replace a plain result by `replacement`
    ///
    /// Returns `None` when the existing result is not replaceable.
    pub fn replace_result_value(
        &mut self,
        key: ResultKey,
        mut replacement: ResultValue,
    ) -> Option<&mut ResultValue> {
        if let Some(existing) = self.results.get(&key) {
            if !existing.is_replaceable() {
                warn!("Result value conflict at {}", existing);
                self.stats.conflicts += 1;
                return None;
            }
            replacement.fetched |= existing.fetched;
        }
        self.results.insert(key, replacement);
        self.results.get_mut(&key)
    }

    /// Register `candidate` unless an equivalent result already exists
    ///
    /// An existing result is kept when the candidate is replaceable or of the
    /// same kind. With a `notice`, a result at the notice's own (point, stamp)
    /// is dropped instead: a point cannot trigger itself.
    pub fn set_up_result_value(
        &mut self,
        notice: Option<&PointValue>,
        mut candidate: ResultValue,
    ) -> Option<&mut ResultValue> {
        let key = candidate.key();

        if let Some(notice) = notice {
            if notice.point == candidate.point && notice.stamp == Some(candidate.stamp) {
                self.results.remove(&key);
                warn!("Self trigger blocked for {}", candidate);
                return None;
            }
        }

        if let Some(existing) = self.results.get(&key) {
            if candidate.is_replaceable() || existing.same_kind(&candidate) {
                return self.results.get_mut(&key);
            }
            if !existing.is_replaceable() {
                warn!("Result value conflict at {}", existing);
                self.stats.conflicts += 1;
            }
            candidate.fetched = existing.fetched;
        }

        debug!("Set up {}", candidate);
        self.results.insert(key, candidate);
        self.results.get_mut(&key)
    }

    pub fn remove_result_value(&mut self, key: ResultKey) -> Option<ResultValue> {
        self.results.remove(&key)
    }

    /// Move all pending results out, ordered by (point, stamp)
    pub fn take_results(&mut self) -> Vec<ResultValue> {
        let results = std::mem::take(&mut self.results);
        self.stats.results += results.len();
        results.into_values().collect()
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Queue a computed value; returns false when it equals the fetched value
    pub fn add_update(&mut self, value: PointValue, fetched: bool) -> bool {
        if fetched {
            if let Some(stamp) = value.stamp {
                let stored = self
                    .input_values
                    .get(&value.point)
                    .and_then(|series| series.get(&stamp));
                if stored.is_some_and(|stored| stored.value == value.value) {
                    debug!("Unchanged {}", value);
                    self.stats.unchanged += 1;
                    return false;
                }
            }
        }
        self.updates.push(value);
        true
    }

    pub fn updates(&self) -> &[PointValue] {
        &self.updates
    }

    pub fn take_updates(&mut self) -> Vec<PointValue> {
        std::mem::take(&mut self.updates)
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }
}
