//! In-memory point value store
//!
//! One ordered series per point in a DashMap. Used by the CLI and by tests;
//! queries are answered by [`StoreValuesQuery::apply`].

use std::collections::BTreeMap;

use dashmap::DashMap;
use errors::{RelvalError, Result};
use relval_model::{DateTime, PointId, PointValue};
use tracing::trace;

use crate::query::StoreValuesQuery;
use crate::PointValueStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    series: DashMap<PointId, BTreeMap<DateTime, PointValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-built values (test and bootstrap helper)
    pub fn with_values(values: impl IntoIterator<Item = PointValue>) -> Result<Self> {
        let store = Self::new();
        let values: Vec<_> = values.into_iter().collect();
        store.update(&values)?;
        Ok(store)
    }

    pub fn get(&self, point: PointId, stamp: DateTime) -> Option<PointValue> {
        self.series
            .get(&point)
            .and_then(|series| series.get(&stamp).cloned())
    }

    pub fn remove(&self, point: PointId, stamp: DateTime) -> Option<PointValue> {
        self.series
            .get_mut(&point)
            .and_then(|mut series| series.remove(&stamp))
    }

    /// All values of one point, ascending
    pub fn values(&self, point: PointId) -> Vec<PointValue> {
        self.series
            .get(&point)
            .map(|series| series.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.series.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.series.clear();
    }
}

impl PointValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn select(&self, query: &StoreValuesQuery) -> Result<Vec<PointValue>> {
        let values = self
            .series
            .get(&query.point)
            .map(|series| query.apply(&series))
            .unwrap_or_default();
        trace!("Store query {:?} -> {} values", query.interval, values.len());
        Ok(values)
    }

    fn update(&self, values: &[PointValue]) -> Result<usize> {
        for value in values {
            let stamp = value.stamp.ok_or_else(|| {
                RelvalError::store(format!("cannot store absent value of point {}", value.point))
            })?;
            self.series
                .entry(value.point)
                .or_default()
                .insert(stamp, value.clone());
        }
        Ok(values.len())
    }
}
