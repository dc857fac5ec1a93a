//! Splitter plumbing shared by the protocol splitters
//!
//! A splitter decodes the value of a multi-value *source* point (a register
//! block, a tag array) into one value per result point. The decoding plan of
//! a source point is built once from the metadata and cached.

use std::sync::Arc;

use errors::{RelvalError, Result};
use parking_lot::Mutex;
use relval_model::{Metadata, PointId, PointRelation, PointValue, Value};
use rustc_hash::FxHashMap;

pub const INDEX_PARAM: &str = "Index";
pub const OFFSET_PARAM: &str = "Offset";
pub const BIT_PARAM: &str = "Bit";

pub trait Splitter: Send + Sync {
    /// Protocol name, used in logs
    fn protocol(&self) -> &'static str;

    /// Build the plan of `source` unless it is cached
    ///
    /// Returns `false` when at least one result relation was rejected; the
    /// accepted relations are kept in the plan either way.
    fn set_up(&self, metadata: &Metadata, source: PointId) -> bool;

    /// Whether the plan of `source` decodes a value for `result`
    fn has_detail(&self, source: PointId, result: PointId) -> bool;

    /// Decode a source value; `None` when `source` has no plan
    fn split(&self, value: &PointValue) -> Option<Splitted>;
}

/// Decoded values by result point, in plan order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Splitted {
    values: Vec<(PointId, Option<Value>)>,
}

impl Splitted {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, point: PointId, value: Option<Value>) {
        self.values.push((point, value));
    }

    /// Decoded value of `point`; `None` when missing or not decodable
    pub fn get(&self, point: PointId) -> Option<&Value> {
        self.values
            .iter()
            .find(|(p, _)| *p == point)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (PointId, Option<&Value>)> {
        self.values.iter().map(|(point, value)| (*point, value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Plans by source point
///
/// Plans are built while holding the lock, so each is built at most once.
pub struct PlanCache<P> {
    plans: Mutex<FxHashMap<PointId, Arc<P>>>,
}

impl<P> PlanCache<P> {
    pub fn new() -> Self {
        Self {
            plans: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn get(&self, source: PointId) -> Option<Arc<P>> {
        self.plans.lock().get(&source).cloned()
    }

    /// Cached plan check, else `build`
    ///
    /// `build` returns the plan (`None` when there is nothing to keep) and
    /// whether every relation was accepted.
    pub fn get_or_build<F>(&self, source: PointId, build: F) -> bool
    where
        F: FnOnce() -> (Option<P>, bool),
    {
        let mut plans = self.plans.lock();
        if plans.contains_key(&source) {
            return true;
        }
        let (plan, accepted) = build();
        if let Some(plan) = plan {
            plans.insert(source, Arc::new(plan));
        }
        accepted
    }

    pub fn len(&self) -> usize {
        self.plans.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.lock().is_empty()
    }
}

impl<P> Default for PlanCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of a result inside the source tuple (`Index` or `Offset`)
pub fn result_position(relation: &PointRelation) -> Result<usize> {
    let params = &relation.params;
    let position = match (params.get_int(INDEX_PARAM)?, params.get_int(OFFSET_PARAM)?) {
        (Some(_), Some(_)) => {
            return Err(RelvalError::conflicting_parameters(INDEX_PARAM, OFFSET_PARAM));
        },
        (Some(index), None) => (INDEX_PARAM, index),
        (None, Some(offset)) => (OFFSET_PARAM, offset),
        (None, None) => {
            return Err(RelvalError::missing_parameter(format!(
                "{} or {}",
                INDEX_PARAM, OFFSET_PARAM
            )));
        },
    };
    usize::try_from(position.1)
        .map_err(|_| RelvalError::invalid_parameter(position.0, "must not be negative"))
}

/// Optional bit number; any negative value means none
pub fn bit_param(relation: &PointRelation) -> Result<Option<u32>> {
    let bit = relation.params.get_int_or(BIT_PARAM, -1)?;
    Ok(u32::try_from(bit).ok())
}

/// Source value as a tuple; a scalar is a one-element tuple
pub(crate) fn as_items(value: &PointValue) -> Vec<Option<Value>> {
    match &value.value {
        Some(Value::Tuple(items)) => items.clone(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use relval_model::{BehaviorKind, InputDef, MetadataBuilder, PointDef};

    fn relation(input: InputDef) -> PointRelation {
        let metadata = MetadataBuilder::new()
            .point(PointDef::new("Block"))
            .point(PointDef::new("Field").input(input))
            .build()
            .unwrap();
        let field = metadata.point_by_name("Field").unwrap().id;
        let relation = metadata.input_relations(field).next().unwrap().clone();
        relation
    }

    fn input() -> InputDef {
        InputDef::new("Block", BehaviorKind::Triggers)
    }

    #[test]
    fn test_result_position() {
        assert_eq!(result_position(&relation(input().param("Index", 3))).unwrap(), 3);
        assert_eq!(result_position(&relation(input().param("Offset", 0))).unwrap(), 0);
    }

    #[test]
    fn test_result_position_errors() {
        let both = result_position(&relation(input().param("Index", 1).param("Offset", 1)));
        assert!(matches!(both, Err(RelvalError::ConflictingParameters { .. })));

        let neither = result_position(&relation(input()));
        assert!(matches!(neither, Err(RelvalError::MissingParameter(_))));

        let negative = result_position(&relation(input().param("Offset", -2)));
        assert!(matches!(negative, Err(RelvalError::InvalidParameter { .. })));
    }

    #[test]
    fn test_bit_param() {
        assert_eq!(bit_param(&relation(input())).unwrap(), None);
        assert_eq!(bit_param(&relation(input().param("Bit", 5))).unwrap(), Some(5));
        assert!(bit_param(&relation(input().param("Bit", "low"))).is_err());
    }

    #[test]
    fn test_plan_cache_builds_once() {
        let cache: PlanCache<Vec<u32>> = PlanCache::new();
        let source = PointId::new(0);

        assert!(!cache.get_or_build(source, || (Some(vec![1]), false)));
        assert!(cache.get_or_build(source, || panic!("plan rebuilt")));
        assert_eq!(*cache.get(source).unwrap(), vec![1]);

        assert!(cache.get_or_build(PointId::new(1), || (None, true)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_splitted_lookup() {
        let mut splitted = Splitted::new();
        splitted.put(PointId::new(1), Some(Value::Long(7)));
        splitted.put(PointId::new(2), None);

        assert_eq!(splitted.get(PointId::new(1)), Some(&Value::Long(7)));
        assert_eq!(splitted.get(PointId::new(2)), None);
        assert_eq!(splitted.get(PointId::new(3)), None);
        assert_eq!(splitted.len(), 2);
    }
}
