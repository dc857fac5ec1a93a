//! CIP tag splitter
//!
//! A CIP source point holds an array of tag elements. A result picks the
//! element at `Index` / `Offset`, or a single `Bit` of an integer element.
//! Bits beyond the element width continue into the following elements.

use std::sync::Arc;

use errors::RelvalError;
use relval_model::{Content, Metadata, PointId, PointRelation, PointValue, Value};
use tracing::{debug, warn};

use crate::splitter::{as_items, bit_param, result_position, PlanCache, Splitted, Splitter, BIT_PARAM};

/// Attribute usage of CIP origins
pub const ATTRIBUTES_USAGE: &str = "CIP";

const MAX_BIT: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub point: PointId,
    pub index: usize,
    pub bit: Option<u32>,
}

impl Element {
    fn decode(&self, items: &[Option<Value>]) -> Option<Value> {
        let value = items.get(self.index)?.as_ref()?;
        let Some(bit) = self.bit.filter(|_| value.is_number()) else {
            return Some(value.clone());
        };

        let width = value.integer_width()?;
        let (index, bit) = (self.index + (bit / width) as usize, bit % width);
        let word = items.get(index)?.as_ref()?.as_i64()?;
        Some(Value::Boolean((word as u64) & (1u64 << bit) != 0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CipPlan {
    pub elements: Vec<Element>,
}

#[derive(Default)]
pub struct CipSplitter {
    plans: PlanCache<CipPlan>,
}

impl CipSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&self, source: PointId) -> Option<Arc<CipPlan>> {
        self.plans.get(source)
    }

    fn element(multiple: bool, relation: &PointRelation) -> errors::Result<Element> {
        let index = if multiple { result_position(relation)? } else { 0 };
        let bit = bit_param(relation)?;
        if let Some(bit) = bit.filter(|bit| *bit >= MAX_BIT) {
            return Err(RelvalError::invalid_parameter(
                BIT_PARAM,
                format!("{} is beyond bit {}", bit, MAX_BIT - 1),
            ));
        }
        Ok(Element {
            point: relation.result,
            index,
            bit,
        })
    }

    fn build(metadata: &Metadata, source: PointId) -> (Option<CipPlan>, bool) {
        let point = metadata.point(source);
        if metadata.attributes(source, ATTRIBUTES_USAGE).is_none() {
            debug!("No {} attributes for point {}", ATTRIBUTES_USAGE, point);
        }
        let multiple = point.content.is_some_and(|content| content.is_tuple());

        let mut elements = Vec::new();
        let mut accepted = true;
        for relation in metadata.result_relations(source) {
            match Self::element(multiple, relation) {
                Ok(element) => elements.push(element),
                Err(e) => {
                    warn!(
                        "Relation {} -> {} rejected: {}",
                        point,
                        metadata.point(relation.result),
                        e
                    );
                    accepted = false;
                },
            }
        }

        let plan = (!elements.is_empty()).then_some(CipPlan { elements });
        (plan, accepted)
    }
}

impl Splitter for CipSplitter {
    fn protocol(&self) -> &'static str {
        "CIP"
    }

    fn set_up(&self, metadata: &Metadata, source: PointId) -> bool {
        self.plans.get_or_build(source, || Self::build(metadata, source))
    }

    fn has_detail(&self, source: PointId, result: PointId) -> bool {
        self.plans
            .get(source)
            .is_some_and(|plan| plan.elements.iter().any(|e| e.point == result))
    }

    fn split(&self, value: &PointValue) -> Option<Splitted> {
        let plan = self.plans.get(value.point)?;
        let items = as_items(value);
        let mut splitted = Splitted::new();
        for element in &plan.elements {
            splitted.put(element.point, element.decode(&items));
        }
        Some(splitted)
    }
}
