//! Active processing graph
//!
//! [`Engine::set_up`] turns the metadata into the set of computed points the
//! processor drives. A point whose transform or behaviors fail to set up or
//! validate is logged and excluded; the rest of the graph stays active.

use std::sync::Arc;

use errors::{RelvalError, Result};
use relval_model::{Metadata, Point, PointId, RelationId};
use rustc_hash::FxHashMap;
use tracing::{debug, error, info};

use crate::behavior::{Behavior, BehaviorImpl};
use crate::transform::{Transform, TransformContext, TransformRegistry};

/// A computed point with its transform and input behaviors
pub struct ComputedPoint {
    pub point: PointId,
    pub transform: Box<dyn Transform>,
    /// Behaviors of the input relations, in relation order
    pub behaviors: Vec<BehaviorImpl>,
}

/// A point left out of the active graph
#[derive(Debug)]
pub struct ExcludedPoint {
    pub point: PointId,
    pub name: String,
    pub error: RelvalError,
}

pub struct Engine {
    metadata: Arc<Metadata>,
    computed: FxHashMap<PointId, ComputedPoint>,
    relations: FxHashMap<RelationId, (PointId, usize)>,
    excluded: Vec<ExcludedPoint>,
}

impl Engine {
    pub fn set_up(metadata: Arc<Metadata>, registry: &TransformRegistry) -> Self {
        let mut computed = FxHashMap::default();
        let mut relations = FxHashMap::default();
        let mut excluded = Vec::new();

        for point in metadata.points().filter(|p| !p.inputs.is_empty()) {
            match Self::set_up_point(&metadata, registry, point) {
                Ok(entry) => {
                    for (index, relation) in point.inputs.iter().enumerate() {
                        relations.insert(*relation, (point.id, index));
                    }
                    debug!(
                        "Point {} computed by {} with {} inputs",
                        point,
                        entry.transform.name(),
                        entry.behaviors.len()
                    );
                    computed.insert(point.id, entry);
                },
                Err(e) => {
                    error!("Point {} excluded: {}", point, e);
                    excluded.push(ExcludedPoint {
                        point: point.id,
                        name: point.name.clone(),
                        error: e,
                    });
                },
            }
        }

        info!(
            "Engine set up: {} computed points, {} excluded",
            computed.len(),
            excluded.len()
        );

        Self {
            metadata,
            computed,
            relations,
            excluded,
        }
    }

    fn set_up_point(
        metadata: &Metadata,
        registry: &TransformRegistry,
        point: &Point,
    ) -> Result<ComputedPoint> {
        let definition = point.transform.as_ref().ok_or_else(|| {
            RelvalError::configuration(format!("point {} has inputs but no transform", point))
        })?;
        let transform = registry.create(&TransformContext {
            metadata,
            point,
            definition,
        })?;

        let behaviors = metadata
            .input_relations(point.id)
            .map(|relation| BehaviorImpl::set_up(metadata, relation))
            .collect::<Result<Vec<_>>>()?;
        for behavior in &behaviors {
            behavior.validate(metadata)?;
        }

        Ok(ComputedPoint {
            point: point.id,
            transform,
            behaviors,
        })
    }

    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    pub fn computed(&self, point: PointId) -> Option<&ComputedPoint> {
        self.computed.get(&point)
    }

    pub fn computed_points(&self) -> impl Iterator<Item = &ComputedPoint> {
        self.computed.values()
    }

    pub fn is_active(&self, point: PointId) -> bool {
        self.computed.contains_key(&point)
    }

    /// Behavior of an input relation of an active point
    pub fn behavior(&self, relation: RelationId) -> Option<&BehaviorImpl> {
        let (point, index) = self.relations.get(&relation)?;
        self.computed.get(point)?.behaviors.get(*index)
    }

    pub fn excluded(&self) -> &[ExcludedPoint] {
        &self.excluded
    }
}
