//! Immutable point graph
//!
//! Built once by [`MetadataBuilder`], then shared read-only (`Arc<Metadata>`)
//! by the engine, the splitters and the processor.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;
use uuid::Uuid;

use errors::{RelvalError, Result};

use crate::document::{MetadataDocument, OriginDef, PointDef};
use crate::params::Params;
use crate::point::{Origin, Point, PointId, PointRelation, RelationId, TransformSpec};

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    points: Vec<Point>,
    relations: Vec<PointRelation>,
    origins: Vec<Origin>,
    by_name: FxHashMap<String, PointId>,
    properties: Params,
}

impl Metadata {
    /// Point by id; ids are only minted by the builder of this metadata
    pub fn point(&self, id: PointId) -> &Point {
        &self.points[id.index()]
    }

    pub fn get_point(&self, id: PointId) -> Option<&Point> {
        self.points.get(id.index())
    }

    pub fn point_by_name(&self, name: &str) -> Option<&Point> {
        self.by_name.get(name).map(|id| self.point(*id))
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn relation(&self, id: RelationId) -> &PointRelation {
        &self.relations[id.index()]
    }

    /// Relations feeding `point`, in declaration order
    pub fn input_relations(&self, point: PointId) -> impl Iterator<Item = &PointRelation> {
        self.point(point)
            .inputs
            .iter()
            .map(move |id| self.relation(*id))
    }

    /// Relations fed by `point`
    pub fn result_relations(&self, point: PointId) -> impl Iterator<Item = &PointRelation> {
        self.point(point)
            .results
            .iter()
            .map(move |id| self.relation(*id))
    }

    pub fn origin_of(&self, point: PointId) -> Option<&Origin> {
        self.point(point).origin.and_then(|i| self.origins.get(i))
    }

    /// Attributes for `usage`: the point's own group, else its origin's
    pub fn attributes(&self, point: PointId, usage: &str) -> Option<&Params> {
        self.point(point)
            .attributes
            .get(usage)
            .or_else(|| self.origin_of(point).and_then(|o| o.attributes.get(usage)))
    }

    pub fn properties(&self) -> &Params {
        &self.properties
    }

    /// Overlay processor properties (settings from outside the document)
    pub fn set_property(&mut self, key: impl Into<String>, value: impl ToString) {
        self.properties.insert(key, value);
    }

    /// Whether following result relations from `point` leads back to it
    pub fn depends_on_itself(&self, point: PointId) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack: Vec<PointId> = self.result_relations(point).map(|r| r.result).collect();
        while let Some(current) = stack.pop() {
            if current == point {
                return true;
            }
            if visited.insert(current) {
                stack.extend(self.result_relations(current).map(|r| r.result));
            }
        }
        false
    }
}

/// Assembles a [`Metadata`] from point and origin definitions
///
/// Inputs may reference points declared later; names are resolved in
/// [`build`](Self::build).
#[derive(Debug, Default)]
pub struct MetadataBuilder {
    properties: Params,
    origins: Vec<OriginDef>,
    points: Vec<PointDef>,
}

impl MetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: MetadataDocument) -> Self {
        Self {
            properties: document.properties,
            origins: document.origins,
            points: document.points,
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key, value);
        self
    }

    pub fn origin(mut self, origin: OriginDef) -> Self {
        self.origins.push(origin);
        self
    }

    pub fn point(mut self, point: PointDef) -> Self {
        self.points.push(point);
        self
    }

    pub fn build(self) -> Result<Metadata> {
        let mut origin_index = FxHashMap::default();
        let mut origins = Vec::with_capacity(self.origins.len());
        for def in self.origins {
            if origin_index.insert(def.name.clone(), origins.len()).is_some() {
                return Err(RelvalError::configuration(format!(
                    "duplicate origin '{}'",
                    def.name
                )));
            }
            origins.push(Origin {
                name: def.name,
                attributes: def.attributes,
            });
        }

        let mut by_name = FxHashMap::default();
        for (index, def) in self.points.iter().enumerate() {
            let id = PointId::new(index as u32);
            if by_name.insert(def.name.clone(), id).is_some() {
                return Err(RelvalError::DuplicatePoint(def.name.clone()));
            }
        }

        let mut points = Vec::with_capacity(self.points.len());
        let mut relations = Vec::new();
        let mut pending_results: Vec<(PointId, RelationId)> = Vec::new();

        for (index, def) in self.points.into_iter().enumerate() {
            let id = PointId::new(index as u32);
            let sync = def.sync.as_ref().map(|s| s.to_policy()).transpose()?;
            let origin = match &def.origin {
                Some(name) => Some(*origin_index.get(name).ok_or_else(|| {
                    RelvalError::configuration(format!(
                        "point '{}' references unknown origin '{}'",
                        def.name, name
                    ))
                })?),
                None => None,
            };

            let mut inputs = Vec::with_capacity(def.inputs.len());
            for input in &def.inputs {
                let input_id = *by_name.get(&input.point).ok_or_else(|| {
                    RelvalError::PointNotFound(format!("{} (input of {})", input.point, def.name))
                })?;
                let relation_id = RelationId::new(relations.len() as u32);
                relations.push(PointRelation {
                    id: relation_id,
                    input: input_id,
                    result: id,
                    behavior: input.behavior,
                    params: input.params.clone(),
                    sync: input.sync.as_ref().map(|s| s.to_policy()).transpose()?,
                });
                inputs.push(relation_id);
                pending_results.push((input_id, relation_id));
            }

            points.push(Point {
                id,
                uuid: def.uuid.unwrap_or_else(Uuid::new_v4),
                name: def.name,
                content: def.content,
                sync,
                origin,
                transform: def.transform.map(|t| TransformSpec {
                    engine: t.engine,
                    params: t.params,
                }),
                params: def.params,
                attributes: def.attributes,
                inputs,
                results: Vec::new(),
            });
        }

        for (input, relation) in pending_results {
            points[input.index()].results.push(relation);
        }

        debug!(
            "Metadata built: {} points, {} relations, {} origins",
            points.len(),
            relations.len(),
            origins.len()
        );

        Ok(Metadata {
            points,
            relations,
            origins,
            by_name,
            properties: self.properties,
        })
    }
}
