//! Engine transform computing a result point from its split source

use std::sync::Arc;

use errors::{RelvalError, Result};
use relval_engine::{Batch, ResultValue, Transform, TransformContext};
use relval_model::{Content, PointId, PointValue};
use tracing::{trace, warn};

use crate::splitter::Splitter;

pub struct SplitterTransform {
    engine: String,
    splitter: Arc<dyn Splitter>,
    source: PointId,
    point: PointId,
    content: Option<Content>,
}

impl SplitterTransform {
    pub fn set_up(context: &TransformContext<'_>, splitter: Arc<dyn Splitter>) -> Result<Self> {
        let metadata = context.metadata;
        let point = context.point;
        let engine = context.definition.engine.clone();

        let mut inputs = metadata.input_relations(point.id);
        let source = match (inputs.next(), inputs.next()) {
            (Some(relation), None) => relation.input,
            _ => {
                return Err(RelvalError::incompatible(
                    engine,
                    format!("point {} must have exactly 1 input", point),
                ));
            },
        };

        if !splitter.set_up(metadata, source) {
            warn!(
                "{} plan of {} rejected some relations",
                splitter.protocol(),
                metadata.point(source)
            );
        }
        if !splitter.has_detail(source, point.id) {
            return Err(RelvalError::configuration(format!(
                "{} plan of {} does not decode {}",
                splitter.protocol(),
                metadata.point(source),
                point
            )));
        }

        Ok(Self {
            engine,
            splitter,
            source,
            point: point.id,
            content: point.content,
        })
    }
}

impl Transform for SplitterTransform {
    fn name(&self) -> &str {
        &self.engine
    }

    fn apply_to(&self, result: &ResultValue, _batch: &Batch) -> Option<PointValue> {
        let input = result
            .inputs()
            .iter()
            .find(|input| input.point == self.source && input.is_present())?;
        let splitted = self.splitter.split(input)?;
        let Some(value) = splitted.get(self.point).cloned() else {
            trace!("Nothing decoded for {}", result);
            return None;
        };

        let value = match self.content {
            Some(content) => match content.normalize(value.clone()) {
                Some(normalized) => normalized,
                None => {
                    warn!("Value {} does not fit content of {}", value, result);
                    return None;
                },
            },
            None => value,
        };
        Some(PointValue::new(self.point, result.stamp, Some(value)))
    }
}
