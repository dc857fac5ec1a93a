//! Result transforms
//!
//! A transform turns a fully selected [`ResultValue`] into the value written
//! for the result point. Transforms are created per computed point by the
//! factories of a [`TransformRegistry`], keyed by the engine name declared in
//! the point's transform.

mod program;
mod summarizer;

pub use program::SummaryProgram;
pub use summarizer::SummarizerTransform;

use std::collections::BTreeMap;

use errors::{RelvalError, Result};
use relval_model::{Metadata, Point, PointValue, TransformSpec};

use crate::batch::Batch;
use crate::result::ResultValue;

/// Engine name of the summarizer transform
pub const SUMMARIZER_ENGINE: &str = "summarizer";

pub trait Transform: Send + Sync {
    /// Engine name this transform was created for
    fn name(&self) -> &str;

    /// Whether the stored result value should be fetched before computing
    fn uses_fetched_result(&self) -> bool {
        false
    }

    /// Value of the result point, or `None` to write nothing
    fn apply_to(&self, result: &ResultValue, batch: &Batch) -> Option<PointValue>;
}

/// What a factory sees when creating the transform of one point
pub struct TransformContext<'a> {
    pub metadata: &'a Metadata,
    pub point: &'a Point,
    pub definition: &'a TransformSpec,
}

pub type TransformFactory =
    Box<dyn Fn(&TransformContext<'_>) -> Result<Box<dyn Transform>> + Send + Sync>;

/// Transform factories by engine name
pub struct TransformRegistry {
    factories: BTreeMap<String, TransformFactory>,
}

impl TransformRegistry {
    /// Registry without any transform
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the transforms of this crate
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(SUMMARIZER_ENGINE, |context| {
            Ok(Box::new(SummarizerTransform::set_up(context)?) as Box<dyn Transform>)
        });
        registry
    }

    pub fn register<F>(&mut self, engine: impl Into<String>, factory: F)
    where
        F: Fn(&TransformContext<'_>) -> Result<Box<dyn Transform>> + Send + Sync + 'static,
    {
        self.factories.insert(engine.into(), Box::new(factory));
    }

    pub fn contains(&self, engine: &str) -> bool {
        self.factories.contains_key(engine)
    }

    pub fn engines(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(&self, context: &TransformContext<'_>) -> Result<Box<dyn Transform>> {
        let factory = self
            .factories
            .get(&context.definition.engine)
            .ok_or_else(|| RelvalError::TransformNotFound(context.definition.engine.clone()))?;
        factory(context)
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}
