//! Protocol splitters
//!
//! Decode multi-value points received from field protocols into the values
//! of their result points:
//!
//! - [`ModbusSplitter`]: register blocks and coil blocks
//! - [`CipSplitter`]: tag arrays, with bit extraction from integer tags
//!
//! [`register_transforms`] exposes both to the engine as the
//! `splitter.modbus` and `splitter.cip` transforms.

pub mod cip;
pub mod modbus;
pub mod splitter;
pub mod transform;

use std::sync::Arc;

use relval_engine::{Transform, TransformRegistry};

pub use cip::{CipPlan, CipSplitter};
pub use modbus::{ModbusPlan, ModbusSplitter, WordOrder};
pub use splitter::{PlanCache, Splitted, Splitter};
pub use transform::SplitterTransform;

pub const MODBUS_SPLITTER_ENGINE: &str = "splitter.modbus";
pub const CIP_SPLITTER_ENGINE: &str = "splitter.cip";

/// Register the splitter transforms
///
/// Each protocol gets one splitter shared by all its result points, so a
/// source plan is built once.
pub fn register_transforms(registry: &mut TransformRegistry) {
    register(registry, MODBUS_SPLITTER_ENGINE, Arc::new(ModbusSplitter::new()));
    register(registry, CIP_SPLITTER_ENGINE, Arc::new(CipSplitter::new()));
}

fn register(registry: &mut TransformRegistry, engine: &str, splitter: Arc<dyn Splitter>) {
    registry.register(engine, move |context| {
        Ok(Box::new(SplitterTransform::set_up(context, splitter.clone())?) as Box<dyn Transform>)
    });
}
