//! Related-values model
//!
//! Read-only description of the processing graph (points, relations, origins,
//! sync policies) plus the time and value types every other crate exchanges.
//!
//! # Core types
//!
//! - [`DateTime`] / [`ElapsedTime`]: 100 ns tick stamps with explicit infinities
//! - [`SyncPolicy`]: maps stamps onto in-sync stamps
//! - [`Value`] / [`PointValue`]: typed values and (point, stamp, value) records
//! - [`Metadata`]: immutable graph built by [`MetadataBuilder`] or loaded from a
//!   [`MetadataDocument`]

pub mod document;
pub mod metadata;
pub mod params;
pub mod point;
pub mod sync;
pub mod time;
pub mod value;

pub use document::{InputDef, MetadataDocument, OriginDef, PointDef, SyncDef, TransformDef};
pub use metadata::{Metadata, MetadataBuilder};
pub use params::{Attributes, Params};
pub use point::{
    BehaviorKind, Content, ElementContent, Origin, Point, PointId, PointRelation, RelationId, TransformSpec,
};
pub use sync::SyncPolicy;
pub use time::{DateTime, ElapsedTime};
pub use value::{PointValue, Value};

/// Processor property naming the default summarizer result position
pub const RESULT_POSITION_PROPERTY: &str = "summarizer.result.position";

/// Processor property enabling reverse summarizer intervals by default
pub const REVERSE_INTERVAL_PROPERTY: &str = "summarizer.interval.reverse";
