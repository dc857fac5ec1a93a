//! Summarizer/selector computation engine
//!
//! For a network of related points this crate decides *when* a derived
//! result must be recomputed, *which* stored values it needs and *how* they
//! are combined.
//!
//! # Architecture
//!
//! - [`Engine`]: active graph built from the metadata and a
//!   [`TransformRegistry`]; one [`BehaviorImpl`] per input relation
//! - [`Processor`]: runs the multi-pass lookup/trigger protocol for a batch of
//!   notices against a [`PointValueStore`](relval_store::PointValueStore)
//! - [`Batch`]: per-call scratch space (cached values, pending results,
//!   queued queries, updates)
//! - [`Summary`]: interval bounds of a pending summarizer result
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use common::ProcessorSettings;
//! use relval_engine::{Engine, Processor, TransformRegistry};
//! use relval_model::{BehaviorKind, DateTime, InputDef, MetadataBuilder, PointDef, PointValue, TransformDef, Value};
//! use relval_store::MemoryStore;
//!
//! let metadata = MetadataBuilder::new()
//!     .point(PointDef::new("Hour"))
//!     .point(PointDef::new("Power"))
//!     .point(
//!         PointDef::new("Energy")
//!             .transform(
//!                 TransformDef::new("summarizer")
//!                     .param("InitialProgram", "total = 0.0")
//!                     .param("StepProgram", "total = total + step")
//!                     .param("FinalProgram", "total"),
//!             )
//!             .input(InputDef::new("Hour", BehaviorKind::Summarizes))
//!             .input(InputDef::new("Power", BehaviorKind::Summarized)),
//!     )
//!     .build()
//!     .unwrap();
//! let metadata = Arc::new(metadata);
//! let hour = metadata.point_by_name("Hour").unwrap().id;
//! let power = metadata.point_by_name("Power").unwrap().id;
//!
//! let store = Arc::new(MemoryStore::with_values([
//!     PointValue::new(hour, DateTime::from_seconds(0), Some(Value::Long(0))),
//!     PointValue::new(power, DateTime::from_seconds(0), Some(Value::Double(1.5))),
//!     PointValue::new(power, DateTime::from_seconds(1800), Some(Value::Double(2.5))),
//! ]).unwrap());
//! let engine = Arc::new(Engine::set_up(metadata, &TransformRegistry::new()));
//! let processor = Processor::new(engine, store, &ProcessorSettings::default());
//!
//! let outcome = processor
//!     .process(vec![PointValue::new(hour, DateTime::from_seconds(3600), Some(Value::Long(1)))])
//!     .unwrap();
//! assert_eq!(outcome.updates[0].value, Some(Value::Double(4.0)));
//! ```

pub mod batch;
pub mod behavior;
pub mod engine;
pub mod processor;
pub mod result;
pub mod transform;

pub use batch::{Batch, BatchStats, Phase};
pub use behavior::{Behavior, BehaviorImpl, Progress, RelationInfo};
pub use engine::{ComputedPoint, Engine, ExcludedPoint};
pub use processor::{ProcessOutcome, Processor};
pub use result::{IntervalPolicy, ResultKey, ResultPosition, ResultValue, Summary};
pub use transform::{
    SummarizerTransform, SummaryProgram, Transform, TransformContext, TransformFactory,
    TransformRegistry, SUMMARIZER_ENGINE,
};
