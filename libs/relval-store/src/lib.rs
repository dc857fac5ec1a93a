//! Point value store abstraction
//!
//! The engine never blocks on a store inside a lookup pass: behaviors queue
//! [`StoreValuesQuery`] values on the batch, and the processor resolves them
//! between passes through a [`PointValueStore`].

pub mod csv_io;
pub mod memory;
pub mod query;

pub use memory::MemoryStore;
pub use query::{StoreValuesQuery, TimeInterval};

use errors::Result;
use relval_model::PointValue;

/// Storage backend consulted between lookup passes
pub trait PointValueStore: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Values answering `query`, ascending by stamp
    fn select(&self, query: &StoreValuesQuery) -> Result<Vec<PointValue>>;

    /// Store values, replacing any existing value at the same (point, stamp)
    ///
    /// Returns the number of values written.
    fn update(&self, values: &[PointValue]) -> Result<usize>;
}
