//! Batch processing
//!
//! One [`Processor::process`] call runs the whole protocol for a set of
//! notices:
//!
//! 1. trigger lookups: `prepare_trigger` passes, store queries answered
//!    between passes
//! 2. `trigger` for every notice and result relation
//! 3. select lookups: `prepare_select` passes for every pending result
//! 4. `select`, then the point's transform
//! 5. the produced updates are written to the store
//!
//! Nothing is written when a phase does not settle within
//! `max_lookup_passes`.

use std::sync::Arc;

use common::ProcessorSettings;
use errors::{RelvalError, Result};
use relval_model::PointValue;
use relval_store::{PointValueStore, StoreValuesQuery};
use tracing::{debug, trace, warn};

use crate::batch::{Batch, BatchStats};
use crate::behavior::{Behavior, Progress};
use crate::engine::Engine;

/// Outcome of one processed batch
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    pub updates: Vec<PointValue>,
    pub stats: BatchStats,
}

pub struct Processor<S: PointValueStore> {
    engine: Arc<Engine>,
    store: Arc<S>,
    max_lookup_passes: u32,
}

impl<S: PointValueStore> Processor<S> {
    pub fn new(engine: Arc<Engine>, store: Arc<S>, settings: &ProcessorSettings) -> Self {
        Self {
            engine,
            store,
            max_lookup_passes: settings.max_lookup_passes.max(2),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Process `notices` and write the resulting updates
    ///
    /// Notices are not written; the caller stores them before or after.
    pub fn process(&self, mut notices: Vec<PointValue>) -> Result<ProcessOutcome> {
        notices.retain(PointValue::is_present);
        notices.sort_by_key(|notice| notice.stamp);

        let mut batch = Batch::new(self.engine.metadata().clone());
        for notice in notices {
            batch.accept_notice(notice);
        }

        self.run_trigger_phase(&mut batch)?;
        self.run_select_phase(&mut batch)?;
        self.compute(&mut batch);

        let updates = batch.take_updates();
        if !updates.is_empty() {
            let written = self.store.update(&updates)?;
            debug!("Wrote {} updates to {} store", written, self.store.name());
        }

        Ok(ProcessOutcome {
            updates,
            stats: batch.stats(),
        })
    }

    /// Answer the queries issued during the last pass
    fn resolve_queries(&self, batch: &mut Batch) -> Result<()> {
        for query in batch.take_queries() {
            let values = self.store.select(&query)?;
            trace!("{} values for query on {}", values.len(), query.point);
            batch.accept_store_values(values);
        }
        Ok(())
    }

    fn run_lookup_passes<F>(&self, batch: &mut Batch, mut pass: F) -> Result<()>
    where
        F: FnMut(&mut Batch) -> bool,
    {
        batch.begin_lookup();
        loop {
            let lookup_pass = batch.next_lookup_pass();
            let done = pass(batch);
            self.resolve_queries(batch)?;
            if done {
                return Ok(());
            }
            if lookup_pass >= self.max_lookup_passes {
                warn!("Lookup did not settle after {} passes", lookup_pass);
                return Err(RelvalError::LookupPassLimit(lookup_pass));
            }
        }
    }

    fn run_trigger_phase(&self, batch: &mut Batch) -> Result<()> {
        let notices = batch.notices().to_vec();
        let metadata = self.engine.metadata().clone();

        self.run_lookup_passes(batch, |batch| {
            let mut done = true;
            for notice in &notices {
                for relation in metadata.result_relations(notice.point) {
                    if let Some(behavior) = self.engine.behavior(relation.id) {
                        done &= behavior.prepare_trigger(notice, batch) == Progress::Done;
                    }
                }
            }
            done
        })?;

        for notice in &notices {
            for relation in metadata.result_relations(notice.point) {
                if let Some(behavior) = self.engine.behavior(relation.id) {
                    behavior.trigger(notice, batch);
                }
            }
        }
        debug!(
            "{} notices triggered {} results",
            notices.len(),
            batch.result_count()
        );
        Ok(())
    }

    fn run_select_phase(&self, batch: &mut Batch) -> Result<()> {
        self.run_lookup_passes(batch, |batch| {
            let mut done = true;
            for key in batch.result_keys() {
                let Some(computed) = self.engine.computed(key.0) else {
                    continue;
                };
                if batch.lookup_pass() == 1 && computed.transform.uses_fetched_result() {
                    if let Some(result) = batch.result_mut(key) {
                        result.fetched = true;
                    }
                    batch.add_store_values_query(StoreValuesQuery::new(key.0).at(key.1));
                }
                for behavior in &computed.behaviors {
                    done &= behavior.prepare_select(key, batch) == Progress::Done;
                }
            }
            done
        })
    }

    fn compute(&self, batch: &mut Batch) {
        for mut result in batch.take_results() {
            let Some(computed) = self.engine.computed(result.point) else {
                continue;
            };
            if !computed
                .behaviors
                .iter()
                .all(|behavior| behavior.select(&mut result, batch))
            {
                debug!("Dropped {}", result);
                continue;
            }
            if let Some(value) = computed.transform.apply_to(&result, batch) {
                trace!("Computed {}", value);
                batch.add_update(value, result.fetched);
            }
        }
    }
}
