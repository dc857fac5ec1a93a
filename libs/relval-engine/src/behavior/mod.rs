//! Relation behaviors
//!
//! One behavior per input relation of a computed point. It decides whether a
//! notice on the input triggers a result, which values must be looked up, and
//! which inputs the result receives.
//!
//! Calls made by the processor, per batch:
//!
//! 1. `prepare_trigger` for each notice, once per lookup pass, until every
//!    behavior reports [`Progress::Done`]
//! 2. `trigger` for each notice
//! 3. `prepare_select` for each pending result, once per lookup pass
//! 4. `select` for each pending result

mod summarized;
mod summarizes;
mod triggers;

pub use summarized::SummarizedBehavior;
pub use summarizes::SummarizesBehavior;
pub use triggers::TriggersBehavior;

use errors::{RelvalError, Result};
use relval_model::{
    BehaviorKind, DateTime, Metadata, Params, PointId, PointRelation, PointValue, RelationId,
    SyncPolicy,
};
use relval_store::StoreValuesQuery;

use crate::batch::Batch;
use crate::result::{ResultKey, ResultValue};

/// Sync position relation params
pub(crate) const SELECT_SYNC_POSITION: &str = "SelectSyncPosition";
pub(crate) const SINCE_SYNC_POSITION: &str = "SinceSyncPosition";
pub(crate) const SINCE_RESULT_SYNC_POSITION: &str = "SinceResultSyncPosition";
pub(crate) const AFTER_RESULT_SYNC_POSITION: &str = "AfterResultSyncPosition";

/// Outcome of one lookup pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More passes are needed
    Waiting,
    Done,
}

/// Everything a behavior needs to know about its relation
#[derive(Debug, Clone)]
pub struct RelationInfo {
    pub relation: RelationId,
    pub input: PointId,
    pub result: PointId,
    pub input_sync: Option<SyncPolicy>,
    pub result_sync: Option<SyncPolicy>,
    pub relation_sync: Option<SyncPolicy>,
    pub params: Params,
    /// An absent input value fails the result
    pub required: bool,
}

impl RelationInfo {
    pub fn new(metadata: &Metadata, relation: &PointRelation) -> Result<Self> {
        Ok(Self {
            relation: relation.id,
            input: relation.input,
            result: relation.result,
            input_sync: metadata.point(relation.input).sync.clone(),
            result_sync: metadata.point(relation.result).sync.clone(),
            relation_sync: relation.sync.clone(),
            params: relation.params.clone(),
            required: relation.params.get_bool_or("Required", true)?,
        })
    }

    pub fn input_query(&self) -> StoreValuesQuery {
        StoreValuesQuery::new(self.input)
    }

    pub fn result_query(&self) -> StoreValuesQuery {
        StoreValuesQuery::new(self.result)
    }

    /// A point without sync is in sync everywhere
    pub fn input_in_sync(&self, stamp: DateTime) -> bool {
        self.input_sync.as_ref().map_or(true, |sync| sync.is_in_sync(stamp))
    }

    pub fn reject_params(&self, behavior: BehaviorKind, names: &[&str]) -> Result<()> {
        match names.iter().find(|name| self.params.contains(name)) {
            Some(name) => Err(RelvalError::incompatible(
                behavior.as_str(),
                format!("parameter {} is not supported", name),
            )),
            None => Ok(()),
        }
    }

    /// No loop through the result point, and no synchronized input on it
    pub fn validate_graph(&self, metadata: &Metadata, behavior: BehaviorKind) -> Result<()> {
        if metadata.depends_on_itself(self.result) {
            return Err(RelvalError::DependencyLoop(
                metadata.point(self.result).name.clone(),
            ));
        }
        if metadata
            .input_relations(self.result)
            .any(|r| r.behavior == BehaviorKind::Synchronized)
        {
            return Err(RelvalError::incompatible(
                behavior.as_str(),
                format!(
                    "result point {} has a synchronized input",
                    metadata.point(self.result)
                ),
            ));
        }
        Ok(())
    }
}

/// Lookup and trigger policy of one input relation
pub trait Behavior {
    fn info(&self) -> &RelationInfo;

    fn kind(&self) -> BehaviorKind;

    /// Queue the lookups `trigger` will need for `notice`
    fn prepare_trigger(&self, notice: &PointValue, batch: &mut Batch) -> Progress;

    /// Register the results `notice` calls for
    fn trigger(&self, notice: &PointValue, batch: &mut Batch);

    /// Queue the lookups `select` will need for the result at `key`
    fn prepare_select(&self, key: ResultKey, batch: &mut Batch) -> Progress;

    /// Add this relation's inputs to `result`; false drops the result
    fn select(&self, result: &mut ResultValue, batch: &Batch) -> bool;

    /// Empty result of the kind this behavior produces
    fn new_result_value(&self, stamp: DateTime) -> ResultValue;

    /// Reject configurations the behavior cannot honor
    fn validate(&self, metadata: &Metadata) -> Result<()>;
}

/// Behavior attached to one relation
#[derive(Debug, Clone)]
pub enum BehaviorImpl {
    Triggers(TriggersBehavior),
    Summarizes(SummarizesBehavior),
    Summarized(SummarizedBehavior),
}

impl BehaviorImpl {
    /// Build the behavior declared on `relation`
    pub fn set_up(metadata: &Metadata, relation: &PointRelation) -> Result<Self> {
        Ok(match relation.behavior {
            BehaviorKind::Triggers | BehaviorKind::Synchronized => {
                Self::Triggers(TriggersBehavior::set_up(metadata, relation)?)
            },
            BehaviorKind::Summarizes => {
                Self::Summarizes(SummarizesBehavior::set_up(metadata, relation)?)
            },
            BehaviorKind::Summarized => {
                Self::Summarized(SummarizedBehavior::set_up(metadata, relation)?)
            },
        })
    }

    fn inner(&self) -> &dyn Behavior {
        match self {
            Self::Triggers(b) => b,
            Self::Summarizes(b) => b,
            Self::Summarized(b) => b,
        }
    }
}

impl Behavior for BehaviorImpl {
    fn info(&self) -> &RelationInfo {
        self.inner().info()
    }

    fn kind(&self) -> BehaviorKind {
        self.inner().kind()
    }

    fn prepare_trigger(&self, notice: &PointValue, batch: &mut Batch) -> Progress {
        self.inner().prepare_trigger(notice, batch)
    }

    fn trigger(&self, notice: &PointValue, batch: &mut Batch) {
        self.inner().trigger(notice, batch)
    }

    fn prepare_select(&self, key: ResultKey, batch: &mut Batch) -> Progress {
        self.inner().prepare_select(key, batch)
    }

    fn select(&self, result: &mut ResultValue, batch: &Batch) -> bool {
        self.inner().select(result, batch)
    }

    fn new_result_value(&self, stamp: DateTime) -> ResultValue {
        self.inner().new_result_value(stamp)
    }

    fn validate(&self, metadata: &Metadata) -> Result<()> {
        self.inner().validate(metadata)
    }
}
