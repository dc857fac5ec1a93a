//! Plain and synchronized relations

use errors::{RelvalError, Result};
use relval_model::{BehaviorKind, DateTime, Metadata, PointRelation, PointValue};
use tracing::{debug, trace};

use super::{Behavior, Progress, RelationInfo};
use crate::batch::{Batch, Phase};
use crate::result::{ResultKey, ResultValue};

/// Every input notice triggers a result at its own stamp
///
/// A synchronized relation only triggers on stamps in sync with the relation
/// sync, or with the input point's sync when the relation has none.
#[derive(Debug, Clone)]
pub struct TriggersBehavior {
    info: RelationInfo,
    synchronized: bool,
}

impl TriggersBehavior {
    pub fn set_up(metadata: &Metadata, relation: &PointRelation) -> Result<Self> {
        Ok(Self {
            info: RelationInfo::new(metadata, relation)?,
            synchronized: relation.behavior == BehaviorKind::Synchronized,
        })
    }

    fn trigger_sync_accepts(&self, stamp: DateTime) -> bool {
        if !self.synchronized {
            return true;
        }
        self.info
            .relation_sync
            .as_ref()
            .or(self.info.input_sync.as_ref())
            .is_some_and(|sync| sync.is_in_sync(stamp))
    }

    /// Notice stamp, moved to the next result sync stamp when off-sync
    fn result_stamp(&self, stamp: DateTime) -> Option<DateTime> {
        match &self.info.result_sync {
            Some(sync) if !sync.is_in_sync(stamp) => sync.next_stamp(stamp),
            _ => Some(stamp),
        }
    }
}

impl Behavior for TriggersBehavior {
    fn info(&self) -> &RelationInfo {
        &self.info
    }

    fn kind(&self) -> BehaviorKind {
        if self.synchronized {
            BehaviorKind::Synchronized
        } else {
            BehaviorKind::Triggers
        }
    }

    fn prepare_trigger(&self, _notice: &PointValue, _batch: &mut Batch) -> Progress {
        Progress::Done
    }

    fn trigger(&self, notice: &PointValue, batch: &mut Batch) {
        let Some(stamp) = notice.stamp else {
            return;
        };
        if !self.trigger_sync_accepts(stamp) {
            trace!("Notice {} not in sync", notice);
            return;
        }
        if let Some(stamp) = self.result_stamp(stamp) {
            batch.set_up_result_value(Some(notice), self.new_result_value(stamp));
        }
    }

    fn prepare_select(&self, (_, stamp): ResultKey, batch: &mut Batch) -> Progress {
        if batch.phase() == Phase::IssueQueries {
            batch.add_store_values_query(self.info.input_query().at(stamp));
        }
        Progress::Done
    }

    fn select(&self, result: &mut ResultValue, batch: &Batch) -> bool {
        let value = batch.get_point_value(&self.info.input_query().at(result.stamp));
        if value.is_absent() && self.info.required {
            debug!("No value of {} for {}", self.info.input, result);
            return false;
        }
        result.add_input(value);
        true
    }

    fn new_result_value(&self, stamp: DateTime) -> ResultValue {
        ResultValue::new(self.info.result, stamp)
    }

    fn validate(&self, metadata: &Metadata) -> Result<()> {
        if self.synchronized && self.info.relation_sync.is_none() && self.info.input_sync.is_none()
        {
            return Err(RelvalError::incompatible(
                BehaviorKind::Synchronized.as_str(),
                format!(
                    "neither the relation nor input point {} has a sync",
                    metadata.point(self.info.input)
                ),
            ));
        }
        if metadata.depends_on_itself(self.info.result) {
            return Err(RelvalError::DependencyLoop(
                metadata.point(self.info.result).name.clone(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use relval_model::{
        ElapsedTime, InputDef, MetadataBuilder, PointDef, SyncDef, TransformDef, Value,
    };
    use std::sync::Arc;

    fn metadata(behavior: BehaviorKind, result_sync: Option<SyncDef>) -> Arc<Metadata> {
        let mut result = PointDef::new("Out")
            .transform(TransformDef::new("splitter.modbus"))
            .input(InputDef::new("In", behavior).sync(SyncDef::elapsed("10s")));
        if let Some(sync) = result_sync {
            result = result.sync(sync);
        }
        Arc::new(
            MetadataBuilder::new()
                .point(PointDef::new("In"))
                .point(result)
                .build()
                .unwrap(),
        )
    }

    fn behavior(metadata: &Metadata) -> TriggersBehavior {
        let out = metadata.point_by_name("Out").unwrap();
        TriggersBehavior::set_up(metadata, metadata.relation(out.inputs[0])).unwrap()
    }

    fn notice(metadata: &Metadata, seconds: i64) -> PointValue {
        let input = metadata.point_by_name("In").unwrap().id;
        PointValue::new(input, DateTime::from_seconds(seconds), Some(Value::Long(seconds)))
    }

    #[test]
    fn test_triggers_at_notice_stamp() {
        let metadata = metadata(BehaviorKind::Triggers, None);
        let behavior = behavior(&metadata);
        let mut batch = Batch::new(metadata.clone());

        behavior.trigger(&notice(&metadata, 7), &mut batch);
        assert_eq!(batch.result_keys(), vec![(behavior.info.result, DateTime::from_seconds(7))]);
    }

    #[test]
    fn test_off_sync_notice_snaps_to_result_sync() {
        let metadata = metadata(BehaviorKind::Triggers, Some(SyncDef::elapsed("1m")));
        let behavior = behavior(&metadata);
        let mut batch = Batch::new(metadata.clone());

        behavior.trigger(&notice(&metadata, 7), &mut batch);
        assert_eq!(batch.result_keys()[0].1, DateTime::from_seconds(60));
    }

    #[test]
    fn test_synchronized_ignores_off_sync_notice() {
        let metadata = metadata(BehaviorKind::Synchronized, None);
        let behavior = behavior(&metadata);
        assert_eq!(behavior.kind(), BehaviorKind::Synchronized);
        assert_eq!(
            behavior.info.relation_sync,
            Some(relval_model::SyncPolicy::elapsed(ElapsedTime::from_seconds(10), ElapsedTime::ZERO).unwrap())
        );
        let mut batch = Batch::new(metadata.clone());

        behavior.trigger(&notice(&metadata, 7), &mut batch);
        assert_eq!(batch.result_count(), 0);
        behavior.trigger(&notice(&metadata, 20), &mut batch);
        assert_eq!(batch.result_count(), 1);
    }

    #[test]
    fn test_select_requires_value() {
        let metadata = metadata(BehaviorKind::Triggers, None);
        let behavior = behavior(&metadata);
        let mut batch = Batch::new(metadata.clone());
        let notice = notice(&metadata, 7);
        batch.accept_notice(notice.clone());

        let mut found = behavior.new_result_value(DateTime::from_seconds(7));
        assert!(behavior.select(&mut found, &batch));
        assert_eq!(found.inputs(), &[notice]);

        let mut missing = behavior.new_result_value(DateTime::from_seconds(8));
        assert!(!behavior.select(&mut missing, &batch));
    }
}
