//! Interval boundaries of a summarizer result
//!
//! Values of the summarizes input delimit consecutive intervals; each notice
//! on it closes the interval that ends at the notice and opens the one that
//! starts there. A boolean input switches to start-stop mode: intervals run
//! from a `true` value to the following `false` value.
//!
//! ## Result stamp by position
//!
//! | Position | Stamp |
//! |---|---|
//! | `beginning` | start stamp |
//! | `middle` | midpoint of start and stop |
//! | `end` | one tick before the stop stamp |
//! | `next` | stop stamp |
//!
//! When the result point has a sync and the stamp is off-sync, it moves to
//! the closer surrounding sync stamp that still lies inside the interval.

use errors::{RelvalError, Result};
use relval_model::{
    BehaviorKind, DateTime, Metadata, PointRelation, PointValue, RESULT_POSITION_PROPERTY,
    REVERSE_INTERVAL_PROPERTY,
};
use relval_store::StoreValuesQuery;
use tracing::{debug, warn};

use super::{
    Behavior, Progress, RelationInfo, SELECT_SYNC_POSITION, SINCE_RESULT_SYNC_POSITION,
    SINCE_SYNC_POSITION,
};
use crate::batch::{Batch, Phase};
use crate::result::{IntervalPolicy, ResultKey, ResultPosition, ResultValue, Summary};
use crate::transform::SUMMARIZER_ENGINE;

pub const RESULT_POSITION_PARAM: &str = "ResultPosition";
pub const REVERSE_INTERVAL_PARAM: &str = "ReverseInterval";
pub const RUNNING_INTERVAL_PARAM: &str = "RunningInterval";
pub const STEPS_PARAM: &str = "Steps";

#[derive(Debug, Clone)]
pub struct SummarizesBehavior {
    info: RelationInfo,
    policy: IntervalPolicy,
    steps: u32,
    /// Boolean input: intervals run from `true` to `false`
    start_stop: bool,
}

impl SummarizesBehavior {
    pub fn set_up(metadata: &Metadata, relation: &PointRelation) -> Result<Self> {
        let info = RelationInfo::new(metadata, relation)?;
        let properties = metadata.properties();

        let running = info.params.get_bool_or(RUNNING_INTERVAL_PARAM, false)?;
        let fallback = if running {
            ResultPosition::Beginning
        } else {
            ResultPosition::Next
        };
        let position = match info
            .params
            .get_string(RESULT_POSITION_PARAM)
            .or_else(|| properties.get_string(RESULT_POSITION_PROPERTY))
        {
            Some(name) => name.parse().unwrap_or_else(|_| {
                warn!(
                    "Unknown result position '{}' for {}, using {}",
                    name,
                    metadata.point(info.result),
                    fallback
                );
                fallback
            }),
            None => fallback,
        };
        let reverse = match info.params.get_bool(REVERSE_INTERVAL_PARAM)? {
            Some(reverse) => reverse,
            None => properties.get_bool_or(REVERSE_INTERVAL_PROPERTY, false)? && !running,
        };
        let steps = info.params.get_int_or(STEPS_PARAM, 1)?.clamp(1, i64::from(u32::MAX)) as u32;
        let start_stop = metadata.point(info.input).is_boolean();

        debug!(
            "Summarizes {} -> {}: position={}, reverse={}, running={}, steps={}, start_stop={}",
            info.input, info.result, position, reverse, running, steps, start_stop
        );

        Ok(Self {
            info,
            policy: IntervalPolicy {
                position,
                reverse,
                running,
            },
            steps,
            start_stop,
        })
    }

    pub fn policy(&self) -> IntervalPolicy {
        self.policy
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn is_start_stop(&self) -> bool {
        self.start_stop
    }

    fn is_synced(&self) -> bool {
        self.info.input_sync.is_some()
    }

    /// Interval boundary `steps` sync stamps before `stamp`, or the last value before it
    fn previous_query(&self, stamp: DateTime) -> Option<StoreValuesQuery> {
        let query = self.info.input_query();
        match &self.info.input_sync {
            Some(sync) => sync
                .previous_stamp_by(stamp, self.steps)
                .map(|previous| query.at(previous)),
            None => Some(query.before(stamp)),
        }
    }

    /// Interval boundary `steps` sync stamps after `stamp`, or the first value after it
    fn next_query(&self, stamp: DateTime) -> Option<StoreValuesQuery> {
        let query = self.info.input_query();
        match &self.info.input_sync {
            Some(sync) => sync
                .next_stamp_by(stamp, self.steps)
                .map(|next| query.at(next)),
            None => Some(query.after(stamp)),
        }
    }

    fn lookup(&self, query: Option<StoreValuesQuery>, batch: &Batch) -> PointValue {
        match query {
            Some(query) => batch.get_point_value(&query),
            None => PointValue::absent(self.info.input),
        }
    }

    /// Result stamp of the interval `[start, stop)`, if it calls for one
    pub fn trigger_stamp(&self, start: &PointValue, stop: &PointValue) -> Option<DateTime> {
        let (start_stamp, stop_stamp) = (start.stamp?, stop.stamp?);
        if self.start_stop {
            if start.as_bool() != Some(true) || stop.as_bool() != Some(false) {
                return None;
            }
        } else if stop.is_null() {
            return None;
        }

        let stamp = match self.policy.position {
            ResultPosition::Beginning => start_stamp,
            ResultPosition::Middle => start_stamp.midpoint(stop_stamp),
            ResultPosition::End => stop_stamp.before(),
            ResultPosition::Next => stop_stamp,
        };

        let Some(sync) = &self.info.result_sync else {
            return Some(stamp);
        };
        if sync.is_in_sync(stamp) {
            return Some(stamp);
        }

        let mut previous = sync.previous_stamp(stamp);
        let mut next = sync.next_stamp(stamp);
        if self.policy.reverse {
            previous = previous.filter(|p| *p > start_stamp);
            next = next.filter(|n| *n <= stop_stamp);
        } else {
            previous = previous.filter(|p| *p >= start_stamp);
            next = next.filter(|n| *n < stop_stamp);
        }

        match (previous, next) {
            (Some(previous), Some(next)) => {
                let before = i128::from(stamp.raw()) - i128::from(previous.raw());
                let after = i128::from(next.raw()) - i128::from(stamp.raw());
                if before < after || (before == after && self.policy.reverse) {
                    Some(previous)
                } else {
                    Some(next)
                }
            },
            (previous, next) => previous.or(next),
        }
    }

    /// Register a summary at `stamp` bounded by `start` and `stop`
    fn set_up_summary_result(
        &self,
        batch: &mut Batch,
        notice: &PointValue,
        stamp: DateTime,
        start: PointValue,
        stop: PointValue,
    ) {
        if let Some(result) = batch.set_up_result_value(Some(notice), self.new_result_value(stamp))
        {
            if let Some(summary) = result.summary_mut() {
                summary.set_start_value(start);
                summary.set_stop_value(stop);
            }
        }
    }

    /// Fill missing bounds of the summary at `key` from cached values
    ///
    /// Returns whether the summary has a stop value afterwards.
    pub fn set_up_summary(&self, key: ResultKey, batch: &mut Batch) -> bool {
        let Some(summary) = batch.result(key).and_then(ResultValue::summary) else {
            return false;
        };

        if summary.start_value().is_none() {
            let stamp = key.1;
            let query = self.info.input_query();
            let (start, stop) = match self.policy.position {
                ResultPosition::Beginning => (query.clone().at(stamp), query.after(stamp)),
                ResultPosition::Middle | ResultPosition::End => {
                    (query.clone().before(stamp), query.after(stamp))
                },
                ResultPosition::Next => (query.clone().before(stamp), query.at(stamp)),
            };
            let start = batch.get_point_value(&start);
            let stop = batch.get_point_value(&stop);
            if start.is_absent() {
                debug!("No interval start for {} @ {}", key.0, stamp);
                return false;
            }
            if let Some(summary) = batch.result_mut(key).and_then(ResultValue::summary_mut) {
                summary.set_start_value(start);
                summary.set_stop_value(stop);
            }
        }

        batch
            .result(key)
            .and_then(ResultValue::summary)
            .is_some_and(|summary| summary.stop_stamp().is_some())
    }

    fn issue_select_queries(&self, stamp: DateTime, batch: &mut Batch) {
        let query = self.info.input_query();
        match self.policy.position {
            ResultPosition::Beginning => {
                if self.info.input_in_sync(stamp) {
                    batch.add_store_values_query(query.clone().at(stamp));
                }
                batch.add_store_values_query(query.after(stamp));
            },
            ResultPosition::Middle | ResultPosition::End => {
                batch.add_store_values_query(query.clone().before(stamp));
                batch.add_store_values_query(query.after(stamp));
            },
            ResultPosition::Next => {
                batch.add_store_values_query(query.clone().before(stamp));
                if self.info.input_in_sync(stamp) {
                    batch.add_store_values_query(query.at(stamp));
                }
            },
        }
    }
}

impl Behavior for SummarizesBehavior {
    fn info(&self) -> &RelationInfo {
        &self.info
    }

    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Summarizes
    }

    fn prepare_trigger(&self, notice: &PointValue, batch: &mut Batch) -> Progress {
        let Some(stamp) = notice.stamp else {
            return Progress::Done;
        };
        if batch.phase() != Phase::IssueQueries {
            return Progress::Done;
        }

        let next = if self.start_stop {
            match notice.as_bool() {
                None => return Progress::Done,
                Some(true) => {
                    if self.policy.running {
                        batch.add_store_values_query(self.info.input_query().after(stamp));
                    }
                    return Progress::Done;
                },
                Some(false) => None,
            }
        } else if self.policy.running {
            Some(self.info.input_query().after(stamp))
        } else {
            self.next_query(stamp)
        };

        if let Some(next) = next {
            batch.add_store_values_query(next);
        }
        if let Some(previous) = self.previous_query(stamp) {
            batch.add_store_values_query(previous);
        }
        Progress::Done
    }

    fn trigger(&self, notice: &PointValue, batch: &mut Batch) {
        let Some(stamp) = notice.stamp else {
            return;
        };

        // The notice ends an interval
        let start = self.lookup(self.previous_query(stamp), batch);
        if let Some(result_stamp) = self.trigger_stamp(&start, notice) {
            self.set_up_summary_result(batch, notice, result_stamp, start, notice.clone());
        }

        // The notice starts an interval
        let stop = self.lookup(self.next_query(stamp), batch);
        if self.policy.running {
            // A known stop gets its result when the stop itself is noticed
            if stop.is_present() || (self.start_stop && notice.as_bool() != Some(true)) {
                return;
            }
            let end = self
                .info
                .input_sync
                .as_ref()
                .and_then(|sync| sync.next_stamp(stamp))
                .unwrap_or(DateTime::END_OF_TIME);
            let phantom = PointValue::null(self.info.input, end);
            self.set_up_summary_result(batch, notice, stamp, notice.clone(), phantom);
        } else if let Some(result_stamp) = self.trigger_stamp(notice, &stop) {
            self.set_up_summary_result(batch, &stop, result_stamp, notice.clone(), stop.clone());
        }
    }

    fn prepare_select(&self, key: ResultKey, batch: &mut Batch) -> Progress {
        match batch.phase() {
            Phase::IssueQueries => {
                let is_summary = match batch.result(key) {
                    Some(result) => result.summary().is_some(),
                    None => return Progress::Done,
                };
                if is_summary {
                    return Progress::Done;
                }
                if batch
                    .replace_result_value(key, self.new_result_value(key.1))
                    .is_none()
                {
                    return Progress::Done;
                }
                self.issue_select_queries(key.1, batch);
                Progress::Waiting
            },
            Phase::ConsumeQueries => {
                self.set_up_summary(key, batch);
                Progress::Done
            },
            Phase::Ready => Progress::Done,
        }
    }

    fn select(&self, result: &mut ResultValue, _batch: &Batch) -> bool {
        let Some(stop) = result.summary().and_then(|s| s.stop_value()).cloned() else {
            return false;
        };
        result.add_input(stop);
        true
    }

    fn new_result_value(&self, stamp: DateTime) -> ResultValue {
        ResultValue::with_summary(self.info.result, stamp, Summary::new(self.policy))
    }

    fn validate(&self, metadata: &Metadata) -> Result<()> {
        let kind = BehaviorKind::Summarizes.as_str();
        let result = metadata.point(self.info.result);

        if !result.has_transform(SUMMARIZER_ENGINE) {
            return Err(RelvalError::incompatible(
                kind,
                format!("result point {} is not a summarizer", result),
            ));
        }
        if self.policy.reverse
            && matches!(
                self.policy.position,
                ResultPosition::Beginning | ResultPosition::End
            )
        {
            return Err(RelvalError::conflicting_parameters(
                REVERSE_INTERVAL_PARAM,
                format!("{}={}", RESULT_POSITION_PARAM, self.policy.position),
            ));
        }
        if self.steps > 1 {
            if self.policy.position != ResultPosition::Next {
                return Err(RelvalError::conflicting_parameters(
                    STEPS_PARAM,
                    format!("{}={}", RESULT_POSITION_PARAM, self.policy.position),
                ));
            }
            if !self.is_synced() {
                return Err(RelvalError::incompatible(
                    kind,
                    format!("{} requires a synced input point", STEPS_PARAM),
                ));
            }
            if self.start_stop {
                return Err(RelvalError::incompatible(
                    kind,
                    format!("{} is not allowed on a boolean input", STEPS_PARAM),
                ));
            }
        }
        if self.policy.running && self.policy.position != ResultPosition::Beginning {
            return Err(RelvalError::conflicting_parameters(
                RUNNING_INTERVAL_PARAM,
                format!("{}={}", RESULT_POSITION_PARAM, self.policy.position),
            ));
        }
        self.info.reject_params(
            BehaviorKind::Summarizes,
            &[
                SELECT_SYNC_POSITION,
                SINCE_SYNC_POSITION,
                SINCE_RESULT_SYNC_POSITION,
            ],
        )?;
        if self.info.relation_sync.is_some() {
            return Err(RelvalError::incompatible(kind, "relation sync is not supported"));
        }
        self.info.validate_graph(metadata, BehaviorKind::Summarizes)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use relval_model::{Content, InputDef, MetadataBuilder, PointDef, SyncDef, TransformDef, Value};
    use std::sync::Arc;

    struct Fixture {
        metadata: Arc<Metadata>,
        behavior: SummarizesBehavior,
    }

    impl Fixture {
        fn new(content: Content, params: &[(&str, &str)], result_sync: Option<SyncDef>) -> Self {
            let mut summarizes = InputDef::new("Bounds", BehaviorKind::Summarizes);
            for (key, value) in params {
                summarizes = summarizes.param(*key, *value);
            }
            let mut result = PointDef::new("Total")
                .transform(TransformDef::new(SUMMARIZER_ENGINE))
                .input(summarizes)
                .input(InputDef::new("Steps", BehaviorKind::Summarized));
            if let Some(sync) = result_sync {
                result = result.sync(sync);
            }
            let metadata = Arc::new(
                MetadataBuilder::new()
                    .point(PointDef::new("Bounds").content(content))
                    .point(PointDef::new("Steps"))
                    .point(result)
                    .build()
                    .unwrap(),
            );
            let total = metadata.point_by_name("Total").unwrap();
            let behavior =
                SummarizesBehavior::set_up(&metadata, metadata.relation(total.inputs[0])).unwrap();
            Self { metadata, behavior }
        }

        fn value(&self, raw: i64, value: Option<Value>) -> PointValue {
            PointValue::new(self.behavior.info.input, DateTime::from_raw(raw), value)
        }

        fn flag(&self, raw: i64, flag: bool) -> PointValue {
            self.value(raw, Some(Value::Boolean(flag)))
        }

        fn number(&self, raw: i64) -> PointValue {
            self.value(raw, Some(Value::Double(raw as f64)))
        }

        fn batch(&self, notices: &[PointValue]) -> Batch {
            let mut batch = Batch::new(self.metadata.clone());
            for notice in notices {
                batch.accept_notice(notice.clone());
            }
            batch
        }
    }

    fn t(raw: i64) -> DateTime {
        DateTime::from_raw(raw)
    }

    #[test]
    fn test_default_policy() {
        let fixture = Fixture::new(Content::Numeric, &[], None);
        assert_eq!(fixture.behavior.policy(), IntervalPolicy::default());
        assert_eq!(fixture.behavior.steps(), 1);
        assert!(!fixture.behavior.is_start_stop());
    }

    #[test]
    fn test_running_defaults_to_beginning() {
        let fixture = Fixture::new(Content::Numeric, &[(RUNNING_INTERVAL_PARAM, "true")], None);
        assert_eq!(fixture.behavior.policy().position, ResultPosition::Beginning);
        assert!(!fixture.behavior.policy().reverse);
    }

    #[test]
    fn test_unknown_position_falls_back() {
        let fixture = Fixture::new(Content::Numeric, &[(RESULT_POSITION_PARAM, "later")], None);
        assert_eq!(fixture.behavior.policy().position, ResultPosition::Next);
    }

    #[test]
    fn test_trigger_stamp_positions() {
        let cases = [
            ("beginning", 10),
            ("middle", 15),
            ("end", 19),
            ("next", 20),
        ];
        for (position, expected) in cases {
            let fixture = Fixture::new(Content::Numeric, &[(RESULT_POSITION_PARAM, position)], None);
            let stamp = fixture
                .behavior
                .trigger_stamp(&fixture.number(10), &fixture.number(20))
                .unwrap();
            assert_eq!(stamp, t(expected), "position {}", position);
        }
    }

    #[test]
    fn test_trigger_stamp_within_interval() {
        for position in ["beginning", "middle", "end", "next"] {
            let fixture = Fixture::new(
                Content::Numeric,
                &[(RESULT_POSITION_PARAM, position)],
                Some(SyncDef::elapsed("7")),
            );
            for (start, stop) in [(0, 30), (3, 11), (10, 13), (1, 100)] {
                if let Some(stamp) = fixture
                    .behavior
                    .trigger_stamp(&fixture.number(start), &fixture.number(stop))
                {
                    assert!(stamp >= t(start) && stamp <= t(stop), "{} {}..{}", position, start, stop);
                }
            }
        }
    }

    #[test]
    fn test_trigger_stamp_sync_tie_break() {
        // Midpoint 15 lies halfway between sync stamps 10 and 20
        let forward = Fixture::new(
            Content::Numeric,
            &[(RESULT_POSITION_PARAM, "middle")],
            Some(SyncDef::elapsed("10")),
        );
        assert_eq!(
            forward.behavior.trigger_stamp(&forward.number(5), &forward.number(25)),
            Some(t(20))
        );

        let reverse = Fixture::new(
            Content::Numeric,
            &[(RESULT_POSITION_PARAM, "middle"), (REVERSE_INTERVAL_PARAM, "true")],
            Some(SyncDef::elapsed("10")),
        );
        assert_eq!(
            reverse.behavior.trigger_stamp(&reverse.number(5), &reverse.number(25)),
            Some(t(10))
        );
    }

    #[test]
    fn test_trigger_stamp_sync_bounds() {
        // Next position: stop 25 is off-sync; 30 lies past the stop, 20 inside
        let fixture = Fixture::new(Content::Numeric, &[], Some(SyncDef::elapsed("10")));
        assert_eq!(
            fixture.behavior.trigger_stamp(&fixture.number(12), &fixture.number(25)),
            Some(t(20))
        );
        // Neither 10 nor 20 lies inside [12, 18)
        assert_eq!(
            fixture.behavior.trigger_stamp(&fixture.number(12), &fixture.number(18)),
            None
        );
    }

    #[test]
    fn test_start_stop_guards() {
        let fixture = Fixture::new(Content::Boolean, &[], None);
        let behavior = &fixture.behavior;
        assert!(behavior.is_start_stop());

        assert_eq!(
            behavior.trigger_stamp(&fixture.flag(0, true), &fixture.flag(10, false)),
            Some(t(10))
        );
        assert_eq!(behavior.trigger_stamp(&fixture.flag(0, false), &fixture.flag(10, false)), None);
        assert_eq!(behavior.trigger_stamp(&fixture.flag(0, true), &fixture.flag(10, true)), None);
        assert_eq!(behavior.trigger_stamp(&fixture.value(0, None), &fixture.flag(10, false)), None);
        assert_eq!(
            behavior.trigger_stamp(&PointValue::absent(behavior.info.input), &fixture.flag(10, false)),
            None
        );
    }

    #[test]
    fn test_null_stop_never_triggers() {
        let fixture = Fixture::new(Content::Numeric, &[], None);
        assert_eq!(
            fixture.behavior.trigger_stamp(&fixture.number(0), &fixture.value(10, None)),
            None
        );
    }

    #[test]
    fn test_start_stop_single_result() {
        let fixture = Fixture::new(Content::Boolean, &[], None);
        let notices = [fixture.flag(0, true), fixture.flag(10, false)];
        let mut batch = fixture.batch(&notices);
        for notice in &notices {
            fixture.behavior.trigger(notice, &mut batch);
        }

        let keys = batch.result_keys();
        assert_eq!(keys, vec![(fixture.behavior.info.result, t(10))]);
        let summary = batch.result(keys[0]).unwrap().summary().unwrap();
        assert_eq!(summary.start_stamp(), Some(t(0)));
        assert_eq!(summary.stop_stamp(), Some(t(10)));
    }

    #[test]
    fn test_running_interval_phantom_stop() {
        let fixture = Fixture::new(Content::Numeric, &[(RUNNING_INTERVAL_PARAM, "true")], None);
        let notice = fixture.number(10);
        let mut batch = fixture.batch(&[fixture.number(0), notice.clone()]);
        fixture.behavior.trigger(&notice, &mut batch);

        let summary = batch
            .result((fixture.behavior.info.result, t(10)))
            .unwrap()
            .summary()
            .unwrap();
        assert_eq!(summary.start_stamp(), Some(t(10)));
        assert_eq!(summary.stop_stamp(), Some(DateTime::END_OF_TIME));
        assert!(summary.stop_value().unwrap().is_null());
        assert!(summary.is_running_interval());
    }

    #[test]
    fn test_running_known_stop_not_retriggered() {
        let fixture = Fixture::new(Content::Numeric, &[(RUNNING_INTERVAL_PARAM, "true")], None);
        let start = fixture.number(0);
        let mut batch = fixture.batch(&[start.clone(), fixture.number(10)]);
        fixture.behavior.trigger(&start, &mut batch);
        assert_eq!(batch.result_count(), 0);

        // The stop closes [0, 10) and opens a running interval
        let stop = fixture.number(10);
        fixture.behavior.trigger(&stop, &mut batch);
        let result = fixture.behavior.info.result;
        assert_eq!(batch.result_keys(), vec![(result, t(0)), (result, t(10))]);
        let closed = batch.result((result, t(0))).unwrap().summary().unwrap();
        assert_eq!(closed.stop_stamp(), Some(t(10)));
        assert!(closed.stop_value().unwrap().is_present());
    }

    #[test]
    fn test_running_start_stop_needs_true_notice() {
        let fixture = Fixture::new(Content::Boolean, &[(RUNNING_INTERVAL_PARAM, "true")], None);
        let notice = fixture.flag(10, false);
        let mut batch = fixture.batch(&[notice.clone()]);
        fixture.behavior.trigger(&notice, &mut batch);
        assert_eq!(batch.result_count(), 0);

        let notice = fixture.flag(20, true);
        batch.accept_notice(notice.clone());
        fixture.behavior.trigger(&notice, &mut batch);
        assert_eq!(batch.result_keys(), vec![(fixture.behavior.info.result, t(20))]);
    }

    #[test]
    fn test_prepare_trigger_queries() {
        let fixture = Fixture::new(Content::Numeric, &[], None);
        let notice = fixture.number(10);
        let mut batch = fixture.batch(&[notice.clone()]);
        batch.next_lookup_pass();

        assert_eq!(fixture.behavior.prepare_trigger(&notice, &mut batch), Progress::Done);
        let input = fixture.behavior.info.input_query();
        assert_eq!(
            batch.take_queries(),
            vec![input.clone().after(t(10)), input.before(t(10))]
        );
    }

    #[test]
    fn test_prepare_select_upgrades_plain_result() {
        let fixture = Fixture::new(Content::Numeric, &[], None);
        let result = fixture.behavior.info.result;
        let mut batch = fixture.batch(&[]);
        batch.set_up_result_value(None, ResultValue::new(result, t(20)));

        batch.next_lookup_pass();
        assert_eq!(fixture.behavior.prepare_select((result, t(20)), &mut batch), Progress::Waiting);
        assert!(batch.result((result, t(20))).unwrap().summary().is_some());
        batch.take_queries();
        batch.accept_store_values(vec![fixture.number(5), fixture.number(20)]);

        batch.next_lookup_pass();
        assert_eq!(fixture.behavior.prepare_select((result, t(20)), &mut batch), Progress::Done);
        let summary = batch.result((result, t(20))).unwrap().summary().unwrap();
        assert_eq!(summary.start_stamp(), Some(t(5)));
        assert_eq!(summary.stop_stamp(), Some(t(20)));
    }

    #[test]
    fn test_validate_rejects_conflicts() {
        let cases: &[&[(&str, &str)]] = &[
            &[(REVERSE_INTERVAL_PARAM, "true"), (RESULT_POSITION_PARAM, "end")],
            &[(STEPS_PARAM, "2")],
            &[(RUNNING_INTERVAL_PARAM, "true"), (RESULT_POSITION_PARAM, "next")],
            &[(SINCE_SYNC_POSITION, "1")],
        ];
        for params in cases {
            let fixture = Fixture::new(Content::Numeric, params, None);
            assert!(fixture.behavior.validate(&fixture.metadata).is_err(), "{:?}", params);
        }

        let fixture = Fixture::new(Content::Numeric, &[(RESULT_POSITION_PARAM, "middle")], None);
        assert!(fixture.behavior.validate(&fixture.metadata).is_ok());
    }
}
