//! Step values summarized over each interval
//!
//! The summarized input of a summarizer result supplies the values the
//! transform steps through. Interval policy comes from the summarizes
//! sibling relation of the same result point.
//!
//! `SinceSyncPosition` and `SinceResultSyncPosition` anchor the selected
//! steps on sync stamps counted back from the interval stop instead of on
//! the interval start. A step notice then triggers every interval whose stop
//! lies within that many sync stamps after it.

use errors::{RelvalError, Result};
use relval_model::{BehaviorKind, DateTime, Metadata, Params, PointRelation, PointValue, SyncPolicy};
use relval_store::{StoreValuesQuery, TimeInterval};
use tracing::{debug, warn};

use super::{
    Behavior, Progress, RelationInfo, SummarizesBehavior, AFTER_RESULT_SYNC_POSITION,
    SELECT_SYNC_POSITION, SINCE_RESULT_SYNC_POSITION, SINCE_SYNC_POSITION,
};
use crate::batch::{Batch, Phase};
use crate::result::{ResultKey, ResultValue};

pub const INCLUDE_NULLS_PARAM: &str = "IncludeNulls";
pub const FETCH_PREVIOUS_VALUE_PARAM: &str = "FetchPreviousValue";
pub const FETCH_PREVIOUS_END_VALUE_PARAM: &str = "FetchPreviousEndValue";

/// Sync stamps the select window is counted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinceAnchor {
    /// Relation sync, else the input point sync
    Sync,
    ResultSync,
}

/// Select window of `count` sync stamps before the interval stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Since {
    anchor: SinceAnchor,
    count: u32,
}

impl Since {
    fn param(&self) -> &'static str {
        match self.anchor {
            SinceAnchor::Sync => SINCE_SYNC_POSITION,
            SinceAnchor::ResultSync => SINCE_RESULT_SYNC_POSITION,
        }
    }
}

/// Sync position param as a count of stamps back; positive values are negated
fn since_count(params: &Params, name: &str) -> Result<Option<u32>> {
    let Some(position) = params.get_int(name)? else {
        return Ok(None);
    };
    if position > 0 {
        warn!("Positive {} is not supported, using -{}", name, position);
    }
    let count = u32::try_from(position.unsigned_abs())
        .map_err(|_| RelvalError::invalid_parameter(name, "position out of range"))?;
    Ok(Some(count))
}

#[derive(Debug, Clone)]
pub struct SummarizedBehavior {
    info: RelationInfo,
    summarizes: Option<Box<SummarizesBehavior>>,
    summarizes_count: usize,
    include_nulls: bool,
    fetch_previous_value: bool,
    fetch_previous_end_value: bool,
    since: Option<Since>,
    /// Since params declared on the relation
    since_params: usize,
}

impl SummarizedBehavior {
    pub fn set_up(metadata: &Metadata, relation: &PointRelation) -> Result<Self> {
        let info = RelationInfo::new(metadata, relation)?;

        let siblings: Vec<&PointRelation> = metadata
            .input_relations(info.result)
            .filter(|r| r.behavior == BehaviorKind::Summarizes)
            .collect();
        let summarizes = match siblings.as_slice() {
            [sibling] => Some(Box::new(SummarizesBehavior::set_up(metadata, sibling)?)),
            _ => None,
        };

        let since_sync = since_count(&info.params, SINCE_SYNC_POSITION)?.map(|count| Since {
            anchor: SinceAnchor::Sync,
            count,
        });
        let since_result_sync =
            since_count(&info.params, SINCE_RESULT_SYNC_POSITION)?.map(|count| Since {
                anchor: SinceAnchor::ResultSync,
                count,
            });

        Ok(Self {
            since: since_sync.or(since_result_sync),
            since_params: usize::from(since_sync.is_some()) + usize::from(since_result_sync.is_some()),
            include_nulls: info.params.get_bool_or(INCLUDE_NULLS_PARAM, false)?,
            fetch_previous_value: info.params.get_bool_or(FETCH_PREVIOUS_VALUE_PARAM, false)?,
            fetch_previous_end_value: info
                .params
                .get_bool_or(FETCH_PREVIOUS_END_VALUE_PARAM, false)?,
            summarizes_count: siblings.len(),
            summarizes,
            info,
        })
    }

    fn fetches_previous(&self) -> bool {
        self.fetch_previous_value || self.fetch_previous_end_value
    }

    /// Next interval boundary at or after the notice
    fn next_boundary_query(&self, sibling: &SummarizesBehavior, stamp: DateTime) -> StoreValuesQuery {
        let query = StoreValuesQuery::new(sibling.info().input);
        if sibling.policy().reverse {
            query.not_before(stamp)
        } else {
            query.after(stamp)
        }
    }

    /// Interval boundary preceding the notice
    fn previous_boundary_query(
        &self,
        sibling: &SummarizesBehavior,
        stamp: DateTime,
    ) -> StoreValuesQuery {
        let query = StoreValuesQuery::new(sibling.info().input);
        if sibling.policy().reverse {
            query.before(stamp)
        } else {
            query.not_after(stamp)
        }
    }

    fn since_sync(&self, since: Since) -> Option<&SyncPolicy> {
        match since.anchor {
            SinceAnchor::Sync => self.info.relation_sync.as_ref().or(self.info.input_sync.as_ref()),
            SinceAnchor::ResultSync => self.info.result_sync.as_ref(),
        }
    }

    /// Stamp `count` sync stamps away from `stamp`
    ///
    /// On the input sync an off-sync stamp costs one extra step.
    fn since_stamp(&self, since: Since, stamp: DateTime, forward: bool) -> Option<DateTime> {
        let sync = self.since_sync(since)?;
        let mut count = since.count;
        if since.anchor == SinceAnchor::Sync && !sync.is_in_sync(stamp) {
            count += 1;
        }
        match (count, forward) {
            (0, _) => Some(stamp),
            (count, true) => sync.next_stamp_by(stamp, count),
            (count, false) => sync.previous_stamp_by(stamp, count),
        }
    }

    /// Boundaries whose interval selects a step noticed at `stamp`
    fn trigger_interval(&self, reverse: bool, stamp: DateTime) -> Option<TimeInterval> {
        let since = self.since?;
        let start = match since.anchor {
            SinceAnchor::Sync => Some(stamp),
            SinceAnchor::ResultSync => self.since_sync(since).and_then(|sync| {
                if sync.is_in_sync(stamp) {
                    Some(stamp)
                } else {
                    sync.next_stamp(stamp)
                }
            }),
        }
        .unwrap_or(DateTime::END_OF_TIME);
        let stop = self
            .since_stamp(since, start, true)
            .unwrap_or(DateTime::END_OF_TIME);

        Some(if reverse {
            TimeInterval::after_until(start, stop)
        } else {
            TimeInterval::from_to(start, stop)
        })
    }

    /// Steps of the interval `start..stop`
    fn select_interval(&self, reverse: bool, start: DateTime, stop: DateTime) -> TimeInterval {
        let since = self.since;
        let start = since
            .and_then(|since| self.since_stamp(since, stop, false))
            .unwrap_or(start);

        match (reverse, since.map(|since| since.anchor)) {
            (true, Some(SinceAnchor::Sync)) => TimeInterval::from_to(start, stop.after()),
            (true, _) => TimeInterval::after_until(start, stop),
            (false, _) => TimeInterval::from_to(start, stop),
        }
    }

    /// Latest step value carried into the interval starting at `start`
    fn carried_query(&self, reverse: bool, start: DateTime) -> StoreValuesQuery {
        let query = self.info.input_query();
        let query = if reverse {
            query.not_after(start)
        } else {
            query.before(start)
        };
        query
            .not_null(!self.include_nulls)
            .sync(self.info.relation_sync.clone())
    }

    /// Next notice on this input, if it comes before the next boundary
    fn next_notice(
        &self,
        sibling: &SummarizesBehavior,
        stamp: DateTime,
        next: &PointValue,
        batch: &Batch,
    ) -> Option<DateTime> {
        let next_stamp = next.stamp?;
        let notice = batch
            .get_point_value(&self.info.input_query().after(stamp))
            .stamp?;
        let before_boundary = if sibling.policy().reverse {
            notice <= next_stamp
        } else {
            notice < next_stamp
        };
        before_boundary.then_some(notice)
    }

    /// Stored results whose carried-over value may change with this notice
    fn following_results_interval(
        &self,
        reverse: bool,
        next: DateTime,
        next_notice: Option<DateTime>,
    ) -> TimeInterval {
        let after = if reverse { next } else { next.before() };
        TimeInterval::UNLIMITED
            .with_after(after)
            .with_before(next_notice.unwrap_or(DateTime::END_OF_TIME))
    }

    fn issue_fetch_queries(
        &self,
        sibling: &SummarizesBehavior,
        stamp: DateTime,
        next: &PointValue,
        batch: &mut Batch,
    ) {
        let Some(next_stamp) = next.stamp else {
            return;
        };
        let next_notice = self.next_notice(sibling, stamp, next, batch);

        if self.fetch_previous_end_value {
            if next_notice.is_none() {
                batch.add_store_values_query(
                    StoreValuesQuery::new(sibling.info().input).after(next_stamp),
                );
            }
        } else {
            let interval =
                self.following_results_interval(sibling.policy().reverse, next_stamp, next_notice);
            batch.add_store_values_query(self.info.result_query().interval(interval));
            if let Some(next_notice) = next_notice {
                batch.add_store_values_query(self.info.result_query().not_before(next_notice));
            }
        }
    }

    /// Set up the summary for the interval ending at `next`
    fn set_up_interval(&self, sibling: &SummarizesBehavior, next: &PointValue, batch: &mut Batch) {
        let Some(next_stamp) = next.stamp else {
            return;
        };
        let previous =
            batch.get_point_value(&StoreValuesQuery::new(sibling.info().input).before(next_stamp));
        let Some(stamp) = sibling.trigger_stamp(&previous, next) else {
            return;
        };
        if let Some(result) = batch.set_up_result_value(Some(next), sibling.new_result_value(stamp))
        {
            if let Some(summary) = result.summary_mut() {
                summary.set_start_value(previous);
                summary.set_stop_value(next.clone());
            }
        }
    }

    /// Boundaries inside `interval` and the one before the first of them
    fn issue_trigger_interval_queries(
        &self,
        sibling: &SummarizesBehavior,
        interval: TimeInterval,
        batch: &mut Batch,
    ) {
        let query = StoreValuesQuery::new(sibling.info().input);
        if let Some(after) = interval.after() {
            batch.add_store_values_query(query.clone().not_after(after));
        }
        batch.add_store_values_query(query.interval(interval));
    }

    fn set_up_plain_result(&self, stamp: DateTime, batch: &mut Batch) {
        batch.set_up_result_value(None, ResultValue::new(self.info.result, stamp));
    }
}

impl Behavior for SummarizedBehavior {
    fn info(&self) -> &RelationInfo {
        &self.info
    }

    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Summarized
    }

    fn prepare_trigger(&self, notice: &PointValue, batch: &mut Batch) -> Progress {
        let (Some(sibling), Some(stamp)) = (self.summarizes.as_deref(), notice.stamp) else {
            return Progress::Done;
        };

        match batch.phase() {
            Phase::IssueQueries => {
                batch.add_store_values_query(self.next_boundary_query(sibling, stamp));
                if self.fetches_previous() {
                    batch.add_store_values_query(self.info.input_query().after(stamp));
                }
                Progress::Waiting
            },
            Phase::ConsumeQueries => {
                let next = batch.get_point_value(&self.next_boundary_query(sibling, stamp));
                if next.is_absent() {
                    if sibling.policy().running {
                        batch.add_store_values_query(
                            StoreValuesQuery::new(sibling.info().input).not_after(stamp),
                        );
                    }
                    return Progress::Done;
                }
                let reverse = sibling.policy().reverse;
                if let Some(interval) = self.trigger_interval(reverse, stamp) {
                    self.issue_trigger_interval_queries(sibling, interval, batch);
                    return Progress::Done;
                }
                batch.add_store_values_query(self.previous_boundary_query(sibling, stamp));
                if self.fetches_previous() {
                    self.issue_fetch_queries(sibling, stamp, &next, batch);
                }
                Progress::Done
            },
            Phase::Ready => Progress::Done,
        }
    }

    fn trigger(&self, notice: &PointValue, batch: &mut Batch) {
        let (Some(sibling), Some(stamp)) = (self.summarizes.as_deref(), notice.stamp) else {
            return;
        };
        let reverse = sibling.policy().reverse;

        let next = batch.get_point_value(&self.next_boundary_query(sibling, stamp));
        if next.is_absent() && !sibling.policy().running {
            return;
        }
        if let Some(interval) = self.trigger_interval(reverse, stamp) {
            let boundaries =
                batch.get_point_values(&StoreValuesQuery::new(sibling.info().input).interval(interval));
            for boundary in &boundaries {
                self.set_up_interval(sibling, boundary, batch);
            }
            return;
        }
        let Some(next_stamp) = next.stamp else {
            // Still inside the running interval
            let previous = batch
                .get_point_value(&StoreValuesQuery::new(sibling.info().input).not_after(stamp));
            let Some(previous_stamp) = previous.stamp else {
                return;
            };
            if previous.is_null() {
                return;
            }
            // A start-stop interval only runs from a true value
            if sibling.is_start_stop() && previous.as_bool() != Some(true) {
                return;
            }
            let end = sibling
                .info()
                .input_sync
                .as_ref()
                .and_then(|sync| sync.next_stamp(previous_stamp))
                .unwrap_or(DateTime::END_OF_TIME);
            if stamp < end {
                if let Some(result) =
                    batch.set_up_result_value(None, sibling.new_result_value(previous_stamp))
                {
                    if let Some(summary) = result.summary_mut() {
                        summary.set_start_value(previous);
                        summary.set_stop_value(PointValue::null(sibling.info().input, end));
                    }
                }
            }
            return;
        };

        self.set_up_interval(sibling, &next, batch);

        if !self.fetches_previous() {
            return;
        }
        let next_notice = self.next_notice(sibling, stamp, &next, batch);

        if self.fetch_previous_end_value {
            if next_notice.is_none() {
                let following = batch
                    .get_point_value(&StoreValuesQuery::new(sibling.info().input).after(next_stamp));
                if following.is_present() {
                    self.set_up_interval(sibling, &following, batch);
                }
            }
        } else {
            let interval = self.following_results_interval(reverse, next_stamp, next_notice);
            let stored = batch.get_point_values(&self.info.result_query().interval(interval));
            for value in stored.iter().filter_map(|v| v.stamp) {
                self.set_up_plain_result(value, batch);
            }
            if let Some(next_notice) = next_notice {
                let stored =
                    batch.get_point_value(&self.info.result_query().not_before(next_notice));
                if let Some(stored_stamp) = stored.stamp {
                    self.set_up_plain_result(stored_stamp, batch);
                }
            }
        }
    }

    fn prepare_select(&self, key: ResultKey, batch: &mut Batch) -> Progress {
        let Some(sibling) = self.summarizes.as_deref() else {
            return Progress::Done;
        };

        match batch.phase() {
            // Lets the summarizes sibling turn the result into a summary first
            Phase::IssueQueries => Progress::Waiting,
            Phase::ConsumeQueries => {
                if !sibling.set_up_summary(key, batch) {
                    return Progress::Done;
                }
                let Some((start, stop)) = batch
                    .result(key)
                    .and_then(ResultValue::summary)
                    .and_then(|s| Some((s.start_stamp()?, s.stop_stamp()?)))
                else {
                    return Progress::Done;
                };
                let reverse = sibling.policy().reverse;

                batch.add_store_values_query(
                    self.info
                        .input_query()
                        .interval(self.select_interval(reverse, start, stop))
                        .sync(self.info.relation_sync.clone()),
                );
                if self.fetches_previous() {
                    batch.add_store_values_query(self.carried_query(reverse, start));
                }
                if self.fetch_previous_end_value {
                    batch.add_store_values_query(
                        StoreValuesQuery::new(sibling.info().input).before(start),
                    );
                }
                Progress::Done
            },
            Phase::Ready => Progress::Done,
        }
    }

    fn select(&self, result: &mut ResultValue, batch: &Batch) -> bool {
        let Some(sibling) = self.summarizes.as_deref() else {
            return false;
        };
        let Some(summary) = result.summary() else {
            warn!("Unexpected result kind for {}", result);
            return false;
        };
        let (Some(start), Some(stop)) = (summary.start_stamp(), summary.stop_stamp()) else {
            warn!("Unexpected trigger for {}", result);
            return false;
        };
        let reverse = summary.is_reverse_interval();

        if self.fetches_previous() {
            let carried = batch.get_point_value(&self.carried_query(reverse, start));
            let Some(carried_stamp) = carried.stamp else {
                debug!("No value carried into {}", result);
                return false;
            };
            if self.fetch_previous_end_value {
                let previous_start = batch
                    .get_point_value(&StoreValuesQuery::new(sibling.info().input).before(start));
                let limit = match previous_start.stamp {
                    Some(stamp) if reverse => stamp.after(),
                    Some(stamp) => stamp,
                    None => DateTime::END_OF_TIME,
                };
                if carried_stamp < limit {
                    debug!("Value carried into {} predates the previous interval", result);
                    return false;
                }
            }
            result.add_input(carried);
        }

        let steps = batch.get_point_values(
            &self
                .info
                .input_query()
                .interval(self.select_interval(reverse, start, stop))
                .not_null(!self.include_nulls)
                .sync(self.info.relation_sync.clone()),
        );
        for step in steps {
            result.add_input(step);
        }
        true
    }

    fn new_result_value(&self, stamp: DateTime) -> ResultValue {
        match self.summarizes.as_deref() {
            Some(sibling) => sibling.new_result_value(stamp),
            None => ResultValue::new(self.info.result, stamp),
        }
    }

    fn validate(&self, metadata: &Metadata) -> Result<()> {
        let kind = BehaviorKind::Summarized.as_str();
        let result = metadata.point(self.info.result);

        if result.inputs.len() < 2 {
            return Err(RelvalError::incompatible(
                kind,
                format!("result point {} needs at least 2 inputs", result),
            ));
        }
        if self.summarizes_count != 1 {
            return Err(RelvalError::incompatible(
                kind,
                format!(
                    "result point {} needs exactly one summarizes input, found {}",
                    result, self.summarizes_count
                ),
            ));
        }
        self.info.reject_params(
            BehaviorKind::Summarized,
            &[SELECT_SYNC_POSITION, AFTER_RESULT_SYNC_POSITION],
        )?;
        if self.since_params > 1 {
            return Err(RelvalError::conflicting_parameters(
                SINCE_SYNC_POSITION,
                SINCE_RESULT_SYNC_POSITION,
            ));
        }
        if let Some(since) = self.since {
            if self.fetches_previous() {
                let fetch = if self.fetch_previous_end_value {
                    FETCH_PREVIOUS_END_VALUE_PARAM
                } else {
                    FETCH_PREVIOUS_VALUE_PARAM
                };
                return Err(RelvalError::conflicting_parameters(fetch, since.param()));
            }
            if self.since_sync(since).is_none() {
                let needed = match since.anchor {
                    SinceAnchor::Sync => "a synced input point or relation",
                    SinceAnchor::ResultSync => "a synced result point",
                };
                return Err(RelvalError::incompatible(
                    kind,
                    format!("{} requires {}", since.param(), needed),
                ));
            }
        }
        if self.fetch_previous_value && self.fetch_previous_end_value {
            return Err(RelvalError::conflicting_parameters(
                FETCH_PREVIOUS_VALUE_PARAM,
                FETCH_PREVIOUS_END_VALUE_PARAM,
            ));
        }
        if self.fetch_previous_end_value
            && self.summarizes.as_deref().is_some_and(SummarizesBehavior::is_start_stop)
        {
            return Err(RelvalError::incompatible(
                kind,
                format!(
                    "{} is not allowed with a boolean summarizes input",
                    FETCH_PREVIOUS_END_VALUE_PARAM
                ),
            ));
        }
        self.info.validate_graph(metadata, BehaviorKind::Summarized)
    }
}
