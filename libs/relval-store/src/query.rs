//! Store queries
//!
//! A query selects values of one point inside a [`TimeInterval`] with
//! exclusive bounds. How the interval is read depends on its shape:
//!
//! | Shape | Answer |
//! |---|---|
//! | instant (`at`) | the value at that stamp |
//! | `after` bound set | the first value in the interval |
//! | only `before` bound | the last value in the interval |
//! | `all()` | every value in the interval, ascending |
//!
//! Filters (`not_null`, `sync`) skip values rather than end the search.

use std::collections::BTreeMap;
use std::ops::Bound;

use relval_model::{DateTime, PointId, PointValue, SyncPolicy};

/// Interval with exclusive bounds; `None` is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TimeInterval {
    after: Option<DateTime>,
    before: Option<DateTime>,
}

impl TimeInterval {
    pub const UNLIMITED: TimeInterval = TimeInterval {
        after: None,
        before: None,
    };

    pub fn at(stamp: DateTime) -> Self {
        Self {
            after: Some(stamp.before()),
            before: Some(stamp.after()),
        }
    }

    /// `[start, stop)`
    pub fn from_to(start: DateTime, stop: DateTime) -> Self {
        Self {
            after: Some(start.before()),
            before: Some(stop),
        }
    }

    /// `(start, stop]`
    pub fn after_until(start: DateTime, stop: DateTime) -> Self {
        Self {
            after: Some(start),
            before: Some(stop.after()),
        }
    }

    pub fn with_after(mut self, after: DateTime) -> Self {
        self.after = Some(after);
        self
    }

    pub fn with_before(mut self, before: DateTime) -> Self {
        self.before = Some(before);
        self
    }

    pub fn after(&self) -> Option<DateTime> {
        self.after
    }

    pub fn before(&self) -> Option<DateTime> {
        self.before
    }

    /// Single stamp when the interval holds exactly one tick
    pub fn instant(&self) -> Option<DateTime> {
        match (self.after, self.before) {
            (Some(after), Some(before))
                if !after.is_infinite()
                    && !before.is_infinite()
                    && before.raw().checked_sub(after.raw()) == Some(2) =>
            {
                Some(after.after())
            },
            _ => None,
        }
    }

    pub fn contains(&self, stamp: DateTime) -> bool {
        self.after.map_or(true, |after| stamp > after)
            && self.before.map_or(true, |before| stamp < before)
    }

    fn range_bounds(&self) -> (Bound<DateTime>, Bound<DateTime>) {
        (
            self.after.map_or(Bound::Unbounded, Bound::Excluded),
            self.before.map_or(Bound::Unbounded, Bound::Excluded),
        )
    }

    fn is_empty(&self) -> bool {
        match (self.after, self.before) {
            (Some(after), Some(before)) => i128::from(before.raw()) - i128::from(after.raw()) <= 1,
            _ => false,
        }
    }
}

/// Query for values of one point
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreValuesQuery {
    pub point: PointId,
    pub interval: TimeInterval,
    /// Return every value in the interval instead of one
    pub all: bool,
    pub not_null: bool,
    pub sync: Option<SyncPolicy>,
}

impl StoreValuesQuery {
    pub fn new(point: PointId) -> Self {
        Self {
            point,
            interval: TimeInterval::UNLIMITED,
            all: false,
            not_null: false,
            sync: None,
        }
    }

    /// Value at exactly `stamp`
    pub fn at(mut self, stamp: DateTime) -> Self {
        self.interval = TimeInterval::at(stamp);
        self
    }

    /// First value after `stamp`
    pub fn after(mut self, stamp: DateTime) -> Self {
        self.interval = TimeInterval {
            after: Some(stamp),
            before: None,
        };
        self
    }

    /// First value at or after `stamp`
    pub fn not_before(self, stamp: DateTime) -> Self {
        self.after(stamp.before())
    }

    /// Last value before `stamp`
    pub fn before(mut self, stamp: DateTime) -> Self {
        self.interval = TimeInterval {
            after: None,
            before: Some(stamp),
        };
        self
    }

    /// Last value at or before `stamp`
    pub fn not_after(self, stamp: DateTime) -> Self {
        self.before(stamp.after())
    }

    /// Every value inside `interval`
    pub fn interval(mut self, interval: TimeInterval) -> Self {
        self.interval = interval;
        self.all = true;
        self
    }

    pub fn not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    pub fn sync(mut self, sync: Option<SyncPolicy>) -> Self {
        self.sync = sync;
        self
    }

    /// Whether a value passes the filters (bounds are not checked)
    pub fn accepts(&self, value: &PointValue) -> bool {
        let Some(stamp) = value.stamp else {
            return false;
        };
        if self.not_null && value.value.is_none() {
            return false;
        }
        self.sync.as_ref().map_or(true, |sync| sync.is_in_sync(stamp))
    }

    /// Answer the query from one point's ordered series
    pub fn apply(&self, series: &BTreeMap<DateTime, PointValue>) -> Vec<PointValue> {
        if self.interval.is_empty() {
            return Vec::new();
        }

        if let Some(stamp) = self.interval.instant() {
            return series
                .get(&stamp)
                .filter(|value| self.accepts(value))
                .cloned()
                .into_iter()
                .collect();
        }

        let mut range = series
            .range(self.interval.range_bounds())
            .map(|(_, value)| value)
            .filter(|value| self.accepts(value));

        if self.all {
            range.cloned().collect()
        } else if self.interval.after.is_some() {
            range.next().cloned().into_iter().collect()
        } else if self.interval.before.is_some() {
            range.next_back().cloned().into_iter().collect()
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use relval_model::{ElapsedTime, Value};

    fn t(raw: i64) -> DateTime {
        DateTime::from_raw(raw)
    }

    fn series() -> BTreeMap<DateTime, PointValue> {
        let point = PointId::new(0);
        let mut series = BTreeMap::new();
        for (stamp, value) in [(10, Some(1)), (20, None), (30, Some(3)), (35, Some(4))] {
            series.insert(
                t(stamp),
                PointValue::new(point, t(stamp), value.map(Value::Long)),
            );
        }
        series
    }

    fn stamps(values: Vec<PointValue>) -> Vec<i64> {
        values.iter().map(|v| v.stamp.unwrap().raw()).collect()
    }

    #[test]
    fn test_instant_detection() {
        assert_eq!(TimeInterval::at(t(5)).instant(), Some(t(5)));
        assert_eq!(TimeInterval::from_to(t(5), t(7)).instant(), None);
        assert_eq!(TimeInterval::UNLIMITED.instant(), None);
    }

    #[test]
    fn test_single_value_queries() {
        let series = series();
        let query = StoreValuesQuery::new(PointId::new(0));

        assert_eq!(stamps(query.clone().at(t(20)).apply(&series)), vec![20]);
        assert!(query.clone().at(t(21)).apply(&series).is_empty());
        assert_eq!(stamps(query.clone().after(t(10)).apply(&series)), vec![20]);
        assert_eq!(stamps(query.clone().not_before(t(30)).apply(&series)), vec![30]);
        assert_eq!(stamps(query.clone().before(t(30)).apply(&series)), vec![20]);
        assert_eq!(stamps(query.clone().not_after(t(30)).apply(&series)), vec![30]);
        assert!(query.clone().before(t(10)).apply(&series).is_empty());
        assert!(query.after(t(35)).apply(&series).is_empty());
    }

    #[test]
    fn test_filters_skip_values() {
        let series = series();
        let query = StoreValuesQuery::new(PointId::new(0)).not_null(true);
        assert_eq!(stamps(query.clone().after(t(10)).apply(&series)), vec![30]);
        assert_eq!(stamps(query.clone().before(t(30)).apply(&series)), vec![10]);
        assert!(query.at(t(20)).apply(&series).is_empty());

        let sync = SyncPolicy::elapsed(ElapsedTime::from_raw(10), ElapsedTime::ZERO).unwrap();
        let query = StoreValuesQuery::new(PointId::new(0)).sync(Some(sync));
        assert_eq!(stamps(query.after(t(30)).apply(&series)), Vec::<i64>::new());
    }

    #[test]
    fn test_interval_queries() {
        let series = series();
        let query = StoreValuesQuery::new(PointId::new(0));
        assert_eq!(
            stamps(query.clone().interval(TimeInterval::from_to(t(10), t(30))).apply(&series)),
            vec![10, 20]
        );
        assert_eq!(
            stamps(query.clone().interval(TimeInterval::after_until(t(10), t(30))).apply(&series)),
            vec![20, 30]
        );
        assert_eq!(
            stamps(query.interval(TimeInterval::UNLIMITED).apply(&series)),
            vec![10, 20, 30, 35]
        );
    }
}
