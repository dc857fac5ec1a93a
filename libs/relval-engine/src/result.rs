//! Pending results
//!
//! A [`ResultValue`] is the accumulation state of one result computation,
//! keyed by (point, stamp) inside a [`Batch`](crate::Batch). Summarizer
//! results carry a [`Summary`] describing the interval being summarized.

use std::fmt;
use std::str::FromStr;

use errors::RelvalError;
use relval_model::{DateTime, PointId, PointValue};

/// Key of a pending result inside a batch
pub type ResultKey = (PointId, DateTime);

/// Where inside a summary interval the result is stamped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultPosition {
    Beginning,
    Middle,
    End,
    Next,
}

impl ResultPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginning => "beginning",
            Self::Middle => "middle",
            Self::End => "end",
            Self::Next => "next",
        }
    }
}

impl FromStr for ResultPosition {
    type Err = RelvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginning" => Ok(Self::Beginning),
            "middle" => Ok(Self::Middle),
            "end" => Ok(Self::End),
            "next" => Ok(Self::Next),
            _ => Err(RelvalError::invalid_parameter(
                "ResultPosition",
                format!("unknown position '{}'", s),
            )),
        }
    }
}

impl fmt::Display for ResultPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interval policy of a summarizes relation, shared by its summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPolicy {
    pub position: ResultPosition,
    /// Intervals are `(start, stop]` instead of `[start, stop)`
    pub reverse: bool,
    /// An interval without a stop yet produces a provisional result
    pub running: bool,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self {
            position: ResultPosition::Next,
            reverse: false,
            running: false,
        }
    }
}

/// Interval bounds of a summarizer result
///
/// Setters overwrite: a later set-up in the same batch (a real stop value
/// replacing a phantom one) wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    start_value: Option<PointValue>,
    stop_value: Option<PointValue>,
    policy: IntervalPolicy,
}

impl Summary {
    pub fn new(policy: IntervalPolicy) -> Self {
        Self {
            start_value: None,
            stop_value: None,
            policy,
        }
    }

    /// Empty summary with the same interval policy
    pub fn copy(&self) -> Self {
        Self::new(self.policy)
    }

    pub fn start_value(&self) -> Option<&PointValue> {
        self.start_value.as_ref()
    }

    pub fn stop_value(&self) -> Option<&PointValue> {
        self.stop_value.as_ref()
    }

    pub fn set_start_value(&mut self, value: PointValue) {
        self.start_value = Some(value);
    }

    pub fn set_stop_value(&mut self, value: PointValue) {
        self.stop_value = Some(value);
    }

    pub fn start_stamp(&self) -> Option<DateTime> {
        self.start_value.as_ref().and_then(|v| v.stamp)
    }

    pub fn stop_stamp(&self) -> Option<DateTime> {
        self.stop_value.as_ref().and_then(|v| v.stamp)
    }

    pub fn policy(&self) -> IntervalPolicy {
        self.policy
    }

    pub fn result_position(&self) -> ResultPosition {
        self.policy.position
    }

    pub fn is_running_interval(&self) -> bool {
        self.policy.running
    }

    pub fn is_reverse_interval(&self) -> bool {
        self.policy.reverse
    }
}

/// One pending result computation
#[derive(Debug, Clone, PartialEq)]
pub struct ResultValue {
    pub point: PointId,
    pub stamp: DateTime,
    /// The stored value at (point, stamp) was requested from the store
    pub fetched: bool,
    inputs: Vec<PointValue>,
    summary: Option<Summary>,
}

impl ResultValue {
    /// Plain result, replaceable by any behavior
    pub fn new(point: PointId, stamp: DateTime) -> Self {
        Self {
            point,
            stamp,
            fetched: false,
            inputs: Vec::new(),
            summary: None,
        }
    }

    pub fn with_summary(point: PointId, stamp: DateTime, summary: Summary) -> Self {
        Self {
            summary: Some(summary),
            ..Self::new(point, stamp)
        }
    }

    pub fn key(&self) -> ResultKey {
        (self.point, self.stamp)
    }

    /// Plain results may be replaced by a more specific kind
    pub fn is_replaceable(&self) -> bool {
        self.summary.is_none()
    }

    /// Whether both results are of the same kind
    pub fn same_kind(&self, other: &ResultValue) -> bool {
        self.summary.is_some() == other.summary.is_some()
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn summary_mut(&mut self) -> Option<&mut Summary> {
        self.summary.as_mut()
    }

    pub fn add_input(&mut self, value: PointValue) {
        self.inputs.push(value);
    }

    pub fn inputs(&self) -> &[PointValue] {
        &self.inputs
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.summary.is_some() { "summary" } else { "result" };
        write!(f, "{} {} @ {}", kind, self.point, self.stamp)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use relval_model::Value;

    #[test]
    fn test_position_parsing() {
        assert_eq!("BEGINNING".parse::<ResultPosition>().unwrap(), ResultPosition::Beginning);
        assert_eq!(" middle ".parse::<ResultPosition>().unwrap(), ResultPosition::Middle);
        assert!("later".parse::<ResultPosition>().is_err());
    }

    #[test]
    fn test_summary_setters_overwrite() {
        let point = PointId::new(0);
        let mut summary = Summary::new(IntervalPolicy::default());
        summary.set_stop_value(PointValue::null(point, DateTime::END_OF_TIME));
        summary.set_stop_value(PointValue::new(point, DateTime::from_raw(20), Some(Value::Long(1))));
        assert_eq!(summary.stop_stamp(), Some(DateTime::from_raw(20)));

        let copy = summary.copy();
        assert!(copy.stop_value().is_none());
        assert_eq!(copy.policy(), summary.policy());
    }

    #[test]
    fn test_replaceable_kinds() {
        let point = PointId::new(1);
        let plain = ResultValue::new(point, DateTime::EPOCH);
        let summary = ResultValue::with_summary(point, DateTime::EPOCH, Summary::new(IntervalPolicy::default()));
        assert!(plain.is_replaceable());
        assert!(!summary.is_replaceable());
        assert!(!plain.same_kind(&summary));
        assert_eq!(summary.to_string(), format!("summary #1 @ {}", DateTime::EPOCH));
    }
}
