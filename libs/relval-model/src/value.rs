//! Point values
//!
//! A [`PointValue`] without a stamp is *absent*: it is the answer to a lookup
//! that found nothing. A stamped value without content is a *null* value,
//! which is also how provisional (phantom) interval ends are represented.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::point::PointId;
use crate::time::DateTime;

/// Typed value carried by a point
///
/// Serialized untagged: JSON/YAML booleans, integers, floats, strings and
/// arrays map to `Boolean`, `Long`, `Double`, `Text` and `Tuple`. The narrower
/// integer and float variants are produced by decoders that know the width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Long(i64),
    Double(f64),
    Text(String),
    Tuple(Vec<Option<Value>>),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Float(f32),
}

impl Value {
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Self::Byte(_)
                | Self::Short(_)
                | Self::Integer(_)
                | Self::Long(_)
                | Self::Float(_)
                | Self::Double(_)
        )
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Byte(v) => Some(f64::from(v)),
            Self::Short(v) => Some(f64::from(v)),
            Self::Integer(v) => Some(f64::from(v)),
            Self::Long(v) => Some(v as f64),
            Self::Float(v) => Some(f64::from(v)),
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Integer view of a number; floating values are truncated
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Byte(v) => Some(i64::from(v)),
            Self::Short(v) => Some(i64::from(v)),
            Self::Integer(v) => Some(i64::from(v)),
            Self::Long(v) => Some(v),
            Self::Float(v) => Some(v as i64),
            Self::Double(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Option<Value>]> {
        match self {
            Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Bit width of integer variants
    pub fn integer_width(&self) -> Option<u32> {
        match self {
            Self::Byte(_) => Some(8),
            Self::Short(_) => Some(16),
            Self::Integer(_) => Some(32),
            Self::Long(_) => Some(64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Short(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{:?}", v),
            Self::Tuple(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Some(value) => write!(f, "{}", value)?,
                        None => write!(f, "null")?,
                    }
                }
                write!(f, "]")
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

/// Value of one point at one stamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointValue {
    pub point: PointId,
    pub stamp: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub value: Option<Value>,
}

impl PointValue {
    pub fn new(point: PointId, stamp: DateTime, value: Option<Value>) -> Self {
        Self {
            point,
            stamp: Some(stamp),
            state: None,
            value,
        }
    }

    /// Lookup answer when nothing matched
    pub fn absent(point: PointId) -> Self {
        Self {
            point,
            stamp: None,
            state: None,
            value: None,
        }
    }

    /// Stamped value without content
    pub fn null(point: PointId, stamp: DateTime) -> Self {
        Self::new(point, stamp, None)
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn is_absent(&self) -> bool {
        self.stamp.is_none()
    }

    pub fn is_present(&self) -> bool {
        self.stamp.is_some()
    }

    pub fn is_null(&self) -> bool {
        self.stamp.is_some() && self.value.is_none()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Boolean content, when the value is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        self.value.as_ref().and_then(Value::as_bool)
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.stamp, &self.value) {
            (None, _) => write!(f, "{} <absent>", self.point),
            (Some(stamp), None) => write!(f, "{} @ {} = null", self.point, stamp),
            (Some(stamp), Some(value)) => write!(f, "{} @ {} = {}", self.point, stamp, value),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_untagged_deserialize() {
        let value: Value = serde_json::from_str("[10, 20.5, true, null]").unwrap();
        assert_eq!(
            value,
            Value::Tuple(vec![
                Some(Value::Long(10)),
                Some(Value::Double(20.5)),
                Some(Value::Boolean(true)),
                None,
            ])
        );
        let value: Value = serde_json::from_str("\"on\"").unwrap();
        assert_eq!(value, Value::Text("on".to_string()));
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Short(-2).as_i64(), Some(-2));
        assert_eq!(Value::Double(2.9).as_i64(), Some(2));
        assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::Boolean(true).as_f64(), None);
        assert_eq!(Value::Integer(0).integer_width(), Some(32));
        assert_eq!(Value::Double(0.0).integer_width(), None);
    }

    #[test]
    fn test_absent_and_null() {
        let point = PointId::new(1);
        assert!(PointValue::absent(point).is_absent());
        assert!(!PointValue::absent(point).is_null());

        let null = PointValue::null(point, DateTime::END_OF_TIME);
        assert!(null.is_present());
        assert!(null.is_null());
        assert_eq!(null.as_bool(), None);
    }

    #[test]
    fn test_display() {
        let value = Value::Tuple(vec![Some(Value::Long(1)), None]);
        assert_eq!(value.to_string(), "[1, null]");
    }
}
