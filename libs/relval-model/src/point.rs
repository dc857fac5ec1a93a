//! Points, relations and origins

use std::fmt;
use std::str::FromStr;

use errors::RelvalError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::params::{Attributes, Params};
use crate::sync::SyncPolicy;
use crate::value::Value;

/// Index of a point inside its [`Metadata`](crate::Metadata)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(u32);

impl PointId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a relation inside its metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationId(u32);

impl RelationId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Content of a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementContent {
    Numeric,
    Long,
    Boolean,
    Text,
}

impl ElementContent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Long => "long",
            Self::Boolean => "boolean",
            Self::Text => "text",
        }
    }

    /// Convert a value to this content; `None` when not representable
    pub fn normalize(self, value: Value) -> Option<Value> {
        match self {
            Self::Numeric => value.as_f64().map(Value::Double).or(match value {
                Value::Boolean(b) => Some(Value::Double(if b { 1.0 } else { 0.0 })),
                _ => None,
            }),
            Self::Long => match value {
                Value::Boolean(b) => Some(Value::Long(i64::from(b))),
                Value::Float(v) => Some(Value::Long(v.round() as i64)),
                Value::Double(v) => Some(Value::Long(v.round() as i64)),
                other => other.as_i64().map(Value::Long),
            },
            Self::Boolean => match value {
                Value::Boolean(b) => Some(Value::Boolean(b)),
                other => other.as_f64().map(|v| Value::Boolean(v != 0.0)),
            },
            Self::Text => Some(match value {
                Value::Text(text) => Value::Text(text),
                other => Value::Text(other.to_string()),
            }),
        }
    }
}

impl FromStr for ElementContent {
    type Err = RelvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" => Ok(Self::Numeric),
            "long" => Ok(Self::Long),
            "boolean" => Ok(Self::Boolean),
            "text" => Ok(Self::Text),
            _ => Err(RelvalError::invalid_parameter(
                "content",
                format!("unknown content '{}'", s),
            )),
        }
    }
}

/// Declared content of a point, used to normalize computed values
///
/// Written `numeric`, `long`, `boolean`, `text`, `tuple` or, with an element
/// content, `tuple<boolean>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Content {
    Numeric,
    Long,
    Boolean,
    Text,
    /// Multi-value point, with the content of its elements when declared
    Tuple(Option<ElementContent>),
}

impl Content {
    pub fn is_tuple(&self) -> bool {
        matches!(self, Self::Tuple(_))
    }

    /// Element content of a tuple
    pub fn element(&self) -> Option<ElementContent> {
        match self {
            Self::Tuple(element) => *element,
            _ => None,
        }
    }

    /// Convert a computed value to this content; `None` when not representable
    ///
    /// Tuple elements are converted to the element content; an element that
    /// does not convert becomes a missing item.
    pub fn normalize(self, value: Value) -> Option<Value> {
        let element = match self {
            Self::Numeric => ElementContent::Numeric,
            Self::Long => ElementContent::Long,
            Self::Boolean => ElementContent::Boolean,
            Self::Text => ElementContent::Text,
            Self::Tuple(element) => {
                let items = match value {
                    Value::Tuple(items) => items,
                    other => vec![Some(other)],
                };
                let Some(element) = element else {
                    return Some(Value::Tuple(items));
                };
                return Some(Value::Tuple(
                    items
                        .into_iter()
                        .map(|item| item.and_then(|item| element.normalize(item)))
                        .collect(),
                ));
            },
        };
        element.normalize(value)
    }
}

impl From<ElementContent> for Content {
    fn from(element: ElementContent) -> Self {
        match element {
            ElementContent::Numeric => Self::Numeric,
            ElementContent::Long => Self::Long,
            ElementContent::Boolean => Self::Boolean,
            ElementContent::Text => Self::Text,
        }
    }
}

impl FromStr for Content {
    type Err = RelvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        if text == "tuple" {
            return Ok(Self::Tuple(None));
        }
        if let Some(element) = text
            .strip_prefix("tuple<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Ok(Self::Tuple(Some(element.parse()?)));
        }
        text.parse::<ElementContent>()
            .map(Self::from)
            .map_err(|_| RelvalError::invalid_parameter("content", format!("unknown content '{}'", s)))
    }
}

impl TryFrom<String> for Content {
    type Error = RelvalError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<Content> for String {
    fn from(content: Content) -> Self {
        content.to_string()
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Long => write!(f, "long"),
            Self::Boolean => write!(f, "boolean"),
            Self::Text => write!(f, "text"),
            Self::Tuple(None) => write!(f, "tuple"),
            Self::Tuple(Some(element)) => write!(f, "tuple<{}>", element.as_str()),
        }
    }
}

/// Behavior attached to an input relation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorKind {
    /// Every input notice triggers the result
    #[default]
    Triggers,
    /// Triggers only on stamps in sync with the relation
    Synchronized,
    /// Input values delimit summary intervals
    Summarizes,
    /// Input values are summarized over each interval
    Summarized,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triggers => "triggers",
            Self::Synchronized => "synchronized",
            Self::Summarizes => "summarizes",
            Self::Summarized => "summarized",
        }
    }
}

impl FromStr for BehaviorKind {
    type Err = RelvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "triggers" => Ok(Self::Triggers),
            "synchronized" => Ok(Self::Synchronized),
            "summarizes" => Ok(Self::Summarizes),
            "summarized" => Ok(Self::Summarized),
            _ => Err(RelvalError::invalid_parameter(
                "behavior",
                format!("unknown behavior '{}'", s),
            )),
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transform declaration of a computed point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSpec {
    /// Registry key (`summarizer`, `splitter.modbus`, ...)
    pub engine: String,
    pub params: Params,
}

/// Source of raw values (a PLC, a protocol master)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub name: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone)]
pub struct Point {
    pub id: PointId,
    pub uuid: Uuid,
    pub name: String,
    pub content: Option<Content>,
    pub sync: Option<SyncPolicy>,
    pub origin: Option<usize>,
    pub transform: Option<TransformSpec>,
    pub params: Params,
    pub attributes: Attributes,
    /// Relations where this point is the result, in declaration order
    pub inputs: Vec<RelationId>,
    /// Relations where this point is the input
    pub results: Vec<RelationId>,
}

impl Point {
    pub fn has_transform(&self, engine: &str) -> bool {
        self.transform.as_ref().is_some_and(|t| t.engine == engine)
    }

    pub fn is_boolean(&self) -> bool {
        self.content == Some(Content::Boolean)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct PointRelation {
    pub id: RelationId,
    pub input: PointId,
    pub result: PointId,
    pub behavior: BehaviorKind,
    pub params: Params,
    pub sync: Option<SyncPolicy>,
}
