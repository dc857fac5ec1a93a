//! Metadata documents (YAML or JSON)
//!
//! ```yaml
//! properties:
//!   summarizer.result.position: next
//! points:
//!   - name: Pump.Running
//!     content: boolean
//!   - name: Pump.RunHours
//!     content: numeric
//!     transform:
//!       engine: summarizer
//!       params:
//!         StepProgram: "total = total + step"
//!     inputs:
//!       - point: Pump.Running
//!         behavior: summarizes
//!       - point: Pump.Flow
//!         behavior: summarized
//! ```

use std::path::Path;

use errors::{RelvalError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metadata::{Metadata, MetadataBuilder};
use crate::params::{Attributes, Params};
use crate::point::{BehaviorKind, Content};
use crate::sync::SyncPolicy;
use crate::time::{DateTime, ElapsedTime};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataDocument {
    pub properties: Params,
    pub origins: Vec<OriginDef>,
    pub points: Vec<PointDef>,
}

impl MetadataDocument {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load by extension: `.json` is JSON, anything else YAML
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    pub fn into_metadata(self) -> Result<Metadata> {
        MetadataBuilder::from_document(self).build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginDef {
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl OriginDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn attributes(mut self, usage: impl Into<String>, params: Params) -> Self {
        self.attributes = self.attributes.with(usage, params);
        self
    }
}

/// Sync declaration: either `elapsed` (+ optional `offset`) or `stamps`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncDef {
    pub elapsed: Option<String>,
    pub offset: Option<String>,
    pub stamps: Vec<String>,
}

impl SyncDef {
    pub fn elapsed(elapsed: impl Into<String>) -> Self {
        Self {
            elapsed: Some(elapsed.into()),
            ..Self::default()
        }
    }

    pub fn offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    pub fn to_policy(&self) -> Result<SyncPolicy> {
        match (&self.elapsed, self.stamps.is_empty()) {
            (Some(elapsed), true) => {
                let elapsed: ElapsedTime = elapsed.parse()?;
                let offset = match &self.offset {
                    Some(offset) => offset.parse()?,
                    None => ElapsedTime::ZERO,
                };
                SyncPolicy::elapsed(elapsed, offset)
            },
            (None, false) => {
                let stamps = self
                    .stamps
                    .iter()
                    .map(|s| s.parse::<DateTime>())
                    .collect::<Result<Vec<_>>>()?;
                SyncPolicy::stamps(stamps)
            },
            (Some(_), false) => Err(RelvalError::conflicting_parameters(
                "sync.elapsed",
                "sync.stamps",
            )),
            (None, true) => Err(RelvalError::missing_parameter("sync.elapsed or sync.stamps")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformDef {
    pub engine: String,
    #[serde(default)]
    pub params: Params,
}

impl TransformDef {
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            params: Params::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key, value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDef {
    pub point: String,
    #[serde(default)]
    pub behavior: BehaviorKind,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub sync: Option<SyncDef>,
}

impl InputDef {
    pub fn new(point: impl Into<String>, behavior: BehaviorKind) -> Self {
        Self {
            point: point.into(),
            behavior,
            params: Params::new(),
            sync: None,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key, value);
        self
    }

    pub fn sync(mut self, sync: SyncDef) -> Self {
        self.sync = Some(sync);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointDef {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub sync: Option<SyncDef>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub transform: Option<TransformDef>,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub inputs: Vec<InputDef>,
}

impl PointDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: None,
            content: None,
            sync: None,
            origin: None,
            transform: None,
            params: Params::new(),
            attributes: Attributes::new(),
            inputs: Vec::new(),
        }
    }

    pub fn content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    pub fn sync(mut self, sync: SyncDef) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn transform(mut self, transform: TransformDef) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key, value);
        self
    }

    pub fn attributes(mut self, usage: impl Into<String>, params: Params) -> Self {
        self.attributes = self.attributes.with(usage, params);
        self
    }

    pub fn input(mut self, input: InputDef) -> Self {
        self.inputs.push(input);
        self
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_sync_def_elapsed() {
        let policy = SyncDef::elapsed("10s").offset("1s").to_policy().unwrap();
        assert!(policy.is_in_sync(DateTime::from_seconds(11)));
        assert!(!policy.is_in_sync(DateTime::from_seconds(10)));
    }

    #[test]
    fn test_sync_def_conflicts() {
        let def = SyncDef {
            elapsed: Some("1s".into()),
            offset: None,
            stamps: vec!["@10".into()],
        };
        assert!(def.to_policy().is_err());
        assert!(SyncDef::default().to_policy().is_err());
    }

    #[test]
    fn test_parse_yaml_document() {
        let doc = MetadataDocument::from_yaml_str(
            r#"
properties:
  summarizer.result.position: middle
origins:
  - name: plc1
    attributes:
      MODBUS:
        MIDDLE_ENDIAN: true
points:
  - name: Raw
    content: tuple<long>
    origin: plc1
  - name: Word
    content: long
    transform:
      engine: splitter.modbus
    inputs:
      - point: Raw
        params:
          Offset: 1
          Size: 2
"#,
        )
        .unwrap();

        assert_eq!(doc.points.len(), 2);
        assert_eq!(doc.points[1].inputs[0].behavior, BehaviorKind::Triggers);
        assert_eq!(doc.points[1].inputs[0].params.get_int("Size").unwrap(), Some(2));
        assert_eq!(
            doc.properties.get_string("summarizer.result.position"),
            Some("middle")
        );
        assert_eq!(
            doc.origins[0].attributes.get("MODBUS").unwrap().get_bool("MIDDLE_ENDIAN").unwrap(),
            Some(true)
        );
        assert_eq!(
            doc.points[0].content,
            Some(Content::Tuple(Some(crate::point::ElementContent::Long)))
        );
        assert_eq!(doc.points[1].content, Some(Content::Long));
    }

    #[test]
    fn test_unknown_content_rejected() {
        let yaml = "points:\n  - name: Raw\n    content: tuple<word>\n";
        assert!(MetadataDocument::from_yaml_str(yaml).is_err());
    }
}
