//! Parameter and attribute bags
//!
//! Values are kept as text and converted by the typed getters; documents may
//! write them as YAML scalars (`Size: 2`, `Float: true`).

use std::collections::BTreeMap;

use errors::{RelvalError, Result};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(v) => v,
        }
    }
}

/// Ordered string-keyed parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, String>);

impl<'de> Deserialize<'de> for Params {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, Scalar>::deserialize(deserializer)?;
        Ok(Self(
            raw.into_iter()
                .map(|(key, value)| (key, value.into_text()))
                .collect(),
        ))
    }
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.trim())
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(text) = self.get_string(key) else {
            return Ok(None);
        };
        match text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(RelvalError::invalid_parameter(
                key,
                format!("'{}' is not a boolean", text),
            )),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self.get_bool(key)?.unwrap_or(default))
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        let Some(text) = self.get_string(key) else {
            return Ok(None);
        };
        text.parse::<i64>()
            .map(Some)
            .map_err(|_| RelvalError::invalid_parameter(key, format!("'{}' is not an integer", text)))
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.get_int(key)?.unwrap_or(default))
    }

    /// Overlay `other` on a copy of these params
    pub fn merged(&self, other: &Params) -> Params {
        let mut merged = self.clone();
        for (key, value) in other.iter() {
            merged.insert(key, value);
        }
        merged
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Attribute groups keyed by usage namespace (`MODBUS`, `CIP`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Params>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, usage: impl Into<String>, params: Params) -> Self {
        self.0.insert(usage.into(), params);
        self
    }

    pub fn get(&self, usage: &str) -> Option<&Params> {
        self.0.get(usage)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let params = Params::new()
            .with("Size", 2)
            .with("Float", "TRUE")
            .with("Bit", "x");

        assert_eq!(params.get_int("Size").unwrap(), Some(2));
        assert_eq!(params.get_bool("Float").unwrap(), Some(true));
        assert_eq!(params.get_int_or("Missing", -1).unwrap(), -1);
        assert!(params.get_int("Bit").is_err());
        assert!(params.get_bool("Bit").is_err());
        assert!(!params.contains("Signed"));
    }

    #[test]
    fn test_deserialize_scalars() {
        let params: Params = serde_yaml::from_str("Size: 2\nFloat: true\nName: abc\nScale: 0.5\n").unwrap();
        assert_eq!(params.get_string("Size"), Some("2"));
        assert_eq!(params.get_string("Float"), Some("true"));
        assert_eq!(params.get_string("Name"), Some("abc"));
        assert_eq!(params.get_string("Scale"), Some("0.5"));
    }

    #[test]
    fn test_merged_overrides() {
        let base = Params::new().with("a", 1).with("b", 2);
        let merged = base.merged(&Params::new().with("b", 3));
        assert_eq!(merged.get_int("a").unwrap(), Some(1));
        assert_eq!(merged.get_int("b").unwrap(), Some(3));
    }

    #[test]
    fn test_attributes_by_usage() {
        let attributes =
            Attributes::new().with("MODBUS", Params::new().with("MIDDLE_ENDIAN", true));
        assert!(attributes.get("MODBUS").is_some());
        assert!(attributes.get("CIP").is_none());
    }
}
