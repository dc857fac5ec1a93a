//! Layered settings
//!
//! Priority (lowest to highest): built-in defaults, YAML file, `RELVAL_*`
//! environment variables (`__` separates nested keys, e.g.
//! `RELVAL_PROCESSOR__BATCH_SIZE=500`).

use std::path::Path;

use errors::{RelvalError, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LoggingSettings;

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "RELVAL_";

/// Defaults applied to summarizer relations that do not set their own params
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    /// Result position name (`beginning`, `middle`, `end`, `next`)
    pub result_position: Option<String>,
    pub reverse_interval: bool,
}

/// Processor loop limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    /// Lookup passes allowed per phase before a batch is abandoned
    pub max_lookup_passes: u32,
    /// How many times produced updates are fed back as notices
    pub max_cascade_depth: u32,
    /// Notices per processing call
    pub batch_size: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            max_lookup_passes: 8,
            max_cascade_depth: 4,
            batch_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub summarizer: SummarizerSettings,
    pub processor: ProcessorSettings,
}

impl Settings {
    /// Provider chain without extraction
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load settings; a missing file is an error only when a path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(RelvalError::configuration(format!(
                    "settings file not found: {}",
                    path.display()
                )));
            }
        }

        let settings: Settings = Self::figment(path)
            .extract()
            .map_err(|e| RelvalError::configuration(e.to_string()))?;
        settings.validate()?;

        debug!(
            "Settings loaded: max_lookup_passes={}, max_cascade_depth={}, batch_size={}",
            settings.processor.max_lookup_passes,
            settings.processor.max_cascade_depth,
            settings.processor.batch_size
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.processor.max_lookup_passes < 2 {
            return Err(RelvalError::invalid_parameter(
                "processor.max_lookup_passes",
                "must be at least 2",
            ));
        }
        if self.processor.batch_size == 0 {
            return Err(RelvalError::invalid_parameter(
                "processor.batch_size",
                "must be positive",
            ));
        }
        Ok(())
    }
}
