//! Loading settings, metadata and the engine

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use common::Settings;
use relval_engine::{Engine, TransformRegistry};
use relval_model::{Metadata, MetadataDocument, RESULT_POSITION_PROPERTY, REVERSE_INTERVAL_PROPERTY};
use tracing::debug;

pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    Settings::load(path).context("Failed to load settings")
}

/// Load a metadata document and overlay the summarizer defaults
///
/// Properties set by the document win over the settings.
pub fn load_metadata(path: &Path, settings: &Settings) -> Result<Metadata> {
    let document = MetadataDocument::load(path)
        .with_context(|| format!("Failed to read metadata {}", path.display()))?;
    let mut metadata = document
        .into_metadata()
        .with_context(|| format!("Invalid metadata {}", path.display()))?;

    if let Some(position) = &settings.summarizer.result_position {
        if !metadata.properties().contains(RESULT_POSITION_PROPERTY) {
            metadata.set_property(RESULT_POSITION_PROPERTY, position);
        }
    }
    if settings.summarizer.reverse_interval
        && !metadata.properties().contains(REVERSE_INTERVAL_PROPERTY)
    {
        metadata.set_property(REVERSE_INTERVAL_PROPERTY, true);
    }

    debug!("Loaded {} points from {}", metadata.points().count(), path.display());
    Ok(metadata)
}

/// Summarizer and splitter transforms
pub fn registry() -> TransformRegistry {
    let mut registry = TransformRegistry::new();
    relval_pap::register_transforms(&mut registry);
    registry
}

pub fn set_up_engine(metadata: Arc<Metadata>) -> Arc<Engine> {
    Arc::new(Engine::set_up(metadata, &registry()))
}
