//! `relctl run`: feed a value file through the processor

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::*;
use common::{ProcessorSettings, Settings};
use relval_engine::{BatchStats, Processor};
use relval_model::{Metadata, PointValue};
use relval_store::{csv_io, MemoryStore, PointValueStore};
use serde_json::json;
use tracing::{info, warn};

pub struct RunOptions<'a> {
    pub metadata: &'a Path,
    pub input: &'a Path,
    pub history: Option<&'a Path>,
    pub output: Option<&'a Path>,
    pub batch_size: Option<usize>,
    pub json: bool,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub updates: Vec<PointValue>,
    pub stats: BatchStats,
    pub batches: usize,
    /// Updates left unprocessed when the cascade depth ran out
    pub cut_off: usize,
}

fn read_values(path: &Path, metadata: &Metadata) -> Result<Vec<PointValue>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    csv_io::read_point_values(file, metadata)
        .with_context(|| format!("Failed to read values from {}", path.display()))
}

/// Process `values` in batches, feeding updates back as notices
///
/// Each batch of values is stored before it is processed. Updates are fed
/// back up to `max_cascade_depth` times.
pub fn run_values<S: PointValueStore>(
    processor: &Processor<S>,
    values: &[PointValue],
    settings: &ProcessorSettings,
) -> errors::Result<RunReport> {
    let mut report = RunReport::default();

    for chunk in values.chunks(settings.batch_size.max(1)) {
        processor.store().update(chunk)?;
        let mut notices = chunk.to_vec();
        let mut depth = 0;
        loop {
            let outcome = processor.process(notices)?;
            report.batches += 1;
            report.stats += outcome.stats;
            if outcome.updates.is_empty() {
                break;
            }
            report.updates.extend(outcome.updates.iter().cloned());
            if depth >= settings.max_cascade_depth {
                warn!(
                    "Cascade depth {} reached with {} updates pending",
                    depth,
                    outcome.updates.len()
                );
                report.cut_off += outcome.updates.len();
                break;
            }
            notices = outcome.updates;
            depth += 1;
        }
    }
    Ok(report)
}

fn print_updates(metadata: &Metadata, updates: &[PointValue]) {
    for update in updates {
        let stamp = update.stamp.map(|s| s.to_string()).unwrap_or_default();
        let value = match &update.value {
            Some(value) => value.to_string(),
            None => "null".to_string(),
        };
        println!(
            "{} {} = {}",
            stamp.bright_black(),
            metadata.point(update.point).name.bright_yellow(),
            value.green()
        );
    }
}

fn json_updates(metadata: &Metadata, updates: &[PointValue]) -> serde_json::Value {
    updates
        .iter()
        .map(|update| {
            json!({
                "point": metadata.point(update.point).name,
                "stamp": update.stamp.map(|s| s.to_string()),
                "value": update.value,
            })
        })
        .collect()
}

pub fn handle_run(options: RunOptions<'_>, settings: &Settings) -> Result<()> {
    let metadata = Arc::new(crate::context::load_metadata(options.metadata, settings)?);
    let engine = crate::context::set_up_engine(metadata.clone());
    for excluded in engine.excluded() {
        eprintln!("{} {} excluded: {}", "WARN".yellow(), excluded.name, excluded.error);
    }

    let history = match options.history {
        Some(path) => read_values(path, &metadata)?,
        None => Vec::new(),
    };
    let store = Arc::new(MemoryStore::with_values(history)?);
    let values = read_values(options.input, &metadata)?;

    let mut processor_settings = settings.processor.clone();
    if let Some(batch_size) = options.batch_size {
        processor_settings.batch_size = batch_size;
    }
    let processor = Processor::new(engine, store, &processor_settings);

    let report = run_values(&processor, &values, &processor_settings)?;
    info!(
        "{} values in {} batches: {} updates, {} queries, {} conflicts",
        values.len(),
        report.batches,
        report.updates.len(),
        report.stats.queries,
        report.stats.conflicts
    );

    if let Some(path) = options.output {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        csv_io::write_point_values(file, &metadata, &report.updates)?;
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&json_updates(&metadata, &report.updates))?);
    } else {
        print_updates(&metadata, &report.updates);
        println!();
        println!(
            "{} {} updates from {} values",
            "DONE".green().bold(),
            report.updates.len(),
            values.len()
        );
        if report.cut_off > 0 {
            println!(
                "{} {} updates not cascaded (max_cascade_depth = {})",
                "WARNING".yellow(),
                report.cut_off,
                processor_settings.max_cascade_depth
            );
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use relval_model::{
        BehaviorKind, Content, DateTime, InputDef, MetadataBuilder, PointDef, TransformDef, Value,
    };
    use relval_pap::MODBUS_SPLITTER_ENGINE;

    /// Block -> Word (split) -> Copy (split of a scalar)
    fn chained() -> (Arc<Metadata>, Processor<MemoryStore>) {
        let metadata = MetadataBuilder::new()
            .point(PointDef::new("Block").content(Content::Tuple(None)))
            .point(
                PointDef::new("Word")
                    .transform(TransformDef::new(MODBUS_SPLITTER_ENGINE))
                    .input(InputDef::new("Block", BehaviorKind::Triggers).param("Index", 1)),
            )
            .point(
                PointDef::new("Copy")
                    .transform(TransformDef::new(MODBUS_SPLITTER_ENGINE))
                    .input(InputDef::new("Word", BehaviorKind::Triggers)),
            )
            .build()
            .unwrap();
        let metadata = Arc::new(metadata);
        let engine = crate::context::set_up_engine(metadata.clone());
        assert!(engine.excluded().is_empty());
        let processor = Processor::new(
            engine,
            Arc::new(MemoryStore::new()),
            &ProcessorSettings::default(),
        );
        (metadata, processor)
    }

    fn block(metadata: &Metadata, seconds: i64, words: &[i64]) -> PointValue {
        PointValue::new(
            metadata.point_by_name("Block").unwrap().id,
            DateTime::from_seconds(seconds),
            Some(Value::Tuple(words.iter().map(|w| Some(Value::Long(*w))).collect())),
        )
    }

    #[test]
    fn test_updates_cascade_to_dependent_points() {
        let (metadata, processor) = chained();
        let values = vec![block(&metadata, 0, &[1, 2]), block(&metadata, 10, &[3, 4])];

        let report = run_values(&processor, &values, &ProcessorSettings::default()).unwrap();
        let names: Vec<&str> = report
            .updates
            .iter()
            .map(|u| metadata.point(u.point).name.as_str())
            .collect();
        assert_eq!(names, vec!["Word", "Word", "Copy", "Copy"]);
        assert_eq!(report.updates[3].value, Some(Value::Long(4)));
        assert_eq!(report.cut_off, 0);

        let copy = metadata.point_by_name("Copy").unwrap().id;
        assert_eq!(processor.store().values(copy).len(), 2);
    }

    #[test]
    fn test_cascade_depth_limit() {
        let (metadata, processor) = chained();
        let settings = ProcessorSettings {
            max_cascade_depth: 0,
            batch_size: 1,
            ..ProcessorSettings::default()
        };

        let report = run_values(&processor, &[block(&metadata, 0, &[1, 2])], &settings).unwrap();
        assert_eq!(report.updates.len(), 1);
        assert_eq!(report.cut_off, 1);
        assert_eq!(report.batches, 1);
    }

    #[test]
    fn test_json_updates_use_point_names() {
        let (metadata, _) = chained();
        let word = metadata.point_by_name("Word").unwrap().id;
        let updates = vec![PointValue::new(word, DateTime::from_seconds(0), Some(Value::Long(2)))];

        let json = json_updates(&metadata, &updates);
        assert_eq!(json[0]["point"], "Word");
        assert_eq!(json[0]["value"], 2);
    }
}
