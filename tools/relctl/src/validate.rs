//! `relctl validate`

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::*;
use relval_engine::Behavior;

use crate::context::{load_metadata, set_up_engine};

/// Set up the engine and report every computed point
///
/// Returns whether no point was excluded.
pub fn handle_validate(metadata_path: &Path, settings: &common::Settings, brief: bool) -> Result<bool> {
    let metadata = Arc::new(load_metadata(metadata_path, settings)?);
    let engine = set_up_engine(metadata.clone());

    println!();
    let mut computed: Vec<_> = engine.computed_points().collect();
    computed.sort_by_key(|c| c.point);
    for point in &computed {
        print!(
            "{} {} ",
            "OK".green(),
            metadata.point(point.point).name.bright_yellow()
        );
        if brief {
            println!();
            continue;
        }
        let behaviors: Vec<String> = point
            .behaviors
            .iter()
            .map(|b| format!("{} {}", b.kind(), metadata.point(b.info().input).name))
            .collect();
        println!("{} [{}]", point.transform.name().bright_cyan(), behaviors.join(", "));
    }
    for excluded in engine.excluded() {
        println!("{} {}", "FAIL".red(), excluded.name.bright_yellow());
        eprintln!("   {} {}", "ERROR".red(), excluded.error);
    }

    println!();
    if engine.excluded().is_empty() {
        println!(
            "{} {} computed points",
            "SUCCESS".green().bold(),
            computed.len()
        );
        Ok(true)
    } else {
        eprintln!(
            "{} {} of {} points excluded",
            "FAILURE".red().bold(),
            engine.excluded().len(),
            computed.len() + engine.excluded().len()
        );
        Ok(false)
    }
}
