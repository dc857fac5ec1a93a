//! `relctl split`: decode one source value

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use common::Settings;
use relval_model::{DateTime, Metadata, PointId, PointValue, Value};
use relval_pap::{
    CipSplitter, ModbusSplitter, Splitted, Splitter, CIP_SPLITTER_ENGINE, MODBUS_SPLITTER_ENGINE,
};

/// Splitter used by the results of `source`
fn splitter_for(metadata: &Metadata, source: PointId) -> Result<Box<dyn Splitter>> {
    let engine = metadata
        .result_relations(source)
        .filter_map(|relation| metadata.point(relation.result).transform.as_ref())
        .map(|transform| transform.engine.as_str())
        .find(|engine| *engine == MODBUS_SPLITTER_ENGINE || *engine == CIP_SPLITTER_ENGINE)
        .ok_or_else(|| anyhow!("No splitter result for point {}", metadata.point(source)))?;

    Ok(if engine == MODBUS_SPLITTER_ENGINE {
        Box::new(ModbusSplitter::new())
    } else {
        Box::new(CipSplitter::new())
    })
}

pub fn split_value(metadata: &Metadata, point: &str, value: Value, stamp: DateTime) -> Result<Splitted> {
    let source = metadata
        .point_by_name(point)
        .ok_or_else(|| anyhow!("Unknown point {}", point))?
        .id;
    let splitter = splitter_for(metadata, source)?;
    if !splitter.set_up(metadata, source) {
        eprintln!(
            "{} some {} relations of {} were rejected",
            "WARN".yellow(),
            splitter.protocol(),
            point
        );
    }

    match splitter.split(&PointValue::new(source, stamp, Some(value))) {
        Some(splitted) => Ok(splitted),
        None => bail!("Point {} has no {} plan", point, splitter.protocol()),
    }
}

pub fn handle_split(
    metadata_path: &Path,
    settings: &Settings,
    point: &str,
    value: &str,
    stamp: Option<&str>,
) -> Result<()> {
    let metadata = crate::context::load_metadata(metadata_path, settings)?;
    let value: Value =
        serde_json::from_str(value).with_context(|| format!("Invalid JSON value '{}'", value))?;
    let stamp = match stamp {
        Some(stamp) => stamp.parse::<DateTime>()?,
        None => DateTime::now(),
    };

    let splitted = split_value(&metadata, point, value, stamp)?;
    for (result, value) in splitted.iter() {
        let name = &metadata.point(result).name;
        match value {
            Some(value) => println!("{} = {}", name.bright_yellow(), value.to_string().green()),
            None => println!("{} = {}", name.bright_yellow(), "-".bright_black()),
        }
    }
    Ok(())
}
