//! CSV exchange of point values
//!
//! Columns: `point,stamp,value[,state]`. `point` is the point name, `stamp`
//! RFC 3339 or a raw tick count, `value` JSON (`12.5`, `true`, `[10,20]`) or
//! empty for a null value.

use std::io::{Read, Write};

use csv::{ReaderBuilder, Trim};
use errors::{RelvalError, Result};
use relval_model::{DateTime, Metadata, PointValue, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
struct ValueRecord {
    point: String,
    stamp: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    state: Option<String>,
}

fn csv_error(err: csv::Error) -> RelvalError {
    RelvalError::parse("csv", err)
}

/// Read point values, resolving names against `metadata`
pub fn read_point_values<R: Read>(reader: R, metadata: &Metadata) -> Result<Vec<PointValue>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut values = Vec::new();
    for (line, record) in reader.deserialize::<ValueRecord>().enumerate() {
        let record = record.map_err(csv_error)?;
        let point = metadata
            .point_by_name(&record.point)
            .ok_or_else(|| RelvalError::PointNotFound(record.point.clone()))?;
        let stamp: DateTime = record.stamp.parse()?;
        let value = if record.value.is_empty() || record.value == "null" {
            None
        } else {
            Some(serde_json::from_str::<Value>(&record.value).map_err(|e| {
                RelvalError::parse(format!("value on line {}", line + 2), e)
            })?)
        };

        let mut point_value = PointValue::new(point.id, stamp, value);
        point_value.state = record.state.filter(|s| !s.is_empty());
        values.push(point_value);
    }
    Ok(values)
}

/// Write point values with point names from `metadata`
pub fn write_point_values<W: Write>(
    writer: W,
    metadata: &Metadata,
    values: &[PointValue],
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for value in values {
        let name = metadata
            .get_point(value.point)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| value.point.to_string());
        let record = ValueRecord {
            point: name,
            stamp: value.stamp.map(|s| s.to_string()).unwrap_or_default(),
            value: match &value.value {
                Some(v) => serde_json::to_string(v)?,
                None => String::new(),
            },
            state: value.state.clone(),
        };
        writer.serialize(record).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use relval_model::{MetadataBuilder, PointDef};

    fn metadata() -> Metadata {
        MetadataBuilder::new()
            .point(PointDef::new("Raw"))
            .point(PointDef::new("Flag"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_read_values() {
        let metadata = metadata();
        let text = "point,stamp,value\n\
                    Raw,1970-01-01T00:00:01Z,\"[10,20,30]\"\n\
                    Flag,@5,true\n\
                    Flag,@6,\n";
        let values = read_point_values(text.as_bytes(), &metadata).unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(values[0].stamp, Some(DateTime::from_seconds(1)));
        assert_eq!(values[0].value.as_ref().unwrap().as_tuple().unwrap().len(), 3);
        assert_eq!(values[1].as_bool(), Some(true));
        assert!(values[2].is_null());
    }

    #[test]
    fn test_unknown_point_rejected() {
        let metadata = metadata();
        let text = "point,stamp,value\nNope,@1,1\n";
        assert!(matches!(
            read_point_values(text.as_bytes(), &metadata),
            Err(RelvalError::PointNotFound(_))
        ));
    }

    #[test]
    fn test_write_then_read() {
        let metadata = metadata();
        let raw = metadata.point_by_name("Raw").unwrap().id;
        let values = vec![PointValue::new(raw, DateTime::from_raw(42), Some(Value::Double(1.5)))];

        let mut buffer = Vec::new();
        write_point_values(&mut buffer, &metadata, &values).unwrap();
        let read = read_point_values(buffer.as_slice(), &metadata).unwrap();
        assert_eq!(read, values);
    }
}
