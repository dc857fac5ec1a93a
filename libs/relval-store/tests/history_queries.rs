//! Queries against a memory store loaded from a CSV history

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use relval_model::{DateTime, Metadata, MetadataBuilder, PointDef, PointId, Value};
use relval_store::{csv_io, MemoryStore, PointValueStore, StoreValuesQuery, TimeInterval};

const HISTORY: &str = "point,stamp,value
Power,1970-01-01T00:00:00Z,1.5
Power,1970-01-01T00:00:30Z,
Power,1970-01-01T00:01:00Z,2.5
Power,1970-01-01T00:01:30Z,4
Hour,1970-01-01T00:00:00Z,0
";

fn load() -> (Metadata, MemoryStore, PointId) {
    let metadata = MetadataBuilder::new()
        .point(PointDef::new("Power"))
        .point(PointDef::new("Hour"))
        .build()
        .unwrap();
    let values = csv_io::read_point_values(HISTORY.as_bytes(), &metadata).unwrap();
    let store = MemoryStore::with_values(values).unwrap();
    let power = metadata.point_by_name("Power").unwrap().id;
    (metadata, store, power)
}

fn stamps(values: &[relval_model::PointValue]) -> Vec<i64> {
    values
        .iter()
        .map(|v| v.stamp.unwrap().raw() / DateTime::from_seconds(1).raw())
        .collect()
}

#[test]
fn test_neighbour_queries_skip_nulls_on_request() {
    let (_, store, power) = load();

    let before = store
        .select(&StoreValuesQuery::new(power).before(DateTime::from_seconds(60)))
        .unwrap();
    assert_eq!(stamps(&before), vec![30]);
    assert!(before[0].is_null());

    let before = store
        .select(
            &StoreValuesQuery::new(power)
                .before(DateTime::from_seconds(60))
                .not_null(true),
        )
        .unwrap();
    assert_eq!(stamps(&before), vec![0]);

    let after = store
        .select(&StoreValuesQuery::new(power).not_before(DateTime::from_seconds(60)))
        .unwrap();
    assert_eq!(after[0].value, Some(Value::Double(2.5)));
}

#[test]
fn test_interval_query_is_half_open() {
    let (_, store, power) = load();

    let values = store
        .select(&StoreValuesQuery::new(power).interval(TimeInterval::from_to(
            DateTime::from_seconds(0),
            DateTime::from_seconds(90),
        )))
        .unwrap();
    assert_eq!(stamps(&values), vec![0, 30, 60]);
}

#[test]
fn test_history_round_trips_through_csv() {
    let (metadata, store, power) = load();

    let mut buffer = Vec::new();
    csv_io::write_point_values(&mut buffer, &metadata, &store.values(power)).unwrap();
    let reread = csv_io::read_point_values(buffer.as_slice(), &metadata).unwrap();

    assert_eq!(reread, store.values(power));
    assert_eq!(store.len(), 5);
}
