//! End-to-end processing of summarizer points against a memory store

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use common::ProcessorSettings;
use relval_engine::{Engine, Processor, TransformRegistry, SUMMARIZER_ENGINE};
use relval_model::{
    BehaviorKind, Content, DateTime, InputDef, MetadataBuilder, PointDef, PointId, PointValue,
    SyncDef, TransformDef, Value,
};
use relval_store::{MemoryStore, PointValueStore};

struct Scenario {
    processor: Processor<MemoryStore>,
    bounds: PointId,
    power: PointId,
    total: PointId,
}

fn sum_transform() -> TransformDef {
    TransformDef::new(SUMMARIZER_ENGINE)
        .param("InitialProgram", "total = 0.0")
        .param("StepProgram", "total = total + step")
        .param("FinalProgram", "total")
}

impl Scenario {
    fn new(bounds: PointDef, summarizes: InputDef, summarized: InputDef) -> Self {
        Self::with_power(bounds, PointDef::new("Power"), summarizes, summarized)
    }

    fn with_power(
        bounds: PointDef,
        power: PointDef,
        summarizes: InputDef,
        summarized: InputDef,
    ) -> Self {
        let metadata = MetadataBuilder::new()
            .point(bounds)
            .point(power)
            .point(
                PointDef::new("Total")
                    .content(Content::Numeric)
                    .transform(sum_transform())
                    .input(summarizes)
                    .input(summarized),
            )
            .build()
            .unwrap();
        let metadata = Arc::new(metadata);
        let engine = Engine::set_up(metadata.clone(), &TransformRegistry::new());
        assert!(engine.excluded().is_empty(), "{:?}", engine.excluded());

        Self {
            bounds: metadata.point_by_name("Bounds").unwrap().id,
            power: metadata.point_by_name("Power").unwrap().id,
            total: metadata.point_by_name("Total").unwrap().id,
            processor: Processor::new(
                Arc::new(engine),
                Arc::new(MemoryStore::new()),
                &ProcessorSettings::default(),
            ),
        }
    }

    fn plain() -> Self {
        Self::new(
            PointDef::new("Bounds"),
            InputDef::new("Bounds", BehaviorKind::Summarizes),
            InputDef::new("Power", BehaviorKind::Summarized),
        )
    }

    fn store(&self, values: &[PointValue]) {
        self.processor.store().update(values).unwrap();
    }

    /// Store the notices, then process them
    fn feed(&self, notices: Vec<PointValue>) -> Vec<PointValue> {
        self.store(&notices);
        self.processor.process(notices).unwrap().updates
    }

    fn bound(&self, seconds: i64, value: Value) -> PointValue {
        PointValue::new(self.bounds, DateTime::from_seconds(seconds), Some(value))
    }

    fn power(&self, seconds: i64, value: f64) -> PointValue {
        PointValue::new(self.power, DateTime::from_seconds(seconds), Some(Value::Double(value)))
    }

    fn total(&self, seconds: i64, value: f64) -> PointValue {
        PointValue::new(self.total, DateTime::from_seconds(seconds), Some(Value::Double(value)))
    }
}

#[test]
fn test_boundary_notice_closes_interval() {
    let scenario = Scenario::plain();
    scenario.store(&[
        scenario.bound(0, Value::Long(0)),
        scenario.power(0, 1.0),
        scenario.power(30, 2.0),
        scenario.power(60, 4.0),
    ]);

    let updates = scenario.feed(vec![scenario.bound(60, Value::Long(1))]);
    assert_eq!(updates, vec![scenario.total(60, 3.0)]);
}

#[test]
fn test_step_notice_recomputes_interval() {
    let scenario = Scenario::plain();
    scenario.store(&[
        scenario.bound(0, Value::Long(0)),
        scenario.bound(60, Value::Long(1)),
        scenario.power(10, 1.0),
    ]);

    let updates = scenario.feed(vec![scenario.power(20, 5.0)]);
    assert_eq!(updates, vec![scenario.total(60, 6.0)]);
}

#[test]
fn test_unchanged_result_not_rewritten() {
    let scenario = Scenario::plain();
    scenario.store(&[scenario.bound(0, Value::Long(0)), scenario.power(10, 1.0)]);

    let notice = scenario.bound(60, Value::Long(1));
    assert_eq!(scenario.feed(vec![notice.clone()]).len(), 1);

    let outcome = scenario.processor.process(vec![notice]).unwrap();
    assert!(outcome.updates.is_empty());
    assert_eq!(outcome.stats.unchanged, 1);
}

#[test]
fn test_start_stop_produces_one_result() {
    let scenario = Scenario::new(
        PointDef::new("Bounds").content(Content::Boolean),
        InputDef::new("Bounds", BehaviorKind::Summarizes),
        InputDef::new("Power", BehaviorKind::Summarized),
    );
    scenario.store(&[scenario.power(0, 2.0), scenario.power(5, 3.0), scenario.power(15, 7.0)]);

    let updates = scenario.feed(vec![
        scenario.bound(0, Value::Boolean(true)),
        scenario.bound(10, Value::Boolean(false)),
    ]);
    assert_eq!(updates, vec![scenario.total(10, 5.0)]);
}

#[test]
fn test_running_interval_is_provisional() {
    let scenario = Scenario::new(
        PointDef::new("Bounds"),
        InputDef::new("Bounds", BehaviorKind::Summarizes).param("RunningInterval", true),
        InputDef::new("Power", BehaviorKind::Summarized),
    );
    scenario.store(&[scenario.power(5, 1.0)]);

    // Opens [0, ...) with a provisional result at its beginning
    let updates = scenario.feed(vec![scenario.bound(0, Value::Long(0))]);
    assert_eq!(updates, vec![scenario.total(0, 1.0)]);

    // A later step value updates the provisional result
    let updates = scenario.feed(vec![scenario.power(8, 2.0)]);
    assert_eq!(updates, vec![scenario.total(0, 3.0)]);

    // The stop closes [0, 10) and opens [10, ...)
    let updates = scenario.feed(vec![scenario.bound(10, Value::Long(1)), scenario.power(12, 4.0)]);
    assert_eq!(updates, vec![scenario.total(10, 4.0)]);
}

#[test]
fn test_fetch_previous_value_carries_into_interval() {
    let scenario = Scenario::new(
        PointDef::new("Bounds"),
        InputDef::new("Bounds", BehaviorKind::Summarizes),
        InputDef::new("Power", BehaviorKind::Summarized).param("FetchPreviousValue", true),
    );
    scenario.store(&[
        scenario.bound(0, Value::Long(0)),
        scenario.power(-5, 10.0),
        scenario.power(20, 1.0),
    ]);

    let updates = scenario.feed(vec![scenario.bound(60, Value::Long(1))]);
    assert_eq!(updates, vec![scenario.total(60, 11.0)]);
}

#[test]
fn test_running_start_stop_stays_closed_after_false() {
    let scenario = Scenario::new(
        PointDef::new("Bounds").content(Content::Boolean),
        InputDef::new("Bounds", BehaviorKind::Summarizes).param("RunningInterval", true),
        InputDef::new("Power", BehaviorKind::Summarized),
    );
    scenario.store(&[
        scenario.bound(0, Value::Boolean(true)),
        scenario.power(5, 1.0),
        scenario.bound(10, Value::Boolean(false)),
    ]);

    // Nothing runs after the false value
    assert!(scenario.feed(vec![scenario.power(15, 7.0)]).is_empty());

    // The next true value opens a running interval again
    scenario.store(&[scenario.bound(20, Value::Boolean(true))]);
    let updates = scenario.feed(vec![scenario.power(25, 2.0)]);
    assert_eq!(updates, vec![scenario.total(20, 2.0)]);
}

#[test]
fn test_steps_span_several_sync_stamps() {
    let scenario = Scenario::new(
        PointDef::new("Bounds").sync(SyncDef::elapsed("10s")),
        InputDef::new("Bounds", BehaviorKind::Summarizes).param("Steps", 2),
        InputDef::new("Power", BehaviorKind::Summarized),
    );
    scenario.store(&[
        scenario.bound(0, Value::Long(0)),
        scenario.bound(10, Value::Long(1)),
        scenario.power(5, 1.0),
        scenario.power(15, 2.0),
    ]);

    // [0, 20) covers two sync stamps, past the bound at 10
    let updates = scenario.feed(vec![scenario.bound(20, Value::Long(2))]);
    assert_eq!(updates, vec![scenario.total(20, 3.0)]);
}

#[test]
fn test_since_sync_position_limits_steps() {
    let scenario = Scenario::with_power(
        PointDef::new("Bounds"),
        PointDef::new("Power").sync(SyncDef::elapsed("10s")),
        InputDef::new("Bounds", BehaviorKind::Summarizes),
        InputDef::new("Power", BehaviorKind::Summarized).param("SinceSyncPosition", -2),
    );
    scenario.store(&[scenario.bound(0, Value::Long(0))]);
    scenario.store(
        &(1..=5)
            .map(|tick| scenario.power(tick * 10, tick as f64))
            .collect::<Vec<_>>(),
    );

    // Only the two sync stamps before the stop: 40 and 50
    let updates = scenario.feed(vec![scenario.bound(60, Value::Long(1))]);
    assert_eq!(updates, vec![scenario.total(60, 9.0)]);

    // A step within two sync stamps of the stop triggers it
    let updates = scenario.feed(vec![scenario.power(50, 6.0)]);
    assert_eq!(updates, vec![scenario.total(60, 10.0)]);

    // An earlier step does not
    assert!(scenario.feed(vec![scenario.power(30, 9.0)]).is_empty());
    assert!(scenario.feed(vec![scenario.bound(60, Value::Long(1))]).is_empty());
}

#[test]
fn test_fetch_previous_end_value_retriggers_following_interval() {
    let scenario = Scenario::new(
        PointDef::new("Bounds"),
        InputDef::new("Bounds", BehaviorKind::Summarizes),
        InputDef::new("Power", BehaviorKind::Summarized).param("FetchPreviousEndValue", true),
    );
    scenario.store(&[
        scenario.bound(-60, Value::Long(0)),
        scenario.bound(0, Value::Long(1)),
        scenario.bound(60, Value::Long(2)),
        scenario.bound(120, Value::Long(3)),
        scenario.power(-5, 3.0),
        scenario.power(10, 1.0),
        scenario.power(70, 2.0),
    ]);

    // The last step of [0, 60) is also the value carried into [60, 120)
    let updates = scenario.feed(vec![scenario.power(50, 5.0)]);
    assert_eq!(updates, vec![scenario.total(60, 9.0), scenario.total(120, 7.0)]);
}

#[test]
fn test_fetch_previous_end_value_must_follow_previous_start() {
    let scenario = Scenario::new(
        PointDef::new("Bounds"),
        InputDef::new("Bounds", BehaviorKind::Summarizes),
        InputDef::new("Power", BehaviorKind::Summarized).param("FetchPreviousEndValue", true),
    );
    scenario.store(&[
        scenario.bound(0, Value::Long(0)),
        scenario.bound(60, Value::Long(1)),
        scenario.power(-30, 1.0),
        scenario.power(70, 2.0),
    ]);

    // The value before 60 predates the interval starting at 0
    assert!(scenario.feed(vec![scenario.bound(120, Value::Long(2))]).is_empty());

    scenario.store(&[scenario.power(30, 4.0)]);
    let updates = scenario.feed(vec![scenario.bound(120, Value::Long(2))]);
    assert_eq!(updates, vec![scenario.total(120, 6.0)]);
}

fn reverse_scenario() -> Scenario {
    Scenario::new(
        PointDef::new("Bounds"),
        InputDef::new("Bounds", BehaviorKind::Summarizes)
            .param("ReverseInterval", true)
            .param("ResultPosition", "next"),
        InputDef::new("Power", BehaviorKind::Summarized),
    )
}

#[test]
fn test_reverse_interval_includes_stop() {
    let scenario = reverse_scenario();
    scenario.store(&[
        scenario.bound(0, Value::Long(0)),
        scenario.power(0, 1.0),
        scenario.power(30, 2.0),
        scenario.power(60, 4.0),
    ]);

    // (0, 60]
    let updates = scenario.feed(vec![scenario.bound(60, Value::Long(1))]);
    assert_eq!(updates, vec![scenario.total(60, 6.0)]);
}

#[test]
fn test_reverse_interval_step_at_boundary() {
    let scenario = reverse_scenario();
    scenario.store(&[
        scenario.bound(0, Value::Long(0)),
        scenario.bound(60, Value::Long(1)),
        scenario.bound(120, Value::Long(2)),
        scenario.power(30, 2.0),
    ]);

    // A step at 60 belongs to the interval ending there
    let updates = scenario.feed(vec![scenario.power(60, 4.0)]);
    assert_eq!(updates, vec![scenario.total(60, 6.0)]);
}
