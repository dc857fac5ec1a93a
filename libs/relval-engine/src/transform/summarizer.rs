//! Summarizer transform

use errors::{RelvalError, Result};
use relval_model::{BehaviorKind, Content, PointId, PointValue};
use tracing::{debug, warn};

use super::program::{ProgramInputs, SummaryProgram};
use super::{Transform, TransformContext, SUMMARIZER_ENGINE};
use crate::batch::Batch;
use crate::result::ResultValue;

pub const FAIL_RETURNS_NULL_PARAM: &str = "FailReturnsNull";

/// Runs the summary programs over a selected interval
///
/// Inputs arrive in relation order: the interval stop value (summarizes
/// relation), one value per other relation, then the step values
/// (summarized relation).
#[derive(Debug)]
pub struct SummarizerTransform {
    point: PointId,
    content: Option<Content>,
    program: SummaryProgram,
    /// Relations between the summarizes and the summarized one
    other_inputs: usize,
    fail_returns_null: bool,
}

impl SummarizerTransform {
    pub fn set_up(context: &TransformContext<'_>) -> Result<Self> {
        let kind = SUMMARIZER_ENGINE;
        let metadata = context.metadata;
        let point = context.point;

        let behaviors: Vec<BehaviorKind> = metadata
            .input_relations(point.id)
            .map(|r| r.behavior)
            .collect();
        if behaviors.len() < 2 {
            return Err(RelvalError::incompatible(
                kind,
                format!("point {} needs at least 2 inputs", point),
            ));
        }
        if behaviors.first() != Some(&BehaviorKind::Summarizes) {
            return Err(RelvalError::incompatible(
                kind,
                format!("first input of {} must be summarizes", point),
            ));
        }
        if behaviors.last() != Some(&BehaviorKind::Summarized) {
            return Err(RelvalError::incompatible(
                kind,
                format!("last input of {} must be summarized", point),
            ));
        }

        Ok(Self {
            point: point.id,
            content: point.content,
            program: SummaryProgram::compile(&context.definition.params)?,
            other_inputs: behaviors.len() - 2,
            fail_returns_null: context
                .definition
                .params
                .get_bool_or(FAIL_RETURNS_NULL_PARAM, false)?,
        })
    }
}

impl Transform for SummarizerTransform {
    fn name(&self) -> &str {
        SUMMARIZER_ENGINE
    }

    fn uses_fetched_result(&self) -> bool {
        true
    }

    fn apply_to(&self, result: &ResultValue, _batch: &Batch) -> Option<PointValue> {
        let Some(summary) = result.summary() else {
            warn!("Summarizer got a plain result {}", result);
            return None;
        };

        let inputs = result.inputs();
        let others_end = (1 + self.other_inputs).min(inputs.len());
        let others = inputs.get(1..others_end).unwrap_or_default();
        let steps = inputs.get(others_end..).unwrap_or_default();

        let outcome = self.program.run(&ProgramInputs {
            stamp: result.stamp,
            start: summary.start_value(),
            stop: summary.stop_value(),
            inputs: others,
            steps,
        });

        let value = match outcome {
            Ok(value) => value,
            Err(e) if self.fail_returns_null => {
                debug!("Program failed for {}: {}, writing null", result, e);
                None
            },
            Err(e) => {
                warn!("Program failed for {}: {}", result, e);
                return None;
            },
        };

        let value = match (value, self.content) {
            (Some(value), Some(content)) => {
                let normalized = content.normalize(value.clone());
                if normalized.is_none() {
                    warn!("Value {} does not fit content of {}", value, result);
                    return None;
                }
                normalized
            },
            (value, _) => value,
        };
        Some(PointValue::new(self.point, result.stamp, value))
    }
}
