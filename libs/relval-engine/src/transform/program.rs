//! Summary programs
//!
//! A summarizer point computes its value with up to three expression chains
//! (evalexpr syntax, statements separated by `;`):
//!
//! - `InitialProgram`: run once with the interval variables set
//! - `StepProgram`: run once per step value, in stamp order
//! - `FinalProgram`: its value is the result; without it the variable
//!   `result` is used
//!
//! Variables keep their type for the whole run, so accumulators must start
//! as floats (`total = 0.0`).
//!
//! | Variable | Type | Content |
//! |---|---|---|
//! | `stamp` | float | result stamp in seconds |
//! | `steps` | int | number of step values |
//! | `start`, `stop` | float | interval bound values (0.0 when null) |
//! | `start_present`, `stop_present` | bool | bound carries a value |
//! | `input1`..`inputN` | float | other inputs, in relation order |
//! | `step` | float | current step value (booleans as 1.0/0.0, null as 0.0) |
//! | `step_present` | bool | current step carries a value |
//! | `step_number` | int | 1-based step index |
//! | `step_stamp` | float | current step stamp in seconds |

use errors::{RelvalError, Result};
use evalexpr::{
    Context, ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError, Function,
    HashMapContext, Node, Value as ExprValue,
};
use relval_model::{DateTime, Params, PointValue, Value};

pub const INITIAL_PROGRAM_PARAM: &str = "InitialProgram";
pub const STEP_PROGRAM_PARAM: &str = "StepProgram";
pub const FINAL_PROGRAM_PARAM: &str = "FinalProgram";

const RESULT_VARIABLE: &str = "result";

/// Values a program run sees
pub struct ProgramInputs<'a> {
    pub stamp: DateTime,
    pub start: Option<&'a PointValue>,
    pub stop: Option<&'a PointValue>,
    pub inputs: &'a [PointValue],
    pub steps: &'a [PointValue],
}

/// Compiled programs of one summarizer point
#[derive(Debug, Clone)]
pub struct SummaryProgram {
    initial: Option<Node>,
    step: Option<Node>,
    finish: Option<Node>,
}

fn compile(params: &Params, name: &str) -> Result<Option<Node>> {
    params
        .get_string(name)
        .filter(|text| !text.is_empty())
        .map(|text| {
            evalexpr::build_operator_tree(text).map_err(|e| RelvalError::InvalidProgram {
                program: name.to_string(),
                error: e.to_string(),
            })
        })
        .transpose()
}

/// Numeric view of a point value: booleans count as 1.0/0.0
fn numeric(value: Option<&PointValue>) -> Option<f64> {
    let value = value?.value()?;
    value
        .as_f64()
        .or_else(|| value.as_bool().map(|b| if b { 1.0 } else { 0.0 }))
}

fn stamp_seconds(stamp: Option<DateTime>) -> f64 {
    stamp.map_or(0.0, DateTime::to_seconds_f64)
}

fn evaluation_error(error: EvalexprError) -> RelvalError {
    RelvalError::Evaluation(error.to_string())
}

fn set(context: &mut HashMapContext, name: &str, value: ExprValue) -> Result<()> {
    context
        .set_value(name.to_string(), value)
        .map_err(evaluation_error)
}

/// Convert an evaluation result; `()` is a null value
fn to_value(value: ExprValue) -> Result<Option<Value>> {
    Ok(match value {
        ExprValue::Empty => None,
        ExprValue::Boolean(b) => Some(Value::Boolean(b)),
        ExprValue::Int(i) => Some(Value::Long(i)),
        ExprValue::Float(f) => Some(Value::Double(f)),
        ExprValue::String(s) => Some(Value::Text(s)),
        ExprValue::Tuple(items) => Some(Value::Tuple(
            items
                .into_iter()
                .map(to_value)
                .collect::<Result<Vec<_>>>()?,
        )),
    })
}

/// Register the built-in functions
fn register_functions(context: &mut HashMapContext) -> Result<()> {
    fn to_f64(value: &ExprValue) -> std::result::Result<f64, EvalexprError> {
        match value {
            ExprValue::Float(f) => Ok(*f),
            ExprValue::Int(i) => Ok(*i as f64),
            _ => Err(EvalexprError::expected_number(value.clone())),
        }
    }

    let functions: [(&str, Function); 8] = [
        (
            "abs",
            Function::new(|args| Ok(ExprValue::Float(to_f64(args)?.abs()))),
        ),
        (
            "sqrt",
            Function::new(|args| Ok(ExprValue::Float(to_f64(args)?.sqrt()))),
        ),
        (
            "sign",
            Function::new(|args| {
                let value = to_f64(args)?;
                Ok(ExprValue::Float(if value > 0.0 {
                    1.0
                } else if value < 0.0 {
                    -1.0
                } else {
                    0.0
                }))
            }),
        ),
        (
            "scale",
            Function::new(|args| {
                let tuple = args.as_fixed_len_tuple(2)?;
                Ok(ExprValue::Float(to_f64(&tuple[0])? * to_f64(&tuple[1])?))
            }),
        ),
        (
            "clamp",
            Function::new(|args| {
                let tuple = args.as_fixed_len_tuple(3)?;
                let (value, min, max) = (to_f64(&tuple[0])?, to_f64(&tuple[1])?, to_f64(&tuple[2])?);
                Ok(ExprValue::Float(value.max(min).min(max)))
            }),
        ),
        (
            "min",
            Function::new(|args| {
                let tuple = args.as_fixed_len_tuple(2)?;
                Ok(ExprValue::Float(to_f64(&tuple[0])?.min(to_f64(&tuple[1])?)))
            }),
        ),
        (
            "max",
            Function::new(|args| {
                let tuple = args.as_fixed_len_tuple(2)?;
                Ok(ExprValue::Float(to_f64(&tuple[0])?.max(to_f64(&tuple[1])?)))
            }),
        ),
        (
            // round(value) or round(value, decimals)
            "round",
            Function::new(|args| match args {
                ExprValue::Tuple(_) => {
                    let tuple = args.as_fixed_len_tuple(2)?;
                    let value = to_f64(&tuple[0])?;
                    let factor = 10f64.powi(tuple[1].as_int()? as i32);
                    Ok(ExprValue::Float((value * factor).round() / factor))
                },
                single => Ok(ExprValue::Float(to_f64(single)?.round())),
            }),
        ),
    ];

    for (name, function) in functions {
        context
            .set_function(name.to_string(), function)
            .map_err(|e| RelvalError::Evaluation(format!("Failed to register {}: {}", name, e)))?;
    }
    Ok(())
}

impl SummaryProgram {
    /// Compile the programs declared in transform `params`
    pub fn compile(params: &Params) -> Result<Self> {
        let program = Self {
            initial: compile(params, INITIAL_PROGRAM_PARAM)?,
            step: compile(params, STEP_PROGRAM_PARAM)?,
            finish: compile(params, FINAL_PROGRAM_PARAM)?,
        };
        if program.step.is_none() && program.finish.is_none() {
            return Err(RelvalError::missing_parameter(format!(
                "{} or {}",
                STEP_PROGRAM_PARAM, FINAL_PROGRAM_PARAM
            )));
        }
        Ok(program)
    }

    /// Run the programs over one interval
    pub fn run(&self, inputs: &ProgramInputs<'_>) -> Result<Option<Value>> {
        let mut context = HashMapContext::new();
        register_functions(&mut context)?;

        set(&mut context, "stamp", ExprValue::Float(inputs.stamp.to_seconds_f64()))?;
        set(&mut context, "steps", ExprValue::Int(inputs.steps.len() as i64))?;
        for (name, value) in [("start", inputs.start), ("stop", inputs.stop)] {
            let number = numeric(value);
            set(&mut context, name, ExprValue::Float(number.unwrap_or(0.0)))?;
            set(&mut context, &format!("{}_present", name), ExprValue::Boolean(number.is_some()))?;
        }
        for (index, input) in inputs.inputs.iter().enumerate() {
            let number = numeric(Some(input)).unwrap_or(0.0);
            set(&mut context, &format!("input{}", index + 1), ExprValue::Float(number))?;
        }

        if let Some(initial) = &self.initial {
            initial
                .eval_with_context_mut(&mut context)
                .map_err(evaluation_error)?;
        }

        if let Some(step) = &self.step {
            for (index, value) in inputs.steps.iter().enumerate() {
                let number = numeric(Some(value));
                set(&mut context, "step", ExprValue::Float(number.unwrap_or(0.0)))?;
                set(&mut context, "step_present", ExprValue::Boolean(number.is_some()))?;
                set(&mut context, "step_number", ExprValue::Int(index as i64 + 1))?;
                set(&mut context, "step_stamp", ExprValue::Float(stamp_seconds(value.stamp)))?;
                step.eval_with_context_mut(&mut context)
                    .map_err(evaluation_error)?;
            }
        }

        let value = match &self.finish {
            Some(finish) => finish
                .eval_with_context_mut(&mut context)
                .map_err(evaluation_error)?,
            None => context.get_value(RESULT_VARIABLE).cloned().ok_or_else(|| {
                RelvalError::Evaluation(format!("variable '{}' was never set", RESULT_VARIABLE))
            })?,
        };
        to_value(value)
    }
}
