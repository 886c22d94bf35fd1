//! Built-in arithmetic stages.
//!
//! All of them read and write the [`PASSTHROUGH`] key. Integer inputs stay
//! integers (with overflow reported as an error); any float operand makes the
//! result a float.
//!
//! | stage            | reads                      | default |
//! |------------------|----------------------------|---------|
//! | `add_value`      | `value`                    | 1       |
//! | `subtract_value` | `value`                    | 3       |
//! | `multiply_value` | `m`                        | 1       |
//! | `square_value`   | -                          | -       |
//! | `identity`       | -                          | -       |

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::payload::{Payload, Value, PASSTHROUGH};
use crate::pipeline::pipe::StageArgs;

/// `passthrough += value`
pub fn add_value(args: &StageArgs<'_>) -> PipelineResult<Payload> {
    let value = number_arg(args, "value", Value::Int(1))?;
    let current = number_in_payload(args, Value::Int(0))?;
    let sum = combine(&current, &value, i64::checked_add, |a, b| a + b)?;
    Ok(with_passthrough(args, sum))
}

/// `passthrough -= value`
pub fn subtract_value(args: &StageArgs<'_>) -> PipelineResult<Payload> {
    let value = number_arg(args, "value", Value::Int(3))?;
    let current = number_in_payload(args, Value::Int(0))?;
    let diff = combine(&current, &value, i64::checked_sub, |a, b| a - b)?;
    Ok(with_passthrough(args, diff))
}

/// `passthrough *= m`
pub fn multiply_value(args: &StageArgs<'_>) -> PipelineResult<Payload> {
    let factor = number_arg(args, "m", Value::Int(1))?;
    let current = number_in_payload(args, Value::Int(1))?;
    let product = combine(&current, &factor, i64::checked_mul, |a, b| a * b)?;
    Ok(with_passthrough(args, product))
}

/// `passthrough *= passthrough`
pub fn square_value(args: &StageArgs<'_>) -> PipelineResult<Payload> {
    let current = number_in_payload(args, Value::Int(0))?;
    let squared = combine(&current, &current, i64::checked_mul, |a, b| a * b)?;
    Ok(with_passthrough(args, squared))
}

/// Returns the payload unchanged.
pub fn identity(args: &StageArgs<'_>) -> PipelineResult<Payload> {
    Ok(args.payload().clone())
}

fn with_passthrough(args: &StageArgs<'_>, value: Value) -> Payload {
    args.payload().clone().with(PASSTHROUGH, value)
}

fn number_arg(args: &StageArgs<'_>, key: &str, default: Value) -> PipelineResult<Value> {
    match args.get(key) {
        None => Ok(default),
        Some(v) if v.is_number() => Ok(v.clone()),
        Some(_) => Err(PipelineError::InvalidArgument {
            key: key.to_string(),
            expected: "number",
        }),
    }
}

fn number_in_payload(args: &StageArgs<'_>, default: Value) -> PipelineResult<Value> {
    match args.payload().get(PASSTHROUGH) {
        None | Some(Value::Null) => Ok(default),
        Some(v) if v.is_number() => Ok(v.clone()),
        Some(_) => Err(PipelineError::InvalidArgument {
            key: PASSTHROUGH.to_string(),
            expected: "number",
        }),
    }
}

fn combine(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> PipelineResult<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int_op(*x, *y).map(Value::Int).ok_or_else(|| {
            PipelineError::InvalidArgument {
                key: PASSTHROUGH.to_string(),
                expected: "a result within the 64-bit integer range",
            }
        }),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Ok(Value::Float(float_op(x, y))),
            _ => Err(PipelineError::InvalidArgument {
                key: PASSTHROUGH.to_string(),
                expected: "number",
            }),
        },
    }
}
