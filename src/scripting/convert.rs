//! Conversions between payload values and Rhai `Dynamic`s.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::payload::{Payload, Value};
use rhai::{Array, Dynamic, Map};

pub fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from_bool(*b),
        Value::Int(i) => Dynamic::from_int(*i),
        Value::Float(f) => Dynamic::from_float(*f),
        Value::String(s) => Dynamic::from(s.clone()),
        Value::List(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
        Value::Map(payload) => payload_to_dynamic(payload),
    }
}

pub fn payload_to_dynamic(payload: &Payload) -> Dynamic {
    let map: Map = payload
        .iter()
        .map(|(k, v)| (k.as_str().into(), to_dynamic(v)))
        .collect();
    Dynamic::from_map(map)
}

/// Convert a script value back into a payload value.
///
/// Unit maps to `Null` and chars become one-character strings. Values with no
/// payload counterpart (custom types, function pointers, blobs...) are a
/// contract violation.
pub fn from_dynamic(value: Dynamic) -> PipelineResult<Value> {
    let value = value.flatten();

    if value.is_unit() {
        return Ok(Value::Null);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Ok(Value::Int(i));
    }
    if let Ok(f) = value.as_float() {
        return Ok(Value::Float(f));
    }
    if let Ok(c) = value.as_char() {
        return Ok(Value::String(c.to_string()));
    }

    let type_name = value.type_name();
    if value.is_string() {
        return value
            .into_string()
            .map(Value::String)
            .map_err(unsupported);
    }
    if value.is_array() {
        let items: Array = value.into_array().map_err(unsupported)?;
        return items
            .into_iter()
            .map(from_dynamic)
            .collect::<PipelineResult<Vec<_>>>()
            .map(Value::List);
    }
    if value.is_map() {
        return value
            .try_cast::<Map>()
            .ok_or_else(|| unsupported(type_name))
            .and_then(map_to_payload)
            .map(Value::Map);
    }

    Err(unsupported(type_name))
}

/// Convert a script result that must be a map into a payload.
pub fn payload_from_dynamic(value: Dynamic) -> PipelineResult<Payload> {
    let value = value.flatten();
    if !value.is_map() {
        return Err(PipelineError::ContractViolation(format!(
            "stage returned {} instead of a map",
            describe(&value)
        )));
    }
    let type_name = value.type_name();
    value
        .try_cast::<Map>()
        .ok_or_else(|| unsupported(type_name))
        .and_then(map_to_payload)
}

fn map_to_payload(map: Map) -> PipelineResult<Payload> {
    map.into_iter()
        .map(|(k, v)| from_dynamic(v).map(|v| (k.to_string(), v)))
        .collect::<PipelineResult<Vec<_>>>()
        .map(|pairs| pairs.into_iter().collect())
}

fn describe(value: &Dynamic) -> String {
    if value.is_unit() {
        "()".to_string()
    } else {
        value.type_name().to_string()
    }
}

fn unsupported(type_name: &str) -> PipelineError {
    PipelineError::ContractViolation(format!(
        "script value of type '{}' cannot be stored in a payload",
        type_name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_values_survive_conversion() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Int(-4),
            Value::Float(2.5),
            Value::from("text"),
        ] {
            assert_eq!(from_dynamic(to_dynamic(&value)).unwrap(), value);
        }
    }

    #[test]
    fn test_nested_payload() {
        let inner = Payload::from([("x", 1)]);
        let payload = Payload::new()
            .with("inner", inner)
            .with("list", vec![Value::Int(1), Value::from("two")]);

        let back = payload_from_dynamic(payload_to_dynamic(&payload)).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_non_map_result_is_contract_violation() {
        let err = payload_from_dynamic(Dynamic::UNIT).unwrap_err();
        assert!(matches!(err, PipelineError::ContractViolation(ref m) if m.contains("()")));

        let err = payload_from_dynamic(Dynamic::from_int(3)).unwrap_err();
        assert!(matches!(err, PipelineError::ContractViolation(_)));
    }

    #[test]
    fn test_char_becomes_string() {
        assert_eq!(
            from_dynamic(Dynamic::from_char('z')).unwrap(),
            Value::from("z")
        );
    }
}
