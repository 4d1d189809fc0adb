use serde_json::{Number, Value};

use super::mapping::PropertyType;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConvertError {
    #[error("type:{0:?} is not a valid type")]
    InvalidType(Option<String>),

    #[error("{values} cannot be converted to {typ}")]
    Mismatch { values: String, typ: PropertyType },
}

/// Converts raw storage values into the declared schema type.
///
/// One value that does not fit fails the whole batch.
pub fn convert(values: &[Value], declared_type: Option<&str>) -> Result<Vec<Value>, ConvertError> {
    let typ: PropertyType = declared_type
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| ConvertError::InvalidType(declared_type.map(str::to_string)))?;

    values
        .iter()
        .map(|value| convert_value(value, typ))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ConvertError::Mismatch {
            values: Value::Array(values.to_vec()).to_string(),
            typ,
        })
}

fn convert_value(value: &Value, typ: PropertyType) -> Option<Value> {
    match typ {
        PropertyType::String => Some(Value::String(text_of(value))),
        PropertyType::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
            _ => None,
        },
        PropertyType::Number => {
            let text = text_of(value);
            let text = text.trim();
            if text.contains('.') {
                let float: f64 = text.parse().ok()?;
                Number::from_f64(float).map(Value::Number)
            } else if let Ok(int) = text.parse::<i64>() {
                Some(Value::from(int))
            } else {
                text.parse::<u64>().ok().map(Value::from)
            }
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
