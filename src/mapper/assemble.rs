use std::collections::HashMap;

use serde_json::{Map, Value};

use super::convert::{ConvertError, convert};
use crate::error::MetadataError;

/// Target list name (bracket-stripped path such as `researcher.affiliation`)
/// -> 1-based position of the element currently being filled.
pub type LinkList = HashMap<String, usize>;

/// Places `values` at `schema_property` inside `new_schema`, creating the
/// objects and lists along the way.
pub fn add_property(
    new_schema: &mut Value,
    schema_property: &str,
    typ: Option<&str>,
    values: Vec<Value>,
    links: &LinkList,
) -> Result<(), MetadataError> {
    let definition_error = || {
        MetadataError::MappingDefinition(format!(
            "the mapping definition is incorrect ({})",
            schema_property
        ))
    };

    let segments: Vec<&str> = schema_property.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Err(definition_error());
    };

    let mut node = new_schema;
    let mut path = String::new();
    for segment in parents {
        let (key, is_list) = split_list_suffix(segment);
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(key);

        let object = node.as_object_mut().ok_or_else(definition_error)?;
        if is_list {
            let entry = object
                .entry(key)
                .or_insert_with(|| Value::Array(Vec::new()));
            let list = entry.as_array_mut().ok_or_else(definition_error)?;
            let index = match links.get(&path) {
                Some(&position) => {
                    while list.len() < position.max(1) {
                        list.push(Value::Object(Map::new()));
                    }
                    position.saturating_sub(1)
                }
                None => {
                    if list.is_empty() {
                        list.push(Value::Object(Map::new()));
                    } else if list.len() > 1 {
                        // more than one element and nothing says which one
                        return Err(definition_error());
                    }
                    0
                }
            };
            node = &mut list[index];
        } else {
            let entry = object
                .entry(key)
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                return Err(definition_error());
            }
            node = entry;
        }
    }

    let converted = if values.is_empty() {
        Vec::new()
    } else {
        convert(&values, typ).map_err(|e| match e {
            ConvertError::InvalidType(typ) => MetadataError::MappingDefinition(format!(
                "type:{} is not a valid type ({})",
                typ.as_deref().unwrap_or("null"),
                schema_property
            )),
            ConvertError::Mismatch { values, typ } => MetadataError::metadata_type(format!(
                "type conversion error: {} cannot be converted to {} ({})",
                values, typ, schema_property
            )),
        })?
    };

    let (key, is_list) = split_list_suffix(last);
    let object = node.as_object_mut().ok_or_else(definition_error)?;
    if is_list {
        let entry = object
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()));
        entry
            .as_array_mut()
            .ok_or_else(definition_error)?
            .extend(converted);
    } else {
        object.insert(
            key.to_string(),
            converted.into_iter().next().unwrap_or(Value::Null),
        );
    }

    Ok(())
}

/// `"name[]"` -> `("name", true)`, `"name"` -> `("name", false)`.
pub fn split_list_suffix(segment: &str) -> (&str, bool) {
    match segment.strip_suffix("[]") {
        Some(key) => (key, true),
        None => (segment, false),
    }
}
