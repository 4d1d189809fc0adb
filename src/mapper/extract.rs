use serde_json::Value;
use tracing::debug;

use super::{
    assemble::{LinkList, add_property},
    mapping::{ListLink, PropertyDefinition},
};
use crate::error::MetadataError;

/// Deepest `value` path the extractor will follow.
pub const MAX_PATH_DEPTH: usize = 64;

/// Follows `storage_keys` through `source` and inserts what it finds into
/// `new_schema` at `schema_property`.
///
/// Lists met on the way are resolved through `definition.list`: a target name
/// repeats the rest of the walk once per element, an index picks one element.
pub fn extract_and_insert_metadata(
    new_schema: &mut Value,
    source: &Value,
    schema_property: &str,
    definition: &PropertyDefinition,
    links: &LinkList,
    storage_keys: &[&str],
) -> Result<(), MetadataError> {
    if storage_keys.is_empty() || storage_keys.len() > MAX_PATH_DEPTH {
        return Err(MetadataError::MappingDefinition(format!(
            "storage path must have between 1 and {} keys ({})",
            MAX_PATH_DEPTH, schema_property
        )));
    }

    let extraction = Extraction {
        schema_property,
        definition,
        storage_keys,
    };
    extraction.walk(new_schema, source, links, 0)
}

struct Extraction<'a> {
    schema_property: &'a str,
    definition: &'a PropertyDefinition,
    storage_keys: &'a [&'a str],
}

impl Extraction<'_> {
    fn walk(
        &self,
        new_schema: &mut Value,
        source: &Value,
        links: &LinkList,
        start: usize,
    ) -> Result<(), MetadataError> {
        let last = self.storage_keys.len() - 1;
        let mut current = source;

        for index in start..last {
            let key = self.storage_keys[index];
            let prefix = self.prefix(index);

            let object = current
                .as_object()
                .ok_or_else(|| self.structure_error())?;
            let value = object.get(key).ok_or_else(|| self.key_error(key))?;

            current = match value {
                Value::Array(items) => match self.definition.list.get(&prefix) {
                    None => return Err(self.undefined_list_error(key)),
                    Some(ListLink::Target(name)) => {
                        return self.walk_each(new_schema, items, name, links, index + 1);
                    }
                    Some(ListLink::Index(position)) => items
                        .get(*position)
                        .ok_or_else(|| self.index_error(*position))?,
                },
                Value::Object(_) => {
                    if self.definition.list.contains_key(&prefix) {
                        return Err(MetadataError::MappingDefinition(format!(
                            "object '{}' is defined as a list ({})",
                            key, self.schema_property
                        )));
                    }
                    value
                }
                _ => return Err(self.structure_error()),
            };
        }

        self.insert_final(new_schema, current, links)
    }

    /// Runs the remaining walk once per list element, collecting missing keys.
    fn walk_each(
        &self,
        new_schema: &mut Value,
        items: &[Value],
        target: &str,
        links: &LinkList,
        next: usize,
    ) -> Result<(), MetadataError> {
        let mut missing = Vec::new();
        for (position, item) in items.iter().enumerate() {
            let mut item_links = links.clone();
            item_links.insert(target.to_string(), position + 1);

            match self.walk(new_schema, item, &item_links, next) {
                Ok(()) => {}
                Err(MetadataError::KeyNotFound(messages)) => missing.extend(messages),
                Err(e) => return Err(e),
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MetadataError::KeyNotFound(missing))
        }
    }

    fn insert_final(
        &self,
        new_schema: &mut Value,
        source: &Value,
        links: &LinkList,
    ) -> Result<(), MetadataError> {
        let final_key = self.storage_keys[self.storage_keys.len() - 1];
        let object = source.as_object().ok_or_else(|| self.structure_error())?;

        let Some(value) = object.get(final_key) else {
            debug!(
                "storage key {} is absent, inserting empty {}",
                final_key, self.schema_property
            );
            return self.add(new_schema, Vec::new(), links);
        };

        match value {
            Value::Array(items) => {
                let prefix = self.prefix(self.storage_keys.len() - 1);
                match self.definition.list.get(&prefix) {
                    Some(ListLink::Target(name)) => {
                        for (position, item) in items.iter().enumerate() {
                            let mut item_links = links.clone();
                            item_links.insert(name.clone(), position + 1);
                            self.add(new_schema, values_of(item), &item_links)?;
                        }
                        Ok(())
                    }
                    Some(ListLink::Index(position)) => {
                        let item = items
                            .get(*position)
                            .ok_or_else(|| self.index_error(*position))?;
                        self.add(new_schema, values_of(item), links)
                    }
                    None => {
                        let values = items.iter().filter(|v| !v.is_null()).cloned().collect();
                        self.add(new_schema, values, links)
                    }
                }
            }
            Value::Object(_) => Err(self.structure_error()),
            other => self.add(new_schema, values_of(other), links),
        }
    }

    fn add(
        &self,
        new_schema: &mut Value,
        values: Vec<Value>,
        links: &LinkList,
    ) -> Result<(), MetadataError> {
        add_property(
            new_schema,
            self.schema_property,
            self.definition.typ.as_deref(),
            values,
            links,
        )
    }

    fn prefix(&self, index: usize) -> String {
        self.storage_keys[..=index].join(".")
    }

    fn key_error(&self, key: &str) -> MetadataError {
        MetadataError::key_not_found(format!(
            "no storage key matching '{}' was found ({})",
            key, self.schema_property
        ))
    }

    fn structure_error(&self) -> MetadataError {
        MetadataError::MappingDefinition(format!(
            "the data structure differs from the definition ({})",
            self.schema_property
        ))
    }

    fn undefined_list_error(&self, key: &str) -> MetadataError {
        MetadataError::MappingDefinition(format!(
            "list '{}' is not fully defined ({})",
            key, self.schema_property
        ))
    }

    fn index_error(&self, position: usize) -> MetadataError {
        MetadataError::MappingDefinition(format!(
            "the specified index {} does not exist ({})",
            position, self.schema_property
        ))
    }
}

fn values_of(value: &Value) -> Vec<Value> {
    if value.is_null() {
        Vec::new()
    } else {
        vec![value.clone()]
    }
}
