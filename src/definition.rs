use std::{
    fs,
    path::{Path, PathBuf},
};

use rust_embed::RustEmbed;
use tracing::{debug, info};

use crate::{error::MetadataError, mapper::mapping::MappingDefinition};

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/data/mapping/"]
struct MappingAssets;

/// Supplies the mapping definition for a (schema, storage) pair.
pub trait DefinitionProvider {
    /// `filter`: `None` keeps every property, otherwise only properties whose
    /// path starts with one of the given prefixes.
    fn get_and_filter_mapping_definition(
        &self,
        schema: &str,
        storage: &str,
        filter: Option<&[String]>,
    ) -> Result<MappingDefinition, MetadataError>;
}

/// Reads definitions from an override directory first, then from the ones
/// built into the binary.
#[derive(Debug, Clone, Default)]
pub struct DefinitionManager {
    dir: Option<PathBuf>,
}

impl DefinitionManager {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn get_mapping_definition(
        &self,
        schema: &str,
        storage: &str,
    ) -> Result<MappingDefinition, MetadataError> {
        let not_found = || MetadataError::MappingDefinitionNotFound {
            schema: schema.to_string(),
            storage: storage.to_string(),
        };

        let name = definition_file_name(schema, storage);
        if name.contains(['/', '\\']) || name.contains("..") {
            return Err(not_found());
        }

        if let Some(dir) = &self.dir {
            let path = dir.join(&name);
            if path.is_file() {
                info!("reading mapping definition {:?}", path);
                return read_definition_file(&path);
            }
        }

        let file = MappingAssets::get(&name).ok_or_else(not_found)?;
        debug!("using built-in mapping definition {}", name);
        parse_definition(&file.data, &name)
    }
}

impl DefinitionProvider for DefinitionManager {
    fn get_and_filter_mapping_definition(
        &self,
        schema: &str,
        storage: &str,
        filter: Option<&[String]>,
    ) -> Result<MappingDefinition, MetadataError> {
        let definition = self.get_mapping_definition(schema, storage)?;
        match filter {
            None => Ok(definition),
            Some(filter) => filter_mapping_definition(definition, filter),
        }
    }
}

pub fn definition_file_name(schema: &str, storage: &str) -> String {
    format!("{}_{}_mapping.json", storage, schema)
}

fn read_definition_file(path: &Path) -> Result<MappingDefinition, MetadataError> {
    let bytes = fs::read(path).map_err(|e| {
        MetadataError::MappingDefinition(format!(
            "could not read mapping definition {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_definition(&bytes, &path.display().to_string())
}

fn parse_definition(bytes: &[u8], name: &str) -> Result<MappingDefinition, MetadataError> {
    serde_json::from_slice(bytes).map_err(|e| {
        MetadataError::MappingDefinition(format!(
            "could not parse mapping definition {}: {}",
            name, e
        ))
    })
}

/// Keeps the properties whose path starts with any of `filter`. `[]` markers
/// are ignored on both sides, so `researcher.name` selects `researcher[].name`.
pub fn filter_mapping_definition(
    definition: MappingDefinition,
    filter: &[String],
) -> Result<MappingDefinition, MetadataError> {
    if filter.is_empty() {
        return Err(MetadataError::key_not_found("no properties were specified"));
    }

    let prefixes: Vec<String> = filter.iter().map(|f| strip_list_markers(f)).collect();
    let mut matched = vec![false; prefixes.len()];

    let filtered: MappingDefinition = definition
        .properties
        .into_iter()
        .filter(|(key, _)| {
            let key = strip_list_markers(key);
            let mut keep = false;
            for (i, prefix) in prefixes.iter().enumerate() {
                if key.starts_with(prefix.as_str()) {
                    matched[i] = true;
                    keep = true;
                }
            }
            keep
        })
        .collect();

    let unmatched: Vec<&str> = filter
        .iter()
        .zip(&matched)
        .filter(|(_, found)| !**found)
        .map(|(f, _)| f.as_str())
        .collect();
    if !unmatched.is_empty() {
        return Err(MetadataError::key_not_found(format!(
            "no property matches the specified filter: {}",
            unmatched.join(", ")
        )));
    }

    Ok(filtered)
}

fn strip_list_markers(path: &str) -> String {
    path.replace("[]", "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn sample() -> MappingDefinition {
        serde_json::from_str(
            r#"{
                "title": {
                    "type": "string", "source": "project_info", "value": "data.attributes.title"
                },
                "researcher[].name": {
                    "type": "string", "source": "member_info", "value": "data.name",
                    "list": {"data": "researcher"}
                },
                "researcher[].affiliation[].name": {"type": "string", "value": null},
                "file[].path": {"type": "string", "value": null}
            }"#,
        )
        .unwrap()
    }

    fn keys(definition: &MappingDefinition) -> Vec<&str> {
        definition.iter().map(|(k, _)| k.as_str()).collect()
    }

    #[test]
    fn test_filter_by_prefix_ignores_list_markers() {
        let filtered =
            filter_mapping_definition(sample(), &["researcher".to_string()]).unwrap();
        assert_eq!(
            keys(&filtered),
            vec!["researcher[].name", "researcher[].affiliation[].name"]
        );

        let filtered =
            filter_mapping_definition(sample(), &["researcher[].affiliation".to_string()]).unwrap();
        assert_eq!(keys(&filtered), vec!["researcher[].affiliation[].name"]);
    }

    #[test]
    fn test_filter_keeps_definition_order() {
        let filtered = filter_mapping_definition(
            sample(),
            &["file".to_string(), "title".to_string()],
        )
        .unwrap();
        assert_eq!(keys(&filtered), vec!["title", "file[].path"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = vec!["researcher".to_string(), "title".to_string()];
        let once = filter_mapping_definition(sample(), &filter).unwrap();
        let twice = filter_mapping_definition(once.clone(), &filter).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_filter_is_key_error() {
        let err = filter_mapping_definition(sample(), &[]).unwrap_err();
        assert!(matches!(err, MetadataError::KeyNotFound(_)));
    }

    #[test]
    fn test_unmatched_filters_are_reported_together() {
        let err = filter_mapping_definition(
            sample(),
            &["title".to_string(), "nothing".to_string(), "missing".to_string()],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no property matches the specified filter: nothing, missing"
        );
    }

    #[test]
    fn test_override_dir_takes_precedence() {
        let dir = TempDir::new("dg-mm-tests").unwrap();
        fs::write(
            dir.path().join("GRDM_RF_mapping.json"),
            r#"{"only": {"type": "string", "value": null}}"#,
        )
        .unwrap();

        let manager = DefinitionManager::new(Some(dir.path().to_path_buf()));
        let definition = manager.get_mapping_definition("RF", "GRDM").unwrap();
        assert_eq!(keys(&definition), vec!["only"]);
    }

    #[test]
    fn test_falls_back_to_built_in_definition() {
        let dir = TempDir::new("dg-mm-tests").unwrap();
        let manager = DefinitionManager::new(Some(dir.path().to_path_buf()));
        let definition = manager.get_mapping_definition("RF", "GRDM").unwrap();
        assert!(!definition.is_empty());
    }

    #[test]
    fn test_unknown_schema_is_not_found() {
        let err = DefinitionManager::default()
            .get_mapping_definition("NOPE", "GRDM")
            .unwrap_err();
        assert!(matches!(err, MetadataError::MappingDefinitionNotFound { .. }));
    }

    #[test]
    fn test_path_like_names_are_not_found() {
        let err = DefinitionManager::default()
            .get_mapping_definition("../RF", "GRDM")
            .unwrap_err();
        assert!(matches!(err, MetadataError::MappingDefinitionNotFound { .. }));
    }

    #[test]
    fn test_broken_file_is_definition_error() {
        let dir = TempDir::new("dg-mm-tests").unwrap();
        fs::write(dir.path().join("GRDM_BAD_mapping.json"), "{ not json").unwrap();

        let manager = DefinitionManager::new(Some(dir.path().to_path_buf()));
        let err = manager.get_mapping_definition("BAD", "GRDM").unwrap_err();
        assert!(matches!(err, MetadataError::MappingDefinition(_)));
    }
}
