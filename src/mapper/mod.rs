pub mod assemble;
pub mod convert;
pub mod extract;
pub mod mapping;

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::{
    definition::DefinitionProvider,
    error::MetadataError,
    grdm::{self, MetadataSource, ProjectMetadataSelector, StorageAccess},
};
use assemble::{LinkList, add_property};
use extract::extract_and_insert_metadata;
use mapping::{MappingDefinition, PropertyDefinition};

/// One request to map a storage project onto a schema.
#[derive(Debug, Clone, Default)]
pub struct MappingRequest {
    pub schema: String,
    pub token: String,
    pub project_id: String,
    pub filter: Option<Vec<String>>,
    pub project_metadata: ProjectMetadataSelector,
}

/// Implemented once per supported storage.
pub trait StorageMapping {
    fn mapping_metadata(&mut self, request: &MappingRequest) -> Result<Value, MetadataError>;
}

pub struct GrdmMapping<A, P> {
    access: A,
    provider: P,
}

impl<A, P> GrdmMapping<A, P>
where
    A: StorageAccess,
    P: DefinitionProvider,
{
    pub fn new(access: A, provider: P) -> Self {
        Self { access, provider }
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    /// Fetches once every source a mapped property reads. Unknown names on
    /// any property are reported together after the known ones were fetched.
    fn fetch_sources(
        &self,
        definition: &MappingDefinition,
        selector: &ProjectMetadataSelector,
    ) -> Result<HashMap<String, Value>, MetadataError> {
        let mut documents = HashMap::new();
        let mut unknown = Vec::new();
        let needed = definition.metadata_sources();

        for name in definition.declared_sources() {
            let Ok(source) = name.parse::<MetadataSource>() else {
                unknown.push(name);
                continue;
            };
            if !needed.contains(&name) {
                continue;
            }

            info!("fetching {}", source);
            let document = source.fetch(&self.access, selector).inspect_err(|e| {
                error!("could not fetch {}: {}", source, e);
            })?;
            documents.insert(name.to_string(), document);
        }

        if !unknown.is_empty() {
            let err = MetadataError::MappingDefinition(format!(
                "unknown metadata source: {}",
                unknown.join(", ")
            ));
            error!("{}", err);
            return Err(err);
        }

        Ok(documents)
    }
}

impl<A, P> StorageMapping for GrdmMapping<A, P>
where
    A: StorageAccess,
    P: DefinitionProvider,
{
    fn mapping_metadata(&mut self, request: &MappingRequest) -> Result<Value, MetadataError> {
        if !self
            .access
            .check_authentication(&request.token, &request.project_id)?
        {
            return Err(MetadataError::AccessDenied(format!(
                "authentication failed for project {}",
                request.project_id
            )));
        }

        let definition = self
            .provider
            .get_and_filter_mapping_definition(
                &request.schema,
                grdm::STORAGE_NAME,
                request.filter.as_deref(),
            )
            .inspect_err(|e| error!("could not get mapping definition: {}", e))?;

        let documents = self.fetch_sources(&definition, &request.project_metadata)?;

        let mut new_schema = Value::Object(Map::new());
        let mut key_errors = Vec::new();
        let mut type_errors = Vec::new();

        for (property, property_definition) in definition.iter() {
            debug!("mapping {}", property);
            match map_property(&mut new_schema, property, property_definition, &documents) {
                Ok(()) => {}
                Err(MetadataError::KeyNotFound(messages)) => {
                    warn!("{}: {}", property, messages.join(", "));
                    key_errors.extend(messages);
                }
                Err(MetadataError::MetadataType(messages)) => {
                    warn!("{}: {}", property, messages.join(", "));
                    type_errors.extend(messages);
                }
                Err(e) => {
                    error!("{}: {}", property, e);
                    return Err(e);
                }
            }
        }

        match (key_errors.is_empty(), type_errors.is_empty()) {
            (true, true) => Ok(new_schema),
            (false, true) => Err(MetadataError::KeyNotFound(key_errors)),
            (true, false) => Err(MetadataError::MetadataType(type_errors)),
            (false, false) => Err(MetadataError::DataFormat {
                keys: key_errors,
                types: type_errors,
            }),
        }
    }
}

fn map_property(
    new_schema: &mut Value,
    property: &str,
    definition: &PropertyDefinition,
    documents: &HashMap<String, Value>,
) -> Result<(), MetadataError> {
    let Some(path) = definition.value.as_deref() else {
        return add_property(
            new_schema,
            property,
            definition.typ.as_deref(),
            Vec::new(),
            &LinkList::new(),
        );
    };

    let source = definition.source.as_deref().ok_or_else(|| {
        MetadataError::MappingDefinition(format!("no source is defined ({})", property))
    })?;
    let document = documents.get(source).ok_or_else(|| {
        MetadataError::MappingDefinition(format!(
            "source {} was not fetched ({})",
            source, property
        ))
    })?;

    let keys: Vec<&str> = path.split('.').collect();
    extract_and_insert_metadata(
        new_schema,
        document,
        property,
        definition,
        &LinkList::new(),
        &keys,
    )
}
