use serde_json::Value;
use tracing::info;

use crate::{
    definition::DefinitionManager,
    error::MetadataError,
    grdm::{self, GrdmAccess, ProjectMetadataSelector},
    mapper::{GrdmMapping, MappingRequest, StorageMapping},
    settings::Settings,
};

#[derive(Debug, Clone, Default)]
pub struct GetMetadataParams {
    pub schema: String,
    pub storage: String,
    pub token: Option<String>,
    pub project_id: Option<String>,
    pub filter: Option<Vec<String>>,
    pub project_metadata: ProjectMetadataSelector,
}

/// Entry point: picks the mapping for the requested storage and runs it.
pub struct MetadataManager {
    settings: Settings,
}

impl MetadataManager {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn get_metadata(&self, params: GetMetadataParams) -> Result<Value, MetadataError> {
        let mut mapping = self.storage_mapping(&params.storage)?;
        let request = mapping_request(params)?;
        info!(
            "mapping project {} onto schema {}",
            request.project_id, request.schema
        );
        mapping.mapping_metadata(&request)
    }

    fn storage_mapping(&self, storage: &str) -> Result<Box<dyn StorageMapping>, MetadataError> {
        match storage {
            grdm::STORAGE_NAME => {
                let access = GrdmAccess::new(&self.settings.grdm)?;
                let provider = DefinitionManager::new(self.settings.mapping.dir.clone());
                Ok(Box::new(GrdmMapping::new(access, provider)))
            }
            other => Err(MetadataError::InvalidStorage(other.to_string())),
        }
    }
}

fn mapping_request(params: GetMetadataParams) -> Result<MappingRequest, MetadataError> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MetadataError::InvalidToken("no token was given".to_string()))?;
    let project_id = params
        .project_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| MetadataError::InvalidProject("no project id was given".to_string()))?;

    Ok(MappingRequest {
        schema: params.schema,
        token,
        project_id,
        filter: params.filter,
        project_metadata: params.project_metadata,
    })
}
