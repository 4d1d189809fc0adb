mod client;

use std::{fmt, str::FromStr};

use serde_json::Value;

use crate::error::MetadataError;

pub use client::GrdmAccess;

/// Storage name requests use to select GRDM.
pub const STORAGE_NAME: &str = "GRDM";

/// Access to the raw documents a GRDM project exposes.
///
/// Every fetch method fails with [`MetadataError::Unauthorized`] until
/// `check_authentication` has succeeded.
pub trait StorageAccess {
    fn check_authentication(&mut self, token: &str, project_id: &str)
    -> Result<bool, MetadataError>;

    fn get_project_info(&self) -> Result<Value, MetadataError>;

    fn get_member_info(&self) -> Result<Value, MetadataError>;

    fn get_project_metadata(
        &self,
        selector: &ProjectMetadataSelector,
    ) -> Result<Value, MetadataError>;

    fn get_file_metadata(&self) -> Result<Value, MetadataError>;
}

/// Which draft registration provides the project metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProjectMetadataSelector {
    #[default]
    Newest,
    Id(String),
    Title(String),
}

/// The documents a mapping definition can name in its `source` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataSource {
    ProjectInfo,
    MemberInfo,
    ProjectMetadata,
    FileMetadata,
}

impl MetadataSource {
    pub fn name(&self) -> &'static str {
        match self {
            MetadataSource::ProjectInfo => "project_info",
            MetadataSource::MemberInfo => "member_info",
            MetadataSource::ProjectMetadata => "project_metadata",
            MetadataSource::FileMetadata => "file_metadata",
        }
    }

    pub fn fetch<A: StorageAccess + ?Sized>(
        &self,
        access: &A,
        selector: &ProjectMetadataSelector,
    ) -> Result<Value, MetadataError> {
        match self {
            MetadataSource::ProjectInfo => access.get_project_info(),
            MetadataSource::MemberInfo => access.get_member_info(),
            MetadataSource::ProjectMetadata => access.get_project_metadata(selector),
            MetadataSource::FileMetadata => access.get_file_metadata(),
        }
    }
}

impl FromStr for MetadataSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project_info" => Ok(MetadataSource::ProjectInfo),
            "member_info" => Ok(MetadataSource::MemberInfo),
            "project_metadata" => Ok(MetadataSource::ProjectMetadata),
            "file_metadata" => Ok(MetadataSource::FileMetadata),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
