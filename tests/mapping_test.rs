use std::{cell::Cell, path::PathBuf};

use anyhow::Result;
use dg_mm::{
    definition::DefinitionManager,
    error::MetadataError,
    grdm::{ProjectMetadataSelector, StorageAccess},
    mapper::{
        GrdmMapping, MappingRequest, StorageMapping,
        assemble::LinkList,
        extract::extract_and_insert_metadata,
        mapping::PropertyDefinition,
    },
};
use serde_json::{Value, json};

/// In-memory project served in place of the GRDM API.
struct FakeGrdm {
    project_info: Value,
    member_info: Value,
    project_metadata: Value,
    file_metadata: Value,
    authenticated: bool,
    fetches: Cell<usize>,
}

impl FakeGrdm {
    fn new() -> Self {
        Self {
            project_info: json!({
                "data": {
                    "id": "abc12",
                    "attributes": {
                        "title": "Ocean sampling",
                        "description": "Samples from 2023",
                        "category": "project",
                        "public": true,
                        "tags": ["ocean", "salinity"],
                        "date_created": "2023-04-01T00:00:00.000000",
                        "date_modified": "2024-01-10T12:00:00.000000"
                    },
                    "links": {"html": "https://rdm.nii.ac.jp/abc12/"}
                }
            }),
            member_info: json!({
                "data": [
                    {
                        "attributes": {"bibliographic": true, "permission": "admin"},
                        "embeds": {"users": {"data": {
                            "id": "u1",
                            "attributes": {
                                "full_name": "Alice",
                                "employment": [
                                    {"institution": "NII", "department": "RCOS"},
                                    {"institution": "Univ", "department": "Physics"}
                                ]
                            }
                        }}}
                    },
                    {
                        "attributes": {"bibliographic": false, "permission": "read"},
                        "embeds": {"users": {"data": {
                            "id": "u2",
                            "attributes": {"full_name": "Bob", "employment": []}
                        }}}
                    }
                ]
            }),
            project_metadata: json!({
                "data": {
                    "attributes": {
                        "registration_metadata": {
                            "funder": {"value": "JST"},
                            "program-name-ja": {"value": "Moonshot"},
                            "japan-grant-number": {"value": "JPMJ1234"},
                            "project-name-ja": {"value": "海洋"},
                            "project-name-en": {"value": "Ocean"},
                            "project-research-field": {"value": "189"}
                        }
                    }
                }
            }),
            file_metadata: json!({
                "data": {
                    "attributes": {
                        "files": [
                            {
                                "path": "osfstorage/samples.csv",
                                "items": [{
                                    "grdm-file:title-ja": {"value": "サンプル"},
                                    "grdm-file:data-type": {"value": "dataset"},
                                    "grdm-file:access-rights": {"value": "open access"}
                                }]
                            }
                        ]
                    }
                }
            }),
            authenticated: false,
            fetches: Cell::new(0),
        }
    }

    fn serve(&self, document: &Value) -> Result<Value, MetadataError> {
        if !self.authenticated {
            return Err(MetadataError::Unauthorized);
        }
        self.fetches.set(self.fetches.get() + 1);
        Ok(document.clone())
    }
}

impl StorageAccess for FakeGrdm {
    fn check_authentication(
        &mut self,
        token: &str,
        project_id: &str,
    ) -> Result<bool, MetadataError> {
        if token != "valid" {
            return Err(MetadataError::InvalidToken("bad token".to_string()));
        }
        if project_id != "abc12" {
            return Err(MetadataError::InvalidProject(project_id.to_string()));
        }
        self.authenticated = true;
        Ok(true)
    }

    fn get_project_info(&self) -> Result<Value, MetadataError> {
        self.serve(&self.project_info)
    }

    fn get_member_info(&self) -> Result<Value, MetadataError> {
        self.serve(&self.member_info)
    }

    fn get_project_metadata(
        &self,
        _selector: &ProjectMetadataSelector,
    ) -> Result<Value, MetadataError> {
        self.serve(&self.project_metadata)
    }

    fn get_file_metadata(&self) -> Result<Value, MetadataError> {
        self.serve(&self.file_metadata)
    }
}

fn request(schema: &str) -> MappingRequest {
    MappingRequest {
        schema: schema.to_string(),
        token: "valid".to_string(),
        project_id: "abc12".to_string(),
        ..Default::default()
    }
}

fn test_mapping_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/mapping")
}

#[test]
fn test_scalar_property() -> Result<()> {
    let definition: PropertyDefinition = serde_json::from_value(json!({
        "type": "string",
        "source": "profile",
        "value": "data.name"
    }))?;
    let mut schema = json!({});

    extract_and_insert_metadata(
        &mut schema,
        &json!({"data": {"name": "Alice"}}),
        "user.name",
        &definition,
        &LinkList::new(),
        &["data", "name"],
    )?;

    assert_eq!(schema, json!({"user": {"name": "Alice"}}));
    Ok(())
}

#[test]
fn test_list_correlation() -> Result<()> {
    let definition: PropertyDefinition = serde_json::from_value(json!({
        "type": "string",
        "source": "profile",
        "value": "items.v",
        "list": {"items": "tags"}
    }))?;
    let mut schema = json!({});

    extract_and_insert_metadata(
        &mut schema,
        &json!({"items": [{"v": "a"}, {"v": "b"}]}),
        "tags[].v",
        &definition,
        &LinkList::new(),
        &["items", "v"],
    )?;

    assert_eq!(schema, json!({"tags": [{"v": "a"}, {"v": "b"}]}));
    Ok(())
}

#[test]
fn test_missing_key_names_target() -> Result<()> {
    let definition: PropertyDefinition = serde_json::from_value(
        json!({"type": "string", "source": "profile", "value": "data.missing.leaf"}),
    )?;
    let mut schema = json!({});

    let err = extract_and_insert_metadata(
        &mut schema,
        &json!({"data": {"name": "Alice"}}),
        "x.y",
        &definition,
        &LinkList::new(),
        &["data", "missing", "leaf"],
    )
    .unwrap_err();

    assert!(matches!(err, MetadataError::KeyNotFound(_)));
    assert!(err.to_string().contains("(x.y)"));
    Ok(())
}

#[test]
fn test_definition_from_directory() -> Result<()> {
    let provider = DefinitionManager::new(Some(test_mapping_dir()));
    let mut grdm = FakeGrdm::new();
    grdm.member_info = json!({"data": [
        {"name": "Alice", "employment": [{"institution": "NII"}, {"institution": "Univ"}]},
        {"name": "Bob", "employment": [{"institution": "Lab"}]}
    ]});
    grdm.project_metadata = json!({"data": {"attributes": {"registration_metadata": {
        "grant-number": {"value": "42"}
    }}}});

    let mut mapping = GrdmMapping::new(grdm, provider);
    let result = mapping.mapping_metadata(&request("TEST"))?;

    assert_eq!(
        result,
        json!({
            "researcher": [
                {"email": [], "name": "Alice", "affiliation": [{"name": "NII"}, {"name": "Univ"}]},
                {"name": "Bob", "affiliation": [{"name": "Lab"}]}
            ],
            "title": "Ocean sampling",
            "grant": {"number": 42}
        })
    );
    assert_eq!(mapping.access().fetches.get(), 3);
    Ok(())
}

#[test]
fn test_filtered_request_fetches_only_needed_sources() -> Result<()> {
    let provider = DefinitionManager::new(Some(test_mapping_dir()));
    let mut mapping = GrdmMapping::new(FakeGrdm::new(), provider);

    let mut req = request("TEST");
    req.filter = Some(vec!["title".to_string()]);
    let result = mapping.mapping_metadata(&req)?;

    assert_eq!(result, json!({"title": "Ocean sampling"}));
    assert_eq!(mapping.access().fetches.get(), 1);
    Ok(())
}

#[test]
fn test_built_in_research_flow_definition() -> Result<()> {
    let mut mapping = GrdmMapping::new(FakeGrdm::new(), DefinitionManager::default());
    let result = mapping.mapping_metadata(&request("RF"))?;

    assert_eq!(
        result,
        json!({
            "researcher": [
                {
                    "email": [],
                    "id": "u1",
                    "name": "Alice",
                    "bibliographic": true,
                    "permission": "admin",
                    "affiliation": [
                        {"name": "NII", "department": "RCOS"},
                        {"name": "Univ", "department": "Physics"}
                    ]
                },
                {
                    "id": "u2",
                    "name": "Bob",
                    "bibliographic": false,
                    "permission": "read"
                }
            ],
            "file": [
                {
                    "size": null,
                    "path": "osfstorage/samples.csv",
                    "title": "サンプル",
                    "dataType": "dataset",
                    "accessRights": "open access"
                }
            ],
            "project": {
                "name": "Ocean sampling",
                "description": "Samples from 2023",
                "category": "project",
                "public": true,
                "keywords": ["ocean", "salinity"],
                "dateCreated": "2023-04-01T00:00:00.000000",
                "dateModified": "2024-01-10T12:00:00.000000",
                "url": "https://rdm.nii.ac.jp/abc12/"
            },
            "funder": {
                "name": "JST",
                "programName": "Moonshot",
                "projectNumber": "JPMJ1234",
                "projectNameJa": "海洋",
                "projectNameEn": "Ocean",
                "researchField": "189"
            },
            "dmp": {"dateCreated": null}
        })
    );
    assert_eq!(mapping.access().fetches.get(), 4);
    Ok(())
}

#[test]
fn test_invalid_project_stops_before_fetching() {
    let mut mapping = GrdmMapping::new(FakeGrdm::new(), DefinitionManager::default());
    let mut req = request("RF");
    req.project_id = "zzz99".to_string();

    let err = mapping.mapping_metadata(&req).unwrap_err();
    assert!(matches!(err, MetadataError::InvalidProject(_)));
    assert_eq!(mapping.access().fetches.get(), 0);
}

#[test]
fn test_unknown_schema_is_not_found() {
    let mut mapping = GrdmMapping::new(FakeGrdm::new(), DefinitionManager::default());
    let err = mapping.mapping_metadata(&request("UNKNOWN")).unwrap_err();
    assert!(matches!(err, MetadataError::MappingDefinitionNotFound { .. }));
}
