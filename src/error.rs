use thiserror::Error;

/// Every failure the metadata manager reports to its callers.
///
/// `KeyNotFound` and `MetadataType` carry a list of messages because the
/// mapping driver batches them across properties before reporting.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("mapping definition not found (schema: {schema}, storage: {storage})")]
    MappingDefinitionNotFound { schema: String, storage: String },

    #[error("{0}")]
    MappingDefinition(String),

    #[error("{}", join_messages("storage keys did not match", .0))]
    KeyNotFound(Vec<String>),

    #[error("{}", join_messages("data conversion failed", .0))]
    MetadataType(Vec<String>),

    #[error(
        "{}, {}",
        list_messages("storage keys did not match", .keys),
        list_messages("data conversion failed", .types)
    )]
    DataFormat {
        keys: Vec<String>,
        types: Vec<String>,
    },

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("insufficient token scope: {0}")]
    InsufficientScope(String),

    #[error("invalid project: {0}")]
    InvalidProject(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("storage access attempted before authentication")]
    Unauthorized,

    #[error("unsupported storage: {0}")]
    InvalidStorage(String),

    #[error("metadata not found: {0}")]
    MetadataNotFound(String),
}

impl MetadataError {
    pub fn key_not_found(message: impl Into<String>) -> Self {
        MetadataError::KeyNotFound(vec![message.into()])
    }

    pub fn metadata_type(message: impl Into<String>) -> Self {
        MetadataError::MetadataType(vec![message.into()])
    }
}

// A lone message reads as-is; batches get a heading.
fn join_messages(heading: &str, messages: &[String]) -> String {
    match messages {
        [single] => single.clone(),
        _ => list_messages(heading, messages),
    }
}

fn list_messages(heading: &str, messages: &[String]) -> String {
    format!("{}: [{}]", heading, messages.join(", "))
}
