use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
};

use serde::Serialize;
use serde_json::{Value, ser::PrettyFormatter};

#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("output directory does not exist: {0}")]
    MissingDirectory(String),

    #[error("output file already exists: {0}")]
    FileExists(String),

    #[error("could not write output: {0}")]
    Io(#[from] io::Error),

    #[error("could not serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pretty JSON with four-space indentation; non-ASCII text is written as is.
pub fn to_pretty_json(value: &Value) -> Result<String, OutputError> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buffer)
        .map_err(|e| OutputError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

pub fn print(value: &Value) -> Result<(), OutputError> {
    let text = to_pretty_json(value)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    Ok(())
}

/// Writes to a new file. The parent directory must exist and the file must not.
pub fn write_file(value: &Value, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(OutputError::MissingDirectory(parent.display().to_string()));
        }
    }

    let text = to_pretty_json(value)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => OutputError::FileExists(path.display().to_string()),
            _ => OutputError::Io(e),
        })?;
    file.write_all(text.as_bytes())?;
    Ok(())
}
