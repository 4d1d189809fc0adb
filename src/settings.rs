use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub grdm: GrdmSettings,
    pub mapping: MappingSettings,
    pub log: LogSettings,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GrdmSettings {
    pub api_url: String,
    pub web_api_url: String,
    pub timeout_secs: u64,
    /// Upper bound on requests spent following one paginated collection.
    pub max_requests: usize,
    pub page_size: usize,
}

impl Default for GrdmSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.rdm.nii.ac.jp/v2".to_string(),
            web_api_url: "https://rdm.nii.ac.jp/api/v1".to_string(),
            timeout_secs: 10,
            max_requests: 100,
            page_size: 100,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MappingSettings {
    /// Searched before the definitions built into the binary.
    pub dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            dir: None,
        }
    }
}

impl Settings {
    /// Reads `path`, or returns the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };

        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read config file {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("could not parse config file {:?}", path))
    }
}
