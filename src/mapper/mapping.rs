use std::{collections::HashMap, fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Target property path -> how to source it, in file order.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct MappingDefinition {
    pub properties: IndexMap<String, PropertyDefinition>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct PropertyDefinition {
    /// Kept as written so an unknown type only fails once data has to be converted.
    #[serde(rename = "type", default)]
    pub typ: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub value: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub list: HashMap<String, ListLink>,
}

// `"list": null` reads like an absent `list`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, ListLink>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, ListLink>>::deserialize(deserializer)?.unwrap_or_default())
}

/// How a list in the source document is tied to the target schema.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ListLink {
    /// Pick a single element of the source list.
    Index(usize),
    /// Walk the source list in lockstep with the named target list.
    Target(String),
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    String,
    Boolean,
    Number,
}

impl FromStr for PropertyType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(PropertyType::String),
            "boolean" => Ok(PropertyType::Boolean),
            "number" => Ok(PropertyType::Number),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::String => "string",
            PropertyType::Boolean => "boolean",
            PropertyType::Number => "number",
        };
        f.write_str(name)
    }
}

impl MappingDefinition {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyDefinition)> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Distinct `source` names of the properties that map a `value`, in the
    /// order they first appear. These are the documents worth fetching.
    pub fn metadata_sources(&self) -> Vec<&str> {
        distinct_sources(self.properties.values().filter(|d| d.value.is_some()))
    }

    /// Distinct `source` names of every property, mapped or not.
    pub fn declared_sources(&self) -> Vec<&str> {
        distinct_sources(self.properties.values())
    }
}

fn distinct_sources<'a>(
    definitions: impl Iterator<Item = &'a PropertyDefinition>,
) -> Vec<&'a str> {
    let mut sources: Vec<&str> = Vec::new();
    for definition in definitions {
        if let Some(source) = definition.source.as_deref() {
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
    }
    sources
}

impl FromIterator<(String, PropertyDefinition)> for MappingDefinition {
    fn from_iter<T: IntoIterator<Item = (String, PropertyDefinition)>>(iter: T) -> Self {
        MappingDefinition {
            properties: iter.into_iter().collect(),
        }
    }
}
