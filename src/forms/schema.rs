use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

const BUILTIN_SCHEMA: &str = include_str!("screening.json");

/// Kinds of question a form can contain. Each kind has a widget in the
/// [`FieldRegistry`](super::fields::FieldRegistry).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Radio,
    Text,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub name: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub pattern: Option<FieldPattern>,
}

fn default_required() -> bool {
    true
}

/// Answer format for a text field, compiled when the schema is loaded.
#[derive(Clone, Debug)]
pub struct FieldPattern(Regex);

impl FieldPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for FieldPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for FieldPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(|err| de::Error::custom(format!("invalid pattern '{raw}': {err}")))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FormSection {
    pub label: String,
    pub subsections: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormSchema {
    sections: Vec<FormSection>,
    fields: HashMap<String, Vec<FieldDefinition>>,
}

impl FormSchema {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_SCHEMA).context("built-in form schema is invalid")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read form schema {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid form schema {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let schema: Self = serde_json::from_str(raw).context("failed to parse form schema")?;
        schema.check()?;
        Ok(schema)
    }

    pub fn sections(&self) -> &[FormSection] {
        &self.sections
    }

    /// Fields of `subsection`, empty when the schema has no entry for it.
    pub fn fields(&self, subsection: &str) -> &[FieldDefinition] {
        self.fields
            .get(subsection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_subsection(&self, subsection: &str) -> bool {
        self.fields.contains_key(subsection)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.values().flatten().find(|field| field.name == name)
    }

    fn check(&self) -> Result<()> {
        let mut names = HashSet::new();
        for (subsection, fields) in &self.fields {
            for field in fields {
                if field.name.trim().is_empty() {
                    bail!("field '{}' in '{subsection}' has no name", field.label);
                }
                if !names.insert(field.name.as_str()) {
                    bail!("field name '{}' is used more than once", field.name);
                }
                if field.kind == FieldKind::Radio && field.options.is_empty() {
                    bail!("radio field '{}' has no options", field.name);
                }
            }
        }
        Ok(())
    }
}
