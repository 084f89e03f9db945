//! Variable Descriptors - one configurable factory input
//!
//! Descriptors are hydrated once from configuration and never change.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const ID: &str = "id";
pub const ANNOTATIONS: &str = "annotations";
pub const BRANCH: &str = "branch";

/// Identifiers with built-in defaults.
pub const RESERVED_IDENTIFIERS: [&str; 3] = [ID, ANNOTATIONS, BRANCH];

pub fn is_reserved(identifier: &str) -> bool {
    RESERVED_IDENTIFIERS.contains(&identifier)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactoryVariable {
    identifier: String,
    title: Option<String>,
    description: String,
    default: Option<String>,
    valid_values: Option<Vec<String>>,
    required: bool,
    hidden: bool,
    #[serde(rename = "type")]
    kind: String,
}

impl FactoryVariable {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: None,
            description: String::new(),
            default: None,
            valid_values: None,
            required: false,
            hidden: false,
            kind: default_kind(),
        }
    }

    /// Build a descriptor from configuration, layered over `base` when the
    /// identifier carries built-in defaults.
    pub(crate) fn from_raw(identifier: &str, raw: RawVariable, base: Option<&FactoryVariable>) -> Self {
        let mut variable = base.cloned().unwrap_or_else(|| Self::new(identifier));
        variable.identifier = identifier.to_string();

        if let Some(title) = raw.title {
            variable.title = Some(title);
        }
        if let Some(description) = raw.description {
            variable.description = description;
        }
        if raw.default.is_some() {
            variable.default = raw.default;
        }
        if raw.valid_values.is_some() {
            variable.valid_values = raw.valid_values;
        }
        if let Some(required) = raw.required {
            variable.required = required;
        }
        if let Some(hidden) = raw.hidden {
            variable.hidden = hidden;
        }
        if let Some(kind) = raw.kind {
            variable.kind = kind;
        }
        variable
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Explicit title, or the identifier with its first letter capitalized.
    pub fn title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => capitalize(&self.identifier),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn valid_values(&self) -> Option<&[String]> {
        self.valid_values.as_deref()
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

fn default_kind() -> String {
    "string".to_string()
}

/// First character upper-cased, the rest lower-cased.
pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Defaults for `id`, `annotations` and `branch`.
#[derive(Debug, Clone)]
pub struct ReservedVariables {
    id: FactoryVariable,
    annotations: FactoryVariable,
    branch: FactoryVariable,
}

impl ReservedVariables {
    pub fn new(id: FactoryVariable, annotations: FactoryVariable, branch: FactoryVariable) -> Self {
        Self { id, annotations, branch }
    }

    pub fn get(&self, identifier: &str) -> Option<&FactoryVariable> {
        match identifier {
            ID => Some(&self.id),
            ANNOTATIONS => Some(&self.annotations),
            BRANCH => Some(&self.branch),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FactoryVariable> {
        [&self.id, &self.annotations, &self.branch].into_iter()
    }
}

impl Default for ReservedVariables {
    fn default() -> Self {
        Self {
            id: FactoryVariable::new(ID).with_title("Resource Identifier"),
            annotations: FactoryVariable::new(ANNOTATIONS)
                .with_title("Annotations")
                .with_description("Additional annotations")
                .with_kind("object"),
            branch: FactoryVariable::new(BRANCH)
                .with_title("Policy Branch")
                .with_description("Policy branch to apply this policy into"),
        }
    }
}

/// Per-variable attributes exactly as they appear in configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawVariable {
    #[serde(default, deserialize_with = "loose::string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose::string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose::string")]
    pub default: Option<String>,
    #[serde(default, alias = "valid-values", deserialize_with = "loose::string_list")]
    pub valid_values: Option<Vec<String>>,
    #[serde(default, deserialize_with = "loose::boolean")]
    pub required: Option<bool>,
    #[serde(default, deserialize_with = "loose::boolean")]
    pub hidden: Option<bool>,
    #[serde(default, rename = "type", deserialize_with = "loose::string")]
    pub kind: Option<String>,
}

/// Coercions for hand-written JSON, applied once at the edge.
pub(crate) mod loose {
    use super::*;
    use serde::de::Error;

    pub fn boolean<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(D::Error::custom(format!("expected a boolean, found \"{}\"", s))),
            },
            other => Err(D::Error::custom(format!("expected a boolean, found {}", other))),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        scalar(&value).map_err(D::Error::custom)
    }

    pub fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in &items {
                    match scalar(item).map_err(D::Error::custom)? {
                        Some(v) => values.push(v),
                        None => return Err(D::Error::custom("list entries cannot be null")),
                    }
                }
                Ok(Some(values))
            }
            single => scalar(&single).map(|v| v.map(|s| vec![s])).map_err(D::Error::custom),
        }
    }

    fn scalar(value: &Value) -> Result<Option<String>, String> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(format!("expected a string, found {}", other)),
        }
    }
}
