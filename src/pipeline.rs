//! Compilation Pipeline - Single Entry Point
//!
//! Every artifact goes through normalization first. Schema and template
//! are only ever generated from a validated configuration.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::catalog::PolicyTypeCatalog;
use crate::configuration::FactoryConfiguration;
use crate::diagnostics::ConfigurationWarning;
use crate::hashing::compute_bundle_fingerprint;
use crate::variable::{capitalize, ReservedVariables};
use crate::{schema, template};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("A factory cannot define 'policy-type' and include a policy.yml template. Please choose one or the other.")]
    ConfigurationConflict,

    #[error("No policy template found (and policy-type was not set).")]
    MissingTemplate,

    #[error("Factory defines 'policy-type' but the template '{0}' is not a valid template option.")]
    UnknownPolicyType(String),

    #[error("Invalid factory configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid value for '{setting}': {reason}")]
    InvalidSetting { setting: String, reason: String },

    #[error("Invalid factory bundle: {0}")]
    InvalidBundle(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileRequest {
    pub name: String,
    pub version: String,
    pub category: String,
    #[serde(default)]
    pub policy_template: Option<String>,
    #[serde(default = "empty_object")]
    pub configuration: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    pub version: String,
    pub policy: String,
    pub policy_branch: String,
    pub schema: Value,
}

/// Transport form: `policy` is base64 inside the JSON document.
#[derive(Debug, Serialize, Deserialize)]
struct WireBundle {
    version: String,
    policy: String,
    policy_branch: String,
    schema: Value,
}

impl ArtifactBundle {
    fn to_wire(&self) -> WireBundle {
        WireBundle {
            version: self.version.clone(),
            policy: STANDARD.encode(self.policy.as_bytes()),
            policy_branch: self.policy_branch.clone(),
            schema: self.schema.clone(),
        }
    }

    /// Base64 of the JSON document, itself carrying a base64 policy.
    pub fn encode(&self) -> Result<String, CompileError> {
        let document = serde_json::to_string(&self.to_wire())?;
        Ok(STANDARD.encode(document.as_bytes()))
    }

    pub fn decode(blob: &str) -> Result<Self, CompileError> {
        let document = STANDARD
            .decode(blob.trim())
            .map_err(|e| CompileError::InvalidBundle(format!("document is not base64: {}", e)))?;
        let wire: WireBundle = serde_json::from_slice(&document)
            .map_err(|e| CompileError::InvalidBundle(format!("document is not a factory: {}", e)))?;
        let policy = STANDARD
            .decode(&wire.policy)
            .map_err(|e| CompileError::InvalidBundle(format!("policy is not base64: {}", e)))?;
        let policy = String::from_utf8(policy)
            .map_err(|e| CompileError::InvalidBundle(format!("policy is not UTF-8: {}", e)))?;

        Ok(Self {
            version: wire.version,
            policy,
            policy_branch: wire.policy_branch,
            schema: wire.schema,
        })
    }

    /// SHA-256 over the canonical wire document.
    pub fn fingerprint(&self) -> Result<String, CompileError> {
        Ok(compute_bundle_fingerprint(&self.to_wire())?)
    }

    pub fn title(&self) -> &str {
        self.schema["title"].as_str().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.schema["description"].as_str().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct CompiledFactory {
    pub bundle: ArtifactBundle,
    pub warnings: Vec<ConfigurationWarning>,
}

/// The factory compiler. Holds only immutable lookup data.
pub struct FactoryCompiler {
    catalog: PolicyTypeCatalog,
    reserved: ReservedVariables,
}

impl FactoryCompiler {
    pub fn new(catalog: PolicyTypeCatalog) -> Self {
        Self {
            catalog,
            reserved: ReservedVariables::default(),
        }
    }

    pub fn with_reserved_variables(mut self, reserved: ReservedVariables) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn catalog(&self) -> &PolicyTypeCatalog {
        &self.catalog
    }

    /// Normalize, then generate schema and template from the same
    /// configuration.
    pub fn compile(&self, request: &CompileRequest) -> Result<CompiledFactory, CompileError> {
        tracing::debug!(
            name = %request.name,
            category = %request.category,
            version = %request.version,
            "compiling factory"
        );

        let mut raw = match &request.configuration {
            Value::Object(map) => strip_empty_values(map),
            Value::Null => Map::new(),
            other => {
                return Err(CompileError::InvalidConfiguration(format!(
                    "configuration must be a JSON object, found {}",
                    other
                )))
            }
        };
        if !raw.contains_key("title") {
            raw.insert("title".to_string(), Value::from(default_title(&request.name)));
        }

        let config = FactoryConfiguration::build(
            request.policy_template.as_deref(),
            &Value::Object(raw),
            &self.catalog,
            &self.reserved,
        )?;

        let bundle = ArtifactBundle {
            version: request.version.clone(),
            policy: template::generate(&config),
            policy_branch: config.policy_branch().to_string(),
            schema: schema::generate(&config),
        };

        Ok(CompiledFactory {
            bundle,
            warnings: config.warnings().to_vec(),
        })
    }

    pub fn compile_encoded(&self, request: &CompileRequest) -> Result<String, CompileError> {
        self.compile(request)?.bundle.encode()
    }
}

impl Default for FactoryCompiler {
    fn default() -> Self {
        Self::new(PolicyTypeCatalog::builtin())
    }
}

fn strip_empty_values(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(_, v)| !is_empty_value(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// `authn-jwt` becomes `Authn Jwt Factory`.
fn default_title(name: &str) -> String {
    let words: Vec<String> = name
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();
    if words.is_empty() {
        "Factory".to_string()
    } else {
        format!("{} Factory", words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_title() {
        assert_eq!(default_title("authn-jwt"), "Authn Jwt Factory");
        assert_eq!(default_title("user"), "User Factory");
        assert_eq!(default_title(""), "Factory");
    }

    #[test]
    fn test_strip_empty_values() {
        let map = json!({"a": null, "b": "", "c": [], "d": {}, "e": false, "f": "x"});
        let stripped = strip_empty_values(map.as_object().unwrap());
        let keys: Vec<_> = stripped.keys().cloned().collect();
        assert_eq!(keys, ["e", "f"]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(ArtifactBundle::decode("%%%"), Err(CompileError::InvalidBundle(_))));
        let not_a_factory = STANDARD.encode(b"[1, 2]");
        assert!(matches!(ArtifactBundle::decode(&not_a_factory), Err(CompileError::InvalidBundle(_))));
    }
}
