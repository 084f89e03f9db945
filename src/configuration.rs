//! Factory Configuration - Normalization
//!
//! Turns a hand-written `config.json` mapping into a typed configuration.
//! Everything downstream of [`FactoryConfiguration::build`] works on typed
//! data only.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::catalog::{normalize_name, PolicyTypeCatalog};
use crate::diagnostics::{ConfigurationWarning, Diagnostics};
use crate::pipeline::CompileError;
use crate::variable::{self, loose, FactoryVariable, RawVariable, ReservedVariables};

/// Placeholder the renderer fills in when no default branch is configured.
pub const BRANCH_PLACEHOLDER: &str = "{{ branch }}";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFactoryConfig {
    #[serde(default, deserialize_with = "loose::string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "loose::string")]
    description: Option<String>,
    #[serde(default, deserialize_with = "loose::string")]
    default_policy_branch: Option<String>,
    #[serde(default, deserialize_with = "loose::string")]
    policy_type: Option<String>,
    #[serde(default)]
    variables: Option<Map<String, Value>>,
    #[serde(default)]
    policy_template_variables: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "loose::boolean")]
    with_variables_group: Option<bool>,
    #[serde(default, deserialize_with = "loose::boolean")]
    wrap_with_policy: Option<bool>,
    #[serde(default, deserialize_with = "loose::boolean")]
    include_identifier: Option<bool>,
    #[serde(default, deserialize_with = "loose::boolean")]
    include_annotations: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct FactoryConfiguration {
    title: String,
    description: String,
    default_policy_branch: Option<String>,
    factory_template: String,
    variables: Vec<FactoryVariable>,
    policy_template_variables: Vec<FactoryVariable>,
    with_variables_group: bool,
    wrap_with_policy: bool,
    include_identifier: bool,
    include_annotations: bool,
    warnings: Vec<ConfigurationWarning>,
}

impl FactoryConfiguration {
    /// Normalize `raw_config`, resolving `policy_type` against `catalog`.
    ///
    /// A blank `raw_template` is treated as absent.
    pub fn build(
        raw_template: Option<&str>,
        raw_config: &Value,
        catalog: &PolicyTypeCatalog,
        reserved: &ReservedVariables,
    ) -> Result<Self, CompileError> {
        let object = raw_config.as_object().ok_or_else(|| {
            CompileError::InvalidConfiguration("configuration must be a JSON object".to_string())
        })?;
        let raw: RawFactoryConfig = serde_json::from_value(Value::Object(normalize_keys(object)))
            .map_err(|e| CompileError::InvalidConfiguration(e.to_string()))?;

        let variables = hydrate_variables("variables", raw.variables.as_ref(), None)?;
        let policy_template_variables =
            hydrate_variables("policy_template_variables", raw.policy_template_variables.as_ref(), Some(reserved))?;

        let mut diagnostics = Diagnostics::default();
        let mut with_variables_group = raw.with_variables_group.unwrap_or(false);
        let mut wrap_with_policy = raw.wrap_with_policy.unwrap_or(false);
        let mut include_identifier = raw.include_identifier.unwrap_or(true);

        if !variables.is_empty() {
            with_variables_group = raw.with_variables_group.unwrap_or(true);
            wrap_with_policy = raw.wrap_with_policy.unwrap_or(true);
        }

        if wrap_with_policy && !include_identifier {
            diagnostics.warn(ConfigurationWarning::ignored_for_wrapped_policy("include_identifier"));
            include_identifier = true;
        }

        let raw_template = raw_template.filter(|t| !t.trim().is_empty());
        let policy_type = raw
            .policy_type
            .as_deref()
            .map(normalize_name)
            .filter(|name| !name.is_empty());

        let factory_template = match (raw_template, policy_type) {
            (Some(_), Some(_)) => return Err(CompileError::ConfigurationConflict),
            (None, None) => return Err(CompileError::MissingTemplate),
            (Some(template), None) => template.to_string(),
            (None, Some(name)) => {
                let body = catalog
                    .get(&name)
                    .ok_or_else(|| CompileError::UnknownPolicyType(name.clone()))?;
                // Warn only when an explicit `false` is overridden.
                if raw.wrap_with_policy == Some(false) {
                    diagnostics.warn(ConfigurationWarning::ignored_for_policy_type("wrap_with_policy"));
                }
                wrap_with_policy = true;
                if raw.include_identifier == Some(false) && !include_identifier {
                    diagnostics.warn(ConfigurationWarning::ignored_for_policy_type("include_identifier"));
                }
                include_identifier = true;
                body.to_string()
            }
        };

        Ok(Self {
            title: raw.title.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            default_policy_branch: raw.default_policy_branch,
            factory_template,
            variables,
            policy_template_variables,
            with_variables_group,
            wrap_with_policy,
            include_identifier,
            include_annotations: raw.include_annotations.unwrap_or(true),
            warnings: diagnostics.into_warnings(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_policy_branch(&self) -> Option<&str> {
        self.default_policy_branch.as_deref().filter(|b| !b.is_empty())
    }

    pub fn factory_template(&self) -> &str {
        &self.factory_template
    }

    /// Variables declared as standalone policy elements.
    pub fn variables(&self) -> &[FactoryVariable] {
        &self.variables
    }

    /// Placeholder inputs; always starts with `id`, `annotations`, `branch`.
    pub fn policy_template_variables(&self) -> &[FactoryVariable] {
        &self.policy_template_variables
    }

    /// The hydrated descriptor for a reserved identifier.
    pub fn reserved(&self, identifier: &str) -> Option<&FactoryVariable> {
        self.policy_template_variables
            .iter()
            .take(variable::RESERVED_IDENTIFIERS.len())
            .find(|v| v.identifier() == identifier)
    }

    pub fn with_variables_group(&self) -> bool {
        self.with_variables_group
    }

    pub fn wrap_with_policy(&self) -> bool {
        self.wrap_with_policy
    }

    pub fn include_identifier(&self) -> bool {
        self.include_identifier
    }

    pub fn include_annotations(&self) -> bool {
        self.include_annotations
    }

    /// True when the caller has to supply the branch.
    pub fn include_policy_branch(&self) -> bool {
        self.default_policy_branch().is_none()
    }

    pub fn policy_branch(&self) -> &str {
        self.default_policy_branch().unwrap_or(BRANCH_PLACEHOLDER)
    }

    pub fn warnings(&self) -> &[ConfigurationWarning] {
        &self.warnings
    }
}

fn normalize_keys(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.replace('-', "_"), v.clone())).collect()
}

/// Reserved identifiers are seeded first and overridden in place.
fn hydrate_variables(
    section: &str,
    entries: Option<&Map<String, Value>>,
    reserved: Option<&ReservedVariables>,
) -> Result<Vec<FactoryVariable>, CompileError> {
    let mut hydrated: Vec<FactoryVariable> = reserved
        .map(|r| r.iter().cloned().collect())
        .unwrap_or_default();

    for (identifier, attributes) in entries.into_iter().flatten() {
        let raw = match attributes {
            Value::Null => RawVariable::default(),
            Value::Object(map) => serde_json::from_value(Value::Object(normalize_keys(map))).map_err(|e| {
                CompileError::InvalidSetting {
                    setting: format!("{}.{}", section, identifier),
                    reason: e.to_string(),
                }
            })?,
            other => {
                return Err(CompileError::InvalidSetting {
                    setting: format!("{}.{}", section, identifier),
                    reason: format!("expected an object of attributes, found {}", other),
                })
            }
        };

        let base = reserved.and_then(|r| r.get(identifier));
        let variable = FactoryVariable::from_raw(identifier, raw, base);
        match hydrated.iter_mut().find(|v| v.identifier() == identifier) {
            Some(slot) => *slot = variable,
            None => hydrated.push(variable),
        }
    }
    Ok(hydrated)
}
