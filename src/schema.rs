//! Schema Generator - JSON Schema (draft-06) for factory inputs

use serde_json::{json, Map, Value};

use crate::configuration::FactoryConfiguration;
use crate::variable::{self, FactoryVariable};

pub const SCHEMA_DRAFT_06: &str = "http://json-schema.org/draft-06/schema#";

/// Property and `required` order follow the order fields are processed in.
pub fn generate(config: &FactoryConfiguration) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<String> = vec![];

    if config.include_identifier() {
        if let Some(id) = config.reserved(variable::ID) {
            properties.insert(variable::ID.to_string(), property(id, "string"));
            require(&mut required, variable::ID);
        }
    }

    if config.include_annotations() {
        if let Some(annotations) = config.reserved(variable::ANNOTATIONS) {
            properties.insert(variable::ANNOTATIONS.to_string(), property(annotations, "object"));
        }
    }

    // A configured default branch is fixed; the caller never supplies it.
    if config.include_policy_branch() {
        if let Some(branch) = config.reserved(variable::BRANCH) {
            properties.insert(variable::BRANCH.to_string(), property(branch, "string"));
            require(&mut required, variable::BRANCH);
        }
    }

    for v in config
        .policy_template_variables()
        .iter()
        .filter(|v| !variable::is_reserved(v.identifier()))
    {
        properties.insert(v.identifier().to_string(), property(v, v.kind()));
        if v.required() {
            require(&mut required, v.identifier());
        }
    }

    if !config.variables().is_empty() {
        let group = variable_group(config.variables());
        if group["required"].as_array().map_or(false, |r| !r.is_empty()) {
            require(&mut required, "variables");
        }
        properties.insert("variables".to_string(), group);
    }

    json!({
        "$schema": SCHEMA_DRAFT_06,
        "type": "object",
        "title": config.title(),
        "description": config.description(),
        "properties": properties,
        "required": required,
    })
}

fn variable_group(variables: &[FactoryVariable]) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<String> = vec![];
    for v in variables {
        properties.insert(v.identifier().to_string(), property(v, v.kind()));
        if v.required() {
            require(&mut required, v.identifier());
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn property(v: &FactoryVariable, kind: &str) -> Value {
    let mut prop = Map::new();
    prop.insert("title".to_string(), Value::from(v.title()));
    prop.insert("description".to_string(), Value::from(v.description()));
    prop.insert("type".to_string(), Value::from(kind));
    if let Some(default) = v.default_value() {
        prop.insert("default".to_string(), Value::from(default));
    }
    if let Some(values) = v.valid_values().filter(|values| !values.is_empty()) {
        prop.insert("enum".to_string(), Value::from(values.to_vec()));
    }
    if v.hidden() {
        prop.insert("readOnly".to_string(), Value::Bool(true));
    }
    Value::Object(prop)
}

fn require(required: &mut Vec<String>, identifier: &str) {
    if !required.iter().any(|r| r == identifier) {
        required.push(identifier.to_string());
    }
}
