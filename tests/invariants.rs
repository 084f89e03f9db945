//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use policy_factory_core::{
    ArtifactBundle, CompileError, CompileRequest, ConfigurationWarning, FactoryCompiler, PolicyTypeCatalog,
};
use serde_json::{json, Value};

const HEADER: &str = "- !policy
  id: {{ id }}
  annotations:
  {{# annotations }}
    {{ key }}: {{ value }}
  {{/ annotations }}";

fn request(policy_template: Option<&str>, configuration: Value) -> CompileRequest {
    CompileRequest {
        name: "bar".to_string(),
        version: "v1".to_string(),
        category: "foo".to_string(),
        policy_template: policy_template.map(str::to_string),
        configuration,
    }
}

fn compile(policy_template: Option<&str>, configuration: Value) -> Result<ArtifactBundle, CompileError> {
    FactoryCompiler::default()
        .compile(&request(policy_template, configuration))
        .map(|c| c.bundle)
}

#[test]
fn invariant_empty_configuration_needs_a_template() {
    let err = compile(None, json!({})).unwrap_err();
    assert!(matches!(err, CompileError::MissingTemplate));
    assert_eq!(err.to_string(), "No policy template found (and policy-type was not set).");
}

#[test]
fn invariant_wrap_with_policy_without_variables() {
    let bundle = compile(Some("- !host foo-bar"), json!({"wrap_with_policy": true})).unwrap();
    assert_eq!(bundle.policy, format!("{HEADER}\n\n  body:\n  - !host foo-bar"));
}

#[test]
fn invariant_ungrouped_variables_sit_directly_under_body() {
    let bundle = compile(
        Some("- !host foo-bar"),
        json!({"variables": {"foo": {}}, "with_variables_group": false}),
    )
    .unwrap();
    assert_eq!(bundle.policy, format!("{HEADER}\n\n  body:\n  - !variable foo\n  - !host foo-bar"));
    assert!(!bundle.policy.contains("&variables"));
}

#[test]
fn invariant_grouped_variables_keep_declaration_order() {
    let bundle = compile(
        Some("- !host foo-bar"),
        json!({"variables": {"zeta": {}, "alpha": {}, "mid": {}}}),
    )
    .unwrap();
    assert!(bundle.policy.contains(
        "  - &variables\n    - !variable zeta\n    - !variable alpha\n    - !variable mid\n\n  - !host foo-bar"
    ));
}

#[test]
fn invariant_unknown_policy_type_names_value() {
    let err = compile(None, json!({"policy_type": "not-a-real-type"})).unwrap_err();
    assert!(matches!(err, CompileError::UnknownPolicyType(ref name) if name == "not_a_real_type"));
    assert!(err.to_string().contains("'not_a_real_type'"));
}

#[test]
fn invariant_required_nested_variable() {
    let bundle = compile(Some("- !host foo-bar"), json!({"variables": {"foo": {"required": true}}})).unwrap();
    assert_eq!(bundle.schema["required"], json!(["id", "branch", "variables"]));
    assert_eq!(bundle.schema["properties"]["variables"]["required"], json!(["foo"]));
}

#[test]
fn invariant_required_list_tracks_toggles() {
    let cases = [
        (json!({}), json!(["id", "branch"])),
        (json!({"include_identifier": false}), json!(["branch"])),
        (json!({"default_policy_branch": "apps"}), json!(["id"])),
        (json!({"include_identifier": false, "default_policy_branch": "apps"}), json!([])),
        (json!({"variables": {"foo": {}}}), json!(["id", "branch"])),
        (json!({"variables": {"foo": {}}, "include_identifier": false}), json!(["id", "branch"])),
    ];
    for (configuration, expected) in cases {
        let bundle = compile(Some("- !host a"), configuration.clone()).unwrap();
        assert_eq!(bundle.schema["required"], expected, "configuration: {configuration}");
    }
}

#[test]
fn invariant_policy_type_conflicts_with_template() {
    let catalog = PolicyTypeCatalog::builtin();
    for name in catalog.names() {
        for template in ["- !host a", "# comment only", "x"] {
            let err = compile(Some(template), json!({"policy_type": name})).unwrap_err();
            assert!(matches!(err, CompileError::ConfigurationConflict), "{name} / {template}");
        }
    }
}

#[test]
fn invariant_compile_is_idempotent() {
    let compiler = FactoryCompiler::default();
    let req = request(
        None,
        json!({
            "title": "API Connection Template",
            "policy_type": "variable-set",
            "variables": {"url": {"required": true}, "key": {"required": true}}
        }),
    );
    let first = compiler.compile_encoded(&req).unwrap();
    let second = compiler.compile_encoded(&req).unwrap();
    assert_eq!(first, second);

    let a = compiler.compile(&req).unwrap().bundle.fingerprint().unwrap();
    let b = compiler.compile(&req).unwrap().bundle.fingerprint().unwrap();
    assert_eq!(a, b);
}

#[test]
fn invariant_encoded_policy_round_trips() {
    let compiler = FactoryCompiler::default();
    let req = request(Some("- !host caf\u{e9}\n  id: {{ id }}"), json!({"variables": {"url": {}}}));
    let compiled = compiler.compile(&req).unwrap();
    let decoded = ArtifactBundle::decode(&compiled.bundle.encode().unwrap()).unwrap();

    assert_eq!(decoded, compiled.bundle);
    assert_eq!(decoded.version, "v1");
    assert_eq!(decoded.policy_branch, "{{ branch }}");
}

#[test]
fn invariant_wire_document_layout() {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let blob = FactoryCompiler::default()
        .compile_encoded(&request(Some("- !host a"), json!({"default_policy_branch": "apps"})))
        .unwrap();
    let document: Value = serde_json::from_slice(&STANDARD.decode(&blob).unwrap()).unwrap();

    let keys: Vec<_> = document.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, ["version", "policy", "policy_branch", "schema"]);
    assert_eq!(document["policy_branch"], "apps");
    let policy = STANDARD.decode(document["policy"].as_str().unwrap()).unwrap();
    assert_eq!(policy, b"- !host a");
}

#[test]
fn invariant_default_title_is_a_fallback() {
    let derived = compile(Some("- !host a"), json!({})).unwrap();
    assert_eq!(derived.schema["title"], "Bar Factory");

    let blank = compile(Some("- !host a"), json!({"title": ""})).unwrap();
    assert_eq!(blank.schema["title"], "Bar Factory");

    let explicit = compile(Some("- !host a"), json!({"title": "Host Template"})).unwrap();
    assert_eq!(explicit.schema["title"], "Host Template");
}

#[test]
fn invariant_warnings_are_returned_not_raised() {
    let compiled = FactoryCompiler::default()
        .compile(&request(
            None,
            json!({"policy_type": "authenticator", "wrap_with_policy": false, "include_identifier": false}),
        ))
        .unwrap();
    let settings: Vec<_> = compiled.warnings.iter().map(|w| w.setting.as_str()).collect();
    assert_eq!(settings, ["wrap_with_policy", "include_identifier"]);
    assert!(compiled.bundle.policy.starts_with(HEADER));
    assert_eq!(compiled.bundle.schema["required"], json!(["id", "branch"]));
}

#[test]
fn invariant_warnings_name_only_overridden_settings() {
    let cases: [(Option<&str>, Value, &[&str]); 4] = [
        (None, json!({"policy_type": "authenticator"}), &[]),
        (None, json!({"policy_type": "authenticator", "wrap_with_policy": false}), &["wrap_with_policy"]),
        (Some("- !host a"), json!({"variables": {"foo": {}}, "include_identifier": false}), &["include_identifier"]),
        (Some("- !host a"), json!({"wrap_with_policy": true}), &[]),
    ];

    for (template, configuration, expected) in cases {
        let compiled = FactoryCompiler::default()
            .compile(&request(template, configuration.clone()))
            .unwrap();
        let settings: Vec<_> = compiled.warnings.iter().map(|w| w.setting.as_str()).collect();
        assert_eq!(settings, expected, "configuration: {configuration}");
    }

    let compiled = FactoryCompiler::default()
        .compile(&request(Some("- !host a"), json!({"variables": {"foo": {}}, "include_identifier": false})))
        .unwrap();
    assert_eq!(
        compiled.warnings[0].message,
        ConfigurationWarning::ignored_for_wrapped_policy("include_identifier").message
    );
}

#[test]
fn invariant_substitute_catalog_is_used() {
    let mut catalog = PolicyTypeCatalog::new();
    catalog.register("host-set", "- !host one");
    let compiler = FactoryCompiler::new(catalog);

    let bundle = compiler
        .compile(&request(None, json!({"policy_type": "HostSet"})))
        .unwrap()
        .bundle;
    assert_eq!(bundle.policy, format!("{HEADER}\n\n  body:\n  - !host one"));

    let err = compiler.compile(&request(None, json!({"policy_type": "variable-set"}))).unwrap_err();
    assert!(matches!(err, CompileError::UnknownPolicyType(_)));
}

#[test]
fn invariant_authenticator_factory() {
    let bundle = compile(
        None,
        json!({
            "title": "Authn-OIDC Template",
            "description": "Create a new Authn-OIDC Authenticator",
            "default_policy_branch": "conjur/authn-oidc",
            "policy_type": "authenticator",
            "variables": {
                "provider-uri": {"required": true, "description": "OIDC Provider endpoint"},
                "redirect-uri": {"description": "Target URL to redirect to after successful authentication"}
            }
        }),
    )
    .unwrap();

    assert_eq!(bundle.policy_branch, "conjur/authn-oidc");
    assert_eq!(bundle.schema["required"], json!(["id", "variables"]));
    assert_eq!(
        bundle.schema["properties"]["variables"]["properties"]["provider-uri"],
        json!({"title": "Provider-uri", "description": "OIDC Provider endpoint", "type": "string"})
    );
    assert!(bundle.policy.contains("    - !variable provider-uri\n    - !variable redirect-uri\n\n  - !webservice"));
}
