//! Policy-Type Catalog - Canned Template Bodies
//!
//! A `policy_type` in a factory configuration selects one of these bodies
//! in place of a hand-written `policy.yml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const AUTHENTICATOR: &str = include_str!("../policy_types/authenticator.yml");
const VARIABLE_SET: &str = include_str!("../policy_types/variable_set.yml");

/// Immutable once handed to a compiler.
#[derive(Debug, Clone, Default)]
pub struct PolicyTypeCatalog {
    bodies: BTreeMap<String, String>,
}

impl PolicyTypeCatalog {
    pub fn new() -> Self {
        Self { bodies: BTreeMap::new() }
    }

    /// The bodies bundled with this crate.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register("authenticator", AUTHENTICATOR);
        catalog.register("variable-set", VARIABLE_SET);
        catalog
    }

    /// Every `*.yml` file in `dir`, keyed by its normalized file stem.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut catalog = Self::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    let body = fs::read_to_string(&path)?;
                    catalog.register(stem, body);
                }
            }
        }
        Ok(catalog)
    }

    pub fn register(&mut self, name: &str, body: impl Into<String>) {
        self.bodies.insert(normalize_name(name), body.into());
    }

    /// Entries from `other` replace same-named entries here.
    pub fn extend(&mut self, other: PolicyTypeCatalog) {
        self.bodies.extend(other.bodies);
    }

    /// Exact lookup after normalization.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.bodies.get(&normalize_name(name)).map(String::as_str)
    }

    pub fn names(&self) -> Vec<&str> {
        self.bodies.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// `variable-set`, `Variable Set` and `VariableSet` all become `variable_set`.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;
    for c in name.trim().chars() {
        if c == '-' || c == ' ' || c == '_' {
            if !normalized.ends_with('_') {
                normalized.push('_');
            }
        } else if c.is_uppercase() {
            if previous.map_or(false, |p| p.is_lowercase() || p.is_ascii_digit()) {
                normalized.push('_');
            }
            normalized.extend(c.to_lowercase());
        } else {
            normalized.push(c);
        }
        previous = Some(c);
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("variable-set"), "variable_set");
        assert_eq!(normalize_name("VariableSet"), "variable_set");
        assert_eq!(normalize_name(" Variable Set "), "variable_set");
        assert_eq!(normalize_name("not-a-real-type"), "not_a_real_type");
        assert_eq!(normalize_name("authenticator"), "authenticator");
    }

    #[test]
    fn test_builtin_lookup() {
        let catalog = PolicyTypeCatalog::builtin();
        assert_eq!(catalog.names(), ["authenticator", "variable_set"]);
        assert!(catalog.get("variable-set").unwrap().contains("*variables"));
        assert!(catalog.get("Authenticator").unwrap().starts_with("- !webservice"));
        assert!(catalog.get("user").is_none());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("host-set.yml"), "- !host a\n").unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let mut catalog = PolicyTypeCatalog::builtin();
        catalog.extend(PolicyTypeCatalog::load_from_dir(dir.path()).unwrap());

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("host_set"), Some("- !host a\n"));
    }
}
