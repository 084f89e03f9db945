//! Factory Discovery - directory layout and load plans
//!
//! Factories live at `<root>/<category>/<name>/<version>/` with a required
//! `config.json` and an optional `policy.yml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::pipeline::{CompileRequest, FactoryCompiler};

pub const CONFIG_FILE: &str = "config.json";
pub const POLICY_FILE: &str = "policy.yml";
pub const DEFAULT_TARGET_POLICY: &str = "conjur/factories";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot infer category/name/version from {0}")]
    Layout(PathBuf),
}

#[derive(Debug, Clone)]
pub struct FactoryDefinition {
    pub category: String,
    pub name: String,
    pub version: String,
    pub directory: PathBuf,
    pub policy_template: Option<String>,
    pub configuration: Value,
}

impl FactoryDefinition {
    pub fn load(directory: &Path, category: &str, name: &str, version: &str) -> Result<Self, DiscoveryError> {
        let config_path = directory.join(CONFIG_FILE);
        let content = read(&config_path)?;
        let configuration = serde_json::from_str(&content).map_err(|source| DiscoveryError::Parse {
            path: config_path.clone(),
            source,
        })?;

        let policy_path = directory.join(POLICY_FILE);
        let policy_template = if policy_path.is_file() {
            Some(read(&policy_path)?)
        } else {
            None
        };

        Ok(Self {
            category: category.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            directory: directory.to_path_buf(),
            policy_template,
            configuration,
        })
    }

    /// Category, name and version taken from the last three path components.
    pub fn from_dir(directory: &Path) -> Result<Self, DiscoveryError> {
        let parts: Vec<&str> = directory
            .components()
            .rev()
            .take(3)
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        match parts.as_slice() {
            [version, name, category] => Self::load(directory, category, name, version),
            _ => Err(DiscoveryError::Layout(directory.to_path_buf())),
        }
    }

    /// `<category>/<version>/<name>`, the variable path inside the target policy.
    pub fn variable_path(&self) -> String {
        format!("{}/{}/{}", self.category, self.version, self.name)
    }

    pub fn to_request(&self) -> CompileRequest {
        CompileRequest {
            name: self.name.clone(),
            version: self.version.clone(),
            category: self.category.clone(),
            policy_template: self.policy_template.clone(),
            configuration: self.configuration.clone(),
        }
    }
}

/// A factory directory whose files could not be read or parsed.
#[derive(Debug)]
pub struct LoadFailure {
    pub category: String,
    pub name: String,
    pub version: String,
    pub error: DiscoveryError,
}

impl LoadFailure {
    pub fn variable_path(&self) -> String {
        format!("{}/{}/{}", self.category, self.version, self.name)
    }
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub definitions: Vec<FactoryDefinition>,
    pub failures: Vec<LoadFailure>,
}

/// Every factory directory under `root`, sorted by path.
///
/// Only an unreadable root or category/name directory fails the walk. A
/// factory with a bad `config.json` or `policy.yml` lands in `failures`.
pub fn discover(root: &Path) -> Result<Discovery, DiscoveryError> {
    let mut discovery = Discovery::default();
    for category in subdirectories(root)? {
        for name in subdirectories(&category)? {
            for version in subdirectories(&name)? {
                if !version.join(CONFIG_FILE).is_file() {
                    tracing::debug!(path = %version.display(), "skipping directory without config.json");
                    continue;
                }
                let (category, name, version_label) = (file_name(&category), file_name(&name), file_name(&version));
                match FactoryDefinition::load(&version, &category, &name, &version_label) {
                    Ok(definition) => discovery.definitions.push(definition),
                    Err(error) => {
                        tracing::warn!(path = %version.display(), error = %error, "factory failed to load");
                        discovery.failures.push(LoadFailure {
                            category,
                            name,
                            version: version_label,
                            error,
                        });
                    }
                }
            }
        }
    }
    Ok(discovery)
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let entries = fs::read_dir(dir).map_err(|source| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut dirs = vec![];
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read(path: &Path) -> Result<String, DiscoveryError> {
    fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub path: String,
    pub title: String,
    pub description: String,
    pub factory: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadPlan {
    pub factories: Vec<PlanEntry>,
    pub failures: Vec<PlanFailure>,
}

impl LoadPlan {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Compile every discovered factory. Load and compile failures are
/// recorded per factory and never stop the batch.
pub fn build_plan(compiler: &FactoryCompiler, discovery: &Discovery, target_policy: &str) -> LoadPlan {
    let target_policy = target_policy.trim_end_matches('/');
    let mut plan = LoadPlan::default();

    for failure in &discovery.failures {
        plan.failures.push(PlanFailure {
            path: format!("{}/{}", target_policy, failure.variable_path()),
            error: failure.error.to_string(),
        });
    }

    for definition in &discovery.definitions {
        let path = format!("{}/{}", target_policy, definition.variable_path());
        let entry = compiler.compile(&definition.to_request()).and_then(|compiled| {
            Ok(PlanEntry {
                path: path.clone(),
                title: compiled.bundle.title().to_string(),
                description: compiled.bundle.description().to_string(),
                factory: compiled.bundle.encode()?,
                fingerprint: compiled.bundle.fingerprint()?,
            })
        });
        match entry {
            Ok(entry) => {
                tracing::info!(path = %entry.path, "compiled factory");
                plan.factories.push(entry);
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "factory failed to compile");
                plan.failures.push(PlanFailure { path, error: e.to_string() });
            }
        }
    }

    plan.failures.sort_by(|a, b| a.path.cmp(&b.path));
    plan
}
