//! Diagnostics - Advisory Warnings
//!
//! Normalization never fails on a setting it can override.
//! It records what it overrode and carries on.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationWarning {
    /// Configuration key whose explicit value was overridden.
    pub setting: String,
    pub message: String,
}

impl ConfigurationWarning {
    pub fn ignored_for_wrapped_policy(setting: &str) -> Self {
        Self {
            setting: setting.to_string(),
            message: format!("When 'wrap-with-policy' is true, '{}' is ignored.", dashed(setting)),
        }
    }

    pub fn ignored_for_policy_type(setting: &str) -> Self {
        Self {
            setting: setting.to_string(),
            message: format!("When 'policy-type' is defined, the '{}' setting is ignored.", dashed(setting)),
        }
    }
}

impl std::fmt::Display for ConfigurationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Ordered sink for warnings raised while building one configuration.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    warnings: Vec<ConfigurationWarning>,
}

impl Diagnostics {
    pub fn warn(&mut self, warning: ConfigurationWarning) {
        tracing::warn!(setting = %warning.setting, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn into_warnings(self) -> Vec<ConfigurationWarning> {
        self.warnings
    }
}

fn dashed(setting: &str) -> String {
    setting.replace('_', "-")
}
