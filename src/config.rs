//! Rule configuration data shapes (spec §10, ambient-stack expansion):
//! the `ProcessingContext` carries a `RuleConfiguration` describing
//! per-rule severity/options/enablement. Turning a TOML/YAML file on disk
//! into this shape is the excluded `ConfigLoader` collaborator's job
//! (spec §1); this module only defines and consumes the shape, plus a
//! trivial in-memory builder for tests and the demo binary.

use std::collections::HashMap;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::model::Severity;

/// A single configuration value for a rule option, mirroring the small set
/// of JSON-ish scalar/array shapes a TOML/YAML loader would hand back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleConfigurationValue {
    Bool(bool),
    Integer(i64),
    String(String),
    List(Vec<RuleConfigurationValue>),
}

impl RuleConfigurationValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RuleConfigurationValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RuleConfigurationValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RuleConfigurationValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Per-rule configuration: whether it's enabled, at what severity its
/// violations are reported, and an open-ended options map (e.g.
/// `line-length`'s `max` option).
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
pub struct RuleConfiguration {
    #[builder(default = "true")]
    pub enabled: bool,
    #[builder(default = "Severity::Warning")]
    pub severity: Severity,
    #[serde(default)]
    pub options: HashMap<String, RuleConfigurationValue>,
}

impl Default for RuleConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::Warning,
            options: HashMap::new(),
        }
    }
}

impl RuleConfiguration {
    pub fn option(&self, key: &str) -> Option<&RuleConfigurationValue> {
        self.options.get(key)
    }
}

/// A full configuration set: per-rule-id configuration plus the global
/// severity threshold used to compute check-mode exit codes (spec §7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfigSet {
    pub rules: HashMap<String, RuleConfiguration>,
    #[serde(default = "default_threshold")]
    pub severity_threshold: Severity,
}

fn default_threshold() -> Severity {
    Severity::Warning
}

impl RuleConfigSet {
    pub fn builder() -> RuleConfigSetBuilder {
        RuleConfigSetBuilder::default()
    }

    pub fn config_for(&self, rule_id: &str) -> RuleConfiguration {
        self.rules.get(rule_id).cloned().unwrap_or_default()
    }

    pub fn is_enabled(&self, rule_id: &str) -> bool {
        self.config_for(rule_id).enabled
    }

    pub fn enabled_rule_ids<'a>(&'a self, all_rule_ids: &[&'a str]) -> Vec<&'a str> {
        all_rule_ids
            .iter()
            .copied()
            .filter(|id| self.is_enabled(id))
            .collect()
    }
}

/// In-memory builder for tests and the demo binary — not a config-file
/// loader (spec §1, §10 excludes file-format parsing from the core).
#[derive(Debug, Default)]
pub struct RuleConfigSetBuilder {
    rules: HashMap<String, RuleConfiguration>,
    severity_threshold: Severity,
}

impl RuleConfigSetBuilder {
    pub fn with_rule(mut self, rule_id: impl Into<String>, config: RuleConfiguration) -> Self {
        self.rules.insert(rule_id.into(), config);
        self
    }

    pub fn disable(mut self, rule_id: impl Into<String>) -> Self {
        self.rules.insert(
            rule_id.into(),
            RuleConfiguration {
                enabled: false,
                ..Default::default()
            },
        );
        self
    }

    pub fn severity_threshold(mut self, severity: Severity) -> Self {
        self.severity_threshold = severity;
        self
    }

    pub fn build(self) -> RuleConfigSet {
        RuleConfigSet {
            rules: self.rules,
            severity_threshold: self.severity_threshold,
        }
    }
}
