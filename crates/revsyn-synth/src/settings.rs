//! Synthesis settings.
//!
//! Settings can be built in code with the `with_*` setters or loaded from
//! JSON; every missing key takes its default value.

use serde::{Deserialize, Serialize};

use crate::error::SynthResult;

/// Strategy used to realize `if` statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfRealization {
    /// Guard the branches with a helper line as active control.
    #[default]
    Controlled,
    /// Run the then-branch on duplicates of the written variables and swap
    /// the results in under the guard.
    Duplication,
}

/// Settings of a synthesis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisSettings {
    /// Template for line names with `{name}`, `{array}` and `{bit}` placeholders.
    #[serde(default = "default_variable_name_format")]
    pub variable_name_format: String,

    /// Realization of `if` statements.
    #[serde(default)]
    pub if_realization: IfRealization,

    /// Collapse control sets behind helper lines when it lowers the cost.
    #[serde(default = "default_true")]
    pub efficient_controls: bool,

    /// Uncompute if-guards and release their helper lines.
    #[serde(default = "default_true", alias = "garbage-free")]
    pub garbage_free: bool,

    /// Entry module; `main` or the first module when unset.
    #[serde(default)]
    pub main_module: Option<String>,

    /// Embed called modules as named sub-circuits instead of inlining them.
    #[serde(default)]
    pub modules_hierarchy: bool,

    /// Maximum nesting of module calls.
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

fn default_variable_name_format() -> String {
    "{name}{array}.{bit}".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_call_depth() -> usize {
    256
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            variable_name_format: default_variable_name_format(),
            if_realization: IfRealization::default(),
            efficient_controls: true,
            garbage_free: true,
            main_module: None,
            modules_hierarchy: false,
            max_call_depth: default_max_call_depth(),
        }
    }
}

impl SynthesisSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from JSON.
    pub fn from_json(json: &str) -> SynthResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the line name template.
    #[must_use]
    pub fn with_variable_name_format(mut self, format: impl Into<String>) -> Self {
        self.variable_name_format = format.into();
        self
    }

    /// Set the if realization.
    #[must_use]
    pub fn with_if_realization(mut self, realization: IfRealization) -> Self {
        self.if_realization = realization;
        self
    }

    /// Enable or disable the control cascade optimization.
    #[must_use]
    pub fn with_efficient_controls(mut self, enabled: bool) -> Self {
        self.efficient_controls = enabled;
        self
    }

    /// Enable or disable guard uncomputation.
    #[must_use]
    pub fn with_garbage_free(mut self, enabled: bool) -> Self {
        self.garbage_free = enabled;
        self
    }

    /// Select the entry module.
    #[must_use]
    pub fn with_main_module(mut self, name: impl Into<String>) -> Self {
        self.main_module = Some(name.into());
        self
    }

    /// Embed called modules as sub-circuits.
    #[must_use]
    pub fn with_modules_hierarchy(mut self, enabled: bool) -> Self {
        self.modules_hierarchy = enabled;
        self
    }

    /// Set the maximum call depth.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Name of bit `bit` of variable `name`; `array` is the element suffix
    /// such as `[1][0]`, empty for scalars.
    pub fn line_name(&self, name: &str, array: &str, bit: u32) -> String {
        self.variable_name_format
            .replace("{name}", name)
            .replace("{array}", array)
            .replace("{bit}", &bit.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SynthesisSettings::default();
        assert_eq!(settings.if_realization, IfRealization::Controlled);
        assert!(settings.efficient_controls);
        assert!(settings.garbage_free);
        assert!(!settings.modules_hierarchy);
        assert_eq!(settings.max_call_depth, 256);
        assert_eq!(settings.line_name("a", "", 3), "a.3");
        assert_eq!(settings.line_name("m", "[2][0]", 1), "m[2][0].1");
    }

    #[test]
    fn test_from_json_partial() {
        let settings = SynthesisSettings::from_json(
            r#"{ "if_realization": "duplication", "garbage-free": false, "main_module": "top" }"#,
        )
        .unwrap();
        assert_eq!(settings.if_realization, IfRealization::Duplication);
        assert!(!settings.garbage_free);
        assert_eq!(settings.main_module.as_deref(), Some("top"));
        assert!(settings.efficient_controls);
        assert_eq!(settings.variable_name_format, "{name}{array}.{bit}");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            SynthesisSettings::from_json(r#"{ "if_realization": "sometimes" }"#),
            Err(crate::error::SynthError::Settings(_))
        ));
    }

    #[test]
    fn test_builder() {
        let settings = SynthesisSettings::new()
            .with_variable_name_format("{name}_{bit}{array}")
            .with_efficient_controls(false)
            .with_modules_hierarchy(true)
            .with_max_call_depth(4);
        assert_eq!(settings.line_name("x", "[1]", 0), "x_0[1]");
        assert!(!settings.efficient_controls);
        assert!(settings.modules_hierarchy);
        assert_eq!(settings.max_call_depth, 4);
    }
}
