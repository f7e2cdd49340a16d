//! Container configuration.
//!
//! Options can be built in code, read from `FERROUS_LIFETIME_*` environment
//! variables, or (with the `config` feature) parsed from JSON.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

const ENV_LABEL: &str = "FERROUS_LIFETIME_LABEL";
const ENV_WARN_UNDISPOSED: &str = "FERROUS_LIFETIME_WARN_UNDISPOSED";
const ENV_MAX_SCOPE_DEPTH: &str = "FERROUS_LIFETIME_MAX_SCOPE_DEPTH";

/// Options applied to a container when it is built.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{ContainerOptions, ServiceCollection};
///
/// let mut services = ServiceCollection::new();
/// services.with_options(ContainerOptions {
///     label: Some("orders".to_string()),
///     max_scope_depth: Some(4),
///     ..ContainerOptions::default()
/// });
/// let provider = services.build();
/// assert_eq!(provider.options().label.as_deref(), Some("orders"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerOptions {
    /// Name attached to the container's log events.
    pub label: Option<String>,
    /// Warn through `tracing` when a scope still holding tracked instances
    /// is dropped without being disposed.
    pub warn_on_undisposed_drop: bool,
    /// Maximum nesting depth below the root scope. `None` means unlimited.
    pub max_scope_depth: Option<usize>,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            label: None,
            warn_on_undisposed_drop: true,
            max_scope_depth: None,
        }
    }
}

impl ContainerOptions {
    /// Reads options from the environment, falling back to defaults for
    /// unset or unparseable variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `FERROUS_LIFETIME_LABEL` | `label` |
    /// | `FERROUS_LIFETIME_WARN_UNDISPOSED` | `warn_on_undisposed_drop` (`true`/`false`/`1`/`0`) |
    /// | `FERROUS_LIFETIME_MAX_SCOPE_DEPTH` | `max_scope_depth` |
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(label) = env::var(ENV_LABEL) {
            if !label.is_empty() {
                options.label = Some(label);
            }
        }
        if let Ok(value) = env::var(ENV_WARN_UNDISPOSED) {
            match parse_flag(&value) {
                Some(flag) => options.warn_on_undisposed_drop = flag,
                None => tracing::warn!(variable = ENV_WARN_UNDISPOSED, value = %value, "ignoring invalid flag"),
            }
        }
        if let Ok(value) = env::var(ENV_MAX_SCOPE_DEPTH) {
            match value.trim().parse::<usize>() {
                Ok(depth) => options.max_scope_depth = Some(depth),
                Err(_) => tracing::warn!(variable = ENV_MAX_SCOPE_DEPTH, value = %value, "ignoring invalid depth"),
            }
        }
        options
    }

    /// Parses options from a JSON document. Missing fields take their
    /// default values.
    ///
    /// ```
    /// # #[cfg(feature = "config")] {
    /// use ferrous_lifetime::ContainerOptions;
    ///
    /// let options = ContainerOptions::from_json_str(r#"{ "max_scope_depth": 2 }"#).unwrap();
    /// assert_eq!(options.max_scope_depth, Some(2));
    /// assert!(options.warn_on_undisposed_drop);
    /// # }
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Label used in log events, `"container"` when unset.
    pub(crate) fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("container")
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_warn_without_depth_limit() {
        let options = ContainerOptions::default();
        assert!(options.warn_on_undisposed_drop);
        assert_eq!(options.max_scope_depth, None);
        assert_eq!(options.display_label(), "container");
    }

    #[test]
    fn flags_parse_loosely() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let options = ContainerOptions::from_json_str(r#"{ "label": "jobs", "warn_on_undisposed_drop": false }"#).unwrap();
        assert_eq!(options.label.as_deref(), Some("jobs"));
        assert!(!options.warn_on_undisposed_drop);
        assert_eq!(options.max_scope_depth, None);
    }
}
