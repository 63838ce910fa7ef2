//! Coordinator configuration.

use serde::Deserialize;

use crate::scene::SceneMode;

/// Settings for a [`RefreshCoordinator`](super::RefreshCoordinator).
///
/// ```
/// use weft_core::refresh::RefreshConfig;
///
/// let config = RefreshConfig::from_json_str(r#"{ "label": "orders" }"#).unwrap();
/// assert_eq!(config.label, "orders");
/// assert!(config.isolate_failures);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Name used in spans and log lines.
    pub label: String,

    /// Mode of the scene each node is evaluated in.
    pub refresh_mode: SceneMode,

    /// Report failures of non-initial refreshes to the span instead of
    /// returning them.
    pub isolate_failures: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            label: "refresh".to_string(),
            refresh_mode: SceneMode::ReadOnly,
            isolate_failures: true,
        }
    }
}

impl RefreshConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Set the label used in spans and log lines.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the mode nodes are evaluated in.
    pub fn with_refresh_mode(mut self, mode: SceneMode) -> Self {
        self.refresh_mode = mode;
        self
    }

    /// Choose whether later refresh failures go to the error sink.
    pub fn with_isolate_failures(mut self, isolate: bool) -> Self {
        self.isolate_failures = isolate;
        self
    }
}
