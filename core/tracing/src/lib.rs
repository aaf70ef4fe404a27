// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use tracing::Level;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TracingConfiguration {
    #[serde(default = "default_log_level")]
    log_level: String,

    #[serde(default = "default_display_thread_names")]
    display_thread_names: bool,

    #[serde(default = "default_display_thread_ids")]
    display_thread_ids: bool,

    /// Print the target (module path) of every event.
    #[serde(default = "default_display_target")]
    display_target: bool,
}

impl Default for TracingConfiguration {
    fn default() -> Self {
        TracingConfiguration {
            log_level: default_log_level(),
            display_thread_names: default_display_thread_names(),
            display_thread_ids: default_display_thread_ids(),
            display_target: default_display_target(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_display_thread_names() -> bool {
    true
}

fn default_display_thread_ids() -> bool {
    false
}

fn default_display_target() -> bool {
    true
}

// unknown levels fall back to info
fn resolve_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

impl TracingConfiguration {
    pub fn with_log_level(self, log_level: String) -> Self {
        TracingConfiguration { log_level, ..self }
    }

    pub fn with_display_thread_names(self, display_thread_names: bool) -> Self {
        TracingConfiguration {
            display_thread_names,
            ..self
        }
    }

    pub fn with_display_thread_ids(self, display_thread_ids: bool) -> Self {
        TracingConfiguration {
            display_thread_ids,
            ..self
        }
    }

    pub fn with_display_target(self, display_target: bool) -> Self {
        TracingConfiguration {
            display_target,
            ..self
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn display_thread_names(&self) -> bool {
        self.display_thread_names
    }

    pub fn display_thread_ids(&self) -> bool {
        self.display_thread_ids
    }

    pub fn display_target(&self) -> bool {
        self.display_target
    }

    /// Set up a subscriber that logs to stdout.
    ///
    /// Returns false if a global subscriber was already installed.
    pub fn setup_tracing_subscriber(&self) -> bool {
        tracing_subscriber::fmt::Subscriber::builder()
            .with_max_level(resolve_level(&self.log_level))
            .with_thread_names(self.display_thread_names)
            .with_thread_ids(self.display_thread_ids)
            .with_target(self.display_target)
            .try_init()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tracing_configuration() {
        let config = TracingConfiguration::default();
        assert_eq!(config.log_level, default_log_level());
        assert_eq!(config.display_thread_names, default_display_thread_names());
        assert_eq!(config.display_thread_ids, default_display_thread_ids());
        assert_eq!(config.display_target, default_display_target());
    }

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level("trace"), Level::TRACE);
        assert_eq!(resolve_level("DEBUG"), Level::DEBUG);
        assert_eq!(resolve_level("info"), Level::INFO);
        assert_eq!(resolve_level("warn"), Level::WARN);
        assert_eq!(resolve_level("error"), Level::ERROR);
        assert_eq!(resolve_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: TracingConfiguration =
            serde_yaml::from_str("log_level: debug\ndisplay_thread_ids: true\n").unwrap();
        assert_eq!(config.log_level(), "debug");
        assert!(config.display_thread_ids());
        assert!(config.display_thread_names());
    }

    #[test]
    fn test_builders() {
        let config = TracingConfiguration::default()
            .with_log_level("warn".to_string())
            .with_display_target(false);
        assert_eq!(config.log_level(), "warn");
        assert!(!config.display_target());
    }
}
