// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0
//
// ConfigLoader parses the configuration file once and exposes lazy, cached
// accessors for each section. Every section is optional: binaries fill the
// gaps from their command line.

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::runtime::RuntimeConfiguration;
use landing_config::component::ComponentBuilder;
use landing_config::component::configuration::Configuration;
use landing_config::grpc::client::ClientConfig;
use landing_service::{Service, ServiceBuilder, ServiceConfiguration};
use landing_tracing::TracingConfiguration;

#[derive(Error, Debug)]
pub enum ConfigLoaderError {
    // File / I/O
    #[error("not found: {0}")]
    NotFound(String),

    // Parsing / structural validity
    #[error("invalid configuration - impossible to parse yaml")]
    InvalidYaml,
    #[error("invalid configuration - key {0} not valid")]
    InvalidKey(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),

    // YAML decoding
    #[error("yaml parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    // Services
    #[error("invalid configuration - missing services")]
    InvalidNoServices,
    #[error("duplicate service {0}")]
    DuplicateService(String),
}

lazy_static! {
    static ref CONFIG_KEYS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("tracing");
        s.insert("runtime");
        s.insert("services");
        s.insert("client");
        s
    };
}

pub struct ConfigLoader {
    root: Value,
    tracing: Option<TracingConfiguration>,
    runtime: Option<RuntimeConfiguration>,
    services: Option<HashMap<String, Service>>,
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let root_keys = self
            .root
            .as_mapping()
            .map(|m| {
                m.keys()
                    .filter_map(|k| k.as_str())
                    .map(|s| s.to_string())
                    .collect::<Vec<String>>()
            })
            .unwrap_or_default();

        f.debug_struct("ConfigLoader")
            .field("root_keys", &root_keys)
            .field("tracing_loaded", &self.tracing.is_some())
            .field("runtime_loaded", &self.runtime.is_some())
            .field("services_count", &self.services.as_ref().map(|m| m.len()))
            .finish()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        ConfigLoader {
            root: Value::Mapping(Mapping::new()),
            tracing: None,
            runtime: None,
            services: None,
        }
    }
}

impl ConfigLoader {
    pub fn new(file_path: &str) -> Result<Self, ConfigLoaderError> {
        let config_str = std::fs::read_to_string(file_path)
            .map_err(|e| ConfigLoaderError::NotFound(format!("{}: {}", file_path, e)))?;
        ConfigLoader::parse(&config_str)
    }

    /// Loader over the file at `file_path`, or over an empty configuration.
    pub fn from_optional_file(file_path: Option<&str>) -> Result<Self, ConfigLoaderError> {
        match file_path {
            Some(path) => ConfigLoader::new(path),
            None => Ok(ConfigLoader::default()),
        }
    }

    pub fn parse(config_str: &str) -> Result<Self, ConfigLoaderError> {
        let root: Value =
            serde_yaml::from_str(config_str).map_err(|_| ConfigLoaderError::InvalidYaml)?;

        // an empty document is an empty configuration
        let root = match root {
            Value::Null => Value::Mapping(Mapping::new()),
            other => other,
        };

        let mapping = root.as_mapping().ok_or(ConfigLoaderError::InvalidYaml)?;
        for key in mapping.keys() {
            let k = key.as_str().ok_or(ConfigLoaderError::InvalidYaml)?;
            if !CONFIG_KEYS.contains(k) {
                return Err(ConfigLoaderError::InvalidKey(k.to_string()));
            }
        }

        Ok(ConfigLoader {
            root,
            ..Default::default()
        })
    }

    pub fn has_section(&self, key: &str) -> bool {
        self.root.get(key).is_some()
    }

    pub fn tracing(&mut self) -> &TracingConfiguration {
        let root = &self.root;
        self.tracing
            .get_or_insert_with(|| section_or_default(root, "tracing"))
    }

    pub fn runtime(&mut self) -> &RuntimeConfiguration {
        let root = &self.root;
        self.runtime
            .get_or_insert_with(|| section_or_default(root, "runtime"))
    }

    /// Client settings of the demo client, if the file has a `client` section.
    pub fn client(&self) -> Result<Option<ClientConfig>, ConfigLoaderError> {
        let Some(value) = self.root.get("client") else {
            return Ok(None);
        };

        let config: ClientConfig = serde_yaml::from_value(value.clone())?;
        config
            .validate()
            .map_err(|e| ConfigLoaderError::Invalid(e.to_string()))?;
        Ok(Some(config))
    }

    /// Add a service built from `config`, next to the ones of the file.
    pub fn with_service(
        mut self,
        name: &str,
        config: &ServiceConfiguration,
    ) -> Result<Self, ConfigLoaderError> {
        let service = resolve_component(name, ServiceBuilder::new(), config)?;

        let mut services = match self.services.take() {
            Some(services) => services,
            None if self.has_section("services") => parse_services(&self.root)?,
            None => HashMap::new(),
        };

        if services.contains_key(name) {
            return Err(ConfigLoaderError::DuplicateService(name.to_string()));
        }
        services.insert(name.to_string(), service);
        self.services = Some(services);

        Ok(self)
    }

    pub fn services(&mut self) -> Result<&mut HashMap<String, Service>, ConfigLoaderError> {
        let services = match self.services.take() {
            Some(services) => services,
            None => parse_services(&self.root)?,
        };

        if services.is_empty() {
            return Err(ConfigLoaderError::InvalidNoServices);
        }

        let names: Vec<_> = services.keys().collect();
        debug!(count = services.len(), ?names, "services configuration loaded");

        Ok(self.services.insert(services))
    }
}

fn section_or_default<T>(root: &Value, key: &str) -> T
where
    T: DeserializeOwned + Default + std::fmt::Debug,
{
    let cfg = root
        .get(key)
        .cloned()
        .map(|v| {
            serde_yaml::from_value(v).unwrap_or_else(|e| {
                warn!(section = key, error = %e, "invalid configuration, falling back to default");
                T::default()
            })
        })
        .unwrap_or_default();
    debug!(section = key, ?cfg, "configuration loaded");
    cfg
}

fn resolve_component<B>(
    name: &str,
    builder: B,
    config: &B::Config,
) -> Result<B::Component, ConfigLoaderError>
where
    B: ComponentBuilder,
    B::Config: Configuration,
{
    config.validate().map_err(|e| {
        debug!(error = %e, "component configuration validation failed");
        ConfigLoaderError::Invalid(e.to_string())
    })?;
    debug!(component = name, kind = builder.kind(), "resolved component configuration");

    builder
        .build_with_config(name, config)
        .map_err(|e| ConfigLoaderError::Invalid(e.to_string()))
}

/// Service keys have the form `<kind>/<name>`, e.g. `landing/main`.
fn parse_services(root: &Value) -> Result<HashMap<String, Service>, ConfigLoaderError> {
    let service_val = root
        .get("services")
        .ok_or(ConfigLoaderError::InvalidNoServices)?;
    let service_map = service_val
        .as_mapping()
        .ok_or(ConfigLoaderError::InvalidYaml)?;

    let mut services = HashMap::new();
    for (key, value) in service_map {
        let id = key.as_str().ok_or(ConfigLoaderError::InvalidYaml)?;
        let name = match id.split_once('/') {
            Some((kind, name)) if kind == landing_service::KIND && !name.is_empty() => name,
            _ => return Err(ConfigLoaderError::InvalidKey(id.to_string())),
        };

        let config: ServiceConfiguration = serde_yaml::from_value(value.clone())?;
        let service = resolve_component(name, ServiceBuilder::new(), &config)?;
        services.insert(name.to_string(), service);
    }

    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn testdata(file: &str) -> String {
        format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), file)
    }

    #[test]
    #[traced_test]
    fn test_full_config() {
        let mut loader = ConfigLoader::new(&testdata("config.yaml")).unwrap();

        assert_eq!(loader.tracing().log_level(), "debug");
        assert_eq!(loader.runtime().drain_timeout(), Duration::from_secs(5));

        let client = loader.client().unwrap().unwrap();
        assert_eq!(client.endpoint, "localhost:9996");

        let services = loader.services().unwrap();
        assert_eq!(services.len(), 2);
        let proxy = services.get("proxy").unwrap();
        assert_eq!(proxy.config().hop(), "rust-proxy");
        assert!(proxy.config().backend.is_some());
        assert!(services.get("main").unwrap().config().backend.is_none());
    }

    #[test]
    fn test_sample_server_config() {
        let mut loader = ConfigLoader::new(&testdata("server.yaml")).unwrap();
        assert!(loader.tracing().display_thread_names());
        assert!(loader.client().unwrap().is_none());

        let services = loader.services().unwrap();
        let main = services.get("main").unwrap();
        assert_eq!(main.config().server.endpoint, "0.0.0.0:9996");
        assert!(main.config().server.tls_setting.insecure);
    }

    #[test]
    #[traced_test]
    fn test_missing_services_affects_only_services() {
        let mut loader = ConfigLoader::new(&testdata("config-no-services.yaml")).unwrap();
        assert_eq!(loader.tracing().log_level(), "info");
        let _ = loader.runtime();
        assert!(matches!(
            loader.services(),
            Err(ConfigLoaderError::InvalidNoServices)
        ));
    }

    #[test]
    #[traced_test]
    fn test_invalid_files() {
        assert!(matches!(
            ConfigLoader::new(&testdata("does-not-exist.yaml")),
            Err(ConfigLoaderError::NotFound(_))
        ));
        assert!(matches!(
            ConfigLoader::new(&testdata("config-invalid-key.yaml")),
            Err(ConfigLoaderError::InvalidKey(_))
        ));

        let mut loader = ConfigLoader::new(&testdata("config-invalid-service.yaml")).unwrap();
        assert!(loader.services().is_err());
    }

    #[test]
    fn test_empty_config() {
        let mut loader = ConfigLoader::parse("").unwrap();
        assert_eq!(loader.runtime(), &RuntimeConfiguration::default());
        assert!(loader.client().unwrap().is_none());
        assert!(loader.services().is_err());
    }

    #[test]
    fn test_with_service() {
        let config = ServiceConfiguration::default();
        let mut loader = ConfigLoader::default()
            .with_service("main", &config)
            .unwrap();
        assert_eq!(loader.services().unwrap().len(), 1);

        let res = ConfigLoader::default()
            .with_service("main", &config)
            .and_then(|l| l.with_service("main", &config));
        assert!(matches!(res, Err(ConfigLoaderError::DuplicateService(_))));
    }

    #[test]
    #[traced_test]
    fn test_invalid_section_falls_back_to_default() {
        let mut loader = ConfigLoader::parse("runtime:\n  n_cores: many\n").unwrap();
        assert_eq!(loader.runtime(), &RuntimeConfiguration::default());
        assert!(logs_contain("falling back to default"));
    }
}
