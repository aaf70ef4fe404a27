// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod api;
pub mod error_mapper;
pub mod errors;
pub mod forwarder;
pub mod handler;
pub mod metadata;
pub mod results;

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

pub use errors::ServiceError;
pub use forwarder::Forwarder;
pub use handler::LandingHandler;

use landing_config::component::configuration::{Configuration, ConfigurationError};
use landing_config::component::{Component, ComponentBuilder, ComponentError};
use landing_config::grpc::client::ClientConfig;
use landing_config::grpc::server::{ServerConfig, ServerHandle};

use crate::api::LandingServiceServer;
use crate::results::DEFAULT_META;

// Define the kind of the component as static string
pub const KIND: &str = "landing";

/// Default listen port, shared with the client binary.
pub const DEFAULT_PORT: u16 = 9996;

fn default_meta() -> String {
    DEFAULT_META.to_string()
}

fn default_server() -> ServerConfig {
    ServerConfig::with_endpoint(&format!("0.0.0.0:{}", DEFAULT_PORT))
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceConfiguration {
    /// Implementation tag written in every result and in the proxy marker
    #[serde(default = "default_meta")]
    pub meta: String,

    /// Landing GRPC server settings
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    /// When set, every call is relayed to this backend
    #[serde(default)]
    pub backend: Option<ClientConfig>,
}

impl Default for ServiceConfiguration {
    fn default() -> Self {
        ServiceConfiguration {
            meta: default_meta(),
            server: default_server(),
            backend: None,
        }
    }
}

impl ServiceConfiguration {
    pub fn new() -> Self {
        ServiceConfiguration::default()
    }

    pub fn with_meta(self, meta: &str) -> Self {
        ServiceConfiguration {
            meta: meta.to_string(),
            ..self
        }
    }

    pub fn with_server(self, server: ServerConfig) -> Self {
        ServiceConfiguration { server, ..self }
    }

    pub fn with_backend(self, backend: ClientConfig) -> Self {
        ServiceConfiguration {
            backend: Some(backend),
            ..self
        }
    }

    /// Value of the `x-proxy-by` marker added when relaying.
    pub fn hop(&self) -> String {
        format!("{}-proxy", self.meta.to_lowercase())
    }

    pub fn build_server(&self, name: &str) -> Result<Service, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?;
        Ok(Service::new(name).with_config(self.clone()))
    }
}

impl Configuration for ServiceConfiguration {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.meta.is_empty() {
            return Err(ConfigurationError::ConfigError(
                "meta must not be empty".to_string(),
            ));
        }

        self.server.validate()?;

        if let Some(backend) = self.backend.as_ref() {
            backend.validate()?;
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Service {
    name: String,

    config: ServiceConfiguration,

    handle: Option<ServerHandle>,

    signal: Option<drain::Signal>,
}

impl Service {
    pub fn new(name: &str) -> Self {
        Service {
            name: name.to_string(),
            config: ServiceConfiguration::new(),
            handle: None,
            signal: None,
        }
    }

    pub fn with_config(self, config: ServiceConfiguration) -> Self {
        Service { config, ..self }
    }

    pub fn config(&self) -> &ServiceConfiguration {
        &self.config
    }

    /// Address the server is bound to, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.as_ref().map(|h| h.local_addr)
    }

    /// Handler answering locally, or relaying when a backend is configured.
    pub fn handler(&self) -> Result<LandingHandler, ServiceError> {
        let handler = LandingHandler::new(&self.config.meta);

        match self.config.backend.as_ref() {
            Some(backend) => {
                info!(backend = %backend.endpoint, hop = %self.config.hop(), "proxy mode");
                let forwarder = Forwarder::new(backend.clone(), &self.config.hop())?;
                Ok(handler.with_forwarder(Arc::new(forwarder)))
            }
            None => Ok(handler),
        }
    }

    pub async fn run(&mut self) -> Result<SocketAddr, ServiceError> {
        if self.handle.is_some() {
            return Err(ServiceError::AlreadyRunning);
        }

        let handler = self.handler()?;
        let (signal, watch) = drain::channel();

        info!(server = %self.config.server, "starting landing server");
        let handle = self
            .config
            .server
            .run_server(&[LandingServiceServer::new(handler)], watch)
            .await?;

        let local_addr = handle.local_addr;
        self.handle = Some(handle);
        self.signal = Some(signal);

        Ok(local_addr)
    }

    /// Stop accepting calls and wait for in-flight ones to complete.
    pub async fn drain(&mut self) -> Result<(), ServiceError> {
        let signal = self.signal.take().ok_or(ServiceError::NoDrainSignal)?;

        debug!(service = %self.name, "draining service");
        signal.drain().await;
        self.handle = None;

        Ok(())
    }

    /// Stop the server immediately, dropping in-flight calls.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.token.cancel();
        }
        self.signal = None;
    }
}

#[async_trait::async_trait]
impl Component for Service {
    fn identifier(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> Result<(), ComponentError> {
        info!(service = %self.name, "starting service");
        self.run()
            .await
            .map(|_| ())
            .map_err(|e| ComponentError::RuntimeError(e.to_string()))
    }

    async fn shutdown(&mut self) -> Result<(), ComponentError> {
        info!(service = %self.name, "stopping service");
        self.drain()
            .await
            .map_err(|e| ComponentError::RuntimeError(e.to_string()))
    }
}

#[derive(PartialEq, Eq, Hash, Default)]
pub struct ServiceBuilder;

impl ServiceBuilder {
    pub fn new() -> Self {
        ServiceBuilder {}
    }
}

impl ComponentBuilder for ServiceBuilder {
    type Config = ServiceConfiguration;
    type Component = Service;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn build(&self, name: String) -> Result<Self::Component, ComponentError> {
        Ok(Service::new(&name))
    }

    fn build_with_config(
        &self,
        name: &str,
        config: &Self::Config,
    ) -> Result<Self::Component, ComponentError> {
        config
            .build_server(name)
            .map_err(|e| ComponentError::ConfigError(e.to_string()))
    }
}
