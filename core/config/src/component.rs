// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod configuration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("runtime error: {0}")]
    RuntimeError(String),
}

#[async_trait::async_trait]
pub trait Component {
    // Get name of the component
    fn identifier(&self) -> &str;

    // start the component
    async fn start(&mut self) -> Result<(), ComponentError>;

    // stop accepting work and wait for in-flight work to complete
    async fn shutdown(&mut self) -> Result<(), ComponentError>;
}

pub trait ComponentBuilder {
    // Associated types
    type Config;
    type Component: Component;

    /// Kind of the component, used as prefix in configuration keys
    fn kind(&self) -> &'static str;

    /// Build the component
    fn build(&self, name: String) -> Result<Self::Component, ComponentError>;

    /// Build the component with configuration
    fn build_with_config(
        &self,
        name: &str,
        config: &Self::Config,
    ) -> Result<Self::Component, ComponentError>;
}
