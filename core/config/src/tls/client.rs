// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use tonic::transport::ClientTlsConfig;

use super::common::Config;
use super::errors::ConfigError;
use crate::component::configuration::{Configuration, ConfigurationError};

/// Server name the demo certificates are issued for.
pub const DEFAULT_DOMAIN_NAME: &str = "hello.grpc.io";

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TlsClientConfig {
    /// Certificate material: the CA to trust plus an optional client identity
    #[serde(flatten, default)]
    pub config: Config,

    /// insecure do not use TLS at all
    #[serde(default = "default_insecure")]
    pub insecure: bool,

    /// Name checked against the server certificate
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
}

impl Default for TlsClientConfig {
    fn default() -> Self {
        TlsClientConfig {
            config: Config::default(),
            insecure: default_insecure(),
            domain_name: default_domain_name(),
        }
    }
}

fn default_insecure() -> bool {
    true
}

fn default_domain_name() -> String {
    DEFAULT_DOMAIN_NAME.to_string()
}

impl std::fmt::Display for TlsClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TlsClientConfig {
    pub fn new() -> Self {
        TlsClientConfig::default()
    }

    pub fn with_insecure(self, insecure: bool) -> Self {
        TlsClientConfig { insecure, ..self }
    }

    pub fn with_ca_file(self, ca_path: &str) -> Self {
        TlsClientConfig {
            config: self.config.with_ca_file(ca_path),
            ..self
        }
    }

    pub fn with_cert_and_key_file(self, cert_path: &str, key_path: &str) -> Self {
        TlsClientConfig {
            config: self
                .config
                .with_cert_file(cert_path)
                .with_key_file(key_path),
            ..self
        }
    }

    pub fn with_domain_name(self, domain_name: &str) -> Self {
        TlsClientConfig {
            domain_name: domain_name.to_string(),
            ..self
        }
    }

    /// Build the tonic TLS settings, or None for a plaintext channel.
    pub fn load_tls_config(&self) -> Result<Option<ClientTlsConfig>, ConfigError> {
        if self.insecure {
            return Ok(None);
        }

        let ca = self.config.load_ca()?.ok_or(ConfigError::MissingCa)?;
        let mut tls = ClientTlsConfig::new()
            .domain_name(self.domain_name.clone())
            .ca_certificate(ca);

        if let Some(identity) = self.config.load_identity()? {
            tls = tls.identity(identity);
        }

        Ok(Some(tls))
    }
}

impl Configuration for TlsClientConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.insecure {
            return Ok(());
        }

        self.config
            .check_sources()
            .map_err(|e| ConfigurationError::ConfigError(e.to_string()))?;

        if !self.config.has_ca() {
            return Err(ConfigurationError::ConfigError(
                ConfigError::MissingCa.to_string(),
            ));
        }

        if self.config.has_cert() != self.config.has_key() {
            return Err(ConfigurationError::ConfigError(
                ConfigError::IncompleteIdentity.to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_tls() {
        let config = TlsClientConfig::default();
        assert!(config.insecure);
        assert_eq!(config.domain_name, DEFAULT_DOMAIN_NAME);
        assert!(config.load_tls_config().unwrap().is_none());
    }

    #[test]
    fn test_secure_client_requires_ca() {
        let config = TlsClientConfig::new().with_insecure(false);
        assert!(config.validate().is_err());
        assert!(matches!(
            config.load_tls_config(),
            Err(ConfigError::MissingCa)
        ));

        let config = config.with_ca_file("/certs/full_chain.pem");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secure_client_identity_must_be_complete() {
        let mut config = TlsClientConfig::new()
            .with_insecure(false)
            .with_ca_file("/certs/full_chain.pem");
        config.config.cert_file = Some("/certs/cert.pem".to_string());
        assert!(config.validate().is_err());
    }
}
