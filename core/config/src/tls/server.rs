// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use tonic::transport::ServerTlsConfig;

use super::common::Config;
use super::errors::ConfigError;
use crate::component::configuration::{Configuration, ConfigurationError};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TlsServerConfig {
    /// Certificate material
    #[serde(flatten, default)]
    pub config: Config,

    /// insecure do not setup a TLS server
    #[serde(default = "default_insecure")]
    pub insecure: bool,
}

impl Default for TlsServerConfig {
    fn default() -> Self {
        TlsServerConfig {
            config: Config::default(),
            insecure: default_insecure(),
        }
    }
}

fn default_insecure() -> bool {
    true
}

impl std::fmt::Display for TlsServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TlsServerConfig {
    pub fn new() -> Self {
        TlsServerConfig::default()
    }

    pub fn with_insecure(self, insecure: bool) -> Self {
        TlsServerConfig { insecure, ..self }
    }

    pub fn with_cert_and_key_file(self, cert_path: &str, key_path: &str) -> Self {
        TlsServerConfig {
            config: self
                .config
                .with_cert_file(cert_path)
                .with_key_file(key_path),
            ..self
        }
    }

    /// Require client certificates signed by this CA.
    pub fn with_client_ca_file(self, ca_path: &str) -> Self {
        TlsServerConfig {
            config: self.config.with_ca_file(ca_path),
            ..self
        }
    }

    /// Build the tonic TLS settings, or None for a plaintext server.
    pub fn load_tls_config(&self) -> Result<Option<ServerTlsConfig>, ConfigError> {
        if self.insecure {
            return Ok(None);
        }

        let identity = self
            .config
            .load_identity()?
            .ok_or(ConfigError::MissingServerCertAndKey)?;

        let mut tls = ServerTlsConfig::new().identity(identity);
        if let Some(ca) = self.config.load_ca()? {
            tls = tls.client_ca_root(ca);
        }

        Ok(Some(tls))
    }
}

impl Configuration for TlsServerConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.insecure {
            return Ok(());
        }

        self.config
            .check_sources()
            .map_err(|e| ConfigurationError::ConfigError(e.to_string()))?;

        if !self.config.has_cert() || !self.config.has_key() {
            return Err(ConfigurationError::ConfigError(
                ConfigError::MissingServerCertAndKey.to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insecure_server_has_no_tls() {
        let config = TlsServerConfig::new();
        assert!(config.insecure);
        assert!(config.validate().is_ok());
        assert!(config.load_tls_config().unwrap().is_none());
    }

    #[test]
    fn test_secure_server_requires_cert_and_key() {
        let config = TlsServerConfig::new().with_insecure(false);
        assert!(config.validate().is_err());
        assert!(matches!(
            config.load_tls_config(),
            Err(ConfigError::MissingServerCertAndKey)
        ));

        let config = config.with_cert_and_key_file("/certs/cert.pem", "/certs/key.pem");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_flattened() {
        let config: TlsServerConfig = serde_yaml::from_str(
            "insecure: false\ncert_file: /certs/cert.pem\nkey_file: /certs/key.pem\n",
        )
        .unwrap();
        assert!(!config.insecure);
        assert_eq!(config.config.cert_file.as_deref(), Some("/certs/cert.pem"));
        assert_eq!(config.config.key_file.as_deref(), Some("/certs/key.pem"));
    }
}
