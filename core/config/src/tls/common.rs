// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use tonic::transport::{Certificate, Identity};

use super::errors::ConfigError;

/// Certificate material shared by the client and server TLS settings. Every
/// item can be given either as a file path or as inline PEM.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
pub struct Config {
    /// Path to the CA cert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,
    /// In memory PEM encoded CA cert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_pem: Option<String>,

    /// Path to the TLS cert (full chain).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,
    /// In memory PEM encoded TLS cert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_pem: Option<String>,

    /// Path to the private key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
    /// In memory PEM encoded private key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pem: Option<String>,
}

fn read_source(
    what: &str,
    file: &Option<String>,
    pem: &Option<String>,
) -> Result<Option<Vec<u8>>, ConfigError> {
    match (file, pem) {
        (Some(_), Some(_)) => Err(ConfigError::CannotUseBoth(what.to_string())),
        (Some(path), None) => std::fs::read(path)
            .map(Some)
            .map_err(|source| ConfigError::InvalidFile {
                path: path.clone(),
                source,
            }),
        (None, Some(pem)) => Ok(Some(pem.as_bytes().to_vec())),
        (None, None) => Ok(None),
    }
}

impl Config {
    pub fn with_ca_file(self, ca_file: &str) -> Self {
        Config {
            ca_file: Some(ca_file.to_string()),
            ..self
        }
    }

    pub fn with_ca_pem(self, ca_pem: &str) -> Self {
        Config {
            ca_pem: Some(ca_pem.to_string()),
            ..self
        }
    }

    pub fn with_cert_file(self, cert_file: &str) -> Self {
        Config {
            cert_file: Some(cert_file.to_string()),
            ..self
        }
    }

    pub fn with_cert_pem(self, cert_pem: &str) -> Self {
        Config {
            cert_pem: Some(cert_pem.to_string()),
            ..self
        }
    }

    pub fn with_key_file(self, key_file: &str) -> Self {
        Config {
            key_file: Some(key_file.to_string()),
            ..self
        }
    }

    pub fn with_key_pem(self, key_pem: &str) -> Self {
        Config {
            key_pem: Some(key_pem.to_string()),
            ..self
        }
    }

    pub fn has_ca(&self) -> bool {
        self.ca_file.is_some() || self.ca_pem.is_some()
    }

    pub fn has_cert(&self) -> bool {
        self.cert_file.is_some() || self.cert_pem.is_some()
    }

    pub fn has_key(&self) -> bool {
        self.key_file.is_some() || self.key_pem.is_some()
    }

    pub(crate) fn check_sources(&self) -> Result<(), ConfigError> {
        if self.ca_file.is_some() && self.ca_pem.is_some() {
            return Err(ConfigError::CannotUseBoth("ca".to_string()));
        }
        if self.cert_file.is_some() && self.cert_pem.is_some() {
            return Err(ConfigError::CannotUseBoth("cert".to_string()));
        }
        if self.key_file.is_some() && self.key_pem.is_some() {
            return Err(ConfigError::CannotUseBoth("key".to_string()));
        }
        Ok(())
    }

    pub(crate) fn load_ca(&self) -> Result<Option<Certificate>, ConfigError> {
        Ok(read_source("ca", &self.ca_file, &self.ca_pem)?.map(Certificate::from_pem))
    }

    pub(crate) fn load_identity(&self) -> Result<Option<Identity>, ConfigError> {
        let cert = read_source("cert", &self.cert_file, &self.cert_pem)?;
        let key = read_source("key", &self.key_file, &self.key_pem)?;

        match (cert, key) {
            (Some(cert), Some(key)) => Ok(Some(Identity::from_pem(cert, key))),
            (None, None) => Ok(None),
            _ => Err(ConfigError::IncompleteIdentity),
        }
    }
}
