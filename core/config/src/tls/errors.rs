// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors for TLS configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    // File content/read validation
    #[error("error reading {path}: {source}")]
    InvalidFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot use both file and pem for {0}")]
    CannotUseBoth(String),
    // Required artifacts
    #[error("missing server cert or key")]
    MissingServerCertAndKey,
    #[error("missing ca certificate: secure clients need ca_file or ca_pem")]
    MissingCa,
    #[error("client identity needs both a cert and a key")]
    IncompleteIdentity,
}
