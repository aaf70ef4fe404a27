// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors for Config.
/// This is a custom error type for handling configuration-related errors.
/// It is used to provide more context to the error messages.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing the grpc server service")]
    MissingServices,
    #[error("missing grpc endpoint")]
    MissingEndpoint,
    #[error("endpoint parse error: {0}")]
    EndpointParse(#[from] std::net::AddrParseError),
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("bind error: {0}")]
    Bind(#[from] std::io::Error),
    #[error("header name parse error: {0}")]
    HeaderNameParse(#[from] tonic::metadata::errors::InvalidMetadataKey),
    #[error("header value parse error: {0}")]
    HeaderValueParse(#[from] tonic::metadata::errors::InvalidMetadataValue),
    #[error("TLS config error: {0}")]
    TlsConfig(#[from] crate::tls::errors::ConfigError),
}
