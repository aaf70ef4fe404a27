// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;
use tonic::Status;
use tracing::warn;

use crate::error_mapper::classify;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("configuration error {0}")]
    ConfigError(String),
    #[error("grpc configuration error: {0}")]
    GrpcConfig(#[from] landing_config::grpc::errors::ConfigError),
    #[error("invalid metadata value: {0}")]
    Metadata(#[from] tonic::metadata::errors::InvalidMetadataValue),
    #[error("call failed: {0}")]
    Backend(#[from] Status),
    #[error("relay task failed: {0}")]
    RelayTask(#[from] tokio::task::JoinError),
    #[error("server already running")]
    AlreadyRunning,
    #[error("drain signal missing")]
    NoDrainSignal,
}

/// Every failure leaving a service method goes through the error mapper.
impl From<ServiceError> for Status {
    fn from(error: ServiceError) -> Self {
        let mapped = classify(error);
        warn!(
            kind = %mapped.kind(),
            description = mapped.description(),
            "call failed"
        );
        mapped.into_status()
    }
}
