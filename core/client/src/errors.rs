// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;
use tonic::Status;

use landing_config::grpc::errors::ConfigError;
use landing_service::error_mapper::{ErrorStatus, classify};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{method} failed: {status}")]
    Rpc {
        method: &'static str,
        #[source]
        status: ErrorStatus,
    },
    #[error("connection error: {0}")]
    Connection(#[from] ConfigError),
    #[error("invalid metadata value: {0}")]
    Metadata(#[from] tonic::metadata::errors::InvalidMetadataValue),
    #[error("send task failed: {0}")]
    SendTask(#[from] tokio::task::JoinError),
    #[error("{operation} failed after {attempts} attempts")]
    MaxRetriesExceeded {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },
}

impl ClientError {
    pub fn rpc(method: &'static str, status: Status) -> Self {
        ClientError::Rpc {
            method,
            status: classify(status),
        }
    }

    /// Transient failures: the whole attempt may succeed if run again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Rpc { status, .. } => status.is_retryable(),
            ClientError::Connection(ConfigError::Transport(_)) => true,
            _ => false,
        }
    }

    /// The classified status of the failed call, if the call reached the wire.
    pub fn error_status(&self) -> Option<&ErrorStatus> {
        match self {
            ClientError::Rpc { status, .. } => Some(status),
            ClientError::MaxRetriesExceeded { last, .. } => last.error_status(),
            _ => None,
        }
    }
}
