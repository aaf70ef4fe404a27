// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use display_error_chain::ErrorChainExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::{net::SocketAddr, str::FromStr};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::body::Body;
use tonic::codegen::Service;
use tonic::codegen::http::{Request, Response};
use tonic::server::NamedService;
use tonic::transport::Server;
use tracing::{debug, error, info};

use super::errors::ConfigError;
use crate::component::configuration::{Configuration, ConfigurationError};
use crate::tls::server::TlsServerConfig as TLSSetting;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ServerConfig {
    /// Endpoint is the address to listen on.
    pub endpoint: String,

    /// Configures the protocol to use TLS.
    #[serde(default, rename = "tls")]
    pub tls_setting: TLSSetting,

    /// MaxConcurrentStreams sets the limit on the number of concurrent streams to each connection.
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            tls_setting: TLSSetting::default(),
            max_concurrent_streams: default_max_concurrent_streams(),
        }
    }
}

fn default_max_concurrent_streams() -> Option<u32> {
    Some(100)
}

/// Display implementation for ServerConfig
/// This is used to print the ServerConfig in a human-readable format.
impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ServerConfig {{ endpoint: {}, tls_setting: {}, max_concurrent_streams: {:?} }}",
            self.endpoint, self.tls_setting, self.max_concurrent_streams,
        )
    }
}

impl Configuration for ServerConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.endpoint.is_empty() {
            return Err(ConfigurationError::ConfigError(
                ConfigError::MissingEndpoint.to_string(),
            ));
        }

        SocketAddr::from_str(&self.endpoint)
            .map_err(|e| ConfigurationError::ConfigError(ConfigError::from(e).to_string()))?;

        self.tls_setting.validate()
    }
}

/// A server accepting connections in a background task.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    /// Address the listener is bound to (resolves port 0).
    pub local_addr: SocketAddr,

    /// Cancel to stop the server without draining the service.
    pub token: CancellationToken,
}

impl ServerConfig {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    pub fn with_tls_settings(self, tls_setting: TLSSetting) -> Self {
        Self {
            tls_setting,
            ..self
        }
    }

    pub fn with_max_concurrent_streams(self, max_concurrent_streams: Option<u32>) -> Self {
        Self {
            max_concurrent_streams,
            ..self
        }
    }

    fn server_builder(&self) -> Result<Server, ConfigError> {
        let mut builder = Server::builder().max_concurrent_streams(self.max_concurrent_streams);

        if let Some(tls) = self.tls_setting.load_tls_config()? {
            builder = builder.tls_config(tls)?;
        }

        Ok(builder)
    }

    /// Bind the listener and serve `svc` until the drain signal fires or the
    /// returned token is cancelled.
    ///
    /// On drain, the server stops accepting connections and the drain only
    /// completes once every in-flight call has finished.
    pub async fn run_server<S>(
        &self,
        svc: &[S],
        drain_rx: drain::Watch,
    ) -> Result<ServerHandle, ConfigError>
    where
        S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        debug!(%self, "server configured: setting it up");

        if svc.is_empty() {
            return Err(ConfigError::MissingServices);
        }

        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }

        let addr = SocketAddr::from_str(self.endpoint.as_str())?;
        let mut builder = self.server_builder()?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let incoming = TcpListenerStream::new(listener);

        let mut router = builder.add_service(svc[0].clone());
        for s in svc.iter().skip(1) {
            router = router.add_service(s.clone());
        }

        let token = CancellationToken::new();
        let shutdown_token = token.clone();

        tokio::spawn(async move {
            // keeps the drain pending until the server has returned
            let in_flight = drain_rx.clone();

            let shutdown = async move {
                tokio::select! {
                    _ = drain_rx.signaled() => {
                        debug!("shutting down server");
                    }
                    _ = shutdown_token.cancelled() => {
                        debug!("cancellation token triggered: shutting down server");
                    }
                }
            };

            debug!("starting server main loop");
            match router.serve_with_incoming_shutdown(incoming, shutdown).await {
                Ok(_) => {
                    debug!(%local_addr, "server shutdown");
                }
                Err(e) => {
                    error!(error = %e.chain(), "server error");
                }
            }

            drop(in_flight);
        });

        info!(%local_addr, tls = !self.tls_setting.insecure, "server listening");

        Ok(ServerHandle { local_addr, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_config() {
        let server_config = ServerConfig::default();
        assert_eq!(server_config.endpoint, String::new());
        assert_eq!(server_config.tls_setting, TLSSetting::default());
        assert_eq!(server_config.max_concurrent_streams, Some(100));
        assert!(server_config.validate().is_err());
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(ServerConfig::with_endpoint("[::1]:9996").validate().is_ok());
        assert!(ServerConfig::with_endpoint("0.0.0.0:9996").validate().is_ok());
        assert!(ServerConfig::with_endpoint("localhost").validate().is_err());
    }

    #[test]
    fn test_server_config_from_yaml() {
        let config: ServerConfig = serde_yaml::from_str(
            r#"
endpoint: "127.0.0.1:9996"
tls:
  insecure: false
  cert_file: /certs/cert.pem
  key_file: /certs/private.key
"#,
        )
        .unwrap();

        assert_eq!(config.endpoint, "127.0.0.1:9996");
        assert!(!config.tls_setting.insecure);
        assert_eq!(config.max_concurrent_streams, Some(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secure_server_without_identity_fails_to_build() {
        let config = ServerConfig::with_endpoint("127.0.0.1:0")
            .with_tls_settings(TLSSetting::new().with_insecure(false));
        assert!(matches!(
            config.server_builder(),
            Err(ConfigError::TlsConfig(_))
        ));
    }
}
