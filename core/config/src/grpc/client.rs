// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use duration_str::{deserialize_duration, deserialize_option_duration};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, str::FromStr, time::Duration};
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use super::errors::ConfigError;
use crate::backoff::RetryPolicy;
use crate::component::configuration::{Configuration, ConfigurationError};
use crate::tls::client::TlsClientConfig as TLSSetting;

/// Struct for the client configuration.
/// It describes how to reach one landing server: endpoint, TLS settings,
/// timeouts, the static headers attached to every call and the retry policy
/// used by callers that retry whole attempts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClientConfig {
    /// The target the client will connect to, as `host:port` or a full URI.
    pub endpoint: String,

    /// TLS client configuration.
    #[serde(default, rename = "tls")]
    pub tls_setting: TLSSetting,

    /// Timeout for the connection.
    #[serde(
        default = "default_connect_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub connect_timeout: Duration,

    /// Timeout per request. None means no deadline.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub request_timeout: Option<Duration>,

    /// The headers associated with gRPC requests.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Retry policy for whole call attempts.
    #[serde(default)]
    pub backoff: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint: String::new(),
            tls_setting: TLSSetting::default(),
            connect_timeout: default_connect_timeout(),
            request_timeout: None,
            headers: HashMap::new(),
            backoff: RetryPolicy::default(),
        }
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

impl std::fmt::Display for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ClientConfig {{ endpoint: {}, tls: {}, connect_timeout: {:?}, request_timeout: {:?}, headers: {:?}, backoff: {} }}",
            self.endpoint,
            self.tls_setting,
            self.connect_timeout,
            self.request_timeout,
            self.headers,
            self.backoff
        )
    }
}

impl Configuration for ClientConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.endpoint.is_empty() {
            return Err(ConfigurationError::ConfigError(
                ConfigError::MissingEndpoint.to_string(),
            ));
        }

        self.metadata()
            .map_err(|e| ConfigurationError::ConfigError(e.to_string()))?;

        self.tls_setting.validate()?;
        self.backoff.validate()
    }
}

impl ClientConfig {
    pub fn with_endpoint(endpoint: &str) -> Self {
        ClientConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    pub fn with_tls_setting(self, tls_setting: TLSSetting) -> Self {
        ClientConfig {
            tls_setting,
            ..self
        }
    }

    pub fn with_connect_timeout(self, connect_timeout: Duration) -> Self {
        ClientConfig {
            connect_timeout,
            ..self
        }
    }

    pub fn with_request_timeout(self, request_timeout: Duration) -> Self {
        ClientConfig {
            request_timeout: Some(request_timeout),
            ..self
        }
    }

    pub fn with_headers(self, headers: HashMap<String, String>) -> Self {
        ClientConfig { headers, ..self }
    }

    pub fn with_backoff(self, backoff: RetryPolicy) -> Self {
        ClientConfig { backoff, ..self }
    }

    /// Endpoint as a URI, adding the scheme implied by the TLS setting when missing.
    pub fn uri(&self) -> String {
        if self.endpoint.contains("://") {
            return self.endpoint.clone();
        }

        let scheme = if self.tls_setting.insecure {
            "http"
        } else {
            "https"
        };
        format!("{}://{}", scheme, self.endpoint)
    }

    /// The configured headers as gRPC metadata.
    pub fn metadata(&self) -> Result<MetadataMap, ConfigError> {
        let mut metadata = MetadataMap::new();
        for (key, value) in &self.headers {
            let key = MetadataKey::from_str(key)?;
            let value = MetadataValue::try_from(value.as_str())?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }

    pub fn to_endpoint(&self) -> Result<Endpoint, ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }

        let mut endpoint = Endpoint::from_shared(self.uri())?.connect_timeout(self.connect_timeout);

        if let Some(timeout) = self.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }

        if let Some(tls) = self.tls_setting.load_tls_config()? {
            endpoint = endpoint.tls_config(tls)?;
        }

        Ok(endpoint)
    }

    /// Connect eagerly, so that an unreachable server fails here.
    pub async fn to_channel(&self) -> Result<Channel, ConfigError> {
        let endpoint = self.to_endpoint()?;
        debug!(uri = %self.uri(), "connecting");
        let channel = endpoint.connect().await?;
        debug!(uri = %self.uri(), "connected");
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_default_client_config() {
        let config = ClientConfig::default();
        assert!(config.endpoint.is_empty());
        assert!(config.tls_setting.insecure);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, None);
        assert!(config.headers.is_empty());
        assert_eq!(config.backoff, RetryPolicy::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_uri_scheme() {
        let plain = ClientConfig::with_endpoint("localhost:9996");
        assert_eq!(plain.uri(), "http://localhost:9996");

        let secure = ClientConfig::with_endpoint("localhost:9996")
            .with_tls_setting(TLSSetting::new().with_insecure(false));
        assert_eq!(secure.uri(), "https://localhost:9996");

        let explicit = ClientConfig::with_endpoint("http://[::1]:9996");
        assert_eq!(explicit.uri(), "http://[::1]:9996");
    }

    #[test]
    fn test_metadata_from_headers() {
        let config = ClientConfig::with_endpoint("localhost:9996").with_headers(HashMap::from([
            ("k1".to_string(), "v1".to_string()),
            ("k2".to_string(), "v2".to_string()),
        ]));
        let metadata = config.metadata().unwrap();
        assert_eq!(metadata.get("k1").unwrap(), "v1");
        assert_eq!(metadata.get("k2").unwrap(), "v2");
        assert!(config.validate().is_ok());

        let invalid = ClientConfig::with_endpoint("localhost:9996")
            .with_headers(HashMap::from([("bad key".to_string(), "v".to_string())]));
        assert!(matches!(
            invalid.metadata(),
            Err(ConfigError::HeaderNameParse(_))
        ));
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_client_config_from_yaml() {
        let config: ClientConfig = serde_yaml::from_str(
            r#"
endpoint: "backend:9996"
connect_timeout: 2s
request_timeout: 500ms
headers:
  k1: v1
backoff:
  max_retries: 5
  initial_delay: 100ms
"#,
        )
        .unwrap();

        assert_eq!(config.endpoint, "backend:9996");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Some(Duration::from_millis(500)));
        assert_eq!(config.headers.get("k1").map(String::as_str), Some("v1"));
        assert_eq!(config.backoff.max_retries(), 5);
        assert_eq!(config.backoff.initial_delay(), Duration::from_millis(100));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_connect_refused() {
        // bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::with_endpoint(&addr.to_string())
            .with_connect_timeout(Duration::from_secs(1));
        let res = config.to_channel().await;
        assert!(matches!(res, Err(ConfigError::Transport(_))));
    }

    #[tokio::test]
    async fn test_missing_endpoint() {
        let res = ClientConfig::default().to_channel().await;
        assert!(matches!(res, Err(ConfigError::MissingEndpoint)));
    }
}
