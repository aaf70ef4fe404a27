// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::Duration;

use clap::{ArgAction, Args, Parser};

use landing_client::CallOptions;
use landing_config::grpc::client::ClientConfig;
use landing_config::grpc::server::ServerConfig;
use landing_config::tls::client::TlsClientConfig;
use landing_config::tls::server::TlsServerConfig;
use landing_service::{DEFAULT_PORT, ServiceConfiguration};

const SERVER_CERT: &str = "/var/hello_grpc/server_certs/cert.pem";
const SERVER_KEY: &str = "/var/hello_grpc/server_certs/private.key";
const CLIENT_CERT: &str = "/var/hello_grpc/client_certs/full_chain.pem";
const CLIENT_KEY: &str = "/var/hello_grpc/client_certs/private.key";
const CLIENT_CA: &str = "/var/hello_grpc/client_certs/myssl_root.cer";

/// Headers the demo client attaches to every call.
pub const DEMO_HEADERS: [(&str, &str); 2] = [("k1", "v1"), ("k2", "v2")];

/// Accepts `Y`/`N` the way the deployment scripts set them, plus the usual
/// boolean spellings.
fn parse_flag(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Ok(true),
        "" | "n" | "no" | "false" | "0" => Ok(false),
        other => Err(format!("expected Y or N, got {}", other)),
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    duration_str::parse(value).map_err(|e| e.to_string())
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct TlsArgs {
    /// Enable TLS (Y or N)
    #[arg(
        long,
        env = "GRPC_HELLO_SECURE",
        value_parser = parse_flag,
        default_value = "N",
        action = ArgAction::Set
    )]
    secure: bool,

    /// Certificate chain file
    #[arg(long, env = "GRPC_HELLO_CERT", value_name = "FILE")]
    cert: Option<String>,

    /// Private key file
    #[arg(long, env = "GRPC_HELLO_KEY", value_name = "FILE")]
    key: Option<String>,

    /// Root CA file
    #[arg(long, env = "GRPC_HELLO_CA", value_name = "FILE")]
    ca: Option<String>,
}

impl TlsArgs {
    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn server_tls(&self) -> TlsServerConfig {
        if !self.secure {
            return TlsServerConfig::new();
        }

        let tls = TlsServerConfig::new().with_insecure(false).with_cert_and_key_file(
            self.cert.as_deref().unwrap_or(SERVER_CERT),
            self.key.as_deref().unwrap_or(SERVER_KEY),
        );
        match self.ca.as_deref() {
            Some(ca) => tls.with_client_ca_file(ca),
            None => tls,
        }
    }

    pub fn client_tls(&self) -> TlsClientConfig {
        if !self.secure {
            return TlsClientConfig::new();
        }

        TlsClientConfig::new()
            .with_insecure(false)
            .with_ca_file(self.ca.as_deref().unwrap_or(CLIENT_CA))
            .with_cert_and_key_file(
                self.cert.as_deref().unwrap_or(CLIENT_CERT),
                self.key.as_deref().unwrap_or(CLIENT_KEY),
            )
    }
}

#[derive(Parser, Debug)]
#[command(about = "Landing gRPC server", long_about = None, disable_version_flag = true)]
pub struct ServerArgs {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", env = "LANDING_CONFIG")]
    config: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "GRPC_SERVER_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Tag written in every result
    #[arg(long, default_value = landing_service::results::DEFAULT_META)]
    meta: String,

    /// Relay every call to this host instead of answering locally
    #[arg(long, env = "GRPC_HELLO_BACKEND")]
    backend: Option<String>,

    /// Backend port, defaults to the listen port
    #[arg(long, env = "GRPC_HELLO_BACKEND_PORT")]
    backend_port: Option<u16>,

    #[command(flatten)]
    tls: TlsArgs,

    /// Print build information and exit
    #[arg(short = 'V', long, action = ArgAction::SetTrue)]
    version: bool,
}

impl ServerArgs {
    pub fn config(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn version(&self) -> bool {
        self.version
    }

    /// Backend endpoint, when proxy mode is requested.
    pub fn backend_endpoint(&self) -> Option<String> {
        self.backend
            .as_deref()
            .filter(|host| !host.is_empty())
            .map(|host| format!("{}:{}", host, self.backend_port.unwrap_or(self.port)))
    }

    pub fn service_configuration(&self) -> ServiceConfiguration {
        let server = ServerConfig::with_endpoint(&format!("0.0.0.0:{}", self.port))
            .with_tls_settings(self.tls.server_tls());

        let config = ServiceConfiguration::new()
            .with_meta(&self.meta)
            .with_server(server);

        match self.backend_endpoint() {
            Some(endpoint) => config.with_backend(
                ClientConfig::with_endpoint(&endpoint).with_tls_setting(self.tls.client_tls()),
            ),
            None => config,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Landing gRPC demo client", long_about = None, disable_version_flag = true)]
pub struct ClientArgs {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", env = "LANDING_CONFIG")]
    config: Option<String>,

    /// Server host
    #[arg(long, env = "GRPC_SERVER", default_value = "localhost")]
    server: String,

    /// Server port
    #[arg(short, long, env = "GRPC_SERVER_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Tag sent in every request
    #[arg(long, default_value = landing_service::results::DEFAULT_META)]
    meta: String,

    /// Number of passes over the four call shapes
    #[arg(short, long, default_value_t = 3)]
    iterations: u32,

    /// Pause between two passes
    #[arg(long, value_parser = parse_duration, default_value = "200ms")]
    pause: Duration,

    /// Upper bound of the random pause between streamed messages
    #[arg(long, value_parser = parse_duration, default_value = "10ms")]
    send_pacing: Duration,

    /// Deadline of every call
    #[arg(long, value_parser = parse_duration)]
    request_timeout: Option<Duration>,

    #[command(flatten)]
    tls: TlsArgs,

    /// Print build information and exit
    #[arg(short = 'V', long, action = ArgAction::SetTrue)]
    version: bool,
}

impl ClientArgs {
    pub fn config(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn version(&self) -> bool {
        self.version
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    pub fn client_configuration(&self) -> ClientConfig {
        let headers = DEMO_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();

        let config = ClientConfig::with_endpoint(&format!("{}:{}", self.server, self.port))
            .with_tls_setting(self.tls.client_tls())
            .with_headers(headers);

        match self.request_timeout {
            Some(timeout) => config.with_request_timeout(timeout),
            None => config,
        }
    }

    pub fn call_options(&self) -> CallOptions {
        CallOptions::default()
            .with_meta(&self.meta)
            .with_send_pacing(self.send_pacing)
            .with_request_timeout(self.request_timeout)
    }
}
