// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use display_error_chain::ErrorChainExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::build_info;
use crate::config::ConfigLoader;
use crate::runtime;
use landing_client::{CallOptions, ClientError, LandingClient, Outcome, retry_with_backoff};
use landing_config::component::Component;
use landing_config::grpc::client::ClientConfig;
use landing_config::tls::provider;

/// Start every configured service, wait for `shutdown`, then drain them
/// within the runtime drain timeout.
pub async fn serve<F>(mut config: ConfigLoader, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let drain_timeout = config.runtime().drain_timeout();
    let services = config.services().context("error loading services")?;

    for (name, service) in services.iter_mut() {
        debug!(service = %name, "service starting...");
        service.start().await.context("failed to start service")?;
        info!(service = %name, "service started");
    }

    shutdown.await;
    debug!("received shutdown signal");

    let shutdown_all = async {
        for (name, service) in services.iter_mut() {
            info!(service = %name, "stopping service");
            service.shutdown().await.context("failed to stop service")?;
        }
        Ok::<(), anyhow::Error>(())
    };

    match tokio::time::timeout(drain_timeout, shutdown_all).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(timeout = ?drain_timeout, "service shutdown timed out");
            anyhow::bail!("service shutdown timed out after {:?}", drain_timeout);
        }
    }

    info!("all services stopped");
    Ok(())
}

/// Async body of the server: tracing setup, service lifecycle, graceful
/// shutdown on SIGINT or SIGTERM.
pub async fn run_services(mut config: ConfigLoader) -> Result<()> {
    let tracing_conf = config.tracing().clone();
    tracing_conf.setup_tracing_subscriber();

    debug!(?tracing_conf);
    info!(build_info = %build_info::BUILD_INFO);

    serve(config, landing_signal::shutdown())
        .instrument(info_span!("application_lifecycle"))
        .await
}

/// Build the runtime described by the `runtime` section and run the
/// services on it until a shutdown signal arrives. Blocks the caller.
pub fn run(mut config: ConfigLoader) -> Result<()> {
    provider::initialize_crypto_provider();

    let landing_runtime =
        runtime::build(config.runtime()).context("invalid runtime configuration")?;
    landing_runtime.runtime.block_on(run_services(config))
}

/// Demo client settings.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub iterations: u32,
    pub pause: Duration,
    pub call_options: CallOptions,
}

/// One attempt: connect, then run a single pass over the four call shapes.
async fn connect_and_run(
    config: &ClientConfig,
    call_options: &CallOptions,
    token: &CancellationToken,
) -> Result<Outcome<()>, ClientError> {
    let client = LandingClient::connect(config, token.clone())
        .await?
        .with_options(call_options.clone());
    client.execute_all().await
}

/// Run `iterations` passes over the four call shapes. Each pass, connection
/// included, is one attempt under the retry policy of `config`. Stops early,
/// without error, once `token` is cancelled.
pub async fn run_demo(
    config: &ClientConfig,
    options: &DemoOptions,
    token: CancellationToken,
) -> Result<Outcome<()>, ClientError> {
    // the deadline of the client configuration applies unless the flags set one
    let request_timeout = options
        .call_options
        .request_timeout
        .or(config.request_timeout);
    let call_options = options
        .call_options
        .clone()
        .with_request_timeout(request_timeout);

    for iteration in 1..=options.iterations {
        info!(iteration, iterations = options.iterations, "starting pass");

        let outcome = retry_with_backoff(&config.backoff, &token, "pass", || {
            connect_and_run(config, &call_options, &token)
        })
        .await?;
        if outcome.is_cancelled() {
            info!(iteration, "demo cancelled");
            return Ok(Outcome::Cancelled);
        }

        if iteration < options.iterations {
            tokio::select! {
                _ = token.cancelled() => return Ok(Outcome::Cancelled),
                _ = tokio::time::sleep(options.pause) => {}
            }
        }
    }

    info!(iterations = options.iterations, "all passes completed");
    Ok(Outcome::Completed(()))
}

/// Run the demo on a runtime built from `config`, cancelling it on SIGINT or
/// SIGTERM. Blocks the caller.
pub fn run_client(
    mut config: ConfigLoader,
    client: ClientConfig,
    options: DemoOptions,
) -> Result<()> {
    provider::initialize_crypto_provider();

    let landing_runtime =
        runtime::build(config.runtime()).context("invalid runtime configuration")?;
    let tracing_conf = config.tracing().clone();

    landing_runtime.runtime.block_on(async move {
        tracing_conf.setup_tracing_subscriber();
        info!(build_info = %build_info::BUILD_INFO);
        debug!(%client, "client configured");

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            landing_signal::shutdown().await;
            canceller.cancel();
        });

        match run_demo(&client, &options, token).await {
            Ok(Outcome::Completed(())) => Ok(()),
            Ok(Outcome::Cancelled) => {
                info!("client stopped by signal");
                Ok(())
            }
            Err(e) => {
                error!(error = %e.chain(), "client failed");
                Err(e.into())
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use landing_config::backoff::RetryPolicy;
    use landing_config::grpc::server::ServerConfig;
    use landing_service::ServiceConfiguration;
    use tokio::sync::oneshot;
    use tracing_test::traced_test;

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    #[traced_test]
    async fn test_serve_and_demo() {
        let port = free_port();
        let service = ServiceConfiguration::default()
            .with_server(ServerConfig::with_endpoint(&format!("127.0.0.1:{}", port)));
        let config = ConfigLoader::default()
            .with_service("main", &service)
            .unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(config, async {
            let _ = stop_rx.await;
        }));

        let client = ClientConfig::with_endpoint(&format!("127.0.0.1:{}", port)).with_backoff(
            RetryPolicy::new(5, Duration::from_millis(50), Duration::from_millis(200), 2.0),
        );
        let options = DemoOptions {
            iterations: 2,
            pause: Duration::from_millis(10),
            call_options: CallOptions::default().with_send_pacing(Duration::from_millis(1)),
        };

        let outcome = run_demo(&client, &options, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed(()));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(logs_contain("all services stopped"));
    }

    #[tokio::test]
    async fn test_serve_without_services() {
        let res = serve(ConfigLoader::default(), async {}).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_demo_cancelled_before_connecting() {
        let token = CancellationToken::new();
        token.cancel();

        let options = DemoOptions {
            iterations: 1,
            pause: Duration::ZERO,
            call_options: CallOptions::default(),
        };
        let outcome = run_demo(&ClientConfig::with_endpoint("127.0.0.1:1"), &options, token)
            .await
            .unwrap();
        assert!(outcome.is_cancelled());
    }
}
