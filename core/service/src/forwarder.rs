// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::SystemTime;

use futures::{Stream, StreamExt};
use tokio::sync::{OnceCell, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;
use tonic::{Request, Status, Streaming};
use tracing::{debug, info, warn};

use landing_config::grpc::client::ClientConfig;

use crate::api::{LandingServiceClient, TalkRequest, TalkResponse};
use crate::errors::ServiceError;
use crate::metadata::{apply_proxy_markers, apply_tracing_context, extract_tracing_context};

/// Capacity of the channels relaying streamed messages between caller and backend.
const RELAY_BUFFER: usize = 16;

/// Relays calls to a backend landing server.
///
/// The backend connection is opened by the first call that needs it and
/// shared by all later ones. Concurrent first calls wait on the same
/// connection attempt; a failed attempt is not cached.
#[derive(Debug)]
pub struct Forwarder {
    config: ClientConfig,
    hop: String,
    headers: MetadataMap,
    client: OnceCell<LandingServiceClient<Channel>>,
}

impl Forwarder {
    pub fn new(config: ClientConfig, hop: &str) -> Result<Self, ServiceError> {
        let headers = config.metadata()?;

        Ok(Forwarder {
            config,
            hop: hop.to_string(),
            headers,
            client: OnceCell::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn hop(&self) -> &str {
        &self.hop
    }

    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    async fn client(&self) -> Result<LandingServiceClient<Channel>, ServiceError> {
        let client = self
            .client
            .get_or_try_init(|| async {
                info!(backend = %self.config.endpoint, "connecting to backend");
                let channel = self.config.to_channel().await?;
                Ok::<_, ServiceError>(LandingServiceClient::new(channel))
            })
            .await?;

        Ok(client.clone())
    }

    /// Outbound request carrying the static headers, the caller's tracing
    /// context and this hop's proxy markers.
    fn outbound<T>(
        &self,
        inbound: &MetadataMap,
        message: T,
        started_at: SystemTime,
    ) -> Result<Request<T>, ServiceError> {
        let mut request = Request::new(message);

        let metadata = request.metadata_mut();
        *metadata = self.headers.clone();
        apply_tracing_context(&extract_tracing_context(inbound), metadata);
        apply_proxy_markers(&self.hop, started_at, metadata)?;

        if let Some(timeout) = self.config.request_timeout {
            request.set_timeout(timeout);
        }

        Ok(request)
    }

    pub async fn talk(
        &self,
        inbound: &MetadataMap,
        message: TalkRequest,
        started_at: SystemTime,
    ) -> Result<TalkResponse, ServiceError> {
        let mut client = self.client().await?;
        let request = self.outbound(inbound, message, started_at)?;

        let response = client.talk(request).await?;
        Ok(response.into_inner())
    }

    pub async fn talk_one_answer_more(
        &self,
        inbound: &MetadataMap,
        message: TalkRequest,
        started_at: SystemTime,
    ) -> Result<Streaming<TalkResponse>, ServiceError> {
        let mut client = self.client().await?;
        let request = self.outbound(inbound, message, started_at)?;

        let response = client.talk_one_answer_more(request).await?;
        Ok(response.into_inner())
    }

    pub async fn talk_more_answer_one<S>(
        &self,
        inbound: &MetadataMap,
        requests: S,
        started_at: SystemTime,
    ) -> Result<TalkResponse, ServiceError>
    where
        S: Stream<Item = Result<TalkRequest, Status>> + Send + 'static,
    {
        let mut client = self.client().await?;

        let (tx, rx) = mpsc::channel(RELAY_BUFFER);
        let relay = tokio::spawn(forward_requests(requests, tx));
        let request = self.outbound(inbound, ReceiverStream::new(rx), started_at)?;

        match client.talk_more_answer_one(request).await {
            Ok(response) => {
                // a broken inbound stream must not produce a partial answer
                let forwarded = relay.await??;
                debug!(forwarded, "client stream relayed to backend");
                Ok(response.into_inner())
            }
            Err(status) => {
                relay.abort();
                Err(status.into())
            }
        }
    }

    /// Relay a bidirectional call. One task forwards caller messages to the
    /// backend while another relays backend responses back; the returned
    /// stream ends once both are done.
    pub async fn talk_bidirectional<S>(
        &self,
        inbound: &MetadataMap,
        requests: S,
        started_at: SystemTime,
    ) -> Result<ReceiverStream<Result<TalkResponse, Status>>, ServiceError>
    where
        S: Stream<Item = Result<TalkRequest, Status>> + Send + 'static,
    {
        let mut client = self.client().await?;

        let (tx, rx) = mpsc::channel(RELAY_BUFFER);
        let (out_tx, out_rx) = mpsc::channel(RELAY_BUFFER);

        let errors_tx = out_tx.clone();
        tokio::spawn(async move {
            match forward_requests(requests, tx).await {
                Ok(forwarded) => debug!(forwarded, "bidirectional requests relayed to backend"),
                Err(status) => {
                    warn!(code = ?status.code(), "caller stream failed");
                    let _ = errors_tx.send(Err(status)).await;
                }
            }
        });

        let request = self.outbound(inbound, ReceiverStream::new(rx), started_at)?;
        let mut responses = client.talk_bidirectional(request).await?.into_inner();

        tokio::spawn(async move {
            let mut relayed = 0usize;
            loop {
                match responses.message().await {
                    Ok(Some(response)) => {
                        if out_tx.send(Ok(response)).await.is_err() {
                            debug!("caller went away, stop relaying responses");
                            break;
                        }
                        relayed += 1;
                    }
                    Ok(None) => {
                        debug!(relayed, "backend stream completed");
                        break;
                    }
                    Err(status) => {
                        warn!(code = ?status.code(), "backend stream failed");
                        let _ = out_tx.send(Err(status)).await;
                        break;
                    }
                }
            }
        });

        Ok(ReceiverStream::new(out_rx))
    }
}

/// Push caller messages to the backend until the caller half-closes.
/// Returns the number of forwarded messages, or the caller's stream error.
async fn forward_requests<S>(requests: S, tx: mpsc::Sender<TalkRequest>) -> Result<usize, Status>
where
    S: Stream<Item = Result<TalkRequest, Status>>,
{
    let mut requests = std::pin::pin!(requests);
    let mut forwarded = 0;

    while let Some(next) = requests.next().await {
        let request = next?;
        if tx.send(request).await.is_err() {
            debug!("backend stream closed, stop forwarding");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}
