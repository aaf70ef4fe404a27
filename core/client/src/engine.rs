// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Request;
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::transport::Channel;
use tracing::{debug, info};

use landing_config::grpc::client::ClientConfig;
use landing_service::api::{LandingServiceClient, TalkRequest, TalkResponse};
use landing_service::metadata::REQUEST_ID;
use landing_service::results::DEFAULT_META;

use crate::errors::ClientError;
use crate::outcome::Outcome;
use crate::requests::{DEFAULT_LINK_REQUESTS, build_link_requests, link_pacing, send_delay};

#[derive(Debug, Clone, PartialEq)]
pub struct CallOptions {
    /// Tag sent in the `meta` field of every request.
    pub meta: String,

    /// Upper bound of the random pause between two streamed messages.
    pub send_pacing: Duration,

    /// Deadline applied to every call.
    pub request_timeout: Option<Duration>,
}

impl Default for CallOptions {
    fn default() -> Self {
        CallOptions {
            meta: DEFAULT_META.to_string(),
            send_pacing: Duration::from_millis(10),
            request_timeout: None,
        }
    }
}

impl CallOptions {
    pub fn with_meta(self, meta: &str) -> Self {
        CallOptions {
            meta: meta.to_string(),
            ..self
        }
    }

    pub fn with_send_pacing(self, send_pacing: Duration) -> Self {
        CallOptions {
            send_pacing,
            ..self
        }
    }

    pub fn with_request_timeout(self, request_timeout: Option<Duration>) -> Self {
        CallOptions {
            request_timeout,
            ..self
        }
    }
}

/// Runs the four call shapes against a landing server.
///
/// Every call carries the configured headers plus an `x-request-id`, and
/// stops early with [`Outcome::Cancelled`] once the token fires.
#[derive(Debug, Clone)]
pub struct LandingClient {
    client: LandingServiceClient<Channel>,
    token: CancellationToken,
    headers: MetadataMap,
    options: CallOptions,
}

impl LandingClient {
    pub fn new(channel: Channel, token: CancellationToken) -> Self {
        LandingClient {
            client: LandingServiceClient::new(channel),
            token,
            headers: MetadataMap::new(),
            options: CallOptions::default(),
        }
    }

    /// Connect to the server described by `config`, taking its headers and
    /// request timeout.
    pub async fn connect(
        config: &ClientConfig,
        token: CancellationToken,
    ) -> Result<Self, ClientError> {
        let headers = config.metadata()?;
        let channel = config.to_channel().await?;
        info!(endpoint = %config.endpoint, "connected to landing server");

        let options = CallOptions::default().with_request_timeout(config.request_timeout);
        Ok(LandingClient::new(channel, token)
            .with_headers(headers)
            .with_options(options))
    }

    pub fn with_headers(self, headers: MetadataMap) -> Self {
        LandingClient { headers, ..self }
    }

    pub fn with_options(self, options: CallOptions) -> Self {
        LandingClient { options, ..self }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    pub fn talk_request(&self, data: &str) -> TalkRequest {
        TalkRequest {
            data: data.to_string(),
            meta: self.options.meta.clone(),
        }
    }

    fn request<T>(&self, message: T) -> Result<Request<T>, ClientError> {
        let mut request = Request::new(message);

        let metadata = request.metadata_mut();
        *metadata = self.headers.clone();
        if !metadata.contains_key(REQUEST_ID) {
            let request_id = MetadataValue::try_from(uuid::Uuid::new_v4().to_string())?;
            metadata.insert(REQUEST_ID, request_id);
        }

        if let Some(timeout) = self.options.request_timeout {
            request.set_timeout(timeout);
        }

        Ok(request)
    }

    /// Feed `requests` to the call from a separate task, pausing randomly
    /// between messages. Dropping the sender half-closes the call.
    fn spawn_sender(
        &self,
        requests: Vec<TalkRequest>,
    ) -> (ReceiverStream<TalkRequest>, JoinHandle<usize>) {
        let (tx, rx) = mpsc::channel(1);
        let token = self.token.clone();
        let pacing = self.options.send_pacing;

        let sender = tokio::spawn(async move {
            let mut sent = 0;
            for request in requests {
                if sent > 0 {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(send_delay(pacing)) => {}
                    }
                }

                debug!(data = %request.data, meta = %request.meta, "sending request");
                if tx.send(request).await.is_err() {
                    break;
                }
                sent += 1;
            }
            sent
        });

        (ReceiverStream::new(rx), sender)
    }

    pub async fn execute_unary(&self, message: TalkRequest) -> Result<TalkResponse, ClientError> {
        info!(data = %message.data, meta = %message.meta, "Talk");
        let started = Instant::now();

        let response = self
            .client
            .clone()
            .talk(self.request(message)?)
            .await
            .map_err(|status| ClientError::rpc("Talk", status))?
            .into_inner();

        info!(elapsed = ?started.elapsed(), "Talk completed");
        log_response(&response);

        Ok(response)
    }

    pub async fn execute_server_streaming(
        &self,
        message: TalkRequest,
    ) -> Result<Outcome<Vec<TalkResponse>>, ClientError> {
        info!(data = %message.data, meta = %message.meta, "TalkOneAnswerMore");
        let started = Instant::now();

        let mut stream = self
            .client
            .clone()
            .talk_one_answer_more(self.request(message)?)
            .await
            .map_err(|status| ClientError::rpc("TalkOneAnswerMore", status))?
            .into_inner();

        let mut responses = Vec::new();
        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    info!(received = responses.len(), "TalkOneAnswerMore cancelled");
                    return Ok(Outcome::Cancelled);
                }
                next = stream.message() => {
                    match next.map_err(|status| ClientError::rpc("TalkOneAnswerMore", status))? {
                        Some(response) => {
                            log_response(&response);
                            responses.push(response);
                        }
                        None => break,
                    }
                }
            }
        }

        info!(received = responses.len(), elapsed = ?started.elapsed(), "TalkOneAnswerMore completed");
        Ok(Outcome::Completed(responses))
    }

    pub async fn execute_client_streaming(
        &self,
        requests: Vec<TalkRequest>,
    ) -> Result<Outcome<TalkResponse>, ClientError> {
        info!(requests = requests.len(), "TalkMoreAnswerOne");
        let started = Instant::now();

        let (outbound, sender) = self.spawn_sender(requests);
        let request = self.request(outbound)?;
        let mut client = self.client.clone();

        let response = tokio::select! {
            _ = self.token.cancelled() => {
                sender.abort();
                info!("TalkMoreAnswerOne cancelled");
                return Ok(Outcome::Cancelled);
            }
            response = client.talk_more_answer_one(request) => {
                response.map_err(|status| ClientError::rpc("TalkMoreAnswerOne", status))?
            }
        };

        let sent = sender.await?;
        let response = response.into_inner();
        info!(sent, elapsed = ?started.elapsed(), "TalkMoreAnswerOne completed");
        log_response(&response);

        Ok(Outcome::Completed(response))
    }

    pub async fn execute_bidirectional(
        &self,
        requests: Vec<TalkRequest>,
    ) -> Result<Outcome<Vec<TalkResponse>>, ClientError> {
        info!(requests = requests.len(), "TalkBidirectional");
        let started = Instant::now();

        let (outbound, sender) = self.spawn_sender(requests);
        let request = self.request(outbound)?;

        let mut inbound = match self.client.clone().talk_bidirectional(request).await {
            Ok(response) => response.into_inner(),
            Err(status) => {
                sender.abort();
                return Err(ClientError::rpc("TalkBidirectional", status));
            }
        };

        let mut responses = Vec::new();
        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    sender.abort();
                    info!(received = responses.len(), "TalkBidirectional cancelled");
                    return Ok(Outcome::Cancelled);
                }
                next = inbound.message() => {
                    match next {
                        Ok(Some(response)) => {
                            log_response(&response);
                            responses.push(response);
                        }
                        Ok(None) => break,
                        Err(status) => {
                            sender.abort();
                            return Err(ClientError::rpc("TalkBidirectional", status));
                        }
                    }
                }
            }
        }

        let sent = sender.await?;
        info!(
            sent,
            received = responses.len(),
            elapsed = ?started.elapsed(),
            "TalkBidirectional completed"
        );

        Ok(Outcome::Completed(responses))
    }

    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(link_pacing()) => true,
        }
    }

    /// One pass over the four call shapes, with a short random pause
    /// between them. The first failure ends the pass; retries wrap the
    /// whole pass.
    pub async fn execute_all(&self) -> Result<Outcome<()>, ClientError> {
        self.execute_unary(self.talk_request("0")).await?;
        if !self.pause().await {
            return Ok(Outcome::Cancelled);
        }

        let streamed = self
            .execute_server_streaming(self.talk_request("0,1,2"))
            .await?;
        if streamed.is_cancelled() || !self.pause().await {
            return Ok(Outcome::Cancelled);
        }

        let requests = build_link_requests(DEFAULT_LINK_REQUESTS, &self.options.meta);
        let aggregated = self.execute_client_streaming(requests).await?;
        if aggregated.is_cancelled() || !self.pause().await {
            return Ok(Outcome::Cancelled);
        }

        let requests = build_link_requests(DEFAULT_LINK_REQUESTS, &self.options.meta);
        let exchanged = self.execute_bidirectional(requests).await?;

        Ok(exchanged.map(|_| ()))
    }
}

fn log_response(response: &TalkResponse) {
    info!(status = response.status, results = response.results.len(), "response");

    for result in &response.results {
        let kv = |key: &str| result.kv.get(key).map(String::as_str).unwrap_or_default();
        info!(
            id = result.id,
            kind = result.r#type,
            uuid = kv("id"),
            idx = kv("idx"),
            data = kv("data"),
            meta = kv("meta"),
            "result"
        );
    }
}
