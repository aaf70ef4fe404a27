// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{Instrument, debug, info};

use crate::api::{LandingService, TalkRequest, TalkResponse};
use crate::errors::ServiceError;
use crate::forwarder::Forwarder;
use crate::metadata::log_headers;
use crate::results::{build_result, ok_response};

pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<TalkResponse, Status>> + Send>>;

/// Server side of the four call shapes. Each method answers locally, or
/// relays the call to the backend when a [`Forwarder`] is configured.
#[derive(Debug, Clone)]
pub struct LandingHandler {
    meta: String,
    forwarder: Option<Arc<Forwarder>>,
}

impl LandingHandler {
    pub fn new(meta: &str) -> Self {
        LandingHandler {
            meta: meta.to_string(),
            forwarder: None,
        }
    }

    pub fn with_forwarder(self, forwarder: Arc<Forwarder>) -> Self {
        LandingHandler {
            forwarder: Some(forwarder),
            ..self
        }
    }

    pub fn meta(&self) -> &str {
        &self.meta
    }

    pub fn forwarder(&self) -> Option<&Arc<Forwarder>> {
        self.forwarder.as_ref()
    }

    /// One result for the single index in `data`.
    pub fn answer(&self, request: &TalkRequest) -> TalkResponse {
        ok_response(vec![build_result(&request.data, &self.meta)])
    }

    /// One response per comma separated index in `data`, in input order.
    pub fn fan_out(&self, request: &TalkRequest) -> Vec<TalkResponse> {
        request
            .data
            .split(',')
            .map(|index| ok_response(vec![build_result(index, &self.meta)]))
            .collect()
    }

    /// Accumulate one result per inbound request, answering once the
    /// stream ends. A failing stream yields no response at all.
    pub async fn collect<S>(&self, requests: S) -> Result<TalkResponse, ServiceError>
    where
        S: Stream<Item = Result<TalkRequest, Status>>,
    {
        let mut requests = std::pin::pin!(requests);
        let mut results = Vec::new();

        while let Some(next) = requests.next().await {
            let request = next?;
            debug!(data = %request.data, meta = %request.meta, "client stream request");
            results.push(build_result(&request.data, &self.meta));
        }

        Ok(ok_response(results))
    }

    /// Answer every inbound request before reading the next one.
    pub fn answer_each<S>(&self, requests: S) -> ReceiverStream<Result<TalkResponse, Status>>
    where
        S: Stream<Item = Result<TalkRequest, Status>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        let handler = self.clone();

        tokio::spawn(
            async move {
                let mut requests = std::pin::pin!(requests);
                let mut answered = 0usize;
                let mut failed = false;

                while let Some(next) = requests.next().await {
                    let reply = next.map(|request| {
                        debug!(data = %request.data, meta = %request.meta, "bidirectional request");
                        handler.answer(&request)
                    });
                    failed = reply.is_err();

                    if tx.send(reply).await.is_err() {
                        debug!("caller went away, stop answering");
                        break;
                    }
                    if failed {
                        break;
                    }
                    answered += 1;
                }

                debug!(answered, failed, "bidirectional stream completed");
            }
            .in_current_span(),
        );

        ReceiverStream::new(rx)
    }
}

#[tonic::async_trait]
impl LandingService for LandingHandler {
    async fn talk(&self, request: Request<TalkRequest>) -> Result<Response<TalkResponse>, Status> {
        let started_at = SystemTime::now();
        log_headers("Talk", request.metadata());

        let response = match &self.forwarder {
            Some(forwarder) => {
                let (metadata, _, message) = request.into_parts();
                forwarder.talk(&metadata, message, started_at).await?
            }
            None => {
                let message = request.into_inner();
                info!(data = %message.data, meta = %message.meta, "talk");
                self.answer(&message)
            }
        };

        Ok(Response::new(response))
    }

    type TalkOneAnswerMoreStream = ResponseStream;

    async fn talk_one_answer_more(
        &self,
        request: Request<TalkRequest>,
    ) -> Result<Response<Self::TalkOneAnswerMoreStream>, Status> {
        let started_at = SystemTime::now();
        log_headers("TalkOneAnswerMore", request.metadata());

        let stream: ResponseStream = match &self.forwarder {
            Some(forwarder) => {
                let (metadata, _, message) = request.into_parts();
                let responses = forwarder
                    .talk_one_answer_more(&metadata, message, started_at)
                    .await?;
                Box::pin(responses)
            }
            None => {
                let message = request.into_inner();
                info!(data = %message.data, meta = %message.meta, "talk one answer more");
                let responses = self.fan_out(&message);
                Box::pin(futures::stream::iter(responses.into_iter().map(Ok)))
            }
        };

        Ok(Response::new(stream))
    }

    async fn talk_more_answer_one(
        &self,
        request: Request<Streaming<TalkRequest>>,
    ) -> Result<Response<TalkResponse>, Status> {
        let started_at = SystemTime::now();
        log_headers("TalkMoreAnswerOne", request.metadata());

        let (metadata, _, requests) = request.into_parts();
        let response = match &self.forwarder {
            Some(forwarder) => {
                forwarder
                    .talk_more_answer_one(&metadata, requests, started_at)
                    .await?
            }
            None => self.collect(requests).await?,
        };

        Ok(Response::new(response))
    }

    type TalkBidirectionalStream = ResponseStream;

    async fn talk_bidirectional(
        &self,
        request: Request<Streaming<TalkRequest>>,
    ) -> Result<Response<Self::TalkBidirectionalStream>, Status> {
        let started_at = SystemTime::now();
        log_headers("TalkBidirectional", request.metadata());

        let (metadata, _, requests) = request.into_parts();
        let stream: ResponseStream = match &self.forwarder {
            Some(forwarder) => Box::pin(
                forwarder
                    .talk_bidirectional(&metadata, requests, started_at)
                    .await?,
            ),
            None => Box::pin(self.answer_each(requests)),
        };

        Ok(Response::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::STATUS_OK;
    use tracing_test::traced_test;

    fn request(data: &str) -> TalkRequest {
        TalkRequest {
            data: data.to_string(),
            meta: "TEST".to_string(),
        }
    }

    fn idx(response: &TalkResponse) -> &str {
        response.results[0].kv["idx"].as_str()
    }

    #[tokio::test]
    #[traced_test]
    async fn test_talk_locally() {
        let handler = LandingHandler::new("RUST");
        let response = handler.talk(Request::new(request("1"))).await.unwrap().into_inner();

        assert_eq!(response.status, STATUS_OK);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].kv["data"], "Bonjour,Merci beaucoup");
        assert_eq!(response.results[0].kv["meta"], "RUST");
    }

    #[tokio::test]
    async fn test_fan_out_keeps_order() {
        let handler = LandingHandler::new("RUST");
        let stream = handler
            .talk_one_answer_more(Request::new(request("0,1,2")))
            .await
            .unwrap()
            .into_inner();

        let responses: Vec<_> = stream.collect().await;
        assert_eq!(responses.len(), 3);
        let indexes: Vec<_> = responses
            .iter()
            .map(|r| idx(r.as_ref().unwrap()).to_string())
            .collect();
        assert_eq!(indexes, vec!["0", "1", "2"]);
    }

    #[tokio::test]
    async fn test_collect_keeps_arrival_order() {
        let handler = LandingHandler::new("RUST");
        let inputs = ["5", "3", "3", "0", "9"];
        let requests = futures::stream::iter(inputs.iter().map(|d| Ok::<_, Status>(request(d))));

        let response = handler.collect(requests).await.unwrap();
        assert_eq!(response.results.len(), inputs.len());
        let indexes: Vec<_> = response
            .results
            .iter()
            .map(|r| r.kv["idx"].as_str())
            .collect();
        assert_eq!(indexes, inputs);
    }

    #[tokio::test]
    async fn test_collect_fails_without_partial_response() {
        let handler = LandingHandler::new("RUST");
        let requests = futures::stream::iter(vec![
            Ok(request("1")),
            Err(Status::cancelled("caller gone")),
        ]);

        let err = handler.collect(requests).await.unwrap_err();
        let status: Status = err.into();
        assert_eq!(status.code(), tonic::Code::Cancelled);
    }

    #[tokio::test]
    async fn test_answer_each_is_one_to_one() {
        let handler = LandingHandler::new("RUST");
        let inputs = ["2", "2", "4", "1"];
        let requests = futures::stream::iter(inputs.into_iter().map(|d| Ok::<_, Status>(request(d))));

        let responses: Vec<_> = handler.answer_each(requests).collect().await;
        assert_eq!(responses.len(), inputs.len());
        for (response, input) in responses.iter().zip(inputs) {
            assert_eq!(idx(response.as_ref().unwrap()), input);
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_answer_each_stops_after_error() {
        let handler = LandingHandler::new("RUST");
        let requests = futures::stream::iter(vec![
            Ok(request("0")),
            Err(Status::internal("broken")),
            Ok(request("1")),
        ]);

        let responses: Vec<_> = handler.answer_each(requests).collect().await;
        assert_eq!(responses.len(), 2);
        assert!(responses[0].is_ok());
        assert_eq!(
            responses[1].as_ref().unwrap_err().code(),
            tonic::Code::Internal
        );
        assert!(logs_contain("answered=1 failed=true"));
    }
}
