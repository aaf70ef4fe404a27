// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use landing_config::component::Component;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing_test::traced_test;

use landing_config::grpc::server::ServerConfig;
use landing_service::ServiceConfiguration;
use landing_service::api::{LandingServiceClient, TalkRequest};

fn talk_request(data: &str) -> TalkRequest {
    TalkRequest {
        data: data.to_string(),
        meta: "TEST".to_string(),
    }
}

#[tokio::test]
#[traced_test]
async fn test_drain_waits_for_in_flight_calls() {
    let config = ServiceConfiguration::default()
        .with_server(ServerConfig::with_endpoint("127.0.0.1:0"));
    let mut service = config.build_server("landing").unwrap();
    let addr = service.run().await.unwrap();

    let mut client = LandingServiceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(4);
    let mut responses = client
        .talk_bidirectional(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();

    tx.send(talk_request("3")).await.unwrap();
    let first = responses.message().await.unwrap().unwrap();
    assert_eq!(first.results[0].kv["idx"], "3");

    let draining = tokio::spawn(async move { service.shutdown().await });

    // the open call keeps the drain pending
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!draining.is_finished());

    // calls already running keep being served
    tx.send(talk_request("4")).await.unwrap();
    let second = responses.message().await.unwrap().unwrap();
    assert_eq!(second.results[0].kv["idx"], "4");

    drop(tx);
    assert!(responses.message().await.unwrap().is_none());

    tokio::time::timeout(Duration::from_secs(5), draining)
        .await
        .expect("drain did not complete")
        .unwrap()
        .unwrap();
}
