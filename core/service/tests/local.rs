// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use futures::StreamExt;
use tracing_test::traced_test;

use landing_config::grpc::server::ServerConfig;
use landing_service::ServiceConfiguration;
use landing_service::api::{LandingServiceClient, ResultType, TalkRequest};
use landing_service::results::FALLBACK_GREETING;

fn talk_request(data: &str) -> TalkRequest {
    TalkRequest {
        data: data.to_string(),
        meta: "TEST".to_string(),
    }
}

#[tokio::test]
#[traced_test]
async fn test_local_call_shapes() {
    let config = ServiceConfiguration::default()
        .with_server(ServerConfig::with_endpoint("127.0.0.1:0"));
    let mut service = config.build_server("landing").unwrap();
    let addr = service.run().await.unwrap();

    let mut client = LandingServiceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    let response = client.talk(talk_request("0")).await.unwrap().into_inner();
    assert_eq!(response.status, 200);
    let result = &response.results[0];
    assert_eq!(result.r#type, ResultType::Ok as i32);
    assert_eq!(result.kv["data"], "Hello,Thank you very much");
    assert_eq!(result.kv["meta"], "RUST");
    assert!(result.id > 0);

    // an index outside the table is not an error
    let response = client.talk(talk_request("42")).await.unwrap().into_inner();
    assert!(response.results[0].kv["data"].starts_with(FALLBACK_GREETING));

    let responses: Vec<_> = client
        .talk_one_answer_more(talk_request("2,0,1"))
        .await
        .unwrap()
        .into_inner()
        .collect()
        .await;
    let indexes: Vec<_> = responses
        .iter()
        .map(|r| r.as_ref().unwrap().results[0].kv["idx"].clone())
        .collect();
    assert_eq!(indexes, vec!["2", "0", "1"]);

    let inputs = ["1", "1", "4"];
    let response = client
        .talk_more_answer_one(tokio_stream::iter(inputs.into_iter().map(|d| talk_request(d))))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.results.len(), 3);

    service.drain().await.unwrap();
}
