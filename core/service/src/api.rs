// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod proto {
    pub mod hello {
        tonic::include_proto!("hello");
    }
}

pub use proto::hello::landing_service_client::LandingServiceClient;
pub use proto::hello::landing_service_server::{LandingService, LandingServiceServer};
pub use proto::hello::{ResultType, TalkRequest, TalkResponse, TalkResult};
