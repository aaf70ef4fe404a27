// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod engine;
pub mod errors;
pub mod outcome;
pub mod requests;
pub mod retry;

pub use engine::{CallOptions, LandingClient};
pub use errors::ClientError;
pub use outcome::Outcome;
pub use requests::{build_link_requests, link_pacing};
pub use retry::retry_with_backoff;
