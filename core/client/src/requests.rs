// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use rand::Rng;

use landing_service::api::TalkRequest;

pub const MIN_LINK_REQUESTS: usize = 3;
pub const MAX_LINK_REQUESTS: usize = 5;
pub const DEFAULT_LINK_REQUESTS: usize = MIN_LINK_REQUESTS;

/// Highest index sent by the demos.
const MAX_INDEX: u32 = 5;

/// Build between 3 and 5 requests, each carrying a random index in `0..=5`.
pub fn build_link_requests(count: usize, meta: &str) -> Vec<TalkRequest> {
    let mut rng = rand::rng();

    (0..count.clamp(MIN_LINK_REQUESTS, MAX_LINK_REQUESTS))
        .map(|_| TalkRequest {
            data: rng.random_range(0..=MAX_INDEX).to_string(),
            meta: meta.to_string(),
        })
        .collect()
}

/// Random pause between two demo calls, between 100 and 300ms.
pub fn link_pacing() -> Duration {
    Duration::from_millis(rand::rng().random_range(100..=300))
}

/// Random pause of at most `max` between two streamed messages.
pub fn send_delay(max: Duration) -> Duration {
    let max_micros = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
    if max_micros == 0 {
        return Duration::ZERO;
    }

    Duration::from_micros(rand::rng().random_range(0..=max_micros))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_requests_are_clamped() {
        assert_eq!(build_link_requests(0, "RUST").len(), 3);
        assert_eq!(build_link_requests(4, "RUST").len(), 4);
        assert_eq!(build_link_requests(10, "RUST").len(), 5);
    }

    #[test]
    fn test_link_requests_content() {
        for request in build_link_requests(5, "RUST") {
            assert_eq!(request.meta, "RUST");
            let index: u32 = request.data.parse().unwrap();
            assert!(index <= MAX_INDEX);
        }
    }

    #[test]
    fn test_pacing_bounds() {
        for _ in 0..50 {
            let pause = link_pacing();
            assert!(pause >= Duration::from_millis(100));
            assert!(pause <= Duration::from_millis(300));

            assert!(send_delay(Duration::from_millis(10)) <= Duration::from_millis(10));
        }
        assert_eq!(send_delay(Duration::ZERO), Duration::ZERO);
    }
}
