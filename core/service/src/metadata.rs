// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::{SystemTime, UNIX_EPOCH};

use tonic::metadata::errors::InvalidMetadataValue;
use tonic::metadata::{Ascii, KeyAndValueRef, MetadataMap, MetadataValue};
use tracing::debug;

/// Request correlation id.
pub const REQUEST_ID: &str = "x-request-id";
/// B3 trace id.
pub const B3_TRACE_ID: &str = "x-b3-traceid";
/// B3 span id.
pub const B3_SPAN_ID: &str = "x-b3-spanid";
/// B3 parent span id.
pub const B3_PARENT_SPAN_ID: &str = "x-b3-parentspanid";
/// B3 sampling decision.
pub const B3_SAMPLED: &str = "x-b3-sampled";
/// B3 debug flags.
pub const B3_FLAGS: &str = "x-b3-flags";
/// OpenTracing span context.
pub const OT_SPAN_CONTEXT: &str = "x-ot-span-context";

/// Keys copied unchanged from an inbound call to any call it forwards.
pub const TRACING_KEYS: [&str; 7] = [
    REQUEST_ID,
    B3_TRACE_ID,
    B3_SPAN_ID,
    B3_PARENT_SPAN_ID,
    B3_SAMPLED,
    B3_FLAGS,
    OT_SPAN_CONTEXT,
];

/// Implementation of the hop that forwarded the call.
pub const PROXY_BY: &str = "x-proxy-by";
/// Millisecond timestamp at which the forwarding hop received the call.
pub const PROXY_TIMESTAMP: &str = "x-proxy-timestamp";

/// Tracing entries found on a call, in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TracingContext {
    entries: Vec<(&'static str, MetadataValue<Ascii>)>,
}

impl TracingContext {
    /// First value of `key`, if present and printable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.to_str().ok())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn extract_tracing_context(inbound: &MetadataMap) -> TracingContext {
    let entries = TRACING_KEYS
        .iter()
        .flat_map(|key| {
            inbound
                .get_all(*key)
                .iter()
                .map(move |value| (*key, value.clone()))
        })
        .collect();

    TracingContext { entries }
}

/// Write `context` into `outbound`, replacing any value the tracing keys had.
pub fn apply_tracing_context(context: &TracingContext, outbound: &mut MetadataMap) {
    for key in TRACING_KEYS {
        if context.entries.iter().any(|(k, _)| *k == key) {
            outbound.remove(key);
        }
    }

    for (key, value) in &context.entries {
        outbound.append(*key, value.clone());
    }
}

pub fn unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

pub fn apply_proxy_markers(
    hop: &str,
    started_at: SystemTime,
    outbound: &mut MetadataMap,
) -> Result<(), InvalidMetadataValue> {
    outbound.insert(PROXY_BY, MetadataValue::try_from(hop)?);
    outbound.insert(
        PROXY_TIMESTAMP,
        MetadataValue::from(unix_millis(started_at)),
    );
    Ok(())
}

pub fn log_headers(method: &str, metadata: &MetadataMap) {
    for entry in metadata.iter() {
        if let KeyAndValueRef::Ascii(key, value) = entry {
            debug!(method, header = key.as_str(), value = ?value, "inbound header");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn inbound_with_all_keys() -> MetadataMap {
        let mut md = MetadataMap::new();
        for (i, key) in TRACING_KEYS.iter().enumerate() {
            md.insert(*key, format!("value-{}", i).parse().unwrap());
        }
        md.insert("k1", "v1".parse().unwrap());
        md
    }

    #[test]
    fn test_extract_only_tracing_keys() {
        let context = extract_tracing_context(&inbound_with_all_keys());
        assert_eq!(context.len(), 7);
        for (i, key) in TRACING_KEYS.iter().enumerate() {
            assert_eq!(context.get(key), Some(format!("value-{}", i).as_str()));
        }
        assert_eq!(context.get("k1"), None);
    }

    #[test]
    fn test_absent_keys_are_skipped() {
        let mut md = MetadataMap::new();
        md.insert(REQUEST_ID, "req-1".parse().unwrap());
        md.insert(B3_SAMPLED, "1".parse().unwrap());

        let context = extract_tracing_context(&md);
        assert_eq!(context.len(), 2);

        let mut outbound = MetadataMap::new();
        apply_tracing_context(&context, &mut outbound);
        assert_eq!(outbound.len(), 2);
        assert!(outbound.get(B3_TRACE_ID).is_none());
        assert_eq!(outbound.get(REQUEST_ID).unwrap(), "req-1");
    }

    #[test]
    fn test_apply_keeps_custom_headers_and_replaces_tracing_values() {
        let context = extract_tracing_context(&inbound_with_all_keys());

        let mut outbound = MetadataMap::new();
        outbound.insert("k2", "v2".parse().unwrap());
        outbound.insert(REQUEST_ID, "stale".parse().unwrap());
        apply_tracing_context(&context, &mut outbound);

        assert_eq!(outbound.get("k2").unwrap(), "v2");
        assert_eq!(outbound.get_all(REQUEST_ID).iter().count(), 1);
        assert_eq!(outbound.get(REQUEST_ID).unwrap(), "value-0");
    }

    #[test]
    fn test_multi_values_are_preserved() {
        let mut md = MetadataMap::new();
        md.append(B3_FLAGS, "a".parse().unwrap());
        md.append(B3_FLAGS, "b".parse().unwrap());

        let mut outbound = MetadataMap::new();
        apply_tracing_context(&extract_tracing_context(&md), &mut outbound);
        let values: Vec<_> = outbound
            .get_all(B3_FLAGS)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_proxy_markers() {
        let started_at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        let mut outbound = MetadataMap::new();
        apply_tracing_context(
            &extract_tracing_context(&inbound_with_all_keys()),
            &mut outbound,
        );
        apply_proxy_markers("rust-proxy", started_at, &mut outbound).unwrap();

        assert_eq!(outbound.get(PROXY_BY).unwrap(), "rust-proxy");
        assert_eq!(outbound.get(PROXY_TIMESTAMP).unwrap(), "1700000000123");
        assert_eq!(outbound.len(), 9);

        assert!(apply_proxy_markers("bad\nhop", started_at, &mut outbound).is_err());
    }
}
