// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::api::{ResultType, TalkResponse, TalkResult};

/// Status carried by every successful response.
pub const STATUS_OK: i32 = 200;

/// Tag identifying this implementation in `meta` fields.
pub const DEFAULT_META: &str = "RUST";

const GREETINGS: [&str; 6] = ["Hello", "Bonjour", "Hola", "こんにちは", "Ciao", "안녕하세요"];

/// Used for indexes that do not parse or fall outside the table.
pub const FALLBACK_GREETING: &str = "你好";

fn reply_to(greeting: &str) -> &'static str {
    match greeting {
        "Hello" => "Thank you very much",
        "Bonjour" => "Merci beaucoup",
        "Hola" => "Muchas Gracias",
        "こんにちは" => "どうも ありがとう ございます",
        "Ciao" => "Mille Grazie",
        "안녕하세요" => "대단히 감사합니다",
        _ => "非常感谢",
    }
}

/// Greeting for `index`, never failing.
pub fn greeting(index: &str) -> &'static str {
    index
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|i| GREETINGS.get(i).copied())
        .unwrap_or(FALLBACK_GREETING)
}

fn timestamp_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Build the result answering `index` on behalf of the `meta` implementation.
pub fn build_result(index: &str, meta: &str) -> TalkResult {
    let greeting = greeting(index);

    let kv = HashMap::from([
        ("id".to_string(), uuid::Uuid::new_v4().to_string()),
        ("idx".to_string(), index.to_string()),
        (
            "data".to_string(),
            format!("{},{}", greeting, reply_to(greeting)),
        ),
        ("meta".to_string(), meta.to_string()),
    ]);

    TalkResult {
        id: timestamp_nanos(),
        r#type: ResultType::Ok as i32,
        kv,
    }
}

pub fn ok_response(results: Vec<TalkResult>) -> TalkResponse {
    TalkResponse {
        status: STATUS_OK,
        results,
    }
}
