//! ABI Fetcher
//!
//! ABI is display metadata: every failure collapses to an empty array so a
//! missing ABI never blocks the bundle.

use serde_json::Value;
use tracing::warn;

use crate::models::{ExplorerContext, ExplorerResult};
use crate::providers::ExplorerClient;

/// Empty ABI
pub fn empty_abi() -> Value {
    Value::Array(Vec::new())
}

/// Decode a `getabi` envelope; `result` is a JSON-encoded string on success
pub fn parse_abi_result(result: &ExplorerResult) -> Option<Value> {
    if !result.is_success() {
        return None;
    }
    let text = result.result.as_str()?;
    match serde_json::from_str::<Value>(text) {
        Ok(abi @ Value::Array(_)) => Some(abi),
        _ => None,
    }
}

pub struct AbiFetcher<'a> {
    explorer: &'a ExplorerClient,
}

impl<'a> AbiFetcher<'a> {
    pub fn new(explorer: &'a ExplorerClient) -> Self {
        Self { explorer }
    }

    /// ABI for `address`, or `[]` on any failure
    pub async fn fetch(&self, address: &str, ctx: &ExplorerContext) -> Value {
        match self.explorer.get_abi(ctx, address).await {
            Ok(result) => parse_abi_result(&result).unwrap_or_else(|| {
                warn!(
                    "⚠️ No usable ABI for {} (status {}, {})",
                    address, result.status, result.message
                );
                empty_abi()
            }),
            Err(e) => {
                warn!("⚠️ ABI fetch failed for {}: {}", address, e);
                empty_abi()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(status: &str, result: Value) -> ExplorerResult {
        ExplorerResult {
            status: status.to_string(),
            message: "OK".to_string(),
            result,
        }
    }

    #[test]
    fn test_parse_abi() {
        let abi = parse_abi_result(&envelope(
            "1",
            json!(r#"[{"type":"function","name":"owner","inputs":[],"outputs":[]}]"#),
        ))
        .unwrap();
        assert_eq!(abi[0]["name"], "owner");
    }

    #[test]
    fn test_unusable_abi_results() {
        assert!(parse_abi_result(&envelope("0", json!("Contract source code not verified"))).is_none());
        assert!(parse_abi_result(&envelope("1", json!([{"type": "function"}]))).is_none());
        assert!(parse_abi_result(&envelope("1", json!("not json"))).is_none());
        assert!(parse_abi_result(&envelope("1", json!(r#"{"type":"function"}"#))).is_none());
    }
}
