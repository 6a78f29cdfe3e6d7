//! LLM provider implementations for forgeloop.
//!
//! Two wire-format adapters implement `forgeloop_core::ProviderAdapter`:
//! [`BlockContentAdapter`] and [`FunctionCallAdapter`]. Two HTTP transports
//! implement `forgeloop_core::ProviderTransport`. The router pairs them per
//! configured provider name.

pub mod anthropic;
pub mod block_content;
pub mod function_call;
mod http;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicTransport;
pub use block_content::BlockContentAdapter;
pub use function_call::FunctionCallAdapter;
pub use openai_compat::OpenAiCompatTransport;
pub use router::{Endpoint, ProviderRouter, build_from_config};

use std::collections::BTreeMap;
use std::sync::Arc;

use forgeloop_core::error::Error;
use forgeloop_core::provider::{ProviderAdapter, ProviderFamily};
use forgeloop_core::tool::{ToolCall, ToolResult};
use serde_json::value::RawValue;

/// The stock adapter for a family.
pub fn adapter_for(family: ProviderFamily) -> Arc<dyn ProviderAdapter> {
    match family {
        ProviderFamily::BlockContent => Arc::new(BlockContentAdapter::new()),
        ProviderFamily::FunctionCall => Arc::new(FunctionCallAdapter::new()),
    }
}

/// Every call of a turn must be answered exactly once, in call order,
/// before the continuation is written.
pub(crate) fn ensure_answered(calls: &[ToolCall], results: &[ToolResult]) -> Result<(), Error> {
    if calls.len() != results.len() {
        return Err(Error::Internal(format!(
            "turn has {} tool call(s) but {} result(s)",
            calls.len(),
            results.len()
        )));
    }
    if let Some((call, result)) = calls
        .iter()
        .zip(results)
        .find(|(call, result)| call.id != result.call.id)
    {
        return Err(Error::Internal(format!(
            "result for call '{}' found where call '{}' was expected",
            result.call.id, call.id
        )));
    }
    Ok(())
}

/// Keys of a JSON object that are not in `known` and carry a non-null value.
pub(crate) fn unknown_keys(object: &RawValue, known: &[&str]) -> Result<Vec<String>, serde_json::Error> {
    let fields: BTreeMap<String, &RawValue> = serde_json::from_str(object.get())?;
    Ok(fields
        .into_iter()
        .filter(|(key, value)| !known.contains(&key.as_str()) && value.get() != "null")
        .map(|(key, _)| key)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_for_each_family() {
        assert_eq!(
            adapter_for(ProviderFamily::BlockContent).family(),
            ProviderFamily::BlockContent
        );
        assert_eq!(
            adapter_for(ProviderFamily::FunctionCall).family(),
            ProviderFamily::FunctionCall
        );
    }

    #[test]
    fn out_of_order_results_are_rejected() {
        let a = ToolCall::new("a", "x", "{}");
        let b = ToolCall::new("b", "x", "{}");
        let results = vec![
            ToolResult::success(b.clone(), "1"),
            ToolResult::success(a.clone(), "2"),
        ];
        assert!(ensure_answered(&[a.clone(), b.clone()], &results).is_err());
        let results = vec![ToolResult::success(a.clone(), "1"), ToolResult::success(b.clone(), "2")];
        assert!(ensure_answered(&[a, b], &results).is_ok());
    }

    #[test]
    fn unknown_keys_skip_known_and_null() {
        let raw = RawValue::from_string(r#"{"id":"1","refusal":null,"caller":{"x":1}}"#.into()).unwrap();
        assert_eq!(unknown_keys(&raw, &["id"]).unwrap(), vec!["caller".to_string()]);
        let not_object = RawValue::from_string("[1]".into()).unwrap();
        assert!(unknown_keys(&not_object, &["id"]).is_err());
    }
}
