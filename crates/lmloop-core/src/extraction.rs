//! Tool-call extraction from generated text.
//!
//! Models emit function-invocation requests inline, and different model
//! families tag them differently. Two conventions are recognized, scanned
//! independently over the full text — they are not mutually exclusive:
//!
//! 1. Delimited JSON (Hermes style):
//! ```text
//! <tool_call>{"name": "get_weather", "arguments": {"city": "Tokyo"}}</tool_call>
//! ```
//!
//! 2. DeepSeek tool tags, a bare name and a JSON arguments object wrapped in
//!    three multi-character delimiters:
//! ```text
//! <｜tool▁call▁begin｜>get_weather<｜tool▁sep｜>{"city": "Tokyo"}<｜tool▁call▁end｜>
//! ```
//!
//! A malformed payload skips that one match; it never aborts the scan.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use lmloop_providers::{FunctionCall, ToolCall};

/// Prefix for synthetic call ids. Ids are `call_{index}` by position in the
/// combined output list, unique within a single extraction pass only —
/// downstream correlation of one turn relies on exactly this scheme.
pub const CALL_ID_PREFIX: &str = "call_";

static DELIMITED_JSON_RE: OnceLock<Regex> = OnceLock::new();
static DEEPSEEK_TAG_RE: OnceLock<Regex> = OnceLock::new();

fn delimited_json_re() -> &'static Regex {
    DELIMITED_JSON_RE.get_or_init(|| {
        Regex::new(r"(?s)<tool_call>\s*(\{.*?\})\s*</tool_call>").expect("valid regex")
    })
}

fn deepseek_tag_re() -> &'static Regex {
    DEEPSEEK_TAG_RE.get_or_init(|| {
        Regex::new(
            r"(?s)<\u{FF5C}tool\u{2581}call\u{2581}begin\u{FF5C}>\s*(.*?)\s*<\u{FF5C}tool\u{2581}sep\u{FF5C}>\s*(\{.*?\})\s*<\u{FF5C}tool\u{2581}call\u{2581}end\u{FF5C}>",
        )
        .expect("valid regex")
    })
}

/// Extract all recognized tool calls from `text`.
///
/// Matches of the delimited-JSON convention come first, then the DeepSeek
/// tag matches, each in left-to-right text order. The result is empty for
/// text without markup; extraction is pure and idempotent, ids included.
pub fn extract_tool_calls(text: &str) -> Vec<ToolCall> {
    let mut calls: Vec<ToolCall> = Vec::new();

    for captures in delimited_json_re().captures_iter(text) {
        let payload = &captures[1];
        let parsed: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => {
                debug!("Skipping malformed tool call payload: {}", err);
                continue;
            }
        };
        let name = parsed
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let arguments = parsed
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        calls.push(make_call(calls.len(), name, &arguments));
    }

    for captures in deepseek_tag_re().captures_iter(text) {
        let name = captures[1].trim().to_string();
        let arguments: Value = match serde_json::from_str(&captures[2]) {
            Ok(value) => value,
            Err(err) => {
                debug!("Skipping malformed tool call arguments: {}", err);
                continue;
            }
        };
        calls.push(make_call(calls.len(), name, &arguments));
    }

    calls
}

/// Strip delimited-JSON tool-call markup, leaving narration text.
///
/// Only the `<tool_call>…</tool_call>` convention is removed; DeepSeek tag
/// markup stays in place in the stored transcript.
pub fn strip_tool_call_markup(text: &str) -> String {
    delimited_json_re().replace_all(text, "").trim().to_string()
}

fn make_call(index: usize, name: String, arguments: &Value) -> ToolCall {
    ToolCall {
        id: format!("{CALL_ID_PREFIX}{index}"),
        function: FunctionCall {
            name,
            // Canonical re-serialization; raw matched text is never stored.
            arguments: arguments.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DS_CALL: &str = "<\u{FF5C}tool\u{2581}call\u{2581}begin\u{FF5C}>calculator\
<\u{FF5C}tool\u{2581}sep\u{FF5C}>{\"x\": 2, \"y\": 2}\
<\u{FF5C}tool\u{2581}call\u{2581}end\u{FF5C}>";

    #[test]
    fn test_no_markup_yields_empty_list() {
        assert!(extract_tool_calls("The answer is 4.").is_empty());
        assert!(extract_tool_calls("").is_empty());
    }

    #[test]
    fn test_single_delimited_json_call() {
        let calls =
            extract_tool_calls("<tool_call>{\"name\":\"f\",\"arguments\":{\"x\":1}}</tool_call>");

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[0].function.name, "f");
        let args: serde_json::Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(args, serde_json::json!({"x": 1}));
    }

    #[test]
    fn test_whitespace_and_newlines_around_payload() {
        let text = "<tool_call>\n  {\"name\": \"f\",\n   \"arguments\": {}}\n</tool_call>";
        let calls = extract_tool_calls(text);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.arguments, "{}");
    }

    #[test]
    fn test_missing_arguments_defaults_to_empty_object() {
        let calls = extract_tool_calls("<tool_call>{\"name\":\"f\"}</tool_call>");

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.arguments, "{}");
    }

    #[test]
    fn test_malformed_payload_is_skipped_silently() {
        let text = "<tool_call>{not json}</tool_call>\
                    <tool_call>{\"name\":\"good\",\"arguments\":{}}</tool_call>";
        let calls = extract_tool_calls(text);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "good");
        assert_eq!(calls[0].id, "call_0");
    }

    #[test]
    fn test_deepseek_tag_call() {
        let calls = extract_tool_calls(DS_CALL);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "calculator");
        let args: serde_json::Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(args, serde_json::json!({"x": 2, "y": 2}));
    }

    #[test]
    fn test_conventions_are_concatenated_delimited_json_first() {
        // DeepSeek tag appears first in the text but is listed second.
        let text = format!(
            "{DS_CALL} and also <tool_call>{{\"name\":\"f\",\"arguments\":{{}}}}</tool_call>"
        );
        let calls = extract_tool_calls(&text);

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].function.name, "f");
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[1].function.name, "calculator");
        assert_eq!(calls[1].id, "call_1");
    }

    #[test]
    fn test_multiple_calls_preserve_text_order_within_convention() {
        let text = "<tool_call>{\"name\":\"a\",\"arguments\":{}}</tool_call>\
                    middle\
                    <tool_call>{\"name\":\"b\",\"arguments\":{}}</tool_call>";
        let calls = extract_tool_calls(text);

        let names: Vec<_> = calls.iter().map(|c| c.function.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(calls[1].id, "call_1");
    }

    #[test]
    fn test_extraction_is_idempotent_including_ids() {
        let text = format!(
            "<tool_call>{{\"name\":\"a\",\"arguments\":{{\"k\":\"v\"}}}}</tool_call>{DS_CALL}"
        );
        let first = extract_tool_calls(&text);
        let second = extract_tool_calls(&text);

        assert_eq!(first, second);
    }

    #[test]
    fn test_arguments_are_canonically_serialized() {
        let text = "<tool_call>{\"name\":\"f\",\"arguments\":{\n  \"x\":   1\n}}</tool_call>";
        let calls = extract_tool_calls(text);

        // Whitespace from the matched text does not survive.
        assert_eq!(calls[0].function.arguments, "{\"x\":1}");
    }

    #[test]
    fn test_strip_removes_only_delimited_json_markup() {
        let text = format!(
            "Checking the weather. <tool_call>{{\"name\":\"f\",\"arguments\":{{}}}}</tool_call> {DS_CALL}"
        );
        let narration = strip_tool_call_markup(&text);

        assert!(narration.starts_with("Checking the weather."));
        assert!(!narration.contains("<tool_call>"));
        assert!(narration.contains("calculator"));
    }

    #[test]
    fn test_strip_trims_leftover_whitespace() {
        let text = "  <tool_call>{\"name\":\"f\",\"arguments\":{}}</tool_call>  ";
        assert_eq!(strip_tool_call_markup(text), "");
    }
}
