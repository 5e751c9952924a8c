//! DeepSeek-V3.2 family adapter.
//!
//! DeepSeek-V3.2 ships its own message encoder and does not go through the
//! tokenizer's chat template at all. Tool catalogs are inlined into the
//! leading system message, and a small set of encoder options (thinking mode,
//! cached context, bos handling) is negotiated from the request's template
//! arguments: recognized keys are forwarded, everything else is dropped
//! silently.

use serde_json::Value;

use super::{PromptAdapter, RenderError};
use crate::tokenizer::ChatTokenizer;
use crate::{GenerationRequest, Message, Role, ToolDefinition};

const MODEL_ID_PATTERNS: [&str; 4] = [
    "deepseek-v3.2",
    "deepseek-v3_2",
    "deepseek_v3.2",
    "deepseek_v3_2",
];

/// Encoder option names the adapter forwards. Anything else is dropped
/// before the encoder sees it.
const SUPPORTED_ARGS_HINT: &str = "thinking, enable_thinking, thinking_mode, \
     context, drop_thinking, add_default_bos_token";

pub struct DeepSeekV32Adapter;

impl PromptAdapter for DeepSeekV32Adapter {
    fn name(&self) -> &'static str {
        "deepseek-v3.2"
    }

    fn matches(&self, model_id: &str) -> bool {
        let normalized = model_id.to_lowercase();
        MODEL_ID_PATTERNS.iter().any(|p| normalized.contains(p))
    }

    fn render(
        &self,
        request: &GenerationRequest,
        _tokenizer: &dyn ChatTokenizer,
    ) -> Result<String, RenderError> {
        let mut messages = request.messages.clone();
        if let Some(tools) = request.tools.as_deref().filter(|t| !t.is_empty()) {
            messages = inject_tools_system_message(messages, tools);
        }

        let options = build_encode_options(&request.template_args, &messages)?;
        encode_messages(&messages, &options).map_err(|err| {
            RenderError::Encoder(format!(
                "DeepSeek-V3.2 encoder rejected the assembled options: {err}. \
                 Supported template args: {SUPPORTED_ARGS_HINT}."
            ))
        })
    }
}

/// Merge tool definitions into the conversation's leading system message.
///
/// If the first message already has role system, the tools are appended
/// after any it already carries, preserving order. Otherwise a new leading
/// system message holding only the tools is synthesized.
fn inject_tools_system_message(
    mut messages: Vec<Message>,
    tools: &[ToolDefinition],
) -> Vec<Message> {
    if let Some(first) = messages.first_mut() {
        if first.role == Role::System {
            match &mut first.tools {
                Some(existing) => existing.extend(tools.iter().cloned()),
                None => first.tools = Some(tools.to_vec()),
            }
            return messages;
        }
    }

    let mut merged = vec![Message::system_with_tools(tools.to_vec())];
    merged.append(&mut messages);
    merged
}

// ============================================================================
// Option negotiation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThinkingMode {
    Thinking,
    Chat,
}

#[derive(Debug)]
struct EncodeOptions {
    thinking_mode: ThinkingMode,
    context: Option<Value>,
    drop_thinking: bool,
    add_default_bos_token: bool,
}

fn build_encode_options(
    template_args: &[(String, Value)],
    messages: &[Message],
) -> Result<EncodeOptions, RenderError> {
    // Lookups go through this helper only, so keys outside the recognized
    // set never influence the encoder.
    let arg = |key: &str| {
        template_args
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .filter(|v| !v.is_null())
    };

    let thinking_mode = match arg("thinking_mode") {
        Some(value) => match value.as_str() {
            Some("thinking") => ThinkingMode::Thinking,
            Some("chat") => ThinkingMode::Chat,
            _ => {
                return Err(RenderError::InvalidOption(
                    "DeepSeek-V3.2 thinking_mode must be 'thinking' or 'chat'".to_string(),
                ))
            }
        },
        None => {
            let flag = arg("thinking").or_else(|| arg("enable_thinking"));
            if flag.is_some_and(is_truthy) {
                ThinkingMode::Thinking
            } else {
                ThinkingMode::Chat
            }
        }
    };

    let drop_thinking = match arg("drop_thinking") {
        Some(value) => is_truthy(value),
        // Default: drop prior chain-of-thought exactly when the model is
        // about to answer a fresh user turn.
        None => messages.last().is_some_and(|m| m.role == Role::User),
    };

    Ok(EncodeOptions {
        thinking_mode,
        context: arg("context").cloned(),
        drop_thinking,
        add_default_bos_token: arg("add_default_bos_token").map_or(true, is_truthy),
    })
}

/// Boolean-like coercion for flag-valued template args.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "on" | "enabled" | "thinking"
        ),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

// ============================================================================
// Message encoding
// ============================================================================

const BOS_TOKEN: &str = "<\u{FF5C}begin\u{2581}of\u{2581}sentence\u{FF5C}>";
const EOS_TOKEN: &str = "<\u{FF5C}end\u{2581}of\u{2581}sentence\u{FF5C}>";
const USER_TOKEN: &str = "<\u{FF5C}User\u{FF5C}>";
const ASSISTANT_TOKEN: &str = "<\u{FF5C}Assistant\u{FF5C}>";
const TOOL_CALLS_BEGIN: &str = "<\u{FF5C}tool\u{2581}calls\u{2581}begin\u{FF5C}>";
const TOOL_CALLS_END: &str = "<\u{FF5C}tool\u{2581}calls\u{2581}end\u{FF5C}>";
const TOOL_CALL_BEGIN: &str = "<\u{FF5C}tool\u{2581}call\u{2581}begin\u{FF5C}>";
const TOOL_CALL_END: &str = "<\u{FF5C}tool\u{2581}call\u{2581}end\u{FF5C}>";
const TOOL_SEP: &str = "<\u{FF5C}tool\u{2581}sep\u{FF5C}>";
const TOOL_OUTPUT_BEGIN: &str = "<\u{FF5C}tool\u{2581}output\u{2581}begin\u{FF5C}>";
const TOOL_OUTPUT_END: &str = "<\u{FF5C}tool\u{2581}output\u{2581}end\u{FF5C}>";

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

#[derive(Debug, thiserror::Error)]
enum EncodeError {
    #[error("cannot encode an empty conversation")]
    EmptyConversation,

    #[error("context must be a string, got {0}")]
    InvalidContext(Value),
}

fn encode_messages(messages: &[Message], options: &EncodeOptions) -> Result<String, EncodeError> {
    if messages.is_empty() {
        return Err(EncodeError::EmptyConversation);
    }

    let context = match &options.context {
        None => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(other) => return Err(EncodeError::InvalidContext(other.clone())),
    };

    let mut out = String::new();
    if options.add_default_bos_token {
        out.push_str(BOS_TOKEN);
    }
    if let Some(ctx) = context {
        out.push_str(ctx);
    }

    for message in messages {
        match message.role {
            Role::System => encode_system(message, &mut out),
            Role::User => {
                out.push_str(USER_TOKEN);
                if let Some(content) = &message.content {
                    out.push_str(content);
                }
            }
            Role::Assistant => encode_assistant(message, options.drop_thinking, &mut out),
            Role::Tool => {
                out.push_str(TOOL_OUTPUT_BEGIN);
                if let Some(content) = &message.content {
                    out.push_str(content);
                }
                out.push_str(TOOL_OUTPUT_END);
            }
        }
    }

    // Generation prompt. Chat mode pre-closes the thinking span so the model
    // answers directly.
    out.push_str(ASSISTANT_TOKEN);
    out.push_str(match options.thinking_mode {
        ThinkingMode::Thinking => THINK_OPEN,
        ThinkingMode::Chat => THINK_CLOSE,
    });
    Ok(out)
}

fn encode_system(message: &Message, out: &mut String) {
    if let Some(content) = &message.content {
        out.push_str(content);
    }

    let Some(tools) = message.tools.as_deref().filter(|t| !t.is_empty()) else {
        return;
    };
    if message.content.as_deref().is_some_and(|c| !c.is_empty()) {
        out.push_str("\n\n");
    }
    out.push_str("## Tools\nYou have access to the following tools:\n");
    for tool in tools {
        out.push_str(&format!(
            "\n### {}\nDescription: {}\nParameters: {}\n",
            tool.function.name, tool.function.description, tool.function.parameters
        ));
    }
}

fn encode_assistant(message: &Message, drop_thinking: bool, out: &mut String) {
    out.push_str(ASSISTANT_TOKEN);
    if let Some(content) = &message.content {
        if drop_thinking {
            out.push_str(&strip_thinking(content));
        } else {
            out.push_str(content);
        }
    }
    if let Some(calls) = message.tool_calls.as_deref() {
        out.push_str(TOOL_CALLS_BEGIN);
        for call in calls {
            out.push_str(TOOL_CALL_BEGIN);
            out.push_str(&call.function.name);
            out.push_str(TOOL_SEP);
            out.push_str(&call.function.arguments);
            out.push_str(TOOL_CALL_END);
        }
        out.push_str(TOOL_CALLS_END);
    }
    out.push_str(EOS_TOKEN);
}

/// Remove `<think>…</think>` spans. An unterminated span drops the rest of
/// the text, matching how the official encoder truncates stale reasoning.
fn strip_thinking(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..start]);
        match rest[start..].find(THINK_CLOSE) {
            Some(end) => rest = &rest[start + end + THINK_CLOSE.len()..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
