pub mod adapters;
pub mod cache;
pub mod mock;
pub mod tokenizer;

pub use adapters::{AdapterRegistry, PromptAdapter, RenderError};
pub use cache::{MemoryModelCache, ModelCache};
pub use mock::{MockProvider, MockTokenizer};
pub use tokenizer::{ChatTokenizer, TemplateError};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Trait for text-generation backends.
///
/// The runtime treats inference as an opaque, potentially long-running
/// operation. Timeouts and cancellation belong to the implementation,
/// not to the callers in this crate.
#[async_trait::async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Run one generation pass over the request's message history.
    async fn complete(&self, request: GenerationRequest) -> Result<InferenceResponse>;

    /// Get the provider name
    fn name(&self) -> &str;
}

/// A single conversation entry.
///
/// `content` is `None` (not empty) on assistant entries that only carry
/// tool calls. `tools` appears only on system messages for model families
/// that inline the tool catalog into the system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Message {
    fn bare(role: Role) -> Self {
        Self {
            role,
            content: None,
            tool_calls: None,
            tool_call_id: None,
            tools: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::bare(Role::System)
        }
    }

    /// Create a system message carrying only a tool catalog.
    pub fn system_with_tools(tools: Vec<ToolDefinition>) -> Self {
        Self {
            tools: Some(tools),
            ..Self::bare(Role::System)
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::bare(Role::User)
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::bare(Role::Assistant)
        }
    }

    /// Create an assistant message that requests exactly one tool call.
    /// Content stays `None`; narration lives in its own message.
    pub fn assistant_tool_call(call: ToolCall) -> Self {
        Self {
            tool_calls: Some(vec![call]),
            ..Self::bare(Role::Assistant)
        }
    }

    /// Create a tool-role message answering the call with the given id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Self::bare(Role::Tool)
        }
    }
}

/// A function made available to the model, OpenAI tool-definition shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    /// JSON-schema-shaped parameter description.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// A structured function-invocation request parsed out of generated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within one extraction pass only, not globally.
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Canonical JSON encoding of the arguments object, never raw matched text.
    pub arguments: String,
}

/// Request payload for both prompt rendering and inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    /// Optional chat-template arguments, in caller order. Order matters:
    /// template negotiation tries them one at a time in this order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_args: Vec<(String, serde_json::Value)>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub dtype: Dtype,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: None,
            generation_config: None,
            template_args: Vec::new(),
            seed: 0,
            dtype: Dtype::Auto,
        }
    }
}

/// Sampling and decoding knobs forwarded to the generation backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_strings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_sample: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_beams: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typical_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_return_sequences: Option<u32>,
}

/// Numeric precision hint for model loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    #[default]
    Auto,
    Float16,
    BFloat16,
    Float32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChoiceMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: Role,
    /// `None` marks a structurally invalid generation; callers treat it as
    /// a terminal failure rather than an empty turn.
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
