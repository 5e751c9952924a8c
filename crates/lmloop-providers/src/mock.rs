#![allow(dead_code)]
//! Mock collaborators for testing.
//!
//! This module provides a scriptable inference provider and a configurable
//! tokenizer so adapter resolution, template negotiation, and the tool-use
//! loop can be exercised without any model weights.
//!
//! # Example
//!
//! ```rust,ignore
//! use lmloop_providers::mock::{MockProvider, MockTokenizer};
//!
//! // Provider answering two turns: one tool call, then a closing sentence.
//! let provider = MockProvider::new()
//!     .with_text("<tool_call>{\"name\":\"shell\",\"arguments\":{}}</tool_call>")
//!     .with_text("All done.");
//!
//! // Tokenizer whose template rejects the `enable_thinking` option.
//! let tokenizer = MockTokenizer::new().with_rejected(&["enable_thinking"]);
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;

use crate::tokenizer::{ChatTokenizer, TemplateError};
use crate::{
    Choice, ChoiceMessage, FinishReason, GenerationRequest, InferenceProvider, InferenceResponse,
    Message, Role, Usage,
};

/// One scripted outcome for a [`MockProvider`] call.
#[derive(Debug, Clone)]
enum ScriptedResult {
    Response(InferenceResponse),
    TransportError(String),
}

/// Scriptable inference provider. Responses are consumed in order; running
/// past the script is a transport error, which conveniently terminates
/// loops under test.
pub struct MockProvider {
    name: String,
    script: Mutex<VecDeque<ScriptedResult>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a well-formed single-choice text response.
    pub fn with_text(self, content: &str) -> Self {
        self.with_response(Self::text_response(content))
    }

    /// Queue an arbitrary response.
    pub fn with_response(self, response: InferenceResponse) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedResult::Response(response));
        self
    }

    /// Queue a transport-level failure.
    pub fn with_error(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedResult::TransportError(message.to_string()));
        self
    }

    /// Queue a structurally invalid response with no choices.
    pub fn with_empty_choices(self) -> Self {
        self.with_response(InferenceResponse {
            model: "mock".to_string(),
            choices: vec![],
            usage: Usage::default(),
        })
    }

    /// Queue a response whose message carries no content field.
    pub fn with_missing_content(self) -> Self {
        self.with_response(InferenceResponse {
            model: "mock".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: Role::Assistant,
                    content: None,
                },
                finish_reason: FinishReason::Stop,
            }],
            usage: Usage::default(),
        })
    }

    /// Build a well-formed single-choice response around `content`.
    pub fn text_response(content: &str) -> InferenceResponse {
        InferenceResponse {
            model: "mock".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: Role::Assistant,
                    content: Some(content.to_string()),
                },
                finish_reason: FinishReason::Stop,
            }],
            usage: Usage {
                prompt_tokens: 100,
                completion_tokens: content.len() as u32 / 4,
                total_tokens: 100 + content.len() as u32 / 4,
            },
        }
    }

    /// Number of completed calls so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InferenceProvider for MockProvider {
    async fn complete(&self, request: GenerationRequest) -> Result<InferenceResponse> {
        self.requests.lock().unwrap().push(request);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(ScriptedResult::Response(response)) => Ok(response),
            Some(ScriptedResult::TransportError(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("mock provider script exhausted")),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Configurable tokenizer double.
///
/// Applying the template renders the message contents plus a trailing
/// `<options:...>` marker listing the option names it was called with, so
/// tests can assert exactly which options survived negotiation. Every
/// attempt's option names are also recorded.
pub struct MockTokenizer {
    has_template: bool,
    rejected: Vec<String>,
    fail_all: bool,
    attempts: Mutex<Vec<Vec<String>>>,
}

impl MockTokenizer {
    /// Template-capable tokenizer accepting every option.
    pub fn new() -> Self {
        Self {
            has_template: true,
            rejected: Vec::new(),
            fail_all: false,
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Tokenizer with no chat template at all.
    pub fn without_template() -> Self {
        Self {
            has_template: false,
            ..Self::new()
        }
    }

    /// Tokenizer whose template application always fails with a
    /// non-negotiable error.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::new()
        }
    }

    /// Reject the named options with the unsupported-option error class.
    pub fn with_rejected(mut self, names: &[&str]) -> Self {
        self.rejected = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Option names of every `apply_chat_template` attempt, in call order.
    pub fn attempts(&self) -> Vec<Vec<String>> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Default for MockTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatTokenizer for MockTokenizer {
    fn has_chat_template(&self) -> bool {
        self.has_template
    }

    fn apply_chat_template(
        &self,
        messages: &[Message],
        options: &[(String, serde_json::Value)],
    ) -> Result<String, TemplateError> {
        let names: Vec<String> = options.iter().map(|(name, _)| name.clone()).collect();
        self.attempts.lock().unwrap().push(names.clone());

        if self.fail_all {
            return Err(TemplateError::Failed("mock template failure".to_string()));
        }
        if let Some((name, _)) = options.iter().find(|(name, _)| self.rejected.contains(name)) {
            return Err(TemplateError::UnsupportedOption {
                option: name.clone(),
            });
        }

        let body = messages
            .iter()
            .filter_map(|m| m.content.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!("{body}\n<options:{}>", names.join(",")))
    }
}
