//! The conversation orchestrator.
//!
//! One strictly sequential loop per conversation: invoke the provider over
//! the current history, extract tool calls from the generated text, execute
//! them locally, append the results, repeat. The loop owns the history and
//! only ever appends to it. It terminates when the model produces a turn
//! with no tool calls, when the provider fails, or when the response is
//! structurally unusable — the two failure cases are logged and hand back
//! the history accumulated so far rather than raising.

use tracing::{debug, error, warn};

use lmloop_providers::{GenerationRequest, InferenceProvider, Message};

use crate::dispatch::ToolDispatcher;
use crate::extraction::{extract_tool_calls, strip_tool_call_markup};

/// Content stored in a tool-role message when dispatch produced no result.
pub const TOOL_ERROR_SENTINEL: &str = "Error executing function";

#[derive(Debug, Clone, Default)]
pub struct LoopConfig {
    /// Upper bound on provider invocations. `None` (the default) runs until
    /// the model stops calling tools; a bound guards against a model that
    /// never does. Reaching it returns the history as accumulated.
    pub max_turns: Option<u32>,
}

/// Drives the multi-turn tool-use conversation.
pub struct ToolLoop<'a> {
    provider: &'a dyn InferenceProvider,
    dispatcher: &'a ToolDispatcher,
    config: LoopConfig,
}

impl<'a> ToolLoop<'a> {
    pub fn new(provider: &'a dyn InferenceProvider, dispatcher: &'a ToolDispatcher) -> Self {
        Self {
            provider,
            dispatcher,
            config: LoopConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the loop to completion. `request.messages` seeds the history;
    /// the returned vector is that history plus everything appended.
    pub async fn run(&self, mut request: GenerationRequest) -> Vec<Message> {
        let mut turns = 0u32;

        loop {
            if let Some(max) = self.config.max_turns {
                if turns >= max {
                    warn!("Tool loop reached the configured limit of {} turns", max);
                    return request.messages;
                }
            }
            turns += 1;

            let response = match self.provider.complete(request.clone()).await {
                Ok(response) => response,
                Err(err) => {
                    error!("Inference failed, ending conversation: {:#}", err);
                    return request.messages;
                }
            };

            let content = match response
                .choices
                .first()
                .and_then(|choice| choice.message.content.clone())
            {
                Some(content) => content,
                None => {
                    error!("Response has no usable choice content, ending conversation");
                    return request.messages;
                }
            };

            let calls = extract_tool_calls(&content);
            if calls.is_empty() {
                // Accepting state: a plain answer ends the conversation.
                request.messages.push(Message::assistant(content));
                return request.messages;
            }

            debug!("Turn {} extracted {} tool call(s)", turns, calls.len());

            // Narration is stored apart from the calls, with the call
            // markup removed.
            let narration = strip_tool_call_markup(&content);
            if !narration.is_empty() {
                request.messages.push(Message::assistant(narration));
            }

            for call in calls {
                request.messages.push(Message::assistant_tool_call(call.clone()));

                let content = match self.dispatcher.dispatch(&call) {
                    Some(result) => result.to_string(),
                    None => TOOL_ERROR_SENTINEL.to_string(),
                };
                request.messages.push(Message::tool_result(call.id, content));
            }
        }
    }
}
