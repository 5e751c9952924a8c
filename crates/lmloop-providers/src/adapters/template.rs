//! Generic chat-template adapter.
//!
//! Works for any model whose tokenizer carries a chat template. Templates
//! differ in which optional arguments they accept, and there is no way to
//! ask up front, so rendering negotiates: try everything at once, and if the
//! template objects to an option, re-add the optional arguments one at a
//! time, keeping the ones that stick. The search is linear and
//! order-sensitive, never combinatorial, and one bad argument can never
//! block the others.

use serde_json::Value;
use tracing::debug;

use super::{PromptAdapter, RenderError};
use crate::tokenizer::{ChatTokenizer, TemplateError};
use crate::GenerationRequest;

pub struct TemplateAdapter;

impl TemplateAdapter {
    /// Options every call carries: text output with a generation prompt
    /// appended, plus the tool catalog when one was supplied.
    fn base_options(request: &GenerationRequest) -> Vec<(String, Value)> {
        let mut options = vec![("add_generation_prompt".to_string(), Value::Bool(true))];
        if let Some(tools) = &request.tools {
            // ToolDefinition serialization is infallible: plain structs and
            // an already-valid JSON parameters value.
            let tools = serde_json::to_value(tools).expect("tool definitions serialize");
            options.push(("tools".to_string(), tools));
        }
        options
    }
}

impl PromptAdapter for TemplateAdapter {
    fn name(&self) -> &'static str {
        "template"
    }

    fn matches(&self, _model_id: &str) -> bool {
        true
    }

    fn render(
        &self,
        request: &GenerationRequest,
        tokenizer: &dyn ChatTokenizer,
    ) -> Result<String, RenderError> {
        if !tokenizer.has_chat_template() {
            return Err(RenderError::MissingChatTemplate {
                model: request.model.clone(),
            });
        }

        let base = Self::base_options(request);
        let optional = &request.template_args;

        // Optimistic first attempt with everything merged in.
        let mut merged = base.clone();
        merged.extend(optional.iter().cloned());
        match tokenizer.apply_chat_template(&request.messages, &merged) {
            Ok(prompt) => return Ok(prompt),
            // Nothing to negotiate away; the failure is the caller's.
            Err(err @ TemplateError::UnsupportedOption { .. }) if optional.is_empty() => {
                return Err(err.into());
            }
            Err(TemplateError::UnsupportedOption { option }) => {
                debug!("Chat template rejected option '{}', negotiating", option);
            }
            Err(err) => return Err(err.into()),
        }

        // Linear re-add: each optional argument is tried exactly once, in
        // caller order, on top of the arguments accepted so far. A rejected
        // argument is removed and never reintroduced. The latest successful
        // attempt always contains every accepted argument, so remembering it
        // keeps compatible arguments from being lost to a later rejection.
        let mut accepted = base.clone();
        let mut last_success: Option<String> = None;
        for (name, value) in optional {
            accepted.push((name.clone(), value.clone()));
            match tokenizer.apply_chat_template(&request.messages, &accepted) {
                Ok(prompt) => last_success = Some(prompt),
                Err(TemplateError::UnsupportedOption { option }) => {
                    debug!("Chat template rejected option '{}', dropping it", option);
                    accepted.pop();
                }
                Err(err) => return Err(err.into()),
            }
        }
        if let Some(prompt) = last_success {
            return Ok(prompt);
        }

        // Every optional argument was rejected; whatever the base call
        // produces is the outcome.
        tokenizer
            .apply_chat_template(&request.messages, &base)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTokenizer;
    use crate::{Message, ToolDefinition};
    use serde_json::json;

    fn request_with_args(args: &[(&str, Value)]) -> GenerationRequest {
        let mut request = GenerationRequest::new("some/model", vec![Message::user("hi")]);
        request.template_args = args
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        request
    }

    #[test]
    fn test_missing_template_is_a_render_failure() {
        let tokenizer = MockTokenizer::without_template();
        let err = TemplateAdapter
            .render(&request_with_args(&[]), &tokenizer)
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingChatTemplate { .. }));
    }

    #[test]
    fn test_all_options_accepted_renders_in_one_attempt() {
        let tokenizer = MockTokenizer::new();
        let request = request_with_args(&[("enable_thinking", json!(true))]);

        let prompt = TemplateAdapter.render(&request, &tokenizer).unwrap();
        assert!(prompt.contains("enable_thinking"));
        assert_eq!(tokenizer.attempts().len(), 1);
    }

    #[test]
    fn test_tools_are_forwarded_under_tools_option() {
        let tokenizer = MockTokenizer::new();
        let mut request = request_with_args(&[]);
        request.tools = Some(vec![ToolDefinition::function("f", "desc", json!({}))]);

        let prompt = TemplateAdapter.render(&request, &tokenizer).unwrap();
        assert!(prompt.contains("tools"));
    }

    #[test]
    fn test_negotiation_keeps_compatible_args_across_a_rejection() {
        // Offered in order: a (accepted), b (rejected), c (accepted).
        let tokenizer = MockTokenizer::new().with_rejected(&["b"]);
        let request = request_with_args(&[
            ("a", json!(1)),
            ("b", json!(2)),
            ("c", json!(3)),
        ]);

        let prompt = TemplateAdapter.render(&request, &tokenizer).unwrap();
        assert!(prompt.contains("<options:add_generation_prompt,a,c>"));

        // merged, base+a, base+a+b, base+a+c — never a combination that
        // reintroduces b.
        let attempts = tokenizer.attempts();
        assert_eq!(attempts.len(), 4);
        assert!(attempts[3].iter().all(|name| name != "b"));
    }

    #[test]
    fn test_rejection_of_base_option_propagates_when_nothing_to_negotiate() {
        let tokenizer = MockTokenizer::new().with_rejected(&["add_generation_prompt"]);
        let request = request_with_args(&[]);

        let err = TemplateAdapter.render(&request, &tokenizer).unwrap_err();
        match err {
            RenderError::Template(TemplateError::UnsupportedOption { option }) => {
                assert_eq!(option, "add_generation_prompt");
            }
            other => panic!("expected unsupported-option error, got {other:?}"),
        }
    }

    #[test]
    fn test_all_optional_args_rejected_falls_back_to_base_call() {
        let tokenizer = MockTokenizer::new().with_rejected(&["x", "y"]);
        let request = request_with_args(&[("x", json!(1)), ("y", json!(2))]);

        let prompt = TemplateAdapter.render(&request, &tokenizer).unwrap();
        assert!(prompt.contains("<options:add_generation_prompt>"));
    }

    #[test]
    fn test_other_error_classes_abort_negotiation() {
        let tokenizer = MockTokenizer::failing();
        let request = request_with_args(&[("a", json!(1))]);

        let err = TemplateAdapter.render(&request, &tokenizer).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Template(TemplateError::Failed(_))
        ));
        // Failure class other than unsupported-option: exactly one attempt.
        assert_eq!(tokenizer.attempts().len(), 1);
    }
}
