//! Last-resort adapter for models with no family match and no chat template.
//!
//! Discards all role structure and concatenates message contents. Tool
//! definitions and template arguments cannot be honored here; their presence
//! is logged and ignored, never a failure.

use tracing::warn;

use super::{PromptAdapter, RenderError};
use crate::tokenizer::ChatTokenizer;
use crate::GenerationRequest;

pub struct FallbackAdapter;

impl PromptAdapter for FallbackAdapter {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn matches(&self, _model_id: &str) -> bool {
        true
    }

    fn render(
        &self,
        request: &GenerationRequest,
        _tokenizer: &dyn ChatTokenizer,
    ) -> Result<String, RenderError> {
        if request.tools.is_some() {
            warn!(
                "Tools are ignored for model {} because no prompt adapter matches it and \
                 the tokenizer has no chat template",
                request.model
            );
        }
        if !request.template_args.is_empty() {
            warn!(
                "Ignoring template args for model {} because the tokenizer has no chat template",
                request.model
            );
        }

        Ok(request
            .messages
            .iter()
            .filter_map(|m| m.content.as_deref())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTokenizer;
    use crate::{Message, ToolDefinition};
    use serde_json::json;

    #[test]
    fn test_joins_non_empty_contents_in_order() {
        let mut no_content = Message::assistant("");
        no_content.content = None;
        let request = GenerationRequest::new(
            "gpt2",
            vec![
                Message::system("first"),
                Message::user("second"),
                Message::assistant(""),
                no_content,
                Message::user("third"),
            ],
        );

        let prompt = FallbackAdapter
            .render(&request, &MockTokenizer::without_template())
            .unwrap();
        assert_eq!(prompt, "first\nsecond\nthird");
    }

    #[test]
    fn test_tools_and_template_args_do_not_fail_rendering() {
        let mut request = GenerationRequest::new("gpt2", vec![Message::user("hi")]);
        request.tools = Some(vec![ToolDefinition::function("f", "d", json!({}))]);
        request.template_args = vec![("enable_thinking".to_string(), json!(true))];

        let prompt = FallbackAdapter
            .render(&request, &MockTokenizer::without_template())
            .unwrap();
        assert_eq!(prompt, "hi");
    }

    #[test]
    fn test_matches_everything() {
        assert!(FallbackAdapter.matches("anything"));
        assert_eq!(FallbackAdapter.name(), "fallback");
    }
}
