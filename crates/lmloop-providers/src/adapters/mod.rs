//! Prompt adapters for model families with incompatible chat encodings.
//!
//! An adapter turns a structured conversation into the one prompt string a
//! model family expects. Resolution is a fixed-priority capability check:
//! family adapters first (they bypass tokenizer templating entirely), then
//! the generic chat-template adapter when the tokenizer has a template, then
//! a role-discarding fallback. Resolution always succeeds; rendering can fail.

mod deepseek;
mod fallback;
mod template;

pub use deepseek::DeepSeekV32Adapter;
pub use fallback::FallbackAdapter;
pub use template::TemplateAdapter;

use crate::tokenizer::{ChatTokenizer, TemplateError};
use crate::GenerationRequest;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("model '{model}' has no chat template; template rendering is unavailable")]
    MissingChatTemplate { model: String },

    /// A template argument carried a value the adapter refuses outright.
    #[error("invalid template argument: {0}")]
    InvalidOption(String),

    /// The family encoder rejected the assembled option set.
    #[error("{0}")]
    Encoder(String),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Strategy translating a structured conversation into a model-specific prompt.
pub trait PromptAdapter: Send + Sync {
    /// Stable adapter name, for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Pure, case-insensitive model-id test. No side effects.
    fn matches(&self, model_id: &str) -> bool;

    /// Produce the prompt string for this request.
    fn render(
        &self,
        request: &GenerationRequest,
        tokenizer: &dyn ChatTokenizer,
    ) -> Result<String, RenderError>;
}

/// Deterministic adapter resolution, owned by the caller.
///
/// Family adapters are consulted in declaration order, so a more specific
/// family must be registered before a broader one.
pub struct AdapterRegistry {
    family: Vec<Box<dyn PromptAdapter>>,
    template: TemplateAdapter,
    fallback: FallbackAdapter,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            family: vec![Box::new(DeepSeekV32Adapter)],
            template: TemplateAdapter,
            fallback: FallbackAdapter,
        }
    }

    /// Resolve the adapter for a model id. Total: always returns an adapter.
    pub fn resolve(&self, model_id: &str, tokenizer: &dyn ChatTokenizer) -> &dyn PromptAdapter {
        for adapter in &self.family {
            if adapter.matches(model_id) {
                return adapter.as_ref();
            }
        }
        if tokenizer.has_chat_template() {
            return &self.template;
        }
        &self.fallback
    }

    /// Resolve and render in one step.
    pub fn render(
        &self,
        request: &GenerationRequest,
        tokenizer: &dyn ChatTokenizer,
    ) -> Result<String, RenderError> {
        self.resolve(&request.model, tokenizer).render(request, tokenizer)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTokenizer;
    use crate::Message;

    #[test]
    fn test_family_match_wins_over_template_capability() {
        let registry = AdapterRegistry::new();
        let tokenizer = MockTokenizer::new();
        assert!(tokenizer.has_chat_template());

        let adapter = registry.resolve("deepseek-ai/DeepSeek-V3.2-Exp", &tokenizer);
        assert_eq!(adapter.name(), "deepseek-v3.2");
    }

    #[test]
    fn test_family_match_without_template_capability() {
        let registry = AdapterRegistry::new();
        let tokenizer = MockTokenizer::without_template();

        let adapter = registry.resolve("DeepSeek_V3_2", &tokenizer);
        assert_eq!(adapter.name(), "deepseek-v3.2");
    }

    #[test]
    fn test_template_adapter_for_unmatched_model() {
        let registry = AdapterRegistry::new();
        let tokenizer = MockTokenizer::new();

        let adapter = registry.resolve("Qwen/Qwen2.5-7B-Instruct", &tokenizer);
        assert_eq!(adapter.name(), "template");
    }

    #[test]
    fn test_fallback_when_nothing_applies() {
        let registry = AdapterRegistry::new();
        let tokenizer = MockTokenizer::without_template();

        let adapter = registry.resolve("gpt2", &tokenizer);
        assert_eq!(adapter.name(), "fallback");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let registry = AdapterRegistry::new();
        let tokenizer = MockTokenizer::new();

        let first = registry.resolve("mistralai/Mistral-7B", &tokenizer).name();
        for _ in 0..3 {
            assert_eq!(registry.resolve("mistralai/Mistral-7B", &tokenizer).name(), first);
        }
    }

    #[test]
    fn test_registry_render_convenience() {
        let registry = AdapterRegistry::new();
        let tokenizer = MockTokenizer::new();
        let request = GenerationRequest::new("some-model", vec![Message::user("hi")]);

        let prompt = registry.render(&request, &tokenizer).unwrap();
        assert!(prompt.contains("hi"));
    }
}
