//! Tokenizer collaborator interface.
//!
//! The runtime never loads tokenizers itself; it only needs two things from
//! one: whether a chat template exists, and the ability to apply it. The
//! error contract matters: implementations must report an option they do not
//! accept as [`TemplateError::UnsupportedOption`], distinguishable from every
//! other failure, so template-argument negotiation can react precisely.

use crate::Message;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The template does not accept the named option. Negotiation catches
    /// exactly this variant; everything else propagates unmodified.
    #[error("chat template does not accept option '{option}'")]
    UnsupportedOption { option: String },

    #[error("chat template application failed: {0}")]
    Failed(String),
}

pub trait ChatTokenizer: Send + Sync {
    /// Whether this tokenizer carries a chat template at all.
    fn has_chat_template(&self) -> bool;

    /// Apply the chat template, producing prompt text (never token ids).
    ///
    /// `options` are name/value pairs in caller order; implementations must
    /// reject unknown names with [`TemplateError::UnsupportedOption`].
    fn apply_chat_template(
        &self,
        messages: &[Message],
        options: &[(String, serde_json::Value)],
    ) -> Result<String, TemplateError>;
}
