//! Conversation core: tool-call extraction and the tool-use loop.
//!
//! Sits on top of `lmloop-providers`: the loop renders/infers through an
//! [`lmloop_providers::InferenceProvider`], extracts structured tool calls
//! from the generated text, executes them against a caller-supplied dispatch
//! table, and folds the results back into the history until the model stops
//! calling tools.

pub mod dispatch;
pub mod extraction;
pub mod session;

pub use dispatch::{ToolDispatcher, ToolHandler};
pub use extraction::{extract_tool_calls, strip_tool_call_markup, CALL_ID_PREFIX};
pub use session::{LoopConfig, ToolLoop, TOOL_ERROR_SENTINEL};
