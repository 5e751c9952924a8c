//! Local tool dispatch — routes extracted calls to their implementations.
//!
//! The table is caller-supplied: register a handler per function name. A
//! failing handler, undecodable arguments, or an unknown name all resolve to
//! `None` at the call site so one bad tool call can never unwind the
//! conversation loop.

use std::collections::HashMap;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};

use lmloop_providers::ToolCall;

/// A synchronous tool implementation: JSON arguments in, JSON result out.
pub type ToolHandler = Box<dyn Fn(Value) -> Result<Value> + Send + Sync>;

pub struct ToolDispatcher {
    handlers: HashMap<String, ToolHandler>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    /// Execute a call by name. Returns the handler's result, or `None` for
    /// unknown names, bad arguments, or handler failure.
    pub fn dispatch(&self, call: &ToolCall) -> Option<Value> {
        debug!("Dispatching tool: {}", call.function.name);

        let handler = match self.handlers.get(&call.function.name) {
            Some(handler) => handler,
            None => {
                warn!("Unknown tool: {}", call.function.name);
                return None;
            }
        };

        let arguments: Value = match serde_json::from_str(&call.function.arguments) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "Undecodable arguments for tool {}: {}",
                    call.function.name, err
                );
                return None;
            }
        };

        match handler(arguments) {
            Ok(result) => Some(result),
            Err(err) => {
                warn!("Tool {} failed: {:#}", call.function.name, err);
                None
            }
        }
    }
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
