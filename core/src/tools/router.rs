use codicil_protocol::models::ResponseItem;

use crate::config::Config;
use crate::model_family::ModelFamily;
use crate::tools::ToolCall;
use crate::tools::spec::ToolSpec;
use crate::tools::spec::build_tool_specs;

/// Owns the tool specs offered to the model and recognizes tool calls in the
/// model's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRouter {
    specs: Vec<ToolSpec>,
}

impl ToolRouter {
    pub fn from_config(config: &Config, model_family: &ModelFamily) -> Self {
        Self {
            specs: build_tool_specs(config, model_family),
        }
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Function and custom tool calls become [`ToolCall`]s. Everything else,
    /// including local shell calls, is not dispatched.
    pub fn build_tool_call(item: &ResponseItem) -> Option<ToolCall> {
        match item {
            ResponseItem::FunctionCall {
                name,
                arguments,
                call_id,
                ..
            } => Some(ToolCall::Function {
                call_id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            }),
            ResponseItem::CustomToolCall {
                call_id,
                name,
                input,
                ..
            } => Some(ToolCall::Custom {
                call_id: call_id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            _ => None,
        }
    }
}
