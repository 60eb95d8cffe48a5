//! Stage profiles, the model-facing runtime, and the OpenAI-compatible client.

pub mod catalog;
pub mod openai;
pub mod profile;
pub mod runtime;

pub use catalog::{dispatch, dispatch_table};
pub use openai::OpenAiModel;
pub use profile::{AgentMember, AgentProfile};
pub use runtime::{
    AgentError, AgentFailure, AgentOutcome, AgentRunner, ChatMessage, ChatRole, Completion, LanguageModel,
    ModelError, ToolCall, ToolHandler, ToolInvocation, ToolSpec,
};
