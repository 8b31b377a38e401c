//! Completion backend seam
//!
//! The façade only needs a service that takes the conversation plus the
//! capability set and answers with a finite stream of text fragments and
//! tool-call requests. [`AzureOpenAiBackend`] is the production
//! implementation; tests script their own.

pub mod azure;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::capability::CapabilityDescriptor;
use crate::error::BackendError;

pub use azure::AzureOpenAiBackend;

/// One message of the chat-completions conversation, in wire form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Assistant turn that requested capabilities; empty text is dropped
    pub fn assistant_tool_calls(content: String, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: (!content.is_empty()).then_some(content),
            tool_calls,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}

/// A capability invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name plus its arguments as the raw JSON text the model produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Item of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Fragment of the answer text, in arrival order
    Text(String),
    /// Completed capability requests of this round
    ToolCalls(Vec<ToolCall>),
}

/// Lazy, finite, non-restartable sequence of completion events
pub type CompletionStream = BoxStream<'static, Result<StreamEvent, BackendError>>;

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Start one completion round over `messages` with `tools` available
    async fn stream(
        &self,
        messages: &[ChatMessage],
        tools: &[CapabilityDescriptor],
    ) -> Result<CompletionStream, BackendError>;
}
