//! Language-model completion service interface

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CompletionError;
use crate::tools::RawToolCall;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Prompt for one chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Earlier turns, oldest first, already trimmed
    pub history: Vec<ChatMessage>,
    pub user_prompt: String,
}

impl CompletionRequest {
    /// System prompt, history and user prompt as one message list
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(self.user_prompt.clone()));
        messages
    }
}

/// Result of the tool-selection call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolResponse {
    pub assistant_text: String,
    pub tool_calls: Vec<RawToolCall>,
}

/// Stream of text deltas from the first phase of a turn
pub type TextStream = BoxStream<'static, Result<String, CompletionError>>;

/// A chat completion backend
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Phase one: stream free-text commentary with no tools offered
    async fn stream_text(&self, request: &CompletionRequest) -> Result<TextStream, CompletionError>;

    /// Phase two: offer `tools` with the streamed text appended as the
    /// assistant's reply so far
    async fn select_tool(
        &self,
        request: &CompletionRequest,
        assistant_text: &str,
        tools: &Value,
    ) -> Result<ToolResponse, CompletionError>;

    /// Plain, non-streaming completion
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_order() {
        let request = CompletionRequest {
            system_prompt: "sys".into(),
            history: vec![ChatMessage::user("earlier"), ChatMessage::assistant("reply")],
            user_prompt: "now".into(),
        };

        let roles: Vec<Role> = request.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(
            serde_json::to_value(ChatMessage::assistant("x")).unwrap()["role"],
            "assistant"
        );
    }
}
