//! LLM abstraction layer

mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Failures talking to the completion endpoint
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network failure, timeout or undecodable body
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status
    #[error("LLM request failed: API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response carried no completion text
    #[error("LLM request failed: response contained no choices")]
    EmptyResponse,
}

/// Trait for chat-completion backends
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a conversation and return the assistant's text
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// Get the model name
    fn model(&self) -> &str;
}
