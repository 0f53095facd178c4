//! Model-provider abstractions: chat messages, generation results, and the
//! `ChatModel` / `Embedder` capability traits implemented per provider.

pub mod factory;
pub mod provider;
pub mod providers;

use serde::{Deserialize, Serialize};

pub use factory::ProviderFactory;
pub use provider::{ChatModel, Embedder, ProviderSettings, ProviderTag};

/// A single turn in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

pub fn system_message(content: impl Into<String>) -> Message {
    Message {
        role: Role::System,
        content: content.into(),
    }
}

pub fn user_message(content: impl Into<String>) -> Message {
    Message {
        role: Role::User,
        content: content.into(),
    }
}

pub fn assistant_message(content: impl Into<String>) -> Message {
    Message {
        role: Role::Assistant,
        content: content.into(),
    }
}

/// Result of a single `ChatModel::generate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
    pub tokens_used: Option<u32>,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Result of a single `Embedder::embed` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_set_the_right_role() {
        assert_eq!(system_message("hi").role, Role::System);
        assert_eq!(user_message("hi").role, Role::User);
        assert_eq!(assistant_message("hi").role, Role::Assistant);
    }
}
