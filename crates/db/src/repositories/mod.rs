use async_trait::async_trait;
use thiserror::Error;

use tertulia_core::dialog::DialogStack;

pub mod conversation_state;
pub mod memory;

pub use conversation_state::SqlConversationStateRepository;
pub use memory::InMemoryConversationStateRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Conversation-scoped dialog state, keyed by channel conversation id.
#[async_trait]
pub trait ConversationStateRepository: Send + Sync {
    async fn load(&self, conversation_id: &str) -> Result<Option<DialogStack>, RepositoryError>;
    async fn save(
        &self,
        conversation_id: &str,
        channel_id: &str,
        stack: &DialogStack,
    ) -> Result<(), RepositoryError>;
    async fn delete(&self, conversation_id: &str) -> Result<(), RepositoryError>;
}
