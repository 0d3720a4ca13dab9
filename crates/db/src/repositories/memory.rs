use std::collections::HashMap;

use tokio::sync::RwLock;

use tertulia_core::dialog::DialogStack;

use super::{ConversationStateRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryConversationStateRepository {
    stacks: RwLock<HashMap<String, DialogStack>>,
}

impl InMemoryConversationStateRepository {
    pub async fn len(&self) -> usize {
        self.stacks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stacks.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ConversationStateRepository for InMemoryConversationStateRepository {
    async fn load(&self, conversation_id: &str) -> Result<Option<DialogStack>, RepositoryError> {
        let stacks = self.stacks.read().await;
        Ok(stacks.get(conversation_id).cloned())
    }

    async fn save(
        &self,
        conversation_id: &str,
        _channel_id: &str,
        stack: &DialogStack,
    ) -> Result<(), RepositoryError> {
        let mut stacks = self.stacks.write().await;
        stacks.insert(conversation_id.to_string(), stack.clone());
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        let mut stacks = self.stacks.write().await;
        stacks.remove(conversation_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tertulia_core::dialog::{DialogFrame, DialogStack};

    use super::InMemoryConversationStateRepository;
    use crate::repositories::ConversationStateRepository;

    #[tokio::test]
    async fn save_load_delete_by_conversation() {
        let repo = InMemoryConversationStateRepository::default();
        let mut stack = DialogStack::new();
        stack.push(DialogFrame::Vision);

        repo.save("conv-1", "emulator", &stack).await.expect("save");

        assert_eq!(repo.load("conv-1").await.expect("load"), Some(stack));
        assert_eq!(repo.load("conv-2").await.expect("load"), None);

        repo.delete("conv-1").await.expect("delete");
        assert!(repo.is_empty().await);
    }
}
