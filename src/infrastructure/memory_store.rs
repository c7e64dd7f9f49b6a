//! Process-local conversation store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::domain::{
    AppError, Conversation, ConversationStore, ConversationSummary, Message, Result,
};

/// In-memory store guarded by a single mutex.
pub struct MemoryStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    max_messages: usize,
}

impl MemoryStore {
    /// Create an empty store keeping at most `max_messages` per conversation.
    #[must_use]
    pub fn new(max_messages: usize) -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            max_messages,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Conversation>>> {
        self.conversations.lock().map_err(|_| AppError::Database {
            message: "Conversation store lock poisoned".to_string(),
            source: None,
        })
    }
}

/// Drop the oldest messages beyond `max`.
pub(crate) fn retain_newest(messages: &mut Vec<Message>, max: usize) {
    if messages.len() > max {
        let excess = messages.len() - max;
        messages.drain(..excess);
    }
}

impl ConversationStore for MemoryStore {
    fn create(&self) -> Result<Conversation> {
        let conversation = Conversation::new(Uuid::new_v4().to_string());
        self.lock()?
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    fn get(&self, id: &str) -> Result<Conversation> {
        self.lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Conversation {id} not found")))
    }

    fn append(&self, id: &str, message: Message) -> Result<Message> {
        let mut conversations = self.lock()?;
        let conversation = conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id));
        conversation.messages.push(message.clone());
        retain_newest(&mut conversation.messages, self.max_messages);
        Ok(message)
    }

    fn list(&self) -> Result<Vec<ConversationSummary>> {
        let mut summaries: Vec<ConversationSummary> =
            self.lock()?.values().map(Conversation::summary).collect();
        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }

    fn import(&self, mut conversation: Conversation) -> Result<()> {
        retain_newest(&mut conversation.messages, self.max_messages);
        self.lock()?
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }
}
