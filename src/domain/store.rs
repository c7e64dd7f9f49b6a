//! Conversation store contract.
//!
//! The store is the only shared mutable state in the pipeline. Implementations
//! hold their lock for the duration of a single call and never across
//! extraction or rendering.

use super::error::Result;
use super::models::{Conversation, ConversationSummary, Message};

/// Append-only conversation log.
pub trait ConversationStore: Send + Sync {
    /// Create an empty conversation with a fresh id.
    ///
    /// # Errors
    /// Returns error if the backend cannot persist the conversation.
    fn create(&self) -> Result<Conversation>;

    /// Snapshot of a conversation with its messages in append order.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown id.
    fn get(&self, id: &str) -> Result<Conversation>;

    /// Append a message, creating the conversation on first use.
    ///
    /// Older messages beyond the retention limit are dropped.
    ///
    /// # Errors
    /// Returns error if the backend cannot persist the message.
    fn append(&self, id: &str, message: Message) -> Result<Message>;

    /// Summaries of all conversations, newest first.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    fn list(&self) -> Result<Vec<ConversationSummary>>;

    /// Insert or replace a whole conversation.
    ///
    /// # Errors
    /// Returns error if the backend cannot persist the conversation.
    fn import(&self, conversation: Conversation) -> Result<()>;
}
