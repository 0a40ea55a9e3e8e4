//! Persistence trait for subscribers.

use {
    async_trait::async_trait,
    vendorwatch_common::{BeneficiaryId, ChatId, ResolvedStatus, Subscriber},
};

use crate::Result;

/// Outcome of registering a beneficiary for a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// First registration for this chat.
    Inserted,
    /// The chat switched to a different beneficiary; its status was reset to `Unknown`.
    Updated,
    /// The chat already tracks this beneficiary; nothing changed.
    Unchanged,
    /// Another chat already tracks this beneficiary.
    Conflict,
}

impl Upsert {
    /// Whether the registration was accepted.
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Conflict)
    }
}

/// Persistence backend for subscribers.
///
/// A beneficiary belongs to at most one chat and a chat tracks at most one
/// beneficiary. Every write is atomic.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Subscriber>>;
    async fn get(&self, chat_id: ChatId) -> Result<Option<Subscriber>>;
    async fn upsert(&self, chat_id: ChatId, beneficiary_id: &BeneficiaryId) -> Result<Upsert>;
    /// Record `status` for the chat's registration of `beneficiary_id`.
    ///
    /// Fails with [`crate::Error::SubscriberNotFound`] when the chat is not
    /// registered and with [`crate::Error::Superseded`] when the chat has
    /// switched to another beneficiary since.
    async fn set_status(
        &self,
        chat_id: ChatId,
        beneficiary_id: &BeneficiaryId,
        status: &ResolvedStatus,
    ) -> Result<()>;
}
