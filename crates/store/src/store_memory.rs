//! In-memory store for tests and dry runs.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    vendorwatch_common::{BeneficiaryId, ChatId, ResolvedStatus, Subscriber},
};

use crate::{
    Error, Result,
    store::{SubscriberStore, Upsert},
};

/// In-memory store keyed by chat id. Same semantics as the SQLite store, no persistence.
#[derive(Default)]
pub struct InMemoryStore {
    subscribers: Mutex<BTreeMap<ChatId, Subscriber>>,
    status_writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with subscribers (status included), replacing any existing entry per chat.
    pub fn with_subscribers(subscribers: impl IntoIterator<Item = Subscriber>) -> Self {
        Self {
            subscribers: Mutex::new(subscribers.into_iter().map(|s| (s.chat_id, s)).collect()),
            status_writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful `set_status` calls so far.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SubscriberStore for InMemoryStore {
    async fn list_all(&self) -> Result<Vec<Subscriber>> {
        let subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        Ok(subs.values().cloned().collect())
    }

    async fn get(&self, chat_id: ChatId) -> Result<Option<Subscriber>> {
        let subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        Ok(subs.get(&chat_id).cloned())
    }

    async fn upsert(&self, chat_id: ChatId, beneficiary_id: &BeneficiaryId) -> Result<Upsert> {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        if subs
            .values()
            .any(|s| s.chat_id != chat_id && s.beneficiary_id == *beneficiary_id)
        {
            return Ok(Upsert::Conflict);
        }
        let outcome = match subs.get(&chat_id) {
            None => Upsert::Inserted,
            Some(existing) if existing.beneficiary_id == *beneficiary_id => {
                return Ok(Upsert::Unchanged);
            },
            Some(_) => Upsert::Updated,
        };
        subs.insert(chat_id, Subscriber::new(chat_id, beneficiary_id.clone()));
        Ok(outcome)
    }

    async fn set_status(
        &self,
        chat_id: ChatId,
        beneficiary_id: &BeneficiaryId,
        status: &ResolvedStatus,
    ) -> Result<()> {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let sub = subs.get_mut(&chat_id).ok_or(Error::not_found(chat_id))?;
        if sub.beneficiary_id != *beneficiary_id {
            return Err(Error::superseded(chat_id, beneficiary_id));
        }
        sub.last_known_status = status.clone();
        self.status_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
