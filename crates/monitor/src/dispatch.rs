//! Change dispatcher: persist a new status, then tell the subscriber once.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    tracing::{debug, error, info, warn},
    vendorwatch_browser::Artifact,
    vendorwatch_common::{ChatId, ResolvedStatus, Subscriber},
    vendorwatch_store::{Error as StoreError, SubscriberStore},
};

use crate::{
    message::MessageComposer,
    notify::{LinkButton, Notifier},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Status equals the last known one; nothing written, nothing sent.
    Unchanged,
    /// Status persisted and one message delivered.
    Notified { with_photo: bool },
    /// Status persisted but the message could not be delivered.
    DeliveryFailed,
    /// The chat switched beneficiary while this one was being probed; the
    /// result is dropped so the new registration keeps its own baseline.
    Superseded,
    /// Status could not be persisted, so nothing was sent.
    PersistFailed,
}

pub struct ChangeDispatcher {
    store: Arc<dyn SubscriberStore>,
    notifier: Arc<dyn Notifier>,
    composer: MessageComposer,
}

impl ChangeDispatcher {
    pub fn new(
        store: Arc<dyn SubscriberStore>,
        notifier: Arc<dyn Notifier>,
        composer: MessageComposer,
    ) -> Self {
        Self {
            store,
            notifier,
            composer,
        }
    }

    /// Compare `status` with what `subscriber` last heard and act on a difference.
    ///
    /// The artifact is consumed and deleted on every path.
    pub async fn dispatch(
        &self,
        subscriber: &Subscriber,
        status: ResolvedStatus,
        artifact: Option<Artifact>,
        at: DateTime<Utc>,
    ) -> DispatchOutcome {
        let chat_id = subscriber.chat_id;

        if status == subscriber.last_known_status {
            debug!(chat_id, status = status.label(), "status unchanged");
            discard(artifact).await;
            return DispatchOutcome::Unchanged;
        }

        match self
            .store
            .set_status(chat_id, &subscriber.beneficiary_id, &status)
            .await
        {
            Ok(()) => {},
            Err(StoreError::Superseded { .. }) => {
                info!(
                    chat_id,
                    beneficiary_id = %subscriber.beneficiary_id,
                    "chat re-registered during check, dropping stale result"
                );
                discard(artifact).await;
                return DispatchOutcome::Superseded;
            },
            Err(e) => {
                error!(chat_id, error = %e, "failed to persist status, skipping notification");
                discard(artifact).await;
                return DispatchOutcome::PersistFailed;
            },
        }
        info!(
            chat_id,
            beneficiary_id = %subscriber.beneficiary_id,
            from = subscriber.last_known_status.label(),
            to = status.label(),
            "status changed"
        );

        let id = &subscriber.beneficiary_id;
        let html = self.composer.compose(id, &status, at);
        let button = self.composer.link_button(id);

        // Only availability and errors carry a picture.
        let photo = match status {
            ResolvedStatus::Available | ResolvedStatus::Error(_) => artifact,
            _ => {
                discard(artifact).await;
                None
            },
        };

        let outcome = match photo {
            Some(artifact) => {
                let sent = self
                    .notifier
                    .send_photo(chat_id, &html, &button, artifact.path())
                    .await;
                artifact.discard().await;
                match sent {
                    Ok(()) => DispatchOutcome::Notified { with_photo: true },
                    Err(e) => {
                        warn!(chat_id, error = %e, "photo delivery failed, falling back to text");
                        self.send_text(chat_id, &html, &button).await
                    },
                }
            },
            None => self.send_text(chat_id, &html, &button).await,
        };

        if let DispatchOutcome::Notified { with_photo } = outcome {
            info!(chat_id, with_photo, "subscriber notified");
        }
        outcome
    }

    async fn send_text(&self, chat_id: ChatId, html: &str, button: &LinkButton) -> DispatchOutcome {
        match self.notifier.send_text(chat_id, html, button).await {
            Ok(()) => DispatchOutcome::Notified { with_photo: false },
            Err(e) => {
                warn!(chat_id, error = %e, "notification delivery failed");
                DispatchOutcome::DeliveryFailed
            },
        }
    }
}

async fn discard(artifact: Option<Artifact>) {
    if let Some(artifact) = artifact {
        artifact.discard().await;
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{RecordingNotifier, Sent, artifact_in, composer, id},
        vendorwatch_browser::ArtifactKind,
        vendorwatch_common::BeneficiaryId,
        vendorwatch_store::InMemoryStore,
    };

    struct Fixture {
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
        dispatcher: ChangeDispatcher,
    }

    async fn fixture(last_known: ResolvedStatus) -> (Fixture, Subscriber) {
        let mut sub = Subscriber::new(1, id());
        sub.last_known_status = last_known;
        let store = Arc::new(InMemoryStore::with_subscribers([sub.clone()]));
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = ChangeDispatcher::new(store.clone(), notifier.clone(), composer());
        (
            Fixture {
                store,
                notifier,
                dispatcher,
            },
            sub,
        )
    }

    #[tokio::test]
    async fn same_status_is_a_no_op() {
        let (f, sub) = fixture(ResolvedStatus::Available).await;
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path(), ArtifactKind::Availability);
        let path = artifact.path().to_path_buf();

        let outcome = f
            .dispatcher
            .dispatch(&sub, ResolvedStatus::Available, Some(artifact), Utc::now())
            .await;

        assert_eq!(outcome, DispatchOutcome::Unchanged);
        assert!(f.notifier.sent().is_empty());
        assert_eq!(f.store.status_writes(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn availability_goes_out_as_photo_and_is_persisted_first() {
        let (f, sub) = fixture(ResolvedStatus::NotAvailable).await;
        f.notifier.observe_store(f.store.clone(), 1);
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path(), ArtifactKind::Availability);
        let path = artifact.path().to_path_buf();

        let outcome = f
            .dispatcher
            .dispatch(&sub, ResolvedStatus::Available, Some(artifact), Utc::now())
            .await;

        assert_eq!(outcome, DispatchOutcome::Notified { with_photo: true });
        let sent = f.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::Photo { html, .. } if html.contains("VENDOR AVAILABLE!")));
        assert_eq!(sent[0].status_at_send(), Some(&ResolvedStatus::Available));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn not_available_is_text_only() {
        let (f, sub) = fixture(ResolvedStatus::Available).await;
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path(), ArtifactKind::Diagnostic);
        let path = artifact.path().to_path_buf();

        let outcome = f
            .dispatcher
            .dispatch(&sub, ResolvedStatus::NotAvailable, Some(artifact), Utc::now())
            .await;

        assert_eq!(outcome, DispatchOutcome::Notified { with_photo: false });
        assert!(matches!(&f.notifier.sent()[0], Sent::Text { html, .. } if html.contains("Vendor Not Available.")));
        assert!(!path.exists());
        assert_eq!(
            f.store.get(1).await.unwrap().unwrap().last_known_status,
            ResolvedStatus::NotAvailable
        );
    }

    #[tokio::test]
    async fn error_without_artifact_is_text() {
        let (f, sub) = fixture(ResolvedStatus::Unknown).await;
        let outcome = f
            .dispatcher
            .dispatch(&sub, ResolvedStatus::error("timeout: page load exceeded 60s"), None, Utc::now())
            .await;

        assert_eq!(outcome, DispatchOutcome::Notified { with_photo: false });
        match &f.notifier.sent()[0] {
            Sent::Text { html, button, .. } => {
                assert!(html.contains("page load exceeded 60s"));
                assert!(button.url.ends_with("beneficiaryId=MT4420500385456"));
            },
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn photo_failure_falls_back_to_text() {
        let (f, sub) = fixture(ResolvedStatus::NotAvailable).await;
        f.notifier.fail_photos();
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path(), ArtifactKind::Availability);
        let path = artifact.path().to_path_buf();

        let outcome = f
            .dispatcher
            .dispatch(&sub, ResolvedStatus::Available, Some(artifact), Utc::now())
            .await;

        assert_eq!(outcome, DispatchOutcome::Notified { with_photo: false });
        assert!(matches!(&f.notifier.sent()[0], Sent::Text { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn delivery_failure_keeps_new_status() {
        let (f, sub) = fixture(ResolvedStatus::NotAvailable).await;
        f.notifier.fail_all();

        let outcome = f
            .dispatcher
            .dispatch(&sub, ResolvedStatus::Available, None, Utc::now())
            .await;

        assert_eq!(outcome, DispatchOutcome::DeliveryFailed);
        assert_eq!(
            f.store.get(1).await.unwrap().unwrap().last_known_status,
            ResolvedStatus::Available
        );
    }

    #[tokio::test]
    async fn persist_failure_suppresses_notification() {
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = ChangeDispatcher::new(store, notifier.clone(), composer());
        // Chat 9 was never registered, so the write fails.
        let sub = Subscriber::new(9, id());

        let outcome = dispatcher
            .dispatch(&sub, ResolvedStatus::Available, None, Utc::now())
            .await;

        assert_eq!(outcome, DispatchOutcome::PersistFailed);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn result_for_replaced_beneficiary_is_dropped() {
        let (f, sub) = fixture(ResolvedStatus::Unknown).await;
        let newer = BeneficiaryId::parse("MT9999999999999").unwrap();
        f.store.upsert(1, &newer).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path(), ArtifactKind::Availability);
        let path = artifact.path().to_path_buf();

        let outcome = f
            .dispatcher
            .dispatch(&sub, ResolvedStatus::Available, Some(artifact), Utc::now())
            .await;

        assert_eq!(outcome, DispatchOutcome::Superseded);
        assert!(f.notifier.sent().is_empty());
        assert!(!path.exists());
        let stored = f.store.get(1).await.unwrap().unwrap();
        assert_eq!(stored.beneficiary_id, newer);
        assert_eq!(stored.last_known_status, ResolvedStatus::Unknown);
    }

    #[tokio::test]
    async fn differing_error_details_notify_again() {
        let (f, sub) = fixture(ResolvedStatus::error("timeout")).await;
        let same = f
            .dispatcher
            .dispatch(&sub, ResolvedStatus::error("timeout"), None, Utc::now())
            .await;
        assert_eq!(same, DispatchOutcome::Unchanged);

        let different = f
            .dispatcher
            .dispatch(&sub, ResolvedStatus::error("connection reset"), None, Utc::now())
            .await;
        assert_eq!(different, DispatchOutcome::Notified { with_photo: false });
    }
}
