//! Test doubles shared by the dispatcher and service tests.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    vendorwatch_browser::{Artifact, ArtifactKind, ProbeReport},
    vendorwatch_common::{BeneficiaryId, ChatId, ResolvedStatus},
    vendorwatch_config::schema::DEFAULT_TARGET_URL,
    vendorwatch_store::{InMemoryStore, SubscriberStore},
};

use crate::{
    Error, Result,
    message::MessageComposer,
    notify::{LinkButton, Notifier},
    probe::Prober,
};

pub fn id() -> BeneficiaryId {
    BeneficiaryId::parse("MT4420500385456").unwrap()
}

pub fn composer() -> MessageComposer {
    MessageComposer::from_config(DEFAULT_TARGET_URL, "Asia/Kolkata").unwrap()
}

/// Write a fake PNG into `dir` and wrap it.
pub fn artifact_in(dir: &Path, kind: ArtifactKind) -> Artifact {
    let path = dir.join(kind.file_name(&id()));
    std::fs::write(&path, b"\x89PNG").unwrap();
    Artifact::new(path, kind)
}

#[derive(Debug, Clone)]
pub enum Sent {
    Text {
        chat_id: ChatId,
        html: String,
        button: LinkButton,
        status_at_send: Option<ResolvedStatus>,
    },
    Photo {
        chat_id: ChatId,
        html: String,
        button: LinkButton,
        photo_existed: bool,
        status_at_send: Option<ResolvedStatus>,
    },
}

impl Sent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Text { chat_id, .. } | Self::Photo { chat_id, .. } => *chat_id,
        }
    }

    /// The subscriber's stored status at the moment the send began, when observed.
    pub fn status_at_send(&self) -> Option<&ResolvedStatus> {
        match self {
            Self::Text { status_at_send, .. } | Self::Photo { status_at_send, .. } => {
                status_at_send.as_ref()
            },
        }
    }
}

/// Records every send; can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    fail_photos: AtomicBool,
    fail_all: AtomicBool,
    observed: Mutex<Option<(Arc<InMemoryStore>, ChatId)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_photos(&self) {
        self.fail_photos.store(true, Ordering::SeqCst);
    }

    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    /// Snapshot `chat_id`'s stored status whenever a send starts.
    pub fn observe_store(&self, store: Arc<InMemoryStore>, chat_id: ChatId) {
        *self.observed.lock().unwrap() = Some((store, chat_id));
    }

    async fn stored_status(&self) -> Option<ResolvedStatus> {
        let observed = self.observed.lock().unwrap().clone();
        let (store, chat_id) = observed?;
        store
            .get(chat_id)
            .await
            .unwrap()
            .map(|s| s.last_known_status)
    }
}

fn refused() -> Error {
    Error::delivery(std::io::Error::other("refused by test"))
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, chat_id: ChatId, html: &str, button: &LinkButton) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(refused());
        }
        let status_at_send = self.stored_status().await;
        self.sent.lock().unwrap().push(Sent::Text {
            chat_id,
            html: html.to_string(),
            button: button.clone(),
            status_at_send,
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        html: &str,
        button: &LinkButton,
        photo: &Path,
    ) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) || self.fail_photos.load(Ordering::SeqCst) {
            return Err(refused());
        }
        let status_at_send = self.stored_status().await;
        self.sent.lock().unwrap().push(Sent::Photo {
            chat_id,
            html: html.to_string(),
            button: button.clone(),
            photo_existed: photo.exists(),
            status_at_send,
        });
        Ok(())
    }
}

/// One scripted probe result.
#[derive(Debug, Clone)]
pub struct Step {
    pub status: ResolvedStatus,
    pub artifact: Option<ArtifactKind>,
}

impl Step {
    pub fn available() -> Self {
        Self {
            status: ResolvedStatus::Available,
            artifact: Some(ArtifactKind::Availability),
        }
    }

    pub fn not_available() -> Self {
        Self {
            status: ResolvedStatus::NotAvailable,
            artifact: None,
        }
    }

    pub fn error(detail: &str) -> Self {
        Self {
            status: ResolvedStatus::error(detail),
            artifact: Some(ArtifactKind::Diagnostic),
        }
    }
}

/// Replays [`Step`]s in order; repeats `NotAvailable` once exhausted.
pub struct ScriptedProber {
    steps: Mutex<VecDeque<Step>>,
    dir: PathBuf,
    calls: AtomicUsize,
    delay: Duration,
    artifacts: Mutex<Vec<PathBuf>>,
}

impl ScriptedProber {
    pub fn new(dir: &Path, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            dir: dir.to_path_buf(),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            artifacts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Paths of every artifact produced so far.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.artifacts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, id: &BeneficiaryId) -> ProbeReport {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Step::not_available);
        let artifact = step.artifact.map(|kind| {
            let path = self.dir.join(format!("{n}_{}", kind.file_name(id)));
            std::fs::write(&path, b"\x89PNG").unwrap();
            self.artifacts.lock().unwrap().push(path.clone());
            Artifact::new(path, kind)
        });
        ProbeReport {
            status: step.status,
            artifact,
            elapsed: self.delay,
        }
    }
}
