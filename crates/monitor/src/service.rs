//! The monitor driver: periodic cycles over all subscribers plus one-shot
//! checks requested at registration.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use {
    chrono::Utc,
    futures::StreamExt,
    tokio::{
        sync::{Mutex, Semaphore, mpsc},
        task::JoinHandle,
        time::Instant,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
    vendorwatch_common::ChatId,
    vendorwatch_config::MonitorConfig,
    vendorwatch_store::SubscriberStore,
};

use crate::{
    dispatch::{ChangeDispatcher, DispatchOutcome},
    probe::Prober,
};

/// Scheduling knobs.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub initial_delay: Duration,
    pub registration_delay: Duration,
    pub max_concurrent_probes: usize,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(cfg: &MonitorConfig) -> Self {
        Self {
            interval: Duration::from_secs(cfg.interval_secs.max(1)),
            initial_delay: Duration::from_secs(cfg.initial_delay_secs),
            registration_delay: Duration::from_secs(cfg.registration_check_delay_secs),
            max_concurrent_probes: cfg.max_concurrent_probes.max(1),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        (&MonitorConfig::default()).into()
    }
}

/// Cloneable handle for requesting an out-of-band check of one chat.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: mpsc::UnboundedSender<ChatId>,
}

impl MonitorHandle {
    /// A handle plus the receiver to pass to [`MonitorService::start`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Ask for `chat_id` to be probed shortly. Returns `false` if the service is gone.
    pub fn check_soon(&self, chat_id: ChatId) -> bool {
        self.tx.send(chat_id).is_ok()
    }
}

/// Totals for one full cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub checked: usize,
    pub notified: usize,
    pub failed: usize,
}

pub struct MonitorService {
    store: Arc<dyn SubscriberStore>,
    prober: Arc<dyn Prober>,
    dispatcher: ChangeDispatcher,
    settings: MonitorSettings,
    probe_permits: Semaphore,
    chat_locks: StdMutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl MonitorService {
    pub fn new(
        store: Arc<dyn SubscriberStore>,
        prober: Arc<dyn Prober>,
        dispatcher: ChangeDispatcher,
        settings: MonitorSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            prober,
            dispatcher,
            probe_permits: Semaphore::new(settings.max_concurrent_probes.max(1)),
            settings,
            chat_locks: StdMutex::new(HashMap::new()),
        })
    }

    /// Spawn the driver loop. It runs until `cancel` fires; probes already in
    /// flight are left to finish on their own.
    pub fn start(
        self: &Arc<Self>,
        triggers: mpsc::UnboundedReceiver<ChatId>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let svc = Arc::clone(self);
        tokio::spawn(async move {
            svc.driver_loop(triggers, cancel).await;
        })
    }

    async fn driver_loop(
        self: Arc<Self>,
        mut triggers: mpsc::UnboundedReceiver<ChatId>,
        cancel: CancellationToken,
    ) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            initial_delay_secs = self.settings.initial_delay.as_secs(),
            max_concurrent_probes = self.settings.max_concurrent_probes,
            "monitor started"
        );
        let mut next_cycle = Instant::now() + self.settings.initial_delay;
        let mut cycle: Option<JoinHandle<()>> = None;
        let mut triggers_open = true;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep_until(next_cycle) => {
                    next_cycle = Instant::now() + self.settings.interval;
                    if cycle.as_ref().is_some_and(|h| !h.is_finished()) {
                        warn!("previous cycle still running, skipping this one");
                        continue;
                    }
                    let svc = Arc::clone(&self);
                    cycle = Some(tokio::spawn(async move {
                        svc.run_cycle().await;
                    }));
                },
                trigger = triggers.recv(), if triggers_open => match trigger {
                    Some(chat_id) => {
                        let svc = Arc::clone(&self);
                        let delay = self.settings.registration_delay;
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            debug!(chat_id, "one-shot check");
                            svc.check_chat(chat_id).await;
                        });
                    },
                    None => triggers_open = false,
                },
            }
        }
        info!("monitor stopped");
    }

    /// Probe every subscriber once.
    pub async fn run_cycle(&self) -> CycleSummary {
        let subscribers = match self.store.list_all().await {
            Ok(subs) => subs,
            Err(e) => {
                error!(error = %e, "failed to list subscribers");
                return CycleSummary::default();
            },
        };
        info!(count = subscribers.len(), "check cycle started");

        let summary = StdMutex::new(CycleSummary::default());
        futures::stream::iter(subscribers)
            .for_each_concurrent(self.settings.max_concurrent_probes, |sub| {
                let summary = &summary;
                async move {
                    let outcome = self.check_chat(sub.chat_id).await;
                    let mut s = summary.lock().unwrap_or_else(|e| e.into_inner());
                    s.checked += 1;
                    match outcome {
                        Some(DispatchOutcome::Notified { .. }) => s.notified += 1,
                        Some(DispatchOutcome::DeliveryFailed | DispatchOutcome::PersistFailed) => {
                            s.failed += 1;
                        },
                        Some(DispatchOutcome::Unchanged | DispatchOutcome::Superseded) | None => {},
                    }
                }
            })
            .await;

        let summary = summary.into_inner().unwrap_or_else(|e| e.into_inner());
        info!(
            checked = summary.checked,
            notified = summary.notified,
            failed = summary.failed,
            "check cycle finished"
        );
        summary
    }

    /// Probe one chat's beneficiary and dispatch the result.
    ///
    /// Serialized per chat; the subscriber is re-read under the lock so two
    /// overlapping checks never announce the same transition twice. Returns
    /// `None` when the chat is not (or no longer) registered.
    pub async fn check_chat(&self, chat_id: ChatId) -> Option<DispatchOutcome> {
        let lock = self.chat_lock(chat_id);
        let _guard = lock.lock().await;

        let subscriber = match self.store.get(chat_id).await {
            Ok(Some(sub)) => sub,
            Ok(None) => {
                debug!(chat_id, "chat no longer registered");
                return None;
            },
            Err(e) => {
                error!(chat_id, error = %e, "failed to load subscriber");
                return None;
            },
        };

        let report = {
            let _permit = self.probe_permits.acquire().await.ok()?;
            self.prober.probe(&subscriber.beneficiary_id).await
        };
        debug!(
            chat_id,
            status = report.status.label(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "probe complete"
        );

        Some(
            self.dispatcher
                .dispatch(&subscriber, report.status, report.artifact, Utc::now())
                .await,
        )
    }

    fn chat_lock(&self, chat_id: ChatId) -> Arc<Mutex<()>> {
        let mut locks = self.chat_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(chat_id).or_default())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{RecordingNotifier, ScriptedProber, Sent, Step, composer, id},
        vendorwatch_common::{BeneficiaryId, ResolvedStatus},
        vendorwatch_store::InMemoryStore,
    };

    struct Harness {
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
        prober: Arc<ScriptedProber>,
        service: Arc<MonitorService>,
        _dir: tempfile::TempDir,
    }

    fn harness(steps: Vec<Step>, settings: MonitorSettings) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let prober = Arc::new(ScriptedProber::new(dir.path(), steps));
        let dispatcher = ChangeDispatcher::new(store.clone(), notifier.clone(), composer());
        let service = MonitorService::new(store.clone(), prober.clone(), dispatcher, settings);
        Harness {
            store,
            notifier,
            prober,
            service,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn availability_scenario() {
        let h = harness(
            vec![
                Step::available(),
                Step::available(),
                Step::not_available(),
            ],
            MonitorSettings::default(),
        );
        h.store.upsert(1, &id()).await.unwrap();
        h.notifier.observe_store(h.store.clone(), 1);

        // Unknown -> Available: one photo, artifact gone afterwards.
        let first = h.service.run_cycle().await;
        assert_eq!(first.notified, 1);
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Sent::Photo {
                html,
                photo_existed,
                status_at_send,
                ..
            } => {
                assert!(html.contains("VENDOR AVAILABLE!"));
                assert!(photo_existed);
                assert_eq!(status_at_send.as_ref(), Some(&ResolvedStatus::Available));
            },
            other => panic!("expected photo, got {other:?}"),
        }
        assert!(h.prober.artifacts().iter().all(|p| !p.exists()));

        // Same evidence again: silent, artifact still cleaned up.
        let second = h.service.run_cycle().await;
        assert_eq!(second.notified, 0);
        assert_eq!(h.notifier.sent().len(), 1);
        assert!(h.prober.artifacts().iter().all(|p| !p.exists()));

        // Quota evidence: one text.
        h.service.run_cycle().await;
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[1], Sent::Text { html, .. } if html.contains("Vendor Not Available.")));
        assert_eq!(
            h.store.get(1).await.unwrap().unwrap().last_known_status,
            ResolvedStatus::NotAvailable
        );
    }

    #[tokio::test]
    async fn navigation_error_is_persisted_and_cycle_continues() {
        let h = harness(
            vec![Step::error("navigation failed: net::ERR_NAME_NOT_RESOLVED")],
            MonitorSettings::default(),
        );
        h.store.upsert(1, &id()).await.unwrap();
        h.store
            .upsert(2, &BeneficiaryId::parse("MT4420500385457").unwrap())
            .await
            .unwrap();

        let summary = h.service.run_cycle().await;
        assert_eq!(summary.checked, 2);
        assert_eq!(h.prober.calls(), 2);

        let first = h.store.get(1).await.unwrap().unwrap();
        assert_eq!(
            first.last_known_status,
            ResolvedStatus::error("navigation failed: net::ERR_NAME_NOT_RESOLVED")
        );
        let sent = h.notifier.sent();
        let error_msg = sent.iter().find(|s| s.chat_id() == 1).unwrap();
        assert!(matches!(error_msg, Sent::Photo { html, .. } if html.contains("ERR_NAME_NOT_RESOLVED")));
    }

    #[tokio::test]
    async fn unregistered_chat_is_skipped() {
        let h = harness(vec![], MonitorSettings::default());
        assert_eq!(h.service.check_chat(404).await, None);
        assert_eq!(h.prober.calls(), 0);
    }

    #[tokio::test]
    async fn overlapping_checks_notify_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let prober = Arc::new(
            ScriptedProber::new(dir.path(), vec![Step::available(), Step::available()])
                .with_delay(Duration::from_millis(50)),
        );
        let dispatcher = ChangeDispatcher::new(store.clone(), notifier.clone(), composer());
        let settings = MonitorSettings {
            max_concurrent_probes: 2,
            ..MonitorSettings::default()
        };
        let service = MonitorService::new(store.clone(), prober, dispatcher, settings);
        store.upsert(1, &id()).await.unwrap();

        let (a, b) = tokio::join!(service.check_chat(1), service.check_chat(1));
        let outcomes = [a.unwrap(), b.unwrap()];
        assert!(outcomes.contains(&DispatchOutcome::Notified { with_photo: true }));
        assert!(outcomes.contains(&DispatchOutcome::Unchanged));
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn reregistration_during_check_keeps_new_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let prober = Arc::new(
            ScriptedProber::new(dir.path(), vec![Step::available(), Step::available()])
                .with_delay(Duration::from_millis(100)),
        );
        let dispatcher = ChangeDispatcher::new(store.clone(), notifier.clone(), composer());
        let service =
            MonitorService::new(store.clone(), prober, dispatcher, MonitorSettings::default());
        store.upsert(1, &id()).await.unwrap();

        let in_flight = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.check_chat(1).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let newer = BeneficiaryId::parse("MT9999999999999").unwrap();
        store.upsert(1, &newer).await.unwrap();

        assert_eq!(in_flight.await.unwrap(), Some(DispatchOutcome::Superseded));
        let sub = store.get(1).await.unwrap().unwrap();
        assert_eq!(sub.beneficiary_id, newer);
        assert_eq!(sub.last_known_status, ResolvedStatus::Unknown);
        assert!(notifier.sent().is_empty());

        // The one-shot check for the new registration still announces it.
        assert_eq!(
            service.check_chat(1).await,
            Some(DispatchOutcome::Notified { with_photo: true })
        );
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(
            store.get(1).await.unwrap().unwrap().last_known_status,
            ResolvedStatus::Available
        );
    }

    #[tokio::test]
    async fn registration_trigger_runs_one_shot_check() {
        let settings = MonitorSettings {
            interval: Duration::from_secs(3600),
            initial_delay: Duration::from_secs(3600),
            registration_delay: Duration::from_millis(10),
            max_concurrent_probes: 1,
        };
        let h = harness(vec![Step::not_available()], settings);
        h.store.upsert(7, &id()).await.unwrap();

        let (handle, rx) = MonitorHandle::channel();
        let cancel = CancellationToken::new();
        let driver = h.service.start(rx, cancel.clone());

        assert!(handle.check_soon(7));
        let delivered = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if !h.notifier.sent().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(delivered.is_ok(), "one-shot check never notified");
        assert_eq!(h.notifier.sent()[0].chat_id(), 7);

        cancel.cancel();
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn first_cycle_runs_after_initial_delay() {
        let settings = MonitorSettings {
            interval: Duration::from_secs(3600),
            initial_delay: Duration::from_millis(10),
            registration_delay: Duration::from_secs(1),
            max_concurrent_probes: 1,
        };
        let h = harness(vec![Step::available()], settings);
        h.store.upsert(3, &id()).await.unwrap();

        let (_handle, rx) = MonitorHandle::channel();
        let cancel = CancellationToken::new();
        let driver = h.service.start(rx, cancel.clone());

        let ran = tokio::time::timeout(Duration::from_secs(5), async {
            while h.notifier.sent().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(ran.is_ok());
        assert_eq!(h.prober.calls(), 1);

        cancel.cancel();
        driver.await.unwrap();
    }
}
