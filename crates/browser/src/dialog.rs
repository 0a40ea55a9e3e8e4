//! Transient-dialog evidence channel.
//!
//! The form reports an exhausted quota through a JavaScript `alert()`. A
//! listener task accepts every dialog and records whether one carried the
//! quota phrase in a [`QuotaSignal`] that outlives the dialog itself.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {
    chromiumoxide::{
        Page,
        cdp::browser_protocol::page::{EventJavascriptDialogOpening, HandleJavaScriptDialogParams},
    },
    futures::StreamExt,
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
};

use crate::error::BrowserError;

/// Shared flag set once quota-exceeded evidence has been seen in a dialog.
///
/// Single writer (the listener), any number of readers. Never reset within a probe.
#[derive(Debug, Clone, Default)]
pub struct QuotaSignal(Arc<AtomicBool>);

impl QuotaSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Record `message` in `signal` when it contains `phrase`. Returns whether it matched.
pub fn observe_dialog(message: &str, phrase: &str, signal: &QuotaSignal) -> bool {
    let matched = message.contains(phrase);
    if matched {
        signal.set();
    }
    matched
}

/// Subscribe to dialogs on `page` and spawn the task that records and accepts them.
///
/// The subscription is established before this returns, so no dialog raised by
/// a later interaction step can be missed. Abort the handle when the probe ends.
pub async fn spawn_listener(
    page: &Page,
    phrase: String,
    signal: QuotaSignal,
) -> Result<JoinHandle<()>, BrowserError> {
    let mut dialogs = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await?;
    let page = page.clone();

    Ok(tokio::spawn(async move {
        while let Some(event) = dialogs.next().await {
            if observe_dialog(&event.message, &phrase, &signal) {
                info!(message = %event.message, "quota-exceeded dialog seen");
            } else {
                debug!(message = %event.message, "unrelated dialog");
            }
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                warn!(error = %e, "failed to accept dialog");
            }
        }
    }))
}
