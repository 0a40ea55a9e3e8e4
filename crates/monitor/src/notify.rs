//! Notification transport seam.

use std::path::Path;

use {async_trait::async_trait, vendorwatch_common::ChatId};

use crate::Result;

/// Inline button opening a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

impl LinkButton {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Delivers HTML-formatted messages to a chat. Both operations report failure;
/// neither may keep a reference to the photo after returning.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, html: &str, button: &LinkButton) -> Result<()>;

    /// Send `photo` with `html` as its caption.
    async fn send_photo(
        &self,
        chat_id: ChatId,
        html: &str,
        button: &LinkButton,
        photo: &Path,
    ) -> Result<()>;
}
