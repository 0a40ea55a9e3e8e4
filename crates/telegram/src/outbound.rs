use std::{future::Future, path::Path, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{
        RequestError,
        payloads::{SendMessageSetters, SendPhotoSetters},
        prelude::*,
        types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode},
    },
    tracing::{debug, warn},
    vendorwatch_monitor::{Error as DeliveryError, LinkButton, Notifier},
};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Delivers status notifications through the Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// One-row keyboard holding the "View Website" button. `None` when the URL
/// is not something Telegram will accept.
pub(crate) fn link_keyboard(button: &LinkButton) -> Option<InlineKeyboardMarkup> {
    match url::Url::parse(&button.url) {
        Ok(url) => Some(InlineKeyboardMarkup::new([[InlineKeyboardButton::url(
            button.label.clone(),
            url,
        )]])),
        Err(e) => {
            warn!(url = %button.url, error = %e, "link button dropped, invalid url");
            None
        },
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(
        &self,
        chat_id: i64,
        html: &str,
        button: &LinkButton,
    ) -> vendorwatch_monitor::Result<()> {
        let keyboard = link_keyboard(button);
        run_telegram_request_with_retry(chat_id, "send message", || {
            let mut req = self
                .bot
                .send_message(ChatId(chat_id), html)
                .parse_mode(ParseMode::Html);
            if let Some(kb) = keyboard.clone() {
                req = req.reply_markup(kb);
            }
            async move { req.await }
        })
        .await
        .map_err(DeliveryError::delivery)?;
        debug!(chat_id, "telegram text sent");
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        html: &str,
        button: &LinkButton,
        photo: &Path,
    ) -> vendorwatch_monitor::Result<()> {
        let keyboard = link_keyboard(button);
        run_telegram_request_with_retry(chat_id, "send photo", || {
            let mut req = self
                .bot
                .send_photo(ChatId(chat_id), InputFile::file(photo))
                .caption(html)
                .parse_mode(ParseMode::Html);
            if let Some(kb) = keyboard.clone() {
                req = req.reply_markup(kb);
            }
            async move { req.await }
        })
        .await
        .map_err(DeliveryError::delivery)?;
        debug!(chat_id, photo = %photo.display(), "telegram photo sent");
        Ok(())
    }
}

/// Run `request`, honouring Telegram's `retry_after` a bounded number of times.
pub(crate) async fn run_telegram_request_with_retry<T, F, Fut>(
    chat_id: i64,
    operation: &'static str,
    mut request: F,
) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut retries = 0usize;

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };

                if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                    warn!(
                        chat_id,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit persisted after retries"
                    );
                    return Err(err);
                }

                retries += 1;
                warn!(
                    chat_id,
                    operation,
                    retries,
                    max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}
