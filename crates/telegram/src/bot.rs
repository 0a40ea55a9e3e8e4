use std::time::Duration;

use {
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    Error, Result,
    handlers::{self, BotContext},
};

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Build a bot whose HTTP timeout outlasts the long-poll timeout, so the
/// client never aborts a request Telegram is still holding open.
pub fn build_bot(token: &str, poll_timeout_secs: u32) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(poll_timeout_secs) + 15))
        .build()
        .map_err(|e| Error::external("failed to build telegram http client", e))?;
    Ok(Bot::with_client(token, client))
}

pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Show how to use the bot"),
        BotCommand::new("help", "Show how to use the bot"),
        BotCommand::new("add", "Monitor a Beneficiary ID, e.g. /add MT4420500385456"),
        BotCommand::new("status", "Show the monitored ID and its last status"),
    ]
}

/// Verify the token, register commands and spawn the polling loop.
///
/// The loop stops when `cancel` fires. If another instance is already
/// polling with the same token it cancels `cancel` itself, taking the rest
/// of the process down with it.
pub async fn start_polling(
    bot: Bot,
    ctx: BotContext,
    poll_timeout_secs: u32,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>> {
    let me = bot.get_me().await?;
    let username = me.username.clone();

    // Long polling does not work while a webhook is set.
    bot.delete_webhook().send().await?;

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        warn!(error = %e, "failed to register bot commands");
    }

    info!(username = ?username, "telegram bot connected (webhook cleared)");

    Ok(tokio::spawn(async move {
        poll_loop(bot, ctx, poll_timeout_secs, cancel).await;
    }))
}

async fn poll_loop(bot: Bot, ctx: BotContext, poll_timeout_secs: u32, cancel: CancellationToken) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = bot
                .get_updates()
                .offset(offset)
                .timeout(poll_timeout_secs)
                .allowed_updates(vec![AllowedUpdate::Message])
                .send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    match update.kind {
                        UpdateKind::Message(msg) => {
                            let chat_id = msg.chat.id.0;
                            debug!(chat_id, "received telegram message");
                            if let Err(e) = handlers::handle_message(msg, &bot, &ctx).await {
                                error!(chat_id, error = %e, "error handling telegram message");
                            }
                        },
                        other => {
                            debug!("ignoring non-message update: {other:?}");
                        },
                    }
                }
            },
            Err(e) if is_conflict(&e) => {
                error!("another instance is already polling with this token, shutting down");
                cancel.cancel();
                break;
            },
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }
    info!("telegram polling stopped");
}

fn is_conflict(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::TerminatedByOtherGetUpdates))
}
