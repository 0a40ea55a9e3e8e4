//! Registration surface: the bot's slash commands.

use std::sync::Arc;

use {
    teloxide::{payloads::SendMessageSetters, prelude::*, types::ParseMode},
    tracing::{debug, error, info},
    vendorwatch_common::{BeneficiaryId, ChatId as SubscriberChatId},
    vendorwatch_monitor::{MonitorHandle, message::escape_html},
    vendorwatch_store::SubscriberStore,
};

use crate::{Result, outbound::run_telegram_request_with_retry};

pub const WELCOME: &str = "Welcome to the MSEDCL Vendor Monitor Bot!\n\n\
To start monitoring, please use the command:\n\
/add <YOUR_BENEFICIARY_ID>\n\n\
Example: /add MT4420500385456";

pub const MISSING_ID: &str = "Please provide a Beneficiary ID. Example: /add MT4420500385456";

pub const INVALID_ID: &str =
    "Invalid Beneficiary ID format. It should start with 'MT' and be 15 characters long.";

pub const ALREADY_TAKEN: &str = "⚠️ This Beneficiary ID is already being monitored by another user.";

pub const NOT_REGISTERED: &str =
    "You are not monitoring any Beneficiary ID yet. Use /add MT4420500385456 to start.";

pub const STORE_FAILURE: &str =
    "Sorry, something went wrong while saving your request. Please try again later.";

pub const USAGE_HINT: &str =
    "I only understand commands. Send /add <YOUR_BENEFICIARY_ID> to start monitoring or /help for usage.";

/// Shared state for command handling.
#[derive(Clone)]
pub struct BotContext {
    pub store: Arc<dyn SubscriberStore>,
    pub monitor: MonitorHandle,
}

/// A reply to send back to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub html: bool,
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: false,
        }
    }

    fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Help,
    Add(Option<&'a str>),
    Status,
    Unknown(&'a str),
}

/// Split `/cmd[@bot] args` into a command. Returns `None` for non-command text.
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let body = text.trim().strip_prefix('/')?;
    let (head, rest) = match body.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (body, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    let arg = rest.split_whitespace().next();
    Some(match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "add" => Command::Add(arg),
        "status" => Command::Status,
        _ => Command::Unknown(name),
    })
}

/// Work out the reply for `text` from `chat_id`, applying any registration.
pub async fn respond(ctx: &BotContext, chat_id: SubscriberChatId, text: &str) -> Reply {
    match parse_command(text) {
        Some(Command::Start | Command::Help) => Reply::plain(WELCOME),
        Some(Command::Add(arg)) => add_beneficiary(ctx, chat_id, arg).await,
        Some(Command::Status) => status(ctx, chat_id).await,
        Some(Command::Unknown(name)) => {
            debug!(chat_id, command = name, "unknown command");
            Reply::plain(USAGE_HINT)
        },
        None => Reply::plain(USAGE_HINT),
    }
}

async fn add_beneficiary(ctx: &BotContext, chat_id: SubscriberChatId, arg: Option<&str>) -> Reply {
    let Some(raw) = arg else {
        return Reply::plain(MISSING_ID);
    };
    let id = match BeneficiaryId::parse(raw) {
        Ok(id) => id,
        Err(reason) => {
            debug!(chat_id, %reason, "rejected beneficiary id");
            return Reply::plain(INVALID_ID);
        },
    };

    match ctx.store.upsert(chat_id, &id).await {
        Ok(outcome) if outcome.is_accepted() => {
            info!(chat_id, beneficiary_id = %id, ?outcome, "registration accepted");
            if !ctx.monitor.check_soon(chat_id) {
                error!(chat_id, "monitor is not running, initial check skipped");
            }
            Reply::html(format!(
                "✅ Success! I will now monitor the Beneficiary ID: <code>{id}</code>\n\n\
                 I will notify you only when the vendor status changes. \
                 Performing an initial check now..."
            ))
        },
        Ok(_) => {
            info!(chat_id, beneficiary_id = %id, "beneficiary id already claimed");
            Reply::plain(ALREADY_TAKEN)
        },
        Err(e) => {
            error!(chat_id, error = %e, "failed to save registration");
            Reply::plain(STORE_FAILURE)
        },
    }
}

async fn status(ctx: &BotContext, chat_id: SubscriberChatId) -> Reply {
    match ctx.store.get(chat_id).await {
        Ok(Some(sub)) => Reply::html(format!(
            "📋 Monitoring <code>{}</code>\nLast known status: <b>{}</b>",
            sub.beneficiary_id,
            escape_html(&sub.last_known_status.to_string())
        )),
        Ok(None) => Reply::plain(NOT_REGISTERED),
        Err(e) => {
            error!(chat_id, error = %e, "failed to load subscriber");
            Reply::plain(STORE_FAILURE)
        },
    }
}

/// Handle one inbound message from the polling loop.
pub async fn handle_message(msg: Message, bot: &Bot, ctx: &BotContext) -> Result<()> {
    let Some(text) = msg.text() else {
        debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
        return Ok(());
    };
    let chat_id = msg.chat.id.0;
    let reply = respond(ctx, chat_id, text).await;

    run_telegram_request_with_retry(chat_id, "reply", || {
        let mut req = bot.send_message(msg.chat.id, reply.text.clone());
        if reply.html {
            req = req.parse_mode(ParseMode::Html);
        }
        async move { req.await }
    })
    .await?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::MockBotApi,
        rstest::rstest,
        serde_json::json,
        tokio::sync::mpsc,
        vendorwatch_common::{ResolvedStatus, Subscriber},
        vendorwatch_store::InMemoryStore,
    };

    fn context(store: Arc<InMemoryStore>) -> (BotContext, mpsc::UnboundedReceiver<i64>) {
        let (monitor, rx) = MonitorHandle::channel();
        (BotContext { store, monitor }, rx)
    }

    fn message(chat_id: i64, text: &str) -> Message {
        serde_json::from_value(json!({
            "message_id": 1,
            "date": 1,
            "chat": { "id": chat_id, "type": "private", "first_name": "Asha" },
            "from": {
                "id": chat_id,
                "is_bot": false,
                "first_name": "Asha"
            },
            "text": text
        }))
        .expect("deserialize text message")
    }

    #[rstest]
    #[case("/start", Some(Command::Start))]
    #[case("/help", Some(Command::Help))]
    #[case("/add MT4420500385456", Some(Command::Add(Some("MT4420500385456"))))]
    #[case("/add@vendorwatch_bot  mt4420500385456 extra", Some(Command::Add(Some("mt4420500385456"))))]
    #[case("/add", Some(Command::Add(None)))]
    #[case("/STATUS", Some(Command::Status))]
    #[case("/remove", Some(Command::Unknown("remove")))]
    #[case("hello", None)]
    fn parses_commands(#[case] text: &str, #[case] expected: Option<Command<'_>>) {
        assert_eq!(parse_command(text), expected);
    }

    #[tokio::test]
    async fn add_registers_and_schedules_check() {
        let store = Arc::new(InMemoryStore::new());
        let (ctx, mut rx) = context(store.clone());

        let reply = respond(&ctx, 42, "/add mt4420500385456").await;

        assert!(reply.html);
        assert!(reply.text.starts_with("✅ Success!"));
        assert!(reply.text.contains("<code>MT4420500385456</code>"));
        let sub = store.get(42).await.unwrap().unwrap();
        assert_eq!(sub.beneficiary_id.as_str(), "MT4420500385456");
        assert_eq!(rx.try_recv().unwrap(), 42);
    }

    #[rstest]
    #[case("/add MT123")]
    #[case("/add XY4420500385456")]
    #[tokio::test]
    async fn malformed_ids_are_rejected_before_storage(#[case] text: &str) {
        let store = Arc::new(InMemoryStore::new());
        let (ctx, mut rx) = context(store.clone());

        let reply = respond(&ctx, 42, text).await;

        assert_eq!(reply, Reply::plain(INVALID_ID));
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_argument_asks_for_id() {
        let (ctx, _rx) = context(Arc::new(InMemoryStore::new()));
        assert_eq!(respond(&ctx, 42, "/add").await, Reply::plain(MISSING_ID));
    }

    #[tokio::test]
    async fn id_claimed_by_another_chat_is_refused() {
        let id = BeneficiaryId::parse("MT4420500385456").unwrap();
        let store = Arc::new(InMemoryStore::with_subscribers([Subscriber::new(7, id)]));
        let (ctx, mut rx) = context(store.clone());

        let reply = respond(&ctx, 42, "/add MT4420500385456").await;

        assert_eq!(reply, Reply::plain(ALREADY_TAKEN));
        assert!(store.get(42).await.unwrap().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn status_shows_last_known_value() {
        let mut sub = Subscriber::new(42, BeneficiaryId::parse("MT4420500385456").unwrap());
        sub.last_known_status = ResolvedStatus::NotAvailable;
        let (ctx, _rx) = context(Arc::new(InMemoryStore::with_subscribers([sub])));

        let reply = respond(&ctx, 42, "/status").await;
        assert!(reply.html);
        assert!(reply.text.contains("<code>MT4420500385456</code>"));
        assert!(reply.text.contains("<b>Not Available</b>"));

        assert_eq!(respond(&ctx, 99, "/status").await, Reply::plain(NOT_REGISTERED));
    }

    #[tokio::test]
    async fn free_text_gets_usage_hint() {
        let (ctx, _rx) = context(Arc::new(InMemoryStore::new()));
        assert_eq!(respond(&ctx, 42, "is it available?").await, Reply::plain(USAGE_HINT));
    }

    #[tokio::test]
    async fn success_reply_is_sent_as_html() {
        let api = MockBotApi::spawn().await;
        let (ctx, _rx) = context(Arc::new(InMemoryStore::new()));

        handle_message(message(42, "/add MT4420500385456"), &api.bot(), &ctx)
            .await
            .unwrap();

        let sent = api.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["chat_id"], 42);
        assert_eq!(sent[0]["parse_mode"], "HTML");
        assert!(sent[0]["text"].as_str().unwrap().contains("I will now monitor"));
    }

    #[tokio::test]
    async fn welcome_is_sent_as_plain_text() {
        let api = MockBotApi::spawn().await;
        let (ctx, _rx) = context(Arc::new(InMemoryStore::new()));

        handle_message(message(42, "/start"), &api.bot(), &ctx)
            .await
            .unwrap();

        let sent = api.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["text"], WELCOME);
        assert!(sent[0].get("parse_mode").is_none_or(|v| v.is_null()));
    }
}
