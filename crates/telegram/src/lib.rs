//! Telegram side of vendorwatch: the `/add` registration surface and the
//! notification transport, both on teloxide with manual long polling.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod outbound;

#[cfg(test)]
mod testing;

pub use {
    bot::{build_bot, start_polling},
    error::{Error, Result},
    handlers::BotContext,
    outbound::TelegramNotifier,
};
