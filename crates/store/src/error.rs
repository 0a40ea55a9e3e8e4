use {
    thiserror::Error,
    vendorwatch_common::{BeneficiaryId, ChatId},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("no subscriber for chat {chat_id}")]
    SubscriberNotFound { chat_id: ChatId },

    #[error("chat {chat_id} no longer tracks {beneficiary_id}")]
    Superseded {
        chat_id: ChatId,
        beneficiary_id: String,
    },

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(chat_id: ChatId) -> Self {
        Self::SubscriberNotFound { chat_id }
    }

    #[must_use]
    pub fn superseded(chat_id: ChatId, beneficiary_id: &BeneficiaryId) -> Self {
        Self::Superseded {
            chat_id,
            beneficiary_id: beneficiary_id.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl vendorwatch_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

vendorwatch_common::impl_context!();
