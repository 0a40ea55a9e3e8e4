use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] vendorwatch_store::Error),

    #[error("delivery failed: {source}")]
    Delivery {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unknown timezone: {timezone}")]
    UnknownTimezone { timezone: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn delivery(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Delivery {
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
