//! Domain types shared by the prober, the store and the notification pipeline.

use std::{convert::Infallible, fmt, str::FromStr};

use {
    serde::{Deserialize, Deserializer, Serialize, Serializer},
    thiserror::Error,
};

/// Telegram chat id used as the delivery address of a subscriber.
pub type ChatId = i64;

/// Required prefix of every beneficiary identifier.
pub const BENEFICIARY_PREFIX: &str = "MT";

/// Exact length of a beneficiary identifier, prefix included.
pub const BENEFICIARY_ID_LEN: usize = 15;

/// Why a raw beneficiary identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidBeneficiaryId {
    #[error("beneficiary id is empty")]
    Empty,

    #[error("beneficiary id must start with 'MT'")]
    WrongPrefix,

    #[error("beneficiary id must be 15 characters long, got {actual}")]
    WrongLength { actual: usize },

    #[error("beneficiary id may only contain letters and digits")]
    InvalidCharacter,
}

/// A validated beneficiary identifier (e.g. `MT4420500385456`).
///
/// Input is trimmed and upper-cased before validation, so `" mt4420500385456 "`
/// parses to the same value as `"MT4420500385456"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BeneficiaryId(String);

impl BeneficiaryId {
    pub fn parse(raw: &str) -> Result<Self, InvalidBeneficiaryId> {
        let id = raw.trim().to_ascii_uppercase();
        if id.is_empty() {
            return Err(InvalidBeneficiaryId::Empty);
        }
        if !id.starts_with(BENEFICIARY_PREFIX) {
            return Err(InvalidBeneficiaryId::WrongPrefix);
        }
        let actual = id.chars().count();
        if actual != BENEFICIARY_ID_LEN {
            return Err(InvalidBeneficiaryId::WrongLength { actual });
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InvalidBeneficiaryId::InvalidCharacter);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BeneficiaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BeneficiaryId {
    type Err = InvalidBeneficiaryId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for BeneficiaryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for BeneficiaryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BeneficiaryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Canonical outcome of one probe for one beneficiary.
///
/// The textual form (`Display`/`FromStr`) is what gets persisted, so it must stay
/// stable: `Unknown`, `Available`, `Not Available`, `Error: <detail>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ResolvedStatus {
    /// No probe has completed yet.
    #[default]
    Unknown,
    Available,
    NotAvailable,
    Error(String),
}

const ERROR_PREFIX: &str = "Error: ";

impl ResolvedStatus {
    pub fn error(detail: impl Into<String>) -> Self {
        Self::Error(detail.into())
    }

    /// Short label without the error detail, handy for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Available => "available",
            Self::NotAvailable => "not_available",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for ResolvedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("Unknown"),
            Self::Available => f.write_str("Available"),
            Self::NotAvailable => f.write_str("Not Available"),
            Self::Error(detail) => write!(f, "{ERROR_PREFIX}{detail}"),
        }
    }
}

impl FromStr for ResolvedStatus {
    type Err = Infallible;

    /// Total parse: anything unrecognised is kept as an error detail so it compares
    /// unequal to every fresh probe result.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Unknown" => Self::Unknown,
            "Available" => Self::Available,
            "Not Available" => Self::NotAvailable,
            other => match other.strip_prefix(ERROR_PREFIX) {
                Some(detail) => Self::Error(detail.to_string()),
                None => Self::Error(other.to_string()),
            },
        })
    }
}

impl Serialize for ResolvedStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResolvedStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let Ok(status) = raw.parse::<Self>();
        Ok(status)
    }
}

/// One interested party: a chat that tracks exactly one beneficiary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub chat_id: ChatId,
    pub beneficiary_id: BeneficiaryId,
    #[serde(default)]
    pub last_known_status: ResolvedStatus,
}

impl Subscriber {
    pub fn new(chat_id: ChatId, beneficiary_id: BeneficiaryId) -> Self {
        Self {
            chat_id,
            beneficiary_id,
            last_known_status: ResolvedStatus::Unknown,
        }
    }
}
