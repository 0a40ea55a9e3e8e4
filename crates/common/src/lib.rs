//! Shared domain types and error definitions used across all vendorwatch crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{BeneficiaryId, ChatId, InvalidBeneficiaryId, ResolvedStatus, Subscriber},
};
