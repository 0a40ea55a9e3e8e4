//! Change-notification pipeline: probe each subscriber's beneficiary, compare
//! with the last known status and notify only on a change.

pub mod dispatch;
pub mod error;
pub mod message;
pub mod notify;
pub mod probe;
pub mod service;

#[cfg(test)]
mod testing;

pub use {
    dispatch::{ChangeDispatcher, DispatchOutcome},
    error::{Error, Result},
    message::MessageComposer,
    notify::{LinkButton, Notifier},
    probe::Prober,
    service::{CycleSummary, MonitorHandle, MonitorService, MonitorSettings},
};
