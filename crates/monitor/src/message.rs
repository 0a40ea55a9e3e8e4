//! Notification text and the "View Website" link.

use {
    chrono::{DateTime, Utc},
    chrono_tz::Tz,
    vendorwatch_common::{BeneficiaryId, ResolvedStatus},
};

use crate::{Error, Result, notify::LinkButton};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";
pub const LINK_LABEL: &str = "View Website";

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders status messages for one target form in one time zone.
#[derive(Debug, Clone)]
pub struct MessageComposer {
    form_url: String,
    tz: Tz,
}

impl MessageComposer {
    pub fn new(form_url: impl Into<String>, tz: Tz) -> Self {
        Self {
            form_url: form_url.into(),
            tz,
        }
    }

    pub fn from_config(target_url: &str, timezone: &str) -> Result<Self> {
        let tz = timezone.parse::<Tz>().map_err(|_| Error::UnknownTimezone {
            timezone: timezone.to_string(),
        })?;
        Ok(Self::new(target_url, tz))
    }

    pub fn format_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format(TIME_FORMAT).to_string()
    }

    /// The form URL with the beneficiary pre-filled.
    pub fn form_link(&self, id: &BeneficiaryId) -> String {
        match url::Url::parse(&self.form_url) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("beneficiaryId", id.as_str());
                url.to_string()
            },
            Err(_) => format!("{}&beneficiaryId={id}", self.form_url),
        }
    }

    pub fn link_button(&self, id: &BeneficiaryId) -> LinkButton {
        LinkButton::new(LINK_LABEL, self.form_link(id))
    }

    pub fn compose(&self, id: &BeneficiaryId, status: &ResolvedStatus, at: DateTime<Utc>) -> String {
        let when = self.format_time(at);
        match status {
            ResolvedStatus::Available => {
                format!("✅ Status for <code>{id}</code> at {when}: <b>VENDOR AVAILABLE!</b>")
            },
            ResolvedStatus::NotAvailable => {
                format!("❌ Status for <code>{id}</code> at {when}: Vendor Not Available.")
            },
            ResolvedStatus::Error(detail) => format!(
                "⚠️ Error checking <code>{id}</code> at {when}: {}",
                escape_html(detail)
            ),
            ResolvedStatus::Unknown => {
                format!("ℹ️ Status for <code>{id}</code> at {when}: Unknown.")
            },
        }
    }
}
