//! One disposable Chrome process with a single page.

use std::{path::Path, time::Duration};

use {
    async_trait::async_trait,
    chromiumoxide::{
        Browser, BrowserConfig as CdpBrowserConfig, Page,
        cdp::browser_protocol::page::CaptureScreenshotFormat, handler::viewport::Viewport,
        page::ScreenshotParams,
    },
    futures::StreamExt,
    serde::de::DeserializeOwned,
    tempfile::TempDir,
    tokio::task::JoinHandle,
    tracing::{debug, warn},
};

use crate::{detect, error::BrowserError, types::BrowserConfig};

/// Page operations a probe drives.
#[async_trait]
pub trait ProbePage: Send + Sync {
    /// Navigate and wait for the load to finish within `budget`.
    async fn goto(&self, url: &str, budget: Duration) -> Result<(), BrowserError>;

    /// Evaluate `js` and return its JSON value, failing after `budget`.
    async fn eval_json(&self, js: &str, budget: Duration) -> Result<serde_json::Value, BrowserError>;

    /// Capture a full-page PNG into `path`.
    async fn screenshot_to(&self, path: &Path) -> Result<(), BrowserError>;

    /// Release the page and everything behind it.
    async fn close(self)
    where
        Self: Sized;
}

/// Evaluate `js` on `page` and deserialize its value.
pub async fn eval<T: DeserializeOwned>(
    page: &impl ProbePage,
    js: &str,
    budget: Duration,
) -> Result<T, BrowserError> {
    let value = page.eval_json(js, budget).await?;
    serde_json::from_value(value)
        .map_err(|e| BrowserError::JsEvalFailed(format!("unexpected script result: {e}")))
}

/// Poll `js` (a boolean expression) until it is true or `budget` runs out.
pub async fn wait_until(
    page: &impl ProbePage,
    js: &str,
    budget: Duration,
    interval: Duration,
) -> Result<bool, BrowserError> {
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        match eval::<bool>(page, js, remaining).await {
            Ok(true) => return Ok(true),
            Ok(false) | Err(BrowserError::Timeout(_)) => {},
            Err(e) => return Err(e),
        }
        tokio::time::sleep(interval.min(remaining)).await;
    }
}

/// Fresh Chrome profile directory, removed when dropped.
fn profile_dir() -> Result<TempDir, BrowserError> {
    tempfile::Builder::new()
        .prefix("vendorwatch-profile-")
        .tempdir()
        .map_err(|e| BrowserError::LaunchFailed(format!("failed to create profile dir: {e}")))
}

/// A probing session. Owned by exactly one probe; [`ProbePage::close`] must
/// be called on every exit path.
///
/// Each session runs Chrome on its own throwaway profile so concurrent
/// sessions share no cookies, storage or profile lock.
pub struct ProbeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    profile: TempDir,
}

impl ProbeSession {
    /// Launch Chrome and open a blank page.
    pub async fn launch(config: &BrowserConfig, request_timeout: Duration) -> Result<Self, BrowserError> {
        let executable = detect::detect_browser(config.chrome_path.as_deref()).ok_or_else(|| {
            BrowserError::LaunchFailed(format!(
                "Chrome/Chromium not found; {}",
                detect::install_hint()
            ))
        })?;

        let profile = profile_dir()?;
        let mut builder = CdpBrowserConfig::builder()
            .chrome_executable(&executable)
            .user_data_dir(profile.path())
            .viewport(Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .request_timeout(request_timeout);

        // chromiumoxide runs headless unless asked otherwise.
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(ref ua) = config.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }
        builder = builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox");

        let cdp_config = builder.build().map_err(|e| {
            BrowserError::LaunchFailed(format!("failed to build browser config: {e}"))
        })?;

        let (mut browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler.abort();
                return Err(BrowserError::LaunchFailed(format!("failed to open page: {e}")));
            },
        };

        debug!(
            executable = %executable.display(),
            profile = %profile.path().display(),
            headless = config.headless,
            "probe session launched"
        );

        Ok(Self {
            browser,
            page,
            handler,
            profile,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl ProbePage for ProbeSession {
    async fn goto(&self, url: &str, budget: Duration) -> Result<(), BrowserError> {
        match tokio::time::timeout(budget, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::NavigationFailed(format!("{url}: {e}"))),
            Err(_) => Err(BrowserError::Timeout(format!(
                "page load exceeded {}s",
                budget.as_secs()
            ))),
        }
    }

    async fn eval_json(&self, js: &str, budget: Duration) -> Result<serde_json::Value, BrowserError> {
        let result = tokio::time::timeout(budget, self.page.evaluate(js))
            .await
            .map_err(|_| {
                BrowserError::Timeout(format!("script did not finish within {}ms", budget.as_millis()))
            })?
            .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot_to(&self, path: &Path) -> Result<(), BrowserError> {
        let png = self
            .page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &png).await?;
        debug!(path = %path.display(), bytes = png.len(), "screenshot written");
        Ok(())
    }

    /// Close the browser, stop the event handler and delete the profile.
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "failed to close browser cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "failed to reap browser process");
        }
        self.handler.abort();
        if let Err(e) = self.profile.close() {
            debug!(error = %e, "failed to remove browser profile");
        }
    }
}
