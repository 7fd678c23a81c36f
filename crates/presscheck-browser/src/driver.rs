//! Browser process lifecycle.
//!
//! One [`BrowserDriver`] owns the Chromium process and the CDP message pump
//! for the whole run. Pages are created per check (or reused across
//! navigations, per the scenario's choice).

use crate::error::{DriverError, Result};
use crate::session::PageSession;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Launch options for the driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub headless: bool,
    /// Explicit Chromium binary; `None` lets chromiumoxide autodetect.
    pub executable: Option<PathBuf>,
    /// Initial window size, applied to every new page.
    pub window: (u32, u32),
    /// Per-CDP-request timeout.
    pub request_timeout: std::time::Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window: (1280, 800),
            request_timeout: std::time::Duration::from_secs(30),
        }
    }
}

/// Owns the browser process and its event pump.
pub struct BrowserDriver {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserDriver {
    /// Launches Chromium and spawns the CDP message pump.
    pub async fn launch(config: DriverConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(config.window.0, config.window.1)
            .request_timeout(config.request_timeout);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder
            .build()
            .map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        // The handler stream must be polled for the connection to make
        // progress; it ends when the browser closes.
        let handler_task = tokio::task::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!(error = %e, "cdp handler error");
                }
            }
            debug!("cdp handler stream ended");
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Opens a blank page and wraps it in a [`PageSession`].
    pub async fn new_session(&self) -> Result<PageSession> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::BrowserCrash(e.to_string()))?;
        Ok(PageSession::new(page))
    }

    /// Closes the browser and stops the event pump.
    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| DriverError::BrowserCrash(e.to_string()))?;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}
