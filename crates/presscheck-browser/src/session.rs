//! One browser tab, wrapped with safe navigation and interaction helpers.
//!
//! All helpers route through the core retry helper with the appropriate
//! preset, and the session itself is the recovery surface: between retry
//! attempts it can wait for content-loaded or network-idle signals on the
//! live page.

use crate::error::{DriverError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::{
    MediaFeature, SetDeviceMetricsOverrideParams, SetEmulatedMediaParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use presscheck_core::{
    retry_operation, Classified, ErrorClass, Recovery, RetryConfig, RetryError, Viewport,
};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Default cap for a single stability signal.
const STABILITY_SIGNAL_CAP: Duration = Duration::from_secs(10);

/// A browser tab with retry-aware helpers.
pub struct PageSession {
    page: Page,
    alive: AtomicBool,
}

impl PageSession {
    #[must_use]
    pub fn new(page: Page) -> Self {
        Self {
            page,
            alive: AtomicBool::new(true),
        }
    }

    /// Raw page handle, for capture attachment.
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Whether the execution context is believed to be usable.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    fn note_failure(&self, err: &DriverError) {
        if err.class() == ErrorClass::BrowserCrash {
            self.alive.store(false, Ordering::Relaxed);
        }
    }

    async fn goto_once(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(|e| {
            let err = DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            };
            self.note_failure(&err);
            err
        })?;
        Ok(())
    }

    /// Navigates with the navigation retry preset.
    pub async fn navigate(&self, url: &str) -> std::result::Result<(), RetryError<DriverError>> {
        retry_operation("navigate", &RetryConfig::navigation(), self, || {
            self.goto_once(url)
        })
        .await
    }

    /// Best-effort wait for the page to settle. Never errors.
    ///
    /// Tries each signal in turn and returns true on the first success:
    /// the load event, then document.readyState, then resource-count
    /// quiescence. Callers decide whether an unstable page gates.
    pub async fn wait_for_stable(&self, timeout: Duration) -> bool {
        let cap = timeout.min(STABILITY_SIGNAL_CAP);

        if tokio::time::timeout(cap, self.page.wait_for_navigation())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
        {
            return true;
        }
        debug!("load event not observed, falling back to readyState");

        if self.poll_ready_state(cap, "complete").await {
            return true;
        }
        debug!("readyState never reached complete, falling back to quiescence");

        if self.wait_resources_quiet(cap).await {
            return true;
        }
        warn!("page did not settle within {:?}", timeout);
        false
    }

    async fn poll_ready_state(&self, cap: Duration, wanted: &str) -> bool {
        let deadline = tokio::time::Instant::now() + cap;
        loop {
            let state: std::result::Result<String, _> =
                self.evaluate_raw("document.readyState").await;
            match state {
                Ok(s) if s == wanted || (wanted == "interactive" && s == "complete") => {
                    return true;
                }
                Ok(_) => {}
                Err(_) => return false,
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Considers the network idle once the resource-entry count stops
    /// growing across two consecutive polls.
    async fn wait_resources_quiet(&self, cap: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + cap;
        let count_js = "performance.getEntriesByType('resource').length";
        let mut last: Option<u64> = None;
        loop {
            match self.evaluate_raw::<u64>(count_js).await {
                Ok(count) => {
                    if last == Some(count) {
                        return true;
                    }
                    last = Some(count);
                }
                Err(_) => return false,
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn evaluate_raw<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let outcome = self
            .page
            .evaluate(expression)
            .await
            .map_err(DriverError::from);
        let evaluation = match outcome {
            Ok(v) => v,
            Err(e) => {
                self.note_failure(&e);
                return Err(e);
            }
        };
        evaluation
            .into_value::<T>()
            .map_err(|e| DriverError::Evaluation(e.to_string()))
    }

    /// Evaluates an expression and deserializes the result.
    pub async fn evaluate<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        self.evaluate_raw(expression).await
    }

    /// Evaluates a (possibly async) function expression, awaiting promises.
    pub async fn evaluate_function<T: DeserializeOwned>(&self, function: &str) -> Result<T> {
        let outcome = self
            .page
            .evaluate_function(function)
            .await
            .map_err(DriverError::from);
        let evaluation = match outcome {
            Ok(v) => v,
            Err(e) => {
                self.note_failure(&e);
                return Err(e);
            }
        };
        evaluation
            .into_value::<T>()
            .map_err(|e| DriverError::Evaluation(e.to_string()))
    }

    async fn click_once(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        element.click().await.map_err(DriverError::from)?;
        Ok(())
    }

    /// Clicks an element, retrying with the element-interaction preset.
    pub async fn click(&self, selector: &str) -> std::result::Result<(), RetryError<DriverError>> {
        retry_operation("click", &RetryConfig::element_interaction(), self, || {
            self.click_once(selector)
        })
        .await
    }

    async fn fill_once(&self, selector: &str, value: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        element.click().await.map_err(DriverError::from)?;
        element.type_str(value).await.map_err(DriverError::from)?;
        Ok(())
    }

    /// Fills a field, retrying with the element-interaction preset.
    pub async fn fill(
        &self,
        selector: &str,
        value: &str,
    ) -> std::result::Result<(), RetryError<DriverError>> {
        retry_operation("fill", &RetryConfig::element_interaction(), self, || {
            self.fill_once(selector, value)
        })
        .await
    }

    /// Applies a device-metrics override for the given viewport.
    pub async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(viewport.width))
            .height(i64::from(viewport.height))
            .device_scale_factor(1.0)
            .mobile(viewport.width < 500)
            .build()
            .map_err(DriverError::Evaluation)?;
        self.page.execute(params).await.map_err(DriverError::from)?;
        Ok(())
    }

    /// Toggles `prefers-reduced-motion` media emulation.
    pub async fn emulate_reduced_motion(&self, enabled: bool) -> Result<()> {
        let feature = MediaFeature {
            name: "prefers-reduced-motion".to_string(),
            value: if enabled { "reduce" } else { "no-preference" }.to_string(),
        };
        let params = SetEmulatedMediaParams::builder()
            .feature(feature)
            .build();
        self.page.execute(params).await.map_err(DriverError::from)?;
        Ok(())
    }

    /// Captures a full-page PNG screenshot.
    pub async fn screenshot_png(&self) -> Result<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await
            .map_err(DriverError::from)
    }

    /// Current document URL.
    pub async fn url(&self) -> Result<Option<String>> {
        self.page.url().await.map_err(DriverError::from)
    }

    /// Closes the underlying page.
    pub async fn close(self) -> Result<()> {
        self.page.close().await.map_err(DriverError::from)?;
        Ok(())
    }
}

#[async_trait]
impl Recovery for PageSession {
    async fn wait_content_loaded(&self, cap: Duration) -> std::result::Result<(), String> {
        if self.poll_ready_state(cap, "interactive").await {
            Ok(())
        } else {
            Err("content-loaded signal not observed".to_string())
        }
    }

    async fn wait_network_idle(&self, cap: Duration) -> std::result::Result<(), String> {
        if self.wait_resources_quiet(cap).await {
            Ok(())
        } else {
            Err("network never went idle".to_string())
        }
    }

    fn is_alive(&self) -> bool {
        PageSession::is_alive(self)
    }
}
