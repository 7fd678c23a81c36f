//! # presscheck-browser
//!
//! Chromium adapter for the presscheck QA suite, built on chromiumoxide.
//!
//! This crate provides:
//! - Browser process lifecycle ([`BrowserDriver`])
//! - A retry-aware page wrapper ([`PageSession`]) with safe navigation,
//!   stability waiting, viewport emulation, and screenshots
//! - Scoped console/network capture with guaranteed listener teardown
//! - axe-core injection and violation mapping
//!
//! Classification of failures is typed at this boundary: every
//! [`DriverError`] variant knows its retry class, so the retry helper in
//! `presscheck-core` never has to guess from message text for errors this
//! crate raises.

mod axe;
mod console;
mod driver;
mod error;
mod session;

pub use axe::{AxeRunner, DEFAULT_AXE_PATH};
pub use console::{attach, CaptureGuard, ConsoleEntry, ConsoleLevel, PageCapture, RequestIssue};
pub use driver::{BrowserDriver, DriverConfig};
pub use error::{DriverError, Result};
pub use session::PageSession;
