//! Typed driver errors.
//!
//! Each variant corresponds to one failure class, so retry policy never has
//! to guess from message text for errors we raise ourselves. Errors that
//! bubble up from chromiumoxide are classified by their message as a
//! fallback.

use chromiumoxide::error::CdpError;
use presscheck_core::{classify_message, Classified, ErrorClass};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the browser adapter.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Browser process failed to start or connect.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Navigation to a URL failed.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// A selector resolved to no element.
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// The browser or its execution context went away.
    #[error("browser connection lost: {0}")]
    BrowserCrash(String),

    /// Connection-level network failure.
    #[error("network failure: {0}")]
    Network(String),

    /// In-page script evaluation failed.
    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    /// A check-level assertion failed.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Opaque protocol error from chromiumoxide.
    #[error(transparent)]
    Cdp(#[from] CdpError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Classified for DriverError {
    fn class(&self) -> ErrorClass {
        match self {
            DriverError::Launch(_) | DriverError::BrowserCrash(_) => ErrorClass::BrowserCrash,
            DriverError::Navigation { .. } => ErrorClass::Navigation,
            DriverError::Timeout { .. } => ErrorClass::Timeout,
            DriverError::ElementNotFound { .. } => ErrorClass::ElementNotFound,
            DriverError::Network(_) => ErrorClass::Network,
            DriverError::Assertion(_) => ErrorClass::Assertion,
            // third-party errors expose no structured code, fall back to text
            DriverError::Cdp(e) => classify_message(&e.to_string()),
            DriverError::Evaluation(message) => classify_message(message),
            DriverError::Io(_) => ErrorClass::Unknown,
        }
    }
}

/// Adapter result alias.
pub type Result<T> = std::result::Result<T, DriverError>;
