//! Scoped console and network-failure capture.
//!
//! [`attach`] subscribes to a page's console and network events and returns
//! the capture handle together with a guard; dropping the guard detaches the
//! forwarding tasks. Binding the guard to a lexical block guarantees the
//! listeners are released even when a check errors mid-interaction.

use crate::error::{DriverError, Result};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventRequestWillBeSent, EventResponseReceived, RequestId, ResourceType,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Severity of a captured console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Error,
    Warning,
    Info,
}

/// One captured console message.
#[derive(Debug, Clone)]
pub struct ConsoleEntry {
    pub level: ConsoleLevel,
    pub text: String,
}

/// One failed or error-status subresource request.
#[derive(Debug, Clone)]
pub struct RequestIssue {
    pub url: String,
    /// HTTP status for error responses; `None` for aborted/failed loads.
    pub status: Option<i64>,
    pub detail: String,
}

#[derive(Debug, Default)]
struct CaptureState {
    console: Vec<ConsoleEntry>,
    requests: Vec<RequestIssue>,
    /// Request id → URL, recorded as requests are sent so that loading
    /// failures (which carry no URL) can name the resource.
    request_urls: HashMap<RequestId, String>,
}

/// Thread-safe accumulation of captured page events.
#[derive(Debug, Clone, Default)]
pub struct PageCapture {
    state: Arc<Mutex<CaptureState>>,
}

impl PageCapture {
    /// Console messages captured so far.
    #[must_use]
    pub fn console_messages(&self) -> Vec<ConsoleEntry> {
        self.state.lock().map(|s| s.console.clone()).unwrap_or_default()
    }

    /// Console messages at error level.
    #[must_use]
    pub fn console_errors(&self) -> Vec<ConsoleEntry> {
        self.console_messages()
            .into_iter()
            .filter(|e| e.level == ConsoleLevel::Error)
            .collect()
    }

    /// Request failures and HTTP error responses captured so far.
    #[must_use]
    pub fn request_issues(&self) -> Vec<RequestIssue> {
        self.state.lock().map(|s| s.requests.clone()).unwrap_or_default()
    }

    fn push_console(&self, entry: ConsoleEntry) {
        if let Ok(mut state) = self.state.lock() {
            state.console.push(entry);
        }
    }

    fn push_request(&self, issue: RequestIssue) {
        if let Ok(mut state) = self.state.lock() {
            state.requests.push(issue);
        }
    }

    fn record_request_url(&self, id: RequestId, url: String) {
        if let Ok(mut state) = self.state.lock() {
            state.request_urls.insert(id, url);
        }
    }

    fn request_url(&self, id: &RequestId) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.request_urls.get(id).cloned())
    }
}

/// Builds the issue for a failed load, naming the URL when the request was
/// seen earlier and falling back to the resource type when it was not.
fn failed_request_issue(
    url: Option<String>,
    error_text: &str,
    resource: &ResourceType,
) -> RequestIssue {
    match url {
        Some(url) if !url.is_empty() => RequestIssue {
            url,
            status: None,
            detail: error_text.to_string(),
        },
        _ => RequestIssue {
            url: String::new(),
            status: None,
            detail: format!("{} ({:?} resource)", error_text, resource),
        },
    }
}

/// Guard that aborts the forwarding tasks when dropped.
pub type CaptureGuard = scopeguard::ScopeGuard<Vec<JoinHandle<()>>, fn(Vec<JoinHandle<()>>)>;

fn abort_tasks(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        task.abort();
    }
}

fn console_level(type_name: &str) -> ConsoleLevel {
    let lowered = type_name.to_ascii_lowercase();
    if lowered.contains("error") || lowered.contains("assert") {
        ConsoleLevel::Error
    } else if lowered.contains("warn") {
        ConsoleLevel::Warning
    } else {
        ConsoleLevel::Info
    }
}

fn format_console_args(event: &EventConsoleApiCalled) -> String {
    event
        .args
        .iter()
        .map(|arg| {
            arg.value
                .as_ref()
                .map(ToString::to_string)
                .or_else(|| arg.description.clone())
                .unwrap_or_else(|| "<object>".to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Subscribes to console and network events on a page.
///
/// Returns the capture handle and a guard scoped to the caller's block.
pub async fn attach(page: &Page) -> Result<(PageCapture, CaptureGuard)> {
    let capture = PageCapture::default();

    let mut console_events = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(DriverError::from)?;
    let mut sent_events = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(DriverError::from)?;
    let mut failed_events = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(DriverError::from)?;
    let mut response_events = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(DriverError::from)?;

    let console_sink = capture.clone();
    let console_task = tokio::task::spawn(async move {
        while let Some(event) = console_events.next().await {
            console_sink.push_console(ConsoleEntry {
                level: console_level(&format!("{:?}", event.r#type)),
                text: format_console_args(&event),
            });
        }
    });

    let sent_sink = capture.clone();
    let sent_task = tokio::task::spawn(async move {
        while let Some(event) = sent_events.next().await {
            sent_sink.record_request_url(event.request_id.clone(), event.request.url.clone());
        }
    });

    let failed_sink = capture.clone();
    let failed_task = tokio::task::spawn(async move {
        while let Some(event) = failed_events.next().await {
            if event.canceled.unwrap_or(false) {
                continue;
            }
            let url = failed_sink.request_url(&event.request_id);
            failed_sink.push_request(failed_request_issue(url, &event.error_text, &event.r#type));
        }
    });

    let response_sink = capture.clone();
    let response_task = tokio::task::spawn(async move {
        while let Some(event) = response_events.next().await {
            let status = event.response.status;
            if status >= 400 {
                response_sink.push_request(RequestIssue {
                    url: event.response.url.clone(),
                    status: Some(status),
                    detail: format!("HTTP {}", status),
                });
            }
        }
    });

    let guard: CaptureGuard = scopeguard::guard(
        vec![console_task, sent_task, failed_task, response_task],
        abort_tasks as fn(Vec<JoinHandle<()>>),
    );
    Ok((capture, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_level_mapping() {
        assert_eq!(console_level("Error"), ConsoleLevel::Error);
        assert_eq!(console_level("assert"), ConsoleLevel::Error);
        assert_eq!(console_level("Warning"), ConsoleLevel::Warning);
        assert_eq!(console_level("Log"), ConsoleLevel::Info);
    }

    #[test]
    fn capture_accumulates_and_filters() {
        let capture = PageCapture::default();
        capture.push_console(ConsoleEntry {
            level: ConsoleLevel::Info,
            text: "booted".to_string(),
        });
        capture.push_console(ConsoleEntry {
            level: ConsoleLevel::Error,
            text: "undefined is not a function".to_string(),
        });
        capture.push_request(RequestIssue {
            url: "https://x/logo.png".to_string(),
            status: Some(404),
            detail: "HTTP 404".to_string(),
        });

        assert_eq!(capture.console_messages().len(), 2);
        assert_eq!(capture.console_errors().len(), 1);
        assert_eq!(capture.request_issues().len(), 1);
    }

    #[test]
    fn failed_load_resolves_url_from_earlier_request() {
        let capture = PageCapture::default();
        let id = RequestId::new("1000.7");
        capture.record_request_url(id.clone(), "https://x/app.js".to_string());

        let issue = failed_request_issue(
            capture.request_url(&id),
            "net::ERR_FAILED",
            &ResourceType::Script,
        );
        assert_eq!(issue.url, "https://x/app.js");
        assert_eq!(issue.detail, "net::ERR_FAILED");
    }

    #[test]
    fn failed_load_without_known_request_names_the_resource_type() {
        let capture = PageCapture::default();
        let issue = failed_request_issue(
            capture.request_url(&RequestId::new("unseen")),
            "net::ERR_ABORTED",
            &ResourceType::Image,
        );
        assert!(issue.url.is_empty());
        assert_eq!(issue.detail, "net::ERR_ABORTED (Image resource)");
    }
}
