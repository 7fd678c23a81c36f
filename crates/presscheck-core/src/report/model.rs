//! In-memory report model for one run.
//!
//! These structures are built once per run by the check runner and consumed
//! by the HTML/Markdown renderers. Attempt ordering is stable and
//! increasing, and `RunSummary::status_counts` is always derived from the
//! tests vector so the counts cannot drift from the test list.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Final status of a test (or one attempt of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    TimedOut,
    Interrupted,
    Flaky,
    Unknown,
}

impl TestStatus {
    /// Human label used in report cards.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::TimedOut => "timedOut",
            TestStatus::Interrupted => "interrupted",
            TestStatus::Flaky => "flaky",
            TestStatus::Unknown => "unknown",
        }
    }

    /// Fixed display order for the status filter:
    /// failures first, then passes, then the rest.
    pub const DISPLAY_ORDER: [TestStatus; 7] = [
        TestStatus::Failed,
        TestStatus::TimedOut,
        TestStatus::Interrupted,
        TestStatus::Passed,
        TestStatus::Flaky,
        TestStatus::Skipped,
        TestStatus::Unknown,
    ];
}

/// Body of an attachment. Exactly one representation exists per attachment
/// by construction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum AttachmentBody {
    /// Inline `data:` URI, typically an image.
    DataUri(String),
    /// Pre-rendered HTML fragment, embedded as-is.
    Html(String),
    /// Plain text shown in a preformatted block.
    Text(String),
    /// Raw base64 without a usable content type; shown literally.
    Base64(String),
    /// Deliberately not embedded (size limits etc.).
    Omitted { reason: String },
    /// Retrieval failed.
    Error(String),
}

/// A rendering-ready artifact produced during a test.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    /// Size in bytes of the underlying artifact, when known.
    pub size: Option<u64>,
    pub body: AttachmentBody,
}

impl Attachment {
    /// Convenience constructor for an inline text attachment.
    #[must_use]
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            name: name.into(),
            content_type: "text/plain".to_string(),
            size: Some(text.len() as u64),
            body: AttachmentBody::Text(text),
        }
    }

    /// Convenience constructor for an inline HTML fragment.
    #[must_use]
    pub fn html(name: impl Into<String>, html: impl Into<String>) -> Self {
        let html = html.into();
        Self {
            name: name.into(),
            content_type: "text/html".to_string(),
            size: Some(html.len() as u64),
            body: AttachmentBody::Html(html),
        }
    }

    /// Convenience constructor for an embedded PNG.
    #[must_use]
    pub fn png_data_uri(name: impl Into<String>, base64_png: &str) -> Self {
        Self {
            name: name.into(),
            content_type: "image/png".to_string(),
            size: None,
            body: AttachmentBody::DataUri(format!("data:image/png;base64,{}", base64_png)),
        }
    }
}

/// One execution try of a test case.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub status: TestStatus,
    pub duration_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
    /// Pre-rendered HTML summary fragments.
    pub summaries: Vec<String>,
    pub errors: Vec<String>,
    pub stdout: String,
    pub stderr: String,
}

/// Source location of a test definition.
#[derive(Debug, Clone, Serialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

/// One executed test case, with its attempts in order.
#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub title: String,
    pub project_name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub location: Option<Location>,
    pub annotations: Vec<String>,
    pub tags: Vec<String>,
    pub attempts: Vec<AttemptSummary>,
    /// Pre-rendered HTML summary fragments shown on the test card.
    pub summary_blocks: Vec<String>,
    pub errors: Vec<String>,
    pub stdout: String,
    pub stderr: String,
}

impl TestSummary {
    /// A test is flaky when it passed after at least one failed attempt.
    #[must_use]
    pub fn is_flaky(&self) -> bool {
        self.status == TestStatus::Flaky
            || (self.status == TestStatus::Passed
                && self
                    .attempts
                    .iter()
                    .any(|a| a.status != TestStatus::Passed))
    }
}

/// Host/environment info shown in the report metadata panel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnvironmentInfo {
    pub site_name: Option<String>,
    pub site_url: Option<String>,
    pub profile: Option<String>,
    pub platform: Option<String>,
    pub arch: Option<String>,
    pub runtime_version: Option<String>,
}

impl EnvironmentInfo {
    /// Captures the current host environment.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            platform: Some(std::env::consts::OS.to_string()),
            arch: Some(std::env::consts::ARCH.to_string()),
            runtime_version: option_env!("CARGO_PKG_RUST_VERSION").map(ToString::to_string),
            ..Self::default()
        }
    }

    /// True when no field is populated (panel is omitted entirely).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.site_name.is_none()
            && self.site_url.is_none()
            && self.profile.is_none()
            && self.platform.is_none()
            && self.arch.is_none()
            && self.runtime_version.is_none()
    }
}

/// Everything the renderer needs for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub title: String,
    pub projects: Vec<String>,
    pub environment: EnvironmentInfo,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tests: Vec<TestSummary>,
}

impl RunSummary {
    #[must_use]
    pub fn new(run_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            title: title.into(),
            projects: Vec::new(),
            environment: EnvironmentInfo::default(),
            started_at: None,
            completed_at: None,
            tests: Vec::new(),
        }
    }

    /// Status counts derived from the tests vector. Deriving (rather than
    /// storing) keeps the invariant that counts equal the sum over tests.
    #[must_use]
    pub fn status_counts(&self) -> BTreeMap<TestStatus, usize> {
        let mut counts = BTreeMap::new();
        for test in &self.tests {
            *counts.entry(test.status).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn total_tests(&self) -> usize {
        self.tests.len()
    }

    /// Wall-clock duration of the run, when both timestamps are known.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_with_status(status: TestStatus) -> TestSummary {
        TestSummary {
            title: "t".to_string(),
            project_name: "desktop".to_string(),
            status,
            duration_ms: 10,
            location: None,
            annotations: vec![],
            tags: vec![],
            attempts: vec![],
            summary_blocks: vec![],
            errors: vec![],
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[test]
    fn status_counts_match_tests() {
        let mut run = RunSummary::new("run-1", "qa");
        run.tests.push(test_with_status(TestStatus::Passed));
        run.tests.push(test_with_status(TestStatus::Passed));
        run.tests.push(test_with_status(TestStatus::Failed));

        let counts = run.status_counts();
        assert_eq!(counts[&TestStatus::Passed], 2);
        assert_eq!(counts[&TestStatus::Failed], 1);
        assert_eq!(counts.values().sum::<usize>(), run.total_tests());
    }

    #[test]
    fn flaky_detection() {
        let mut test = test_with_status(TestStatus::Passed);
        assert!(!test.is_flaky());
        test.attempts.push(AttemptSummary {
            status: TestStatus::Failed,
            duration_ms: 5,
            started_at: None,
            attachments: vec![],
            summaries: vec![],
            errors: vec![],
            stdout: String::new(),
            stderr: String::new(),
        });
        test.attempts.push(AttemptSummary {
            status: TestStatus::Passed,
            duration_ms: 5,
            started_at: None,
            attachments: vec![],
            summaries: vec![],
            errors: vec![],
            stdout: String::new(),
            stderr: String::new(),
        });
        assert!(test.is_flaky());
    }

    #[test]
    fn empty_environment_detected() {
        assert!(EnvironmentInfo::default().is_empty());
        assert!(!EnvironmentInfo::capture().is_empty());
    }
}
