//! The check-scenario trait and shared context.
//!
//! Each scenario is a self-contained check family (accessibility, visual,
//! responsive, interaction, HTTP integrity) that visits the sampled pages
//! and produces one outcome per project (viewport or browser profile).
//! Scenarios contain the business policy — what gates, what is advisory,
//! what sample to take — and no algorithmic machinery of their own.

use async_trait::async_trait;
use presscheck_browser::{BrowserDriver, DriverError};
use presscheck_core::{
    A11yMode, Attachment, EnvOptions, PageAuditReport, RetryError, SiteConfig, TestDataFactory,
    TestStatus, attachment_base_name, audit_summary_markdown, render_markdown_html,
    resolve_sample_size,
};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole scenario (per-page failures are contained
/// inside the scenario and recorded as issues instead).
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("setup failed: {0}")]
    Setup(String),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("{0}")]
    Retry(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RetryError<DriverError>> for CheckError {
    fn from(err: RetryError<DriverError>) -> Self {
        CheckError::Retry(err.to_string())
    }
}

/// Check family, used for report grouping and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckCategory {
    Accessibility,
    Visual,
    Responsive,
    Interaction,
    HttpIntegrity,
}

impl CheckCategory {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            CheckCategory::Accessibility => "accessibility",
            CheckCategory::Visual => "visual",
            CheckCategory::Responsive => "responsive",
            CheckCategory::Interaction => "interaction",
            CheckCategory::HttpIntegrity => "http-integrity",
        }
    }
}

/// Shared, read-only context for one run.
pub struct CheckContext {
    pub site: SiteConfig,
    pub env: EnvOptions,
    /// Root of this run's report directory.
    pub report_dir: PathBuf,
    /// Root of the baseline store (shared across runs).
    pub baseline_dir: PathBuf,
    /// Rewrite baselines instead of comparing against them.
    pub update_baselines: bool,
    pub factory: TestDataFactory,
}

impl CheckContext {
    /// Pages this check should visit, honoring smoke mode and overrides.
    #[must_use]
    pub fn sampled_pages(&self, override_sample: Option<usize>) -> Vec<String> {
        let n = resolve_sample_size(
            self.site.test_pages.len(),
            self.site.sample_size,
            override_sample,
            self.env.smoke,
        );
        self.site.test_pages.iter().take(n).cloned().collect()
    }
}

/// Outcome of one scenario for one project (e.g. one viewport).
pub struct CheckOutcome {
    /// Project label, e.g. "desktop" or "mobile".
    pub project: String,
    pub pages: Vec<PageAuditReport>,
    pub attachments: Vec<Attachment>,
    pub status: TestStatus,
    pub errors: Vec<String>,
}

impl CheckOutcome {
    /// Total gating issues across pages.
    #[must_use]
    pub fn gating_count(&self) -> usize {
        self.pages.iter().map(PageAuditReport::gating_count).sum()
    }
}

/// A check family runnable against a site.
#[async_trait]
pub trait CheckScenario: Send + Sync {
    /// Stable identifier, e.g. "a11y".
    fn id(&self) -> &str;

    /// Human-readable description of what the check verifies.
    fn description(&self) -> &str;

    fn category(&self) -> CheckCategory;

    /// Runs the check, returning one outcome per project.
    async fn run(
        &self,
        driver: &BrowserDriver,
        ctx: &CheckContext,
    ) -> Result<Vec<CheckOutcome>, CheckError>;
}

/// Derives a test status from the aggregate gate.
///
/// The final assertion of every check is a single count compared against a
/// budget (usually zero), not a list of individual failures. Audit mode
/// never fails.
#[must_use]
pub fn gate_status(gating_count: usize, budget: usize, mode: A11yMode) -> TestStatus {
    if gating_count <= budget || mode == A11yMode::Audit {
        TestStatus::Passed
    } else {
        TestStatus::Failed
    }
}

/// Builds the standard summary attachment pair for a scenario outcome.
#[must_use]
pub fn summary_attachments(
    check: &str,
    project: &str,
    pages: &[PageAuditReport],
) -> Vec<Attachment> {
    let base = attachment_base_name(check, "summary", project);
    let markdown = audit_summary_markdown(check, pages);
    let html = render_markdown_html(&markdown);
    vec![
        Attachment::text(format!("{base}.md"), markdown),
        Attachment::html(format!("{base}.html"), html),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use presscheck_core::{Issue, IssueBucket};

    #[test]
    fn gate_status_honors_budget_and_mode() {
        assert_eq!(gate_status(0, 0, A11yMode::Gate), TestStatus::Passed);
        assert_eq!(gate_status(1, 0, A11yMode::Gate), TestStatus::Failed);
        assert_eq!(gate_status(2, 2, A11yMode::Gate), TestStatus::Passed);
        assert_eq!(gate_status(5, 0, A11yMode::Audit), TestStatus::Passed);
    }

    #[test]
    fn summary_attachment_pair_is_named_consistently() {
        let mut page = PageAuditReport::new("/");
        page.push(Issue::check_failure("x", IssueBucket::Gating, "boom"));
        let attachments = summary_attachments("Visual Check", "mobile", &[page]);
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].name, "visual-check-summary-mobile.md");
        assert_eq!(attachments[1].name, "visual-check-summary-mobile.html");
    }

    #[test]
    fn sampled_pages_respects_smoke() {
        let ctx = CheckContext {
            site: SiteConfig {
                test_pages: vec!["/".to_string(), "/a".to_string(), "/b".to_string()],
                ..SiteConfig::default()
            },
            env: EnvOptions {
                smoke: true,
                ..EnvOptions::default()
            },
            report_dir: PathBuf::from("reports/test"),
            baseline_dir: PathBuf::from("reports/baselines"),
            update_baselines: false,
            factory: TestDataFactory::new(),
        };
        assert_eq!(ctx.sampled_pages(None), vec!["/"]);
    }
}
