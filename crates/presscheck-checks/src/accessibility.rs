//! WCAG accessibility check backed by axe-core.

use crate::scenario::{
    CheckCategory, CheckContext, CheckError, CheckOutcome, CheckScenario, gate_status,
    summary_attachments,
};
use async_trait::async_trait;
use presscheck_browser::{AxeRunner, BrowserDriver};
use presscheck_core::{A11yMode, Issue, IssueBucket, PageAuditReport, classify_violation};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Runs the third-party accessibility scanner on each sampled page and
/// applies the site's gating policy to every violation.
pub struct AccessibilityCheck {
    axe_path: PathBuf,
}

impl AccessibilityCheck {
    #[must_use]
    pub fn new(axe_path: PathBuf) -> Self {
        Self { axe_path }
    }
}

impl Default for AccessibilityCheck {
    fn default() -> Self {
        Self::new(AxeRunner::default_path())
    }
}

#[async_trait]
impl CheckScenario for AccessibilityCheck {
    fn id(&self) -> &str {
        "a11y"
    }

    fn description(&self) -> &str {
        "Scans pages with axe-core and gates on configured impact levels"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Accessibility
    }

    async fn run(
        &self,
        driver: &BrowserDriver,
        ctx: &CheckContext,
    ) -> Result<Vec<CheckOutcome>, CheckError> {
        let runner = AxeRunner::from_file(&self.axe_path)?;
        let session = driver.new_session().await?;
        let pages = ctx.sampled_pages(ctx.env.a11y_sample);
        let mut reports = Vec::with_capacity(pages.len());
        let mut errors = Vec::new();

        for page_path in &pages {
            let mut report = PageAuditReport::new(page_path.clone());
            let url = ctx.site.page_url(page_path);

            // Per-page failures become issues, never abort the check.
            if let Err(e) = session.navigate(&url).await {
                warn!(page = %page_path, error = %e, "navigation failed, recording gating issue");
                report.push(Issue::check_failure(
                    "page-unreachable",
                    IssueBucket::Gating,
                    format!("could not open {}: {}", url, e),
                ));
                errors.push(e.to_string());
                reports.push(report);
                continue;
            }
            if !session.wait_for_stable(Duration::from_secs(10)).await {
                report.push(Issue::check_failure(
                    "page-unstable",
                    IssueBucket::Advisory,
                    "page did not settle before scan; results may be partial",
                ));
            }

            match runner.scan(&session).await {
                Ok(violations) => {
                    for violation in &violations {
                        let bucket = classify_violation(violation, &ctx.site.a11y);
                        report.push(Issue::from_violation(violation, bucket));
                    }
                    report.set_extra(
                        "violations_total",
                        serde_json::Value::from(violations.len()),
                    );
                }
                Err(e) => {
                    warn!(page = %page_path, error = %e, "axe scan failed");
                    report.push(Issue::check_failure(
                        "scan-failed",
                        IssueBucket::Gating,
                        format!("accessibility scan failed: {}", e),
                    ));
                    errors.push(e.to_string());
                }
            }
            reports.push(report);
        }
        session.close().await.ok();

        let gating: usize = reports.iter().map(PageAuditReport::gating_count).sum();
        if ctx.site.a11y.mode == A11yMode::Audit && gating > 0 {
            info!(gating, "audit mode: gating issues logged, not failing");
        }
        let status = gate_status(gating, 0, ctx.site.a11y.mode);
        let attachments = summary_attachments("accessibility", "default", &reports);

        Ok(vec![CheckOutcome {
            project: "default".to_string(),
            pages: reports,
            attachments,
            status,
            errors,
        }])
    }
}
