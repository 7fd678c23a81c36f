//! Run orchestration: executes check scenarios and writes the report.
//!
//! Scenarios run sequentially against one browser process. Each scenario
//! outcome becomes one test card in the run report; a scenario-level error
//! becomes a failed card rather than aborting the run, so one broken check
//! never hides the results of the others.

use crate::scenario::{CheckContext, CheckOutcome, CheckScenario};
use crate::{
    AccessibilityCheck, HttpIntegrityCheck, InteractionCheck, ResponsiveCheck, VisualCheck,
};
use chrono::Utc;
use presscheck_browser::{BrowserDriver, DriverConfig};
use presscheck_core::{
    render_report, AttachmentBody, AttemptSummary, EnvOptions, EnvironmentInfo, RunSummary,
    SiteConfig, TestDataFactory, TestStatus, TestSummary,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("could not write report artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not serialize run summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Options for one run, resolved by the CLI before invoking the runner.
pub struct RunOptions {
    /// Root directory for report output; the run writes into a
    /// timestamped subdirectory of it.
    pub report_root: PathBuf,
    /// Baseline store shared across runs.
    pub baseline_dir: PathBuf,
    pub update_baselines: bool,
    /// Only run checks whose id is listed; empty means all.
    pub only: Vec<String>,
    pub driver: DriverConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            report_root: PathBuf::from("reports"),
            baseline_dir: PathBuf::from("reports/baselines"),
            update_baselines: false,
            only: Vec::new(),
            driver: DriverConfig::default(),
        }
    }
}

/// Result of one run: the summary plus where it was written.
pub struct RunReport {
    pub summary: RunSummary,
    pub report_dir: PathBuf,
    pub report_html: PathBuf,
}

impl RunReport {
    /// True when no test failed, timed out, or was interrupted.
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.summary.tests.iter().any(|t| {
            matches!(
                t.status,
                TestStatus::Failed | TestStatus::TimedOut | TestStatus::Interrupted
            )
        })
    }
}

/// The full check suite in execution order.
#[must_use]
pub fn default_checks() -> Vec<Box<dyn CheckScenario>> {
    vec![
        Box::new(AccessibilityCheck::default()),
        Box::new(VisualCheck),
        Box::new(ResponsiveCheck),
        Box::new(InteractionCheck),
        Box::new(HttpIntegrityCheck),
    ]
}

/// Run id like `blog-20250114-093012`, unique enough per site per second.
#[must_use]
pub fn make_run_id(site_name: &str, now: chrono::DateTime<Utc>) -> String {
    format!("{}-{}", site_name, now.format("%Y%m%d-%H%M%S"))
}

fn outcome_to_test(check: &dyn CheckScenario, outcome: CheckOutcome, duration_ms: u64) -> TestSummary {
    let gating = outcome.gating_count();
    let summary_blocks = outcome
        .attachments
        .iter()
        .filter_map(|a| match &a.body {
            AttachmentBody::Html(html) => Some(html.clone()),
            _ => None,
        })
        .collect();
    TestSummary {
        title: format!("{} [{}]", check.description(), outcome.project),
        project_name: outcome.project,
        status: outcome.status,
        duration_ms,
        location: None,
        annotations: vec![format!("gating issues: {}", gating)],
        tags: vec![check.category().label().to_string()],
        attempts: vec![AttemptSummary {
            status: outcome.status,
            duration_ms,
            started_at: None,
            attachments: outcome.attachments,
            summaries: vec![],
            errors: outcome.errors.clone(),
            stdout: String::new(),
            stderr: String::new(),
        }],
        summary_blocks,
        errors: outcome.errors,
        stdout: String::new(),
        stderr: String::new(),
    }
}

fn check_error_test(check: &dyn CheckScenario, message: String, duration_ms: u64) -> TestSummary {
    TestSummary {
        title: check.description().to_string(),
        project_name: "default".to_string(),
        status: TestStatus::Failed,
        duration_ms,
        location: None,
        annotations: vec!["check aborted".to_string()],
        tags: vec![check.category().label().to_string()],
        attempts: vec![],
        summary_blocks: vec![],
        errors: vec![message],
        stdout: String::new(),
        stderr: String::new(),
    }
}

fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), RunnerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| RunnerError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, bytes).map_err(|source| RunnerError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes file-backed attachments (summaries) beside the report so they can
/// be read without opening the HTML. Inline data URIs stay inline only.
fn write_attachments(dir: &Path, tests: &[TestSummary]) -> Result<(), RunnerError> {
    for test in tests {
        for attempt in &test.attempts {
            for attachment in &attempt.attachments {
                let body: Option<&str> = match &attachment.body {
                    AttachmentBody::Text(t) => Some(t),
                    AttachmentBody::Html(h) => Some(h),
                    _ => None,
                };
                if let Some(body) = body {
                    write_artifact(&dir.join("attachments").join(&attachment.name), body.as_bytes())?;
                }
            }
        }
    }
    Ok(())
}

/// Runs the selected checks against one site and writes the report.
///
/// Per-check failures are contained: the run always produces a report, and
/// the exit decision belongs to the caller via [`RunReport::passed`].
pub async fn run_site(
    site: SiteConfig,
    env: EnvOptions,
    checks: &[Box<dyn CheckScenario>],
    options: &RunOptions,
) -> Result<RunReport, RunnerError> {
    let started_at = Utc::now();
    let run_id = make_run_id(&site.name, started_at);
    let report_dir = options.report_root.join(&run_id);

    let mut summary = RunSummary::new(run_id.clone(), format!("QA run: {}", site.name));
    summary.started_at = Some(started_at);
    summary.environment = EnvironmentInfo {
        site_name: Some(site.name.clone()),
        site_url: Some(site.base_url.clone()),
        profile: env.smoke.then(|| "smoke".to_string()),
        ..EnvironmentInfo::capture()
    };

    let ctx = CheckContext {
        site,
        env,
        report_dir: report_dir.clone(),
        baseline_dir: options.baseline_dir.clone(),
        update_baselines: options.update_baselines,
        factory: TestDataFactory::new(),
    };

    let driver = BrowserDriver::launch(options.driver.clone())
        .await
        .map_err(|e| RunnerError::Launch(e.to_string()))?;

    for check in checks {
        if !options.only.is_empty() && !options.only.iter().any(|id| id == check.id()) {
            info!(check = check.id(), "skipped (not selected)");
            continue;
        }
        info!(check = check.id(), "running");
        let check_start = std::time::Instant::now();
        match check.run(&driver, &ctx).await {
            Ok(outcomes) => {
                let duration_ms = u64::try_from(check_start.elapsed().as_millis()).unwrap_or(u64::MAX);
                let per_outcome = duration_ms / outcomes.len().max(1) as u64;
                for outcome in outcomes {
                    if !summary.projects.contains(&outcome.project) {
                        summary.projects.push(outcome.project.clone());
                    }
                    summary
                        .tests
                        .push(outcome_to_test(check.as_ref(), outcome, per_outcome));
                }
            }
            Err(e) => {
                error!(check = check.id(), error = %e, "check aborted");
                let duration_ms = u64::try_from(check_start.elapsed().as_millis()).unwrap_or(u64::MAX);
                summary
                    .tests
                    .push(check_error_test(check.as_ref(), e.to_string(), duration_ms));
            }
        }
    }
    driver.close().await.ok();
    summary.completed_at = Some(Utc::now());

    let html = render_report(&summary);
    let report_html = report_dir.join("report.html");
    write_artifact(&report_html, html.as_bytes())?;
    write_artifact(
        &report_dir.join("summary.json"),
        serde_json::to_vec_pretty(&summary)?.as_slice(),
    )?;
    write_attachments(&report_dir, &summary.tests)?;

    info!(report = %report_html.display(), "run complete");
    Ok(RunReport {
        summary,
        report_dir,
        report_html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::CheckCategory;
    use async_trait::async_trait;
    use presscheck_core::{Attachment, Issue};

    struct StubCheck;

    #[async_trait]
    impl CheckScenario for StubCheck {
        fn id(&self) -> &str {
            "stub"
        }
        fn description(&self) -> &str {
            "Stub check"
        }
        fn category(&self) -> CheckCategory {
            CheckCategory::HttpIntegrity
        }
        async fn run(
            &self,
            _driver: &BrowserDriver,
            _ctx: &CheckContext,
        ) -> Result<Vec<CheckOutcome>, crate::scenario::CheckError> {
            unreachable!("not exercised in unit tests")
        }
    }

    #[test]
    fn run_ids_embed_site_and_timestamp() {
        let now = chrono::DateTime::parse_from_rfc3339("2025-01-14T09:30:12Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(make_run_id("blog", now), "blog-20250114-093012");
    }

    #[test]
    fn outcome_maps_to_test_card() {
        let check = StubCheck;
        let mut page = presscheck_core::PageAuditReport::new("/");
        page.push(Issue::check_failure(
            "x",
            presscheck_core::IssueBucket::Gating,
            "boom",
        ));
        let outcome = CheckOutcome {
            project: "desktop".to_string(),
            pages: vec![page],
            attachments: vec![
                Attachment::text("s.md", "# summary"),
                Attachment::html("s.html", "<h1>summary</h1>"),
            ],
            status: TestStatus::Failed,
            errors: vec!["boom".to_string()],
        };
        let test = outcome_to_test(&check, outcome, 42);
        assert_eq!(test.status, TestStatus::Failed);
        assert_eq!(test.project_name, "desktop");
        assert_eq!(test.tags, vec!["http-integrity"]);
        assert_eq!(test.annotations, vec!["gating issues: 1"]);
        assert_eq!(test.summary_blocks, vec!["<h1>summary</h1>"]);
        assert_eq!(test.attempts.len(), 1);
        assert_eq!(test.attempts[0].attachments.len(), 2);
    }

    #[test]
    fn aborted_check_becomes_failed_card() {
        let test = check_error_test(&StubCheck, "launch exploded".to_string(), 7);
        assert_eq!(test.status, TestStatus::Failed);
        assert_eq!(test.errors, vec!["launch exploded"]);
        assert!(test.attempts.is_empty());
    }

    #[test]
    fn file_backed_attachments_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let test = TestSummary {
            title: "t".to_string(),
            project_name: "default".to_string(),
            status: TestStatus::Passed,
            duration_ms: 1,
            location: None,
            annotations: vec![],
            tags: vec![],
            attempts: vec![AttemptSummary {
                status: TestStatus::Passed,
                duration_ms: 1,
                started_at: None,
                attachments: vec![
                    Attachment::text("summary.md", "# ok"),
                    Attachment::png_data_uri("diff.png", "aGVsbG8="),
                ],
                summaries: vec![],
                errors: vec![],
                stdout: String::new(),
                stderr: String::new(),
            }],
            summary_blocks: vec![],
            errors: vec![],
            stdout: String::new(),
            stderr: String::new(),
        };
        write_attachments(dir.path(), &[test]).unwrap();
        let written = dir.path().join("attachments/summary.md");
        assert_eq!(std::fs::read_to_string(written).unwrap(), "# ok");
        // inline-only bodies are not written to disk
        assert!(!dir.path().join("attachments/diff.png").exists());
    }
}
