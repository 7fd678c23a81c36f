//! HTTP integrity check: broken subresources and console errors.
//!
//! Capture is scoped per page: listeners attach before navigation and the
//! guard drops them when the page's audit finishes, so issues are never
//! attributed to the wrong page.

use crate::scenario::{
    CheckCategory, CheckContext, CheckError, CheckOutcome, CheckScenario, gate_status,
    summary_attachments,
};
use async_trait::async_trait;
use presscheck_browser::{attach, BrowserDriver, ConsoleEntry, PageSession, RequestIssue};
use presscheck_core::{A11yMode, Issue, IssueBucket, PageAuditReport, PerformanceBudgets};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct TimingProbe {
    load_ms: Option<f64>,
    dom_content_loaded_ms: Option<f64>,
}

const TIMING_PROBE_JS: &str = r"() => {
    const [nav] = performance.getEntriesByType('navigation');
    if (!nav) return { load_ms: null, dom_content_loaded_ms: null };
    return {
        load_ms: nav.loadEventEnd > 0 ? nav.loadEventEnd : null,
        dom_content_loaded_ms: nav.domContentLoadedEventEnd > 0 ? nav.domContentLoadedEventEnd : null,
    };
}";

fn request_issue_message(issue: &RequestIssue) -> String {
    match issue.status {
        Some(status) => format!("{} returned HTTP {}", issue.url, status),
        None => {
            if issue.url.is_empty() {
                format!("subresource failed to load: {}", issue.detail)
            } else {
                format!("{} failed to load: {}", issue.url, issue.detail)
            }
        }
    }
}

fn record_capture(
    report: &mut PageAuditReport,
    requests: &[RequestIssue],
    console_errors: &[ConsoleEntry],
    budget: usize,
) {
    let bucket = if requests.len() > budget {
        IssueBucket::Gating
    } else {
        IssueBucket::Advisory
    };
    for issue in requests {
        report.push(Issue::check_failure(
            "resource-error",
            bucket,
            request_issue_message(issue),
        ));
    }
    for entry in console_errors {
        report.push(Issue::check_failure(
            "console-error",
            IssueBucket::Advisory,
            entry.text.clone(),
        ));
    }
    report.set_extra(
        "resource_errors",
        serde_json::Value::from(requests.len()),
    );
    report.set_extra(
        "console_errors",
        serde_json::Value::from(console_errors.len()),
    );
}

fn check_budget(report: &mut PageAuditReport, name: &str, measured: Option<f64>, budget: Option<u64>) {
    let (Some(measured), Some(budget)) = (measured, budget) else {
        return;
    };
    report.set_extra(name, serde_json::Value::from(measured));
    if measured > budget as f64 {
        report.push(Issue::check_failure(
            "performance-budget",
            IssueBucket::Advisory,
            format!("{} took {:.0}ms, budget is {}ms", name, measured, budget),
        ));
    }
}

async fn audit_timing(
    session: &PageSession,
    budgets: &PerformanceBudgets,
    report: &mut PageAuditReport,
) {
    if budgets.load_ms.is_none() && budgets.dom_content_loaded_ms.is_none() {
        return;
    }
    match session.evaluate_function::<TimingProbe>(TIMING_PROBE_JS).await {
        Ok(probe) => {
            check_budget(report, "load_ms", probe.load_ms, budgets.load_ms);
            check_budget(
                report,
                "dom_content_loaded_ms",
                probe.dom_content_loaded_ms,
                budgets.dom_content_loaded_ms,
            );
        }
        Err(e) => warn!(error = %e, "timing probe failed"),
    }
}

/// Watches each page load for failed requests and console errors and gates
/// on the configured resource error budget.
pub struct HttpIntegrityCheck;

#[async_trait]
impl CheckScenario for HttpIntegrityCheck {
    fn id(&self) -> &str {
        "http"
    }

    fn description(&self) -> &str {
        "Counts failed subresource requests and console errors per page"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::HttpIntegrity
    }

    async fn run(
        &self,
        driver: &BrowserDriver,
        ctx: &CheckContext,
    ) -> Result<Vec<CheckOutcome>, CheckError> {
        let budget = ctx.site.resource_error_budget;
        let pages = ctx.sampled_pages(None);
        let mut reports = Vec::with_capacity(pages.len());
        let mut errors = Vec::new();

        for page_path in &pages {
            let mut report = PageAuditReport::new(page_path.clone());
            let url = ctx.site.page_url(page_path);

            // Fresh session per page so captured events cannot leak across
            // pages through a shared event stream.
            let session = match driver.new_session().await {
                Ok(s) => s,
                Err(e) => {
                    report.push(Issue::check_failure(
                        "session-failed",
                        IssueBucket::Gating,
                        format!("could not open a page session: {}", e),
                    ));
                    errors.push(e.to_string());
                    reports.push(report);
                    continue;
                }
            };

            {
                let (capture, _guard) = match attach(session.page()).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(page = %page_path, error = %e, "capture attach failed");
                        report.push(Issue::check_failure(
                            "capture-failed",
                            IssueBucket::Gating,
                            format!("could not attach listeners: {}", e),
                        ));
                        errors.push(e.to_string());
                        reports.push(report);
                        session.close().await.ok();
                        continue;
                    }
                };

                if let Err(e) = session.navigate(&url).await {
                    report.push(Issue::check_failure(
                        "page-unreachable",
                        IssueBucket::Gating,
                        format!("could not open {}: {}", url, e),
                    ));
                    errors.push(e.to_string());
                } else {
                    session.wait_for_stable(Duration::from_secs(10)).await;
                    record_capture(
                        &mut report,
                        &capture.request_issues(),
                        &capture.console_errors(),
                        budget,
                    );
                    audit_timing(&session, &ctx.site.performance_budgets, &mut report).await;
                }
            }
            session.close().await.ok();
            reports.push(report);
        }

        let gating: usize = reports.iter().map(PageAuditReport::gating_count).sum();
        let status = gate_status(gating, 0, A11yMode::Gate);
        let attachments = summary_attachments("http-integrity", "default", &reports);

        Ok(vec![CheckOutcome {
            project: "default".to_string(),
            pages: reports,
            attachments,
            status,
            errors,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(url: &str, status: Option<i64>) -> RequestIssue {
        RequestIssue {
            url: url.to_string(),
            status,
            detail: status.map_or("net::ERR_FAILED".to_string(), |s| format!("HTTP {}", s)),
        }
    }

    #[test]
    fn within_budget_is_advisory() {
        let mut report = PageAuditReport::new("/");
        record_capture(&mut report, &[req("https://x/a.png", Some(404))], &[], 2);
        assert_eq!(report.gating_count(), 0);
        assert_eq!(report.advisories.len(), 1);
    }

    #[test]
    fn over_budget_gates_every_request_issue() {
        let mut report = PageAuditReport::new("/");
        let issues = vec![
            req("https://x/a.png", Some(404)),
            req("https://x/b.js", Some(500)),
            req("https://x/c.css", None),
        ];
        record_capture(&mut report, &issues, &[], 1);
        assert_eq!(report.gating_count(), 3);
    }

    #[test]
    fn console_errors_are_always_advisory() {
        let mut report = PageAuditReport::new("/");
        let console = vec![ConsoleEntry {
            level: presscheck_browser::ConsoleLevel::Error,
            text: "undefined is not a function".to_string(),
        }];
        record_capture(&mut report, &[], &console, 0);
        assert_eq!(report.gating_count(), 0);
        assert_eq!(report.advisories.len(), 1);
        assert_eq!(report.extras["console_errors"], serde_json::Value::from(1));
    }

    #[test]
    fn slow_page_trips_the_performance_budget() {
        let mut report = PageAuditReport::new("/");
        check_budget(&mut report, "load_ms", Some(4200.0), Some(3000));
        assert_eq!(report.advisories.len(), 1);
        assert!(report.advisories[0].message.contains("4200ms"));
        // within budget or unmeasured adds nothing
        check_budget(&mut report, "load_ms", Some(900.0), Some(3000));
        check_budget(&mut report, "dom_content_loaded_ms", None, Some(1000));
        check_budget(&mut report, "load_ms", Some(9000.0), None);
        assert_eq!(report.advisories.len(), 1);
    }

    #[test]
    fn messages_name_the_failing_resource() {
        assert_eq!(
            request_issue_message(&req("https://x/logo.png", Some(404))),
            "https://x/logo.png returned HTTP 404"
        );
        assert_eq!(
            request_issue_message(&req("", None)),
            "subresource failed to load: net::ERR_FAILED"
        );
    }
}
