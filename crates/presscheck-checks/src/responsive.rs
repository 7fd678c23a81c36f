//! Responsive layout check across the configured viewports.
//!
//! All measurements are done in-page with small script probes; the check
//! itself only decides which findings gate and which are advisory.

use crate::scenario::{
    CheckCategory, CheckContext, CheckError, CheckOutcome, CheckScenario, gate_status,
    summary_attachments,
};
use async_trait::async_trait;
use presscheck_browser::{BrowserDriver, PageSession};
use presscheck_core::{
    A11yMode, Issue, IssueBucket, PageAuditReport, Viewport, parse_viewports,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Minimum tap-target edge in CSS pixels on narrow viewports.
const MIN_TAP_TARGET_PX: f64 = 24.0;
/// Tolerance for scroll width overshoot before it counts as overflow.
const OVERFLOW_SLACK_PX: f64 = 1.0;

#[derive(Debug, Deserialize)]
struct LayoutProbe {
    scroll_width: f64,
    inner_width: f64,
    has_viewport_meta: bool,
    overflowing_selectors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TapTargetProbe {
    small_targets: Vec<SmallTarget>,
    total_targets: u64,
}

#[derive(Debug, Deserialize)]
struct SmallTarget {
    selector: String,
    width: f64,
    height: f64,
}

const LAYOUT_PROBE_JS: &str = r"() => {
    const doc = document.documentElement;
    const overflowing = [];
    for (const el of document.querySelectorAll('body *')) {
        const r = el.getBoundingClientRect();
        if (r.width > 0 && (r.right > window.innerWidth + 1 || r.left < -1)) {
            const tag = el.tagName.toLowerCase();
            const id = el.id ? '#' + el.id : '';
            const cls = el.classList.length ? '.' + el.classList[0] : '';
            overflowing.push(tag + id + cls);
            if (overflowing.length >= 5) break;
        }
    }
    return {
        scroll_width: doc.scrollWidth,
        inner_width: window.innerWidth,
        has_viewport_meta: !!document.querySelector('meta[name=viewport]'),
        overflowing_selectors: overflowing,
    };
}";

const TAP_TARGET_PROBE_JS: &str = r"() => {
    const small = [];
    let total = 0;
    const interactive = document.querySelectorAll('a[href], button, input, select, textarea, [role=button]');
    for (const el of interactive) {
        const r = el.getBoundingClientRect();
        if (r.width === 0 || r.height === 0) continue;
        total += 1;
        if (r.width < 24 || r.height < 24) {
            const tag = el.tagName.toLowerCase();
            const id = el.id ? '#' + el.id : '';
            small.push({ selector: tag + id, width: r.width, height: r.height });
            if (small.length >= 10) break;
        }
    }
    return { small_targets: small, total_targets: total };
}";

/// Layout-integrity check at each configured viewport: no horizontal
/// overflow, a viewport meta tag, and usable tap targets on mobile.
pub struct ResponsiveCheck;

impl ResponsiveCheck {
    async fn audit_page(
        session: &PageSession,
        viewport: Viewport,
        report: &mut PageAuditReport,
    ) -> Result<(), CheckError> {
        let layout: LayoutProbe = session.evaluate_function(LAYOUT_PROBE_JS).await?;

        if layout.scroll_width > layout.inner_width + OVERFLOW_SLACK_PX {
            report.push(Issue::check_failure(
                "horizontal-overflow",
                IssueBucket::Gating,
                format!(
                    "page scrolls horizontally at {}px ({}px content, offenders: {})",
                    layout.inner_width,
                    layout.scroll_width,
                    if layout.overflowing_selectors.is_empty() {
                        "unknown".to_string()
                    } else {
                        layout.overflowing_selectors.join(", ")
                    }
                ),
            ));
        }
        if !layout.has_viewport_meta {
            report.push(Issue::check_failure(
                "missing-viewport-meta",
                IssueBucket::Gating,
                "no <meta name=viewport> tag; mobile rendering will be scaled",
            ));
        }

        if viewport.width < 500 {
            let taps: TapTargetProbe = session.evaluate_function(TAP_TARGET_PROBE_JS).await?;
            report.set_extra(
                "interactive_elements",
                serde_json::Value::from(taps.total_targets),
            );
            for target in &taps.small_targets {
                report.push(Issue::check_failure(
                    "small-tap-target",
                    IssueBucket::Advisory,
                    format!(
                        "{} is {:.0}x{:.0}px, below the {:.0}px minimum",
                        target.selector, target.width, target.height, MIN_TAP_TARGET_PX
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CheckScenario for ResponsiveCheck {
    fn id(&self) -> &str {
        "responsive"
    }

    fn description(&self) -> &str {
        "Verifies layout integrity at each configured viewport"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Responsive
    }

    async fn run(
        &self,
        driver: &BrowserDriver,
        ctx: &CheckContext,
    ) -> Result<Vec<CheckOutcome>, CheckError> {
        let viewports = parse_viewports(ctx.env.responsive_viewports.as_deref());
        let pages = ctx.sampled_pages(None);
        let mut outcomes = Vec::with_capacity(viewports.len());

        for viewport in viewports {
            let session = driver.new_session().await?;
            session.set_viewport(viewport).await?;

            let mut reports = Vec::with_capacity(pages.len());
            let mut errors = Vec::new();

            for page_path in &pages {
                let mut report = PageAuditReport::new(page_path.clone());
                let url = ctx.site.page_url(page_path);

                if let Err(e) = session.navigate(&url).await {
                    report.push(Issue::check_failure(
                        "page-unreachable",
                        IssueBucket::Gating,
                        format!("could not open {}: {}", url, e),
                    ));
                    errors.push(e.to_string());
                    reports.push(report);
                    continue;
                }
                session.wait_for_stable(Duration::from_secs(10)).await;

                if let Err(e) = Self::audit_page(&session, viewport, &mut report).await {
                    warn!(page = %page_path, viewport = viewport.name, error = %e, "layout probe failed");
                    report.push(Issue::check_failure(
                        "probe-failed",
                        IssueBucket::Gating,
                        format!("layout measurement failed: {}", e),
                    ));
                    errors.push(e.to_string());
                }
                reports.push(report);
            }
            session.close().await.ok();

            let gating: usize = reports.iter().map(PageAuditReport::gating_count).sum();
            let status = gate_status(gating, 0, A11yMode::Gate);
            let attachments = summary_attachments("responsive", viewport.name, &reports);

            outcomes.push(CheckOutcome {
                project: viewport.name.to_string(),
                pages: reports,
                attachments,
                status,
                errors,
            });
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_probe_deserializes() {
        let json = serde_json::json!({
            "scroll_width": 1310.0,
            "inner_width": 1280.0,
            "has_viewport_meta": true,
            "overflowing_selectors": ["div.hero"],
        });
        let probe: LayoutProbe = serde_json::from_value(json).unwrap();
        assert!(probe.scroll_width > probe.inner_width + OVERFLOW_SLACK_PX);
        assert_eq!(probe.overflowing_selectors, vec!["div.hero"]);
    }

    #[test]
    fn tap_target_probe_deserializes() {
        let json = serde_json::json!({
            "small_targets": [{"selector": "a#close", "width": 16.0, "height": 16.0}],
            "total_targets": 42,
        });
        let probe: TapTargetProbe = serde_json::from_value(json).unwrap();
        assert_eq!(probe.total_targets, 42);
        assert!(probe.small_targets[0].width < MIN_TAP_TARGET_PX);
    }
}
