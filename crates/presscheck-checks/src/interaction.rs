//! Keyboard and form interaction check.
//!
//! Covers the basics a theme change tends to break: keyboard reachability
//! (focusable elements, skip link), configured form fill/submit with
//! factory-generated data, and animation behavior under reduced motion.

use crate::scenario::{
    CheckCategory, CheckContext, CheckError, CheckOutcome, CheckScenario, gate_status,
    summary_attachments,
};
use async_trait::async_trait;
use presscheck_browser::{BrowserDriver, PageSession};
use presscheck_core::{A11yMode, FormSpec, Issue, IssueBucket, PageAuditReport, TestDataFactory};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct KeyboardProbe {
    focusable_count: u64,
    skip_link_href: Option<String>,
    skip_link_target_exists: bool,
}

#[derive(Debug, Deserialize)]
struct MotionProbe {
    /// Animations still running while `prefers-reduced-motion` is emulated.
    running_animations: u64,
    infinite_animations: Vec<String>,
}

const KEYBOARD_PROBE_JS: &str = r"() => {
    const focusable = document.querySelectorAll(
        'a[href], button:not([disabled]), input:not([disabled]), select:not([disabled]), textarea:not([disabled]), [tabindex]:not([tabindex=\'-1\'])'
    );
    let skipHref = null;
    let targetExists = false;
    const first = document.querySelector('a[href^=\'#\']');
    if (first) {
        const href = first.getAttribute('href');
        const text = (first.textContent || '').toLowerCase();
        if (text.includes('skip')) {
            skipHref = href;
            targetExists = href.length > 1 && !!document.querySelector(href);
        }
    }
    return {
        focusable_count: focusable.length,
        skip_link_href: skipHref,
        skip_link_target_exists: targetExists,
    };
}";

const MOTION_PROBE_JS: &str = r"() => {
    const infinite = [];
    let running = 0;
    for (const anim of document.getAnimations()) {
        if (anim.playState !== 'running') continue;
        running += 1;
        const timing = anim.effect && anim.effect.getTiming ? anim.effect.getTiming() : {};
        if (timing.iterations === Infinity && infinite.length < 5) {
            const el = anim.effect && anim.effect.target;
            infinite.push(el ? el.tagName.toLowerCase() : 'unknown');
        }
    }
    return { running_animations: running, infinite_animations: infinite };
}";

/// Keyboard, form, and motion behavior on the sampled pages.
pub struct InteractionCheck;

impl InteractionCheck {
    async fn audit_keyboard(
        session: &PageSession,
        report: &mut PageAuditReport,
    ) -> Result<(), CheckError> {
        let probe: KeyboardProbe = session.evaluate_function(KEYBOARD_PROBE_JS).await?;
        report.set_extra(
            "focusable_count",
            serde_json::Value::from(probe.focusable_count),
        );

        if probe.focusable_count == 0 {
            report.push(Issue::check_failure(
                "no-focusable-elements",
                IssueBucket::Gating,
                "page has no keyboard-focusable elements",
            ));
        }
        match probe.skip_link_href {
            None => report.push(Issue::check_failure(
                "missing-skip-link",
                IssueBucket::Advisory,
                "no skip-to-content link found as the first anchor",
            )),
            Some(href) if !probe.skip_link_target_exists => {
                report.push(Issue::check_failure(
                    "broken-skip-link",
                    IssueBucket::Gating,
                    format!("skip link points to {} but no such element exists", href),
                ));
            }
            Some(_) => {}
        }
        Ok(())
    }

    async fn audit_motion(
        session: &PageSession,
        report: &mut PageAuditReport,
    ) -> Result<(), CheckError> {
        session.emulate_reduced_motion(true).await?;
        // Give CSS a tick to re-evaluate the media query.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let probe: MotionProbe = session.evaluate_function(MOTION_PROBE_JS).await?;
        session.emulate_reduced_motion(false).await?;

        if !probe.infinite_animations.is_empty() {
            report.push(Issue::check_failure(
                "motion-not-reduced",
                IssueBucket::Advisory,
                format!(
                    "{} infinite animation(s) keep running under prefers-reduced-motion ({})",
                    probe.infinite_animations.len(),
                    probe.infinite_animations.join(", ")
                ),
            ));
        }
        report.set_extra(
            "running_animations",
            serde_json::Value::from(probe.running_animations),
        );
        Ok(())
    }

    async fn exercise_form(
        session: &PageSession,
        form: &FormSpec,
        factory: &TestDataFactory,
        report: &mut PageAuditReport,
    ) {
        for (selector, template) in &form.fields {
            let value = factory.render(template);
            if let Err(e) = session.fill(selector, &value).await {
                report.push(Issue::check_failure(
                    "form-field-unfillable",
                    IssueBucket::Gating,
                    format!("could not fill {} in {}: {}", selector, form.selector, e),
                ));
                return;
            }
        }
        if !form.submit {
            debug!(form = %form.selector, "fill-only form, skipping submit");
            return;
        }
        let submit_selector = format!("{} [type=submit]", form.selector);
        if let Err(e) = session.click(&submit_selector).await {
            report.push(Issue::check_failure(
                "form-submit-failed",
                IssueBucket::Gating,
                format!("could not submit {}: {}", form.selector, e),
            ));
            return;
        }
        session.wait_for_stable(Duration::from_secs(10)).await;
    }
}

#[async_trait]
impl CheckScenario for InteractionCheck {
    fn id(&self) -> &str {
        "interaction"
    }

    fn description(&self) -> &str {
        "Exercises keyboard navigation, configured forms, and reduced motion"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Interaction
    }

    async fn run(
        &self,
        driver: &BrowserDriver,
        ctx: &CheckContext,
    ) -> Result<Vec<CheckOutcome>, CheckError> {
        let session = driver.new_session().await?;
        let pages = ctx.sampled_pages(None);
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

            if let Err(e) = Self::audit_keyboard(&session, &mut report).await {
                warn!(page = %page_path, error = %e, "keyboard probe failed");
                report.push(Issue::check_failure(
                    "probe-failed",
                    IssueBucket::Gating,
                    format!("keyboard probe failed: {}", e),
                ));
                errors.push(e.to_string());
            }
            if let Err(e) = Self::audit_motion(&session, &mut report).await {
                warn!(page = %page_path, error = %e, "motion probe failed");
                report.push(Issue::check_failure(
                    "motion-probe-failed",
                    IssueBucket::Advisory,
                    format!("reduced-motion probe failed: {}", e),
                ));
            }

            for form in ctx.site.forms.iter().filter(|f| &f.page == page_path) {
                Self::exercise_form(&session, form, &ctx.factory, &mut report).await;
            }
            reports.push(report);
        }
        session.close().await.ok();

        let gating: usize = reports.iter().map(PageAuditReport::gating_count).sum();
        let status = gate_status(gating, 0, A11yMode::Gate);
        let attachments = summary_attachments("interaction", "default", &reports);

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

    #[test]
    fn keyboard_probe_deserializes() {
        let json = serde_json::json!({
            "focusable_count": 12,
            "skip_link_href": "#main",
            "skip_link_target_exists": true,
        });
        let probe: KeyboardProbe = serde_json::from_value(json).unwrap();
        assert_eq!(probe.focusable_count, 12);
        assert_eq!(probe.skip_link_href.as_deref(), Some("#main"));
        assert!(probe.skip_link_target_exists);
    }

    #[test]
    fn motion_probe_deserializes_without_offenders() {
        let json = serde_json::json!({
            "running_animations": 0,
            "infinite_animations": [],
        });
        let probe: MotionProbe = serde_json::from_value(json).unwrap();
        assert_eq!(probe.running_animations, 0);
        assert!(probe.infinite_animations.is_empty());
    }
}
