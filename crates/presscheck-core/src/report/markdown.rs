//! Markdown summary fragments and their HTML renderings.
//!
//! Each check attaches a `<base>.md` / `<base>.html` pair per run, where
//! `base` is a slug of the check name, summary type, and project/page
//! identifiers. The Markdown table is the canonical form; the HTML variant
//! is produced from it with pulldown-cmark.

use crate::pages::slugify;
use crate::policy::PageAuditReport;
use pulldown_cmark::{html, Options, Parser};
use std::fmt::Write as _;

/// Renders a Markdown fragment to HTML (tables enabled).
#[must_use]
pub fn render_markdown_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Base name for a check's attachment pair.
///
/// # Examples
///
/// ```
/// use presscheck_core::attachment_base_name;
///
/// assert_eq!(
///     attachment_base_name("accessibility", "summary", "desktop"),
///     "accessibility-summary-desktop"
/// );
/// ```
#[must_use]
pub fn attachment_base_name(check: &str, summary_type: &str, project: &str) -> String {
    slugify(&format!("{} {} {}", check, summary_type, project))
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Builds the per-check Markdown summary table over all visited pages.
#[must_use]
pub fn audit_summary_markdown(check: &str, reports: &[PageAuditReport]) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "## {} summary", check);
    md.push('\n');
    md.push_str("| Page | Gating | Advisory | Best practice |\n");
    md.push_str("| --- | ---: | ---: | ---: |\n");
    for report in reports {
        let _ = writeln!(
            md,
            "| `{}` | {} | {} | {} |",
            escape_cell(&report.page),
            report.gating.len(),
            report.advisories.len(),
            report.best_practice.len()
        );
    }

    let detailed: Vec<_> = reports.iter().filter(|r| !r.gating.is_empty()).collect();
    if !detailed.is_empty() {
        md.push_str("\n### Gating issues\n\n");
        md.push_str("| Page | Rule | Impact | Detail |\n");
        md.push_str("| --- | --- | --- | --- |\n");
        for report in detailed {
            for issue in &report.gating {
                let impact = issue
                    .impact
                    .map_or_else(|| "-".to_string(), |i| i.to_string());
                let _ = writeln!(
                    md,
                    "| `{}` | {} | {} | {} |",
                    escape_cell(&report.page),
                    escape_cell(&issue.rule_id),
                    impact,
                    escape_cell(&issue.message)
                );
            }
        }
    }
    md
}
