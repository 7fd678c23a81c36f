//! Page-list and viewport helpers shared by the check scenarios.

use serde::{Deserialize, Serialize};

/// Deduplicates a page list and promotes the homepage to index 0.
///
/// Checks visit pages in configured order; putting `/` first means the most
/// cacheable, most linked-to page warms the browser before deeper paths run.
///
/// # Examples
///
/// ```
/// use presscheck_core::ensure_homepage_first;
///
/// let pages = vec!["/about".into(), "/".into(), "/contact".into()];
/// assert_eq!(ensure_homepage_first(pages), vec!["/", "/about", "/contact"]);
/// ```
#[must_use]
pub fn ensure_homepage_first(pages: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(pages.len() + 1);
    let had_home = pages.iter().any(|p| p == "/");
    if had_home {
        out.push("/".to_string());
    }
    for page in pages {
        if page != "/" && !out.contains(&page) {
            out.push(page);
        }
    }
    out
}

/// Resolves how many pages a check should visit.
///
/// Smoke mode always wins and clamps the sample to one page; an explicit
/// override (e.g. `A11Y_SAMPLE`) comes next; otherwise the configured
/// default applies. The result never exceeds the page-list length.
#[must_use]
pub fn resolve_sample_size(
    page_count: usize,
    configured: Option<usize>,
    override_sample: Option<usize>,
    smoke: bool,
) -> usize {
    if page_count == 0 {
        return 0;
    }
    if smoke {
        return 1;
    }
    let wanted = override_sample
        .or(configured)
        .unwrap_or(page_count)
        .max(1);
    wanted.min(page_count)
}

/// Slugifies a report-attachment base name.
///
/// Lowercases, maps runs of non-alphanumerics to single dashes, and trims
/// leading/trailing dashes. Used for the `<base>.html` / `<base>.md`
/// attachment pairs.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// A named viewport used by the visual and responsive checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Viewports available to the visual/responsive checks, narrowest first.
pub const VIEWPORTS: &[Viewport] = &[
    Viewport { name: "mobile", width: 375, height: 667 },
    Viewport { name: "tablet", width: 768, height: 1024 },
    Viewport { name: "desktop", width: 1280, height: 800 },
    Viewport { name: "wide", width: 1920, height: 1080 },
];

/// Parses a viewport selection string (`all` or a comma list of names).
///
/// Unknown names are skipped with a warning left to the caller; `None` or an
/// empty string selects the desktop viewport only.
#[must_use]
pub fn parse_viewports(selection: Option<&str>) -> Vec<Viewport> {
    match selection.map(str::trim) {
        None | Some("") => VIEWPORTS
            .iter()
            .copied()
            .filter(|v| v.name == "desktop")
            .collect(),
        Some(s) if s.eq_ignore_ascii_case("all") => VIEWPORTS.to_vec(),
        Some(s) => {
            let mut out = Vec::new();
            for name in s.split(',').map(str::trim) {
                if let Some(vp) = VIEWPORTS.iter().find(|v| v.name.eq_ignore_ascii_case(name)) {
                    if !out.contains(vp) {
                        out.push(*vp);
                    }
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homepage_promoted_and_deduped() {
        let pages = vec![
            "/about".to_string(),
            "/".to_string(),
            "/contact".to_string(),
            "/about".to_string(),
        ];
        assert_eq!(ensure_homepage_first(pages), vec!["/", "/about", "/contact"]);
    }

    #[test]
    fn homepage_absent_keeps_order() {
        let pages = vec!["/a".to_string(), "/b".to_string()];
        assert_eq!(ensure_homepage_first(pages), vec!["/a", "/b"]);
    }

    #[test]
    fn smoke_always_samples_one() {
        assert_eq!(resolve_sample_size(10, Some(5), Some(8), true), 1);
        assert_eq!(resolve_sample_size(10, None, None, true), 1);
    }

    #[test]
    fn sample_override_beats_config() {
        assert_eq!(resolve_sample_size(10, Some(5), Some(3), false), 3);
        assert_eq!(resolve_sample_size(10, Some(5), None, false), 5);
        assert_eq!(resolve_sample_size(10, None, None, false), 10);
    }

    #[test]
    fn sample_capped_by_page_count() {
        assert_eq!(resolve_sample_size(2, Some(5), None, false), 2);
        assert_eq!(resolve_sample_size(0, Some(5), None, false), 0);
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("A11y Summary: /contact page"), "a11y-summary-contact-page");
        assert_eq!(slugify("--visual--"), "visual");
    }

    #[test]
    fn viewport_parsing() {
        assert_eq!(parse_viewports(Some("all")).len(), VIEWPORTS.len());
        let picked = parse_viewports(Some("mobile, desktop"));
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].name, "mobile");
        let default = parse_viewports(None);
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].name, "desktop");
        // unknown names are skipped
        assert!(parse_viewports(Some("huge")).is_empty());
    }
}
