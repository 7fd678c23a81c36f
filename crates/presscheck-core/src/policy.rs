//! Severity policy: which findings gate a run and which are advisory.
//!
//! The original suite grew several near-duplicate gating rules across its
//! check variants. Here the policy is a single function parameterized by the
//! site's accessibility configuration; every check goes through it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Impact level reported by the accessibility scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Moderate,
    Serious,
    Critical,
}

impl Impact {
    /// Parses a scanner impact string; unknown values map to `Minor`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "critical" => Impact::Critical,
            "serious" => Impact::Serious,
            "moderate" => Impact::Moderate,
            _ => Impact::Minor,
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Impact::Minor => "minor",
            Impact::Moderate => "moderate",
            Impact::Serious => "serious",
            Impact::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Where a finding lands once the policy has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueBucket {
    /// Fails the run (unless the site is in audit mode).
    Gating,
    /// Reported, WCAG-backed, but non-blocking.
    Advisory,
    /// Reported, no WCAG tag coverage; best-practice only.
    BestPractice,
}

/// Gate-or-log behavior for accessibility findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum A11yMode {
    /// Gating issues fail the run.
    #[default]
    Gate,
    /// Gating issues are logged but never fail the run.
    Audit,
}

/// Site-level accessibility policy inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct A11yPolicy {
    /// Impacts that gate the run. Empty means "serious and critical".
    #[serde(default)]
    pub fail_on: Vec<Impact>,
    /// Rule ids excluded from gating entirely.
    #[serde(default)]
    pub ignore_rules: Vec<String>,
    /// Gate or audit.
    #[serde(default)]
    pub mode: A11yMode,
}

impl A11yPolicy {
    fn gating_impacts(&self) -> &[Impact] {
        const DEFAULT: &[Impact] = &[Impact::Serious, Impact::Critical];
        if self.fail_on.is_empty() {
            DEFAULT
        } else {
            &self.fail_on
        }
    }
}

/// One violation as reported by the scanner, before policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    pub impact: Impact,
    /// Scanner tags; WCAG coverage is detected from `wcag*` prefixes.
    #[serde(default)]
    pub tags: Vec<String>,
    pub help: String,
    /// Number of DOM nodes affected.
    #[serde(default)]
    pub node_count: usize,
    /// Short HTML snippets of the first affected nodes.
    #[serde(default)]
    pub sample_targets: Vec<String>,
}

impl Violation {
    /// Whether any tag indicates WCAG coverage.
    #[must_use]
    pub fn has_wcag_tag(&self) -> bool {
        self.tags
            .iter()
            .any(|t| t.to_ascii_lowercase().starts_with("wcag"))
    }
}

/// Applies the site policy to one violation.
///
/// A violation gates when its impact is listed in `fail_on` and its rule id
/// is not ignored. Non-gating violations with WCAG tag coverage are
/// advisories; the rest are best-practice findings.
#[must_use]
pub fn classify_violation(violation: &Violation, policy: &A11yPolicy) -> IssueBucket {
    let ignored = policy
        .ignore_rules
        .iter()
        .any(|r| r.eq_ignore_ascii_case(&violation.rule_id));
    if !ignored && policy.gating_impacts().contains(&violation.impact) {
        return IssueBucket::Gating;
    }
    if violation.has_wcag_tag() {
        IssueBucket::Advisory
    } else {
        IssueBucket::BestPractice
    }
}

/// A single finding on one page, after policy.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub rule_id: String,
    pub impact: Option<Impact>,
    pub bucket: IssueBucket,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
}

impl Issue {
    /// Builds an issue from a classified scanner violation.
    #[must_use]
    pub fn from_violation(violation: &Violation, bucket: IssueBucket) -> Self {
        Self {
            rule_id: violation.rule_id.clone(),
            impact: Some(violation.impact),
            bucket,
            message: format!("{} ({} node(s))", violation.help, violation.node_count),
            targets: violation.sample_targets.clone(),
        }
    }

    /// Builds a check-level issue not backed by the scanner.
    #[must_use]
    pub fn check_failure(rule_id: &str, bucket: IssueBucket, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            impact: None,
            bucket,
            message: message.into(),
            targets: Vec::new(),
        }
    }
}

/// Per-page outcome of one check, aggregated into the run summary.
#[derive(Debug, Clone, Serialize, Default)]
pub struct PageAuditReport {
    pub page: String,
    pub gating: Vec<Issue>,
    pub advisories: Vec<Issue>,
    pub best_practice: Vec<Issue>,
    /// Check-specific extras (focusable count, overflow px, console errors…).
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extras: serde_json::Map<String, serde_json::Value>,
}

impl PageAuditReport {
    #[must_use]
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            ..Self::default()
        }
    }

    /// Records an issue into the bucket it was classified into.
    pub fn push(&mut self, issue: Issue) {
        match issue.bucket {
            IssueBucket::Gating => self.gating.push(issue),
            IssueBucket::Advisory => self.advisories.push(issue),
            IssueBucket::BestPractice => self.best_practice.push(issue),
        }
    }

    /// Adds a check-specific metric to the report.
    pub fn set_extra(&mut self, key: &str, value: serde_json::Value) {
        self.extras.insert(key.to_string(), value);
    }

    #[must_use]
    pub fn gating_count(&self) -> usize {
        self.gating.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(rule: &str, impact: Impact, tags: &[&str]) -> Violation {
        Violation {
            rule_id: rule.to_string(),
            impact,
            tags: tags.iter().map(ToString::to_string).collect(),
            help: format!("{} help", rule),
            node_count: 1,
            sample_targets: vec![],
        }
    }

    #[test]
    fn fail_on_critical_splits_serious_to_advisory() {
        let policy = A11yPolicy {
            fail_on: vec![Impact::Critical],
            ..A11yPolicy::default()
        };
        let critical = violation("image-alt", Impact::Critical, &["wcag2a", "wcag111"]);
        let serious = violation("color-contrast", Impact::Serious, &["wcag2aa"]);

        assert_eq!(classify_violation(&critical, &policy), IssueBucket::Gating);
        assert_eq!(classify_violation(&serious, &policy), IssueBucket::Advisory);
    }

    #[test]
    fn non_wcag_finding_is_best_practice() {
        let policy = A11yPolicy {
            fail_on: vec![Impact::Critical],
            ..A11yPolicy::default()
        };
        let v = violation("region", Impact::Moderate, &["best-practice"]);
        assert_eq!(classify_violation(&v, &policy), IssueBucket::BestPractice);
    }

    #[test]
    fn ignored_rule_never_gates() {
        let policy = A11yPolicy {
            fail_on: vec![Impact::Critical],
            ignore_rules: vec!["image-alt".to_string()],
            ..A11yPolicy::default()
        };
        let v = violation("image-alt", Impact::Critical, &["wcag2a"]);
        assert_eq!(classify_violation(&v, &policy), IssueBucket::Advisory);
    }

    #[test]
    fn empty_fail_on_defaults_to_serious_and_critical() {
        let policy = A11yPolicy::default();
        let serious = violation("x", Impact::Serious, &["wcag2aa"]);
        let moderate = violation("y", Impact::Moderate, &["wcag2aa"]);
        assert_eq!(classify_violation(&serious, &policy), IssueBucket::Gating);
        assert_eq!(classify_violation(&moderate, &policy), IssueBucket::Advisory);
    }

    #[test]
    fn report_buckets_issues() {
        let mut report = PageAuditReport::new("/contact");
        report.push(Issue::check_failure("overflow", IssueBucket::Gating, "34px overflow"));
        report.push(Issue::check_failure("meta", IssueBucket::Advisory, "missing viewport meta"));
        assert_eq!(report.gating_count(), 1);
        assert_eq!(report.advisories.len(), 1);
    }

    #[test]
    fn impact_parse_unknown_is_minor() {
        assert_eq!(Impact::parse("CRITICAL"), Impact::Critical);
        assert_eq!(Impact::parse("weird"), Impact::Minor);
    }
}
