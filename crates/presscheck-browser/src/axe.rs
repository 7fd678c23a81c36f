//! axe-core scanner integration.
//!
//! The ruleset itself is third-party: the runner injects the axe-core
//! bundle (loaded from a configurable path) into the page, invokes
//! `axe.run()`, and maps the violation JSON into the core policy types.

use crate::error::{DriverError, Result};
use crate::session::PageSession;
use presscheck_core::{Impact, Violation};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the axe-core bundle relative to the working dir.
pub const DEFAULT_AXE_PATH: &str = "vendor/axe-core/axe.min.js";

/// Raw scan result subset we consume.
#[derive(Debug, Deserialize)]
struct AxeResults {
    #[serde(default)]
    violations: Vec<AxeViolation>,
}

#[derive(Debug, Deserialize)]
struct AxeViolation {
    id: String,
    impact: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    help: String,
    #[serde(default)]
    nodes: Vec<AxeNode>,
}

#[derive(Debug, Deserialize)]
struct AxeNode {
    #[serde(default)]
    html: Option<String>,
}

/// Injects and runs axe-core against the current document.
pub struct AxeRunner {
    script: String,
}

impl AxeRunner {
    /// Loads the axe-core bundle from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let script = std::fs::read_to_string(path).map_err(|e| {
            DriverError::Io(std::io::Error::new(
                e.kind(),
                format!("axe bundle at {}: {}", path.display(), e),
            ))
        })?;
        Ok(Self { script })
    }

    /// Resolves the bundle path from the environment or the default.
    #[must_use]
    pub fn default_path() -> PathBuf {
        std::env::var("AXE_CORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_AXE_PATH))
    }

    /// Runs a scan on the session's current page.
    pub async fn scan(&self, session: &PageSession) -> Result<Vec<Violation>> {
        let injected: bool = session
            .evaluate("typeof window.axe !== 'undefined'")
            .await
            .unwrap_or(false);
        if !injected {
            // evaluate the bundle itself, then confirm the global exists
            session.evaluate::<serde_json::Value>(&self.script).await.ok();
            let present: bool = session
                .evaluate("typeof window.axe !== 'undefined'")
                .await?;
            if !present {
                return Err(DriverError::Evaluation(
                    "axe-core bundle did not define window.axe".to_string(),
                ));
            }
        }

        let results: AxeResults = session
            .evaluate_function(
                "async () => await axe.run(document, { resultTypes: ['violations'] })",
            )
            .await?;
        debug!(violations = results.violations.len(), "axe scan complete");
        Ok(results.violations.into_iter().map(into_violation).collect())
    }
}

fn into_violation(raw: AxeViolation) -> Violation {
    let sample_targets = raw
        .nodes
        .iter()
        .filter_map(|n| n.html.clone())
        .take(3)
        .collect();
    Violation {
        rule_id: raw.id,
        impact: raw
            .impact
            .as_deref()
            .map_or(Impact::Minor, Impact::parse),
        tags: raw.tags,
        help: raw.help,
        node_count: raw.nodes.len(),
        sample_targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_mapping_parses_impact_and_samples() {
        let raw: AxeResults = serde_json::from_str(
            r#"{
                "violations": [{
                    "id": "image-alt",
                    "impact": "critical",
                    "tags": ["wcag2a", "wcag111"],
                    "help": "Images must have alternate text",
                    "nodes": [
                        { "html": "<img src=a.png>" },
                        { "html": "<img src=b.png>" }
                    ]
                }]
            }"#,
        )
        .unwrap();

        let violations: Vec<Violation> = raw.violations.into_iter().map(into_violation).collect();
        assert_eq!(violations.len(), 1);
        let v = &violations[0];
        assert_eq!(v.rule_id, "image-alt");
        assert_eq!(v.impact, Impact::Critical);
        assert_eq!(v.node_count, 2);
        assert_eq!(v.sample_targets.len(), 2);
        assert!(v.has_wcag_tag());
    }

    #[test]
    fn missing_impact_defaults_to_minor() {
        let raw = AxeViolation {
            id: "region".to_string(),
            impact: None,
            tags: vec!["best-practice".to_string()],
            help: String::new(),
            nodes: vec![],
        };
        assert_eq!(into_violation(raw).impact, Impact::Minor);
    }

    #[test]
    fn default_path_falls_back_without_env() {
        // AXE_CORE_PATH is not set in the test process
        assert_eq!(AxeRunner::default_path(), PathBuf::from(DEFAULT_AXE_PATH));
    }
}
