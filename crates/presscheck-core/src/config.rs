//! Site configuration loading and validation.
//!
//! Sites are defined in a YAML file (`sites.yml` by default) as a map of
//! named entries. `SITE_NAME` selects one at run time; a handful of other
//! environment variables override sampling and viewport selection without
//! touching the file.

use crate::pages::ensure_homepage_first;
use crate::policy::A11yPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Errors raised while loading or validating site configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sites file not found: {0}")]
    FileNotFound(String),

    #[error("failed to read sites file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse sites file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown site '{0}' (available: {1})")]
    UnknownSite(String, String),

    #[error("SITE_NAME is not set and no site was given")]
    SiteNameMissing,

    #[error("invalid site config for '{site}': {reason}")]
    Invalid { site: String, reason: String },
}

/// Per-page visual-threshold override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualOverride {
    pub page: String,
    /// Max percentage of differing pixels for this page.
    pub max_diff_percent: f64,
}

/// Rectangle masked out before visual comparison (menus, carousels, ads).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaskRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Performance budgets checked during navigation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceBudgets {
    /// Max milliseconds until the load event, if set.
    #[serde(default)]
    pub load_ms: Option<u64>,
    /// Max milliseconds until DOMContentLoaded, if set.
    #[serde(default)]
    pub dom_content_loaded_ms: Option<u64>,
}

/// A form the interaction check is allowed to fill and submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSpec {
    /// Page the form lives on.
    pub page: String,
    /// CSS selector for the form element.
    pub selector: String,
    /// Field selector → value template. `{seq}` is replaced with a unique
    /// sequence number by the data factory.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Whether to actually submit, or only fill and validate.
    #[serde(default)]
    pub submit: bool,
}

/// One named site under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Name is the YAML map key; filled in by the loader.
    #[serde(skip, default)]
    pub name: String,

    pub base_url: String,

    /// Paths to visit, always starting with `/`.
    pub test_pages: Vec<String>,

    /// Default max percentage of differing pixels per screenshot.
    #[serde(default = "default_visual_threshold")]
    pub visual_threshold: f64,

    /// Per-page threshold overrides.
    #[serde(default)]
    pub visual_overrides: Vec<VisualOverride>,

    /// Regions blanked before visual comparison, per page.
    #[serde(default)]
    pub dynamic_masks: BTreeMap<String, Vec<MaskRect>>,

    /// Accessibility gating policy.
    #[serde(default)]
    pub a11y: A11yPolicy,

    /// Default page sample size per check; `None` visits every page.
    #[serde(default)]
    pub sample_size: Option<usize>,

    #[serde(default)]
    pub performance_budgets: PerformanceBudgets,

    /// How many failed subresource requests a page may have before gating.
    #[serde(default)]
    pub resource_error_budget: usize,

    /// Forms the interaction check may exercise.
    #[serde(default)]
    pub forms: Vec<FormSpec>,
}

fn default_visual_threshold() -> f64 {
    0.5
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_url: String::new(),
            test_pages: Vec::new(),
            visual_threshold: default_visual_threshold(),
            visual_overrides: Vec::new(),
            dynamic_masks: BTreeMap::new(),
            a11y: A11yPolicy::default(),
            sample_size: None,
            performance_budgets: PerformanceBudgets::default(),
            resource_error_budget: 0,
            forms: Vec::new(),
        }
    }
}

impl SiteConfig {
    /// Joins a page path onto the base URL.
    #[must_use]
    pub fn page_url(&self, page: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            page.trim_start_matches('/')
        )
    }

    /// Visual threshold for one page, honoring overrides.
    #[must_use]
    pub fn threshold_for(&self, page: &str) -> f64 {
        self.visual_overrides
            .iter()
            .find(|o| o.page == page)
            .map_or(self.visual_threshold, |o| o.max_diff_percent)
    }

    /// Masks configured for one page.
    #[must_use]
    pub fn masks_for(&self, page: &str) -> &[MaskRect] {
        self.dynamic_masks.get(page).map_or(&[], Vec::as_slice)
    }
}

/// Environment-derived run options, read once at startup.
#[derive(Debug, Clone, Default)]
pub struct EnvOptions {
    pub site_name: Option<String>,
    pub smoke: bool,
    pub a11y_sample: Option<usize>,
    pub visual_viewports: Option<String>,
    pub responsive_viewports: Option<String>,
    pub report_browser: Option<String>,
    pub report_browser_args: Vec<String>,
}

impl EnvOptions {
    /// Reads the supported variables from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            site_name: non_empty("SITE_NAME"),
            smoke: non_empty("SMOKE").is_some(),
            a11y_sample: non_empty("A11Y_SAMPLE").and_then(|v| v.parse().ok()),
            visual_viewports: non_empty("VISUAL_VIEWPORTS"),
            responsive_viewports: non_empty("RESPONSIVE_VIEWPORTS"),
            report_browser: non_empty("REPORT_BROWSER"),
            report_browser_args: non_empty("REPORT_BROWSER_ARGS")
                .map(|v| v.split_whitespace().map(ToString::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

/// Loads named site definitions from a YAML file.
pub struct SiteLoader {
    sites: BTreeMap<String, SiteConfig>,
}

impl SiteLoader {
    /// Reads and parses a sites file. Validation happens per site on
    /// [`SiteLoader::site`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Parses sites from a YAML string.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let mut sites: BTreeMap<String, SiteConfig> = serde_yaml::from_str(raw)?;
        for (name, site) in &mut sites {
            site.name = name.clone();
        }
        Ok(Self { sites })
    }

    /// Names of all configured sites.
    #[must_use]
    pub fn site_names(&self) -> Vec<String> {
        self.sites.keys().cloned().collect()
    }

    /// Returns a validated site, with its page list normalized
    /// (deduplicated, homepage first).
    pub fn site(&self, name: &str) -> Result<SiteConfig, ConfigError> {
        let mut site = self
            .sites
            .get(name)
            .cloned()
            .ok_or_else(|| {
                ConfigError::UnknownSite(name.to_string(), self.site_names().join(", "))
            })?;
        validate_site_config(&site)?;
        site.test_pages = ensure_homepage_first(site.test_pages);
        Ok(site)
    }
}

/// Validates one site definition. Must pass before any check runs.
pub fn validate_site_config(site: &SiteConfig) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        site: site.name.clone(),
        reason,
    };

    let url = Url::parse(&site.base_url)
        .map_err(|e| invalid(format!("base_url '{}' does not parse: {}", site.base_url, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("base_url scheme must be http(s), got '{}'", url.scheme())));
    }

    if site.test_pages.is_empty() {
        return Err(invalid("test_pages must not be empty".to_string()));
    }
    for page in &site.test_pages {
        if !page.starts_with('/') {
            return Err(invalid(format!("test page '{}' must start with '/'", page)));
        }
    }

    if !(0.0..=100.0).contains(&site.visual_threshold) {
        return Err(invalid(format!(
            "visual_threshold {} out of range 0..=100",
            site.visual_threshold
        )));
    }
    for over in &site.visual_overrides {
        if !(0.0..=100.0).contains(&over.max_diff_percent) {
            return Err(invalid(format!(
                "visual override for '{}' out of range 0..=100",
                over.page
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{A11yMode, Impact};

    const SITES_YAML: &str = r#"
blog:
  base_url: "https://blog.example.com"
  test_pages: ["/about", "/", "/contact"]
  visual_threshold: 1.0
  visual_overrides:
    - page: "/"
      max_diff_percent: 3.5
  dynamic_masks:
    "/":
      - { x: 0, y: 0, width: 1280, height: 90 }
  a11y:
    fail_on: [critical]
    ignore_rules: ["region"]
    mode: audit
  sample_size: 2
  resource_error_budget: 1
  forms:
    - page: "/contact"
      selector: "form.wpcf7-form"
      fields:
        "input[name=your-name]": "QA Robot {seq}"
      submit: false
shop:
  base_url: "https://shop.example.com"
  test_pages: ["/"]
"#;

    #[test]
    fn loads_and_normalizes_site() {
        let loader = SiteLoader::from_yaml(SITES_YAML).unwrap();
        let site = loader.site("blog").unwrap();
        assert_eq!(site.name, "blog");
        assert_eq!(site.test_pages, vec!["/", "/about", "/contact"]);
        assert_eq!(site.threshold_for("/"), 3.5);
        assert_eq!(site.threshold_for("/about"), 1.0);
        assert_eq!(site.masks_for("/").len(), 1);
        assert!(site.masks_for("/about").is_empty());
        assert_eq!(site.a11y.mode, A11yMode::Audit);
        assert_eq!(site.a11y.fail_on, vec![Impact::Critical]);
    }

    #[test]
    fn defaults_applied_to_minimal_site() {
        let loader = SiteLoader::from_yaml(SITES_YAML).unwrap();
        let site = loader.site("shop").unwrap();
        assert_eq!(site.visual_threshold, 0.5);
        assert_eq!(site.a11y.mode, A11yMode::Gate);
        assert_eq!(site.resource_error_budget, 0);
        assert!(site.forms.is_empty());
    }

    #[test]
    fn unknown_site_lists_available() {
        let loader = SiteLoader::from_yaml(SITES_YAML).unwrap();
        let err = loader.site("nope").unwrap_err();
        assert!(err.to_string().contains("blog"));
    }

    #[test]
    fn page_url_joins_cleanly() {
        let loader = SiteLoader::from_yaml(SITES_YAML).unwrap();
        let site = loader.site("blog").unwrap();
        assert_eq!(site.page_url("/about"), "https://blog.example.com/about");
        assert_eq!(site.page_url("about"), "https://blog.example.com/about");
    }

    #[test]
    fn validation_rejects_bad_configs() {
        let mut site = SiteConfig {
            name: "bad".to_string(),
            base_url: "ftp://example.com".to_string(),
            test_pages: vec!["/".to_string()],
            ..SiteConfig::default()
        };
        assert!(validate_site_config(&site).is_err());

        site.base_url = "https://example.com".to_string();
        site.test_pages = vec!["about".to_string()];
        assert!(validate_site_config(&site).is_err());

        site.test_pages = vec!["/about".to_string()];
        site.visual_threshold = 250.0;
        assert!(validate_site_config(&site).is_err());

        site.visual_threshold = 0.5;
        assert!(validate_site_config(&site).is_ok());
    }
}
