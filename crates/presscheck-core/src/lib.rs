//! # presscheck-core
//!
//! Core functionality for the presscheck QA suite:
//! - Site configuration loading and validation
//! - Failure classification and bounded retry with typed recovery
//! - Severity policy (gating vs. advisory vs. best-practice)
//! - The run report model and HTML/Markdown renderers

mod config;
mod factory;
mod pages;
mod policy;
pub mod report;
mod retry;

pub use config::{
    ConfigError, EnvOptions, FormSpec, MaskRect, PerformanceBudgets, SiteConfig, SiteLoader,
    VisualOverride, validate_site_config,
};
pub use factory::{SequenceCounter, TestDataFactory};
pub use pages::{
    Viewport, VIEWPORTS, ensure_homepage_first, parse_viewports, resolve_sample_size, slugify,
};
pub use policy::{
    A11yMode, A11yPolicy, Impact, Issue, IssueBucket, PageAuditReport, Violation,
    classify_violation,
};
pub use report::{
    Attachment, AttachmentBody, AttemptSummary, EnvironmentInfo, Location, RunSummary, TestStatus,
    TestSummary, attachment_base_name, audit_summary_markdown, escape, render_markdown_html,
    render_report,
};
pub use retry::{
    Classified, ErrorClass, NoRecovery, OperationKind, Recovery, RetryConfig, RetryError,
    classify_message, is_retryable, retry_operation,
};
