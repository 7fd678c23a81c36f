//! # presscheck-checks
//!
//! The check scenarios (accessibility, visual regression, responsive
//! layout, interaction, HTTP integrity) and the run orchestrator that
//! executes them against a site and writes the HTML/JSON report.
//!
//! Scenarios implement [`CheckScenario`] and contain per-page failures as
//! recorded issues; the runner contains per-check failures as failed report
//! cards. A run therefore always produces a report.

mod accessibility;
mod http;
mod interaction;
mod responsive;
mod runner;
mod scenario;
mod visual;

pub use accessibility::AccessibilityCheck;
pub use http::HttpIntegrityCheck;
pub use interaction::InteractionCheck;
pub use responsive::ResponsiveCheck;
pub use runner::{
    default_checks, make_run_id, run_site, RunOptions, RunReport, RunnerError,
};
pub use scenario::{
    gate_status, summary_attachments, CheckCategory, CheckContext, CheckError, CheckOutcome,
    CheckScenario,
};
pub use visual::{apply_masks, diff_images, DiffStats, VisualCheck};
