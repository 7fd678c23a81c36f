//! Run report model and renderers.

mod html;
mod markdown;
mod model;

pub use html::{escape, render_report};
pub use markdown::{attachment_base_name, audit_summary_markdown, render_markdown_html};
pub use model::{
    Attachment, AttachmentBody, AttemptSummary, EnvironmentInfo, Location, RunSummary, TestStatus,
    TestSummary,
};
