//! Static HTML report renderer.
//!
//! [`render_report`] is a pure function from a [`RunSummary`] to one
//! self-contained HTML document: inline CSS, inline filter script, no
//! external resources. Rendering is best-effort per item — a malformed
//! test or attachment never prevents the rest of the report from
//! rendering. The caller writes the returned string to disk.

use super::model::{
    Attachment, AttachmentBody, AttemptSummary, RunSummary, TestStatus, TestSummary,
};
use std::fmt::Write as _;

const STYLE: &str = r#"
:root { --fail:#c0392b; --pass:#1e8e3e; --warn:#b26a00; --muted:#666; }
* { box-sizing: border-box; }
body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; margin: 0; background:#f5f6f7; color:#1c1e21; }
header { background:#fff; border-bottom:1px solid #ddd; padding:16px 24px; }
h1 { margin:0 0 4px; font-size:20px; }
.meta { color:var(--muted); font-size:13px; }
.meta dt { font-weight:600; display:inline; }
.meta dd { display:inline; margin:0 16px 0 4px; }
.cards { display:flex; gap:12px; padding:16px 24px; flex-wrap:wrap; }
.card { background:#fff; border:1px solid #ddd; border-radius:6px; padding:12px 20px; min-width:96px; text-align:center; }
.card .num { font-size:24px; font-weight:700; }
.card .lbl { font-size:12px; color:var(--muted); text-transform:uppercase; }
.controls { padding:0 24px 8px; display:flex; gap:16px; align-items:center; flex-wrap:wrap; }
.controls label { font-size:13px; margin-right:8px; user-select:none; }
.controls input[type=search] { padding:6px 10px; border:1px solid #ccc; border-radius:4px; min-width:240px; }
.tests { padding:0 24px 32px; }
.test { background:#fff; border:1px solid #ddd; border-radius:6px; margin-bottom:10px; padding:12px 16px; }
.test[data-hidden="true"] { display:none; }
.test h3 { margin:0; font-size:15px; }
.badge { display:inline-block; font-size:11px; border-radius:10px; padding:1px 8px; margin-left:6px; background:#eee; color:#333; }
.status { font-weight:700; font-size:12px; text-transform:uppercase; }
.status-passed { color:var(--pass); }
.status-failed, .status-timedOut, .status-interrupted { color:var(--fail); }
.status-flaky { color:var(--warn); }
.status-skipped, .status-unknown { color:var(--muted); }
.attempt { border-top:1px dashed #ddd; margin-top:10px; padding-top:8px; }
.attachment { margin:8px 0; }
.attachment img { max-width:100%; border:1px solid #ccc; }
.attachment pre, .io pre { background:#f0f0f0; padding:8px; border-radius:4px; overflow:auto; font-size:12px; }
.errors pre { background:#fdecea; color:#611a15; padding:8px; border-radius:4px; overflow:auto; font-size:12px; }
.omitted { color:var(--muted); font-style:italic; }
.summary-block { border-left:3px solid #ccc; padding-left:10px; margin:8px 0; }
"#;

const FILTER_SCRIPT: &str = r#"
(function () {
  var boxes = Array.prototype.slice.call(document.querySelectorAll('.status-box'));
  var search = document.getElementById('search');
  var cards = Array.prototype.slice.call(document.querySelectorAll('.test'));

  function apply() {
    var checked = boxes.filter(function (b) { return b.checked; })
                       .map(function (b) { return b.value; });
    var term = (search.value || '').toLowerCase();
    cards.forEach(function (card) {
      var statusOk = checked.length === 0 || checked.indexOf(card.dataset.status) !== -1;
      var text = card.textContent.toLowerCase();
      var searchOk = term === '' || text.indexOf(term) !== -1;
      card.dataset.hidden = (statusOk && searchOk) ? 'false' : 'true';
    });
  }

  boxes.forEach(function (b) { b.addEventListener('change', apply); });
  search.addEventListener('input', apply);
})();
"#;

/// Escapes a string for HTML text and attribute contexts.
#[must_use]
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn format_duration_ms(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

/// Renders the full report document for one run.
#[must_use]
pub fn render_report(run: &RunSummary) -> String {
    let mut html = String::with_capacity(16 * 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = write!(html, "<title>{}</title>\n", escape(&run.title));
    let _ = write!(html, "<style>{}</style>\n", STYLE);
    html.push_str("</head>\n<body>\n");

    render_header(&mut html, run);
    render_summary_cards(&mut html, run);
    render_controls(&mut html, run);
    render_tests(&mut html, run);

    let _ = write!(html, "<script>{}</script>\n", FILTER_SCRIPT);
    html.push_str("</body>\n</html>\n");
    html
}

fn render_header(html: &mut String, run: &RunSummary) {
    html.push_str("<header>\n");
    let _ = write!(html, "<h1>{}</h1>\n", escape(&run.title));

    let mut fields: Vec<(&str, String)> = Vec::new();
    let env = &run.environment;
    if let Some(v) = &env.site_name {
        fields.push(("Site", v.clone()));
    }
    if let Some(v) = &env.site_url {
        fields.push(("URL", v.clone()));
    }
    if let Some(v) = &env.profile {
        fields.push(("Profile", v.clone()));
    }
    if !run.projects.is_empty() {
        fields.push(("Projects", run.projects.join(", ")));
    }
    if let Some(v) = run.started_at {
        fields.push(("Started", v.to_rfc3339()));
    }
    if let Some(v) = run.completed_at {
        fields.push(("Completed", v.to_rfc3339()));
    }
    if let Some(ms) = run.duration_ms() {
        fields.push(("Duration", format_duration_ms(ms.max(0) as u64)));
    }
    if let Some(v) = &env.platform {
        fields.push(("Platform", v.clone()));
    }
    if let Some(v) = &env.arch {
        fields.push(("Arch", v.clone()));
    }
    if let Some(v) = &env.runtime_version {
        fields.push(("Runtime", v.clone()));
    }

    // Panel omitted entirely when no field is present.
    if !fields.is_empty() {
        html.push_str("<dl class=\"meta\">");
        for (label, value) in fields {
            let _ = write!(html, "<dt>{}</dt><dd>{}</dd>", label, escape(&value));
        }
        html.push_str("</dl>\n");
    }
    html.push_str("</header>\n");
}

fn render_summary_cards(html: &mut String, run: &RunSummary) {
    let counts = run.status_counts();
    let count = |s: TestStatus| counts.get(&s).copied().unwrap_or(0);
    let flaky = run.tests.iter().filter(|t| t.is_flaky()).count();

    html.push_str("<section class=\"cards\">\n");
    let cards = [
        ("Total", run.total_tests()),
        ("Passed", count(TestStatus::Passed)),
        ("Failed", count(TestStatus::Failed)),
        ("Skipped", count(TestStatus::Skipped)),
        ("Flaky", flaky),
    ];
    for (label, value) in cards {
        let _ = write!(
            html,
            "<div class=\"card\"><div class=\"num\">{}</div><div class=\"lbl\">{}</div></div>\n",
            value, label
        );
    }
    html.push_str("</section>\n");
}

fn render_controls(html: &mut String, run: &RunSummary) {
    let counts = run.status_counts();
    html.push_str("<section class=\"controls\">\n<span>\n");
    for status in TestStatus::DISPLAY_ORDER {
        let Some(&n) = counts.get(&status) else { continue };
        if n == 0 {
            continue;
        }
        let _ = write!(
            html,
            "<label><input type=\"checkbox\" class=\"status-box\" value=\"{status}\"> {status} ({n})</label>\n",
            status = status.label(),
        );
    }
    html.push_str("</span>\n");
    html.push_str(
        "<input type=\"search\" id=\"search\" placeholder=\"Filter tests…\" aria-label=\"Filter tests\">\n",
    );
    html.push_str("</section>\n");
}

fn render_tests(html: &mut String, run: &RunSummary) {
    html.push_str("<main class=\"tests\">\n");
    for test in &run.tests {
        render_test_card(html, test);
    }
    html.push_str("</main>\n");
}

fn render_test_card(html: &mut String, test: &TestSummary) {
    let status = test.status.label();
    let _ = write!(
        html,
        "<article class=\"test\" data-status=\"{}\" data-hidden=\"false\">\n",
        status
    );
    let _ = write!(html, "<h3>{}", escape(&test.title));
    let _ = write!(html, " <span class=\"badge\">{}</span>", escape(&test.project_name));
    if test.is_flaky() {
        html.push_str(" <span class=\"badge\">flaky</span>");
    }
    for tag in &test.tags {
        let _ = write!(html, " <span class=\"badge\">{}</span>", escape(tag));
    }
    html.push_str("</h3>\n");
    let _ = write!(
        html,
        "<div><span class=\"status status-{}\">{}</span> · {}",
        status,
        status,
        format_duration_ms(test.duration_ms)
    );
    if let Some(loc) = &test.location {
        let _ = write!(html, " · {}:{}", escape(&loc.file), loc.line);
    }
    html.push_str("</div>\n");

    for annotation in &test.annotations {
        let _ = write!(html, "<div class=\"badge\">{}</div>\n", escape(annotation));
    }
    for block in &test.summary_blocks {
        // summary blocks are pre-rendered HTML fragments, embedded as-is
        let _ = write!(html, "<div class=\"summary-block\">{}</div>\n", block);
    }

    if test.attempts.len() > 1 {
        for (index, attempt) in test.attempts.iter().enumerate() {
            render_attempt_card(html, index + 1, attempt);
        }
    } else {
        // single attempt: errors and I/O render directly on the test card
        if let Some(attempt) = test.attempts.first() {
            render_attachments(html, &attempt.attachments);
        }
        render_errors_and_io(html, &test.errors, &test.stdout, &test.stderr);
    }
    html.push_str("</article>\n");
}

fn render_attempt_card(html: &mut String, number: usize, attempt: &AttemptSummary) {
    html.push_str("<div class=\"attempt\">\n");
    let status = attempt.status.label();
    let _ = write!(
        html,
        "<div>Attempt {} · <span class=\"status status-{}\">{}</span> · {}",
        number,
        status,
        status,
        format_duration_ms(attempt.duration_ms)
    );
    if let Some(ts) = attempt.started_at {
        let _ = write!(html, " · {}", ts.to_rfc3339());
    }
    html.push_str("</div>\n");

    for summary in &attempt.summaries {
        let _ = write!(html, "<div class=\"summary-block\">{}</div>\n", summary);
    }
    render_attachments(html, &attempt.attachments);
    render_errors_and_io(html, &attempt.errors, &attempt.stdout, &attempt.stderr);
    html.push_str("</div>\n");
}

fn render_errors_and_io(html: &mut String, errors: &[String], stdout: &str, stderr: &str) {
    if !errors.is_empty() {
        html.push_str("<div class=\"errors\">\n");
        for error in errors {
            let _ = write!(html, "<pre>{}</pre>\n", escape(error));
        }
        html.push_str("</div>\n");
    }
    if !stdout.trim().is_empty() {
        let _ = write!(
            html,
            "<div class=\"io\"><details><summary>stdout</summary><pre>{}</pre></details></div>\n",
            escape(stdout)
        );
    }
    if !stderr.trim().is_empty() {
        let _ = write!(
            html,
            "<div class=\"io\"><details><summary>stderr</summary><pre>{}</pre></details></div>\n",
            escape(stderr)
        );
    }
}

fn render_attachments(html: &mut String, attachments: &[Attachment]) {
    for attachment in attachments {
        render_attachment(html, attachment);
    }
}

fn render_attachment(html: &mut String, attachment: &Attachment) {
    html.push_str("<div class=\"attachment\">\n");
    let _ = write!(html, "<div class=\"meta\">{}", escape(&attachment.name));
    if let Some(size) = attachment.size {
        let _ = write!(html, " ({} bytes)", size);
    }
    html.push_str("</div>\n");

    match &attachment.body {
        AttachmentBody::DataUri(uri) if attachment.content_type.starts_with("image/") => {
            let _ = write!(
                html,
                "<img src=\"{}\" alt=\"{}\">\n",
                escape(uri),
                escape(&attachment.name)
            );
        }
        AttachmentBody::DataUri(uri) => {
            // data present but not a renderable type: offer it as a download
            let _ = write!(
                html,
                "<a href=\"{}\" download=\"{}\">download</a>\n",
                escape(uri),
                escape(&attachment.name)
            );
        }
        AttachmentBody::Html(fragment) => {
            let _ = write!(html, "<div>{}</div>\n", fragment);
        }
        AttachmentBody::Text(text) => {
            let _ = write!(html, "<pre>{}</pre>\n", escape(text));
        }
        AttachmentBody::Base64(data) => {
            let _ = write!(html, "<pre>{}</pre>\n", escape(data));
        }
        AttachmentBody::Omitted { reason } => {
            let _ = write!(html, "<div class=\"omitted\">omitted: {}</div>\n", escape(reason));
        }
        AttachmentBody::Error(message) => {
            let _ = write!(
                html,
                "<div class=\"errors\"><pre>attachment error: {}</pre></div>\n",
                escape(message)
            );
        }
    }
    html.push_str("</div>\n");
}
