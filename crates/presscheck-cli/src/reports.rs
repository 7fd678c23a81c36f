//! Report directory management: listing, archiving, opening.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Run directories under the report root, newest first.
///
/// Only directories are considered; `archives/` and `baselines/` are
/// management subdirectories, not runs.
pub fn list_run_dirs(report_root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    if !report_root.exists() {
        return Ok(dirs);
    }
    for entry in std::fs::read_dir(report_root)
        .with_context(|| format!("could not read {}", report_root.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_dir() && name != "archives" && name != "baselines" {
            dirs.push(path);
        }
    }
    dirs.sort_by_key(|p| {
        std::fs::metadata(p)
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    });
    dirs.reverse();
    Ok(dirs)
}

/// Zips the newest run directory into `reports/archives/`.
///
/// Returns the archive path. Fails when there is no report to archive.
pub fn archive_latest(report_root: &Path) -> Result<PathBuf> {
    let runs = list_run_dirs(report_root)?;
    let Some(latest) = runs.first() else {
        bail!("no report directories under {}", report_root.display());
    };
    if !latest.join("report.html").exists() {
        bail!(
            "newest report directory {} has no report.html",
            latest.display()
        );
    }

    let archives = report_root.join("archives");
    std::fs::create_dir_all(&archives)
        .with_context(|| format!("could not create {}", archives.display()))?;
    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let archive_path = archives.join(format!("allure-report-{}.zip", stamp));

    let file = std::fs::File::create(&archive_path)
        .with_context(|| format!("could not create {}", archive_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(latest).sort_by_file_name() {
        let entry = entry?;
        let rel = entry.path().strip_prefix(latest)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", rel_str), options)?;
        } else {
            zip.start_file(rel_str, options)?;
            let bytes = std::fs::read(entry.path())?;
            zip.write_all(&bytes)?;
        }
    }
    zip.finish()
        .with_context(|| format!("could not finish {}", archive_path.display()))?;
    debug!(archive = %archive_path.display(), "report archived");
    Ok(archive_path)
}

fn open_in_browser(report_html: &Path, browser: Option<&str>, args: &[String]) -> Result<()> {
    match browser {
        Some(program) => {
            let status = std::process::Command::new(program)
                .args(args)
                .arg(report_html)
                .status()
                .with_context(|| format!("could not launch {}", program))?;
            if !status.success() {
                bail!("{} exited with {}", program, status);
            }
            Ok(())
        }
        None => open::that(report_html)
            .with_context(|| format!("could not open {}", report_html.display())),
    }
}

/// Opens the `report.html` of the N newest run directories.
///
/// Directories without a `report.html` are warned about and skipped. Fails
/// when no report could be opened at all.
pub fn open_latest(
    report_root: &Path,
    last: usize,
    browser: Option<&str>,
    browser_args: &[String],
) -> Result<usize> {
    let runs = list_run_dirs(report_root)?;
    if runs.is_empty() {
        bail!("no report directories under {}", report_root.display());
    }

    let mut opened = 0;
    for dir in runs.iter().take(last.max(1)) {
        let report_html = dir.join("report.html");
        if !report_html.exists() {
            warn!(dir = %dir.display(), "no report.html, skipping");
            println!(
                "{} {} has no report.html, skipping",
                "⚠️".yellow(),
                dir.display()
            );
            continue;
        }
        open_in_browser(&report_html, browser, browser_args)?;
        println!("{} opened {}", "✅".green(), report_html.display());
        opened += 1;
    }
    if opened == 0 {
        bail!("none of the {} newest report directories contained a report.html", last.max(1));
    }
    Ok(opened)
}
