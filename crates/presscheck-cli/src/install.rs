//! Browser installation via the Playwright fetcher.
//!
//! Chromium builds come from the same fetcher CI uses; the cache location
//! is overridable so agents with read-only homes can point it somewhere
//! writable.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

const CACHE_ENV: &str = "BROWSER_CACHE_DIR";

/// Resolves the browser cache directory: explicit flag, then the
/// `BROWSER_CACHE_DIR` variable, then the fetcher's default.
pub fn resolve_cache_dir(flag: Option<&Path>) -> Option<std::path::PathBuf> {
    flag.map(Path::to_path_buf).or_else(|| {
        std::env::var_os(CACHE_ENV)
            .filter(|v| !v.is_empty())
            .map(std::path::PathBuf::from)
    })
}

/// Shells out to `npx playwright install chromium`, passing the exit code
/// through.
pub fn install_browsers(cache_dir: Option<&Path>) -> Result<()> {
    let mut command = std::process::Command::new("npx");
    command.args(["playwright", "install", "chromium"]);
    if let Some(dir) = resolve_cache_dir(cache_dir) {
        info!(cache = %dir.display(), "using custom browser cache");
        command.env("PLAYWRIGHT_BROWSERS_PATH", &dir);
    }

    let status = command
        .status()
        .context("could not launch the browser fetcher (is npx on PATH?)")?;
    if !status.success() {
        bail!("browser fetcher exited with {}", status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_environment() {
        let flag = Path::new("/tmp/browsers");
        assert_eq!(
            resolve_cache_dir(Some(flag)),
            Some(std::path::PathBuf::from("/tmp/browsers"))
        );
    }

    #[test]
    fn absent_everywhere_is_none() {
        // The variable is not set in the test environment.
        if std::env::var_os(CACHE_ENV).is_none() {
            assert_eq!(resolve_cache_dir(None), None);
        }
    }
}
