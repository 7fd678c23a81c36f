//! # presscheck
//!
//! Binary entry point for the presscheck QA suite.
//!
//! This crate provides:
//! - CLI argument parsing using `clap`
//! - The check runner entry point (`presscheck run`)
//! - Page-list resolution via `presscheck discover`
//! - Report archiving and opening via `presscheck report`
//! - Deployment polling via `presscheck wait-url`
//! - Browser provisioning via `presscheck install-browsers`

mod install;
mod reports;
mod wait_url;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use presscheck_browser::DriverConfig;
use presscheck_checks::{default_checks, run_site, RunOptions};
use presscheck_core::{EnvOptions, SiteLoader, TestStatus};
use std::path::PathBuf;
use std::time::Duration;

/// presscheck - end-to-end QA suite for WordPress sites
#[derive(Parser, Debug)]
#[command(name = "presscheck", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the sites configuration file
    #[arg(short, long, default_value = "sites.yml", global = true)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the check suite against a configured site
    Run(RunArgs),

    /// Resolve and print the page list for a site without running checks
    Discover(DiscoverArgs),

    /// Manage generated reports
    Report(ReportArgs),

    /// Poll a URL until it answers without a server error
    WaitUrl(WaitUrlArgs),

    /// Download the Chromium build the suite drives
    InstallBrowsers(InstallArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Site to test, as named in the sites file
    #[arg(long, env = "SITE_NAME")]
    site: Option<String>,

    /// Smoke mode: sample one page per check
    #[arg(long)]
    smoke: bool,

    /// Only run the named checks (a11y, visual, responsive, interaction, http)
    #[arg(long = "filter", value_name = "CHECK")]
    filter: Vec<String>,

    /// Viewports for the visual and responsive checks (comma list or "all")
    #[arg(long)]
    viewports: Option<String>,

    /// Root directory for report output
    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,

    /// Rewrite visual baselines instead of comparing against them
    #[arg(long)]
    update_baselines: bool,

    /// List the available checks and exit
    #[arg(long)]
    list: bool,

    /// Run with a visible browser window
    #[arg(long)]
    headed: bool,
}

#[derive(Parser, Debug)]
struct DiscoverArgs {
    /// Site to resolve, as named in the sites file
    #[arg(long, env = "SITE_NAME")]
    site: Option<String>,
}

#[derive(Parser, Debug)]
struct ReportArgs {
    #[command(subcommand)]
    command: ReportCommands,

    /// Root directory the reports live under
    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum ReportCommands {
    /// Zip the newest report directory into reports/archives/
    Archive,

    /// Open the newest report(s) in a local browser
    Open {
        /// How many of the most recent reports to open
        #[arg(long, default_value_t = 1)]
        last: usize,
    },
}

#[derive(Parser, Debug)]
struct WaitUrlArgs {
    /// URL to poll
    url: String,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Seconds between probes
    #[arg(long, default_value_t = 2)]
    interval: u64,
}

#[derive(Parser, Debug)]
struct InstallArgs {
    /// Browser cache directory (falls back to BROWSER_CACHE_DIR)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

fn resolve_site_name(flag: Option<String>, env: &EnvOptions) -> Result<String> {
    flag.or_else(|| env.site_name.clone())
        .context("no site selected: pass --site or set SITE_NAME")
}

fn status_icon(status: TestStatus) -> colored::ColoredString {
    match status {
        TestStatus::Passed => "✅".green(),
        TestStatus::Failed | TestStatus::TimedOut | TestStatus::Interrupted => "❌".red(),
        TestStatus::Flaky => "⚠️".yellow(),
        TestStatus::Skipped | TestStatus::Unknown => "ℹ️".blue(),
    }
}

async fn run_command(config: PathBuf, args: RunArgs) -> Result<()> {
    if args.list {
        println!("{}", "Available checks:".bold());
        for check in default_checks() {
            println!("  {:<12} {}", check.id(), check.description());
        }
        return Ok(());
    }

    let mut env = EnvOptions::from_env();
    if args.smoke {
        env.smoke = true;
    }
    if let Some(viewports) = &args.viewports {
        env.visual_viewports = Some(viewports.clone());
        env.responsive_viewports = Some(viewports.clone());
    }
    let site_name = resolve_site_name(args.site, &env)?;

    let loader = SiteLoader::from_file(&config)
        .with_context(|| format!("could not load {}", config.display()))?;
    let site = loader.site(&site_name)?;

    let options = RunOptions {
        baseline_dir: args.report_dir.join("baselines"),
        report_root: args.report_dir,
        update_baselines: args.update_baselines,
        only: args.filter,
        driver: DriverConfig {
            headless: !args.headed,
            ..DriverConfig::default()
        },
    };
    let checks = default_checks();

    println!(
        "{} testing {} ({})",
        "ℹ️".blue(),
        site.name.bold(),
        site.base_url
    );
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message("running checks...");

    let report = run_site(site, env, &checks, &options).await?;
    spinner.finish_and_clear();

    for test in &report.summary.tests {
        println!("  {} {}", status_icon(test.status), test.title);
        for error in &test.errors {
            println!("      {}", error.dimmed());
        }
    }
    let counts = report.summary.status_counts();
    let failed = counts.get(&TestStatus::Failed).copied().unwrap_or(0);
    println!(
        "\n{} checks, {} failed — report: {}",
        report.summary.total_tests(),
        failed,
        report.report_html.display()
    );

    if report.passed() {
        println!("{} all checks passed", "✅".green());
        Ok(())
    } else {
        bail!("{} check(s) failed", failed);
    }
}

fn discover_command(config: PathBuf, args: DiscoverArgs) -> Result<()> {
    let env = EnvOptions::from_env();
    let site_name = resolve_site_name(args.site, &env)?;
    let loader = SiteLoader::from_file(&config)
        .with_context(|| format!("could not load {}", config.display()))?;
    let site = loader.site(&site_name)?;

    println!("{} pages for {}:", site.test_pages.len(), site.name.bold());
    for page in &site.test_pages {
        println!("  {}", site.page_url(page));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match cli.command {
        Commands::Run(args) => run_command(cli.config, args).await,
        Commands::Discover(args) => discover_command(cli.config, args),
        Commands::Report(args) => match args.command {
            ReportCommands::Archive => {
                let archive = reports::archive_latest(&args.report_dir)?;
                println!("{} archived to {}", "✅".green(), archive.display());
                Ok(())
            }
            ReportCommands::Open { last } => {
                let env = EnvOptions::from_env();
                reports::open_latest(
                    &args.report_dir,
                    last,
                    env.report_browser.as_deref(),
                    &env.report_browser_args,
                )?;
                Ok(())
            }
        },
        Commands::WaitUrl(args) => {
            wait_url::wait_for_url(
                &args.url,
                Duration::from_secs(args.timeout),
                Duration::from_secs(args.interval.max(1)),
            )
            .await?;
            println!("{} {} is up", "✅".green(), args.url);
            Ok(())
        }
        Commands::InstallBrowsers(args) => install::install_browsers(args.cache_dir.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_with_filters() {
        let cli = Cli::parse_from([
            "presscheck",
            "run",
            "--site",
            "blog",
            "--smoke",
            "--filter",
            "a11y",
            "--filter",
            "visual",
            "--viewports",
            "mobile,desktop",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.site.as_deref(), Some("blog"));
        assert!(args.smoke);
        assert_eq!(args.filter, vec!["a11y", "visual"]);
        assert_eq!(args.viewports.as_deref(), Some("mobile,desktop"));
    }

    #[test]
    fn cli_parses_report_open_last() {
        let cli = Cli::parse_from(["presscheck", "report", "open", "--last", "3"]);
        let Commands::Report(args) = cli.command else {
            panic!("expected report");
        };
        let ReportCommands::Open { last } = args.command else {
            panic!("expected open");
        };
        assert_eq!(last, 3);
    }

    #[test]
    fn site_name_flag_beats_environment() {
        let env = EnvOptions {
            site_name: Some("from-env".to_string()),
            ..EnvOptions::default()
        };
        assert_eq!(
            resolve_site_name(Some("from-flag".to_string()), &env).unwrap(),
            "from-flag"
        );
        assert_eq!(resolve_site_name(None, &env).unwrap(), "from-env");
        assert!(resolve_site_name(None, &EnvOptions::default()).is_err());
    }
}
