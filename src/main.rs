use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nuget_package_scanner::config::{self, ScanConfig};
use nuget_package_scanner::github::GithubClient;
use nuget_package_scanner::http::HttpClient;
use nuget_package_scanner::{logging, scan};

#[derive(Parser)]
#[command(name = "nuget-package-scanner")]
#[command(
    version,
    about = "Report the NuGet packages referenced across a GitHub organization"
)]
struct Cli {
    /// Enable debug logging for the scanner
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan every repository of an organization
    Scan {
        /// GitHub organization to scan
        #[arg(long)]
        org: String,

        /// GitHub token with code search access
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Write the report as CSV to this path
        #[arg(long)]
        output: Option<PathBuf>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the current GitHub rate limits
    RateLimit {
        /// GitHub token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ScanConfig> {
    match path {
        Some(path) => ScanConfig::from_file(path),
        None => Ok(ScanConfig::default()),
    }
}

async fn run_scan(
    org: &str,
    token: Option<&str>,
    output: Option<&Path>,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let report = scan::build_org_report(org, token.unwrap_or_default(), &config).await?;

    if let Some(path) = output {
        scan::write_csv(&report.containers, path)?;
    }

    println!(
        "Scanned {} container(s) with {} package reference(s) in {:.1}s; {} container(s) and {} package(s) failed",
        report.containers.len(),
        report.package_count(),
        report.elapsed.as_secs_f64(),
        report.failed_containers.len(),
        report.failed_packages.len()
    );
    Ok(())
}

async fn show_rate_limit(token: Option<&str>, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let http = Arc::new(HttpClient::new(config.http.settings()));
    let github = GithubClient::with_base_url(
        Arc::clone(&http),
        token.unwrap_or_default(),
        &config.github.api_url,
    )?;

    let info = github.rate_limit().await;
    http.close();

    println!("{}", info.context("Failed to read GitHub rate limits")?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init_logging(cli.verbose, &config::log_path());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Command::Scan {
            org,
            token,
            output,
            config,
        } => runtime.block_on(run_scan(
            &org,
            token.as_deref(),
            output.as_deref(),
            config.as_deref(),
        )),
        Command::RateLimit { token, config } => {
            runtime.block_on(show_rate_limit(token.as_deref(), config.as_deref()))
        }
    }
}
