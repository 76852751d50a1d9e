// SPDX-License-Identifier: PMPL-1.0-or-later
//! a11yscan CLI - run the accessibility rule engine over HTML snapshots.
//!
//! Drives the full engine through the bundled static facade; point a
//! WebDriver/CDP facade at the library API for live-browser scans.

use a11yscan::aggregator::{run_scan, CancelToken};
use a11yscan::config::ScanConfig;
use a11yscan::report::{generate_report, OutputFormat};
use a11yscan::static_dom::StaticDom;
use a11yscan::result::TestResult;
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// WCAG accessibility rule engine for HTML pages
#[derive(Parser)]
#[command(name = "a11yscan")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full scan on one HTML file
    Scan {
        /// HTML file to scan
        file: PathBuf,

        /// Skip the CSS rule family
        #[arg(long)]
        no_css: bool,

        /// Skip the JS rule family
        #[arg(long)]
        no_js: bool,

        /// Configuration file (JSON or YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: FormatArg,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(long, short)]
        verbose: bool,
    },

    /// Scan every HTML file under a directory
    Crawl {
        /// Directory to crawl
        dir: PathBuf,

        /// Configuration file (JSON or YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: FormatArg,

        /// Enable verbose logging
        #[arg(long, short)]
        verbose: bool,
    },

    /// Generate a SARIF report for one HTML file
    Report {
        /// HTML file to scan
        file: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(long, short)]
        verbose: bool,
    },
}

/// Output format CLI argument
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Human-readable text
    Text,
    /// Structured JSON
    Json,
    /// SARIF for IDE/CI
    Sarif,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Sarif => OutputFormat::Sarif,
        }
    }
}

/// Directories never worth crawling
const SKIP_DIRS: &[&str] = &["node_modules", ".git", "target", "dist", "build", "vendor"];

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("a11yscan=debug")
    } else {
        EnvFilter::new("a11yscan=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>, no_css: bool, no_js: bool) -> anyhow::Result<ScanConfig> {
    let mut config = match path {
        Some(p) => ScanConfig::load(p)
            .with_context(|| format!("loading config from {}", p.display()))?,
        None => ScanConfig::default(),
    };
    if no_css {
        config.css_testing = false;
    }
    if no_js {
        config.js_testing = false;
    }
    Ok(config)
}

fn scan_file(file: &Path, config: &ScanConfig) -> anyhow::Result<TestResult> {
    let dom = StaticDom::from_file(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let page_id = file.display().to_string();
    run_scan(&page_id, &dom, config, &CancelToken::new())
        .with_context(|| format!("scanning {}", file.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { file, no_css, no_js, config, format, output, verbose } => {
            init_logging(verbose);
            let config = load_config(config.as_deref(), no_css, no_js)?;
            let result = scan_file(&file, &config)?;
            let report = generate_report(&result, format.into());
            write_output(&report, output.as_deref())?;

            if result.has_critical_violations() {
                std::process::exit(1);
            }
        }

        Commands::Crawl { dir, config, format, verbose } => {
            init_logging(verbose);
            let config = load_config(config.as_deref(), false, false)?;
            let mut any_critical = false;

            for entry in WalkDir::new(&dir)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| {
                    let name = e.file_name().to_str().unwrap_or("");
                    if e.file_type().is_dir() {
                        return !SKIP_DIRS.contains(&name) && !name.starts_with('.');
                    }
                    true
                })
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                if !matches!(ext, "html" | "htm") {
                    continue;
                }

                match scan_file(path, &config) {
                    Ok(result) => {
                        any_critical |= result.has_critical_violations();
                        println!("{}", generate_report(&result, format.into()));
                    }
                    Err(e) => eprintln!("Skipping {}: {:#}", path.display(), e),
                }
            }

            if any_critical {
                std::process::exit(1);
            }
        }

        Commands::Report { file, output, verbose } => {
            init_logging(verbose);
            let config = ScanConfig::default();
            let result = scan_file(&file, &config)?;
            let report = generate_report(&result, OutputFormat::Sarif);
            write_output(&report, output.as_deref())?;
        }
    }

    Ok(())
}

/// Write output to file or stdout
fn write_output(content: &str, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(p) => {
            std::fs::write(p, content)?;
            eprintln!("Report written to {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
