//! # Polygon CLI
//!
//! Command-line interface for polygon.
//!
//! A single invocation runs the whole pipeline for every connection found
//! under `sequel/`: schema, models and queriers are generated, the
//! downstream generator is invoked and its output conformed.
//!
//! ```text
//! polygon [--root DIR] [-c NAME]... [--skip-downstream] [-v]
//! ```
//!

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use polygon_codegen::{Pipeline, PipelineOptions, PipelineReport};
use std::path::PathBuf;

// Re-export dependencies for use in main.rs
pub use polygon_codegen;
pub use polygon_core;
pub use polygon_ir;

/// CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Arguments
// ============================================================================

/// Generate schema, models and sqlc queriers from SQL migrations
#[derive(Parser, Debug, Clone)]
#[command(name = "polygon")]
#[command(version)]
pub struct Cli {
    /// Project root containing `sequel/` and `sequel.yml`
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Log every file and skipped statement
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not run the downstream generator nor the type rewriter
    #[arg(long)]
    pub skip_downstream: bool,

    /// Downstream generator executable
    #[arg(long = "sqlc", env = "POLYGON_SQLC", default_value = "sqlc")]
    pub sqlc_bin: String,

    /// Only generate these connections (repeatable)
    #[arg(short = 'c', long = "connection")]
    pub connections: Vec<String>,

    /// Output subdirectory whose files get prefixed identifiers
    #[arg(long, default_value = "polygon")]
    pub prefixed_dir: String,

    /// Prefix applied to `DBTX` and `Querier` in that subdirectory
    #[arg(long, default_value = "P")]
    pub prefix: String,
}

impl Cli {
    /// Pipeline options described by these arguments
    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            root: self.root.clone(),
            connections: self.connections.clone(),
            skip_downstream: self.skip_downstream,
            sqlc_bin: self.sqlc_bin.clone(),
            prefixed_dir: (!self.prefixed_dir.is_empty()).then(|| self.prefixed_dir.clone()),
            prefix: self.prefix.clone(),
        }
    }
}

// ============================================================================
// Run
// ============================================================================

/// Run the pipeline and print its summary.
///
/// Only environment failures are returned as errors; per-connection
/// failures are part of the report.
pub fn run(cli: &Cli) -> Result<PipelineReport> {
    let report = Pipeline::new(cli.options())
        .run()
        .with_context(|| format!("generation failed in {}", cli.root.display()))?;
    print_report(&report);
    Ok(report)
}

/// Print a colored per-connection summary
pub fn print_report(report: &PipelineReport) {
    if report.config_updated {
        println!("{} sequel.yml", "updated".cyan().bold());
    }
    if report.connections.is_empty() {
        println!("{}", "no connections to generate".yellow());
        return;
    }
    for line in summary_lines(report) {
        println!("{}", line);
    }
}

fn summary_lines(report: &PipelineReport) -> Vec<String> {
    let mut lines = Vec::new();
    for connection in &report.connections {
        match &connection.error {
            None => lines.push(format!(
                "{} {} ({} tables, {} written, {} unchanged, {} rewritten)",
                "✔".green().bold(),
                connection.name.bold(),
                connection.tables,
                connection.files_written,
                connection.files_unchanged,
                connection.rewritten
            )),
            Some(error) => lines.push(format!(
                "{} {}: {}",
                "✖".red().bold(),
                connection.name.bold(),
                error
            )),
        }
        for warning in &connection.warnings {
            lines.push(format!("  {} {}", "warning:".yellow(), warning));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use polygon_codegen::ConnectionReport;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["polygon"]);
        assert_eq!(cli.root, PathBuf::from("."));
        assert!(!cli.skip_downstream);
        assert_eq!(cli.prefix, "P");
        let options = cli.options();
        assert_eq!(options.prefixed_dir.as_deref(), Some("polygon"));
        assert!(options.connections.is_empty());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "polygon",
            "--root",
            "app",
            "-c",
            "main",
            "-c",
            "audit",
            "--skip-downstream",
            "--sqlc",
            "/opt/sqlc",
            "-v",
        ]);
        assert!(cli.verbose);
        let options = cli.options();
        assert_eq!(options.root, PathBuf::from("app"));
        assert_eq!(options.connections, vec!["main", "audit"]);
        assert!(options.skip_downstream);
        assert_eq!(options.sqlc_bin, "/opt/sqlc");
    }

    #[test]
    fn test_summary_lines() {
        colored::control::set_override(false);
        let report = PipelineReport {
            connections: vec![
                ConnectionReport {
                    name: "main".into(),
                    tables: 2,
                    files_written: 5,
                    ..ConnectionReport::default()
                },
                ConnectionReport {
                    name: "audit".into(),
                    error: Some("Field 'ghost' ...".into()),
                    warnings: vec!["skipped".into()],
                    ..ConnectionReport::default()
                },
            ],
            config_updated: false,
        };
        let lines = summary_lines(&report);
        assert_eq!(
            lines[0],
            "✔ main (2 tables, 5 written, 0 unchanged, 0 rewritten)"
        );
        assert_eq!(lines[1], "✖ audit: Field 'ghost' ...");
        assert_eq!(lines[2], "  warning: skipped");
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
