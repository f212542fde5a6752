//! # Pipeline
//!
//! Runs everything for a project root:
//!
//! ```text
//! sequel/<conn>/migration/*.sql ──► parse ──► Connection
//! sequel.yml ──────────────────────► load, reconcile, save
//!                                        │
//!   for each connection, in name order:  ▼
//!     schema ─► models ─► queriers ─► sqlc generate ─► rewrite
//! ```
//!
//! Environment errors (missing `sequel/`, unreadable or unwritable files)
//! abort the run. Every other failure is recorded against its connection
//! and the pipeline moves on to the next one.

use crate::generator::Generator;
use crate::rewrite::{RewriteSummary, Rewriter};
use crate::GeneratorConfig;
use polygon_core::{EngineError, EngineResult};
use polygon_ir::{CONFIG_FILE, Config, Connection, SqlcConfig, discover};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info, warn};

// ============================================================================
// Options
// ============================================================================

/// Options of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Project root containing `sequel/` and `sequel.yml`
    pub root: PathBuf,

    /// Connections to generate; empty means all of them
    pub connections: Vec<String>,

    /// Skip the downstream generator and the rewriter
    pub skip_downstream: bool,

    /// Downstream generator executable
    pub sqlc_bin: String,

    /// Output subdirectory whose files get prefixed identifiers
    pub prefixed_dir: Option<String>,

    /// Identifier prefix for that subdirectory
    pub prefix: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            connections: Vec::new(),
            skip_downstream: false,
            sqlc_bin: "sqlc".to_string(),
            prefixed_dir: Some("polygon".to_string()),
            prefix: "P".to_string(),
        }
    }
}

impl PipelineOptions {
    /// Default options for a project root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    fn selects(&self, connection: &str) -> bool {
        self.connections.is_empty() || self.connections.iter().any(|c| c == connection)
    }
}

// ============================================================================
// Report
// ============================================================================

/// Outcome of one connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionReport {
    pub name: String,
    pub tables: usize,
    pub files_written: usize,
    pub files_unchanged: usize,
    /// Downstream files changed by the rewriter
    pub rewritten: usize,
    pub warnings: Vec<String>,
    /// Failure that stopped this connection
    pub error: Option<String>,
}

impl ConnectionReport {
    fn new(connection: &Connection) -> Self {
        Self {
            name: connection.name.clone(),
            tables: connection.table_count(),
            ..Self::default()
        }
    }

    /// Whether the connection was generated without failure
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// One entry per connection, in processing order
    pub connections: Vec<ConnectionReport>,

    /// Whether `sequel.yml` was rewritten by reconciliation
    pub config_updated: bool,
}

impl PipelineReport {
    /// Connections that failed
    pub fn failures(&self) -> impl Iterator<Item = &ConnectionReport> {
        self.connections.iter().filter(|c| !c.succeeded())
    }

    /// Total files written across connections
    pub fn files_written(&self) -> usize {
        self.connections.iter().map(|c| c.files_written).sum()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// The end-to-end generation run
#[derive(Debug, Clone)]
pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run the pipeline over every selected connection.
    pub fn run(&self) -> EngineResult<PipelineReport> {
        let root = &self.options.root;
        let mut report = PipelineReport::default();

        // ── 1. Discover and parse ────────────────────────────────────────
        let mut connections = Vec::new();
        for source in discover(root)? {
            if !self.options.selects(&source.name) {
                debug!(connection = %source.name, "Not selected");
                continue;
            }
            connections.push(source.load()?);
        }

        // ── 2. Reconcile configuration ───────────────────────────────────
        let config_path = root.join(CONFIG_FILE);
        let mut config = Config::load(&config_path)?;
        if config.reconcile(&connections) {
            config.save(&config_path)?;
            report.config_updated = true;
        }
        for connection in &mut connections {
            if let Some(conn_config) = config.connection(&connection.name) {
                connection.dialect = conn_config.dialect().to_string();
            }
        }

        // ── 3. Downstream configuration ──────────────────────────────────
        let sqlc = SqlcConfig::discover(root)?;

        // ── 4. Generate each connection ──────────────────────────────────
        let generator = Generator::new(GeneratorConfig::for_root(root));
        for connection in &connections {
            let mut entry = ConnectionReport::new(connection);
            match self.run_connection(&generator, connection, &config, sqlc.as_ref(), &mut entry) {
                Ok(()) => {}
                Err(e) if e.is_environment() => return Err(e),
                Err(e) => {
                    warn!(connection = %connection.name, "{}", e);
                    entry.error = Some(e.to_string());
                }
            }
            report.connections.push(entry);
        }

        info!(
            connections = report.connections.len(),
            written = report.files_written(),
            "Pipeline complete"
        );
        Ok(report)
    }

    fn run_connection(
        &self,
        generator: &Generator,
        connection: &Connection,
        config: &Config,
        sqlc: Option<&SqlcConfig>,
        entry: &mut ConnectionReport,
    ) -> EngineResult<()> {
        info!(connection = %connection.name, "Generating");
        let summary = generator.generate_and_write(connection, config, sqlc)?;
        entry.files_written = summary.written;
        entry.files_unchanged = summary.unchanged;
        entry.warnings = summary.warnings;

        if self.options.skip_downstream {
            return Ok(());
        }
        let Some(sqlc) = sqlc else {
            debug!(connection = %connection.name, "No downstream configuration; skipping sqlc");
            return Ok(());
        };

        self.run_downstream(sqlc)?;
        let rewriter = Rewriter::new(self.options.prefixed_dir.clone(), &self.options.prefix);
        let mut rewritten = RewriteSummary::default();
        for dir in sqlc.output_dirs() {
            rewritten.merge(rewriter.rewrite_dir(&dir)?);
        }
        entry.rewritten = rewritten.rewritten;
        Ok(())
    }

    /// `sqlc generate`, run from the directory holding its configuration
    fn run_downstream(&self, sqlc: &SqlcConfig) -> EngineResult<()> {
        let program = &self.options.sqlc_bin;
        debug!(program = %program, dir = %sqlc.dir().display(), "Running downstream generator");

        let output = Command::new(program)
            .arg("generate")
            .current_dir(sqlc.dir())
            .output()
            .map_err(|e| EngineError::Downstream {
                program: program.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EngineError::Downstream {
                program: program.clone(),
                message: if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    stderr
                },
            });
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn project(dir: &Path) {
        let migrations = dir.join("sequel/main/migration");
        fs::create_dir_all(&migrations).unwrap();
        fs::write(
            migrations.join("001_users.sql"),
            "CREATE TABLE users (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL, email TEXT);\n",
        )
        .unwrap();
        fs::write(
            migrations.join("002_posts.sql"),
            "CREATE TABLE posts (id BIGSERIAL PRIMARY KEY, user_id BIGINT REFERENCES users(id), body TEXT);\n",
        )
        .unwrap();
    }

    fn options(dir: &Path) -> PipelineOptions {
        PipelineOptions {
            skip_downstream: true,
            ..PipelineOptions::new(dir)
        }
    }

    #[test]
    fn test_run_generates_and_reconciles() {
        let dir = TempDir::new().unwrap();
        project(dir.path());

        let report = Pipeline::new(options(dir.path())).run().unwrap();
        assert!(report.config_updated);
        assert_eq!(report.connections.len(), 1);
        assert_eq!(report.connections[0].tables, 2);
        assert_eq!(report.connections[0].files_written, 5);

        let out = dir.path().join("generate/polygon");
        assert!(out.join("sequel/main.sql").is_file());
        assert!(out.join("sequel/main/users.sql").is_file());
        assert!(out.join("model/main.post.go").is_file());

        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        let users = config.table("main", "users").unwrap();
        assert_eq!(users.include("email"), Some("base"));
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let dir = TempDir::new().unwrap();
        project(dir.path());
        Pipeline::new(options(dir.path())).run().unwrap();

        let report = Pipeline::new(options(dir.path())).run().unwrap();
        assert!(!report.config_updated);
        assert_eq!(report.files_written(), 0);
        assert_eq!(report.connections[0].files_unchanged, 5);
    }

    #[test]
    fn test_config_error_is_per_connection() {
        let dir = TempDir::new().unwrap();
        project(dir.path());
        let other = dir.path().join("sequel/audit/migration");
        fs::create_dir_all(&other).unwrap();
        fs::write(other.join("001.sql"), "CREATE TABLE events (id BIGSERIAL PRIMARY KEY);").unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "connections:\n  audit:\n    tables:\n      events:\n        fields:\n          ghost: { include: base }\n",
        )
        .unwrap();

        let report = Pipeline::new(options(dir.path())).run().unwrap();
        assert_eq!(report.connections.len(), 2);
        assert!(report.connections[0].error.as_deref().unwrap().contains("ghost"));
        assert!(report.connections[1].succeeded());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_missing_sequel_dir_aborts() {
        let dir = TempDir::new().unwrap();
        let err = Pipeline::new(options(dir.path())).run().unwrap_err();
        assert!(err.is_environment());
    }

    #[test]
    fn test_connection_filter() {
        let dir = TempDir::new().unwrap();
        project(dir.path());
        let options = PipelineOptions {
            connections: vec!["other".into()],
            ..options(dir.path())
        };
        let report = Pipeline::new(options).run().unwrap();
        assert!(report.connections.is_empty());
    }

    #[test]
    fn test_downstream_failure_is_recorded() {
        let dir = TempDir::new().unwrap();
        project(dir.path());
        fs::write(
            dir.path().join("sqlc.yaml"),
            "version: \"2\"\nsql:\n  - gen:\n      go:\n        out: generate/polygon\n",
        )
        .unwrap();
        let options = PipelineOptions {
            skip_downstream: false,
            sqlc_bin: "polygon-missing-sqlc-binary".into(),
            ..PipelineOptions::new(dir.path())
        };

        let report = Pipeline::new(options).run().unwrap();
        let error = report.connections[0].error.as_deref().unwrap();
        assert!(error.contains("polygon-missing-sqlc-binary"));
        assert!(dir.path().join("generate/polygon/sequel/main.sql").is_file());
    }
}
