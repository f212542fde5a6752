//! # Code Generator Orchestrator
//!
//! The `Generator` is the top-level entry point for generating one
//! connection. It takes a parsed [`Connection`], the `sequel.yml`
//! [`Config`] and, when present, the downstream [`SqlcConfig`], builds a
//! [`GenerationContext`] and delegates to the schema, model and querier
//! emitters to produce a [`GeneratedProject`].
//!
//! ## Pipeline
//!
//! ```text
//! Connection + Config + SqlcConfig
//!         │
//!         ▼
//!   GenerationContext::new()
//!         │
//!         ├──► schema::generate_schema()     → sequel/{conn}.sql
//!         ├──► model::generate_model()       → model/{conn}.{singular}.go
//!         ├──► querier::generate_querier()   → sequel/{conn}/{plural}.sql
//!         │
//!         ▼
//!   GeneratedProject { files, warnings }
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use polygon_codegen::{Generator, GeneratorConfig};
//!
//! let generator = Generator::new(GeneratorConfig::for_root(root));
//! let project = generator.generate(&connection, &config, None)?;
//!
//! println!("Generated {} files", project.file_count());
//! project.write_to_disk(&generator.config().output_dir)?;
//! ```

use polygon_core::fs::read_to_string;
use polygon_core::naming::{singularize, snake};
use polygon_core::{EngineError, EngineResult, Validatable};
use polygon_ir::{Config, Connection, SqlcConfig, ValidationResult};
use tracing::{debug, info, warn};

use crate::context::GenerationContext;
use crate::model::generate_model;
use crate::querier::generate_querier;
use crate::schema::generate_schema;
use crate::{GeneratedProject, GeneratorConfig, WriteSummary};

// ============================================================================
// Generator
// ============================================================================

/// Generator for one connection at a time.
///
/// The `Generator` is stateless aside from its configuration. Call
/// [`generate`](Generator::generate) to produce every file of a connection
/// in memory, or [`generate_and_write`](Generator::generate_and_write) to
/// also write them to the output directory.
#[derive(Debug, Clone)]
pub struct Generator {
    /// Configuration controlling output behaviour
    config: GeneratorConfig,
}

impl Generator {
    // ====================================================================
    // Construction
    // ====================================================================

    /// Create a new generator with the given configuration.
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Create a generator with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(GeneratorConfig::default())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    // ====================================================================
    // Generation
    // ====================================================================

    /// Generate every file of `connection`.
    ///
    /// # Steps
    ///
    /// 1. **Validate** the parsed tables and their `sequel.yml` entries.
    /// 2. **Build** a [`GenerationContext`] with the foreign-key graph.
    /// 3. **Generate the schema** document.
    /// 4. **Generate models**, one per table, keeping user declarations
    ///    found in the files already on disk.
    /// 5. **Generate queriers**, one per table.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found by validation, an
    /// unresolvable configured join, or a failure reading an existing
    /// model file.
    pub fn generate(
        &self,
        connection: &Connection,
        config: &Config,
        sqlc: Option<&SqlcConfig>,
    ) -> EngineResult<GeneratedProject> {
        let mut project = GeneratedProject::new(&connection.name);

        // ── 1. Validate ──────────────────────────────────────────────────
        let validation = validate(connection, config);
        for warning in &validation.warnings {
            warn!(connection = %connection.name, "{}", warning);
        }
        project.warnings.extend(validation.warnings.iter().cloned());
        validation.to_result()?;

        // ── 2. Build context ─────────────────────────────────────────────
        let ctx = GenerationContext::new(connection, config.connection(&connection.name), sqlc);

        // ── 3. Schema ────────────────────────────────────────────────────
        project.add_file(generate_schema(&ctx, &self.config));

        // ── 4. Models ────────────────────────────────────────────────────
        for table in ctx.tables() {
            let singular = snake(&singularize(&table.name));
            let path = self
                .config
                .output_dir
                .join(self.config.model_path(ctx.name(), &singular));
            let existing = if path.is_file() {
                debug!(file = %path.display(), "Merging existing model");
                Some(read_to_string(&path)?)
            } else {
                None
            };
            project.add_file(generate_model(&ctx, &self.config, table, existing.as_deref()));
        }

        // ── 5. Queriers ──────────────────────────────────────────────────
        for table in ctx.tables() {
            project.add_file(generate_querier(&ctx, &self.config, table)?);
        }

        info!(
            connection = %connection.name,
            tables = connection.table_count(),
            files = project.file_count(),
            "Generated connection"
        );
        Ok(project)
    }

    /// Generate `connection` and write the files under the output directory
    pub fn generate_and_write(
        &self,
        connection: &Connection,
        config: &Config,
        sqlc: Option<&SqlcConfig>,
    ) -> EngineResult<GenerationSummary> {
        let project = self.generate(connection, config, sqlc)?;
        let written = project.write_to_disk(&self.config.output_dir)?;
        Ok(GenerationSummary::from_project(&project, written))
    }
}

/// Check the parsed tables and every configured table of the connection
fn validate(connection: &Connection, config: &Config) -> ValidationResult {
    let mut result = ValidationResult::ok();
    if let Err(e) = connection.validate() {
        result.add_error(e);
    }

    let Some(conn_config) = config.connection(&connection.name) else {
        return result;
    };
    for (name, table_config) in &conn_config.tables {
        match connection.table(name) {
            Some(table) => result.merge(table_config.validate(&connection.name, table)),
            None => result.add_warning(format!(
                "table '{}' is configured but not declared by any migration",
                name
            )),
        }
        for join in table_config.joins.iter().filter(|j| j.is_parented()) {
            let source = join.source(name);
            if connection.table(source).is_none() {
                result.add_error(EngineError::JoinPathUnresolved {
                    connection: connection.name.clone(),
                    table: name.clone(),
                    path: join.fields.join(", "),
                    segment: source.to_string(),
                });
            }
        }
    }
    result
}

// ============================================================================
// Generation Summary
// ============================================================================

/// A summary of what was generated for one connection
#[derive(Debug, Clone, Default)]
pub struct GenerationSummary {
    /// Connection name
    pub connection: String,
    /// Total number of files generated
    pub total_files: usize,
    /// Number of schema and querier files
    pub sql_files: usize,
    /// Number of model files
    pub model_files: usize,
    /// Files whose content changed on disk
    pub written: usize,
    /// Files already up to date
    pub unchanged: usize,
    /// Warnings emitted during generation
    pub warnings: Vec<String>,
}

impl GenerationSummary {
    /// Build a summary from a generated project and its write outcome
    pub fn from_project(project: &GeneratedProject, written: WriteSummary) -> Self {
        use crate::FileType;
        Self {
            connection: project.name.clone(),
            total_files: project.file_count(),
            sql_files: project.files_by_type(FileType::Sql).len(),
            model_files: project.files_by_type(FileType::Go).len(),
            written: written.written,
            unchanged: written.unchanged,
            warnings: project.warnings.clone(),
        }
    }

    /// Format the summary as a human-readable string
    pub fn display(&self) -> String {
        let mut lines = vec![
            format!("Generated {} files for '{}':", self.total_files, self.connection),
            format!("  SQL files:      {}", self.sql_files),
            format!("  Model files:    {}", self.model_files),
            format!("  Written:        {}", self.written),
            format!("  Unchanged:      {}", self.unchanged),
        ];
        if !self.warnings.is_empty() {
            lines.push(format!("  Warnings:       {}", self.warnings.len()));
            for warning in &self.warnings {
                lines.push(format!("    - {}", warning));
            }
        }
        lines.join("\n")
    }
}

// ============================================================================
// Tests
// ============================================================================
