//! # Polygon Codegen
//!
//! Generation engine for polygon.
//!
//! This crate turns a parsed [`Connection`](polygon_ir::Connection) and its
//! `sequel.yml` configuration into generated files, then drives the
//! downstream record generator and conforms its output.
//!
//! ## Features
//!
//! - **Schema Generation**: one canonical SQL document per connection
//! - **Model Generation**: Go record structs per table, keeping user declarations
//! - **Querier Generation**: sqlc query templates per table (CRUD, counts,
//!   filters, pagination, sorting and parent joins)
//! - **Type Rewriting**: pointer/nullability conventions on sqlc output
//! - **Pipeline**: per-connection orchestration of all of the above
//!

// ============================================================================
// Modules
// ============================================================================

pub mod context;
pub mod generator;
pub mod model;
pub mod pipeline;
pub mod querier;
pub mod rewrite;
pub mod schema;

// ============================================================================
// Re-exports
// ============================================================================

pub use context::{ChildEdge, GenerationContext, ParentEdge};
pub use generator::{GenerationSummary, Generator};
pub use pipeline::{ConnectionReport, Pipeline, PipelineOptions, PipelineReport};
pub use rewrite::{RewriteSummary, Rewriter};

use polygon_core::EngineResult;
use polygon_core::fs::write_if_changed;
use std::path::{Path, PathBuf};

/// First line of every file polygon writes
pub const GENERATED_BANNER: &str = "Code generated by polygon";

/// Default output directory, relative to the project root
pub const DEFAULT_OUTPUT_DIR: &str = "generate/polygon";

// ============================================================================
// GeneratorConfig
// ============================================================================

/// Configuration for the generator
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Output directory for generated files
    pub output_dir: PathBuf,

    /// Package name written at the top of model files
    pub model_package: String,

    /// Extension of model files
    pub model_extension: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            model_package: "model".to_string(),
            model_extension: "go".to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Output directory under a project root
    pub fn for_root(root: &Path) -> Self {
        Self::new().with_output_dir(root.join(DEFAULT_OUTPUT_DIR))
    }

    /// `sequel/<conn>.sql`
    pub fn schema_path(&self, connection: &str) -> PathBuf {
        PathBuf::from("sequel").join(format!("{}.sql", connection))
    }

    /// `sequel/<conn>/<plural>.sql`
    pub fn querier_path(&self, connection: &str, plural: &str) -> PathBuf {
        PathBuf::from("sequel")
            .join(connection)
            .join(format!("{}.sql", plural))
    }

    /// `model/<conn>.<singular>.<ext>`
    pub fn model_path(&self, connection: &str, singular: &str) -> PathBuf {
        PathBuf::from("model").join(format!(
            "{}.{}.{}",
            connection, singular, self.model_extension
        ))
    }
}

// ============================================================================
// GeneratedFile
// ============================================================================

/// Represents a single generated file
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    /// Relative path from output directory
    pub path: PathBuf,

    /// File content
    pub content: String,

    /// File type for categorization
    pub file_type: FileType,
}

impl GeneratedFile {
    /// Create a new generated file
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>, file_type: FileType) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            file_type,
        }
    }

    /// Create a SQL file (schema or querier)
    pub fn sql(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self::new(path, content, FileType::Sql)
    }

    /// Create a Go model file
    pub fn go(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self::new(path, content, FileType::Go)
    }

    /// Get the file extension
    pub fn extension(&self) -> &str {
        self.file_type.extension()
    }
}

/// Type of generated file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Sql,
    Go,
}

impl FileType {
    /// Get the file extension for this type
    pub fn extension(&self) -> &str {
        match self {
            FileType::Sql => "sql",
            FileType::Go => "go",
        }
    }
}

// ============================================================================
// GeneratedProject
// ============================================================================

/// All files generated for one connection
#[derive(Debug, Clone, Default)]
pub struct GeneratedProject {
    /// Connection name
    pub name: String,

    /// All generated files
    pub files: Vec<GeneratedFile>,

    /// Warnings generated during code generation
    pub warnings: Vec<String>,
}

/// Outcome of writing a [`GeneratedProject`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Files whose content changed
    pub written: usize,
    /// Files already up to date
    pub unchanged: usize,
}

impl GeneratedProject {
    /// Create a new generated project
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add a file to the project
    pub fn add_file(&mut self, file: GeneratedFile) {
        self.files.push(file);
    }

    /// Add a warning
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Get the number of files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Get files by type
    pub fn files_by_type(&self, file_type: FileType) -> Vec<&GeneratedFile> {
        self.files
            .iter()
            .filter(|f| f.file_type == file_type)
            .collect()
    }

    /// Find a file by its relative path
    pub fn file(&self, path: impl AsRef<Path>) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path == path.as_ref())
    }

    /// Write all files to disk, atomically, skipping unchanged ones
    pub fn write_to_disk(&self, base_dir: impl AsRef<Path>) -> EngineResult<WriteSummary> {
        let base_dir = base_dir.as_ref();
        let mut summary = WriteSummary::default();

        for file in &self.files {
            if write_if_changed(&base_dir.join(&file.path), &file.content)? {
                summary.written += 1;
            } else {
                summary.unchanged += 1;
            }
        }

        Ok(summary)
    }
}

// ============================================================================
// Tests
// ============================================================================
