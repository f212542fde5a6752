//! # Migration Discovery
//!
//! Finds connection directories under `sequel/`, lists their forward-only
//! migration files in file-name order and feeds the up-direction text of
//! each file to the [`MigrationParser`].

use crate::connection::Connection;
use crate::parser::MigrationParser;
use polygon_core::fs::read_to_string;
use polygon_core::{EngineError, EngineResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory holding one subdirectory per connection
pub const SEQUEL_DIR: &str = "sequel";

/// Subdirectory of a connection holding its migration files
pub const MIGRATION_DIR: &str = "migration";

/// Comment lines separating the up and down halves of a migration
const DOWN_MARKERS: &[&str] = &["-- +migrate down", "-- +goose down", "-- migrate:down"];

// ============================================================================
// ConnectionSource
// ============================================================================

/// A connection directory and the migration files found in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSource {
    /// Connection name (the directory name)
    pub name: String,

    /// `sequel/<name>`
    pub dir: PathBuf,

    /// Migration files in the order they are applied
    pub migrations: Vec<PathBuf>,
}

impl ConnectionSource {
    /// Parse every migration of this connection into a fresh [`Connection`]
    pub fn load(&self) -> EngineResult<Connection> {
        let mut connection = Connection::new(&self.name);
        let mut parser = MigrationParser::new(&mut connection);
        for path in &self.migrations {
            let text = read_to_string(path)?;
            debug!(connection = %self.name, file = %path.display(), "Parsing migration");
            parser.parse(up_section(&text));
        }
        let summary = parser.summary().clone();
        info!(
            connection = %self.name,
            files = self.migrations.len(),
            tables = summary.tables,
            routines = summary.routines,
            skipped = summary.skipped,
            "Parsed migrations"
        );
        Ok(connection)
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Find every connection under `<root>/sequel`, sorted by name.
///
/// Directories without a `migration/` subdirectory are skipped. A missing
/// `sequel/` directory is an environment error.
pub fn discover(root: &Path) -> EngineResult<Vec<ConnectionSource>> {
    let sequel = root.join(SEQUEL_DIR);
    if !sequel.is_dir() {
        return Err(EngineError::SequelDirMissing(sequel));
    }

    let mut sources = Vec::new();
    for entry in list_dir(&sequel)? {
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let migration_dir = entry.path().join(MIGRATION_DIR);
        if !migration_dir.is_dir() {
            debug!(connection = %name, "No migration directory; skipping");
            continue;
        }
        sources.push(ConnectionSource {
            name,
            dir: entry.path().to_path_buf(),
            migrations: migration_files(&migration_dir)?,
        });
    }
    Ok(sources)
}

/// Forward migration files of a directory in file-name order
pub fn migration_files(dir: &Path) -> EngineResult<Vec<PathBuf>> {
    Ok(list_dir(dir)?
        .into_iter()
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_migration_file(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect())
}

fn list_dir(dir: &Path) -> EngineResult<Vec<walkdir::DirEntry>> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.map_err(|e| EngineError::file_read(dir, e)))
        .collect()
}

/// Whether a file name denotes a forward migration.
///
/// Hidden files, non-`.sql` files and rollback files (`*.down.sql`,
/// `*_down.sql`) are excluded.
pub fn is_migration_file(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    let lower = name.to_lowercase();
    match lower.strip_suffix(".sql") {
        Some(stem) => !(stem.ends_with(".down") || stem.ends_with("_down")),
        None => false,
    }
}

/// Text before the first down marker, or all of it.
pub fn up_section(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let normalized = line
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if DOWN_MARKERS.contains(&normalized.as_str()) {
            return &text[..offset];
        }
        offset += line.len();
    }
    text
}

// ============================================================================
// Tests
// ============================================================================
