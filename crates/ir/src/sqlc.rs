//! Downstream generator configuration
//!
//! The record generator that consumes our querier files keeps its own
//! configuration next to `sequel.yml`. We only read two things from it:
//! the Go output directories the type rewriter walks, and the column
//! type overrides the model emitter honours for JSON columns.

use polygon_core::fs::read_to_string;
use polygon_core::{EngineResult, GoType};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Candidate configuration file names, in lookup order
pub const SQLC_CONFIG_FILES: &[&str] = &["sqlc.yaml", "sqlc.yml", "sqlc.json"];

// ============================================================================
// File model
// ============================================================================

/// The parts of the downstream configuration we understand
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SqlcConfig {
    /// Where the configuration was loaded from
    #[serde(skip)]
    pub path: PathBuf,

    #[serde(default)]
    pub sql: Vec<SqlPackage>,

    #[serde(default)]
    pub overrides: Option<GlobalOverrides>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SqlPackage {
    #[serde(default, rename = "gen")]
    pub generate: Option<GenConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenConfig {
    #[serde(default)]
    pub go: Option<GoGen>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoGen {
    /// Output directory, relative to the configuration file
    #[serde(default)]
    pub out: Option<String>,

    #[serde(default)]
    pub overrides: Vec<Override>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalOverrides {
    #[serde(default)]
    pub go: Option<GoOverrides>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoOverrides {
    #[serde(default)]
    pub overrides: Vec<Override>,
}

/// A single type override
#[derive(Debug, Clone, Deserialize)]
pub struct Override {
    /// `table.column`, optionally schema-qualified
    #[serde(default)]
    pub column: Option<String>,

    #[serde(default)]
    pub go_type: Option<GoTypeSpec>,
}

/// Override target, either `"path/to/pkg.Type"` or an explicit mapping
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GoTypeSpec {
    Path(String),
    Detailed {
        #[serde(default)]
        import: Option<String>,
        #[serde(default)]
        package: Option<String>,
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        pointer: bool,
        #[serde(default)]
        slice: bool,
    },
}

impl GoTypeSpec {
    /// Host type this override resolves to
    pub fn to_go_type(&self) -> GoType {
        match self {
            GoTypeSpec::Path(path) => {
                let (pointer, path) = match path.strip_prefix('*') {
                    Some(rest) => (true, rest),
                    None => (false, path.as_str()),
                };
                let last_slash = path.rfind('/').map(|i| i + 1).unwrap_or(0);
                match path[last_slash..].rfind('.') {
                    Some(dot) => {
                        let split = last_slash + dot;
                        GoType::qualified(&path[..split], &path[split + 1..], pointer)
                    }
                    None => GoType {
                        pointer,
                        ..GoType::plain(path)
                    },
                }
            }
            GoTypeSpec::Detailed {
                import,
                package,
                type_name,
                pointer,
                slice,
            } => {
                let mut go_type = match import {
                    Some(import) => {
                        let alias = package.clone().unwrap_or_else(|| {
                            import.rsplit('/').next().unwrap_or(import).to_string()
                        });
                        GoType {
                            import: Some(import.clone()),
                            name: format!("{}.{}", alias, type_name),
                            pointer: *pointer,
                            slice: false,
                        }
                    }
                    None => GoType {
                        pointer: *pointer,
                        ..GoType::plain(type_name.as_str())
                    },
                };
                go_type.slice = *slice;
                go_type
            }
        }
    }
}

// ============================================================================
// Loading and queries
// ============================================================================

impl SqlcConfig {
    /// First downstream configuration file present in `dir`
    pub fn find(dir: &Path) -> Option<PathBuf> {
        SQLC_CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load the downstream configuration from `dir`, if there is one
    pub fn discover(dir: &Path) -> EngineResult<Option<SqlcConfig>> {
        match Self::find(dir) {
            Some(path) => Self::load(&path).map(Some),
            None => {
                debug!(dir = %dir.display(), "No downstream configuration found");
                Ok(None)
            }
        }
    }

    /// Load a configuration file (JSON by extension, YAML otherwise)
    pub fn load(path: &Path) -> EngineResult<SqlcConfig> {
        let text = read_to_string(path)?;
        let mut config: SqlcConfig = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&text)?
        } else {
            serde_yaml::from_str(&text)?
        };
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// Directory containing the configuration file
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Go output directories, resolved against the configuration directory
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for package in &self.sql {
            let out = package
                .generate
                .as_ref()
                .and_then(|g| g.go.as_ref())
                .and_then(|go| go.out.as_deref());
            if let Some(out) = out {
                let dir = self.dir().join(out);
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }
        dirs
    }

    /// All overrides: per-package first, then global
    pub fn overrides(&self) -> impl Iterator<Item = &Override> {
        let packages = self
            .sql
            .iter()
            .filter_map(|p| p.generate.as_ref()?.go.as_ref())
            .flat_map(|go| go.overrides.iter());
        let global = self
            .overrides
            .iter()
            .filter_map(|o| o.go.as_ref())
            .flat_map(|go| go.overrides.iter());
        packages.chain(global)
    }

    /// Host type configured for `table.column`, if any
    pub fn column_override(&self, table: &str, column: &str) -> Option<GoType> {
        let wanted = format!("{}.{}", table, column);
        let qualified = format!(".{}", wanted);
        self.overrides()
            .filter(|o| {
                o.column
                    .as_deref()
                    .is_some_and(|c| c == wanted || c.ends_with(&qualified))
            })
            .find_map(|o| o.go_type.as_ref())
            .map(GoTypeSpec::to_go_type)
    }
}

// ============================================================================
// Tests
// ============================================================================
