//! # Polygon IR (Intermediate Representation)
//!
//! This crate holds everything the generators need to know about a project:
//! the tables reconstructed from SQL migrations, the `sequel.yml`
//! configuration, and the downstream generator's configuration.
//!
//! ## Core Concepts
//!
//! - **Connection**: one `sequel/<name>/migration` directory and the tables it declares
//! - **Table**: columns, constraints and checks as parsed from `CREATE TABLE`
//! - **Constraint**: primary keys, foreign keys and uniqueness, inline or table-level
//! - **Config**: per-table field inclusion, features, additions and joins
//!

// Module declarations
pub mod column;
pub mod config;
pub mod connection;
pub mod constraint;
pub mod migration;
pub mod parser;
pub mod scan;
pub mod sqlc;
pub mod table;
pub mod validation;

// Re-export commonly used types at crate root
pub use column::Column;
pub use config::{
    Addition, CONFIG_FILE, Config, ConnectionConfig, Feature, FieldConfig, INCLUDE_BASE,
    INCLUDE_NONE, JoinConfig, TableConfig, include_equals, should_include,
};
pub use connection::{Connection, Routine, RoutineKind};
pub use constraint::{Constraint, ConstraintType, ForeignKey};
pub use migration::{ConnectionSource, MIGRATION_DIR, SEQUEL_DIR, discover};
pub use parser::{MigrationParser, ParseSummary, parse_into};
pub use sqlc::SqlcConfig;
pub use table::{Index, Table};
pub use validation::ValidationResult;

// Re-export core types that are commonly used with IR
pub use polygon_core::{EngineError, EngineResult, GoType, SqlType, Validatable};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient re-exports for common usage
pub mod prelude {
    pub use crate::{
        Column, Config, Connection, Constraint, ConstraintType, EngineError, EngineResult,
        Feature, ForeignKey, Table, TableConfig,
    };
}
