//! Column definitions
//!
//! This module contains the `Column` struct: one column of a parsed table,
//! kept close to the text it was declared with so the table can be
//! re-emitted.

use polygon_core::SqlType;
use serde::{Deserialize, Serialize};

// ============================================================================
// Column
// ============================================================================

/// Represents a column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unquoted
    pub name: String,

    /// SQL type text as declared (e.g. `VARCHAR(255)`)
    pub sql_type: String,

    /// Whether the column accepts NULL
    pub nullable: bool,

    /// Default expression, verbatim
    pub default: Option<String>,

    /// Column clauses kept verbatim (`CHECK (...)`, `COLLATE ...`, `GENERATED ...`)
    pub constraints: Vec<String>,
}

impl Column {
    /// Create a nullable column with the given name and type
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: None,
            constraints: Vec::new(),
        }
    }

    /// Mark the column `NOT NULL`
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default expression
    pub fn with_default(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Classified SQL type
    pub fn kind(&self) -> SqlType {
        SqlType::parse(&self.sql_type)
    }

    /// Whether the type is from the SERIAL family
    pub fn is_serial(&self) -> bool {
        SqlType::is_serial(&self.sql_type)
    }

    /// `true` for `id`, `created_at` and `updated_at`, which generated
    /// queries manage themselves.
    pub fn is_managed(&self) -> bool {
        matches!(self.name.as_str(), "id" | "created_at" | "updated_at")
    }

    /// Column definition without any constraint (name, type, nullability, default)
    pub fn definition(&self) -> String {
        let mut out = format!(
            "{} {} {}",
            self.name,
            self.sql_type,
            if self.nullable { "NULL" } else { "NOT NULL" }
        );
        if let Some(default) = &self.default {
            out.push_str(" DEFAULT ");
            out.push_str(default);
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
