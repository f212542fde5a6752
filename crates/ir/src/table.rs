//! Table definitions
//!
//! This module contains the `Table` struct reconstructed from migrations,
//! together with the canonical `CREATE TABLE` re-emission used by the
//! schema document.

use crate::column::Column;
use crate::constraint::{Constraint, ConstraintType, ForeignKey};
use polygon_core::naming::singularize;
use polygon_core::{EngineError, EngineResult, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Index
// ============================================================================

/// An index definition. The dialect currently parsed never fills these in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

// ============================================================================
// Table
// ============================================================================

/// A table as declared by the migrations of one connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name as declared (usually plural, e.g. "users")
    pub name: String,

    /// Singular form of the name (e.g. "user")
    pub singular_name: String,

    /// Columns in declaration order
    pub columns: Vec<Column>,

    /// Indexes
    pub indexes: Vec<Index>,

    /// Constraints in parse order
    pub constraints: Vec<Constraint>,

    /// Table-level `CHECK (...)` items kept verbatim
    pub checks: Vec<String>,
}

impl Table {
    /// Create an empty table
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let singular_name = singularize(&name);
        Self {
            name,
            singular_name,
            columns: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
            checks: Vec::new(),
        }
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Add a column using builder pattern
    pub fn with_column(mut self, column: Column) -> Self {
        self.add_column(column);
        self
    }

    /// Add a constraint using builder pattern
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.add_constraint(constraint);
        self
    }

    // ========================================================================
    // Column management
    // ========================================================================

    /// Add a column. A column with the same name is replaced in place.
    pub fn add_column(&mut self, column: Column) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Remove a column by name, together with every constraint that
    /// involves it (Postgres drops multi-column constraints entirely).
    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.columns.iter().position(|c| c.name == name)?;
        self.constraints.retain(|constraint| !constraint.involves(name));
        Some(self.columns.remove(pos))
    }

    /// Rewrite a column's SQL type. Returns `false` if the column is unknown.
    pub fn set_column_type(&mut self, name: &str, sql_type: impl Into<String>) -> bool {
        match self.column_mut(name) {
            Some(column) => {
                column.sql_type = sql_type.into();
                true
            }
            None => false,
        }
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get a mutable column by name
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Check whether a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// All column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    // ========================================================================
    // Constraints
    // ========================================================================

    /// Add a constraint, ignoring exact duplicates
    pub fn add_constraint(&mut self, constraint: Constraint) {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
    }

    /// Columns covered by any primary key
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.constraints
            .iter()
            .filter(|c| c.kind == ConstraintType::PrimaryKey)
            .flat_map(|c| c.columns.iter().map(String::as_str))
            .collect()
    }

    /// Mark every primary-key column `NOT NULL`
    pub fn apply_primary_key_nullability(&mut self) {
        let pk: Vec<String> = self
            .primary_key_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        for name in pk {
            if let Some(column) = self.column_mut(&name) {
                column.nullable = false;
            }
        }
    }

    /// Single-column foreign keys whose column still exists, in column order.
    pub fn foreign_keys(&self) -> Vec<ForeignKey> {
        let mut keys = Vec::new();
        for column in &self.columns {
            for constraint in &self.constraints {
                if constraint.kind != ConstraintType::ForeignKey || !constraint.is_on(&column.name)
                {
                    continue;
                }
                if let Some(table) = constraint.referenced_table() {
                    let key = ForeignKey {
                        column: column.name.clone(),
                        table: table.to_string(),
                        ref_column: constraint.referenced_column().map(str::to_string),
                    };
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }

    /// Foreign key declared on `column`, if any
    pub fn foreign_key_on(&self, column: &str) -> Option<ForeignKey> {
        self.foreign_keys().into_iter().find(|fk| fk.column == column)
    }

    // ========================================================================
    // Re-emission
    // ========================================================================

    /// Canonical `CREATE TABLE` statement.
    ///
    /// Columns come first in declaration order, each with its single-column
    /// unnamed constraints inlined; then the remaining primary keys, foreign
    /// keys and uniqueness constraints in parse order; then checks.
    pub fn to_create_sql(&self) -> String {
        let mut items: Vec<String> = Vec::new();
        let mut inlined: HashSet<usize> = HashSet::new();

        for column in &self.columns {
            let mut item = column.definition();
            for kind in [
                ConstraintType::PrimaryKey,
                ConstraintType::Unique,
                ConstraintType::ForeignKey,
            ] {
                for (i, constraint) in self.constraints.iter().enumerate() {
                    if constraint.kind == kind
                        && constraint.is_inline()
                        && constraint.is_on(&column.name)
                    {
                        item.push(' ');
                        item.push_str(&constraint.inline_clause());
                        inlined.insert(i);
                    }
                }
            }
            for clause in &column.constraints {
                item.push(' ');
                item.push_str(clause);
            }
            items.push(item);
        }

        for kind in [
            ConstraintType::PrimaryKey,
            ConstraintType::ForeignKey,
            ConstraintType::Unique,
        ] {
            for (i, constraint) in self.constraints.iter().enumerate() {
                if constraint.kind == kind && !inlined.contains(&i) {
                    items.push(constraint.table_item());
                }
            }
        }

        items.extend(self.checks.iter().cloned());

        let mut out = format!("CREATE TABLE {} (\n", self.name);
        out.push_str(
            &items
                .iter()
                .map(|item| format!("    {}", item))
                .collect::<Vec<_>>()
                .join(",\n"),
        );
        out.push_str("\n);\n");
        out
    }
}

impl Validatable for Table {
    fn validate(&self) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(EngineError::config(format!(
                    "duplicate column '{}' in table '{}'",
                    column.name, self.name
                )));
            }
        }
        for constraint in &self.constraints {
            if constraint.kind != ConstraintType::ForeignKey {
                continue;
            }
            for column in &constraint.columns {
                if !self.has_column(column) {
                    return Err(EngineError::config(format!(
                        "foreign key column '{}' does not exist on table '{}'",
                        column, self.name
                    )));
                }
            }
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
    use pretty_assertions::assert_eq;

    fn posts() -> Table {
        Table::new("posts")
            .with_column(Column::new("id", "BIGSERIAL").not_null())
            .with_column(Column::new("user_id", "BIGINT"))
            .with_column(Column::new("body", "TEXT").not_null())
            .with_constraint(Constraint::primary_key(vec!["id".into()]))
            .with_constraint(Constraint::foreign_key(
                vec!["user_id".into()],
                "users",
                Some("id"),
            ))
    }

    #[test]
    fn test_new_table_singular() {
        let table = Table::new("categories");
        assert_eq!(table.singular_name, "category");
    }

    #[test]
    fn test_add_column_replaces_same_name() {
        let mut table = posts();
        table.add_column(Column::new("body", "VARCHAR(80)"));
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.column("body").unwrap().sql_type, "VARCHAR(80)");
    }

    #[test]
    fn test_drop_column_removes_its_constraints() {
        let mut table = posts();
        assert!(table.drop_column("user_id").is_some());
        assert!(!table.has_column("user_id"));
        assert_eq!(table.constraints.len(), 1);
        assert!(table.foreign_keys().is_empty());
        assert!(table.validate().is_ok());
        assert!(!table.to_create_sql().contains("user_id"));
    }

    #[test]
    fn test_drop_column_removes_composite_constraints() {
        let mut table = posts().with_constraint(Constraint::new(
            ConstraintType::Unique,
            vec!["user_id".into(), "body".into()],
        ));
        table.drop_column("body");
        assert_eq!(table.constraints.len(), 2);
        assert!(
            table
                .constraints
                .iter()
                .all(|c| c.kind != ConstraintType::Unique)
        );
        assert_eq!(table.foreign_keys().len(), 1);
    }

    #[test]
    fn test_validate_dangling_foreign_key() {
        let mut table = posts();
        table.columns.retain(|c| c.name != "user_id");
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_set_column_type() {
        let mut table = posts();
        assert!(table.set_column_type("body", "VARCHAR(500)"));
        assert!(!table.set_column_type("missing", "TEXT"));
        assert_eq!(table.column("body").unwrap().sql_type, "VARCHAR(500)");
    }

    #[test]
    fn test_foreign_keys() {
        let table = posts();
        let fks = table.foreign_keys();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].column, "user_id");
        assert_eq!(fks[0].table, "users");
        assert_eq!(fks[0].ref_column.as_deref(), Some("id"));
        assert!(table.foreign_key_on("body").is_none());
    }

    #[test]
    fn test_to_create_sql() {
        let table = posts()
            .with_column(Column::new("slug", "TEXT"))
            .with_constraint(Constraint::unique(vec!["user_id".into(), "slug".into()]));

        assert_eq!(
            table.to_create_sql(),
            "CREATE TABLE posts (\n\
             \x20   id BIGSERIAL NOT NULL PRIMARY KEY,\n\
             \x20   user_id BIGINT NULL REFERENCES users (id),\n\
             \x20   body TEXT NOT NULL,\n\
             \x20   slug TEXT NULL,\n\
             \x20   UNIQUE (user_id, slug)\n\
             );\n"
        );
    }

    #[test]
    fn test_primary_key_nullability() {
        let mut table = Table::new("pairs")
            .with_column(Column::new("a", "BIGINT"))
            .with_column(Column::new("b", "BIGINT"))
            .with_constraint(Constraint::primary_key(vec!["a".into(), "b".into()]));
        table.apply_primary_key_nullability();
        assert!(table.columns.iter().all(|c| !c.nullable));
    }

    #[test]
    fn test_validate_duplicate_columns() {
        let mut table = Table::new("users");
        table.columns.push(Column::new("id", "BIGINT"));
        table.columns.push(Column::new("id", "BIGINT"));
        assert!(!table.is_valid());
    }
}
