//! Connections
//!
//! A connection is the unit of isolation: one `sequel/<name>/migration`
//! directory produces one set of tables, routines and generated files.

use crate::table::Table;
use polygon_core::{DEFAULT_DIALECT, EngineResult, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Routine
// ============================================================================

/// Kind of an opaque statement carried into the schema document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutineKind {
    Function,
    Trigger,
}

/// A `CREATE FUNCTION` or `CREATE TRIGGER` statement kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub kind: RoutineKind,

    /// Function or trigger name
    pub name: String,

    /// Table a trigger is attached to
    pub target: Option<String>,

    /// Full statement text including the terminating semicolon
    pub body: String,
}

impl Routine {
    /// Registry key: triggers are scoped by their table, functions are not.
    pub fn key(&self) -> String {
        match &self.target {
            Some(target) => format!("{}.{}", target, self.name),
            None => self.name.clone(),
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// All tables and routines parsed for one connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Directory name under `sequel/`
    pub name: String,

    /// Dialect label
    pub dialect: String,

    /// Tables keyed by name; iteration is in sorted name order
    pub tables: BTreeMap<String, Table>,

    /// Functions keyed by name
    pub functions: BTreeMap<String, Routine>,

    /// Triggers keyed by `table.name`
    pub triggers: BTreeMap<String, Routine>,
}

impl Connection {
    /// Create an empty connection with the default dialect
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dialect: DEFAULT_DIALECT.to_string(),
            tables: BTreeMap::new(),
            functions: BTreeMap::new(),
            triggers: BTreeMap::new(),
        }
    }

    /// Add a table, replacing one with the same name
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Add a table using builder pattern
    pub fn with_table(mut self, table: Table) -> Self {
        self.add_table(table);
        self
    }

    /// Get a table by name
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Get a mutable table by name
    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Tables in sorted name order
    pub fn sorted_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Register a function or trigger; a later definition replaces an earlier one.
    pub fn add_routine(&mut self, routine: Routine) {
        let key = routine.key();
        match routine.kind {
            RoutineKind::Function => self.functions.insert(key, routine),
            RoutineKind::Trigger => self.triggers.insert(key, routine),
        };
    }

    /// Number of tables
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

impl Validatable for Connection {
    fn validate(&self) -> EngineResult<()> {
        for table in self.tables.values() {
            table.validate()?;
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
    use crate::Column;

    #[test]
    fn test_tables_are_sorted() {
        let conn = Connection::new("main")
            .with_table(Table::new("users"))
            .with_table(Table::new("accounts"))
            .with_table(Table::new("posts"));

        let names: Vec<_> = conn.sorted_tables().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["accounts", "posts", "users"]);
        assert_eq!(conn.dialect, "postgres");
    }

    #[test]
    fn test_add_table_replaces() {
        let mut conn = Connection::new("main");
        conn.add_table(Table::new("users").with_column(Column::new("id", "BIGINT")));
        conn.add_table(Table::new("users"));
        assert_eq!(conn.table_count(), 1);
        assert!(conn.table("users").unwrap().columns.is_empty());
    }

    #[test]
    fn test_triggers_scoped_by_table() {
        let mut conn = Connection::new("main");
        for table in ["users", "posts"] {
            conn.add_routine(Routine {
                kind: RoutineKind::Trigger,
                name: "set_updated_at".into(),
                target: Some(table.into()),
                body: String::new(),
            });
        }
        assert_eq!(conn.triggers.len(), 2);
        assert!(conn.triggers.contains_key("posts.set_updated_at"));
    }
}
