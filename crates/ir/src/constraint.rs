//! Table constraints
//!
//! Inline column constraints and table-level constraint items both end up
//! as a [`Constraint`]. Foreign keys also expose a flattened
//! [`ForeignKey`] view used to build the parent/child graph.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ConstraintType
// ============================================================================

/// Kind of a table constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey,
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey,
    #[serde(rename = "UNIQUE")]
    Unique,
}

impl ConstraintType {
    /// SQL keyword(s) for this constraint
    pub fn keyword(&self) -> &'static str {
        match self {
            ConstraintType::PrimaryKey => "PRIMARY KEY",
            ConstraintType::ForeignKey => "FOREIGN KEY",
            ConstraintType::Unique => "UNIQUE",
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

// ============================================================================
// Constraint
// ============================================================================

/// A primary key, foreign key or uniqueness constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint kind
    #[serde(rename = "type")]
    pub kind: ConstraintType,

    /// Constraint name, when declared with `CONSTRAINT name`
    pub name: Option<String>,

    /// Constrained columns in declaration order
    pub columns: Vec<String>,

    /// For foreign keys: `"other_table"` or `"other_table (column)"`
    pub references: Option<String>,

    /// For foreign keys: referential actions kept verbatim (`ON DELETE CASCADE`)
    pub actions: Option<String>,
}

impl Constraint {
    /// Unnamed constraint of `kind` over `columns`
    pub fn new(kind: ConstraintType, columns: Vec<String>) -> Self {
        Self {
            kind,
            name: None,
            columns,
            references: None,
            actions: None,
        }
    }

    /// Unnamed primary key
    pub fn primary_key(columns: Vec<String>) -> Self {
        Self::new(ConstraintType::PrimaryKey, columns)
    }

    /// Unnamed uniqueness constraint
    pub fn unique(columns: Vec<String>) -> Self {
        Self::new(ConstraintType::Unique, columns)
    }

    /// Unnamed foreign key referencing `table`, optionally a specific column
    pub fn foreign_key(columns: Vec<String>, table: &str, column: Option<&str>) -> Self {
        let references = match column {
            Some(col) => format!("{} ({})", table, col),
            None => table.to_string(),
        };
        Self {
            references: Some(references),
            ..Self::new(ConstraintType::ForeignKey, columns)
        }
    }

    /// Set the constraint name
    pub fn named(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Set the referential actions
    pub fn with_actions(mut self, actions: Option<String>) -> Self {
        self.actions = actions.filter(|a| !a.is_empty());
        self
    }

    /// Referenced table of a foreign key
    pub fn referenced_table(&self) -> Option<&str> {
        let references = self.references.as_deref()?;
        let table = references.split('(').next().unwrap_or(references).trim();
        (!table.is_empty()).then_some(table)
    }

    /// Referenced column of a foreign key, when spelled out
    pub fn referenced_column(&self) -> Option<&str> {
        let references = self.references.as_deref()?;
        let start = references.find('(')?;
        let end = references.rfind(')')?;
        let column = references.get(start + 1..end)?.trim();
        (!column.is_empty()).then_some(column)
    }

    /// Whether this constraint can be written inline on its column:
    /// unnamed and over exactly one column.
    pub fn is_inline(&self) -> bool {
        self.name.is_none() && self.columns.len() == 1
    }

    /// Whether this constraint covers exactly `column`
    pub fn is_on(&self, column: &str) -> bool {
        self.columns.len() == 1 && self.columns[0] == column
    }

    /// Whether `column` is one of the constrained columns
    pub fn involves(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Inline clause for a single-column constraint (`UNIQUE`,
    /// `REFERENCES users (id) ON DELETE CASCADE`, ...)
    pub fn inline_clause(&self) -> String {
        match self.kind {
            ConstraintType::PrimaryKey => "PRIMARY KEY".to_string(),
            ConstraintType::Unique => "UNIQUE".to_string(),
            ConstraintType::ForeignKey => self.references_clause(),
        }
    }

    /// Table-level item (`CONSTRAINT name UNIQUE (a, b)`)
    pub fn table_item(&self) -> String {
        let mut out = String::new();
        if let Some(name) = &self.name {
            out.push_str(&format!("CONSTRAINT {} ", name));
        }
        out.push_str(&format!("{} ({})", self.kind, self.columns.join(", ")));
        if self.kind == ConstraintType::ForeignKey {
            out.push(' ');
            out.push_str(&self.references_clause());
        }
        out
    }

    fn references_clause(&self) -> String {
        let mut out = format!("REFERENCES {}", self.references.as_deref().unwrap_or_default());
        if let Some(actions) = &self.actions {
            out.push(' ');
            out.push_str(actions);
        }
        out
    }
}

// ============================================================================
// ForeignKey
// ============================================================================

/// Single-column foreign key edge: `table.column → referenced table`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    /// Column on the declaring table
    pub column: String,

    /// Referenced table
    pub table: String,

    /// Referenced column, when spelled out
    pub ref_column: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
