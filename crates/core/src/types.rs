//! Core type definitions for polygon
//!
//! This module classifies the SQL type text found in migrations and models
//! the host-language (Go) types the model emitter writes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dialect label given to connections that don't configure one
pub const DEFAULT_DIALECT: &str = "postgres";

// ============================================================================
// SQL Types
// ============================================================================

/// Coarse classification of a column's SQL type text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// SMALLINT, INTEGER, BIGINT and the SERIAL family
    Integer,
    /// CHAR, VARCHAR, TEXT, CITEXT
    Text,
    /// BOOLEAN
    Bool,
    /// TIMESTAMP, TIMESTAMPTZ, DATE, TIME
    Timestamp,
    /// NUMERIC, DECIMAL, REAL, FLOAT, DOUBLE PRECISION
    Float,
    /// UUID
    Uuid,
    /// JSON, JSONB
    Json,
    /// BYTEA
    Bytes,
    /// `T[]` or `T ARRAY`
    Array(Box<SqlType>),
    /// Anything else, kept upper-cased
    Other(String),
}

impl SqlType {
    /// Classify SQL type text such as `VARCHAR(255)` or `timestamp with time zone`.
    pub fn parse(text: &str) -> SqlType {
        let upper = text.trim().to_uppercase();

        if let Some(inner) = upper.strip_suffix("[]") {
            return SqlType::Array(Box::new(SqlType::parse(inner)));
        }
        if let Some(inner) = upper.strip_suffix(" ARRAY") {
            return SqlType::Array(Box::new(SqlType::parse(inner)));
        }

        let base = upper
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        match base {
            "SMALLINT" | "INT" | "INTEGER" | "BIGINT" | "INT2" | "INT4" | "INT8" | "SERIAL"
            | "BIGSERIAL" | "SMALLSERIAL" | "SERIAL2" | "SERIAL4" | "SERIAL8" => SqlType::Integer,
            "CHAR" | "CHARACTER" | "VARCHAR" | "TEXT" | "CITEXT" | "NAME" | "BPCHAR" => {
                SqlType::Text
            }
            "BOOL" | "BOOLEAN" => SqlType::Bool,
            "TIMESTAMP" | "TIMESTAMPTZ" | "DATE" | "TIME" | "TIMETZ" => SqlType::Timestamp,
            "NUMERIC" | "DECIMAL" | "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" => {
                SqlType::Float
            }
            "UUID" => SqlType::Uuid,
            "JSON" | "JSONB" => SqlType::Json,
            "BYTEA" => SqlType::Bytes,
            _ => SqlType::Other(upper),
        }
    }

    /// Whether the raw type text names an auto-incrementing type
    pub fn is_serial(text: &str) -> bool {
        text.to_uppercase().contains("SERIAL")
    }

    /// Whether this is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(self, SqlType::Integer)
    }

    /// Array cast used when filtering this column with `= ANY(...)`.
    pub fn array_cast(&self) -> String {
        match self {
            SqlType::Integer => "BIGINT[]".to_string(),
            SqlType::Text => "TEXT[]".to_string(),
            SqlType::Bool => "BOOLEAN[]".to_string(),
            SqlType::Timestamp => "TIMESTAMPTZ[]".to_string(),
            SqlType::Float => "FLOAT8[]".to_string(),
            SqlType::Uuid => "UUID[]".to_string(),
            SqlType::Json => "JSONB[]".to_string(),
            SqlType::Bytes => "BYTEA[]".to_string(),
            SqlType::Array(inner) => inner.array_cast(),
            SqlType::Other(name) => format!("{}[]", name),
        }
    }

    /// Host type for a column of this SQL type.
    ///
    /// Integer columns whose name ends in `id` are identifiers and map to
    /// `*uint64` whatever their width. JSON columns map to `any` unless the
    /// caller resolves an override first.
    pub fn go_type(&self, column_name: &str) -> GoType {
        match self {
            SqlType::Integer if column_name.to_lowercase().ends_with("id") => {
                GoType::pointer("uint64")
            }
            SqlType::Integer => GoType::pointer("int64"),
            SqlType::Text | SqlType::Uuid => GoType::pointer("string"),
            SqlType::Bool => GoType::pointer("bool"),
            SqlType::Timestamp => GoType::qualified("time", "Time", true),
            SqlType::Float => GoType::pointer("float64"),
            SqlType::Bytes => GoType::plain("[]byte"),
            SqlType::Array(inner) => inner.go_type(column_name).into_slice(),
            SqlType::Json | SqlType::Other(_) => GoType::any(),
        }
    }
}

// ============================================================================
// Go Types
// ============================================================================

/// A host-language type as written into model files
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GoType {
    /// Import path of the package declaring the type, if any
    pub import: Option<String>,
    /// Type name, qualified by the package alias when `import` is set
    pub name: String,
    /// Whether the type is written as a pointer
    pub pointer: bool,
    /// Whether the type is a slice of the element type
    pub slice: bool,
}

impl GoType {
    /// Unqualified, non-pointer type (e.g. `any`)
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            import: None,
            name: name.into(),
            pointer: false,
            slice: false,
        }
    }

    /// Pointer to an unqualified type (e.g. `*string`)
    pub fn pointer(name: impl Into<String>) -> Self {
        Self {
            pointer: true,
            ..Self::plain(name)
        }
    }

    /// Type declared in another package (e.g. `*time.Time`).
    ///
    /// The type name is qualified by the last segment of `import`.
    pub fn qualified(import: impl Into<String>, type_name: &str, pointer: bool) -> Self {
        let import = import.into();
        let alias = import.rsplit('/').next().unwrap_or(&import).to_string();
        Self {
            name: format!("{}.{}", alias, type_name),
            import: Some(import),
            pointer,
            slice: false,
        }
    }

    /// The least specific value type
    pub fn any() -> Self {
        Self::plain("any")
    }

    /// Slice of this type's element, dropping the pointer
    pub fn into_slice(mut self) -> Self {
        self.pointer = false;
        self.slice = true;
        self
    }

    /// Whether the type references the `time` package
    pub fn uses_time(&self) -> bool {
        self.import.as_deref() == Some("time")
    }
}

impl fmt::Display for GoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.slice {
            write!(f, "[]")?;
        }
        if self.pointer {
            write!(f, "*")?;
        }
        write!(f, "{}", self.name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sql_types() {
        assert_eq!(SqlType::parse("BIGSERIAL"), SqlType::Integer);
        assert_eq!(SqlType::parse("bigint"), SqlType::Integer);
        assert_eq!(SqlType::parse("VARCHAR(255)"), SqlType::Text);
        assert_eq!(SqlType::parse("character varying(20)"), SqlType::Text);
        assert_eq!(SqlType::parse("TIMESTAMP WITH TIME ZONE"), SqlType::Timestamp);
        assert_eq!(SqlType::parse("DOUBLE PRECISION"), SqlType::Float);
        assert_eq!(SqlType::parse("NUMERIC(10,2)"), SqlType::Float);
        assert_eq!(SqlType::parse("jsonb"), SqlType::Json);
        assert_eq!(
            SqlType::parse("TEXT[]"),
            SqlType::Array(Box::new(SqlType::Text))
        );
        assert_eq!(
            SqlType::parse("mood"),
            SqlType::Other("MOOD".to_string())
        );
    }

    #[test]
    fn test_is_serial() {
        assert!(SqlType::is_serial("BIGSERIAL"));
        assert!(SqlType::is_serial("serial"));
        assert!(!SqlType::is_serial("BIGINT"));
    }

    #[test]
    fn test_go_type_mapping() {
        let int = SqlType::Integer;
        assert_eq!(int.go_type("id").to_string(), "*uint64");
        assert_eq!(int.go_type("user_id").to_string(), "*uint64");
        assert_eq!(int.go_type("view_count").to_string(), "*int64");
        assert_eq!(SqlType::Text.go_type("name").to_string(), "*string");
        assert_eq!(SqlType::Uuid.go_type("token").to_string(), "*string");
        assert_eq!(SqlType::Bool.go_type("active").to_string(), "*bool");
        assert_eq!(SqlType::Float.go_type("price").to_string(), "*float64");
        assert_eq!(SqlType::Json.go_type("meta").to_string(), "any");
        assert_eq!(
            SqlType::Array(Box::new(SqlType::Text))
                .go_type("tags")
                .to_string(),
            "[]string"
        );
    }

    #[test]
    fn test_timestamp_uses_time_package() {
        let ty = SqlType::Timestamp.go_type("created_at");
        assert_eq!(ty.to_string(), "*time.Time");
        assert!(ty.uses_time());
    }

    #[test]
    fn test_qualified_type() {
        let ty = GoType::qualified("github.com/acme/types", "Meta", true);
        assert_eq!(ty.to_string(), "*types.Meta");
        assert_eq!(ty.import.as_deref(), Some("github.com/acme/types"));

        let ty = GoType::qualified("encoding/json", "RawMessage", false);
        assert_eq!(ty.to_string(), "json.RawMessage");
    }

    #[test]
    fn test_array_cast() {
        assert_eq!(SqlType::Integer.array_cast(), "BIGINT[]");
        assert_eq!(SqlType::Text.array_cast(), "TEXT[]");
        assert_eq!(SqlType::Other("MOOD".into()).array_cast(), "MOOD[]");
    }
}
