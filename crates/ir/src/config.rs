//! # Configuration Store
//!
//! `sequel.yml` describes, per connection and table, which columns the base
//! model includes, which extra features a column carries, synthetic
//! additions and configured join paths.
//!
//! ```yaml
//! connections:
//!   main:
//!     dialect: postgres
//!     tables:
//!       posts:
//!         fields:
//!           title: { include: base, feature: [sort, filter] }
//!           secret: { include: none }
//!         additions:
//!           - { name: score, type: float64 }
//!         joins:
//!           - { type: parented, table: posts, fields: [user, user.team] }
//! ```
//!
//! The file is grown, never shrunk: [`Config::reconcile`] adds entries for
//! new connections, tables and columns and leaves everything else alone.

use crate::connection::Connection;
use crate::table::Table;
use crate::validation::ValidationResult;
use indexmap::IndexMap;
use polygon_core::fs::write_atomic;
use polygon_core::{DEFAULT_DIALECT, EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Configuration file name, relative to the project root
pub const CONFIG_FILE: &str = "sequel.yml";

/// Include label for columns that belong to the base model
pub const INCLUDE_BASE: &str = "base";

/// Include label for columns excluded from every model field set
pub const INCLUDE_NONE: &str = "none";

/// The only join type currently generated
pub const JOIN_PARENTED: &str = "parented";

// ============================================================================
// Include helpers
// ============================================================================

/// `true` unless the label is the literal `none`
pub fn should_include(include: Option<&str>) -> bool {
    include != Some(INCLUDE_NONE)
}

/// Compare an include label, treating a missing label as `base`
pub fn include_equals(include: Option<&str>, label: &str) -> bool {
    include.unwrap_or(INCLUDE_BASE) == label
}

// ============================================================================
// Feature
// ============================================================================

/// Per-column feature labels that add query shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Adds the column to the ORDER BY cases
    Sort,
    /// Adds the column to the WHERE filters
    Filter,
    /// Generates an atomic increment query
    Increase,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Sort => "sort",
            Feature::Filter => "filter",
            Feature::Increase => "increase",
        }
    }

    /// Parse a feature label (case-insensitive); unknown labels yield `None`
    pub fn parse(label: &str) -> Option<Feature> {
        match label.trim().to_lowercase().as_str() {
            "sort" => Some(Feature::Sort),
            "filter" => Some(Feature::Filter),
            "increase" => Some(Feature::Increase),
            _ => None,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Configuration tree
// ============================================================================

/// Root of `sequel.yml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connections: IndexMap<String, ConnectionConfig>,
}

/// Configuration of one connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<String>,

    #[serde(default)]
    pub tables: IndexMap<String, TableConfig>,
}

impl ConnectionConfig {
    /// Configured dialect, or the default
    pub fn dialect(&self) -> &str {
        self.dialect.as_deref().unwrap_or(DEFAULT_DIALECT)
    }
}

/// Configuration of one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub fields: IndexMap<String, FieldConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<Addition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinConfig>,
}

/// Configuration of one column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// `base`, `none` or a custom label; missing means `base`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,

    /// Feature labels (`sort`, `filter`, `increase`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature: Vec<String>,
}

impl FieldConfig {
    /// A field included in the base model
    pub fn base() -> Self {
        Self {
            include: Some(INCLUDE_BASE.to_string()),
            feature: Vec::new(),
        }
    }

    /// Known features of this field, in declaration order
    pub fn features(&self) -> Vec<Feature> {
        let mut features = Vec::new();
        for label in &self.feature {
            if let Some(feature) = Feature::parse(label) {
                if !features.contains(&feature) {
                    features.push(feature);
                }
            }
        }
        features
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features().contains(&feature)
    }

    /// Whether the field belongs to the base model
    pub fn is_base(&self) -> bool {
        include_equals(self.include.as_deref(), INCLUDE_BASE)
    }
}

/// A synthetic model field with no database column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addition {
    pub name: String,

    /// Import path of the package declaring the type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Host type, written as-is
    #[serde(rename = "type")]
    pub type_name: String,
}

/// A configured join chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Join type; only `parented` is generated
    #[serde(rename = "type")]
    pub kind: String,

    /// Table the paths start from; defaults to the table the join is declared on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Dot paths over foreign keys (`user`, `user.team`)
    #[serde(default)]
    pub fields: Vec<String>,

    /// Overrides the generated operation suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl JoinConfig {
    /// Whether this join generates `ParentedBy` queries
    pub fn is_parented(&self) -> bool {
        self.kind.eq_ignore_ascii_case(JOIN_PARENTED)
    }

    /// Table the join starts from, given the table it is declared on
    pub fn source<'a>(&'a self, declared_on: &'a str) -> &'a str {
        self.table.as_deref().unwrap_or(declared_on)
    }
}

impl TableConfig {
    /// Field configuration of a column
    pub fn field(&self, column: &str) -> Option<&FieldConfig> {
        self.fields.get(column)
    }

    /// Include label of a column (`None` when missing or unset)
    pub fn include(&self, column: &str) -> Option<&str> {
        self.field(column).and_then(|f| f.include.as_deref())
    }

    /// Known features of a column
    pub fn features(&self, column: &str) -> Vec<Feature> {
        self.field(column).map(FieldConfig::features).unwrap_or_default()
    }

    pub fn has_feature(&self, column: &str, feature: Feature) -> bool {
        self.field(column).is_some_and(|f| f.has_feature(feature))
    }

    /// Whether a column belongs to the base model (unconfigured columns do)
    pub fn is_base(&self, column: &str) -> bool {
        self.field(column).is_none_or(FieldConfig::is_base)
    }

    /// Check configured fields and additions against the parsed table
    pub fn validate(&self, connection: &str, table: &Table) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for (name, field) in &self.fields {
            if should_include(field.include.as_deref()) && !table.has_column(name) {
                result.add_error(EngineError::unknown_field(connection, &table.name, name));
            }
        }
        for addition in &self.additions {
            if table.has_column(&addition.name) {
                result.add_error(EngineError::addition_collision(
                    connection,
                    &table.name,
                    &addition.name,
                ));
            }
        }
        for join in &self.joins {
            if !join.is_parented() {
                result.add_warning(format!(
                    "join type '{}' on table '{}' is not supported and will be skipped",
                    join.kind, table.name
                ));
            }
        }
        result
    }
}

// ============================================================================
// Load / reconcile / save
// ============================================================================

impl Config {
    /// Load `path`; a missing or empty file yields an empty tree.
    pub fn load(path: &Path) -> EngineResult<Config> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file; starting empty");
                return Ok(Config::default());
            }
            Err(e) => return Err(EngineError::file_read(path, e)),
        };
        Config::parse(&text)
    }

    /// Parse configuration text
    pub fn parse(text: &str) -> EngineResult<Config> {
        let blank = text
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#') || line == "---");
        if blank {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> EngineResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the whole tree back atomically
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        write_atomic(path, &self.to_yaml()?)?;
        info!(path = %path.display(), "Configuration updated");
        Ok(())
    }

    /// Configuration of a connection
    pub fn connection(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.get(name)
    }

    /// Configuration of a table
    pub fn table(&self, connection: &str, table: &str) -> Option<&TableConfig> {
        self.connection(connection)?.tables.get(table)
    }

    /// Grow the tree so every parsed connection, table and column has an
    /// entry, and fill in any missing `include` as `base`.
    ///
    /// Returns `true` when anything changed.
    pub fn reconcile<'a>(&mut self, connections: impl IntoIterator<Item = &'a Connection>) -> bool {
        let mut changed = false;
        for connection in connections {
            let conn_config = self
                .connections
                .entry(connection.name.clone())
                .or_insert_with(|| {
                    changed = true;
                    ConnectionConfig {
                        dialect: Some(DEFAULT_DIALECT.to_string()),
                        tables: IndexMap::new(),
                    }
                });

            for table in connection.sorted_tables() {
                let table_config = conn_config
                    .tables
                    .entry(table.name.clone())
                    .or_insert_with(|| {
                        changed = true;
                        TableConfig::default()
                    });

                for column in &table.columns {
                    let field = table_config
                        .fields
                        .entry(column.name.clone())
                        .or_insert_with(|| {
                            changed = true;
                            FieldConfig::base()
                        });
                    if field.include.is_none() {
                        field.include = Some(INCLUDE_BASE.to_string());
                        changed = true;
                    }
                }
            }
        }
        changed
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Column;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn users() -> Table {
        Table::new("users")
            .with_column(Column::new("id", "BIGSERIAL").not_null())
            .with_column(Column::new("name", "TEXT").not_null())
            .with_column(Column::new("email", "TEXT"))
    }

    fn main_connection() -> Connection {
        Connection::new("main").with_table(users())
    }

    #[test]
    fn test_include_helpers() {
        assert!(should_include(None));
        assert!(should_include(Some("base")));
        assert!(should_include(Some("admin")));
        assert!(!should_include(Some("none")));

        assert!(include_equals(None, "base"));
        assert!(!include_equals(None, "none"));
        assert!(include_equals(Some("admin"), "admin"));
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
connections:
  main:
    dialect: postgres
    tables:
      posts:
        fields:
          title:
            include: base
            feature: [sort, filter, bogus]
          secret:
            include: none
          views: {}
        additions:
          - name: score
            package: github.com/acme/metrics
            type: metrics.Score
        joins:
          - type: parented
            fields: [user, user.team]
"#;
        let config = Config::parse(yaml).unwrap();
        let posts = config.table("main", "posts").unwrap();
        assert_eq!(
            posts.features("title"),
            vec![Feature::Sort, Feature::Filter]
        );
        assert!(posts.is_base("title"));
        assert!(!posts.is_base("secret"));
        assert!(posts.is_base("views"));
        assert!(posts.is_base("unconfigured"));
        assert_eq!(posts.additions[0].type_name, "metrics.Score");
        assert!(posts.joins[0].is_parented());
        assert_eq!(posts.joins[0].source("posts"), "posts");
    }

    #[test]
    fn test_empty_and_missing_files() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
        assert_eq!(Config::parse("# only a comment\n").unwrap(), Config::default());

        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert!(config.connections.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let err = Config::parse("connections: [unclosed").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_reconcile_grows_tree() {
        let mut config = Config::default();
        assert!(config.reconcile([&main_connection()]));

        let main = config.connection("main").unwrap();
        assert_eq!(main.dialect(), "postgres");
        let users = &main.tables["users"];
        let fields: Vec<_> = users.fields.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["id", "name", "email"]);
        assert!(users
            .fields
            .values()
            .all(|f| f.include.as_deref() == Some("base")));

        // A second pass over the same tables changes nothing
        assert!(!config.reconcile([&main_connection()]));
    }

    #[test]
    fn test_reconcile_preserves_user_entries() {
        let mut config = Config::parse(
            r#"
connections:
  main:
    dialect: custom
    tables:
      users:
        fields:
          legacy:
            include: none
          email:
            feature: [filter]
          name:
            include: admin
"#,
        )
        .unwrap();
        assert!(config.reconcile([&main_connection()]));

        let main = config.connection("main").unwrap();
        assert_eq!(main.dialect(), "custom");
        let users = &main.tables["users"];
        let fields: Vec<_> = users.fields.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["legacy", "email", "name", "id"]);
        assert_eq!(users.include("legacy"), Some("none"));
        assert_eq!(users.include("email"), Some("base"));
        assert_eq!(users.features("email"), vec![Feature::Filter]);
        assert_eq!(users.include("name"), Some("admin"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = Config::default();
        config.reconcile([&main_connection()]);
        config.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("include: base"));
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_unknown_field_and_collision() {
        let config = Config::parse(
            r#"
connections:
  main:
    tables:
      users:
        fields:
          nickname: { include: base }
          dropped: { include: none }
        additions:
          - { name: email, type: string }
        joins:
          - { type: exploded, fields: [team] }
"#,
        )
        .unwrap();
        let result = config.table("main", "users").unwrap().validate("main", &users());
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.errors[0].to_string().contains("nickname"));
        assert!(result.errors[1].to_string().contains("email"));
        assert!(result.to_result().unwrap_err().is_config());
    }
}
