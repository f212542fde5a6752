//! # Generation Context
//!
//! The `GenerationContext` holds all the information the emitters need for
//! one connection. It is built from a parsed [`Connection`] plus its
//! configuration and provides:
//!
//! - Sorted table lists and per-table configuration lookups
//! - The foreign-key graph: parent edges (tables a table points at) and
//!   child edges (tables pointing at it), with stable, collision-free names
//! - Column classification (base, contraction, sortable, filterable, ...)
//! - SQL to Go type mapping, honouring downstream overrides
//!

use polygon_core::naming::{pascal, pascal_singular, pluralize, singularize, snake};
use polygon_core::{GoType, SqlType};
use polygon_ir::{
    Column, Connection, ConnectionConfig, Feature, JoinConfig, SqlcConfig, Table, TableConfig,
};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// Edges
// ============================================================================

/// A foreign key seen from the declaring table: `table.column → parent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentEdge {
    /// Foreign-key column on the declaring table
    pub column: String,

    /// Referenced table
    pub table: String,

    /// Referenced column (`id` unless spelled out)
    pub ref_column: String,

    /// Pascal label used in struct fields and operation names
    /// (`User`, `UserRecipientId`)
    pub label: String,

    /// Name the parent is joined under (`users`, `users_recipient_id`)
    pub relation: String,

    /// Prefix of this edge's filter parameters (`user`, `recipient`)
    pub param: String,
}

impl ParentEdge {
    /// Whether the parent is joined under an alias
    pub fn is_aliased(&self) -> bool {
        self.relation != self.table
    }

    /// `LEFT JOIN` clause joining this parent onto `from`
    pub fn join_clause(&self, from: &str) -> String {
        let target = if self.is_aliased() {
            format!("{} {}", self.table, self.relation)
        } else {
            self.table.clone()
        };
        format!(
            "LEFT JOIN {} ON {}.{} = {}.{}",
            target, from, self.column, self.relation, self.ref_column
        )
    }

    /// Name of the id-list filter parameter (`user_ids`)
    pub fn filter_param(&self) -> String {
        format!("{}_ids", self.param)
    }
}

/// A foreign key seen from the referenced table: `child.column → table`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEdge {
    /// Child table
    pub table: String,

    /// Foreign-key column on the child
    pub column: String,

    /// Referenced column on this table
    pub ref_column: String,

    /// Collection field name on the joined model (`Posts`)
    pub field: String,

    /// Alias of the counted subquery (`post_count`)
    pub count_alias: String,
}

// ============================================================================
// GenerationContext
// ============================================================================

/// Context carrying all information needed for generating one connection.
#[derive(Debug, Clone)]
pub struct GenerationContext<'a> {
    /// Parsed tables and routines
    pub connection: &'a Connection,

    /// `sequel.yml` entry of this connection
    pub config: Option<&'a ConnectionConfig>,

    /// Downstream generator configuration (type overrides)
    pub sqlc: Option<&'a SqlcConfig>,

    parents: BTreeMap<String, Vec<ParentEdge>>,
    children: BTreeMap<String, Vec<ChildEdge>>,
    unconfigured: TableConfig,
}

impl<'a> GenerationContext<'a> {
    // ====================================================================
    // Construction
    // ====================================================================

    /// Build the context and the foreign-key graph of `connection`.
    pub fn new(
        connection: &'a Connection,
        config: Option<&'a ConnectionConfig>,
        sqlc: Option<&'a SqlcConfig>,
    ) -> Self {
        let mut parents = BTreeMap::new();
        for table in connection.sorted_tables() {
            parents.insert(table.name.clone(), Self::parent_edges(connection, table));
        }

        let mut children: BTreeMap<String, Vec<ChildEdge>> = BTreeMap::new();
        for (child, edges) in &parents {
            for edge in edges {
                let list = children.entry(edge.table.clone()).or_default();
                let child_edge = Self::child_edge(list, child, edge);
                list.push(child_edge);
            }
        }

        Self {
            connection,
            config,
            sqlc,
            parents,
            children,
            unconfigured: TableConfig::default(),
        }
    }

    /// Parent edges of `table` in column order, with unique labels,
    /// relations and parameter names.
    fn parent_edges(connection: &Connection, table: &Table) -> Vec<ParentEdge> {
        let mut edges: Vec<ParentEdge> = Vec::new();
        let mut labels = HashSet::new();
        let mut relations = HashSet::from([table.name.clone()]);
        let mut params = HashSet::new();

        for fk in table.foreign_keys() {
            if connection.table(&fk.table).is_none() {
                continue;
            }
            let singular = singularize(&fk.table);

            let label = unique(
                &mut labels,
                pascal_singular(&fk.table),
                || format!("{}{}", pascal_singular(&fk.table), pascal(&fk.column)),
            );
            let relation = unique(&mut relations, fk.table.clone(), || {
                format!("{}_{}", fk.table, fk.column)
            });
            let param = unique(&mut params, singular.clone(), || {
                let stem = fk.column.strip_suffix("_id").unwrap_or(&fk.column);
                snake(stem)
            });

            edges.push(ParentEdge {
                column: fk.column.clone(),
                table: fk.table.clone(),
                ref_column: fk.ref_column.clone().unwrap_or_else(|| "id".to_string()),
                label,
                relation,
                param,
            });
        }
        edges
    }

    fn child_edge(existing: &[ChildEdge], child: &str, edge: &ParentEdge) -> ChildEdge {
        let mut fields: HashSet<String> = existing.iter().map(|c| c.field.clone()).collect();
        let mut aliases: HashSet<String> =
            existing.iter().map(|c| c.count_alias.clone()).collect();
        let singular = singularize(child);

        let field = unique(&mut fields, pascal(&pluralize(&singular)), || {
            format!("{}{}", pascal(&pluralize(&singular)), pascal(&edge.column))
        });
        let count_alias = unique(&mut aliases, format!("{}_count", singular), || {
            format!("{}_{}_count", singular, edge.column)
        });

        ChildEdge {
            table: child.to_string(),
            column: edge.column.clone(),
            ref_column: edge.ref_column.clone(),
            field,
            count_alias,
        }
    }

    // ====================================================================
    // Tables
    // ====================================================================

    /// Connection name
    pub fn name(&self) -> &str {
        &self.connection.name
    }

    /// Dialect label, configuration first
    pub fn dialect(&self) -> &str {
        match self.config {
            Some(config) => config.dialect(),
            None => &self.connection.dialect,
        }
    }

    /// Tables in sorted name order
    pub fn tables(&self) -> impl Iterator<Item = &'a Table> {
        self.connection.sorted_tables()
    }

    /// Get a table by name
    pub fn table(&self, name: &str) -> Option<&'a Table> {
        self.connection.table(name)
    }

    /// Configuration of a table; unconfigured tables get the defaults
    pub fn table_config(&self, table: &str) -> &TableConfig {
        self.config
            .and_then(|c| c.tables.get(table))
            .unwrap_or(&self.unconfigured)
    }

    /// Foreign keys of `table` whose referenced table exists, in column order
    pub fn parents(&self, table: &str) -> &[ParentEdge] {
        self.parents.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    /// Foreign keys pointing at `table`, by child name then column order
    pub fn children(&self, table: &str) -> &[ChildEdge] {
        self.children.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    /// Configured joins whose paths start at `table`, with the table each
    /// one is declared on
    pub fn joins_from(&self, table: &str) -> Vec<(&'a str, &'a JoinConfig)> {
        let Some(config) = self.config else {
            return Vec::new();
        };
        let mut joins = Vec::new();
        for declared in self.tables() {
            if let Some(table_config) = config.tables.get(&declared.name) {
                for join in &table_config.joins {
                    if join.source(&declared.name) == table {
                        joins.push((declared.name.as_str(), join));
                    }
                }
            }
        }
        joins
    }

    // ====================================================================
    // Naming
    // ====================================================================

    /// Pascal singular of a table (`users` → `User`)
    pub fn struct_name(&self, table: &Table) -> String {
        pascal_singular(&table.name)
    }

    // ====================================================================
    // Columns
    // ====================================================================

    /// Columns included in the base model
    pub fn base_columns<'t>(&self, table: &'t Table) -> Vec<&'t Column> {
        let config = self.table_config(&table.name);
        table.columns.iter().filter(|c| config.is_base(&c.name)).collect()
    }

    /// Columns excluded from the base model
    pub fn contraction_columns<'t>(&self, table: &'t Table) -> Vec<&'t Column> {
        let config = self.table_config(&table.name);
        table.columns.iter().filter(|c| !config.is_base(&c.name)).collect()
    }

    /// Columns carrying `feature`, in declaration order
    pub fn feature_columns<'t>(&self, table: &'t Table, feature: Feature) -> Vec<&'t Column> {
        let config = self.table_config(&table.name);
        table
            .columns
            .iter()
            .filter(|c| config.has_feature(&c.name, feature))
            .collect()
    }

    /// Go type of a column, honouring downstream overrides for JSON columns
    pub fn host_type(&self, table: &Table, column: &Column) -> GoType {
        let kind = column.kind();
        if kind == SqlType::Json {
            if let Some(go_type) = self
                .sqlc
                .and_then(|s| s.column_override(&table.name, &column.name))
            {
                return go_type;
            }
        }
        kind.go_type(&column.name)
    }
}

/// `first` if unused, otherwise `fallback()`, otherwise `fallback()` with a
/// numeric suffix. The returned name is recorded in `taken`.
pub(crate) fn unique(
    taken: &mut HashSet<String>,
    first: String,
    fallback: impl Fn() -> String,
) -> String {
    let name = if !taken.contains(&first) {
        first
    } else {
        let base = fallback();
        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{}{}", base, n);
            n += 1;
        }
        candidate
    };
    taken.insert(name.clone());
    name
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use polygon_ir::{Config, Constraint};

    pub(crate) fn fk(table: Table, column: &str, parent: &str) -> Table {
        table.with_constraint(Constraint::foreign_key(
            vec![column.to_string()],
            parent,
            Some("id"),
        ))
    }

    /// users, posts(user_id), messages(author_id, recipient_id), categories(parent_id)
    pub(crate) fn blog() -> Connection {
        let users = Table::new("users")
            .with_column(Column::new("id", "BIGSERIAL").not_null())
            .with_column(Column::new("name", "TEXT").not_null())
            .with_column(Column::new("email", "TEXT"))
            .with_constraint(Constraint::primary_key(vec!["id".into()]));
        let posts = fk(
            Table::new("posts")
                .with_column(Column::new("id", "BIGSERIAL").not_null())
                .with_column(Column::new("user_id", "BIGINT"))
                .with_column(Column::new("body", "TEXT"))
                .with_constraint(Constraint::primary_key(vec!["id".into()])),
            "user_id",
            "users",
        );
        let messages = fk(
            fk(
                Table::new("messages")
                    .with_column(Column::new("id", "BIGSERIAL").not_null())
                    .with_column(Column::new("author_id", "BIGINT"))
                    .with_column(Column::new("recipient_id", "BIGINT"))
                    .with_constraint(Constraint::primary_key(vec!["id".into()])),
                "author_id",
                "users",
            ),
            "recipient_id",
            "users",
        );
        let categories = fk(
            Table::new("categories")
                .with_column(Column::new("id", "BIGSERIAL").not_null())
                .with_column(Column::new("parent_id", "BIGINT")),
            "parent_id",
            "categories",
        );
        Connection::new("main")
            .with_table(users)
            .with_table(posts)
            .with_table(messages)
            .with_table(categories)
    }

    #[test]
    fn test_parent_edges() {
        let conn = blog();
        let ctx = GenerationContext::new(&conn, None, None);

        let posts = ctx.parents("posts");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].label, "User");
        assert_eq!(posts[0].relation, "users");
        assert_eq!(posts[0].filter_param(), "user_ids");
        assert_eq!(
            posts[0].join_clause("posts"),
            "LEFT JOIN users ON posts.user_id = users.id"
        );

        let messages = ctx.parents("messages");
        let labels: Vec<_> = messages.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["User", "UserRecipientId"]);
        assert_eq!(messages[1].relation, "users_recipient_id");
        assert_eq!(messages[1].filter_param(), "recipient_ids");
        assert_eq!(
            messages[1].join_clause("messages"),
            "LEFT JOIN users users_recipient_id ON messages.recipient_id = users_recipient_id.id"
        );

        assert!(ctx.parents("users").is_empty());
    }

    #[test]
    fn test_self_reference_is_aliased() {
        let conn = blog();
        let ctx = GenerationContext::new(&conn, None, None);
        let edge = &ctx.parents("categories")[0];
        assert_eq!(edge.label, "Category");
        assert_eq!(edge.relation, "categories_parent_id");
    }

    #[test]
    fn test_child_edges() {
        let conn = blog();
        let ctx = GenerationContext::new(&conn, None, None);

        let users: Vec<_> = ctx
            .children("users")
            .iter()
            .map(|c| (c.table.as_str(), c.field.as_str(), c.count_alias.as_str()))
            .collect();
        assert_eq!(
            users,
            vec![
                ("messages", "Messages", "message_count"),
                ("messages", "MessagesRecipientId", "message_recipient_id_count"),
                ("posts", "Posts", "post_count"),
            ]
        );
        assert_eq!(ctx.children("categories")[0].field, "Categories");
    }

    #[test]
    fn test_missing_parent_table_is_ignored() {
        let conn = Connection::new("main").with_table(fk(
            Table::new("posts").with_column(Column::new("user_id", "BIGINT")),
            "user_id",
            "users",
        ));
        let ctx = GenerationContext::new(&conn, None, None);
        assert!(ctx.parents("posts").is_empty());
    }

    #[test]
    fn test_column_classification() {
        let conn = blog();
        let config = Config::parse(
            r#"
connections:
  main:
    tables:
      users:
        fields:
          email: { include: none, feature: [filter, sort] }
          name: { include: base, feature: [sort] }
"#,
        )
        .unwrap();
        let ctx = GenerationContext::new(&conn, config.connection("main"), None);
        let users = conn.table("users").unwrap();

        let names = |cols: Vec<&Column>| cols.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(ctx.base_columns(users)), vec!["id", "name"]);
        assert_eq!(names(ctx.contraction_columns(users)), vec!["email"]);
        assert_eq!(
            names(ctx.feature_columns(users, Feature::Sort)),
            vec!["name", "email"]
        );
        assert_eq!(ctx.dialect(), "postgres");
    }

    #[test]
    fn test_host_types() {
        let conn = blog();
        let ctx = GenerationContext::new(&conn, None, None);
        let users = conn.table("users").unwrap();
        let id = users.column("id").unwrap();
        assert_eq!(ctx.host_type(users, id).to_string(), "*uint64");

        let json = Column::new("settings", "JSONB");
        assert_eq!(ctx.host_type(users, &json).to_string(), "any");
    }
}
