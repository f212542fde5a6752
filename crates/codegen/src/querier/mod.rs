//! # Querier Generation
//!
//! One sqlc query file per table:
//!
//! ```text
//! sequel/{connection}/{plural}.sql
//! ```
//!
//! ## Catalog
//!
//! For a table with singular name `S` the file holds, in this order:
//!
//! | Operation | Arity | Shape |
//! |---|---|---|
//! | `SCreate` | `:one` | insert every non-managed, non-serial column |
//! | `SOne` | `:one` | one row by id |
//! | `SOneCounted` | `:one` | one row plus a row count per child edge |
//! | `SMany` | `:many` | rows by id list |
//! | `SCount` | `:one` | filtered count |
//! | `SList` | `:many` | filtered, sorted, paginated rows |
//! | `S<F>Increase` | `:one` | atomic `+1` of each `increase` column |
//! | `SUpdate` | `:one` | partial update through nullable parameters |
//! | `SDelete` | `:one` | delete by id |
//!
//! followed by `OneWith`/`ManyWith`/`ListWith` variants for every
//! non-empty subset of the parent tables, and by `OneParentedBy` and
//! `ListParentedBy` for each configured join.

pub mod clause;
pub mod joins;

use crate::context::{GenerationContext, ParentEdge};
use crate::{GENERATED_BANNER, GeneratedFile, GeneratorConfig};
use clause::{PAGINATION, filter_conditions, list_conditions, order_clause, where_clause};
use polygon_core::EngineResult;
use polygon_core::naming::{pascal, pluralize, singularize};
use polygon_ir::{Feature, Table};
use std::fmt;
use tracing::{debug, warn};

// ============================================================================
// Query
// ============================================================================

/// Result arity annotation understood by sqlc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    One,
    Many,
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::One => write!(f, ":one"),
            Arity::Many => write!(f, ":many"),
        }
    }
}

/// A named query template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub name: String,
    pub arity: Arity,
    /// Statement text without the terminating semicolon
    pub sql: String,
}

impl Query {
    fn new(name: impl Into<String>, arity: Arity, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            arity,
            sql: lines.join("\n"),
        }
    }

    /// `-- name:` annotation followed by the statement
    pub fn render(&self) -> String {
        format!("-- name: {} {}\n{};\n", self.name, self.arity, self.sql)
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Generate the querier file of `table`.
///
/// Configured joins with an unknown type are skipped; an unresolvable join
/// path fails the table.
pub fn generate_querier(
    ctx: &GenerationContext,
    config: &GeneratorConfig,
    table: &Table,
) -> EngineResult<GeneratedFile> {
    let mut queries = catalog(ctx, table);
    queries.extend(with_variants(ctx, table));
    queries.extend(parented_by(ctx, table)?);

    let mut content = format!("-- {}. DO NOT EDIT.\n", GENERATED_BANNER);
    for query in &queries {
        content.push('\n');
        content.push_str(&query.render());
    }

    let plural = pluralize(&singularize(&table.name));
    Ok(GeneratedFile::sql(
        config.querier_path(ctx.name(), &plural),
        content,
    ))
}

// ============================================================================
// Catalog
// ============================================================================

/// The fixed per-table operations, in file order
pub fn catalog(ctx: &GenerationContext, table: &Table) -> Vec<Query> {
    let s = ctx.struct_name(table);
    let t = table.name.as_str();
    let mut queries = Vec::new();

    queries.push(create(table, &s));

    queries.push(Query::new(
        format!("{s}One"),
        Arity::One,
        vec![format!("SELECT * FROM {t} WHERE id = $1 LIMIT 1")],
    ));

    queries.push(one_counted(ctx, table, &s));

    queries.push(Query::new(
        format!("{s}Many"),
        Arity::Many,
        vec![format!("SELECT * FROM {t} WHERE id = ANY($1::BIGINT[])")],
    ));

    let mut count = vec![
        format!(
            "SELECT COALESCE(COUNT(*),0)::BIGINT AS {}_count",
            singularize(t)
        ),
        format!("FROM {t}"),
    ];
    count.extend(where_clause(&filter_conditions(ctx, table)));
    queries.push(Query::new(format!("{s}Count"), Arity::One, count));

    let mut list = vec![format!("SELECT sqlc.embed({t})"), format!("FROM {t}")];
    list.extend(where_clause(&filter_conditions(ctx, table)));
    list.extend(order_clause(ctx, table, true));
    list.push(PAGINATION.to_string());
    queries.push(Query::new(format!("{s}List"), Arity::Many, list));

    let touch = if table.has_column("updated_at") {
        ", updated_at = CURRENT_TIMESTAMP"
    } else {
        ""
    };
    for column in ctx.feature_columns(table, Feature::Increase) {
        let c = &column.name;
        queries.push(Query::new(
            format!("{s}{}Increase", pascal(c)),
            Arity::One,
            vec![format!(
                "UPDATE {t} SET {c} = COALESCE({c}, 0) + 1{touch} WHERE id = $1 RETURNING *"
            )],
        ));
    }

    queries.push(update(table, &s));

    queries.push(Query::new(
        format!("{s}Delete"),
        Arity::One,
        vec![format!("DELETE FROM {t} WHERE id = $1 RETURNING *")],
    ));

    queries
}

fn create(table: &Table, s: &str) -> Query {
    let columns: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| !c.is_managed() && !c.is_serial())
        .map(|c| c.name.as_str())
        .collect();

    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table.name)
    } else {
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table.name,
            columns.join(", "),
            placeholders.join(", ")
        )
    };
    Query::new(format!("{s}Create"), Arity::One, vec![sql])
}

fn one_counted(ctx: &GenerationContext, table: &Table, s: &str) -> Query {
    let t = table.name.as_str();
    let mut projection = vec![format!("sqlc.embed({t})")];
    for child in ctx.children(t) {
        let (from, scope) = if child.table == t {
            (format!("{t} child"), "child".to_string())
        } else {
            (child.table.clone(), child.table.clone())
        };
        projection.push(format!(
            "(SELECT COALESCE(COUNT(*),0)::BIGINT FROM {from} WHERE {scope}.{} = {t}.{}) AS {}",
            child.column, child.ref_column, child.count_alias
        ));
    }
    Query::new(
        format!("{s}OneCounted"),
        Arity::One,
        vec![
            format!("SELECT {}", projection.join(",\n       ")),
            format!("FROM {t}"),
            format!("WHERE {t}.id = $1 LIMIT 1"),
        ],
    )
}

fn update(table: &Table, s: &str) -> Query {
    let mut sets: Vec<String> = table
        .columns
        .iter()
        .filter(|c| !c.is_managed())
        .map(|c| format!("{0} = COALESCE(sqlc.narg('{0}'), {0})", c.name))
        .collect();
    if table.has_column("updated_at") {
        sets.push("updated_at = CURRENT_TIMESTAMP".to_string());
    }
    if sets.is_empty() {
        sets.push("id = id".to_string());
    }
    Query::new(
        format!("{s}Update"),
        Arity::One,
        vec![
            format!("UPDATE {}", table.name),
            format!("SET {}", sets.join(",\n    ")),
            "WHERE id = sqlc.narg('id')::BIGINT".to_string(),
            "RETURNING *".to_string(),
        ],
    )
}

// ============================================================================
// Parent join variants
// ============================================================================

/// Non-empty subsets of `0..k`: singletons in order, then every bitmask
/// with two or more bits in ascending order.
pub fn parent_subsets(k: usize) -> Vec<Vec<usize>> {
    let mut subsets: Vec<Vec<usize>> = (0..k).map(|i| vec![i]).collect();
    if k >= 2 {
        for mask in 1u64..(1u64 << k) {
            if mask.count_ones() >= 2 {
                subsets.push((0..k).filter(|i| mask & (1 << i) != 0).collect());
            }
        }
    }
    subsets
}

/// `OneWith`, `ManyWith` and `ListWith` for every subset of parents
pub fn with_variants(ctx: &GenerationContext, table: &Table) -> Vec<Query> {
    let parents = ctx.parents(&table.name);
    // Wider tables would need more variants than a 64-bit mask can enumerate
    if parents.len() >= 64 {
        warn!(table = %table.name, "Too many parent tables, skipping join variants");
        return Vec::new();
    }

    let s = ctx.struct_name(table);
    let t = table.name.as_str();
    let mut queries = Vec::new();

    for subset in parent_subsets(parents.len()) {
        let selected: Vec<&ParentEdge> = subset.iter().map(|&i| &parents[i]).collect();
        let label: String = selected.iter().map(|e| e.label.as_str()).collect();

        let mut projection = vec![format!("sqlc.embed({t})")];
        projection.extend(selected.iter().map(|e| format!("sqlc.embed({})", e.relation)));
        let select = format!("SELECT {}", projection.join(", "));
        let joins: Vec<String> = selected.iter().map(|e| e.join_clause(t)).collect();

        let mut one = vec![select.clone(), format!("FROM {t}")];
        one.extend(joins.iter().cloned());
        one.push(format!("WHERE {t}.id = $1"));
        one.push("LIMIT 1".to_string());
        queries.push(Query::new(format!("{s}OneWith{label}"), Arity::One, one));

        let mut many = vec![select.clone(), format!("FROM {t}")];
        many.extend(joins.iter().cloned());
        many.push(format!("WHERE {t}.id = ANY($1::BIGINT[])"));
        queries.push(Query::new(format!("{s}ManyWith{label}"), Arity::Many, many));

        let conditions = list_conditions(ctx, table, &selected);
        let mut group = vec![format!("{t}.id")];
        group.extend(selected.iter().map(|e| format!("{}.{}", e.relation, e.ref_column)));

        let mut list = vec![select, format!("FROM {t}")];
        list.extend(joins);
        list.extend(where_clause(&conditions));
        list.push(format!("GROUP BY {}", group.join(", ")));
        list.extend(order_clause(ctx, table, false));
        list.push(PAGINATION.to_string());
        queries.push(Query::new(format!("{s}ListWith{label}"), Arity::Many, list));
    }
    queries
}

// ============================================================================
// Configured joins
// ============================================================================

/// `OneParentedBy` and `ListParentedBy` for every configured join starting
/// at `table`
pub fn parented_by(ctx: &GenerationContext, table: &Table) -> EngineResult<Vec<Query>> {
    let s = ctx.struct_name(table);
    let t = table.name.as_str();
    let mut queries = Vec::new();

    for (declared_on, join) in ctx.joins_from(t) {
        if !join.is_parented() {
            debug!(table = %declared_on, kind = %join.kind, "Skipping join");
            continue;
        }

        let chain = joins::resolve(ctx, table, join)?;
        let mut projection = vec![format!("sqlc.embed({t})")];
        projection.extend(chain.aliases.iter().map(|a| format!("sqlc.embed({})", a)));
        let select = format!("SELECT {}", projection.join(", "));

        let mut one = vec![select.clone(), format!("FROM {t}")];
        one.extend(chain.joins.iter().cloned());
        one.push(format!("WHERE {t}.id = $1"));
        one.push("LIMIT 1".to_string());
        queries.push(Query::new(
            format!("{s}OneParentedBy{}", chain.suffix),
            Arity::One,
            one,
        ));

        let mut group = vec![format!("{t}.id")];
        group.extend(chain.keys.iter().cloned());

        let mut list = vec![select, format!("FROM {t}")];
        list.extend(chain.joins.iter().cloned());
        list.extend(where_clause(&filter_conditions(ctx, table)));
        list.push(format!("GROUP BY {}", group.join(", ")));
        list.extend(order_clause(ctx, table, false));
        list.push(PAGINATION.to_string());
        queries.push(Query::new(
            format!("{s}ListParentedBy{}", chain.suffix),
            Arity::Many,
            list,
        ));
    }
    Ok(queries)
}

// ============================================================================
// Tests
// ============================================================================
