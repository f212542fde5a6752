//! WHERE, ORDER BY and pagination clauses shared by the list-shaped queries

use crate::context::{GenerationContext, ParentEdge, unique};
use polygon_core::naming::{singularize, snake};
use polygon_ir::{Column, Feature, Table};
use std::collections::HashSet;

/// Pagination clause of every list query
pub const PAGINATION: &str = "LIMIT sqlc.narg('limit')::INT OFFSET sqlc.narg('offset')::INT";

/// `(sqlc.narg('p')::CAST IS NULL OR target = ANY(sqlc.narg('p')::CAST))`
pub fn any_condition(param: &str, cast: &str, target: &str) -> String {
    format!(
        "(sqlc.narg('{param}')::{cast} IS NULL OR {target} = ANY(sqlc.narg('{param}')::{cast}))"
    )
}

fn column_cast(table: &Table, column: &str) -> String {
    table
        .column(column)
        .map(|c| c.kind().array_cast())
        .unwrap_or_else(|| "BIGINT[]".to_string())
}

/// Filter conditions of `table`: one per parent edge, then one per column
/// carrying the `filter` feature.
pub fn filter_conditions(ctx: &GenerationContext, table: &Table) -> Vec<String> {
    list_conditions(ctx, table, &[])
}

/// Filter conditions of `table` followed by the `filter` columns of each
/// joined parent, scoped by the parent's relation. Parameter names are
/// unique across the whole list.
pub fn list_conditions(ctx: &GenerationContext, table: &Table, joined: &[&ParentEdge]) -> Vec<String> {
    let parents = ctx.parents(&table.name);
    let mut params: HashSet<String> = parents.iter().map(ParentEdge::filter_param).collect();
    let mut conditions = Vec::new();

    for edge in parents {
        conditions.push(any_condition(
            &edge.filter_param(),
            &column_cast(table, &edge.column),
            &format!("{}.{}", table.name, edge.column),
        ));
    }
    for column in ctx.feature_columns(table, Feature::Filter) {
        let param = unique(&mut params, format!("{}_ids", column.name), || {
            format!("{}_{}_ids", singularize(&table.name), column.name)
        });
        conditions.push(feature_condition(&param, &table.name, column));
    }
    for edge in joined {
        conditions.extend(parent_filter_conditions(ctx, edge, &mut params));
    }
    conditions
}

fn parent_filter_conditions(
    ctx: &GenerationContext,
    edge: &ParentEdge,
    params: &mut HashSet<String>,
) -> Vec<String> {
    let Some(parent) = ctx.table(&edge.table) else {
        return Vec::new();
    };
    let prefix = if edge.is_aliased() {
        snake(&edge.label)
    } else {
        singularize(&edge.table)
    };
    ctx.feature_columns(parent, Feature::Filter)
        .into_iter()
        .map(|column| {
            let param = unique(&mut *params, format!("{}_{}_ids", prefix, column.name), || {
                format!("{}_{}_ids", edge.relation, column.name)
            });
            feature_condition(&param, &edge.relation, column)
        })
        .collect()
}

fn feature_condition(param: &str, relation: &str, column: &Column) -> String {
    any_condition(
        param,
        &column.kind().array_cast(),
        &format!("{}.{}", relation, column.name),
    )
}

/// `WHERE a\n  AND b`, or `None` when there is nothing to filter on
pub fn where_clause(conditions: &[String]) -> Option<String> {
    if conditions.is_empty() {
        return None;
    }
    Some(format!("WHERE {}", conditions.join("\n  AND ")))
}

/// ORDER BY clause driven by the `sort` and `order` parameters.
///
/// Every sortable column gets an ascending and a descending case. With
/// `default_order` the first sortable column also orders rows when no
/// `sort` is given.
pub fn order_clause(ctx: &GenerationContext, table: &Table, default_order: bool) -> Option<String> {
    let columns = ctx.feature_columns(table, Feature::Sort);
    let first = columns.first()?;

    let mut cases = Vec::new();
    if default_order {
        cases.push(format!(
            "CASE WHEN sqlc.narg('sort')::TEXT IS NULL THEN {}.{} END ASC",
            table.name, first.name
        ));
    }
    for column in &columns {
        let target = format!("{}.{}", table.name, column.name);
        cases.push(format!(
            "CASE WHEN sqlc.narg('sort')::TEXT = '{}' AND COALESCE(sqlc.narg('order')::TEXT, 'asc') = 'asc' THEN {} END ASC",
            column.name, target
        ));
        cases.push(format!(
            "CASE WHEN sqlc.narg('sort')::TEXT = '{}' AND sqlc.narg('order')::TEXT = 'desc' THEN {} END DESC",
            column.name, target
        ));
    }
    Some(format!("ORDER BY\n    {}", cases.join(",\n    ")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::blog;
    use polygon_ir::Config;

    #[test]
    fn test_fk_filter() {
        let conn = blog();
        let ctx = GenerationContext::new(&conn, None, None);
        let conditions = filter_conditions(&ctx, conn.table("posts").unwrap());
        assert_eq!(
            conditions,
            vec![
                "(sqlc.narg('user_ids')::BIGINT[] IS NULL OR posts.user_id = ANY(sqlc.narg('user_ids')::BIGINT[]))"
            ]
        );
    }

    #[test]
    fn test_feature_filters_and_order() {
        let conn = blog();
        let config = Config::parse(
            r#"
connections:
  main:
    tables:
      users:
        fields:
          name: { include: base, feature: [filter, sort] }
"#,
        )
        .unwrap();
        let ctx = GenerationContext::new(&conn, config.connection("main"), None);
        let users = conn.table("users").unwrap();

        assert_eq!(
            where_clause(&filter_conditions(&ctx, users)).unwrap(),
            "WHERE (sqlc.narg('name_ids')::TEXT[] IS NULL OR users.name = ANY(sqlc.narg('name_ids')::TEXT[]))"
        );

        let order = order_clause(&ctx, users, true).unwrap();
        assert!(order.contains("CASE WHEN sqlc.narg('sort')::TEXT IS NULL THEN users.name END ASC"));
        assert!(order.contains("THEN users.name END DESC"));
        assert!(!order_clause(&ctx, users, false).unwrap().contains("IS NULL"));

        let posts = conn.table("posts").unwrap();
        let edge = &ctx.parents("posts")[0];
        assert_eq!(
            list_conditions(&ctx, posts, &[edge])[1],
            "(sqlc.narg('user_name_ids')::TEXT[] IS NULL OR users.name = ANY(sqlc.narg('user_name_ids')::TEXT[]))"
        );
    }

    #[test]
    fn test_filter_params_do_not_collide() {
        let mut conn = polygon_ir::Connection::new("main");
        polygon_ir::parse_into(
            &mut conn,
            "CREATE TABLE users (id BIGSERIAL PRIMARY KEY, name TEXT);\n\
             CREATE TABLE posts (id BIGSERIAL PRIMARY KEY, user_id BIGINT REFERENCES users(id), user TEXT, user_name TEXT);\n",
        );
        let config = Config::parse(
            r#"
connections:
  main:
    tables:
      users:
        fields:
          name: { include: base, feature: [filter] }
      posts:
        fields:
          user: { include: base, feature: [filter] }
          user_name: { include: base, feature: [filter] }
"#,
        )
        .unwrap();
        let ctx = GenerationContext::new(&conn, config.connection("main"), None);
        let posts = conn.table("posts").unwrap();
        let edge = &ctx.parents("posts")[0];

        let conditions = list_conditions(&ctx, posts, &[edge]);
        assert_eq!(conditions.len(), 4);
        assert!(conditions[0].starts_with("(sqlc.narg('user_ids')::BIGINT[] IS NULL OR posts.user_id"));
        assert!(conditions[1].starts_with("(sqlc.narg('post_user_ids')::TEXT[] IS NULL OR posts.user ="));
        assert!(conditions[2].starts_with("(sqlc.narg('user_name_ids')::TEXT[] IS NULL OR posts.user_name ="));
        assert!(conditions[3].starts_with("(sqlc.narg('users_name_ids')::TEXT[] IS NULL OR users.name ="));
    }

    #[test]
    fn test_empty_clauses() {
        let conn = blog();
        let ctx = GenerationContext::new(&conn, None, None);
        let users = conn.table("users").unwrap();
        assert!(where_clause(&filter_conditions(&ctx, users)).is_none());
        assert!(order_clause(&ctx, users, true).is_none());
    }
}
