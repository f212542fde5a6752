//! Configured join chains
//!
//! A `parented` join lists dot paths over foreign keys (`user`,
//! `user.team`). Each hop is resolved against the current table: first by
//! foreign-key column (`user` or `user_id`), then by referenced table name.
//! Every hop is joined once under a stable `joined_<segments>` alias, so
//! paths sharing a prefix share its joins.

use crate::context::GenerationContext;
use polygon_core::naming::{pascal, pluralize, singularize};
use polygon_core::{EngineError, EngineResult};
use polygon_ir::{ForeignKey, JoinConfig, Table};
use std::collections::{HashMap, HashSet};

/// A resolved join chain, ready to be rendered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinChain {
    /// Operation suffix (`UserAndUserTeam`)
    pub suffix: String,

    /// `LEFT JOIN` clauses in resolution order
    pub joins: Vec<String>,

    /// Aliases in resolution order
    pub aliases: Vec<String>,

    /// Referenced key of each alias (`joined_user.id`), for grouping
    pub keys: Vec<String>,
}

/// Resolve every path of `join` starting at `table`
pub fn resolve(
    ctx: &GenerationContext,
    table: &Table,
    join: &JoinConfig,
) -> EngineResult<JoinChain> {
    let mut chain = JoinChain::default();
    let mut by_prefix: HashMap<String, String> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();

    for path in &join.fields {
        let mut current = table;
        let mut relation = table.name.clone();
        let mut prefix: Vec<&str> = Vec::new();

        for segment in path.split('.').map(str::trim) {
            let unresolved = || EngineError::JoinPathUnresolved {
                connection: ctx.name().to_string(),
                table: table.name.clone(),
                path: path.clone(),
                segment: segment.to_string(),
            };
            let fk = hop(current, segment).ok_or_else(unresolved)?;
            let parent = ctx.table(&fk.table).ok_or_else(unresolved)?;
            prefix.push(segment);

            let key = prefix.join(".");
            let alias = match by_prefix.get(&key) {
                Some(alias) => alias.clone(),
                None => {
                    let alias = unique_alias(&mut taken, &prefix);
                    let key = format!("{}.{}", alias, fk.ref_column.as_deref().unwrap_or("id"));
                    chain.joins.push(format!(
                        "LEFT JOIN {} {} ON {}.{} = {}",
                        fk.table, alias, relation, fk.column, key
                    ));
                    chain.aliases.push(alias.clone());
                    chain.keys.push(key.clone());
                    by_prefix.insert(key, alias.clone());
                    alias
                }
            };

            current = parent;
            relation = alias;
        }
    }

    chain.suffix = match &join.name {
        Some(name) if !name.trim().is_empty() => pascal(name),
        _ => join
            .fields
            .iter()
            .map(|path| path.split('.').map(|s| pascal(s.trim())).collect::<String>())
            .collect::<Vec<_>>()
            .join("And"),
    };
    Ok(chain)
}

/// The foreign key a path segment walks through
fn hop(table: &Table, segment: &str) -> Option<ForeignKey> {
    let foreign_keys = table.foreign_keys();
    let by_column = foreign_keys
        .iter()
        .find(|fk| fk.column == segment || fk.column == format!("{}_id", segment));
    let by_table = || {
        foreign_keys.iter().find(|fk| {
            fk.table == segment || fk.table == pluralize(segment) || singularize(&fk.table) == segment
        })
    };
    by_column.or_else(by_table).cloned()
}

fn unique_alias(taken: &mut HashSet<String>, prefix: &[&str]) -> String {
    let base = format!("joined_{}", prefix.join("_"));
    let mut alias = base.clone();
    let mut n = 2;
    while taken.contains(&alias) {
        alias = format!("{}{}", base, n);
        n += 1;
    }
    taken.insert(alias.clone());
    alias
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{blog, fk};
    use polygon_ir::{Column, Connection};

    fn join(fields: &[&str]) -> JoinConfig {
        JoinConfig {
            kind: "parented".into(),
            table: None,
            fields: fields.iter().map(|s| s.to_string()).collect(),
            name: None,
        }
    }

    fn teams() -> Connection {
        let conn = blog();
        let users = conn
            .table("users")
            .cloned()
            .unwrap()
            .with_column(Column::new("team_id", "BIGINT"));
        conn.with_table(fk(users, "team_id", "teams"))
            .with_table(Table::new("teams").with_column(Column::new("id", "BIGSERIAL")))
    }

    #[test]
    fn test_resolve_by_column_and_table() {
        let conn = teams();
        let ctx = GenerationContext::new(&conn, None, None);
        let posts = conn.table("posts").unwrap();

        let chain = resolve(&ctx, posts, &join(&["user", "user.team"])).unwrap();
        assert_eq!(chain.suffix, "UserAndUserTeam");
        assert_eq!(chain.aliases, vec!["joined_user", "joined_user_team"]);
        assert_eq!(
            chain.joins,
            vec![
                "LEFT JOIN users joined_user ON posts.user_id = joined_user.id",
                "LEFT JOIN teams joined_user_team ON joined_user.team_id = joined_user_team.id",
            ]
        );

        let by_table = resolve(&ctx, posts, &join(&["users"])).unwrap();
        assert_eq!(
            by_table.joins,
            vec!["LEFT JOIN users joined_users ON posts.user_id = joined_users.id"]
        );
    }

    #[test]
    fn test_recipient_column_hop() {
        let conn = blog();
        let ctx = GenerationContext::new(&conn, None, None);
        let messages = conn.table("messages").unwrap();
        let mut config = join(&["recipient"]);
        config.name = Some("recipient".into());

        let chain = resolve(&ctx, messages, &config).unwrap();
        assert_eq!(chain.suffix, "Recipient");
        assert_eq!(
            chain.joins,
            vec!["LEFT JOIN users joined_recipient ON messages.recipient_id = joined_recipient.id"]
        );
    }

    #[test]
    fn test_unresolved_segment() {
        let conn = blog();
        let ctx = GenerationContext::new(&conn, None, None);
        let err = resolve(&ctx, conn.table("posts").unwrap(), &join(&["user.team"])).unwrap_err();
        match err {
            EngineError::JoinPathUnresolved { path, segment, .. } => {
                assert_eq!(path, "user.team");
                assert_eq!(segment, "team");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
