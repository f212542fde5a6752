//! # Schema Generation
//!
//! One consolidated SQL document per connection:
//!
//! ```text
//! sequel/{connection}.sql
//! ```
//!
//! The document is rebuilt from the parsed tables on every run: a header,
//! each table's canonical `CREATE TABLE` in sorted name order, then the
//! functions and triggers, each group sorted by name.

use crate::context::GenerationContext;
use crate::{GENERATED_BANNER, GeneratedFile, GeneratorConfig};

/// Generate the schema document of a connection
pub fn generate_schema(ctx: &GenerationContext, config: &GeneratorConfig) -> GeneratedFile {
    let mut blocks: Vec<String> = Vec::new();

    blocks.push(format!(
        "-- {}. DO NOT EDIT.\n-- connection: {}\n-- dialect: {}\n",
        GENERATED_BANNER,
        ctx.name(),
        ctx.dialect()
    ));

    for table in ctx.tables() {
        blocks.push(table.to_create_sql());
    }

    let routines = ctx
        .connection
        .functions
        .values()
        .chain(ctx.connection.triggers.values());
    for routine in routines {
        let mut body = routine.body.trim().to_string();
        body.push('\n');
        blocks.push(body);
    }

    GeneratedFile::sql(config.schema_path(ctx.name()), blocks.join("\n"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use polygon_ir::{Connection, parse_into};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_schema_document() {
        let mut conn = Connection::new("main");
        parse_into(
            &mut conn,
            "CREATE TABLE users (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL);\n\
             CREATE TABLE accounts (id BIGSERIAL PRIMARY KEY);\n\
             CREATE FUNCTION touch() RETURNS trigger AS $$ BEGIN RETURN NEW; END; $$ LANGUAGE plpgsql;\n\
             CREATE TRIGGER users_touch BEFORE UPDATE ON users FOR EACH ROW EXECUTE FUNCTION touch();\n",
        );
        let ctx = GenerationContext::new(&conn, None, None);
        let file = generate_schema(&ctx, &GeneratorConfig::new());

        assert_eq!(file.path, std::path::PathBuf::from("sequel/main.sql"));
        let expected = "\
-- Code generated by polygon. DO NOT EDIT.
-- connection: main
-- dialect: postgres

CREATE TABLE accounts (
    id BIGSERIAL NOT NULL PRIMARY KEY
);

CREATE TABLE users (
    id BIGSERIAL NOT NULL PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE FUNCTION touch() RETURNS trigger AS $$ BEGIN RETURN NEW; END; $$ LANGUAGE plpgsql;

CREATE TRIGGER users_touch BEFORE UPDATE ON users FOR EACH ROW EXECUTE FUNCTION touch();
";
        assert_eq!(file.content, expected);
    }

    #[test]
    fn test_schema_is_deterministic() {
        let mut conn = Connection::new("main");
        parse_into(&mut conn, "CREATE TABLE b (id INT);\nCREATE TABLE a (id INT);");
        let ctx = GenerationContext::new(&conn, None, None);
        let first = generate_schema(&ctx, &GeneratorConfig::new());
        let second = generate_schema(&ctx, &GeneratorConfig::new());
        assert_eq!(first.content, second.content);
        assert!(first.content.find("CREATE TABLE a").unwrap() < first.content.find("CREATE TABLE b").unwrap());
    }
}
