//! # Model Generation
//!
//! One Go file per table:
//!
//! ```text
//! model/{connection}.{singular}.go
//! ```
//!
//! Each file declares six structs in a fixed order:
//!
//! | Struct | Fields |
//! |---|---|
//! | `User` | columns included in the base model |
//! | `UserAddition` | configured pseudo-columns |
//! | `UserContraction` | columns excluded from the base model |
//! | `UserAdded` | base fields plus additions not contracted |
//! | `UserJoined` | `UserAdded` plus one collection per child table |
//! | `UserParented` | `UserAdded` plus one pointer per parent table |
//!
//! Any other top-level declaration found in the existing file (helper
//! types, methods, constants) is carried over after the generated structs,
//! together with the imports it references.

use crate::context::GenerationContext;
use crate::{GENERATED_BANNER, GeneratedFile, GeneratorConfig};
use polygon_core::GoType;
use polygon_core::naming::{camel, pascal, pascal_singular, singularize, snake};
use polygon_ir::{Column, Table};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

static DECLARATION_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(type|func|var|const)\b").expect("declaration regex"));

static DECLARATION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:type\s+(\w+)|func\s+(?:\([^)]*\)\s*)?(\w+)|(?:var|const)\s+(\w+))")
        .expect("declaration name regex")
});

static IMPORT_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:import\s+)?(?:([\w.]+)\s+)?"([^"]+)"\s*$"#).expect("import regex")
});

// ============================================================================
// Entry point
// ============================================================================

/// Generate the model file of `table`, preserving user declarations found
/// in `existing`.
pub fn generate_model(
    ctx: &GenerationContext,
    config: &GeneratorConfig,
    table: &Table,
    existing: Option<&str>,
) -> GeneratedFile {
    let singular = ctx.struct_name(table);
    let structs = model_structs(ctx, table);

    let generated: HashSet<&str> = structs.iter().map(|s| s.name.as_str()).collect();
    let (existing_imports, preserved) = match existing {
        Some(source) => {
            let preserved: Vec<Declaration> = declarations(source)
                .into_iter()
                .filter(|d| !generated.contains(d.name.as_str()))
                .collect();
            (imports(source), preserved)
        }
        None => (Vec::new(), Vec::new()),
    };

    let mut imports = ImportSet::default();
    for model in &structs {
        for field in &model.fields {
            if let Some(import) = &field.import {
                imports.add(import, &field.go_type);
            }
        }
    }
    for (alias, path) in &existing_imports {
        let used = preserved
            .iter()
            .any(|d| references_alias(&d.text, alias));
        if used {
            imports.add_aliased(path, alias);
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "// {}.\n// Declarations other than the {} structs are preserved across runs.\n\n",
        GENERATED_BANNER, singular
    ));
    out.push_str(&format!("package {}\n", config.model_package));
    out.push_str(&imports.render());

    let mut blocks: Vec<String> = structs.iter().map(GoStruct::render).collect();
    blocks.extend(preserved.into_iter().map(|d| d.text));
    for block in blocks {
        out.push('\n');
        out.push_str(&block);
        out.push('\n');
    }

    GeneratedFile::go(
        config.model_path(ctx.name(), &snake(&singularize(&table.name))),
        out,
    )
}

// ============================================================================
// Structs
// ============================================================================

/// A struct field as written into the model file
#[derive(Debug, Clone, PartialEq, Eq)]
struct GoField {
    name: String,
    go_type: String,
    json: String,
    required: bool,
    import: Option<String>,
}

impl GoField {
    fn from_column(ctx: &GenerationContext, table: &Table, column: &Column) -> Self {
        let go_type: GoType = ctx.host_type(table, column);
        Self {
            name: pascal(&column.name),
            go_type: go_type.to_string(),
            json: camel(&column.name),
            required: !column.nullable,
            import: go_type.import.clone(),
        }
    }

    fn tag(&self) -> String {
        if self.required {
            format!("`json:\"{}\" validate:\"required\"`", self.json)
        } else {
            format!("`json:\"{}\"`", self.json)
        }
    }
}

#[derive(Debug, Clone)]
struct GoStruct {
    name: String,
    fields: Vec<GoField>,
}

impl GoStruct {
    /// Render the declaration with gofmt column alignment
    fn render(&self) -> String {
        if self.fields.is_empty() {
            return format!("type {} struct{{}}", self.name);
        }
        let name_width = self.fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
        let type_width = self.fields.iter().map(|f| f.go_type.len()).max().unwrap_or(0);

        let mut out = format!("type {} struct {{\n", self.name);
        for field in &self.fields {
            out.push_str(&format!(
                "\t{:name_width$} {:type_width$} {}\n",
                field.name,
                field.go_type,
                field.tag(),
            ));
        }
        out.push('}');
        out
    }
}

/// The six generated structs, in file order
fn model_structs(ctx: &GenerationContext, table: &Table) -> Vec<GoStruct> {
    let singular = ctx.struct_name(table);
    let table_config = ctx.table_config(&table.name);

    let base: Vec<GoField> = ctx
        .base_columns(table)
        .into_iter()
        .map(|c| GoField::from_column(ctx, table, c))
        .collect();
    let contraction: Vec<GoField> = ctx
        .contraction_columns(table)
        .into_iter()
        .map(|c| GoField::from_column(ctx, table, c))
        .collect();
    let addition: Vec<GoField> = table_config
        .additions
        .iter()
        .map(|a| {
            let go_type = a.type_name.trim().to_string();
            GoField {
                name: pascal(&a.name),
                json: camel(&a.name),
                required: false,
                import: a.package.clone().filter(|p| !p.is_empty()),
                go_type,
            }
        })
        .collect();

    let contracted: HashSet<&str> = contraction.iter().map(|f| f.name.as_str()).collect();
    let mut added = base.clone();
    added.extend(
        addition
            .iter()
            .filter(|f| !contracted.contains(f.name.as_str()))
            .cloned(),
    );

    let mut joined = added.clone();
    for child in ctx.children(&table.name) {
        joined.push(GoField {
            name: child.field.clone(),
            go_type: format!("[]*{}", pascal_singular(&child.table)),
            json: camel(&child.field),
            required: false,
            import: None,
        });
    }

    let mut parented = added.clone();
    for parent in ctx.parents(&table.name) {
        parented.push(GoField {
            name: parent.label.clone(),
            go_type: format!("*{}", pascal_singular(&parent.table)),
            json: camel(&parent.label),
            required: false,
            import: None,
        });
    }

    vec![
        GoStruct {
            name: singular.clone(),
            fields: base,
        },
        GoStruct {
            name: format!("{}Addition", singular),
            fields: addition,
        },
        GoStruct {
            name: format!("{}Contraction", singular),
            fields: contraction,
        },
        GoStruct {
            name: format!("{}Added", singular),
            fields: added,
        },
        GoStruct {
            name: format!("{}Joined", singular),
            fields: joined,
        },
        GoStruct {
            name: format!("{}Parented", singular),
            fields: parented,
        },
    ]
}

// ============================================================================
// Imports
// ============================================================================

/// Import paths keyed by path, with an explicit alias where one is needed
#[derive(Debug, Default)]
struct ImportSet {
    paths: BTreeMap<String, Option<String>>,
}

impl ImportSet {
    /// Record the import of a field type, aliasing it when the qualifier
    /// differs from the last path segment.
    fn add(&mut self, path: &str, go_type: &str) {
        let qualifier = go_type
            .trim_start_matches(['*', '[', ']'])
            .split_once('.')
            .map(|(q, _)| q.to_string());
        let alias = qualifier.filter(|q| q != last_segment(path));
        self.paths.entry(path.to_string()).or_insert(alias);
    }

    fn add_aliased(&mut self, path: &str, alias: &str) {
        let alias = (alias != last_segment(path)).then(|| alias.to_string());
        self.paths.entry(path.to_string()).or_insert(alias);
    }

    /// `import ( ... )` with standard-library paths first
    fn render(&self) -> String {
        if self.paths.is_empty() {
            return String::new();
        }
        let line = |(path, alias): (&String, &Option<String>)| match alias {
            Some(alias) => format!("\t{} \"{}\"\n", alias, path),
            None => format!("\t\"{}\"\n", path),
        };
        let (std, others): (Vec<_>, Vec<_>) =
            self.paths.iter().partition(|(path, _)| is_std(path));

        let mut out = String::from("\nimport (\n");
        out.extend(std.into_iter().map(line));
        if !out.ends_with("(\n") && !others.is_empty() {
            out.push('\n');
        }
        out.extend(others.into_iter().map(line));
        out.push_str(")\n");
        out
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Standard-library paths have no dot in their first segment
fn is_std(path: &str) -> bool {
    !path.split('/').next().unwrap_or(path).contains('.')
}

/// `(alias, path)` of every import in a Go source file
fn imports(source: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let mut in_block = false;
    for line in source.lines() {
        let trimmed = line.trim();
        if DECLARATION_START.is_match(line) {
            break;
        }
        if trimmed.starts_with("import (") {
            in_block = true;
            continue;
        }
        if in_block && trimmed == ")" {
            in_block = false;
            continue;
        }
        if in_block || trimmed.starts_with("import ") {
            if let Some(caps) = IMPORT_SPEC.captures(trimmed) {
                let path = caps[2].to_string();
                let alias = caps
                    .get(1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| last_segment(&path).to_string());
                found.push((alias, path));
            }
        }
    }
    found
}

/// Whether `text` contains the selector `alias.`
fn references_alias(text: &str, alias: &str) -> bool {
    let needle = format!("{}.", alias);
    text.match_indices(&needle).any(|(i, _)| {
        text[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '.'))
    })
}

// ============================================================================
// Existing declarations
// ============================================================================

/// A top-level declaration of an existing model file
#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    name: String,
    text: String,
}

/// Split a Go source file into its top-level declarations, each with the
/// comment lines directly above it.
fn declarations(source: &str) -> Vec<Declaration> {
    let lines: Vec<&str> = source.lines().collect();
    let mut begins: Vec<(usize, usize)> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if DECLARATION_START.is_match(line) {
            let mut begin = i;
            let floor = begins.last().map(|&(_, start)| start + 1).unwrap_or(0);
            while begin > floor && lines[begin - 1].starts_with("//") {
                begin -= 1;
            }
            begins.push((begin, i));
        }
    }

    let mut found = Vec::new();
    for (n, &(begin, start)) in begins.iter().enumerate() {
        let end = begins.get(n + 1).map(|&(b, _)| b).unwrap_or(lines.len());
        let text = lines[begin..end].join("\n").trim_end().to_string();
        let name = DECLARATION_NAME
            .captures(lines[start])
            .and_then(|caps| caps.iter().skip(1).flatten().next().map(|m| m.as_str().to_string()))
            .unwrap_or_default();
        found.push(Declaration { name, text });
    }
    found
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::blog;
    use polygon_ir::{Config, Connection, parse_into};
    use pretty_assertions::assert_eq;

    fn users_connection() -> Connection {
        let mut conn = Connection::new("main");
        parse_into(
            &mut conn,
            "CREATE TABLE users (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL, email TEXT, created_at TIMESTAMPTZ NOT NULL DEFAULT now());",
        );
        conn
    }

    #[test]
    fn test_base_model() {
        let conn = users_connection();
        let ctx = GenerationContext::new(&conn, None, None);
        let users = conn.table("users").unwrap();
        let file = generate_model(&ctx, &GeneratorConfig::new(), users, None);

        assert_eq!(file.path, std::path::PathBuf::from("model/main.user.go"));
        let expected_struct = "\
type User struct {
\tId        *uint64    `json:\"id\" validate:\"required\"`
\tName      *string    `json:\"name\" validate:\"required\"`
\tEmail     *string    `json:\"email\"`
\tCreatedAt *time.Time `json:\"createdAt\" validate:\"required\"`
}";
        assert!(file.content.contains(expected_struct), "{}", file.content);
        assert!(file.content.contains("package model\n\nimport (\n\t\"time\"\n)\n"));
        assert!(file.content.contains("type UserAddition struct{}"));
        assert!(file.content.contains("type UserContraction struct{}"));
    }

    #[test]
    fn test_struct_order() {
        let conn = users_connection();
        let ctx = GenerationContext::new(&conn, None, None);
        let file = generate_model(&ctx, &GeneratorConfig::new(), conn.table("users").unwrap(), None);
        let positions: Vec<usize> = [
            "type User struct",
            "type UserAddition struct",
            "type UserContraction struct",
            "type UserAdded struct",
            "type UserJoined struct",
            "type UserParented struct",
        ]
        .iter()
        .map(|s| file.content.find(s).unwrap())
        .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_contraction_and_additions() {
        let conn = users_connection();
        let config = Config::parse(
            r#"
connections:
  main:
    tables:
      users:
        fields:
          email: { include: none }
        additions:
          - { name: balance, package: github.com/shopspring/decimal, type: "*decimal.Decimal" }
"#,
        )
        .unwrap();
        let ctx = GenerationContext::new(&conn, config.connection("main"), None);
        let users = conn.table("users").unwrap();
        let structs = model_structs(&ctx, users);

        let names = |i: usize| structs[i].fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(0), vec!["Id", "Name", "CreatedAt"]);
        assert_eq!(names(1), vec!["Balance"]);
        assert_eq!(names(2), vec!["Email"]);
        assert_eq!(names(3), vec!["Id", "Name", "CreatedAt", "Balance"]);

        let file = generate_model(&ctx, &GeneratorConfig::new(), users, None);
        assert!(file.content.contains(
            "import (\n\t\"time\"\n\n\t\"github.com/shopspring/decimal\"\n)\n"
        ));
    }

    #[test]
    fn test_joined_and_parented() {
        let conn = blog();
        let ctx = GenerationContext::new(&conn, None, None);

        let users = model_structs(&ctx, conn.table("users").unwrap());
        let joined: Vec<_> = users[4]
            .fields
            .iter()
            .map(|f| format!("{} {}", f.name, f.go_type))
            .collect();
        assert!(joined.contains(&"Messages []*Message".to_string()));
        assert!(joined.contains(&"MessagesRecipientId []*Message".to_string()));
        assert!(joined.contains(&"Posts []*Post".to_string()));

        let messages = model_structs(&ctx, conn.table("messages").unwrap());
        let parented: Vec<_> = messages[5]
            .fields
            .iter()
            .skip(messages[3].fields.len())
            .map(|f| format!("{} {}", f.name, f.go_type))
            .collect();
        assert_eq!(parented, vec!["User *User", "UserRecipientId *User"]);
    }

    #[test]
    fn test_preserves_user_declarations() {
        let conn = users_connection();
        let ctx = GenerationContext::new(&conn, None, None);
        let users = conn.table("users").unwrap();
        let existing = "\
// Code generated by polygon.

package model

import (
\t\"strings\"
\t\"time\"
\tfmtx \"fmt\"
)

type User struct {
\tId *uint64
}

// DisplayName returns the trimmed name.
func (u *User) DisplayName() string {
\treturn strings.TrimSpace(*u.Name)
}

type Role string
";
        let file = generate_model(&ctx, &GeneratorConfig::new(), users, Some(existing));

        assert!(file.content.contains(
            "// DisplayName returns the trimmed name.\nfunc (u *User) DisplayName() string {"
        ));
        assert!(file.content.contains("type Role string"));
        assert!(file.content.contains("\t\"strings\"\n"));
        assert!(!file.content.contains("fmtx"));
        assert_eq!(file.content.matches("type User struct").count(), 1);
        assert!(file.content.find("type UserParented").unwrap() < file.content.find("type Role").unwrap());

        let again = generate_model(&ctx, &GeneratorConfig::new(), users, Some(&file.content));
        assert_eq!(again.content, file.content);
    }

    #[test]
    fn test_declaration_split() {
        let source = "package model\n\nconst Limit = 10\n\n// Kind doc\ntype Kind int\n";
        let found = declarations(source);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Limit");
        assert_eq!(found[1].name, "Kind");
        assert_eq!(found[1].text, "// Kind doc\ntype Kind int");
    }

    #[test]
    fn test_references_alias() {
        assert!(references_alias("x := strings.TrimSpace(y)", "strings"));
        assert!(!references_alias("x := mystrings.TrimSpace(y)", "strings"));
    }
}
