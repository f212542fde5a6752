//! # Type Rewriting
//!
//! sqlc models optional values with `database/sql` wrappers and plain value
//! types. Polygon's models use pointers instead, so after sqlc has run the
//! rewriter walks its Go output and conforms it:
//!
//! 1. `sql.NullString` and friends become pointers (`*string`, ...)
//! 2. bare primitives in type position become pointers
//!    (`int64` becomes `*uint64`, `time.Time` becomes `*time.Time`)
//! 3. the `database/sql` import goes once nothing references `sql.`
//! 4. a `time` import is added when `time.` is now referenced
//!
//! Files under the prefixed output directory additionally get their
//! `DBTX` and `Querier` identifiers prefixed, so several generated
//! packages can be embedded side by side.
//!
//! The rewrite works on a token stream, so string literals, struct tags
//! and comments are never touched. Running it on its own output changes
//! nothing.

pub mod token;

use crate::GENERATED_BANNER;
use polygon_core::EngineResult;
use polygon_core::fs::{read_to_string, write_if_changed};
use std::path::Path;
use token::{Token, TokenKind, tokenize};
use tracing::{debug, info};
use walkdir::WalkDir;

/// `sql.Null*` wrappers and their pointer forms
const NULLABLE_WRAPPERS: &[(&str, &str)] = &[
    ("NullString", "*string"),
    ("NullInt64", "*uint64"),
    ("NullInt32", "*int32"),
    ("NullInt16", "*int16"),
    ("NullFloat64", "*float64"),
    ("NullBool", "*bool"),
    ("NullTime", "*time.Time"),
];

/// Bare primitives and their pointer forms
const PRIMITIVES: &[(&str, &str)] = &[
    ("string", "*string"),
    ("int64", "*uint64"),
    ("int32", "*int32"),
    ("float64", "*float64"),
    ("bool", "*bool"),
];

const SQL_IMPORT: &str = "\"database/sql\"";
const TIME_IMPORT: &str = "\"time\"";

/// Identifiers renamed in prefixed files
const PREFIXED_IDENTS: &[&str] = &["DBTX", "Querier"];

// ============================================================================
// Rewriter
// ============================================================================

/// Rewrites downstream Go output to the pointer convention
#[derive(Debug, Clone)]
pub struct Rewriter {
    /// Name of the output subdirectory whose files get prefixed identifiers
    pub prefixed_dir: Option<String>,

    /// Prefix applied to `DBTX` and `Querier` in those files
    pub prefix: String,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self {
            prefixed_dir: Some("polygon".to_string()),
            prefix: "P".to_string(),
        }
    }
}

/// Outcome of rewriting a directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Go files examined
    pub scanned: usize,
    /// Files whose content changed
    pub rewritten: usize,
    /// Files written by polygon itself, left alone
    pub skipped: usize,
}

impl RewriteSummary {
    pub fn merge(&mut self, other: RewriteSummary) {
        self.scanned += other.scanned;
        self.rewritten += other.rewritten;
        self.skipped += other.skipped;
    }
}

impl Rewriter {
    pub fn new(prefixed_dir: Option<String>, prefix: impl Into<String>) -> Self {
        Self {
            prefixed_dir,
            prefix: prefix.into(),
        }
    }

    // ====================================================================
    // Source
    // ====================================================================

    /// Rewrite one Go source file
    pub fn rewrite_source(&self, source: &str, prefixed: bool) -> String {
        let rewritten = self.rewrite_tokens(&tokenize(source), prefixed);
        fix_imports(&rewritten)
    }

    fn rewrite_tokens(&self, tokens: &[Token], prefixed: bool) -> String {
        let mut out = String::with_capacity(tokens.iter().map(|t| t.text.len()).sum());
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i];
            if token.kind != TokenKind::Ident {
                out.push_str(token.text);
                i += 1;
                continue;
            }

            // Qualified types: `sql.NullX` and `time.Time`
            if let Some(selected) = selector(tokens, i) {
                let after = next_significant(tokens, i + 2);
                let replacement = match (token.text, selected) {
                    ("sql", name) => NULLABLE_WRAPPERS
                        .iter()
                        .find(|(wrapper, _)| *wrapper == name)
                        .filter(|_| !after.is_some_and(|t| t.is_punct('{')))
                        .map(|(_, pointer)| *pointer),
                    ("time", "Time") if in_type_position(tokens, i, i + 2) => Some("*time.Time"),
                    _ => None,
                };
                if let Some(replacement) = replacement {
                    out.push_str(replacement);
                    i += 3;
                    continue;
                }
            }

            let primitive = PRIMITIVES
                .iter()
                .find(|(name, _)| *name == token.text)
                .filter(|_| in_type_position(tokens, i, i));
            if let Some((_, pointer)) = primitive {
                out.push_str(pointer);
            } else if prefixed && PREFIXED_IDENTS.contains(&token.text) {
                out.push_str(&self.prefix);
                out.push_str(token.text);
            } else {
                out.push_str(token.text);
            }
            i += 1;
        }
        out
    }

    // ====================================================================
    // Files
    // ====================================================================

    /// Rewrite a file in place. Returns whether its content changed.
    pub fn rewrite_file(&self, path: &Path, prefixed: bool) -> EngineResult<bool> {
        let source = read_to_string(path)?;
        let rewritten = self.rewrite_source(&source, prefixed);
        if rewritten == source {
            return Ok(false);
        }
        write_if_changed(path, &rewritten)
    }

    /// Rewrite every `.go` file under `dir`, in sorted path order.
    pub fn rewrite_dir(&self, dir: &Path) -> EngineResult<RewriteSummary> {
        let mut summary = RewriteSummary::default();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Rewrite directory does not exist");
            return Ok(summary);
        }

        let entries = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "go"));

        for entry in entries {
            let path = entry.path();
            summary.scanned += 1;

            let source = read_to_string(path)?;
            if is_own_output(&source) {
                summary.skipped += 1;
                continue;
            }

            let prefixed = self.is_prefixed(dir, path);
            let rewritten = self.rewrite_source(&source, prefixed);
            if rewritten != source && write_if_changed(path, &rewritten)? {
                debug!(file = %path.display(), prefixed, "Rewrote");
                summary.rewritten += 1;
            }
        }

        info!(
            dir = %dir.display(),
            scanned = summary.scanned,
            rewritten = summary.rewritten,
            "Rewrite complete"
        );
        Ok(summary)
    }

    /// Whether a directory component of `path` below `root` is the
    /// prefixed directory
    fn is_prefixed(&self, root: &Path, path: &Path) -> bool {
        let Some(prefixed_dir) = self.prefixed_dir.as_deref() else {
            return false;
        };
        let relative = path.strip_prefix(root).unwrap_or(path);
        relative
            .parent()
            .is_some_and(|parent| parent.components().any(|c| c.as_os_str() == prefixed_dir))
    }
}

/// Files carrying polygon's banner are model files, already in shape
fn is_own_output(source: &str) -> bool {
    source
        .lines()
        .take_while(|l| l.starts_with("//") || l.trim().is_empty())
        .any(|l| l.contains(GENERATED_BANNER))
}

// ============================================================================
// Token helpers
// ============================================================================

fn next_significant<'a>(tokens: &[Token<'a>], after: usize) -> Option<Token<'a>> {
    tokens[after.saturating_add(1).min(tokens.len())..]
        .iter()
        .find(|t| t.is_significant())
        .copied()
}

fn prev_significant<'a>(tokens: &[Token<'a>], before: usize) -> Option<(usize, Token<'a>)> {
    tokens[..before]
        .iter()
        .enumerate()
        .rev()
        .find(|(_, t)| t.is_significant())
        .map(|(i, t)| (i, *t))
}

/// `ident.Name` starting at `i`: the selected name
fn selector<'a>(tokens: &[Token<'a>], i: usize) -> Option<&'a str> {
    let dot = tokens.get(i + 1)?;
    let name = tokens.get(i + 2)?;
    (dot.is_punct('.') && name.kind == TokenKind::Ident).then_some(name.text)
}

/// Whether the type spanning tokens `first..=last` sits where a pointer
/// type may replace it.
fn in_type_position(tokens: &[Token], first: usize, last: usize) -> bool {
    if let Some((p, prev)) = prev_significant(tokens, first) {
        if prev.is_punct('*')
            || prev.is_punct('.')
            || prev.is_punct('[')
            || prev.is_punct(']')
            || prev.is_ident("case")
        {
            return false;
        }
        // `type Name string` declares a named type
        if prev.kind == TokenKind::Ident
            && prev_significant(tokens, p).is_some_and(|(_, head)| head.is_ident("type"))
        {
            return false;
        }
    }
    !next_significant(tokens, last).is_some_and(|next| next.is_punct('(') || next.is_punct('{'))
}

// ============================================================================
// Imports
// ============================================================================

/// Whether the source references the package `alias` as a selector
fn references(tokens: &[Token], alias: &str) -> bool {
    tokens
        .iter()
        .enumerate()
        .any(|(i, t)| t.is_ident(alias) && tokens.get(i + 1).is_some_and(|d| d.is_punct('.')))
}

fn imports_path(tokens: &[Token], path: &str) -> bool {
    tokens
        .iter()
        .any(|t| t.kind == TokenKind::String && t.text == path)
}

/// Drop an unused `database/sql` import and add a missing `time` import
fn fix_imports(source: &str) -> String {
    let tokens = tokenize(source);
    let mut out = source.to_string();

    if imports_path(&tokens, SQL_IMPORT) && !references(&tokens, "sql") {
        out = remove_import(&out, SQL_IMPORT);
    }
    if references(&tokens, "time") && !imports_path(&tokens, TIME_IMPORT) {
        out = add_import(&out, TIME_IMPORT);
    }
    out
}

fn remove_import(source: &str, path: &str) -> String {
    let single = format!("import {}", path);
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed == path || trimmed == single {
            continue;
        }
        out.push_str(line);
    }
    out
}

fn add_import(source: &str, path: &str) -> String {
    let mut out = String::with_capacity(source.len() + path.len() + 16);
    let mut added = false;
    for line in source.split_inclusive('\n') {
        out.push_str(line);
        if added {
            continue;
        }
        let trimmed = line.trim();
        if trimmed == "import (" {
            out.push_str(&format!("\t{}\n", path));
            added = true;
        }
    }
    if added {
        return out;
    }

    // No import block: add a single import after the package clause
    let mut out = String::with_capacity(source.len() + path.len() + 16);
    for line in source.split_inclusive('\n') {
        out.push_str(line);
        if !added && line.trim_start().starts_with("package ") {
            out.push_str(&format!("\nimport {}\n", path));
            added = true;
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const MODELS: &str = "// Code generated by sqlc. DO NOT EDIT.

package polygon

import (
\t\"database/sql\"
)

type User struct {
\tID        int64          `json:\"id\"`
\tName      sql.NullString `json:\"name\"`
\tCreatedAt time.Time      `json:\"created_at\"`
}
";

    #[test]
    fn test_nullable_and_time() {
        let rewriter = Rewriter::default();
        let out = rewriter.rewrite_source(MODELS, false);
        let expected = "// Code generated by sqlc. DO NOT EDIT.

package polygon

import (
\t\"time\"
)

type User struct {
\tID        *uint64          `json:\"id\"`
\tName      *string `json:\"name\"`
\tCreatedAt *time.Time      `json:\"created_at\"`
}
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_idempotent() {
        let rewriter = Rewriter::default();
        let once = rewriter.rewrite_source(MODELS, true);
        let twice = rewriter.rewrite_source(&once, true);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_skips_literals_and_non_type_positions() {
        let source = "package polygon

type Status string

func f(s string, n int64) (bool, error) {
\tx := string(b)
\tm := map[string]int32{}
\tswitch v.(type) {
\tcase string:
\t}
\t// a string comment
\treturn \"string\", sql.NullString{}
}
";
        let out = Rewriter::default().rewrite_source(source, false);
        assert!(out.contains("type Status string"));
        assert!(out.contains("func f(s *string, n *uint64) (*bool, error) {"));
        assert!(out.contains("x := string(b)"));
        assert!(out.contains("map[string]int32{}"));
        assert!(out.contains("case string:"));
        assert!(out.contains("// a string comment"));
        assert!(out.contains("return \"string\", sql.NullString{}"));
    }

    #[test]
    fn test_keeps_sql_import_while_used() {
        let source = "package polygon

import (
\t\"context\"
\t\"database/sql\"
)

type DBTX interface {
\tQueryRowContext(context.Context, string, ...interface{}) *sql.Row
}
";
        let out = Rewriter::default().rewrite_source(source, false);
        assert!(out.contains("\t\"database/sql\"\n"));
        assert!(out.contains("type DBTX interface"));
    }

    #[test]
    fn test_prefixed_identifiers() {
        let source = "package polygon\n\ntype Querier interface{}\n\nfunc New(db DBTX) *Queries {\n\treturn &Queries{db: db}\n}\n";
        let out = Rewriter::default().rewrite_source(source, true);
        assert!(out.contains("type PQuerier interface{}"));
        assert!(out.contains("func New(db PDBTX) *Queries {"));

        let again = Rewriter::default().rewrite_source(&out, true);
        assert_eq!(again, out);
    }

    #[test]
    fn test_single_import_added() {
        let source = "package polygon\n\ntype Event struct {\n\tAt time.Time\n}\n";
        let out = Rewriter::default().rewrite_source(source, false);
        assert_eq!(
            out,
            "package polygon\n\nimport \"time\"\n\ntype Event struct {\n\tAt *time.Time\n}\n"
        );
    }

    #[test]
    fn test_rewrite_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("polygon");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(dir.path().join("model")).unwrap();

        fs::write(dir.path().join("models.go"), MODELS).unwrap();
        fs::write(nested.join("querier.go"), "package polygon\n\ntype Querier interface{}\n").unwrap();
        fs::write(
            dir.path().join("model/main.user.go"),
            "// Code generated by polygon.\n\npackage model\n\ntype Name string\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "int64").unwrap();

        let rewriter = Rewriter::default();
        let summary = rewriter.rewrite_dir(dir.path()).unwrap();
        assert_eq!(
            summary,
            RewriteSummary {
                scanned: 3,
                rewritten: 2,
                skipped: 1
            }
        );
        assert!(
            fs::read_to_string(nested.join("querier.go"))
                .unwrap()
                .contains("PQuerier")
        );
        assert!(
            !fs::read_to_string(dir.path().join("models.go"))
                .unwrap()
                .contains("database/sql")
        );

        let second = rewriter.rewrite_dir(dir.path()).unwrap();
        assert_eq!(second.rewritten, 0);
    }
}
