//! # Migration Parser
//!
//! A line-prefix scanner over the up-direction text of a connection's
//! migrations. Four statement openers are recognised:
//!
//! - `CREATE TABLE` builds a [`Table`] from its parenthesised body
//! - `ALTER TABLE` applies `DROP COLUMN` and `ALTER COLUMN ... TYPE`
//! - `CREATE FUNCTION` and `CREATE TRIGGER` are kept verbatim as [`Routine`]s
//!
//! Everything else is ignored. Malformed statements are skipped so later
//! statements still parse; anomalies are logged.

use crate::column::Column;
use crate::connection::{Connection, Routine, RoutineKind};
use crate::constraint::Constraint;
use crate::scan::{
    depth_delta, find_open_paren, find_statement_end, leading_word, paren_group, split_top_level,
    split_words, squash, strip_line_comment, tokenize, unquote,
};
use crate::table::Table;
use tracing::{debug, warn};

/// Words that end a `DEFAULT` expression or a type inside a column item
const COLUMN_KEYWORDS: &[&str] = &[
    "NOT",
    "NULL",
    "DEFAULT",
    "PRIMARY",
    "UNIQUE",
    "REFERENCES",
    "CHECK",
    "CONSTRAINT",
    "COLLATE",
    "GENERATED",
];

// ============================================================================
// Statement openers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opener {
    CreateTable,
    AlterTable,
    Routine(RoutineKind),
}

impl Opener {
    /// Recognise a statement opener at the start of a (comment-stripped) line
    fn detect(line: &str) -> Option<Opener> {
        let words: Vec<String> = line
            .split(|c: char| c.is_whitespace() || c == '(')
            .filter(|w| !w.is_empty())
            .take(5)
            .map(str::to_uppercase)
            .collect();
        let word = |i: usize| words.get(i).map(String::as_str);

        match word(0)? {
            "CREATE" => {
                let mut i = 1;
                if word(i) == Some("OR") && word(i + 1) == Some("REPLACE") {
                    i += 2;
                }
                if word(i) == Some("UNLOGGED") {
                    i += 1;
                }
                match word(i)? {
                    "TABLE" => Some(Opener::CreateTable),
                    "FUNCTION" => Some(Opener::Routine(RoutineKind::Function)),
                    "TRIGGER" => Some(Opener::Routine(RoutineKind::Trigger)),
                    "CONSTRAINT" if word(i + 1) == Some("TRIGGER") => {
                        Some(Opener::Routine(RoutineKind::Trigger))
                    }
                    _ => None,
                }
            }
            "ALTER" if word(1) == Some("TABLE") => Some(Opener::AlterTable),
            _ => None,
        }
    }
}

// ============================================================================
// Parse summary
// ============================================================================

/// Counts of what a parse pass recognised
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseSummary {
    pub tables: usize,
    pub alterations: usize,
    pub routines: usize,
    pub skipped: usize,
}

// ============================================================================
// Parser
// ============================================================================

/// Populates a [`Connection`] from migration text
pub struct MigrationParser<'a> {
    connection: &'a mut Connection,
    summary: ParseSummary,
}

impl<'a> MigrationParser<'a> {
    /// Create a parser that adds to `connection`
    pub fn new(connection: &'a mut Connection) -> Self {
        Self {
            connection,
            summary: ParseSummary::default(),
        }
    }

    /// Parse one chunk of up-direction migration text.
    ///
    /// May be called repeatedly; each call sees the tables created by the
    /// previous ones.
    pub fn parse(&mut self, sql: &str) -> &ParseSummary {
        let lines: Vec<&str> = sql.lines().collect();
        let mut i = 0;
        while i < lines.len() {
            let line = strip_line_comment(lines[i]).trim();
            if line.is_empty() {
                i += 1;
                continue;
            }
            i = match Opener::detect(line) {
                Some(Opener::CreateTable) => self.create_table(&lines, i),
                Some(Opener::AlterTable) => self.alter_table(&lines, i),
                Some(Opener::Routine(kind)) => self.routine(&lines, i, kind),
                None => i + 1,
            };
        }
        &self.summary
    }

    /// Summary of everything parsed so far
    pub fn summary(&self) -> &ParseSummary {
        &self.summary
    }

    // ========================================================================
    // CREATE TABLE
    // ========================================================================

    fn create_table(&mut self, lines: &[&str], start: usize) -> usize {
        let mut text = String::new();
        let mut depth = 0;
        let mut opened = false;
        let mut i = start;

        while i < lines.len() {
            let line = strip_line_comment(lines[i]);
            text.push_str(line);
            text.push('\n');
            let (delta, saw_open) = depth_delta(line);
            depth += delta;
            opened |= saw_open;
            i += 1;

            if opened && depth <= 0 {
                self.build_table(&text);
                return i;
            }
            if !opened && line.trim_end().ends_with(';') {
                debug!(statement = %squash(&text), "Skipping CREATE TABLE without a column list");
                self.summary.skipped += 1;
                return i;
            }
        }

        warn!(
            line = start + 1,
            "Unterminated CREATE TABLE, parentheses never close; skipping"
        );
        self.summary.skipped += 1;
        start + 1
    }

    fn build_table(&mut self, text: &str) {
        let Some(open) = find_open_paren(text) else {
            return;
        };
        let name = match text[..open].split_whitespace().last() {
            Some(word) if !matches!(word.to_uppercase().as_str(), "TABLE" | "EXISTS") => {
                unquote(word)
            }
            _ => {
                warn!(statement = %squash(text), "CREATE TABLE without a table name; skipping");
                self.summary.skipped += 1;
                return;
            }
        };
        let Some((body, _)) = paren_group(&text[open..]) else {
            return;
        };

        let mut table = Table::new(&name);
        for item in split_top_level(body, ',') {
            let item = item.trim();
            if !item.is_empty() {
                self.table_item(&mut table, item);
            }
        }
        table.apply_primary_key_nullability();

        if self.connection.table(&name).is_some() {
            debug!(table = %name, "Table re-declared; replacing earlier definition");
        }
        debug!(table = %name, columns = table.columns.len(), "Parsed table");
        self.connection.add_table(table);
        self.summary.tables += 1;
    }

    fn table_item(&mut self, table: &mut Table, item: &str) {
        match leading_word(item).as_str() {
            "CONSTRAINT" => {
                let (words, rest) = split_words(item, 2);
                let name = words.get(1).map(|w| unquote(w));
                if leading_word(rest) == "CHECK" {
                    table.checks.push(squash(item));
                } else if !self.keyed_item(table, rest, name) {
                    debug!(table = %table.name, item = %squash(item), "Ignoring table constraint");
                }
            }
            "CHECK" => table.checks.push(squash(item)),
            "PRIMARY" | "FOREIGN" | "UNIQUE" => {
                self.keyed_item(table, item, None);
            }
            "EXCLUDE" | "LIKE" => {
                debug!(table = %table.name, item = %squash(item), "Ignoring table item");
            }
            _ => self.column_item(table, item),
        }
    }

    /// `PRIMARY KEY (..)`, `UNIQUE (..)` or `FOREIGN KEY (..) REFERENCES ..`
    fn keyed_item(&mut self, table: &mut Table, item: &str, name: Option<String>) -> bool {
        let Some((cols, rest)) = paren_group(item) else {
            return false;
        };
        let columns = column_list(cols);
        let constraint = match leading_word(item).as_str() {
            "PRIMARY" => Constraint::primary_key(columns),
            "UNIQUE" => Constraint::unique(columns),
            "FOREIGN" => {
                let tokens = tokenize(rest);
                if !tokens
                    .first()
                    .is_some_and(|t| t.eq_ignore_ascii_case("REFERENCES"))
                {
                    return false;
                }
                let Some(reference) = Reference::parse(&tokens, 1) else {
                    return false;
                };
                reference.into_constraint(columns)
            }
            _ => return false,
        };
        table.add_constraint(constraint.named(name));
        true
    }

    // ========================================================================
    // Columns
    // ========================================================================

    fn column_item(&mut self, table: &mut Table, item: &str) {
        let tokens = tokenize(item);
        if tokens.len() < 2 {
            debug!(table = %table.name, item = %squash(item), "Ignoring column without a type");
            return;
        }

        let name = unquote(&tokens[0]);
        let (sql_type, mut k) = take_type(&tokens, 1);
        let mut column = Column::new(&name, sql_type);
        let mut constraint_name: Option<String> = None;

        while k < tokens.len() {
            let word = tokens[k].to_uppercase();
            let next = tokens.get(k + 1).map(|t| t.to_uppercase());
            match word.as_str() {
                "NOT" if next.as_deref() == Some("NULL") => {
                    column.nullable = false;
                    k += 2;
                }
                "NULL" => {
                    column.nullable = true;
                    k += 1;
                }
                "DEFAULT" => {
                    let end = scan_until(&tokens, k + 2, COLUMN_KEYWORDS);
                    if k + 1 < end {
                        column.default = Some(tokens[k + 1..end].join(" "));
                    }
                    k = end.max(k + 1);
                }
                "PRIMARY" if next.as_deref() == Some("KEY") => {
                    column.nullable = false;
                    table.add_constraint(
                        Constraint::primary_key(vec![name.clone()]).named(constraint_name.take()),
                    );
                    k += 2;
                }
                "UNIQUE" => {
                    table.add_constraint(
                        Constraint::unique(vec![name.clone()]).named(constraint_name.take()),
                    );
                    k += 1;
                }
                "REFERENCES" => match Reference::parse(&tokens, k + 1) {
                    Some(reference) => {
                        k = reference.next;
                        table.add_constraint(
                            reference
                                .into_constraint(vec![name.clone()])
                                .named(constraint_name.take()),
                        );
                    }
                    None => k += 1,
                },
                _ if word == "CHECK" || word == "COLLATE" || word.starts_with("CHECK(") => {
                    let mut clause = constraint_name
                        .take()
                        .map(|c| format!("CONSTRAINT {} ", c))
                        .unwrap_or_default();
                    clause.push_str(&tokens[k]);
                    if !word.starts_with("CHECK(") && k + 1 < tokens.len() {
                        clause.push(' ');
                        clause.push_str(&tokens[k + 1]);
                        k += 1;
                    }
                    column.constraints.push(clause);
                    k += 1;
                }
                "GENERATED" => {
                    let stops: Vec<&str> = COLUMN_KEYWORDS
                        .iter()
                        .copied()
                        .filter(|w| *w != "DEFAULT")
                        .collect();
                    let end = scan_until(&tokens, k + 1, &stops);
                    column.constraints.push(tokens[k..end].join(" "));
                    k = end;
                }
                "CONSTRAINT" if k + 1 < tokens.len() => {
                    constraint_name = Some(unquote(&tokens[k + 1]));
                    k += 2;
                }
                _ => {
                    debug!(
                        table = %table.name,
                        column = %name,
                        token = %tokens[k],
                        "Ignoring unknown column token"
                    );
                    k += 1;
                }
            }
        }

        table.add_column(column);
    }

    // ========================================================================
    // ALTER TABLE
    // ========================================================================

    fn alter_table(&mut self, lines: &[&str], start: usize) -> usize {
        let mut text = String::new();
        let mut i = start;
        while i < lines.len() {
            let line = strip_line_comment(lines[i]);
            text.push_str(line);
            text.push('\n');
            i += 1;
            if let Some(end) = find_statement_end(&text) {
                text.truncate(end);
                break;
            }
        }
        self.apply_alter(&text);
        i
    }

    fn apply_alter(&mut self, statement: &str) {
        let upper: Vec<String> = statement
            .split_whitespace()
            .take(6)
            .map(str::to_uppercase)
            .collect();
        let mut n = 2;
        if upper.get(n).map(String::as_str) == Some("IF")
            && upper.get(n + 1).map(String::as_str) == Some("EXISTS")
        {
            n += 2;
        }
        if upper.get(n).map(String::as_str) == Some("ONLY") {
            n += 1;
        }
        let (words, rest) = split_words(statement, n + 1);
        let Some(raw_name) = words.get(n) else {
            debug!(statement = %squash(statement), "ALTER TABLE without a table name");
            self.summary.skipped += 1;
            return;
        };
        let name = unquote(raw_name);
        let Some(table) = self.connection.table_mut(&name) else {
            debug!(table = %name, "ALTER TABLE on unknown table; skipping");
            self.summary.skipped += 1;
            return;
        };

        for action in split_top_level(rest, ',') {
            let tokens = tokenize(&action);
            let word = |i: usize| tokens.get(i).map(|t| t.to_uppercase());
            match (word(0).as_deref(), word(1).as_deref()) {
                (Some("DROP"), Some("COLUMN")) => {
                    let mut idx = 2;
                    if word(2).as_deref() == Some("IF") && word(3).as_deref() == Some("EXISTS") {
                        idx += 2;
                    }
                    let Some(column) = tokens.get(idx).map(|t| unquote(t)) else {
                        continue;
                    };
                    if table.drop_column(&column).is_none() {
                        debug!(table = %name, column = %column, "DROP COLUMN on unknown column");
                    }
                }
                (Some("ALTER"), Some("COLUMN")) => {
                    let Some(column) = tokens.get(2).map(|t| unquote(t)) else {
                        continue;
                    };
                    let idx = match (word(3).as_deref(), word(4).as_deref(), word(5).as_deref()) {
                        (Some("TYPE"), _, _) => 4,
                        (Some("SET"), Some("DATA"), Some("TYPE")) => 6,
                        _ => {
                            debug!(table = %name, action = %squash(&action), "Ignoring ALTER COLUMN");
                            continue;
                        }
                    };
                    if idx >= tokens.len() {
                        continue;
                    }
                    let (sql_type, _) = take_type(&tokens, idx);
                    if !table.set_column_type(&column, sql_type) {
                        debug!(table = %name, column = %column, "ALTER COLUMN on unknown column");
                    }
                }
                _ => {
                    debug!(table = %name, action = %squash(&action), "Ignoring ALTER TABLE action");
                }
            }
        }
        self.summary.alterations += 1;
    }

    // ========================================================================
    // CREATE FUNCTION / CREATE TRIGGER
    // ========================================================================

    fn routine(&mut self, lines: &[&str], start: usize, kind: RoutineKind) -> usize {
        let rest = lines[start..].join("\n");
        let Some(end) = find_statement_end(&rest) else {
            warn!(
                line = start + 1,
                "Unterminated CREATE {:?}; skipping", kind
            );
            self.summary.skipped += 1;
            return start + 1;
        };
        let body = rest[..=end].trim().to_string();
        let consumed = rest[..end].matches('\n').count() + 1;

        match routine_name(&body, kind) {
            Some((name, target)) => {
                debug!(kind = ?kind, name = %name, "Parsed routine");
                self.connection.add_routine(Routine {
                    kind,
                    name,
                    target,
                    body,
                });
                self.summary.routines += 1;
            }
            None => {
                warn!(line = start + 1, "Could not find routine name; skipping");
                self.summary.skipped += 1;
            }
        }
        start + consumed
    }
}

/// Parse `sql` into `connection`.
pub fn parse_into(connection: &mut Connection, sql: &str) -> ParseSummary {
    let mut parser = MigrationParser::new(connection);
    parser.parse(sql);
    parser.summary().clone()
}

// ============================================================================
// Helpers
// ============================================================================

/// Parsed `REFERENCES table [(cols)] [actions]`
struct Reference {
    table: String,
    column: Option<String>,
    actions: Option<String>,
    /// Index of the first token after the reference
    next: usize,
}

impl Reference {
    /// Parse starting at the token after `REFERENCES`
    fn parse(tokens: &[String], start: usize) -> Option<Reference> {
        let first = tokens.get(start)?;
        let (table_part, cols_part) = match first.find('(') {
            Some(p) => (&first[..p], Some(&first[p..])),
            None => (first.as_str(), None),
        };
        let table = unquote(table_part);
        if table.is_empty() {
            return None;
        }
        let mut k = start + 1;

        let mut column = cols_part.and_then(|p| paren_group(p)).map(|(inner, _)| inner);
        if column.is_none() && tokens.get(k).is_some_and(|t| t.starts_with('(')) {
            column = paren_group(&tokens[k]).map(|(inner, _)| inner);
            k += 1;
        }
        let column = column
            .map(|c| column_list(c).join(", "))
            .filter(|c| !c.is_empty());

        let action_start = k;
        loop {
            let word = tokens.get(k).map(|t| t.to_uppercase());
            let next = tokens.get(k + 1).map(|t| t.to_uppercase());
            match (word.as_deref(), next.as_deref()) {
                (Some("ON"), Some("DELETE" | "UPDATE")) => {
                    k += 2;
                    let action = tokens.get(k).map(|t| t.to_uppercase());
                    k += match action.as_deref() {
                        Some("NO" | "SET") => 2,
                        Some(_) => 1,
                        None => 0,
                    };
                    if tokens.get(k).is_some_and(|t| t.starts_with('(')) {
                        k += 1;
                    }
                }
                (Some("MATCH"), Some(_)) | (Some("INITIALLY"), Some(_)) => k += 2,
                (Some("NOT"), Some("DEFERRABLE")) => k += 2,
                (Some("DEFERRABLE"), _) => k += 1,
                _ => break,
            }
        }
        let k = k.min(tokens.len());
        let actions = (k > action_start).then(|| tokens[action_start..k].join(" "));

        Some(Reference {
            table,
            column,
            actions,
            next: k,
        })
    }

    fn into_constraint(self, columns: Vec<String>) -> Constraint {
        Constraint::foreign_key(columns, &self.table, self.column.as_deref())
            .with_actions(self.actions)
    }
}

/// Unquoted column names of a parenthesised list body
fn column_list(inner: &str) -> Vec<String> {
    split_top_level(inner, ',')
        .iter()
        .map(|c| unquote(c.split_whitespace().next().unwrap_or_default()))
        .filter(|c| !c.is_empty())
        .collect()
}

/// Index of the first token at or after `from` that is one of `stops`
fn scan_until(tokens: &[String], from: usize, stops: &[&str]) -> usize {
    let mut k = from.min(tokens.len());
    while k < tokens.len() && !stops.contains(&tokens[k].to_uppercase().as_str()) {
        k += 1;
    }
    k
}

/// Read a column type starting at `start`, absorbing multi-word forms.
///
/// Returns the type text and the index of the first token after it.
fn take_type(tokens: &[String], start: usize) -> (String, usize) {
    let Some(first) = tokens.get(start) else {
        return (String::new(), start);
    };
    let mut sql_type = first.clone();
    let mut k = start + 1;

    while let Some(token) = tokens.get(k) {
        let upper = token.to_uppercase();
        let head = sql_type.to_uppercase();
        let head = head.split('(').next().unwrap_or_default().trim();

        if token.starts_with('(') || token.starts_with('[') {
            sql_type.push_str(token);
            k += 1;
        } else if upper.starts_with("PRECISION") && head == "DOUBLE" {
            sql_type.push(' ');
            sql_type.push_str(token);
            k += 1;
        } else if upper.starts_with("VARYING") && matches!(head, "CHARACTER" | "CHAR" | "BIT") {
            sql_type.push(' ');
            sql_type.push_str(token);
            k += 1;
        } else if matches!(upper.as_str(), "WITH" | "WITHOUT")
            && matches!(head, "TIMESTAMP" | "TIME")
            && tokens
                .get(k + 1)
                .is_some_and(|t| t.eq_ignore_ascii_case("TIME"))
            && tokens
                .get(k + 2)
                .is_some_and(|t| t.eq_ignore_ascii_case("ZONE"))
        {
            sql_type.push_str(&format!(" {} {} {}", token, tokens[k + 1], tokens[k + 2]));
            k += 3;
        } else if upper == "ARRAY" || upper.starts_with("ARRAY[") {
            sql_type.push(' ');
            sql_type.push_str(token);
            k += 1;
        } else {
            break;
        }
    }
    (sql_type, k)
}

/// Name (and trigger table) of a routine statement
fn routine_name(body: &str, kind: RoutineKind) -> Option<(String, Option<String>)> {
    let words: Vec<&str> = body.split_whitespace().take(64).collect();
    let keyword = match kind {
        RoutineKind::Function => "FUNCTION",
        RoutineKind::Trigger => "TRIGGER",
    };
    let pos = words.iter().position(|w| {
        w.split('(')
            .next()
            .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
    })?;
    let raw = words.get(pos + 1)?;
    let name = unquote(raw.split('(').next().unwrap_or_default());
    if name.is_empty() {
        return None;
    }

    let target = match kind {
        RoutineKind::Function => None,
        RoutineKind::Trigger => {
            let on = words[pos + 2..]
                .iter()
                .position(|w| w.eq_ignore_ascii_case("ON"))?;
            Some(unquote(words.get(pos + 2 + on + 1)?))
        }
    };
    Some((name, target))
}

// ============================================================================
// Tests
// ============================================================================
