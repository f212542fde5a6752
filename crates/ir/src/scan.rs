//! Lexical helpers for the migration parser
//!
//! The parser works on lines and items rather than a token stream; these
//! helpers give it quote- and parenthesis-aware splitting.

/// Remove a trailing `--` comment that is not inside a quoted string.
pub fn strip_line_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev = '\0';
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '-' && prev == '-' => return &line[..i - 1],
            None => {}
        }
        prev = c;
    }
    line
}

/// Net parenthesis depth change of `text`, and whether any `(` was seen,
/// ignoring characters inside quotes.
pub fn depth_delta(text: &str) -> (i32, bool) {
    let mut depth = 0;
    let mut opened = false;
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => {
                    depth += 1;
                    opened = true;
                }
                ')' => depth -= 1,
                _ => {}
            },
        }
    }
    (depth, opened)
}

/// Byte offset of the first `(` outside quotes.
pub fn find_open_paren(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '(' => return Some(i),
            None => {}
        }
    }
    None
}

/// Contents of the first parenthesised group in `text` and the text after
/// its closing parenthesis.
pub fn paren_group(text: &str) -> Option<(&str, &str)> {
    let open = find_open_paren(text)?;
    let mut depth = 0;
    let mut quote: Option<char> = None;
    for (i, c) in text[open..].char_indices() {
        let at = open + i;
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((&text[open + 1..at], &text[at + 1..]));
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Split on `sep` at parenthesis depth zero, outside quotes.
pub fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => {
                match c {
                    '\'' | '"' => quote = Some(c),
                    '(' => depth += 1,
                    ')' => depth -= 1,
                    _ => {}
                }
                if c == sep && depth == 0 {
                    parts.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Split on whitespace at parenthesis depth zero, outside quotes.
///
/// `NUMERIC(10, 2)` and `'a b'` stay single tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => {
                match c {
                    '\'' | '"' => quote = Some(c),
                    '(' => depth += 1,
                    ')' => depth -= 1,
                    _ => {}
                }
                current.push(c);
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Leading keyword of an item, upper-cased (stops at whitespace or `(`).
pub fn leading_word(text: &str) -> String {
    text.trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

/// The first `n` whitespace-separated words of `text` and the remainder.
pub fn split_words(text: &str, n: usize) -> (Vec<&str>, &str) {
    let mut words = Vec::with_capacity(n);
    let mut rest = text.trim_start();
    while words.len() < n && !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        words.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    (words, rest)
}

/// Strip identifier quoting, a trailing `;` and any schema qualifier.
pub fn unquote(ident: &str) -> String {
    let ident = ident.trim().trim_end_matches(';').trim();
    let last = split_qualified(ident);
    last.trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']')
        .to_string()
}

fn split_qualified(ident: &str) -> &str {
    let mut quote = false;
    let mut start = 0;
    for (i, c) in ident.char_indices() {
        match c {
            '"' => quote = !quote,
            '.' if !quote => start = i + 1,
            _ => {}
        }
    }
    &ident[start..]
}

/// Collapse runs of whitespace into single spaces.
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte offset of the `;` ending the statement that starts `text`.
///
/// Quotes, `--` and `/* */` comments, and dollar-quoted bodies
/// (`$$ ... $$`, `$fn$ ... $fn$`) are skipped.
pub fn find_statement_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                let q = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != q {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'$' => {
                if let Some(tag_len) = dollar_tag(&text[i..]) {
                    let tag = &text[i..i + tag_len];
                    match text[i + tag_len..].find(tag) {
                        Some(close) => i += tag_len + close + tag_len - 1,
                        None => return None,
                    }
                }
            }
            b';' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Length of a dollar-quote tag (`$$` or `$name$`) at the start of `text`.
fn dollar_tag(text: &str) -> Option<usize> {
    let rest = text.strip_prefix('$')?;
    let end = rest.find('$')?;
    let tag = &rest[..end];
    if tag.chars().all(|c| c.is_alphanumeric() || c == '_') && !tag.starts_with(|c: char| c.is_ascii_digit()) {
        Some(end + 2)
    } else {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_comment() {
        assert_eq!(strip_line_comment("name TEXT, -- the name"), "name TEXT, ");
        assert_eq!(
            strip_line_comment("note TEXT DEFAULT '--x'"),
            "note TEXT DEFAULT '--x'"
        );
        assert_eq!(strip_line_comment("-- only a comment"), "");
    }

    #[test]
    fn test_depth_delta() {
        assert_eq!(depth_delta("CREATE TABLE users ("), (1, true));
        assert_eq!(depth_delta("price NUMERIC(10, 2),"), (0, true));
        assert_eq!(depth_delta(");"), (-1, false));
        assert_eq!(depth_delta("note TEXT DEFAULT '('"), (0, false));
    }

    #[test]
    fn test_paren_group() {
        let (inner, rest) = paren_group("PRIMARY KEY (a, b) extra").unwrap();
        assert_eq!(inner, "a, b");
        assert_eq!(rest, " extra");

        let (inner, _) = paren_group("CHECK (length(name) > 0)").unwrap();
        assert_eq!(inner, "length(name) > 0");
        assert!(paren_group("no parens").is_none());
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level("id BIGINT, price NUMERIC(10, 2), note TEXT DEFAULT 'a,b'", ',');
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].trim(), "price NUMERIC(10, 2)");
        assert_eq!(parts[2].trim(), "note TEXT DEFAULT 'a,b'");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("price NUMERIC(10, 2) DEFAULT 'a b' NOT NULL"),
            vec!["price", "NUMERIC(10, 2)", "DEFAULT", "'a b'", "NOT", "NULL"]
        );
    }

    #[test]
    fn test_leading_word() {
        assert_eq!(leading_word("  primary key (id)"), "PRIMARY");
        assert_eq!(leading_word("UNIQUE(email)"), "UNIQUE");
        assert_eq!(leading_word("unique_code TEXT"), "UNIQUE_CODE");
    }

    #[test]
    fn test_split_words() {
        let (words, rest) = split_words("ALTER TABLE  users DROP COLUMN x", 3);
        assert_eq!(words, vec!["ALTER", "TABLE", "users"]);
        assert_eq!(rest, "DROP COLUMN x");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"users\""), "users");
        assert_eq!(unquote("public.users;"), "users");
        assert_eq!(unquote("\"public\".\"user.data\""), "user.data");
    }

    #[test]
    fn test_find_statement_end_dollar_quoted() {
        let sql = "CREATE FUNCTION f() RETURNS trigger AS $$\nBEGIN\n  NEW.x := 1;\n  RETURN NEW;\nEND;\n$$ LANGUAGE plpgsql;\nSELECT 1;";
        let end = find_statement_end(sql).unwrap();
        assert!(sql[..end].ends_with("$$ LANGUAGE plpgsql"));
    }

    #[test]
    fn test_find_statement_end_named_tag() {
        let sql = "CREATE FUNCTION f() AS $body$ SELECT 1; $body$ LANGUAGE sql;";
        let end = find_statement_end(sql).unwrap();
        assert_eq!(end, sql.len() - 1);
        assert!(find_statement_end("CREATE FUNCTION f() AS $$ never closed").is_none());
    }
}
