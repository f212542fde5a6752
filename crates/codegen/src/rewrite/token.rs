//! Lossless Go tokenizer.
//!
//! Every byte of the input belongs to exactly one token, so concatenating
//! the token texts gives back the source. Whitespace and comments are
//! tokens too; the rewriter skips them when looking at neighbours.

/// Token categories the rewriter distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    /// Interpreted string literal, quotes included
    String,
    /// Raw string literal (backquoted), also used for struct tags
    RawString,
    Rune,
    LineComment,
    BlockComment,
    Whitespace,
    /// Any other single character
    Punct,
}

/// A slice of the source with its category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl Token<'_> {
    /// Whether the token carries meaning (not whitespace, not a comment)
    pub fn is_significant(&self) -> bool {
        !matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    /// Whether the token is the identifier `name`
    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    /// Whether the token is the punctuation `c`
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text.len() == c.len_utf8() && self.text.starts_with(c)
    }
}

/// Tokenizer over Go source text
pub struct Lexer<'a> {
    /// The input source code
    input: &'a str,
    /// The current byte position
    pos: usize,
    /// The byte position of the start of the current token
    start: usize,
}

impl<'a> Lexer<'a> {
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token<'a> {
        Token {
            kind,
            text: &self.input[self.start..self.pos],
        }
    }

    /// Consume a quoted literal up to the closing `quote`. Unterminated
    /// literals run to the end of the line.
    fn scan_quoted(&mut self, quote: char, escapes: bool) {
        self.advance();
        while let Some(c) = self.peek() {
            if c == quote {
                self.advance();
                return;
            }
            if c == '\n' && quote != '`' {
                return;
            }
            self.advance();
            if escapes && c == '\\' {
                self.advance();
            }
        }
    }

    fn scan_block_comment(&mut self) {
        self.advance();
        self.advance();
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    break;
                }
                None => break,
                _ => {}
            }
        }
    }

    /// Scan the next token, or `None` at the end of input
    pub fn next_token(&mut self) -> Option<Token<'a>> {
        self.start = self.pos;
        let c = self.peek()?;

        let kind = match c {
            c if c.is_whitespace() => {
                self.advance_while(char::is_whitespace);
                TokenKind::Whitespace
            }
            '/' if self.peek_next() == Some('/') => {
                self.advance_while(|c| c != '\n');
                TokenKind::LineComment
            }
            '/' if self.peek_next() == Some('*') => {
                self.scan_block_comment();
                TokenKind::BlockComment
            }
            '"' => {
                self.scan_quoted('"', true);
                TokenKind::String
            }
            '`' => {
                self.scan_quoted('`', false);
                TokenKind::RawString
            }
            '\'' => {
                self.scan_quoted('\'', true);
                TokenKind::Rune
            }
            c if c.is_alphabetic() || c == '_' => {
                self.advance_while(|c| c.is_alphanumeric() || c == '_');
                TokenKind::Ident
            }
            c if c.is_ascii_digit() => {
                self.advance_while(|c| c.is_alphanumeric() || c == '_' || c == '.');
                TokenKind::Number
            }
            _ => {
                self.advance();
                TokenKind::Punct
            }
        };
        Some(self.make_token(kind))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Tokenize a whole source file
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input).collect()
}

// ============================================================================
// Tests
// ============================================================================
