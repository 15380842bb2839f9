//! # Lexer
//!
//! Single-pass character scanner over rule-file source text, per `spec.md`
//! §4.1. Produces a flat token stream; every token carries the line/column
//! of its first character so the parser (and [`crate::error::ParseError`])
//! can report precise positions.

use crate::error::LexError;

/// The kind of a scanned token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Wildcard,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,

    // Operators
    ColonDash,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Keywords
    Rule,
    When,
    Then,
    Suggestion,
    Aggregate,
    Not,
    Count,
    Sum,
    Max,
    Min,
    Avg,
    True,
    False,

    Eof,
}

/// A scanned token plus its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "rule" => TokenKind::Rule,
        "when" => TokenKind::When,
        "then" => TokenKind::Then,
        "suggestion" => TokenKind::Suggestion,
        "aggregate" => TokenKind::Aggregate,
        "not" => TokenKind::Not,
        "count" => TokenKind::Count,
        "sum" => TokenKind::Sum,
        "max" => TokenKind::Max,
        "min" => TokenKind::Min,
        "avg" => TokenKind::Avg,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => return None,
    })
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Scans `text` into a token stream, failing fast on the first unexpected
/// character or unterminated string (`spec.md` §4.1 contract).
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(text).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn err(&self, line: usize, col: usize, message: impl Into<String>) -> LexError {
        LexError {
            line,
            col,
            message: message.into(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let (line, col) = (self.line, self.col);
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    col,
                });
                break;
            };

            let kind = if c == '?' {
                self.advance();
                self.scan_variable(line, col)?
            } else if c == '"' {
                self.scan_string(line, col)?
            } else if c.is_ascii_digit() || (c == '-' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                // A `-` directly against a digit lexes as the sign of a
                // negative number literal, per the grammar's optional
                // leading `-` (`spec.md` §4.1/§4.2). `?D-100` therefore
                // scans as `Variable(D), Int(-100)`, not subtraction —
                // write `?D - 100` (whitespace around `-`) for the binary
                // arithmetic operator.
                self.scan_number(line, col)?
            } else if c == '_' && !self.peek_at(1).is_some_and(is_ident_continue) {
                self.advance();
                TokenKind::Wildcard
            } else if is_ident_start(c) {
                self.scan_identifier()
            } else {
                self.scan_punctuation(line, col)?
            };

            tokens.push(Token { kind, line, col });
        }
        Ok(tokens)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('%') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_variable(&mut self, line: usize, col: usize) -> Result<TokenKind, LexError> {
        let start = self.pos;
        if !self.peek().is_some_and(is_ident_start) {
            return Err(self.err(line, col, "expected identifier after '?'"));
        }
        while self.peek().is_some_and(is_ident_continue) {
            self.advance();
        }
        Ok(TokenKind::Variable(
            self.chars[start..self.pos].iter().collect(),
        ))
    }

    fn scan_string(&mut self, line: usize, col: usize) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(self.err(line, col, "unterminated string literal")),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some(other) => {
                        s.push('\\');
                        s.push(other);
                    }
                    None => return Err(self.err(line, col, "unterminated string literal")),
                },
                Some(c) => s.push(c),
            }
        }
        Ok(TokenKind::String(s))
    }

    fn scan_number(&mut self, line: usize, col: usize) -> Result<TokenKind, LexError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.err(line, col, format!("invalid number literal '{text}'")))
        } else {
            match text.parse::<i64>() {
                Ok(i) => Ok(TokenKind::Int(i)),
                Err(_) => text
                    .parse::<f64>()
                    .map(TokenKind::Float)
                    .map_err(|_| self.err(line, col, format!("invalid number literal '{text}'"))),
            }
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.advance();
        }
        let ident: String = self.chars[start..self.pos].iter().collect();
        keyword(&ident).unwrap_or(TokenKind::Identifier(ident))
    }

    fn scan_punctuation(&mut self, line: usize, col: usize) -> Result<TokenKind, LexError> {
        let c = self.advance().expect("checked by caller");
        Ok(match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => {
                if self.peek() == Some('-') {
                    self.advance();
                    TokenKind::ColonDash
                } else {
                    TokenKind::Colon
                }
            }
            '=' => TokenKind::Eq,
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Ne
                } else {
                    return Err(self.err(line, col, "unexpected character '!'"));
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            other => return Err(self.err(line, col, format!("unexpected character '{other}'"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_simple_atom() {
        let k = kinds("edge(?X, ?Y).");
        assert_eq!(
            k,
            vec![
                TokenKind::Identifier("edge".into()),
                TokenKind::LParen,
                TokenKind::Variable("X".into()),
                TokenKind::Comma,
                TokenKind::Variable("Y".into()),
                TokenKind::RParen,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_rule_arrow_and_comparisons() {
        let k = kinds("h(?X) :- g(?X), ?X >= 3, ?X != 4.");
        assert!(k.contains(&TokenKind::ColonDash));
        assert!(k.contains(&TokenKind::Ge));
        assert!(k.contains(&TokenKind::Ne));
    }

    #[test]
    fn wildcard_is_not_confused_with_identifier() {
        let k = kinds("f(_, _foo)");
        assert_eq!(
            k[2],
            TokenKind::Wildcard
        );
        assert_eq!(k[4], TokenKind::Identifier("_foo".into()));
    }

    #[test]
    fn strings_decode_escapes() {
        let k = kinds(r#""a\nb\t\"c\"""#);
        assert_eq!(k[0], TokenKind::String("a\nb\t\"c\"".into()));
    }

    #[test]
    fn unknown_escape_is_kept_literal() {
        let k = kinds(r#""a\qb""#);
        assert_eq!(k[0], TokenKind::String("a\\qb".into()));
    }

    #[test]
    fn line_comments_run_to_newline() {
        let k = kinds("a(1). % a comment\nb(2).");
        // comment is fully skipped; both facts present
        let idents: Vec<_> = k
            .iter()
            .filter_map(|t| match t {
                TokenKind::Identifier(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(idents, vec!["a", "b"]);
    }

    #[test]
    fn negative_number_literal() {
        let k = kinds("-42");
        assert_eq!(k[0], TokenKind::Int(-42));
    }

    #[test]
    fn unexpected_character_reports_position() {
        let err = tokenize("edge(?X) ~ foo").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.col, 10);
    }

    #[test]
    fn unterminated_string_is_reported() {
        let err = tokenize("\"abc").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
