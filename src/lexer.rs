//! Lazy tokenizer over the source buffer. Tokens never own substrings —
//! only `[start, end)` byte offsets — matching the arena's index-overlay
//! discipline (spec §4.2).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Identifier,
    Keyword,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,
    Symbol,
    LineComment,
    BlockComment,
    DocComment,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start as usize..self.end as usize]
    }
}

const KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "package", "private", "protected", "public", "record", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "try", "void", "volatile", "while", "var", "yield", "sealed", "permits", "true",
    "false", "null",
];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// Produces tokens on demand over `source`, tracking line/column for every
/// byte it consumes. Never materializes the full token stream up front.
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: u32,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos as usize).copied()
    }

    fn peek_byte_at(&self, offset: u32) -> Option<u8> {
        self.bytes.get((self.pos + offset) as usize).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek_byte() {
            if b == b' ' || b == b'\t' || b == b'\r' || b == b'\n' {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Non-destructively skips whitespace and comments to find the next
    /// significant token's start line, without consuming it. Used by the
    /// parser's comment-attachment logic (spec §4.2): "leading comments
    /// immediately preceding a declaration, zero or more newlines between,
    /// no intervening tokens".
    pub fn newlines_before_next_token(&self) -> u32 {
        let mut p = self.pos as usize;
        let mut newlines = 0u32;
        while let Some(&b) = self.bytes.get(p) {
            match b {
                b' ' | b'\t' | b'\r' => p += 1,
                b'\n' => {
                    newlines += 1;
                    p += 1;
                }
                _ => break,
            }
        }
        newlines
    }

    /// Returns the next token, classifying line/block/doc comments as their
    /// own kinds rather than silently discarding them — the parser attaches
    /// them to declarations instead of dropping them (spec §4.2).
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos;
        let start_line = self.line;
        let start_column = self.column;

        let Some(b) = self.peek_byte() else {
            return Token {
                kind: TokenKind::Eof,
                start,
                end: start,
                line: start_line,
                column: start_column,
            };
        };

        if b == b'/' && self.peek_byte_at(1) == Some(b'/') {
            while let Some(b) = self.peek_byte() {
                if b == b'\n' {
                    break;
                }
                self.advance();
            }
            return self.finish(TokenKind::LineComment, start, start_line, start_column);
        }

        if b == b'/' && self.peek_byte_at(1) == Some(b'*') {
            let is_doc = self.peek_byte_at(2) == Some(b'*')
                && self.peek_byte_at(3) != Some(b'/');
            self.advance();
            self.advance();
            while self.peek_byte().is_some() {
                if self.peek_byte() == Some(b'*') && self.peek_byte_at(1) == Some(b'/') {
                    self.advance();
                    self.advance();
                    break;
                }
                self.advance();
            }
            let kind = if is_doc {
                TokenKind::DocComment
            } else {
                TokenKind::BlockComment
            };
            return self.finish(kind, start, start_line, start_column);
        }

        if b.is_ascii_alphabetic() || b == b'_' || b == b'$' {
            while let Some(b) = self.peek_byte() {
                if b.is_ascii_alphanumeric() || b == b'_' || b == b'$' {
                    self.advance();
                } else {
                    break;
                }
            }
            let text = &self.source[start as usize..self.pos as usize];
            let kind = if is_keyword(text) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            return self.finish(kind, start, start_line, start_column);
        }

        if b.is_ascii_digit() {
            let mut is_float = false;
            while let Some(b) = self.peek_byte() {
                if b.is_ascii_digit() || b == b'_' {
                    self.advance();
                } else if b == b'.' && !is_float {
                    is_float = true;
                    self.advance();
                } else if matches!(b, b'L' | b'l' | b'f' | b'F' | b'd' | b'D') {
                    self.advance();
                    break;
                } else {
                    break;
                }
            }
            let kind = if is_float {
                TokenKind::FloatLiteral
            } else {
                TokenKind::IntLiteral
            };
            return self.finish(kind, start, start_line, start_column);
        }

        if b == b'"' {
            self.advance();
            while let Some(b) = self.peek_byte() {
                if b == b'\\' {
                    self.advance();
                    self.advance();
                    continue;
                }
                if b == b'"' {
                    self.advance();
                    break;
                }
                self.advance();
            }
            return self.finish(TokenKind::StringLiteral, start, start_line, start_column);
        }

        if b == b'\'' {
            self.advance();
            while let Some(b) = self.peek_byte() {
                if b == b'\\' {
                    self.advance();
                    self.advance();
                    continue;
                }
                if b == b'\'' {
                    self.advance();
                    break;
                }
                self.advance();
            }
            return self.finish(TokenKind::CharLiteral, start, start_line, start_column);
        }

        // Any other character is a symbol: punctuation, operators, braces.
        // Advance by its full UTF-8 width, not a single byte — a non-ASCII
        // byte here (e.g. inside a Unicode identifier) would otherwise end
        // the token mid-codepoint and `Token::text` would panic slicing it.
        let width = self.source[self.pos as usize..]
            .chars()
            .next()
            .map_or(1, char::len_utf8);
        for _ in 0..width {
            self.advance();
        }
        self.finish(TokenKind::Symbol, start, start_line, start_column)
    }

    fn finish(&self, kind: TokenKind, start: u32, line: u32, column: u32) -> Token {
        Token {
            kind,
            start,
            end: self.pos,
            line,
            column,
        }
    }
}
