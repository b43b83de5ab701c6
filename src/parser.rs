//! Index-overlay recursive-descent parser (spec §4.2): turns a Java source
//! buffer into a `NodeArena` plus a root `NodeIndex`, never copying text —
//! every cell stores byte offsets into the original buffer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arena::{ArenaError, Comment, CommentKind, NodeArena, NodeIndex, NodeType, MAX_SOURCE_BYTES};
use crate::lexer::{Lexer, Token, TokenKind};

/// Nesting depth above which the parser refuses to continue, to bound
/// stack usage against pathological or adversarial input (spec §4.2).
pub const MAX_NESTING_DEPTH: u32 = 500;
/// Identifiers longer than this are rejected outright (spec §4.2).
pub const MAX_IDENTIFIER_LENGTH: usize = 4096;

/// The language version the parser targets. The grammar subset implemented
/// here does not yet branch on version (no `sealed`/`record`-era gating),
/// but the contract carries it through for forward compatibility with
/// version-specific productions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetVersion {
    Java8,
    Java11,
    Java17,
    Java21,
}

impl Default for TargetVersion {
    fn default() -> Self {
        TargetVersion::Java17
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("source exceeds the {MAX_SOURCE_BYTES}-byte size cap")]
    SourceTooLarge,
    #[error("nesting depth exceeds the {MAX_NESTING_DEPTH} cap")]
    NestingTooDeep,
    #[error("identifier exceeds the {MAX_IDENTIFIER_LENGTH}-byte length cap")]
    IdentifierTooLong,
    #[error("unexpected token: expected {expected}, found {actual:?}")]
    UnexpectedToken { expected: String, actual: String },
    #[error("arena allocation failed: {0}")]
    Arena(#[from] ArenaError),
}

/// One recorded syntax error: position plus what was expected vs. found.
/// The parser accumulates all of these but treats the first as primary
/// (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}:{}", self.kind, self.line, self.column)
    }
}

impl std::error::Error for ParseError {}

/// Result of a parse: the arena built so far (possibly partial, if
/// `errors` is non-empty), the root index, and collected comments. The
/// caller decides whether any errors are fatal; the pipeline's `ParseStage`
/// treats a non-empty `errors` list as a `Failure` using the first error.
pub struct ParseOutcome {
    pub arena: NodeArena,
    pub root: NodeIndex,
    pub comments: Vec<Comment>,
    pub errors: Vec<ParseError>,
}

pub fn parse(
    source: &str,
    target_version: TargetVersion,
    memory_soft_limit_bytes: u64,
) -> ParseOutcome {
    let mut parser = Parser::new(source, target_version, memory_soft_limit_bytes);
    parser.parse_compilation_unit()
}

struct Parser<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    current: Token,
    depth: u32,
    errors: Vec<ParseError>,
    pending_leading_comments: Vec<Comment>,
    all_comments: Vec<Comment>,
    #[allow(dead_code)]
    target_version: TargetVersion,
    memory_soft_limit_bytes: u64,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, target_version: TargetVersion, memory_soft_limit_bytes: u64) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            source,
            lexer,
            current,
            depth: 0,
            errors: Vec::new(),
            pending_leading_comments: Vec::new(),
            all_comments: Vec::new(),
            target_version,
            memory_soft_limit_bytes,
        }
    }

    fn memory_soft_limit(&self) -> u64 {
        self.memory_soft_limit_bytes
    }

    fn error(&mut self, kind: ParseErrorKind) {
        self.errors.push(ParseError {
            kind,
            line: self.current.line,
            column: self.current.column,
            offset: self.current.start,
        });
    }

    /// Advances past comment tokens, stashing them as pending leading
    /// comments (tracking the newline count before them so attachment can
    /// later decide "immediately preceding, zero or more newlines, no
    /// intervening tokens" per spec §4.2).
    fn bump(&mut self) -> Token {
        let prev = self.current;
        loop {
            let next = self.lexer.next_token();
            match next.kind {
                TokenKind::LineComment | TokenKind::BlockComment | TokenKind::DocComment => {
                    let kind = match next.kind {
                        TokenKind::LineComment => CommentKind::Line,
                        TokenKind::DocComment => CommentKind::Doc,
                        _ => CommentKind::Block,
                    };
                    self.pending_leading_comments.push(Comment {
                        kind,
                        content_offset: next.start,
                        content_length: next.end - next.start,
                        attach_to: NodeIndex::NONE,
                        leading: true,
                    });
                }
                _ => {
                    self.current = next;
                    break;
                }
            }
        }
        prev
    }

    fn attach_pending_comments(&mut self, node: NodeIndex) {
        for mut comment in self.pending_leading_comments.drain(..) {
            comment.attach_to = node;
            self.all_comments.push(comment);
        }
    }

    fn attach_trailing_comment_if_same_line(&mut self, node: NodeIndex, node_end_line: u32) {
        if self.current.line == node_end_line {
            // A comment was already consumed into `pending_leading_comments`
            // by `bump`; if it sat on the same line as what it follows, it's
            // trailing rather than leading to whatever comes next.
            if let Some(last) = self.pending_leading_comments.last() {
                if last.leading {
                    let mut comment = self.pending_leading_comments.pop().unwrap();
                    comment.attach_to = node;
                    comment.leading = false;
                    self.all_comments.push(comment);
                }
            }
        }
    }

    fn text(&self, tok: Token) -> &'a str {
        tok.text(self.source)
    }

    fn is_symbol(&self, s: &str) -> bool {
        self.current.kind == TokenKind::Symbol && self.text(self.current) == s
    }

    fn is_keyword(&self, s: &str) -> bool {
        self.current.kind == TokenKind::Keyword && self.text(self.current) == s
    }

    fn enter(&mut self) -> Result<(), ()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error(ParseErrorKind::NestingTooDeep);
            return Err(());
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }

    fn check_identifier_length(&mut self, tok: Token) {
        if (tok.end - tok.start) as usize > MAX_IDENTIFIER_LENGTH {
            self.error(ParseErrorKind::IdentifierTooLong);
        }
    }

    /// Panic-mode recovery: skip forward to the next top-level declaration
    /// boundary — a `class`/`interface`/`enum`/`record`/`@interface`
    /// keyword reached at brace depth 0 — per spec §4.2.
    fn recover_to_next_top_level_declaration(&mut self) {
        let mut brace_depth: i64 = 0;
        loop {
            if self.current.kind == TokenKind::Eof {
                return;
            }
            if self.is_symbol("{") {
                brace_depth += 1;
            } else if self.is_symbol("}") {
                brace_depth -= 1;
            } else if brace_depth <= 0
                && self.current.kind == TokenKind::Keyword
                && matches!(
                    self.text(self.current),
                    "class" | "interface" | "enum" | "record"
                )
            {
                return;
            } else if brace_depth <= 0 && self.is_symbol("@") {
                return;
            }
            self.bump();
        }
    }

    fn parse_compilation_unit(&mut self) -> ParseOutcome {
        if self.source.len() > MAX_SOURCE_BYTES {
            self.error(ParseErrorKind::SourceTooLarge);
            let arena = NodeArena::new(self.source.len().min(1), self.memory_soft_limit());
            return ParseOutcome {
                arena,
                root: NodeIndex::NONE,
                comments: Vec::new(),
                errors: self.errors.clone(),
            };
        }

        let mut arena = NodeArena::new(self.source.len(), self.memory_soft_limit());
        let child_list = arena.new_child_list();

        let mut allocate_failed = false;
        macro_rules! alloc {
            ($arena:expr, $tag:expr, $start:expr, $end:expr, $data:expr) => {
                match $arena.allocate($tag, $start, $end, $data) {
                    Ok(i) => i,
                    Err(e) => {
                        self.error(ParseErrorKind::Arena(e));
                        allocate_failed = true;
                        NodeIndex::NONE
                    }
                }
            };
        }

        while self.current.kind != TokenKind::Eof && !allocate_failed {
            let start = self.current.start;

            if self.is_keyword("package") {
                if let Some(node) = self.parse_package_declaration(&mut arena, start) {
                    arena.push_child(child_list, node);
                }
            } else if self.is_keyword("import") {
                if let Some(node) = self.parse_import_declaration(&mut arena, start) {
                    arena.push_child(child_list, node);
                }
            } else if self.is_type_declaration_start() {
                if self.enter().is_ok() {
                    if let Some(node) = self.parse_type_declaration(&mut arena, start) {
                        arena.push_child(child_list, node);
                    }
                    self.exit();
                } else {
                    self.recover_to_next_top_level_declaration();
                }
            } else if self.is_symbol(";") {
                self.bump();
            } else {
                self.error(ParseErrorKind::UnexpectedToken {
                    expected: "package, import, or type declaration".to_string(),
                    actual: format!("{:?} {:?}", self.current.kind, self.text(self.current)),
                });
                self.recover_to_next_top_level_declaration();
            }
        }

        let end = self.source.len() as u32;
        let root = alloc!(arena, NodeType::CompilationUnit, 0, end, child_list);
        if root.is_some() {
            self.attach_pending_comments(root);
        }

        ParseOutcome {
            arena,
            root,
            comments: std::mem::take(&mut self.all_comments),
            errors: std::mem::take(&mut self.errors),
        }
    }

    fn is_type_declaration_start(&self) -> bool {
        if self.current.kind == TokenKind::Keyword
            && matches!(
                self.text(self.current),
                "public"
                    | "private"
                    | "protected"
                    | "static"
                    | "final"
                    | "abstract"
                    | "strictfp"
                    | "sealed"
                    | "class"
                    | "interface"
                    | "enum"
                    | "record"
            )
        {
            return true;
        }
        self.is_symbol("@")
    }

    fn parse_package_declaration(
        &mut self,
        arena: &mut NodeArena,
        start: u32,
    ) -> Option<NodeIndex> {
        self.bump(); // 'package'
        while !self.is_symbol(";") && self.current.kind != TokenKind::Eof {
            self.bump();
        }
        let end = self.current.end;
        self.bump(); // ';'
        let node = arena
            .allocate(NodeType::PackageDeclaration, start, end, 0)
            .map_err(|e| self.error(ParseErrorKind::Arena(e)))
            .ok()?;
        self.attach_pending_comments(node);
        Some(node)
    }

    fn parse_import_declaration(
        &mut self,
        arena: &mut NodeArena,
        start: u32,
    ) -> Option<NodeIndex> {
        self.bump(); // 'import'
        while !self.is_symbol(";") && self.current.kind != TokenKind::Eof {
            self.bump();
        }
        let end = self.current.end;
        self.bump(); // ';'
        let node = arena
            .allocate(NodeType::ImportDeclaration, start, end, 0)
            .map_err(|e| self.error(ParseErrorKind::Arena(e)))
            .ok()?;
        self.attach_pending_comments(node);
        Some(node)
    }

    fn parse_modifiers(&mut self, arena: &mut NodeArena, children: u32) {
        loop {
            if self.current.kind == TokenKind::Keyword
                && matches!(
                    self.text(self.current),
                    "public"
                        | "private"
                        | "protected"
                        | "static"
                        | "final"
                        | "abstract"
                        | "synchronized"
                        | "native"
                        | "transient"
                        | "volatile"
                        | "strictfp"
                        | "default"
                        | "sealed"
                )
            {
                let tok = self.current;
                self.bump();
                if let Ok(node) = arena.allocate(NodeType::Modifier, tok.start, tok.end, 0) {
                    arena.push_child(children, node);
                }
            } else if self.is_symbol("@") {
                let start = tok_start(self.current);
                self.bump();
                if self.current.kind == TokenKind::Identifier {
                    self.check_identifier_length(self.current);
                    self.bump();
                }
                // Optional annotation arguments: skip a balanced `(...)`.
                if self.is_symbol("(") {
                    self.skip_balanced("(", ")");
                }
                let end = self.lexer_pos_or_current_start();
                if let Ok(node) = arena.allocate(NodeType::Annotation, start, end, 0) {
                    arena.push_child(children, node);
                }
            } else {
                break;
            }
        }
    }

    fn lexer_pos_or_current_start(&self) -> u32 {
        self.current.start
    }

    fn skip_balanced(&mut self, open: &str, close: &str) {
        let mut depth = 0i64;
        loop {
            if self.current.kind == TokenKind::Eof {
                return;
            }
            if self.is_symbol(open) {
                depth += 1;
            } else if self.is_symbol(close) {
                depth -= 1;
                if depth == 0 {
                    self.bump();
                    return;
                }
            }
            self.bump();
        }
    }

    /// Parses `class`/`interface`/`enum`/`record` plus an opaque `{ ... }`
    /// body whose members are split into `FieldDeclaration` /
    /// `MethodDeclaration` / `ConstructorDeclaration` / nested type
    /// declarations. Method/constructor bodies are scanned by brace
    /// matching into a single `Block` node with per-statement children
    /// split on top-level `;` and `{`/`}` boundaries — this core does not
    /// need full Java expression grammar, only enough structure for rules
    /// to operate on (line/brace/import-adjacent concerns).
    fn parse_type_declaration(&mut self, arena: &mut NodeArena, start: u32) -> Option<NodeIndex> {
        let modifier_children = arena.new_child_list();
        self.parse_modifiers(arena, modifier_children);

        let kind = match self.text(self.current) {
            "class" => NodeType::ClassDeclaration,
            "interface" => NodeType::InterfaceDeclaration,
            "enum" => NodeType::EnumDeclaration,
            "record" => NodeType::RecordDeclaration,
            other => {
                self.error(ParseErrorKind::UnexpectedToken {
                    expected: "class, interface, enum, or record".to_string(),
                    actual: other.to_string(),
                });
                self.recover_to_next_top_level_declaration();
                return None;
            }
        };
        self.bump(); // 'class' etc

        if self.current.kind == TokenKind::Identifier {
            self.check_identifier_length(self.current);
            self.bump();
        } else {
            self.error(ParseErrorKind::UnexpectedToken {
                expected: "type name".to_string(),
                actual: format!("{:?}", self.current.kind),
            });
        }

        // Skip generics, extends/implements/permits clauses, record header
        // — anything up to the opening brace — without building structure
        // for them; these don't drive the illustrative rules.
        while !self.is_symbol("{") && self.current.kind != TokenKind::Eof {
            if self.is_symbol("(") {
                self.skip_balanced("(", ")");
            } else if self.is_symbol("<") {
                self.skip_balanced("<", ">");
            } else {
                self.bump();
            }
        }

        let body_children = arena.new_child_list();
        if self.is_symbol("{") {
            self.bump();
            self.parse_member_list(arena, body_children);
            if self.is_symbol("}") {
                self.bump();
            } else {
                self.error(ParseErrorKind::UnexpectedToken {
                    expected: "}".to_string(),
                    actual: format!("{:?}", self.current.kind),
                });
            }
        }

        let end = self.current.start.max(start);
        let node = arena
            .allocate(kind, start, end, body_children)
            .map_err(|e| self.error(ParseErrorKind::Arena(e)))
            .ok()?;
        self.attach_pending_comments(node);
        Some(node)
    }

    fn parse_member_list(&mut self, arena: &mut NodeArena, children: u32) {
        while !self.is_symbol("}") && self.current.kind != TokenKind::Eof {
            if self.enter().is_err() {
                return;
            }
            let start = self.current.start;

            if self.is_symbol(";") {
                self.bump();
                self.exit();
                continue;
            }

            if self.is_type_declaration_start()
                && matches!(
                    self.peek_after_modifiers_and_annotations(),
                    "class" | "interface" | "enum" | "record"
                )
            {
                if let Some(node) = self.parse_type_declaration(arena, start) {
                    arena.push_child(children, node);
                }
                self.exit();
                continue;
            }

            if let Some(node) = self.parse_member(arena, start) {
                arena.push_child(children, node);
            } else {
                // Couldn't make sense of this member; skip one token to
                // guarantee forward progress rather than looping forever.
                if self.current.kind != TokenKind::Eof {
                    self.bump();
                }
            }
            self.exit();
        }
    }

    /// Looks ahead (without consuming) past modifiers/annotations to see
    /// whether the member is a nested type declaration.
    fn peek_after_modifiers_and_annotations(&self) -> &'a str {
        // Cheap heuristic: re-lex from current position is expensive, so
        // instead scan forward using a scratch lexer clone-free approach —
        // acceptable since modifiers are few tokens.
        let mut lexer = Lexer::new(self.source);
        // Fast-forward scratch lexer to our current position by replaying
        // tokens; bounded by a small modifier run so this stays cheap.
        let mut tok = lexer.next_token();
        while tok.start < self.current.start && tok.kind != TokenKind::Eof {
            tok = lexer.next_token();
        }
        loop {
            match tok.kind {
                TokenKind::Keyword
                    if matches!(
                        tok.text(self.source),
                        "public"
                            | "private"
                            | "protected"
                            | "static"
                            | "final"
                            | "abstract"
                            | "synchronized"
                            | "native"
                            | "transient"
                            | "volatile"
                            | "strictfp"
                            | "default"
                            | "sealed"
                    ) =>
                {
                    tok = lexer.next_token();
                }
                TokenKind::Symbol if tok.text(self.source) == "@" => {
                    tok = lexer.next_token(); // annotation name
                    tok = lexer.next_token();
                    if tok.kind == TokenKind::Symbol && tok.text(self.source) == "(" {
                        let mut depth = 1i64;
                        tok = lexer.next_token();
                        while depth > 0 && tok.kind != TokenKind::Eof {
                            if tok.kind == TokenKind::Symbol && tok.text(self.source) == "(" {
                                depth += 1;
                            } else if tok.kind == TokenKind::Symbol && tok.text(self.source) == ")"
                            {
                                depth -= 1;
                            }
                            tok = lexer.next_token();
                        }
                    }
                }
                _ => break,
            }
        }
        tok.text(self.source)
    }

    /// Parses one class/interface body member: a field, method, or
    /// constructor. Returns `None` on unrecoverable desync within the
    /// member so the caller can skip a token and retry.
    fn parse_member(&mut self, arena: &mut NodeArena, start: u32) -> Option<NodeIndex> {
        let modifier_children = arena.new_child_list();
        self.parse_modifiers(arena, modifier_children);

        // Generic method type parameters: `<T> T foo(...)`.
        if self.is_symbol("<") {
            self.skip_balanced("<", ">");
        }

        // Constructor: identifier immediately followed by `(`.
        if self.current.kind == TokenKind::Identifier && self.peek_is_paren_after_identifier() {
            self.check_identifier_length(self.current);
            self.bump();
            self.skip_balanced("(", ")");
            self.skip_throws_clause();
            let body = self.parse_block_or_semicolon(arena);
            let end = self.current.start.max(start);
            let node = arena
                .allocate(NodeType::ConstructorDeclaration, start, end, body)
                .ok()?;
            self.attach_pending_comments(node);
            return Some(node);
        }

        // Return type (possibly `void`), then name, then `(` means method,
        // otherwise it's a field.
        self.skip_type_reference();

        if self.current.kind != TokenKind::Identifier {
            return None;
        }
        self.check_identifier_length(self.current);
        self.bump();

        if self.is_symbol("(") {
            self.skip_balanced("(", ")");
            // trailing array brackets on return type, e.g. `foo()[]`
            while self.is_symbol("[") {
                self.skip_balanced("[", "]");
            }
            self.skip_throws_clause();
            let body = self.parse_block_or_semicolon(arena);
            let end = self.current.start.max(start);
            let node = arena
                .allocate(NodeType::MethodDeclaration, start, end, body)
                .ok()?;
            self.attach_pending_comments(node);
            return Some(node);
        }

        // Field declaration, possibly with an initializer and further
        // comma-separated declarators; skip to the terminating `;`.
        while !self.is_symbol(";") && self.current.kind != TokenKind::Eof {
            if self.is_symbol("{") {
                // Defensive: malformed input shouldn't hang the parser.
                self.skip_balanced("{", "}");
            } else {
                self.bump();
            }
        }
        let end = self.current.end;
        let node_end_line = self.current.line;
        if self.is_symbol(";") {
            self.bump();
        }
        let node = arena
            .allocate(NodeType::FieldDeclaration, start, end, 0)
            .ok()?;
        self.attach_pending_comments(node);
        self.attach_trailing_comment_if_same_line(node, node_end_line);
        Some(node)
    }

    fn peek_is_paren_after_identifier(&self) -> bool {
        let mut lexer = Lexer::new(self.source);
        let mut tok = lexer.next_token();
        while tok.start <= self.current.start && tok.kind != TokenKind::Eof {
            if tok.start == self.current.start {
                tok = lexer.next_token();
                break;
            }
            tok = lexer.next_token();
        }
        tok.kind == TokenKind::Symbol && tok.text(self.source) == "("
    }

    fn skip_type_reference(&mut self) {
        while self.current.kind == TokenKind::Identifier
            || self.is_symbol(".")
            || self.is_keyword("void")
            || self.is_keyword("int")
            || self.is_keyword("long")
            || self.is_keyword("short")
            || self.is_keyword("byte")
            || self.is_keyword("char")
            || self.is_keyword("boolean")
            || self.is_keyword("float")
            || self.is_keyword("double")
        {
            self.bump();
            if self.is_symbol("<") {
                self.skip_balanced("<", ">");
            }
            while self.is_symbol("[") {
                self.skip_balanced("[", "]");
            }
            if !self.is_symbol(".") {
                break;
            }
        }
    }

    fn skip_throws_clause(&mut self) {
        if self.is_keyword("throws") {
            self.bump();
            while !self.is_symbol("{") && !self.is_symbol(";") && self.current.kind != TokenKind::Eof
            {
                self.bump();
            }
        }
    }

    /// Either a `{ ... }` block (returned as a child-list index for the
    /// `Block` node's statements) or a bare `;` for an abstract/interface
    /// method. Returns `0` (an unused placeholder child-list) when there is
    /// no body.
    fn parse_block_or_semicolon(&mut self, arena: &mut NodeArena) -> u32 {
        if self.is_symbol(";") {
            self.bump();
            return u32::MAX;
        }
        if !self.is_symbol("{") {
            return u32::MAX;
        }
        self.parse_block(arena)
    }

    /// Scans a `{ ... }` body by brace matching, splitting top-level
    /// content into `Statement` nodes on `;` and nested `{`/`}`
    /// boundaries, and returns the child-list index holding a single
    /// `Block` node.
    fn parse_block(&mut self, arena: &mut NodeArena) -> u32 {
        let block_start = self.current.start;
        self.bump(); // '{'
        let stmt_children = arena.new_child_list();
        let mut depth = 1i64;
        let mut stmt_start = self.current.start;

        while depth > 0 && self.current.kind != TokenKind::Eof {
            if self.is_symbol("{") {
                depth += 1;
                self.bump();
            } else if self.is_symbol("}") {
                depth -= 1;
                if depth == 0 {
                    if self.current.start > stmt_start {
                        let end = self.current.start;
                        if let Ok(node) =
                            arena.allocate(NodeType::Statement, stmt_start, end, 0)
                        {
                            arena.push_child(stmt_children, node);
                        }
                    }
                    self.bump();
                    break;
                }
                self.bump();
            } else if depth == 1 && self.is_symbol(";") {
                let end = self.current.end;
                self.bump();
                if let Ok(node) = arena.allocate(NodeType::Statement, stmt_start, end, 0) {
                    arena.push_child(stmt_children, node);
                }
                stmt_start = self.current.start;
            } else {
                self.bump();
            }
        }

        let block_end = self.current.start.max(block_start);
        let block_list = arena.new_child_list();
        if let Ok(block_node) = arena.allocate(NodeType::Block, block_start, block_end, stmt_children)
        {
            arena.push_child(block_list, block_node);
        }
        block_list
    }
}

fn tok_start(tok: Token) -> u32 {
    tok.start
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> ParseOutcome {
        let outcome = parse(source, TargetVersion::Java17, u64::MAX);
        assert!(
            outcome.errors.is_empty(),
            "expected no parse errors, got {:?}",
            outcome.errors
        );
        outcome
    }

    #[test]
    fn empty_source_has_childless_root() {
        let outcome = parse_ok("");
        assert!(outcome.root.is_some());
        let data = outcome.arena.get_data(outcome.root).unwrap();
        assert!(outcome.arena.children(data).is_empty());
    }

    #[test]
    fn parses_package_and_import() {
        let outcome = parse_ok("package com.example;\nimport java.util.List;\n");
        let data = outcome.arena.get_data(outcome.root).unwrap();
        let children = outcome.arena.children(data);
        assert_eq!(children.len(), 2);
        assert_eq!(
            outcome.arena.get_type(children[0]).unwrap(),
            NodeType::PackageDeclaration
        );
        assert_eq!(
            outcome.arena.get_type(children[1]).unwrap(),
            NodeType::ImportDeclaration
        );
    }

    #[test]
    fn parses_class_with_field_and_method() {
        let source = r#"
public class Foo {
    private int bar;

    public int getBar() {
        return bar;
    }
}
"#;
        let outcome = parse_ok(source);
        let data = outcome.arena.get_data(outcome.root).unwrap();
        let children = outcome.arena.children(data);
        assert_eq!(children.len(), 1);
        assert_eq!(
            outcome.arena.get_type(children[0]).unwrap(),
            NodeType::ClassDeclaration
        );
        let class_body = outcome.arena.get_data(children[0]).unwrap();
        let members = outcome.arena.children(class_body);
        assert_eq!(members.len(), 2);
        assert_eq!(
            outcome.arena.get_type(members[0]).unwrap(),
            NodeType::FieldDeclaration
        );
        assert_eq!(
            outcome.arena.get_type(members[1]).unwrap(),
            NodeType::MethodDeclaration
        );
    }

    #[test]
    fn attaches_doc_comment_to_following_method() {
        let source = r#"
public class Foo {
    /**
     * Does a thing.
     */
    public void bar() {}
}
"#;
        let outcome = parse_ok(source);
        assert_eq!(outcome.comments.len(), 1);
        assert_eq!(outcome.comments[0].kind, CommentKind::Doc);
        assert!(outcome.comments[0].leading);
    }

    #[test]
    fn reports_error_on_unterminated_class() {
        let outcome = parse("public class Foo {", TargetVersion::Java17, u64::MAX);
        assert!(!outcome.errors.is_empty());
    }

    #[test]
    fn recovers_after_garbage_between_declarations() {
        let source = "!!! garbage !!!\nclass Foo {}\n";
        let outcome = parse(source, TargetVersion::Java17, u64::MAX);
        assert!(!outcome.errors.is_empty());
        let data = outcome.arena.get_data(outcome.root).unwrap();
        let children = outcome.arena.children(data);
        assert!(children
            .iter()
            .any(|&c| outcome.arena.get_type(c).unwrap() == NodeType::ClassDeclaration));
    }

    #[test]
    fn nesting_cap_is_enforced() {
        let mut source = String::new();
        for i in 0..600 {
            source.push_str(&format!("class C{i} {{\n"));
        }
        for _ in 0..600 {
            source.push_str("}\n");
        }
        let outcome = parse(&source, TargetVersion::Java17, u64::MAX);
        assert!(outcome
            .errors
            .iter()
            .any(|e| e.kind == ParseErrorKind::NestingTooDeep));
    }
}
