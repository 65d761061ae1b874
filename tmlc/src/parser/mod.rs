//! Recursive-descent parser with a Pratt expression core. Holds a token
//! cursor, an accumulating error list, and the small helper surface
//! (`peek`/`advance`/`check`/`expect`/`skip_newlines`) every sub-parser
//! builds on.
//!
//! ## Layout
//!
//! [`Parser`] itself (this file) only owns the token cursor and the
//! cross-cutting primitives: advancing, expecting a specific token,
//! collecting a pending doc comment, and synchronizing after an error. The
//! grammar is split by the kind of thing being parsed, each in its own
//! file, and each taking `&mut Parser` rather than being a method on it:
//!
//! - [`decl`] — top-level and member declarations (`func`, `type`, `enum`,
//!   `class`, `impl`, `behavior`, `const`, `use`, nested `module`/`namespace`).
//! - [`expr`] — statements, blocks, and the Pratt expression climber
//!   (operator precedence table plus prefix/postfix handling).
//! - [`pattern`] — `match`/`when`/`if let` patterns, including the
//!   top-level `A | B` or-pattern.
//! - [`types`] — type syntax (`TypeName`), generics, and `where` clauses.
//!
//! `pub use self::types::*` re-exports the type-syntax entry points so
//! callers outside the parser (the registry's shallow pre-pass, mainly)
//! can resolve a `TypeName` without reaching into a private submodule.
//!
//! ## Error recovery
//!
//! A single malformed declaration or statement must not take down the
//! whole parse: [`Parser::parse_module`] catches each `Err` from
//! `decl::parse_declaration`, records it, and calls
//! [`Parser::synchronize_to_decl`] to skip forward to the next token that
//! plausibly starts a new declaration (a keyword like `func`/`type`, or a
//! decorator `@`) before continuing. [`Parser::synchronize_to_stmt`] and
//! [`Parser::synchronize_to_brace`] do the analogous skip-to-boundary
//! recovery inside a block and inside a delimited group, so one bad
//! statement or one bad argument list doesn't cascade into spurious errors
//! for everything after it. The parser never panics on malformed input —
//! every failure path returns a [`ParseError`] carrying a span, a message,
//! and (where a fix is unambiguous) a [`FixIt`] suggestion.

mod decl;
mod expr;
mod pattern;
mod types;

use crate::ast::Module;
use crate::lexer::{Keyword, Punctuator, Token};
use crate::source::SourceSpan;

pub use self::types::*;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FixIt {
    Insert { at: SourceSpan, text: String },
    Replace { span: SourceSpan, text: String },
    Delete { span: SourceSpan },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParseError {
    pub message: String,
    pub span: SourceSpan,
    pub notes: Vec<String>,
    pub fixes: Vec<FixIt>,
    pub code: String,
}

impl ParseError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span,
            notes: Vec::new(),
            fixes: Vec::new(),
            code: code.into(),
        }
    }

    pub fn with_fix(mut self, fix: FixIt) -> Self {
        self.fixes.push(fix);
        self
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    pending_doc: Option<String>,
    /// Suppressed while parsing an `if`/`while`/`for`/`when` scrutinee so a
    /// following `{` is read as the body, not a struct literal.
    pub(crate) struct_literal_allowed: bool,
}

pub type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            pending_doc: None,
            struct_literal_allowed: true,
        }
    }

    /// Parses a whole compilation unit. Returns `Ok` only when no error was
    /// recorded; the caller can still inspect `into_errors()` for warnings
    /// accumulated alongside a successful parse (none are emitted today,
    /// but the split keeps the contract honest for §4.3).
    pub fn parse_module(mut self, name: &str) -> Result<Module<()>, Vec<ParseError>> {
        let mut declarations = Vec::new();
        self.skip_newlines();
        while !self.at_eof() {
            match decl::parse_declaration(&mut self) {
                Ok(d) => declarations.push(d),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_to_decl();
                }
            }
            self.skip_newlines();
        }

        if self.errors.is_empty() {
            Ok(Module {
                name: name.to_string(),
                declarations,
                doc: None,
            })
        } else {
            Err(self.errors)
        }
    }

    // --- cursor primitives -------------------------------------------------

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_next(&self) -> &Token {
        let idx = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    /// Raw lookahead relative to the cursor, clamped to the last token
    /// (`Eof`). Used by speculative lookahead that can't just `peek`/advance
    /// without risking partially consuming a misidentified construct.
    pub(crate) fn token_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub(crate) fn previous(&self) -> &Token {
        let idx = self.pos.saturating_sub(1);
        &self.tokens[idx]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !tok.is_eof() {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.peek().is_eof()
    }

    /// Newlines are significant to the grammar but almost every sub-parser
    /// wants them invisible; call explicitly at true statement boundaries.
    pub(crate) fn skip_newlines(&mut self) {
        while matches!(self.peek(), Token::Newline { .. }) {
            self.pos += 1;
        }
    }

    pub(crate) fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Token::Newline { .. } => {
                    self.pos += 1;
                }
                Token::DocComment { text, .. } => {
                    self.pending_doc = Some(text.clone());
                    self.pos += 1;
                }
                Token::ModuleDocComment { .. } => {
                    self.pos += 1;
                }
                _ => break,
            }
        }
    }

    pub(crate) fn collect_doc_comment(&mut self) -> Option<String> {
        self.pending_doc.take()
    }

    pub(crate) fn check_punct(&self, p: Punctuator) -> bool {
        matches!(self.peek(), Token::Punctuator { punct, .. } if *punct == p)
    }

    pub(crate) fn check_keyword(&self, k: Keyword) -> bool {
        matches!(self.peek(), Token::Keyword { keyword, .. } if *keyword == k)
    }

    pub(crate) fn match_punct(&mut self, p: Punctuator) -> bool {
        if self.check_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn match_keyword(&mut self, k: Keyword) -> bool {
        if self.check_keyword(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_punct(&mut self, p: Punctuator) -> PResult<SourceSpan> {
        if self.check_punct(p) {
            Ok(self.advance().position())
        } else {
            Err(self.expected(&format!("'{}'", p.text())))
        }
    }

    pub(crate) fn expect_keyword(&mut self, k: Keyword) -> PResult<SourceSpan> {
        if self.check_keyword(k) {
            Ok(self.advance().position())
        } else {
            Err(self.expected(&format!("'{}'", k.text())))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> PResult<(String, SourceSpan)> {
        match self.peek().clone() {
            Token::Identifier { name, position } => {
                self.advance();
                Ok((name, position))
            }
            _ => Err(self.expected("an identifier")),
        }
    }

    pub(crate) fn expected(&self, what: &str) -> ParseError {
        ParseError::new(
            "E_EXPECTED",
            format!("expected {what}, found {}", describe(self.peek())),
            self.peek().position(),
        )
    }

    // --- error recovery ------------------------------------------------

    /// Skips to the next semicolon, newline, or statement-starting keyword.
    pub(crate) fn synchronize_to_stmt(&mut self) {
        while !self.at_eof() {
            if self.check_punct(Punctuator::Semicolon) {
                self.advance();
                return;
            }
            if matches!(self.peek(), Token::Newline { .. }) || self.peek().starts_statement() {
                return;
            }
            self.advance();
        }
    }

    /// Skips to the next declaration-starting keyword or `@` decorator.
    pub(crate) fn synchronize_to_decl(&mut self) {
        while !self.at_eof() {
            if self.check_punct(Punctuator::At) || self.at_decl_keyword() {
                return;
            }
            self.advance();
        }
    }

    pub(crate) fn at_decl_keyword(&self) -> bool {
        matches!(
            self.peek(),
            Token::Keyword {
                keyword: Keyword::Func
                    | Keyword::Async
                    | Keyword::Type
                    | Keyword::Struct
                    | Keyword::Enum
                    | Keyword::Union
                    | Keyword::Class
                    | Keyword::Interface
                    | Keyword::Behavior
                    | Keyword::Impl
                    | Keyword::Const
                    | Keyword::Use
                    | Keyword::Mod
                    | Keyword::Namespace,
                ..
            }
        )
    }

    /// Matches brace depth until the enclosing `}` is consumed, used when a
    /// declaration or block body is unrecoverable token-by-token.
    pub(crate) fn synchronize_to_brace(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            if self.check_punct(Punctuator::LBrace) {
                depth += 1;
            } else if self.check_punct(Punctuator::RBrace) {
                if depth == 0 {
                    self.advance();
                    return;
                }
                depth -= 1;
            }
            self.advance();
        }
    }

    /// When the current token plausibly starts a new statement (newline,
    /// `}`, or a statement keyword) a missing `;` is treated as recovered
    /// rather than reported.
    pub(crate) fn try_recover_missing_semi(&mut self) -> bool {
        matches!(self.peek(), Token::Newline { .. })
            || self.check_punct(Punctuator::RBrace)
            || self.peek().starts_statement()
            || self.at_eof()
    }

    pub(crate) fn skip_until_punct(&mut self, p: Punctuator) {
        while !self.at_eof() && !self.check_punct(p) {
            self.advance();
        }
    }

    /// Records a non-fatal diagnostic without aborting the current parse —
    /// used for recoverable issues like a chained comparison.
    pub(crate) fn record_error(&mut self, error: ParseError) {
        self.errors.push(error);
    }
}

fn describe(tok: &Token) -> String {
    match tok {
        Token::Identifier { name, .. } => format!("identifier '{name}'"),
        Token::Keyword { keyword, .. } => format!("'{}'", keyword.text()),
        Token::Punctuator { punct, .. } => format!("'{}'", punct.text()),
        Token::Newline { .. } => "a newline".to_string(),
        Token::Eof { .. } => "end of file".to_string(),
        Token::Integer { .. } => "an integer literal".to_string(),
        Token::Float { .. } => "a float literal".to_string(),
        Token::StringLiteral { .. } | Token::InterpolatedString { .. } => {
            "a string literal".to_string()
        }
        Token::TemplateLiteral { .. } => "a template literal".to_string(),
        Token::CharLiteral { .. } => "a char literal".to_string(),
        Token::BoolLiteral { .. } => "a boolean literal".to_string(),
        Token::NullLiteral { .. } => "'null'".to_string(),
        Token::DocComment { .. } | Token::ModuleDocComment { .. } => "a doc comment".to_string(),
        Token::Error { message, .. } => format!("an invalid token ({message})"),
    }
}
