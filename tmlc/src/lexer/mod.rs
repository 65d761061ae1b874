//! # Lexer
//!
//! Single-pass, hand-written scanner: [`Source`] text in, `Vec<Token>` plus
//! a list of [`LexError`] out. There is no separate regex or DFA layer —
//! [`Lexer::tokenize`] dispatches on the current byte and each `lex_*`
//! method consumes exactly the bytes belonging to its token, advancing
//! `pos` as it goes. Work is byte-oriented rather than `char`-oriented
//! throughout; multi-byte UTF-8 only enters the picture inside identifiers,
//! string/char literals, and [`utf8_len`], which is used to step over a
//! whole codepoint without decoding it.
//!
//! ## Token categories
//!
//! - **Literals**: integers (decimal/hex/octal/binary, with `_` digit
//!   separators and an `i32`/`u64`/`f64`/... suffix), floats (decimal point
//!   or exponent), strings (with `\`-escapes and `{expr}` interpolation),
//!   backtick template literals (`${expr}` interpolation), chars, and the
//!   `true`/`false`/`null` keywords promoted straight to literal tokens
//!   rather than staying `Token::Keyword`.
//! - **Identifiers and keywords**: one scan over XID-ish bytes, then a
//!   [`Keyword::lookup`] table probe — an identifier that isn't a keyword
//!   falls through to `Token::Identifier` unchanged.
//! - **Punctuators**: looked up via [`Punctuator::table`]'s longest-prefix
//!   match rather than a hand-written cascade of `if`s, so adding an
//!   operator is a table edit, not a new branch.
//! - **Trivia**: single-line (`//`), doc (`///`), module-doc (`//!`), and
//!   block (`/* */`, nesting) comments. Plain line/block comments are
//!   consumed and dropped; doc and module-doc comments are kept as their
//!   own token kinds so the parser can attach them to the following item.
//!   Runs of blank lines collapse to one `Token::Newline` — the parser only
//!   needs to know *that* a statement boundary occurred, not how many blank
//!   lines separated it from the next one.
//!
//! ## Position tracking
//!
//! Every token's `position` is a [`SourceSpan`] computed by [`Source::span`]
//! from a `(start, end)` byte-offset pair recorded around each `lex_*` call
//! — there is no running line/column counter kept on the lexer itself;
//! line/column lookup happens lazily, only when a diagnostic is actually
//! rendered, which keeps the hot scanning loop to a single `usize` cursor.
//!
//! ## Error recovery
//!
//! Errors never abort the scan. An unterminated string/char/block-comment
//! records a [`LexError`] and returns early from that one `lex_*` call; an
//! unrecognized byte becomes a single [`Token::Error`] alongside its
//! [`LexError`], and scanning resumes at the next byte. The parser
//! downstream always gets a complete token stream — including an `Eof`
//! token at the end — to recover against, even over source full of
//! mistakes.

mod token;

pub use token::*;

use crate::source::{Source, SourceSpan};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LexError {
    pub message: String,
    pub span: SourceSpan,
}

pub struct Lexer<'a> {
    source: &'a Source,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    /// Doc comments collected since the last non-trivia token, handed to the
    /// parser attached to the *next* token rather than emitted inline.
    pending_docs: Vec<(String, SourceSpan)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a Source) -> Self {
        Self {
            source,
            bytes: source.text().as_bytes(),
            pos: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
            pending_docs: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        loop {
            self.skip_non_newline_whitespace();

            let Some(byte) = self.peek_byte() else {
                self.tokens.push(Token::Eof {
                    position: self.span_from(self.pos),
                });
                break;
            };

            match byte {
                b'\n' => self.lex_newline(),
                b'/' if self.peek_byte_at(1) == Some(b'/') => self.lex_line_comment(),
                b'/' if self.peek_byte_at(1) == Some(b'*') => self.lex_block_comment(),
                b'"' => self.lex_string(),
                b'`' => self.lex_template_literal(),
                b'\'' => self.lex_char(),
                b'0'..=b'9' => self.lex_number(),
                c if is_xid_start(c) || c == b'_' => self.lex_identifier_or_keyword(),
                _ => self.lex_punctuator_or_error(),
            }
        }

        (self.tokens, self.errors)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn span_from(&self, start: usize) -> SourceSpan {
        self.source.span(start, self.pos)
    }

    fn skip_non_newline_whitespace(&mut self) {
        while let Some(b) = self.peek_byte() {
            if b == b'\n' || !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn lex_newline(&mut self) {
        let start = self.pos;
        self.pos += 1;
        // Consecutive newlines collapse to a single token in the stream.
        while self.peek_byte() == Some(b'\n') || self.peek_byte().is_some_and(|b| b.is_ascii_whitespace() && b != b'\n') {
            if self.peek_byte() == Some(b'\n') {
                self.pos += 1;
            } else {
                // whitespace between blank lines
                let save = self.pos;
                self.skip_non_newline_whitespace();
                if self.peek_byte() != Some(b'\n') {
                    self.pos = save;
                    break;
                }
            }
        }
        self.tokens.push(Token::Newline {
            position: self.span_from(start),
        });
    }

    fn lex_line_comment(&mut self) {
        let start = self.pos;
        self.pos += 2;
        let is_doc = self.peek_byte() == Some(b'/') && self.peek_byte_at(1) != Some(b'/');
        let is_module_doc = self.peek_byte() == Some(b'!');
        if is_doc || is_module_doc {
            self.pos += 1;
        }
        let text_start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
        if is_doc || is_module_doc {
            let text = self.source.text()[text_start..self.pos].trim().to_string();
            let span = self.span_from(start);
            if is_doc {
                self.tokens.push(Token::DocComment {
                    text,
                    position: span,
                });
            } else {
                self.tokens.push(Token::ModuleDocComment {
                    text,
                    position: span,
                });
            }
        }
    }

    fn lex_block_comment(&mut self) {
        let start = self.pos;
        self.pos += 2;
        let mut depth = 1usize;
        while depth > 0 {
            match (self.peek_byte(), self.peek_byte_at(1)) {
                (Some(b'/'), Some(b'*')) => {
                    depth += 1;
                    self.pos += 2;
                }
                (Some(b'*'), Some(b'/')) => {
                    depth -= 1;
                    self.pos += 2;
                }
                (Some(_), _) => self.pos += 1,
                (None, _) => {
                    self.errors.push(LexError {
                        message: "unterminated block comment".into(),
                        span: self.span_from(start),
                    });
                    return;
                }
            }
        }
    }

    fn lex_identifier_or_keyword(&mut self) {
        let start = self.pos;
        while self
            .peek_byte()
            .is_some_and(|b| is_xid_continue(b) || b == b'_')
        {
            self.pos += 1;
        }
        let text = &self.source.text()[start..self.pos];
        let span = self.span_from(start);

        if let Some(keyword) = Keyword::lookup(text) {
            match keyword {
                Keyword::True => self.tokens.push(Token::BoolLiteral {
                    value: true,
                    position: span,
                }),
                Keyword::False => self.tokens.push(Token::BoolLiteral {
                    value: false,
                    position: span,
                }),
                Keyword::Null => self.tokens.push(Token::NullLiteral { position: span }),
                other => self.tokens.push(Token::Keyword {
                    keyword: other,
                    position: span,
                }),
            }
        } else {
            self.tokens.push(Token::Identifier {
                name: text.to_string(),
                position: span,
            });
        }
    }

    fn lex_number(&mut self) {
        let start = self.pos;
        let (base, digit_start) = if self.peek_byte() == Some(b'0') {
            match self.peek_byte_at(1) {
                Some(b'x') | Some(b'X') => (IntBase::Hex, 2),
                Some(b'o') | Some(b'O') => (IntBase::Octal, 2),
                Some(b'b') | Some(b'B') => (IntBase::Binary, 2),
                _ => (IntBase::Decimal, 0),
            }
        } else {
            (IntBase::Decimal, 0)
        };
        self.pos += digit_start;

        let is_digit: fn(u8) -> bool = match base {
            IntBase::Hex => |b| b.is_ascii_hexdigit(),
            IntBase::Octal => |b| (b'0'..=b'7').contains(&b),
            IntBase::Binary => |b| b == b'0' || b == b'1',
            IntBase::Decimal => |b| b.is_ascii_digit(),
        };

        let digits_start = self.pos;
        while self
            .peek_byte()
            .is_some_and(|b| is_digit(b) || b == b'_')
        {
            self.pos += 1;
        }

        let mut is_float = false;
        if base == IntBase::Decimal
            && self.peek_byte() == Some(b'.')
            && self.peek_byte_at(1).is_some_and(|b| b.is_ascii_digit())
        {
            is_float = true;
            self.pos += 1;
            while self.peek_byte().is_some_and(|b| b.is_ascii_digit() || b == b'_') {
                self.pos += 1;
            }
        }
        if base == IntBase::Decimal && matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                is_float = true;
                while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }

        let digits_text: String = self.source.text()[digits_start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();

        let suffix_start = self.pos;
        while self.peek_byte().is_some_and(|b| b.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        let suffix_text = &self.source.text()[suffix_start..self.pos];
        let suffix = parse_suffix(suffix_text);

        let printed = self.source.text()[start..self.pos].to_string();
        let span = self.span_from(start);

        if is_float {
            let value: f64 = digits_text.parse().unwrap_or(f64::NAN);
            self.tokens.push(Token::Float {
                value,
                suffix,
                printed,
                position: span,
            });
        } else {
            let radix = match base {
                IntBase::Decimal => 10,
                IntBase::Hex => 16,
                IntBase::Octal => 8,
                IntBase::Binary => 2,
            };
            match u128::from_str_radix(&digits_text, radix) {
                Ok(value) => self.tokens.push(Token::Integer {
                    value,
                    base,
                    suffix,
                    printed,
                    position: span,
                }),
                Err(_) => self.errors.push(LexError {
                    message: format!("integer literal '{printed}' out of range"),
                    span,
                }),
            }
        }
    }

    fn lex_string(&mut self) {
        let start = self.pos;
        self.pos += 1;
        let mut fragments = Vec::new();
        let mut plain = String::new();
        let mut has_interpolation = false;
        let mut buf = String::new();

        loop {
            match self.peek_byte() {
                None => {
                    self.errors.push(LexError {
                        message: "unterminated string literal".into(),
                        span: self.span_from(start),
                    });
                    return;
                }
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    let escaped = self.read_escape();
                    buf.push(escaped);
                }
                Some(b'{') if self.peek_byte_at(1) != Some(b'{') => {
                    has_interpolation = true;
                    fragments.push(StringFragment::Text(std::mem::take(&mut buf)));
                    self.pos += 1;
                    let expr_start = self.pos;
                    let mut depth = 1usize;
                    while depth > 0 {
                        match self.peek_byte() {
                            Some(b'{') => {
                                depth += 1;
                                self.pos += 1;
                            }
                            Some(b'}') => {
                                depth -= 1;
                                self.pos += 1;
                            }
                            Some(_) => self.pos += 1,
                            None => {
                                self.errors.push(LexError {
                                    message: "unterminated interpolation".into(),
                                    span: self.span_from(start),
                                });
                                return;
                            }
                        }
                    }
                    let expr_text = self.source.text()[expr_start..self.pos - 1].to_string();
                    fragments.push(StringFragment::Expr(expr_text));
                }
                Some(c) => {
                    let ch_len = utf8_len(c);
                    let text = &self.source.text()[self.pos..self.pos + ch_len];
                    buf.push_str(text);
                    self.pos += ch_len;
                }
            }
        }

        let span = self.span_from(start);
        if has_interpolation {
            fragments.push(StringFragment::Text(buf));
            self.tokens.push(Token::InterpolatedString {
                fragments,
                position: span,
            });
        } else {
            plain.push_str(&buf);
            self.tokens.push(Token::StringLiteral {
                value: plain,
                position: span,
            });
        }
    }

    fn lex_template_literal(&mut self) {
        let start = self.pos;
        self.pos += 1;
        let mut fragments = Vec::new();
        let mut buf = String::new();

        loop {
            match self.peek_byte() {
                None => {
                    self.errors.push(LexError {
                        message: "unterminated template literal".into(),
                        span: self.span_from(start),
                    });
                    return;
                }
                Some(b'`') => {
                    self.pos += 1;
                    break;
                }
                Some(b'$') if self.peek_byte_at(1) == Some(b'{') => {
                    fragments.push(StringFragment::Text(std::mem::take(&mut buf)));
                    self.pos += 2;
                    let expr_start = self.pos;
                    let mut depth = 1usize;
                    while depth > 0 {
                        match self.peek_byte() {
                            Some(b'{') => {
                                depth += 1;
                                self.pos += 1;
                            }
                            Some(b'}') => {
                                depth -= 1;
                                self.pos += 1;
                            }
                            Some(_) => self.pos += 1,
                            None => {
                                self.errors.push(LexError {
                                    message: "unterminated template expression".into(),
                                    span: self.span_from(start),
                                });
                                return;
                            }
                        }
                    }
                    let expr_text = self.source.text()[expr_start..self.pos - 1].to_string();
                    fragments.push(StringFragment::Expr(expr_text));
                }
                Some(c) => {
                    let ch_len = utf8_len(c);
                    buf.push_str(&self.source.text()[self.pos..self.pos + ch_len]);
                    self.pos += ch_len;
                }
            }
        }

        fragments.push(StringFragment::Text(buf));
        self.tokens.push(Token::TemplateLiteral {
            fragments,
            position: self.span_from(start),
        });
    }

    fn lex_char(&mut self) {
        let start = self.pos;
        self.pos += 1;
        let value = match self.peek_byte() {
            Some(b'\\') => self.read_escape(),
            Some(c) => {
                let ch_len = utf8_len(c);
                let ch = self.source.text()[self.pos..self.pos + ch_len]
                    .chars()
                    .next()
                    .unwrap_or('\u{FFFD}');
                self.pos += ch_len;
                ch
            }
            None => {
                self.errors.push(LexError {
                    message: "unterminated char literal".into(),
                    span: self.span_from(start),
                });
                return;
            }
        };
        if self.peek_byte() == Some(b'\'') {
            self.pos += 1;
        } else {
            self.errors.push(LexError {
                message: "expected closing ' for char literal".into(),
                span: self.span_from(start),
            });
        }
        self.tokens.push(Token::CharLiteral {
            value,
            position: self.span_from(start),
        });
    }

    /// Decodes one backslash escape at the cursor, leaving it positioned
    /// just past it. Assumes `peek_byte() == Some(b'\\')`.
    fn read_escape(&mut self) -> char {
        self.pos += 1;
        let c = self.peek_byte();
        self.pos += 1;
        match c {
            Some(b'n') => '\n',
            Some(b't') => '\t',
            Some(b'r') => '\r',
            Some(b'0') => '\0',
            Some(b'\\') => '\\',
            Some(b'\'') => '\'',
            Some(b'"') => '"',
            Some(b'{') => '{',
            Some(b'u') => self.read_unicode_escape(),
            _ => '\u{FFFD}',
        }
    }

    /// `\u{XXXX}` — cursor sits just past `u` on entry.
    fn read_unicode_escape(&mut self) -> char {
        if self.peek_byte() != Some(b'{') {
            return '\u{FFFD}';
        }
        self.pos += 1;
        let digits_start = self.pos;
        while self.peek_byte().is_some_and(|b| b.is_ascii_hexdigit()) {
            self.pos += 1;
        }
        let digits = &self.source.text()[digits_start..self.pos];
        let code = u32::from_str_radix(digits, 16).unwrap_or(0xFFFD);
        if self.peek_byte() == Some(b'}') {
            self.pos += 1;
        }
        char::from_u32(code).unwrap_or('\u{FFFD}')
    }

    fn lex_punctuator_or_error(&mut self) {
        let start = self.pos;
        let remaining = &self.source.text()[self.pos..];
        let found = Punctuator::table()
            .iter()
            .filter(|(text, _)| remaining.starts_with(text))
            .max_by_key(|(text, _)| text.len());

        match found {
            Some((text, punct)) => {
                self.pos += text.len();
                self.tokens.push(Token::Punctuator {
                    punct: *punct,
                    position: self.span_from(start),
                });
            }
            None => {
                let len = utf8_len(self.bytes[self.pos]);
                let bad = self.source.text()[self.pos..self.pos + len].to_string();
                self.pos += len;
                let span = self.span_from(start);
                self.errors.push(LexError {
                    message: format!("unexpected character '{bad}'"),
                    span,
                });
                self.tokens.push(Token::Error {
                    message: format!("unexpected character '{bad}'"),
                    position: span,
                });
            }
        }
    }
}

fn parse_suffix(text: &str) -> NumericSuffix {
    match text {
        "i8" => NumericSuffix::I8,
        "i16" => NumericSuffix::I16,
        "i32" => NumericSuffix::I32,
        "i64" => NumericSuffix::I64,
        "i128" => NumericSuffix::I128,
        "isize" => NumericSuffix::Isize,
        "u8" => NumericSuffix::U8,
        "u16" => NumericSuffix::U16,
        "u32" => NumericSuffix::U32,
        "u64" => NumericSuffix::U64,
        "u128" => NumericSuffix::U128,
        "usize" => NumericSuffix::Usize,
        "f32" => NumericSuffix::F32,
        "f64" => NumericSuffix::F64,
        _ => NumericSuffix::None,
    }
}

fn is_xid_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b >= 0x80
}

fn is_xid_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b >= 0x80
}

fn utf8_len(first_byte: u8) -> usize {
    if first_byte & 0x80 == 0 {
        1
    } else if first_byte & 0xE0 == 0xC0 {
        2
    } else if first_byte & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<Token> {
        let source = Source::new("test.tml", text);
        let (tokens, errors) = Lexer::new(&source).tokenize();
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens
    }

    #[test]
    fn lexes_a_minimal_function() {
        let tokens = lex("func main() -> I32 { 0 }");
        assert!(matches!(
            tokens[0],
            Token::Keyword {
                keyword: Keyword::Func,
                ..
            }
        ));
        assert!(matches!(tokens[1], Token::Identifier { .. }));
        assert!(matches!(
            tokens.last().unwrap(),
            Token::Eof { .. }
        ));
    }

    #[test]
    fn longest_match_for_operators() {
        let tokens = lex("a <<= b");
        assert!(tokens.iter().any(|t| matches!(
            t,
            Token::Punctuator {
                punct: Punctuator::ShlAssign,
                ..
            }
        )));
    }

    #[test]
    fn numeric_suffix_and_base() {
        let tokens = lex("0xFFi64");
        match &tokens[0] {
            Token::Integer {
                value, base, suffix, ..
            } => {
                assert_eq!(*value, 255);
                assert_eq!(*base, IntBase::Hex);
                assert_eq!(*suffix, NumericSuffix::I64);
            }
            other => panic!("expected integer token, got {other:?}"),
        }
    }

    #[test]
    fn underscores_are_digit_separators() {
        let tokens = lex("1_000_000");
        assert!(matches!(tokens[0], Token::Integer { value: 1_000_000, .. }));
    }

    #[test]
    fn doc_comments_are_retained() {
        let tokens = lex("/// does a thing\nfunc f() {}");
        assert!(matches!(tokens[0], Token::DocComment { .. }));
    }

    #[test]
    fn interpolated_string_fragments() {
        let tokens = lex(r#""hello {name}!""#);
        match &tokens[0] {
            Token::InterpolatedString { fragments, .. } => {
                assert_eq!(fragments.len(), 3);
                assert_eq!(fragments[0], StringFragment::Text("hello ".into()));
                assert_eq!(fragments[1], StringFragment::Expr("name".into()));
                assert_eq!(fragments[2], StringFragment::Text("!".into()));
            }
            other => panic!("expected interpolated string, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_string_reports_error_without_panicking() {
        let source = Source::new("test.tml", "\"abc");
        let (_tokens, errors) = Lexer::new(&source).tokenize();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn unexpected_byte_recovers_and_continues() {
        let source = Source::new("test.tml", "let x = @ 1");
        let (tokens, errors) = Lexer::new(&source).tokenize();
        assert_eq!(errors.len(), 1);
        // lexing continues past the bad byte
        assert!(tokens.iter().any(|t| matches!(t, Token::Integer { .. })));
    }

    #[test]
    fn consecutive_newlines_collapse() {
        let tokens = lex("let a = 1\n\n\nlet b = 2");
        let newline_count = tokens.iter().filter(|t| t.is_newline()).count();
        assert_eq!(newline_count, 1);
    }
}
