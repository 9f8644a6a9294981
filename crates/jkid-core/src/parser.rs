//! JSON parser: tokenizes text and drives an [`EventSink`] with structural events.
//!
//! The parser is a recursive-descent grammar over a one-token-lookahead lexer:
//!
//! ```text
//! value  := object | array | string | number | "true" | "false" | "null"
//! object := '{' [ member (',' member)* ] '}'
//! member := string ':' value
//! array  := '[' [ value (',' value)* ] ']'
//! ```
//!
//! It never materializes the document itself. Each structural step is
//! forwarded to the sink as it is recognized, so a sink can build typed
//! objects incrementally (see `deserializer`) or a plain [`JsonValue`] tree
//! (see [`parse_value`]).
//!
//! # Key design decisions
//!
//! - **Fail fast**: the first malformed token aborts with `JkidError::Syntax`
//!   carrying its byte offset. Errors returned by the sink abort the same way,
//!   so there are never partial results.
//! - **Bounded nesting**: recursion depth is capped by `max_depth`; deeper
//!   input is reported as a syntax error instead of exhausting the stack.
//! - **Unified numbers**: integers and decimals are both parsed as `f64`.

use crate::error::{JkidError, Result};
use crate::value::JsonValue;

/// Default nesting limit used by [`parse`] and [`parse_value`].
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Receiver of structural parse events.
///
/// Events arrive in document order. Inside an object every value is preceded by
/// exactly one `property_name`; array elements have none.
pub trait EventSink {
    fn begin_object(&mut self) -> Result<()>;
    fn property_name(&mut self, name: String) -> Result<()>;
    fn begin_array(&mut self) -> Result<()>;
    fn scalar_value(&mut self, value: JsonValue) -> Result<()>;
    fn end_array(&mut self) -> Result<()>;
    fn end_object(&mut self) -> Result<()>;
}

/// One structural event, for callers that prefer a recorded sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonEvent {
    BeginObject,
    PropertyName(String),
    BeginArray,
    Scalar(JsonValue),
    EndArray,
    EndObject,
}

impl EventSink for Vec<JsonEvent> {
    fn begin_object(&mut self) -> Result<()> {
        self.push(JsonEvent::BeginObject);
        Ok(())
    }

    fn property_name(&mut self, name: String) -> Result<()> {
        self.push(JsonEvent::PropertyName(name));
        Ok(())
    }

    fn begin_array(&mut self) -> Result<()> {
        self.push(JsonEvent::BeginArray);
        Ok(())
    }

    fn scalar_value(&mut self, value: JsonValue) -> Result<()> {
        self.push(JsonEvent::Scalar(value));
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        self.push(JsonEvent::EndArray);
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        self.push(JsonEvent::EndObject);
        Ok(())
    }
}

/// Parse `text` and forward every structural event to `sink`.
pub fn parse(text: &str, sink: &mut impl EventSink) -> Result<()> {
    Parser::new(text, DEFAULT_MAX_DEPTH).parse(sink)
}

/// Parse `text` into the ordered list of structural events.
pub fn events(text: &str) -> Result<Vec<JsonEvent>> {
    let mut out = Vec::new();
    parse(text, &mut out)?;
    Ok(out)
}

/// Parse `text` into a [`JsonValue`] tree.
pub fn parse_value(text: &str) -> Result<JsonValue> {
    let mut builder = ValueBuilder::default();
    parse(text, &mut builder)?;
    builder.finish()
}

/// Recursive-descent parser over a [`Lexer`].
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str, max_depth: usize) -> Self {
        Self {
            lexer: Lexer::new(text),
            depth: 0,
            max_depth,
        }
    }

    /// Parse exactly one root value followed by optional whitespace.
    pub fn parse(mut self, sink: &mut impl EventSink) -> Result<()> {
        let first = self.lexer.next_token()?;
        self.parse_value(first, sink)?;
        let trailing = self.lexer.next_token()?;
        if trailing.token != Token::Eof {
            return Err(JkidError::syntax(
                trailing.offset,
                format!("unexpected {} after the root value", trailing.token.describe()),
            ));
        }
        Ok(())
    }

    fn parse_value(&mut self, current: Spanned, sink: &mut impl EventSink) -> Result<()> {
        match current.token {
            Token::LeftBrace => self.parse_object(current.offset, sink),
            Token::LeftBracket => self.parse_array(current.offset, sink),
            Token::String(s) => sink.scalar_value(JsonValue::String(s)),
            Token::Number(n) => sink.scalar_value(JsonValue::Number(n)),
            Token::True => sink.scalar_value(JsonValue::Bool(true)),
            Token::False => sink.scalar_value(JsonValue::Bool(false)),
            Token::Null => sink.scalar_value(JsonValue::Null),
            other => Err(JkidError::syntax(
                current.offset,
                format!("expected a value, found {}", other.describe()),
            )),
        }
    }

    fn parse_object(&mut self, offset: usize, sink: &mut impl EventSink) -> Result<()> {
        self.enter(offset)?;
        sink.begin_object()?;

        let mut next = self.lexer.next_token()?;
        if next.token != Token::RightBrace {
            loop {
                let name = match next.token {
                    Token::String(name) => name,
                    other => {
                        return Err(JkidError::syntax(
                            next.offset,
                            format!("expected a property name, found {}", other.describe()),
                        ))
                    }
                };
                sink.property_name(name)?;

                let colon = self.lexer.next_token()?;
                if colon.token != Token::Colon {
                    return Err(JkidError::syntax(
                        colon.offset,
                        format!("expected ':', found {}", colon.token.describe()),
                    ));
                }

                let value = self.lexer.next_token()?;
                self.parse_value(value, sink)?;

                let separator = self.lexer.next_token()?;
                match separator.token {
                    Token::Comma => next = self.lexer.next_token()?,
                    Token::RightBrace => break,
                    other => {
                        return Err(JkidError::syntax(
                            separator.offset,
                            format!("expected ',' or '}}', found {}", other.describe()),
                        ))
                    }
                }
            }
        }

        sink.end_object()?;
        self.leave();
        Ok(())
    }

    fn parse_array(&mut self, offset: usize, sink: &mut impl EventSink) -> Result<()> {
        self.enter(offset)?;
        sink.begin_array()?;

        let mut next = self.lexer.next_token()?;
        if next.token != Token::RightBracket {
            loop {
                self.parse_value(next, sink)?;

                let separator = self.lexer.next_token()?;
                match separator.token {
                    Token::Comma => next = self.lexer.next_token()?,
                    Token::RightBracket => break,
                    other => {
                        return Err(JkidError::syntax(
                            separator.offset,
                            format!("expected ',' or ']', found {}", other.describe()),
                        ))
                    }
                }
            }
        }

        sink.end_array()?;
        self.leave();
        Ok(())
    }

    fn enter(&mut self, offset: usize) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(JkidError::syntax(
                offset,
                format!("nesting deeper than {} levels", self.max_depth),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Colon,
    Comma,
    String(String),
    Number(f64),
    True,
    False,
    Null,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LeftBrace => "'{'".to_string(),
            Token::RightBrace => "'}'".to_string(),
            Token::LeftBracket => "'['".to_string(),
            Token::RightBracket => "']'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Comma => "','".to_string(),
            Token::String(_) => "a string".to_string(),
            Token::Number(n) => format!("number {n}"),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Null => "'null'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug)]
struct Spanned {
    token: Token,
    offset: usize,
}

/// Byte-oriented tokenizer. Offsets are byte positions into the input.
struct Lexer<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn next_token(&mut self) -> Result<Spanned> {
        self.skip_whitespace();
        let offset = self.pos;
        let Some(&b) = self.bytes.get(self.pos) else {
            return Ok(Spanned {
                token: Token::Eof,
                offset,
            });
        };

        let token = match b {
            b'{' => self.single(Token::LeftBrace),
            b'}' => self.single(Token::RightBrace),
            b'[' => self.single(Token::LeftBracket),
            b']' => self.single(Token::RightBracket),
            b':' => self.single(Token::Colon),
            b',' => self.single(Token::Comma),
            b'"' => {
                self.pos += 1;
                Token::String(self.lex_string(offset)?)
            }
            b'-' | b'0'..=b'9' => Token::Number(self.lex_number(offset)?),
            b't' => self.keyword("true", Token::True)?,
            b'f' => self.keyword("false", Token::False)?,
            b'n' => self.keyword("null", Token::Null)?,
            _ => return Err(self.unexpected_char(offset)),
        };
        Ok(Spanned { token, offset })
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn keyword(&mut self, word: &str, token: Token) -> Result<Token> {
        if self.text[self.pos..].starts_with(word) {
            self.pos += word.len();
            Ok(token)
        } else {
            Err(self.unexpected_char(self.pos))
        }
    }

    fn unexpected_char(&self, offset: usize) -> JkidError {
        match self.text[offset..].chars().next() {
            Some(c) => JkidError::syntax(offset, format!("unexpected character {c:?}")),
            None => JkidError::syntax(offset, "unexpected end of input"),
        }
    }

    /// Scan `-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?` and parse it as `f64`.
    fn lex_number(&mut self, start: usize) -> Result<f64> {
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.skip_digits(),
            _ => return Err(JkidError::syntax(self.pos, "expected a digit")),
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(JkidError::syntax(self.pos, "expected a digit after '.'"));
            }
            self.skip_digits();
        }
        if let Some(b'e' | b'E') = self.peek() {
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(JkidError::syntax(self.pos, "expected a digit in exponent"));
            }
            self.skip_digits();
        }

        let literal = &self.text[start..self.pos];
        literal
            .parse::<f64>()
            .map_err(|e| JkidError::syntax(start, format!("invalid number {literal:?}: {e}")))
    }

    fn skip_digits(&mut self) {
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Scan a string body; `self.pos` is just past the opening quote.
    /// Unescaped runs are copied as slices, so multi-byte characters pass through intact.
    fn lex_string(&mut self, start: usize) -> Result<String> {
        let mut out = String::new();
        let mut run_start = self.pos;
        loop {
            let Some(b) = self.peek() else {
                return Err(JkidError::syntax(start, "unterminated string"));
            };
            match b {
                b'"' => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    out.push_str(&self.text[run_start..self.pos]);
                    let escape_at = self.pos;
                    self.pos += 1;
                    let Some(e) = self.peek() else {
                        return Err(JkidError::syntax(start, "unterminated string"));
                    };
                    self.pos += 1;
                    match e {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{0008}'),
                        b'f' => out.push('\u{000C}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => out.push(self.lex_unicode_escape(escape_at)?),
                        _ => {
                            return Err(JkidError::syntax(
                                escape_at,
                                format!("invalid escape sequence '\\{}'", e as char),
                            ))
                        }
                    }
                    run_start = self.pos;
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Decode the hex part of `\uXXXX`, joining a following low surrogate when needed.
    fn lex_unicode_escape(&mut self, escape_at: usize) -> Result<char> {
        let high = self.hex4(escape_at)?;
        let code = match high {
            0xD800..=0xDBFF => {
                if !self.text[self.pos..].starts_with("\\u") {
                    return Err(JkidError::syntax(escape_at, "unpaired surrogate in \\u escape"));
                }
                self.pos += 2;
                let low = self.hex4(escape_at)?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(JkidError::syntax(escape_at, "unpaired surrogate in \\u escape"));
                }
                0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
            }
            0xDC00..=0xDFFF => {
                return Err(JkidError::syntax(escape_at, "unpaired surrogate in \\u escape"))
            }
            other => other,
        };
        char::from_u32(code)
            .ok_or_else(|| JkidError::syntax(escape_at, "invalid \\u escape"))
    }

    fn hex4(&mut self, escape_at: usize) -> Result<u32> {
        let digits = self
            .text
            .get(self.pos..self.pos + 4)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| JkidError::syntax(escape_at, "expected 4 hex digits in \\u escape"))?;
        self.pos += 4;
        u32::from_str_radix(digits, 16)
            .map_err(|_| JkidError::syntax(escape_at, "expected 4 hex digits in \\u escape"))
    }
}

/// Sink that assembles a [`JsonValue`] tree.
#[derive(Default)]
struct ValueBuilder {
    stack: Vec<Frame>,
    root: Option<JsonValue>,
}

enum Frame {
    Object {
        members: Vec<(String, JsonValue)>,
        pending: Option<String>,
    },
    Array(Vec<JsonValue>),
}

impl ValueBuilder {
    fn push_value(&mut self, value: JsonValue) -> Result<()> {
        match self.stack.last_mut() {
            None => self.root = Some(value),
            Some(Frame::Array(items)) => items.push(value),
            Some(Frame::Object { members, pending }) => {
                let name = pending
                    .take()
                    .ok_or_else(|| JkidError::schema("object member without a property name"))?;
                members.push((name, value));
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<JsonValue> {
        self.root
            .ok_or_else(|| JkidError::syntax(0, "unexpected end of input"))
    }
}

impl EventSink for ValueBuilder {
    fn begin_object(&mut self) -> Result<()> {
        self.stack.push(Frame::Object {
            members: Vec::new(),
            pending: None,
        });
        Ok(())
    }

    fn property_name(&mut self, name: String) -> Result<()> {
        if let Some(Frame::Object { pending, .. }) = self.stack.last_mut() {
            *pending = Some(name);
        }
        Ok(())
    }

    fn begin_array(&mut self) -> Result<()> {
        self.stack.push(Frame::Array(Vec::new()));
        Ok(())
    }

    fn scalar_value(&mut self, value: JsonValue) -> Result<()> {
        self.push_value(value)
    }

    fn end_array(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.push_value(JsonValue::Array(items)),
            _ => Err(JkidError::schema("unbalanced end of array")),
        }
    }

    fn end_object(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Object { members, .. }) => self.push_value(JsonValue::Object(members)),
            _ => Err(JkidError::schema("unbalanced end of object")),
        }
    }
}
