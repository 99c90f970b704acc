//! A minimal S-expression value type with a parser and canonical printer.
//!
//! The surface is the usual LISP one: balanced parentheses, whitespace
//! separated tokens, atoms being any run of non-paren, non-whitespace
//! characters. Printing emits the canonical form with single-space
//! separators, so `parse(print(v))` is the identity on values.

use std::fmt;
use thiserror::Error;

/// An S-expression value: an atom or a list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Atom(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_atom(&self) -> bool {
        matches!(self, Value::Atom(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Get the atom text, if this is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Value::Atom(s) => Some(s),
            Value::List(_) => None,
        }
    }

    /// Get the element slice, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::Atom(_) => None,
            Value::List(items) => Some(items),
        }
    }
}

/// Create an atom value.
pub fn atom(data: impl Into<String>) -> Value {
    Value::Atom(data.into())
}

/// Create a list value.
pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
    Value::List(items.into_iter().collect())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Atom(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// S-expression parse error.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("parse error at byte {position}: {kind}")]
pub struct ParseError {
    /// Byte offset into the input where the error was detected.
    pub position: usize,
    pub kind: ParseErrorKind,
}

/// The kind of an S-expression parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The input contained no value at all.
    EmptyInput,
    /// The input ended inside an unterminated list.
    UnexpectedEof,
    /// A closing parenthesis with no matching opener.
    UnbalancedParen,
    /// Extra input after the first complete value.
    TrailingInput,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::EmptyInput => write!(f, "empty input"),
            ParseErrorKind::UnexpectedEof => write!(f, "unexpected end of input inside a list"),
            ParseErrorKind::UnbalancedParen => write!(f, "unbalanced closing parenthesis"),
            ParseErrorKind::TrailingInput => write!(f, "trailing input after value"),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a single S-expression value from the input.
pub fn parse(input: &str) -> ParseResult<Value> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };

    parser.skip_whitespace();
    if parser.at_end() {
        return Err(parser.error(ParseErrorKind::EmptyInput));
    }

    let value = parser.parse_value()?;

    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(parser.error(ParseErrorKind::TrailingInput));
    }

    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            position: self.pos,
            kind,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn parse_value(&mut self) -> ParseResult<Value> {
        match self.peek() {
            Some(b'(') => self.parse_list(),
            Some(b')') => Err(self.error(ParseErrorKind::UnbalancedParen)),
            Some(_) => Ok(self.parse_atom()),
            None => Err(self.error(ParseErrorKind::UnexpectedEof)),
        }
    }

    fn parse_list(&mut self) -> ParseResult<Value> {
        self.pos += 1; // consume '('
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                Some(_) => items.push(self.parse_value()?),
                None => return Err(self.error(ParseErrorKind::UnexpectedEof)),
            }
        }
    }

    fn parse_atom(&mut self) -> Value {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'(' || b == b')' || b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }

        // The byte range is a subslice of valid UTF-8 split at ASCII
        // boundaries, so it is itself valid UTF-8.
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        Value::Atom(text.to_string())
    }
}
