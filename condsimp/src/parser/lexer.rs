//! A lexer for the trace condition format.

use crate::ast::Operator;
use std::fmt;

/// A token in the trace condition format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// One of the operators `#and`, `#or` or `#not`.
    Operator(Operator),

    /// The boolean constants `true` and `false`.
    Constant(bool),

    /// Any other token, that is parsed as a boolean variable.
    Symbol(String),

    /// A reserved word.
    ReservedWord(Reserved),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Operator(op) => write!(f, "{}", op),
            Token::Constant(b) => write!(f, "{}", b),
            Token::Symbol(s) => write!(f, "{}", s),
            Token::ReservedWord(r) => write!(f, "{}", r),
        }
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        if let Ok(r) = s.parse::<Reserved>() {
            Token::ReservedWord(r)
        } else if let Ok(op) = s.parse::<Operator>() {
            Token::Operator(op)
        } else {
            match s {
                "true" => Token::Constant(true),
                "false" => Token::Constant(false),
                _ => Token::Symbol(s.to_owned()),
            }
        }
    }
}

/// A reserved word in the trace condition format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reserved {
    /// The `#cond` marker that starts every line.
    Cond,

    /// The `;` token that ends the condition.
    Semicolon,
}

impl_str_conversion_traits!(Reserved {
    Cond: "#cond",
    Semicolon: ";",
});

/// The byte offset of a token in its line.
pub type Position = usize;

/// A lexer over a single line. Tokens are separated by spaces only, so other whitespace is part of
/// the token it appears in. The line terminator, if any, is ignored.
pub struct Lexer<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(line: &'a str) -> Self {
        let input = line.trim_end_matches(['\n', '\r']);
        Self { input, offset: 0 }
    }

    /// The current position of the lexer in the input.
    pub fn position(&self) -> Position {
        self.offset
    }

    /// Reads the next token, returning its position and its text. Returns `None` at the end of
    /// the input.
    pub fn next_raw(&mut self) -> Option<(Position, &'a str)> {
        let rest = &self.input[self.offset..];
        let start = self.offset + (rest.len() - rest.trim_start_matches(is_separator).len());
        if start == self.input.len() {
            self.offset = start;
            return None;
        }
        let end = self.input[start..]
            .find(is_separator)
            .map_or(self.input.len(), |i| start + i);
        self.offset = end;
        Some((start, &self.input[start..end]))
    }

    /// Reads the next token. Returns `None` at the end of the input.
    pub fn next_token(&mut self) -> Option<(Position, Token)> {
        self.next_raw().map(|(pos, s)| (pos, Token::from(s)))
    }

    /// Returns the input after the last token read, with the single separator that follows that
    /// token removed. This does not advance the lexer.
    pub fn remainder(&self) -> &'a str {
        let rest = &self.input[self.offset..];
        rest.strip_prefix(is_separator).unwrap_or(rest)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = (Position, Token);

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

fn is_separator(c: char) -> bool {
    c == ' '
}
