//! A parser for trace condition lines.
//!
//! Every line has the form `#cond <condition> ; <remainder>`, where the condition is a boolean
//! expression in prefix notation. The parser reads the condition tokens from last to first, using
//! a stack: leaves are pushed, and every operator pops its operands and pushes the resulting node.

pub mod error;
pub mod lexer;
pub(crate) mod tests;

pub use error::ParserError;
pub use lexer::{Lexer, Position, Reserved, Token};

use crate::ast::{Expr, Operator};

/// How often the parser reports its progress, in number of tokens.
const PROGRESS_INTERVAL: usize = 10_000;

/// A parsed condition line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondLine {
    /// The condition between the `#cond` marker and the `;` token.
    pub condition: Expr,

    /// The text after the `;` token, unchanged.
    pub remainder: String,

    /// The number of tokens in the condition.
    pub num_tokens: usize,
}

/// Parses a full condition line.
pub fn parse_line(line: &str) -> Result<CondLine, ParserError> {
    let mut lexer = Lexer::new(line);

    match lexer.next_token() {
        Some((_, Token::ReservedWord(Reserved::Cond))) => (),
        Some((_, other)) => return Err(ParserError::MissingCondMarker(other.to_string())),
        None => return Err(ParserError::MissingCondMarker(String::new())),
    }

    let mut tokens = Vec::new();
    loop {
        match lexer.next_token() {
            Some((_, Token::ReservedWord(Reserved::Semicolon))) => break,
            Some((_, token)) => tokens.push(token),
            None => return Err(ParserError::MissingSemicolon),
        }
    }

    let num_tokens = tokens.len();
    let condition = parse_condition(tokens)?;
    Ok(CondLine {
        condition,
        remainder: lexer.remainder().to_owned(),
        num_tokens,
    })
}

/// Parses the tokens of a condition. Token numbers in errors count from the start of the line, so
/// the first condition token is token 2.
pub fn parse_condition(tokens: Vec<Token>) -> Result<Expr, ParserError> {
    let mut stack: Vec<Expr> = Vec::new();
    let num_tokens = tokens.len();

    for (i, token) in tokens.into_iter().rev().enumerate() {
        if i > 0 && i % PROGRESS_INTERVAL == 0 {
            log::debug!("parsed {} of {} tokens", i, num_tokens);
        }
        let token_number = num_tokens - i + 1;

        let expr = match token {
            Token::Operator(op) => {
                let arity = op.arity();
                if stack.len() < arity {
                    return Err(ParserError::StackUnderflow {
                        operator: op,
                        token: token_number,
                        available: stack.len(),
                    });
                }
                // The top of the stack holds the operand that appears first in the input
                let mut args: Vec<_> = stack.drain(stack.len() - arity..).rev().collect();
                match op {
                    Operator::Not => Expr::not(args.remove(0)),
                    Operator::And => Expr::And(args),
                    Operator::Or => Expr::Or(args),
                }
            }
            Token::Constant(b) => Expr::Const(b),
            Token::Symbol(s) => Expr::Var(s),
            Token::ReservedWord(r) => {
                return Err(ParserError::UnexpectedReservedWord(r, token_number))
            }
        };
        stack.push(expr);
    }

    match stack.len() {
        0 => Err(ParserError::EmptyCondition),
        1 => Ok(stack.pop().unwrap()),
        n => Err(ParserError::UnreducedStack(n)),
    }
}
