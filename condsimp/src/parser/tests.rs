//! In addition to the parser tests, this module contains some parsing functions that can be
//! useful in tests, and are intended to be used in other modules.
#![cfg(test)]

use super::*;

const ERROR_MESSAGE: &str = "parser error during test";

/// Parses a condition written as a space-separated prefix token sequence, without the `#cond`
/// marker and the `;` terminator. Panics if any error is encountered.
pub fn parse_condition_str(input: &str) -> Expr {
    parse_condition(Lexer::new(input).map(|(_, t)| t).collect()).expect(ERROR_MESSAGE)
}

/// Tries to parse a full line, expecting it to fail. Returns the error encountered, or panics if
/// no error is encountered.
pub fn parse_line_err(input: &str) -> ParserError {
    parse_line(input).expect_err("expected error")
}

#[test]
fn test_leaves() {
    assert_eq!(parse_condition_str("a"), Expr::var("a"));
    assert_eq!(parse_condition_str("true"), Expr::Const(true));
    assert_eq!(parse_condition_str("false"), Expr::Const(false));
    assert_eq!(parse_condition_str("x.y!1"), Expr::var("x.y!1"));
}

#[test]
fn test_operators() {
    let cases = [
        ("#and a #not b", build_expr!((and a (not b)))),
        ("#or a b", build_expr!((or a b))),
        ("#not #not a", build_expr!((not (not a)))),
        ("#and #and a b c", build_expr!((and (and a b) c))),
        ("#and a #and b c", build_expr!((and a (and b c)))),
        (
            "#or #not #and a b #or c true",
            build_expr!((or (not (and a b)) (or c true))),
        ),
    ];
    for (input, expected) in cases {
        assert_eq!(parse_condition_str(input), expected);
    }
}

#[test]
fn test_parse_line() {
    let line = parse_line("#cond #and a #not b ; x y\n").unwrap();
    assert_eq!(line.condition, build_expr!((and a (not b))));
    assert_eq!(line.condition.size(), 4);
    assert_eq!(line.condition.to_string(), "#and a #not b");
    assert_eq!(line.remainder, "x y");
    assert_eq!(line.num_tokens, 4);

    let line = parse_line("#cond a ;").unwrap();
    assert_eq!(line.condition, Expr::var("a"));
    assert_eq!(line.remainder, "");

    // Only the first semicolon ends the condition
    let line = parse_line("#cond a ; ; b").unwrap();
    assert_eq!(line.remainder, "; b");
}

#[test]
fn test_errors() {
    assert_eq!(
        parse_line_err("#and a b ; x"),
        ParserError::MissingCondMarker("#and".to_owned())
    );
    assert_eq!(parse_line_err(""), ParserError::MissingCondMarker(String::new()));
    assert_eq!(parse_line_err("#cond #and a b"), ParserError::MissingSemicolon);
    assert_eq!(parse_line_err("#cond ; x"), ParserError::EmptyCondition);
    assert_eq!(parse_line_err("#cond a b ; x"), ParserError::UnreducedStack(2));
    assert_eq!(
        parse_line_err("#cond #and a ; x"),
        ParserError::StackUnderflow {
            operator: Operator::And,
            token: 2,
            available: 1,
        }
    );
    assert_eq!(
        parse_line_err("#cond #not ; x"),
        ParserError::StackUnderflow {
            operator: Operator::Not,
            token: 2,
            available: 0,
        }
    );
    assert_eq!(
        parse_line_err("#cond #and a #cond ; x"),
        ParserError::UnexpectedReservedWord(Reserved::Cond, 4)
    );
}

#[test]
fn test_error_messages() {
    assert_eq!(
        parse_line_err("#cond #and a ; x").to_string(),
        "operator '#and' (token 2) expects 2 operands, but only 1 are available"
    );
    assert_eq!(
        parse_line_err("foo").to_string(),
        "expected line to start with '#cond', got 'foo'"
    );
}

#[test]
fn test_long_chain() {
    let n = 2_000;
    let mut input = "#or ".repeat(n - 1);
    input.push_str(&(0..n).map(|i| format!("v{}", i)).collect::<Vec<_>>().join(" "));
    let expr = parse_condition_str(&input);
    assert_eq!(expr.size(), 2 * n - 1);
    assert_eq!(expr.variables().len(), n);
}
