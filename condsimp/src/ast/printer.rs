//! Printers for expressions, both in the prefix token format of the traces and in SMT-LIB.

use super::{Expr, Operator};
use crate::utils::is_symbol_character;
use indexmap::IndexSet;
use std::{borrow::Cow, fmt, io};

/// Writes `expr` to `dest` in the prefix token format, e.g. `#and a #not b`.
pub fn write_prefix(dest: &mut dyn io::Write, expr: &Expr) -> io::Result<()> {
    write!(dest, "{}", expr)
}

/// Writes an SMT-LIB script that is unsatisfiable if and only if `original` and `simplified` are
/// equivalent.
pub fn write_smt_script(
    dest: &mut dyn io::Write,
    original: &Expr,
    simplified: &Expr,
) -> io::Result<()> {
    let mut printer = SmtPrinter { inner: dest };
    printer.write_equivalence_query(original, simplified)
}

// The operators of an n-ary node are written before all of its children, so `(and a b c)` becomes
// `#and #and a b c`. Parsing that back yields `(and (and a b) c)`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Const(b) => write!(f, "{}", b),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Not(inner) => write!(f, "{} {}", Operator::Not, inner),
            Expr::And(args) | Expr::Or(args) => {
                let op = self.operator().unwrap();
                match args.as_slice() {
                    // These can only be built by hand, but we still want to print something that
                    // parses back to an equivalent expression
                    [] => write!(f, "{}", op == Operator::And),
                    [single] => write!(f, "{}", single),
                    [head, tail @ ..] => {
                        for _ in tail {
                            write!(f, "{} ", op)?;
                        }
                        write!(f, "{}", head)?;
                        for a in tail {
                            write!(f, " {}", a)?;
                        }
                        Ok(())
                    }
                }
            }
        }
    }
}

/// Words that cannot be used as simple symbols in our queries: the SMT-LIB reserved words and
/// commands, and the names of the core theory.
const RESERVED_SYMBOLS: &[&str] = &[
    // Reserved words
    "!", "_", "as", "BINARY", "DECIMAL", "exists", "HEXADECIMAL", "forall", "let", "match",
    "NUMERAL", "par", "STRING",
    // Commands
    "assert", "check-sat", "check-sat-assuming", "declare-const", "declare-datatype",
    "declare-datatypes", "declare-fun", "declare-sort", "define-fun", "define-fun-rec",
    "define-funs-rec", "define-sort", "echo", "exit", "get-assertions", "get-assignment",
    "get-info", "get-model", "get-option", "get-proof", "get-unsat-assumptions",
    "get-unsat-core", "get-value", "pop", "push", "reset", "reset-assertions", "set-info",
    "set-logic", "set-option",
    // Core theory
    "Bool", "true", "false", "not", "=>", "and", "or", "xor", "=", "distinct", "ite",
];

/// Quotes a symbol with `|` if it is not a valid simple symbol in SMT-LIB, or if it could be
/// confused with a reserved word or a core theory name.
fn quote_symbol(symbol: &str) -> io::Result<Cow<str>> {
    let is_simple = !symbol.is_empty()
        && !symbol.starts_with(|c: char| c.is_ascii_digit() || c == '@' || c == '.')
        && symbol.chars().all(is_symbol_character)
        && !RESERVED_SYMBOLS.contains(&symbol);
    if is_simple {
        Ok(Cow::Borrowed(symbol))
    } else if symbol.contains(['|', '\\']) {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("variable '{}' cannot be written as an SMT-LIB symbol", symbol),
        ))
    } else {
        Ok(Cow::Owned(format!("|{}|", symbol)))
    }
}

struct SmtPrinter<'a> {
    inner: &'a mut dyn io::Write,
}

impl<'a> SmtPrinter<'a> {
    fn write_equivalence_query(&mut self, original: &Expr, simplified: &Expr) -> io::Result<()> {
        writeln!(self.inner, "(set-logic QF_UF)")?;

        let mut variables: IndexSet<&str> = original.variables();
        variables.extend(simplified.variables());
        for v in variables {
            writeln!(self.inner, "(declare-const {} Bool)", quote_symbol(v)?)?;
        }

        write!(self.inner, "(assert (not (= ")?;
        self.write_term(original)?;
        write!(self.inner, " ")?;
        self.write_term(simplified)?;
        writeln!(self.inner, ")))")?;
        writeln!(self.inner, "(check-sat)")?;
        writeln!(self.inner, "(exit)")
    }

    fn write_term(&mut self, expr: &Expr) -> io::Result<()> {
        match expr {
            Expr::Const(b) => write!(self.inner, "{}", b),
            Expr::Var(name) => write!(self.inner, "{}", quote_symbol(name)?),
            _ => {
                let op = expr.operator().unwrap();
                let args = expr.children();
                if args.is_empty() {
                    // Empty `and`/`or` applications are not valid SMT-LIB
                    return write!(self.inner, "{}", op == Operator::And);
                }
                write!(self.inner, "({}", op.smt_name())?;
                for a in args {
                    write!(self.inner, " ")?;
                    self.write_term(a)?;
                }
                write!(self.inner, ")")
            }
        }
    }
}
