#![deny(clippy::disallowed_methods)]
#![deny(clippy::self_named_module_files)]
#![warn(clippy::branches_sharing_code)]
#![warn(clippy::cloned_instead_of_copied)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::equatable_if_let)]
#![warn(clippy::explicit_into_iter_loop)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::from_iter_instead_of_collect)]
#![warn(clippy::get_unwrap)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::inconsistent_struct_constructor)]
#![warn(clippy::inefficient_to_string)]
#![warn(clippy::items_after_statements)]
#![warn(clippy::large_types_passed_by_value)]
#![warn(clippy::manual_assert)]
#![warn(clippy::map_unwrap_or)]
#![warn(clippy::match_wildcard_for_single_variants)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::redundant_pub_crate)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::str_to_string)]
#![warn(clippy::string_to_string)]
#![warn(clippy::trivially_copy_pass_by_ref)]
#![warn(clippy::unnecessary_wraps)]
#![warn(clippy::unnested_or_patterns)]
#![warn(clippy::unused_self)]

#[macro_use]
pub mod ast;
pub mod parser;
pub mod solver;
pub mod stats;
mod utils;

use ast::Expr;
use parser::{CondLine, ParserError};
use solver::{Model, ProofOutcome, Solver, SolverError};
use stats::{LineMeasurement, Stats};
use std::io;
use std::time::Instant;
use thiserror::Error;

pub type CondsimpResult<T> = Result<T, Error>;

fn format_counterexample(counterexample: &Option<Model>) -> String {
    match counterexample {
        Some(model) if !model.is_empty() => {
            let assignments: Vec<_> = model
                .iter()
                .map(|(k, v)| format!("{} = {}", k, v))
                .collect();
            format!(" (counterexample: {})", assignments.join(", "))
        }
        _ => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("parser error: {inner} (on line {line})")]
    Parser { inner: ParserError, line: usize },

    #[error("solver error: {inner} (on line {line})")]
    Solver { inner: SolverError, line: usize },

    #[error(
        "simplified condition on line {line} is not equivalent to the original{}",
        format_counterexample(.counterexample)
    )]
    NotEquivalent {
        line: usize,
        counterexample: Option<Model>,
    },
}

impl Error {
    /// The line where the error happened, if it is tied to a specific line.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Io(_) => None,
            Error::Parser { line, .. }
            | Error::Solver { line, .. }
            | Error::NotEquivalent { line, .. } => Some(*line),
        }
    }
}

/// Writes a condition line, in the same format it is read.
pub fn write_cond_line(
    dest: &mut dyn io::Write,
    condition: &Expr,
    remainder: &str,
) -> io::Result<()> {
    write!(dest, "#cond ")?;
    ast::write_prefix(dest, condition)?;
    if remainder.is_empty() {
        writeln!(dest, " ;")
    } else {
        writeln!(dest, " ; {}", remainder)
    }
}

/// Iterates over the non-blank lines of `input`, paired with their 1-based line numbers.
fn trace_lines<R: io::BufRead>(input: R) -> impl Iterator<Item = (usize, io::Result<String>)> {
    input
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()))
}

/// Simplifies every condition line of a trace. Each simplified condition is proved equivalent to
/// the original before its line is written. Processing stops at the first error, and lines
/// already written stay written.
pub fn simplify_trace<R: io::BufRead, W: io::Write>(
    input: R,
    output: &mut W,
    solver: &mut dyn Solver,
) -> CondsimpResult<Stats> {
    let mut stats = Stats::new();

    for (line_number, line) in trace_lines(input) {
        let line = line?;
        let total = Instant::now();

        let parsing = Instant::now();
        let CondLine {
            condition,
            remainder,
            num_tokens,
        } = parser::parse_line(&line).map_err(|inner| Error::Parser {
            inner,
            line: line_number,
        })?;
        let parsing = parsing.elapsed();

        let size_before = condition.size();
        log::info!(
            "line {}: size before simplification: {}",
            line_number,
            size_before
        );

        let simplifying = Instant::now();
        let simplified = solver
            .simplify(&condition)
            .map_err(|inner| Error::Solver {
                inner,
                line: line_number,
            })?;
        let simplifying = simplifying.elapsed();

        let size_after = simplified.size();
        log::info!(
            "line {}: size after simplification: {}",
            line_number,
            size_after
        );

        let proving = Instant::now();
        let outcome = solver
            .prove_equivalent(&condition, &simplified)
            .map_err(|inner| Error::Solver {
                inner,
                line: line_number,
            })?;
        if let ProofOutcome::Refuted(counterexample) = outcome {
            return Err(Error::NotEquivalent {
                line: line_number,
                counterexample,
            });
        }
        let proving = proving.elapsed();

        write_cond_line(output, &simplified, &remainder)?;

        let measurement = LineMeasurement {
            parsing,
            simplifying,
            proving,
            total: total.elapsed(),
        };
        stats.add_line(line_number, num_tokens, (size_before, size_after), measurement);
    }
    output.flush()?;
    Ok(stats)
}

/// Parses every condition line of a trace and writes it back unchanged in meaning. `on_line` is
/// called with each parsed line and its line number. Returns the number of lines processed.
pub fn round_trip_trace<R, W, F>(
    input: R,
    output: &mut W,
    mut on_line: F,
) -> CondsimpResult<usize>
where
    R: io::BufRead,
    W: io::Write,
    F: FnMut(usize, &CondLine),
{
    let mut count = 0;
    for (line_number, line) in trace_lines(input) {
        let parsed = parser::parse_line(&line?).map_err(|inner| Error::Parser {
            inner,
            line: line_number,
        })?;
        on_line(line_number, &parsed);
        write_cond_line(output, &parsed.condition, &parsed.remainder)?;
        count += 1;
    }
    output.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::NativeSolver;

    /// A solver that does not simplify anything, and refutes every proof.
    struct RefutingSolver;

    impl Solver for RefutingSolver {
        fn simplify(&mut self, expr: &Expr) -> Result<Expr, SolverError> {
            Ok(expr.clone())
        }

        fn prove_equivalent(&mut self, _: &Expr, _: &Expr) -> Result<ProofOutcome, SolverError> {
            Ok(ProofOutcome::Refuted(None))
        }
    }

    /// A solver that refutes proofs only for conditions that mention the variable `bad`.
    struct PickySolver(NativeSolver);

    impl Solver for PickySolver {
        fn simplify(&mut self, expr: &Expr) -> Result<Expr, SolverError> {
            self.0.simplify(expr)
        }

        fn prove_equivalent(&mut self, a: &Expr, b: &Expr) -> Result<ProofOutcome, SolverError> {
            if a.variables().contains("bad") {
                Ok(ProofOutcome::Refuted(None))
            } else {
                self.0.prove_equivalent(a, b)
            }
        }
    }

    fn run(input: &str, solver: &mut dyn Solver) -> (CondsimpResult<Stats>, String) {
        let mut output = Vec::new();
        let result = simplify_trace(input.as_bytes(), &mut output, solver);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_simplify_trace() {
        let input = "#cond #and a #not b ; x y\n\
            \n\
            #cond #and #or a b #or a #not b ; 1 2 3\n\
            #cond #or c #not c ;\n";
        let (result, output) = run(input, &mut NativeSolver::default());
        let stats = result.unwrap();

        let expected = "#cond #and a #not b ; x y\n\
            #cond a ; 1 2 3\n\
            #cond true ;\n";
        assert_eq!(output, expected);
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.tokens, 4 + 8 + 4);
        assert_eq!(stats.size_before.total(), 4 + 8 + 4);
        assert_eq!(stats.size_after.total(), 4 + 1 + 1);
        assert_eq!(stats.size_before.max(), Some((3, 8)));
    }

    #[test]
    fn test_failed_proof_halts_run() {
        let input = "#cond #and a #not b ; x y\n";
        let (result, output) = run(input, &mut RefutingSolver);
        assert!(matches!(
            result,
            Err(Error::NotEquivalent { line: 1, counterexample: None })
        ));
        assert_eq!(output, "");

        let input = "#cond a ; x\n#cond #or a bad ; y\n#cond b ; z\n";
        let (result, output) = run(input, &mut PickySolver(NativeSolver::default()));
        let err = result.unwrap_err();
        assert!(matches!(err, Error::NotEquivalent { line: 2, .. }));
        assert_eq!(err.line(), Some(2));
        assert_eq!(output, "#cond a ; x\n");
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let input = "#cond a ; x\n\n#cond #and a ; y\n";
        let (result, output) = run(input, &mut NativeSolver::default());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            Error::Parser {
                inner: ParserError::StackUnderflow { .. },
                line: 3,
            }
        ));
        assert_eq!(output, "#cond a ; x\n");

        let (result, _) = run("#cond a x\n", &mut NativeSolver::default());
        assert!(matches!(
            result,
            Err(Error::Parser { inner: ParserError::MissingSemicolon, line: 1 })
        ));
    }

    #[test]
    fn test_error_messages() {
        let mut model = Model::new();
        model.insert("a".to_owned(), true);
        model.insert("b".to_owned(), false);
        let err = Error::NotEquivalent { line: 4, counterexample: Some(model) };
        assert_eq!(
            err.to_string(),
            "simplified condition on line 4 is not equivalent to the original \
            (counterexample: a = true, b = false)"
        );

        let err = Error::Parser { inner: ParserError::MissingSemicolon, line: 2 };
        assert!(err.to_string().ends_with("(on line 2)"));
    }

    #[test]
    fn test_round_trip_trace() {
        let input = "#cond #and a #not b ; x y\n\n#cond #or #and a b c ;\n";
        let mut output = Vec::new();
        let mut sizes = Vec::new();
        let count = round_trip_trace(input.as_bytes(), &mut output, |line, parsed| {
            sizes.push((line, parsed.condition.size()));
        })
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(sizes, [(1, 4), (3, 5)]);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "#cond #and a #not b ; x y\n#cond #or #and a b c ;\n"
        );
    }
}
