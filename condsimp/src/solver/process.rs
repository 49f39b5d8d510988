//! A solver that proves equivalences by calling an external SMT solver, such as z3 or cvc5.

use super::{Expr, ProofOutcome, Solver, SolverError};
use crate::ast::printer;
use std::{
    io::Write,
    process::{Command, Stdio},
};

/// The external solver binary and the arguments passed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    pub solver: Box<str>,
    pub arguments: Vec<Box<str>>,
}

impl ProcessOptions {
    /// Default arguments to make some known solvers read an SMT-LIB script from stdin.
    pub fn default_arguments(solver: &str) -> &'static [&'static str] {
        match solver.rsplit(['/', '\\']).next().unwrap_or(solver) {
            "z3" => &["-in", "-smt2"],
            "cvc5" | "cvc4" => &["--lang=smt2"],
            _ => &[],
        }
    }
}

/// Simplifies with another solver, and proves equivalences by writing an SMT-LIB query to the
/// stdin of an external solver process.
pub struct SmtProcessSolver {
    options: ProcessOptions,
    simplifier: Box<dyn Solver>,
}

impl SmtProcessSolver {
    pub fn new(options: ProcessOptions, simplifier: Box<dyn Solver>) -> Self {
        Self { options, simplifier }
    }

    fn run_query(&self, query: &[u8]) -> Result<String, SolverError> {
        let mut process = Command::new(self.options.solver.as_ref())
            .args(self.options.arguments.iter().map(AsRef::as_ref))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(SolverError::FailedSpawnSolver)?;

        // `stdin` is always present, since it was configured as piped
        if let Some(mut stdin) = process.stdin.take() {
            stdin
                .write_all(query)
                .map_err(SolverError::FailedWriteToSolverStdin)?;
        }

        let output = process
            .wait_with_output()
            .map_err(SolverError::FailedWaitForSolver)?;

        if !output.status.success() {
            if let Ok(s) = std::str::from_utf8(&output.stderr) {
                if s.contains("timeout") {
                    return Err(SolverError::SolverTimeout);
                }
            }
            return Err(SolverError::NonZeroExitCode(output.status.code()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or("").trim().to_owned())
    }
}

impl Solver for SmtProcessSolver {
    fn simplify(&mut self, expr: &Expr) -> Result<Expr, SolverError> {
        self.simplifier.simplify(expr)
    }

    fn prove_equivalent(
        &mut self,
        original: &Expr,
        simplified: &Expr,
    ) -> Result<ProofOutcome, SolverError> {
        let mut query = Vec::new();
        printer::write_smt_script(&mut query, original, simplified)
            .map_err(SolverError::FailedWriteQuery)?;

        log::debug!("calling '{}' to prove equivalence", self.options.solver);
        match self.run_query(&query)?.as_str() {
            "unsat" => Ok(ProofOutcome::Proved),
            "sat" => Ok(ProofOutcome::Refuted(None)),
            "timeout" => Err(SolverError::SolverTimeout),
            other => Err(SolverError::SolverGaveInvalidOutput(other.to_owned())),
        }
    }
}
