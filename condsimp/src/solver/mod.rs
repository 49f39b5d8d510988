//! Solvers: the components that simplify conditions and prove the simplified form equivalent to
//! the original.
//!
//! With the `z3` feature, [`Z3Solver`] runs both steps in Z3. [`NativeSolver`] uses the built-in
//! tactics and SAT engine instead, and needs no external library.

pub mod error;
pub mod process;
pub mod sat;
pub mod tactics;
#[cfg(feature = "z3")]
pub mod z3_solver;

pub use error::SolverError;
pub use process::{ProcessOptions, SmtProcessSolver};
pub use tactics::{Tactic, TacticKind};
#[cfg(feature = "z3")]
pub use z3_solver::Z3Solver;

use crate::ast::Expr;
use indexmap::IndexMap;
use std::time::Duration;

/// An assignment of values to named variables.
pub type Model = IndexMap<String, bool>;

/// The outcome of an equivalence proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofOutcome {
    Proved,

    /// The expressions are not equivalent. If the solver provides one, carries an assignment
    /// under which they differ.
    Refuted(Option<Model>),
}

/// The interface to a solver. This is the only way the rest of the crate interacts with
/// simplification and proving.
pub trait Solver {
    /// Returns an expression equivalent to `expr`, ideally smaller.
    fn simplify(&mut self, expr: &Expr) -> Result<Expr, SolverError>;

    /// Tries to prove that `original` and `simplified` are equivalent.
    fn prove_equivalent(
        &mut self,
        original: &Expr,
        simplified: &Expr,
    ) -> Result<ProofOutcome, SolverError>;
}

#[derive(Debug, Clone)]
pub struct Config {
    tactics: Vec<TacticKind>,
    max_iterations: usize,
    solver_simplify_limit: usize,
    solver_simplify_conflicts: Option<u64>,
    conflict_limit: Option<u64>,
    timeout: Option<Duration>,
}

/// The default conflict limit of the native solver's equivalence proofs.
pub const DEFAULT_CONFLICT_LIMIT: u64 = 200_000;

impl Default for Config {
    fn default() -> Self {
        Self {
            tactics: vec![
                TacticKind::CtxSolverSimplify,
                TacticKind::CtxSimplify,
                TacticKind::DomSimplify,
                TacticKind::Simplify,
            ],
            max_iterations: 32,
            solver_simplify_limit: 2_000,
            solver_simplify_conflicts: Some(1_000),
            conflict_limit: Some(DEFAULT_CONFLICT_LIMIT),
            timeout: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tactics applied, in order, inside the fixed point loop.
    pub fn tactics(mut self, value: Vec<TacticKind>) -> Self {
        self.tactics = value;
        self
    }

    /// The maximum number of iterations of the fixed point loop.
    pub fn max_iterations(mut self, value: usize) -> Self {
        self.max_iterations = value;
        self
    }

    /// Expressions larger than this are not simplified by the built-in `ctx-solver-simplify`.
    pub fn solver_simplify_limit(mut self, value: usize) -> Self {
        self.solver_simplify_limit = value;
        self
    }

    /// The conflict limit of each SAT query made by `ctx-solver-simplify`. Queries that reach it
    /// are treated as inconclusive.
    pub fn solver_simplify_conflicts(mut self, value: impl Into<Option<u64>>) -> Self {
        self.solver_simplify_conflicts = value.into();
        self
    }

    /// The conflict limit of the native solver's equivalence proofs. Reaching it is an error.
    pub fn conflict_limit(mut self, value: impl Into<Option<u64>>) -> Self {
        self.conflict_limit = value.into();
        self
    }

    /// The time limit of each Z3 call. A simplification that reaches it fails, and so does a
    /// proof.
    pub fn timeout(mut self, value: impl Into<Option<Duration>>) -> Self {
        self.timeout = value.into();
        self
    }
}

/// The built-in solver: simplifies with the configured tactic pipeline, and proves equivalences
/// with the SAT engine.
pub struct NativeSolver {
    pipeline: Box<dyn Tactic>,
    conflict_limit: Option<u64>,
}

impl NativeSolver {
    pub fn new(config: &Config) -> Self {
        Self {
            pipeline: tactics::build_pipeline(config),
            conflict_limit: config.conflict_limit,
        }
    }
}

impl Default for NativeSolver {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Solver for NativeSolver {
    fn simplify(&mut self, expr: &Expr) -> Result<Expr, SolverError> {
        log::debug!("applying '{}'", self.pipeline.name());
        self.pipeline.apply(expr)
    }

    fn prove_equivalent(
        &mut self,
        original: &Expr,
        simplified: &Expr,
    ) -> Result<ProofOutcome, SolverError> {
        let mut cnf = sat::Cnf::new();
        cnf.assert_distinct(original, simplified);
        log::debug!(
            "proving equivalence: {} variables, {} clauses",
            cnf.num_vars(),
            cnf.num_clauses()
        );
        Ok(match cnf.solve(self.conflict_limit)? {
            sat::SatResult::Unsat => ProofOutcome::Proved,
            sat::SatResult::Sat(model) => ProofOutcome::Refuted(Some(model)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::parse_condition_str;

    #[test]
    fn test_native_solver() {
        let mut solver = NativeSolver::default();
        let original = parse_condition_str("#and #or a b #or a #not b");
        let simplified = solver.simplify(&original).unwrap();
        assert_eq!(simplified, Expr::var("a"));
        assert_eq!(
            solver.prove_equivalent(&original, &simplified).unwrap(),
            ProofOutcome::Proved
        );
    }

    #[test]
    fn test_refutation_has_counterexample() {
        let mut solver = NativeSolver::default();
        let a = parse_condition_str("#or a b");
        let b = parse_condition_str("a");
        let ProofOutcome::Refuted(Some(model)) = solver.prove_equivalent(&a, &b).unwrap() else {
            panic!("expected proof to fail");
        };
        let lookup = |v: &str| model.get(v).copied();
        assert_ne!(a.evaluate(&lookup), b.evaluate(&lookup));
    }

    #[test]
    fn test_conflict_limit() {
        let config = Config::new().conflict_limit(0);
        let mut solver = NativeSolver::new(&config);
        let a = parse_condition_str("#or a b");
        let b = parse_condition_str("#or b #and a #not b");
        assert!(matches!(
            solver.prove_equivalent(&a, &b),
            Err(SolverError::ResourceLimit(0))
        ));

        // Structurally equal expressions share their encoding, so no search is needed
        let a = parse_condition_str("#and a b");
        let b = parse_condition_str("#and b a");
        assert_eq!(
            solver.prove_equivalent(&a, &b).unwrap(),
            ProofOutcome::Proved
        );
    }

    /// Builds a random condition with `num_leaves` leaves over `num_vars` variables.
    fn random_condition(seed: u64, num_leaves: usize, num_vars: u64) -> Expr {
        fn build(next: &mut dyn FnMut(u64) -> u64, leaves: usize, num_vars: u64) -> Expr {
            if leaves == 1 {
                return Expr::var(format!("x{}", next(num_vars)));
            }
            if next(100) < 15 {
                return Expr::not(build(next, leaves, num_vars));
            }
            let left = 1 + next(leaves as u64 - 1) as usize;
            let children = vec![
                build(next, left, num_vars),
                build(next, leaves - left, num_vars),
            ];
            if next(2) == 0 {
                Expr::And(children)
            } else {
                Expr::Or(children)
            }
        }
        let mut state = seed;
        let mut next = |bound: u64| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state % bound
        };
        build(&mut next, num_leaves, num_vars)
    }

    #[test]
    fn test_proofs_on_large_conditions() {
        // Each of these has thousands of nodes, over 30 to 100 variables
        let cases = [(1, 600, 30), (2, 1_200, 40), (3, 1_500, 60), (4, 5_000, 100)];
        let mut solver = NativeSolver::default();
        for (seed, leaves, vars) in cases {
            let original = random_condition(0x9e37_79b9_7f4a_7c15 ^ seed, leaves, vars);
            let simplified = solver.simplify(&original).unwrap();
            assert!(simplified.size() <= original.size());
            assert_eq!(
                solver.prove_equivalent(&original, &simplified).unwrap(),
                ProofOutcome::Proved
            );
        }
    }
}
