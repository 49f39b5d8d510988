//! A solver backed by Z3. Simplification runs Z3's own tactics, under the same names and in the
//! same arrangement as the built-in pipeline, and equivalences are proved by asking Z3 whether
//! the two expressions can differ.

use super::{Config, Model, ProofOutcome, Solver, SolverError, TacticKind};
use crate::ast::Expr;
use ahash::AHashMap;
use indexmap::IndexMap;
use std::time::Duration;
use z3::{
    ast::{Ast, Bool},
    Context, Goal, Params, SatResult, Tactic,
};

pub struct Z3Solver {
    context: Context,
    tactics: Vec<TacticKind>,
    max_iterations: u32,
    timeout: Option<Duration>,
}

impl Z3Solver {
    pub fn new(config: &Config) -> Self {
        Self {
            context: Context::new(&z3::Config::new()),
            tactics: config.tactics.clone(),
            max_iterations: config.max_iterations.try_into().unwrap_or(u32::MAX),
            timeout: config.timeout,
        }
    }

    /// Builds `simplify`, followed by the configured tactics applied in sequence and repeated
    /// until a fixed point is reached.
    fn pipeline(&self) -> Tactic<'_> {
        let context = &self.context;
        let simplify = Tactic::new(context, &TacticKind::Simplify.to_string());
        let mut body = self
            .tactics
            .iter()
            .map(|kind| Tactic::new(context, &kind.to_string()));
        let pipeline = match body.next() {
            Some(first) => {
                let body = body.fold(first, |acc, t| acc.and_then(&t));
                simplify.and_then(&Tactic::repeat(context, &body, self.max_iterations))
            }
            None => simplify,
        };
        match self.timeout {
            Some(timeout) => pipeline.try_for(timeout),
            None => pipeline,
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Solver for Z3Solver {
    fn simplify(&mut self, expr: &Expr) -> Result<Expr, SolverError> {
        let mut translator = Translator::new(&self.context);
        let goal = Goal::new(&self.context, false, false, false);
        goal.assert(&translator.translate(expr));

        let pipeline = self.pipeline();
        log::debug!("applying z3 tactics: {:?}", self.tactics);
        let applied = pipeline
            .apply(&goal, None)
            .map_err(SolverError::TacticFailed)?;

        // The result is the disjunction of the subgoals, each one the conjunction of its formulas
        let mut cache = AHashMap::new();
        let mut cases = Vec::new();
        for subgoal in applied.list_subgoals() {
            let conjuncts = subgoal
                .get_formulas::<Bool>()
                .iter()
                .map(|f| read_term(f, &mut cache))
                .collect::<Result<Vec<_>, _>>()?;
            cases.push(Expr::mk_and(conjuncts));
        }
        Ok(Expr::mk_or(cases))
    }

    fn prove_equivalent(
        &mut self,
        original: &Expr,
        simplified: &Expr,
    ) -> Result<ProofOutcome, SolverError> {
        let mut translator = Translator::new(&self.context);
        let original = translator.translate(original);
        let simplified = translator.translate(simplified);

        let solver = z3::Solver::new(&self.context);
        if let Some(timeout) = self.timeout {
            let mut params = Params::new(&self.context);
            params.set_u32("timeout", timeout.as_millis().try_into().unwrap_or(u32::MAX));
            solver.set_params(&params);
        }
        solver.assert(&original._eq(&simplified).not());

        match solver.check() {
            SatResult::Unsat => Ok(ProofOutcome::Proved),
            SatResult::Sat => {
                let model = solver.get_model().map(|m| translator.read_model(&m));
                Ok(ProofOutcome::Refuted(model))
            }
            SatResult::Unknown => Err(SolverError::SolverUnknown(
                solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "unknown".to_owned()),
            )),
        }
    }
}

/// Translates expressions into Z3 terms. Each variable name is declared once.
struct Translator<'ctx> {
    context: &'ctx Context,
    variables: IndexMap<String, Bool<'ctx>>,
}

impl<'ctx> Translator<'ctx> {
    fn new(context: &'ctx Context) -> Self {
        Self { context, variables: IndexMap::new() }
    }

    fn variable(&mut self, name: &str) -> Bool<'ctx> {
        if let Some(v) = self.variables.get(name) {
            return v.clone();
        }
        let v = Bool::new_const(self.context, name);
        self.variables.insert(name.to_owned(), v.clone());
        v
    }

    fn translate(&mut self, expr: &Expr) -> Bool<'ctx> {
        match expr {
            Expr::Const(b) => Bool::from_bool(self.context, *b),
            Expr::Var(name) => self.variable(name),
            Expr::Not(inner) => self.translate(inner).not(),
            Expr::And(args) | Expr::Or(args) => {
                let args: Vec<_> = args.iter().map(|a| self.translate(a)).collect();
                let refs: Vec<_> = args.iter().collect();
                if matches!(expr, Expr::And(_)) {
                    Bool::and(self.context, &refs)
                } else {
                    Bool::or(self.context, &refs)
                }
            }
        }
    }

    /// Reads the values of every declared variable from a Z3 model.
    fn read_model(&self, model: &z3::Model<'ctx>) -> Model {
        self.variables
            .iter()
            .filter_map(|(name, v)| Some((name.clone(), model.eval(v, true)?.as_bool()?)))
            .collect()
    }
}

/// Converts a Z3 boolean term back into an expression. Terms can share sub-terms, so converted
/// terms are cached.
fn read_term<'ctx>(
    term: &Bool<'ctx>,
    cache: &mut AHashMap<Bool<'ctx>, Expr>,
) -> Result<Expr, SolverError> {
    if let Some(expr) = cache.get(term) {
        return Ok(expr.clone());
    }
    if let Some(value) = term.as_bool() {
        return Ok(Expr::Const(value));
    }

    let mut args = term
        .children()
        .iter()
        .map(|child| match child.as_bool() {
            Some(child) => read_term(&child, cache),
            None => Err(SolverError::UnsupportedTerm(child.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let name = term.decl().name();

    let expr = match (name.as_str(), args.len()) {
        (_, 0) => Expr::Var(name.clone()),
        ("and", _) => Expr::And(args),
        ("or", _) => Expr::Or(args),
        ("not", 1) => Expr::not(args.remove(0)),
        ("=>", 2) => {
            let b = args.remove(1);
            let a = args.remove(0);
            Expr::Or(vec![Expr::not(a), b])
        }
        ("=" | "xor" | "distinct", 2) => {
            let b = args.remove(1);
            let a = args.remove(0);
            let (b, not_b) = if name == "=" {
                (b.clone(), Expr::not(b))
            } else {
                (Expr::not(b.clone()), b)
            };
            Expr::Or(vec![
                Expr::And(vec![a.clone(), b]),
                Expr::And(vec![Expr::not(a), not_b]),
            ])
        }
        ("ite", 3) => {
            let otherwise = args.remove(2);
            let then = args.remove(1);
            let condition = args.remove(0);
            Expr::Or(vec![
                Expr::And(vec![condition.clone(), then]),
                Expr::And(vec![Expr::not(condition), otherwise]),
            ])
        }
        _ => return Err(SolverError::UnsupportedTerm(term.to_string())),
    };
    cache.insert(term.clone(), expr.clone());
    Ok(expr)
}
