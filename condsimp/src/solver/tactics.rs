//! Simplification tactics and the combinators used to compose them.
//!
//! Every tactic maps an expression to an equivalent one. The base tactics are:
//!
//! - `simplify`: local rewriting of every node, bottom-up.
//! - `ctx-simplify`: replaces variables by constants when their value is fixed by the literals
//!   of the surrounding conjunctions and disjunctions.
//! - `dom-simplify`: absorption and factoring of shared conjuncts or disjuncts.
//! - `ctx-solver-simplify`: asks the SAT engine whether each sub-expression is forced to a
//!   constant by its context.

use super::{sat, Config, SolverError};
use crate::{ast::Expr, utils::DedupIterator};
use ahash::{AHashMap, AHashSet};

pub type TacticResult = Result<Expr, SolverError>;

/// A transformation that produces an expression equivalent to its input.
pub trait Tactic {
    fn name(&self) -> String;

    fn apply(&self, expr: &Expr) -> TacticResult;
}

/// The base tactics, that can be referenced by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TacticKind {
    Simplify,
    CtxSimplify,
    DomSimplify,
    CtxSolverSimplify,
}

impl_str_conversion_traits!(TacticKind {
    Simplify: "simplify",
    CtxSimplify: "ctx-simplify",
    DomSimplify: "dom-simplify",
    CtxSolverSimplify: "ctx-solver-simplify",
});

impl TacticKind {
    /// Parses a tactic name, returning a `SolverError::UnknownTactic` error if it is not valid.
    pub fn from_name(name: &str) -> Result<Self, SolverError> {
        name.parse()
            .map_err(|()| SolverError::UnknownTactic(name.to_owned()))
    }

    pub fn build(self, config: &Config) -> Box<dyn Tactic> {
        match self {
            TacticKind::Simplify => Box::new(Simplify),
            TacticKind::CtxSimplify => Box::new(CtxSimplify),
            TacticKind::DomSimplify => Box::new(DomSimplify),
            TacticKind::CtxSolverSimplify => Box::new(CtxSolverSimplify {
                size_limit: config.solver_simplify_limit,
                conflict_limit: config.solver_simplify_conflicts,
            }),
        }
    }
}

/// Builds the tactic pipeline described by `config`: `simplify`, followed by the configured
/// tactics applied in sequence and repeated until a fixed point is reached.
pub fn build_pipeline(config: &Config) -> Box<dyn Tactic> {
    let body = config.tactics.iter().map(|t| t.build(config)).collect();
    Box::new(AndThen(vec![
        Box::new(Simplify),
        Box::new(Repeat {
            inner: Box::new(AndThen(body)),
            max_iterations: config.max_iterations,
        }),
    ]))
}

/// Applies every tactic in sequence, each one to the result of the previous.
pub struct AndThen(pub Vec<Box<dyn Tactic>>);

impl Tactic for AndThen {
    fn name(&self) -> String {
        let names: Vec<_> = self.0.iter().map(|t| t.name()).collect();
        format!("then({})", names.join(", "))
    }

    fn apply(&self, expr: &Expr) -> TacticResult {
        let mut current = expr.clone();
        for tactic in &self.0 {
            current = tactic.apply(&current)?;
        }
        Ok(current)
    }
}

/// Applies a tactic until it no longer changes the expression, or until `max_iterations` is
/// reached.
pub struct Repeat {
    pub inner: Box<dyn Tactic>,
    pub max_iterations: usize,
}

impl Tactic for Repeat {
    fn name(&self) -> String {
        format!("repeat({})", self.inner.name())
    }

    fn apply(&self, expr: &Expr) -> TacticResult {
        let mut current = expr.clone();
        for i in 0..self.max_iterations {
            let next = self.inner.apply(&current)?;
            log::trace!("iteration {} of '{}': size {}", i, self.inner.name(), next.size());
            if next == current {
                return Ok(next);
            }
            current = next;
        }
        log::debug!(
            "'{}' did not reach a fixed point after {} iterations",
            self.name(),
            self.max_iterations
        );
        Ok(current)
    }
}

/// Negates an already simplified expression.
fn negate(expr: Expr) -> Expr {
    match expr {
        Expr::Const(b) => Expr::Const(!b),
        Expr::Not(inner) => *inner,
        other => Expr::not(other),
    }
}

/// Builds a simplified n-ary node from already simplified children. This flattens nested nodes of
/// the same kind, removes neutral constants and duplicates, and returns the absorbing constant if
/// it, or a pair of complementary children, is present.
fn simplify_nary(is_and: bool, children: impl IntoIterator<Item = Expr>) -> Expr {
    // In an `and`, `true` is neutral and `false` is absorbing; in an `or`, it's the opposite
    let absorbing = Expr::Const(!is_and);

    let mut flat = Vec::new();
    for child in children {
        match child {
            Expr::And(args) if is_and => flat.extend(args),
            Expr::Or(args) if !is_and => flat.extend(args),
            other => flat.push(other),
        }
    }

    let mut result = Vec::with_capacity(flat.len());
    for child in flat.into_iter().dedup() {
        match child.as_const() {
            Some(b) if b == is_and => continue,
            Some(_) => return absorbing,
            None => result.push(child),
        }
    }

    let set: AHashSet<&Expr> = result.iter().collect();
    let has_complement = result.iter().any(|c| match c {
        Expr::Not(inner) => set.contains(inner.as_ref()),
        _ => false,
    });
    if has_complement {
        return absorbing;
    }

    if is_and {
        Expr::mk_and(result)
    } else {
        Expr::mk_or(result)
    }
}

/// The `simplify` tactic.
pub struct Simplify;

impl Tactic for Simplify {
    fn name(&self) -> String {
        TacticKind::Simplify.to_string()
    }

    fn apply(&self, expr: &Expr) -> TacticResult {
        Ok(simplify(expr))
    }
}

pub fn simplify(expr: &Expr) -> Expr {
    match expr {
        Expr::Const(_) | Expr::Var(_) => expr.clone(),
        Expr::Not(inner) => negate(simplify(inner)),
        Expr::And(args) => simplify_nary(true, args.iter().map(simplify)),
        Expr::Or(args) => simplify_nary(false, args.iter().map(simplify)),
    }
}

/// The `ctx-simplify` tactic.
///
/// Children of a node are visited in order. In an `and`, once a child is simplified, its literals
/// are assumed to be true while simplifying the following children; in an `or`, they are assumed
/// to be false.
pub struct CtxSimplify;

impl Tactic for CtxSimplify {
    fn name(&self) -> String {
        TacticKind::CtxSimplify.to_string()
    }

    fn apply(&self, expr: &Expr) -> TacticResult {
        Ok(ctx_simplify(expr, &mut AHashMap::new()))
    }
}

type LiteralContext = AHashMap<String, bool>;

fn ctx_simplify(expr: &Expr, context: &mut LiteralContext) -> Expr {
    match expr {
        Expr::Const(_) => expr.clone(),
        Expr::Var(name) => context
            .get(name)
            .map_or_else(|| expr.clone(), |&b| Expr::Const(b)),
        Expr::Not(inner) => negate(ctx_simplify(inner, context)),
        Expr::And(args) | Expr::Or(args) => {
            let is_and = matches!(expr, Expr::And(_));
            let mut added = Vec::new();
            let mut result = Vec::with_capacity(args.len());
            for a in args {
                let simplified = ctx_simplify(a, context);
                if simplified.as_const() == Some(!is_and) {
                    result = vec![simplified];
                    break;
                }
                assume(&simplified, is_and, context, &mut added);
                result.push(simplified);
            }
            for name in added {
                context.remove(&name);
            }
            simplify_nary(is_and, result)
        }
    }
}

/// Adds to `context` the variable values implied by `expr` having the value `value`. The names
/// of the variables added are pushed to `added`.
fn assume(expr: &Expr, value: bool, context: &mut LiteralContext, added: &mut Vec<String>) {
    match expr {
        Expr::Var(name) => {
            if !context.contains_key(name) {
                context.insert(name.clone(), value);
                added.push(name.clone());
            }
        }
        Expr::Not(inner) => assume(inner, !value, context, added),
        Expr::And(args) if value => args.iter().for_each(|a| assume(a, value, context, added)),
        Expr::Or(args) if !value => args.iter().for_each(|a| assume(a, value, context, added)),
        _ => (),
    }
}

/// The `dom-simplify` tactic.
///
/// In an `and` node (and dually in an `or` node), this:
/// - removes a disjunction that has a sibling as one of its disjuncts: `a ∧ (a ∨ b) = a`;
/// - removes from a disjunction the disjuncts that are the negation of a sibling:
///   `a ∧ (¬a ∨ b) = a ∧ b`;
/// - factors out a conjunct shared by all disjuncts of an `or`:
///   `(a ∧ b) ∨ (a ∧ c) = a ∧ (b ∨ c)`.
pub struct DomSimplify;

impl Tactic for DomSimplify {
    fn name(&self) -> String {
        TacticKind::DomSimplify.to_string()
    }

    fn apply(&self, expr: &Expr) -> TacticResult {
        Ok(dom_simplify(expr))
    }
}

fn dom_simplify(expr: &Expr) -> Expr {
    let is_and = match expr {
        Expr::Const(_) | Expr::Var(_) => return expr.clone(),
        Expr::Not(inner) => return negate(dom_simplify(inner)),
        Expr::And(_) => true,
        Expr::Or(_) => false,
    };
    let node = simplify_nary(is_and, expr.children().iter().map(dom_simplify));
    let is_same_kind = matches!(
        (&node, is_and),
        (Expr::And(_), true) | (Expr::Or(_), false)
    );
    if !is_same_kind {
        return node;
    }

    let absorbed = absorb(node.children(), is_and);
    match factor(&absorbed, is_and) {
        Some(factored) => factored,
        None => simplify_nary(is_and, absorbed),
    }
}

/// Returns the children of the dual kind of node: the disjuncts of an `or` if `is_and` is true,
/// the conjuncts of an `and` otherwise. Any other expression is its own single child.
fn dual_children(expr: &Expr, is_and: bool) -> &[Expr] {
    match (expr, is_and) {
        (Expr::Or(args), true) | (Expr::And(args), false) => args,
        _ => std::slice::from_ref(expr),
    }
}

fn absorb(children: &[Expr], is_and: bool) -> Vec<Expr> {
    let siblings: AHashSet<&Expr> = children.iter().collect();
    let mut result = Vec::with_capacity(children.len());
    for child in children {
        let inner = match (child, is_and) {
            (Expr::Or(args), true) | (Expr::And(args), false) => args,
            _ => {
                result.push(child.clone());
                continue;
            }
        };
        if inner.iter().any(|d| siblings.contains(d)) {
            continue;
        }
        let kept: Vec<_> = inner
            .iter()
            .filter(|d| !siblings.contains(&d.negated()))
            .cloned()
            .collect();
        result.push(if kept.len() == inner.len() {
            child.clone()
        } else {
            simplify_nary(!is_and, kept)
        });
    }
    result
}

/// Factors out the elements shared by the dual children of every child. Returns `None` if there
/// is nothing to factor.
fn factor(children: &[Expr], is_and: bool) -> Option<Expr> {
    let (first, rest) = children.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let other_sets: Vec<AHashSet<&Expr>> = rest
        .iter()
        .map(|c| dual_children(c, is_and).iter().collect())
        .collect();
    let common: Vec<&Expr> = dual_children(first, is_and)
        .iter()
        .dedup()
        .filter(|e| other_sets.iter().all(|s| s.contains(e)))
        .collect();
    if common.is_empty() {
        return None;
    }

    let common_set: AHashSet<&Expr> = common.iter().copied().collect();
    let remaining = children.iter().map(|c| {
        let kept = dual_children(c, is_and)
            .iter()
            .filter(|e| !common_set.contains(e))
            .cloned();
        simplify_nary(!is_and, kept)
    });
    let node = simplify_nary(is_and, remaining);
    let factored = common.into_iter().cloned().chain(std::iter::once(node));
    Some(simplify_nary(!is_and, factored))
}

/// The `ctx-solver-simplify` tactic.
///
/// Every sub-expression is checked against its context: the ancestors' siblings and its own
/// siblings, each assumed true under an `and` and false under an `or`. If the context implies the
/// sub-expression, or its negation, it is replaced by the corresponding constant. Expressions
/// larger than `size_limit` are left untouched.
pub struct CtxSolverSimplify {
    pub size_limit: usize,
    pub conflict_limit: Option<u64>,
}

impl Tactic for CtxSolverSimplify {
    fn name(&self) -> String {
        TacticKind::CtxSolverSimplify.to_string()
    }

    fn apply(&self, expr: &Expr) -> TacticResult {
        let size = expr.size();
        if size > self.size_limit {
            log::warn!(
                "skipping '{}': expression size {} is above the limit of {}",
                self.name(),
                size,
                self.size_limit
            );
            return Ok(expr.clone());
        }
        self.visit(expr, &mut Vec::new())
    }
}

impl CtxSolverSimplify {
    /// Returns the value of `expr` if it is fixed by `context`. Queries that exceed the conflict
    /// limit are treated as inconclusive.
    fn forced_value(&self, expr: &Expr, context: &[Expr]) -> Result<Option<bool>, SolverError> {
        for value in [true, false] {
            let mut cnf = sat::Cnf::new();
            for c in context {
                cnf.assert(c);
            }
            let lit = cnf.encode(expr);
            cnf.add_clause(vec![if value { !lit } else { lit }]);
            match cnf.solve(self.conflict_limit) {
                Ok(result) if result.is_unsat() => return Ok(Some(value)),
                Ok(_) | Err(SolverError::ResourceLimit(_)) => (),
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn visit(&self, expr: &Expr, context: &mut Vec<Expr>) -> TacticResult {
        if let Expr::Const(_) = expr {
            return Ok(expr.clone());
        }
        if let Some(value) = self.forced_value(expr, context)? {
            return Ok(Expr::Const(value));
        }

        let is_and = match expr {
            Expr::Not(inner) => return Ok(negate(self.visit(inner, context)?)),
            Expr::And(_) => true,
            Expr::Or(_) => false,
            _ => return Ok(expr.clone()),
        };

        let mut current = expr.children().to_vec();
        for i in 0..current.len() {
            let depth = context.len();
            for (j, sibling) in current.iter().enumerate() {
                if j != i {
                    context.push(if is_and { sibling.clone() } else { sibling.negated() });
                }
            }
            let simplified = self.visit(&current[i], context);
            context.truncate(depth);

            current[i] = simplified?;
            if current[i].as_const() == Some(!is_and) {
                return Ok(Expr::Const(!is_and));
            }
        }
        Ok(simplify_nary(is_and, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parser::tests::parse_condition_str,
        solver::{sat::check_sat, Config},
    };

    fn assert_equivalent(a: &Expr, b: &Expr) {
        let mut cnf = sat::Cnf::new();
        cnf.assert_distinct(a, b);
        assert!(
            cnf.solve(None).unwrap().is_unsat(),
            "'{}' is not equivalent to '{}'",
            a,
            b
        );
    }

    fn run_cases(tactic: &dyn Tactic, cases: &[(&str, &str)]) {
        for (input, expected) in cases {
            let input = parse_condition_str(input);
            let got = tactic.apply(&input).unwrap();
            assert_eq!(got.to_string(), *expected, "applying '{}' to '{}'", tactic.name(), input);
            assert_equivalent(&input, &got);
        }
    }

    #[test]
    fn test_simplify() {
        run_cases(
            &Simplify,
            &[
                ("a", "a"),
                ("#not #not a", "a"),
                ("#not true", "false"),
                ("#and a true", "a"),
                ("#and a false", "false"),
                ("#or a true", "true"),
                ("#or false a", "a"),
                ("#and a a", "a"),
                ("#and a #not a", "false"),
                ("#or #not a a", "true"),
                ("#and #and a b #and c a", "#and #and a b c"),
                ("#or #or a b #not #not c", "#or #or a b c"),
                ("#and a #or b #and c false", "#and a b"),
                ("#not #and a #not a", "true"),
            ],
        );
    }

    #[test]
    fn test_ctx_simplify() {
        run_cases(
            &CtxSimplify,
            &[
                ("#and a #or a b", "a"),
                ("#and a #or #not a b", "#and a b"),
                ("#and #not a #or a b", "#and #not a b"),
                ("#or a #and a b", "a"),
                ("#or a #and #not a b", "#or a b"),
                ("#and #and a b #or #not b c", "#and #and a b c"),
                ("#and a #not a", "false"),
                ("#or #or a b #and #not a #not b", "true"),
                // Only siblings to the left are used as context
                ("#and #or a b a", "#and #or a b a"),
            ],
        );
    }

    #[test]
    fn test_dom_simplify() {
        run_cases(
            &DomSimplify,
            &[
                ("#and #or a b a", "a"),
                ("#and a #or a b", "a"),
                ("#or #and a b a", "a"),
                ("#and #or #not a b a", "#and b a"),
                ("#or #and a b #and a c", "#and a #or b c"),
                ("#and #or a b #or a c", "#or a #and b c"),
                ("#or #and a b a", "a"),
                ("#or #and a b #and b a", "#and a b"),
                ("#or a b", "#or a b"),
                ("#not #and #or a b a", "#not a"),
            ],
        );
    }

    #[test]
    fn test_ctx_solver_simplify() {
        let tactic = CtxSolverSimplify { size_limit: 1000, conflict_limit: None };
        run_cases(
            &tactic,
            &[
                ("#or a #not a", "true"),
                ("#and #or a b #and #not a #not b", "false"),
                ("#and #or a b #not a", "#and b #not a"),
                ("#or #and a b #and a #not b", "a"),
                ("#and #or a b #or a #not b", "a"),
                ("#and a b", "#and a b"),
            ],
        );
    }

    #[test]
    fn test_ctx_solver_simplify_size_limit() {
        let tactic = CtxSolverSimplify { size_limit: 2, conflict_limit: None };
        let input = parse_condition_str("#or a #not a");
        assert_eq!(tactic.apply(&input).unwrap(), input);
    }

    #[test]
    fn test_repeat_reaches_fixed_point() {
        let config = Config::new();
        let pipeline = build_pipeline(&config);
        let cases = [
            ("#and a #or a b", "a"),
            ("#or #and a b #and a #not b", "a"),
            ("#and #or a b #or a #not b", "a"),
            ("#and #and #or x y #not x #or z #not y", "#and #and y #not x z"),
            ("#or #and p q #or #and p #not q #not p", "true"),
            ("#and a b", "#and a b"),
        ];
        for (input, expected) in cases {
            let input = parse_condition_str(input);
            let got = pipeline.apply(&input).unwrap();
            assert_eq!(got.to_string(), expected);
            assert_equivalent(&input, &got);
            assert!(got.size() <= input.size());
        }
    }

    #[test]
    fn test_pipeline_name_and_tactic_names() {
        let config = Config::new().tactics(vec![TacticKind::Simplify, TacticKind::DomSimplify]);
        assert_eq!(
            build_pipeline(&config).name(),
            "then(simplify, repeat(then(simplify, dom-simplify)))"
        );
        assert_eq!(
            TacticKind::from_name("ctx-solver-simplify").unwrap(),
            TacticKind::CtxSolverSimplify
        );
        assert!(matches!(
            TacticKind::from_name("unit-subsume-simplify"),
            Err(SolverError::UnknownTactic(_))
        ));
    }

    #[test]
    fn test_results_are_sound_on_random_shapes() {
        // A fixed family of expressions mixing every operator, to exercise all tactics together
        let vars = ["a", "b", "c", "d"];
        let config = Config::new();
        let pipeline = build_pipeline(&config);
        for seed in 0..64u32 {
            let mut tokens = Vec::new();
            let mut state = seed.wrapping_mul(2654435761).wrapping_add(12345);
            let mut next = || {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state
            };
            // Build a random prefix sequence with a bounded number of operators
            let mut pending = 1;
            let mut budget: u32 = 12;
            while pending > 0 {
                let r = next() % 10;
                if budget > 0 && r < 3 {
                    tokens.push("#and".to_owned());
                    pending += 1;
                } else if budget > 0 && r < 6 {
                    tokens.push("#or".to_owned());
                    pending += 1;
                } else if budget > 0 && r < 7 {
                    tokens.push("#not".to_owned());
                } else {
                    tokens.push(vars[(next() % 4) as usize].to_owned());
                    pending -= 1;
                }
                budget = budget.saturating_sub(1);
            }
            let input = parse_condition_str(&tokens.join(" "));
            let got = pipeline.apply(&input).unwrap();
            assert_equivalent(&input, &got);
            assert!(!check_sat(&[&got], None).unwrap().is_unsat() || got == Expr::Const(false));
        }
    }
}
