//! The abstract syntax tree (AST) for trace conditions.
//!
//! A condition is a boolean expression over named variables, built from the operators `#and`,
//! `#or` and `#not`. Tactics may also reduce a condition to one of the boolean constants.

#[macro_use]
mod macros;
pub mod printer;

pub use printer::{write_prefix, write_smt_script};

use indexmap::IndexSet;

/// A boolean operator, as written in the trace format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
    Not,
}

impl_str_conversion_traits!(Operator {
    And: "#and",
    Or: "#or",
    Not: "#not",
});

impl Operator {
    /// The number of operands this operator takes in the prefix token format.
    pub fn arity(self) -> usize {
        match self {
            Operator::Not => 1,
            Operator::And | Operator::Or => 2,
        }
    }

    /// The name of the equivalent SMT-LIB function.
    pub fn smt_name(self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
        }
    }
}

/// A boolean expression.
///
/// `And` and `Or` nodes may have any number of children, but the constructors `Expr::mk_and`
/// and `Expr::mk_or` never build one with fewer than two. The parser only builds binary nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expr {
    /// A boolean constant.
    Const(bool),

    /// An atomic boolean variable.
    Var(String),

    /// The negation of an expression.
    Not(Box<Expr>),

    /// The conjunction of all children.
    And(Vec<Expr>),

    /// The disjunction of all children.
    Or(Vec<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }

    /// Builds the conjunction of `children`. An empty conjunction is `true`, and a single child is
    /// returned unchanged.
    pub fn mk_and(mut children: Vec<Expr>) -> Self {
        match children.len() {
            0 => Expr::Const(true),
            1 => children.pop().unwrap(),
            _ => Expr::And(children),
        }
    }

    /// Builds the disjunction of `children`. An empty disjunction is `false`, and a single child
    /// is returned unchanged.
    pub fn mk_or(mut children: Vec<Expr>) -> Self {
        match children.len() {
            0 => Expr::Const(false),
            1 => children.pop().unwrap(),
            _ => Expr::Or(children),
        }
    }

    /// Builds the application of `op` to `args`. Returns `None` if `op` is `Operator::Not` and
    /// `args` does not hold exactly one expression.
    pub fn apply(op: Operator, args: Vec<Expr>) -> Option<Self> {
        match op {
            Operator::And => Some(Expr::mk_and(args)),
            Operator::Or => Some(Expr::mk_or(args)),
            Operator::Not => {
                let [inner]: [Expr; 1] = args.try_into().ok()?;
                Some(Expr::not(inner))
            }
        }
    }

    /// Returns the negation of this expression, removing a negation instead of adding one if
    /// possible.
    pub fn negated(&self) -> Self {
        match self {
            Expr::Const(b) => Expr::Const(!b),
            Expr::Not(inner) => inner.as_ref().clone(),
            other => Expr::not(other.clone()),
        }
    }

    /// Returns the operator at the root of this expression, if it is not a leaf.
    pub fn operator(&self) -> Option<Operator> {
        match self {
            Expr::Const(_) | Expr::Var(_) => None,
            Expr::Not(_) => Some(Operator::Not),
            Expr::And(_) => Some(Operator::And),
            Expr::Or(_) => Some(Operator::Or),
        }
    }

    /// Returns the children of this node. Leaves have no children.
    pub fn children(&self) -> &[Expr] {
        match self {
            Expr::Const(_) | Expr::Var(_) => &[],
            Expr::Not(inner) => std::slice::from_ref(inner.as_ref()),
            Expr::And(args) | Expr::Or(args) => args,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Expr::Const(_) | Expr::Var(_))
    }

    pub fn as_const(&self) -> Option<bool> {
        match self {
            Expr::Const(b) => Some(*b),
            _ => None,
        }
    }

    /// If this expression is a literal, that is, a variable or a negated variable, returns the
    /// variable name and its polarity.
    pub fn as_literal(&self) -> Option<(&str, bool)> {
        match self {
            Expr::Var(name) => Some((name.as_str(), true)),
            Expr::Not(inner) => match inner.as_ref() {
                Expr::Var(name) => Some((name.as_str(), false)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns `true` if this expression is the negation of `other`, or vice versa.
    pub fn is_complement_of(&self, other: &Expr) -> bool {
        match (self, other) {
            (Expr::Const(a), Expr::Const(b)) => a != b,
            _ => {
                matches!(self, Expr::Not(a) if a.as_ref() == other)
                    || matches!(other, Expr::Not(b) if b.as_ref() == self)
            }
        }
    }

    /// The size of the expression: every node, operator or leaf, counts as one.
    pub fn size(&self) -> usize {
        match self {
            Expr::Const(_) | Expr::Var(_) => 1,
            Expr::Not(inner) => inner.size() + 1,
            Expr::And(args) | Expr::Or(args) => args.iter().map(Expr::size).sum::<usize>() + 1,
        }
    }

    /// Returns the variables that occur in this expression, in order of first occurrence.
    pub fn variables(&self) -> IndexSet<&str> {
        fn collect<'a>(e: &'a Expr, acc: &mut IndexSet<&'a str>) {
            match e {
                Expr::Const(_) => (),
                Expr::Var(name) => {
                    acc.insert(name);
                }
                _ => e.children().iter().for_each(|c| collect(c, acc)),
            }
        }
        let mut result = IndexSet::new();
        collect(self, &mut result);
        result
    }

    /// Evaluates the expression under the given assignment. Variables for which `assignment`
    /// returns `None` are an error, reported by returning `None`.
    pub fn evaluate<F>(&self, assignment: &F) -> Option<bool>
    where
        F: Fn(&str) -> Option<bool>,
    {
        Some(match self {
            Expr::Const(b) => *b,
            Expr::Var(name) => assignment(name)?,
            Expr::Not(inner) => !inner.evaluate(assignment)?,
            Expr::And(args) => {
                let mut result = true;
                for a in args {
                    result &= a.evaluate(assignment)?;
                }
                result
            }
            Expr::Or(args) => {
                let mut result = false;
                for a in args {
                    result |= a.evaluate(assignment)?;
                }
                result
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        assert_eq!(Expr::var("a").size(), 1);
        assert_eq!(Expr::Const(false).size(), 1);
        assert_eq!(build_expr!((and a (not b))).size(), 4);
        assert_eq!(build_expr!((or a b c d)).size(), 5);
        assert_eq!(build_expr!((and (and a b) c)).size(), 5);
        assert_eq!(build_expr!((not (not (or a (and b c))))).size(), 7);
    }

    #[test]
    fn test_size_ignores_child_order() {
        let cases = [
            (build_expr!((and a (not b))), build_expr!((and (not b) a))),
            (
                build_expr!((or (and a b c) (not d) e)),
                build_expr!((or e (and c a b) (not d))),
            ),
            (
                build_expr!((and (or a (not (and b c))) d)),
                build_expr!((and d (or (not (and c b)) a))),
            ),
        ];
        for (a, b) in cases {
            assert_eq!(a.size(), b.size());
        }
    }

    #[test]
    fn test_normalizing_constructors() {
        assert_eq!(Expr::mk_and(Vec::new()), Expr::Const(true));
        assert_eq!(Expr::mk_or(Vec::new()), Expr::Const(false));
        assert_eq!(Expr::mk_and(vec![Expr::var("a")]), Expr::var("a"));
        assert_eq!(
            Expr::mk_or(vec![Expr::var("a"), Expr::var("b")]),
            build_expr!((or a b))
        );
        assert_eq!(
            Expr::apply(Operator::Not, vec![Expr::var("a")]),
            Some(build_expr!((not a)))
        );
        assert_eq!(Expr::apply(Operator::Not, Vec::new()), None);
        assert_eq!(
            Expr::apply(Operator::Not, vec![Expr::var("a"), Expr::var("b")]),
            None
        );
        assert_eq!(
            Expr::apply(Operator::And, Vec::new()),
            Some(Expr::Const(true))
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(Expr::var("a").as_literal(), Some(("a", true)));
        assert_eq!(build_expr!((not a)).as_literal(), Some(("a", false)));
        assert_eq!(build_expr!((not (not a))).as_literal(), None);
        assert_eq!(build_expr!((and a b)).as_literal(), None);

        assert!(build_expr!((not a)).is_complement_of(&Expr::var("a")));
        assert!(Expr::var("a").is_complement_of(&build_expr!((not a))));
        assert!(!Expr::var("a").is_complement_of(&Expr::var("a")));
        assert!(Expr::Const(true).is_complement_of(&Expr::Const(false)));
        assert_eq!(build_expr!((not (and a b))).negated(), build_expr!((and a b)));
    }

    #[test]
    fn test_variables_and_evaluate() {
        let e = build_expr!((or (and b a) (not c) b));
        let vars: Vec<_> = e.variables().into_iter().collect();
        assert_eq!(vars, ["b", "a", "c"]);

        let all_false = |_: &str| Some(false);
        assert_eq!(e.evaluate(&all_false), Some(true));
        let only_c = |v: &str| Some(v == "c");
        assert_eq!(e.evaluate(&only_c), Some(false));
        let missing = |v: &str| (v != "a").then_some(true);
        assert_eq!(e.evaluate(&missing), None);
    }
}
