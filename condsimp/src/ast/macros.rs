//! Macros for building expressions and for converting enums to and from their textual form.

/// A macro to help build new expressions. Variables are written as plain identifiers, and
/// arbitrary Rust expressions of type `Expr` can be interpolated using braces. Note that the
/// `and` and `or` forms build the node directly, without any normalization.
///
/// # Examples
///
/// ```
/// # use condsimp::{ast::Expr, build_expr};
/// let e = build_expr!((and a (not b)));
/// assert_eq!(e.size(), 4);
///
/// let c = Expr::var("c");
/// let f = build_expr!((or {e.clone()} {c} false));
/// assert_eq!(f.size(), 7);
/// ```
#[macro_export]
macro_rules! build_expr {
    (true) => { $crate::ast::Expr::Const(true) };
    (false) => { $crate::ast::Expr::Const(false) };
    ({$e:expr}) => { $e };
    ((not $arg:tt)) => {
        $crate::ast::Expr::Not(Box::new($crate::build_expr!($arg)))
    };
    ((and $($args:tt)+)) => {
        $crate::ast::Expr::And(vec![$($crate::build_expr!($args)),+])
    };
    ((or $($args:tt)+)) => {
        $crate::ast::Expr::Or(vec![$($crate::build_expr!($args)),+])
    };
    ($var:ident) => {
        $crate::ast::Expr::Var(stringify!($var).to_owned())
    };
}

/// Implements `FromStr` and `Display` for an enum, given the string for each variant.
macro_rules! impl_str_conversion_traits {
    ($enum_name:ident { $($variant:ident: $str:literal),* $(,)? }) => {
        impl std::str::FromStr for $enum_name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($str => Ok($enum_name::$variant),)*
                    _ => Err(()),
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                let s = match self {
                    $($enum_name::$variant => $str,)*
                };
                write!(f, "{}", s)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Operator};

    #[test]
    fn test_build_expr() {
        let a = Expr::var("a");
        let b = Expr::var("b");
        assert_eq!(build_expr!(a), a);
        assert_eq!(build_expr!(true), Expr::Const(true));
        assert_eq!(
            build_expr!((and a (not b))),
            Expr::And(vec![a.clone(), Expr::Not(Box::new(b.clone()))])
        );
        assert_eq!(
            build_expr!((or {b.clone()} (and a false) a)),
            Expr::Or(vec![b, Expr::And(vec![a.clone(), Expr::Const(false)]), a])
        );
    }

    #[test]
    fn test_operator_conversion() {
        assert_eq!("#and".parse::<Operator>(), Ok(Operator::And));
        assert_eq!("#or".parse::<Operator>(), Ok(Operator::Or));
        assert_eq!("#not".parse::<Operator>(), Ok(Operator::Not));
        assert_eq!("and".parse::<Operator>(), Err(()));
        assert_eq!(Operator::Or.to_string(), "#or");
    }
}
