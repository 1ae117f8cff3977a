//! Substitution test for first-order homogeneous equations.
//!
//! With the derivative isolated as `y' = f(x, y)`, the equation is
//! homogeneous when `f` depends on `y/x` alone. Writing `y = t*x` and,
//! separately, replacing every `y/x` by `t` must then give the same
//! expression, and that expression must be free of `x`.

use tracing::debug;

use crate::capability::AlgebraCapability;
use crate::equation::DifferentialEquation;
use crate::functions::arithmetic::{div, times};
use crate::functions::simplify::{free_symbols, independent_of};
use crate::syntax::Expr;

/// A symbol for the ratio `y/x` that does not occur in `expr`.
fn ratio_symbol(expr: &Expr) -> Expr {
  let taken = free_symbols(expr);
  ["t", "u", "v", "w"]
    .iter()
    .find(|name| !taken.contains(**name))
    .map(|name| Expr::symbol(name))
    .unwrap_or_else(|| Expr::symbol("_ratio"))
}

/// `false` whenever the derivative cannot be isolated.
pub fn is_homogeneous(
  eq: &DifferentialEquation,
  capability: &dyn AlgebraCapability,
) -> bool {
  let x = eq.independent_var();
  let y = eq.dependent_fn();
  let dy = Expr::derivative(y.clone(), x.clone(), 1);
  let slope = match capability.solve(&eq.residual(), &dy) {
    Ok(branches) => match branches.into_iter().next() {
      Some(first) => first,
      None => {
        debug!("no branch isolates {}", dy);
        return false;
      }
    },
    Err(e) => {
      debug!(error = %e, "derivative not isolatable");
      return false;
    }
  };
  let t = ratio_symbol(&slope);
  let scaled = capability.simplify(&capability.substitute(
    &slope,
    y,
    &times(vec![t.clone(), x.clone()]),
  ));
  let ratio = capability.simplify(&capability.substitute(
    &slope,
    &div(y.clone(), x.clone()),
    &t,
  ));
  debug!(scaled = %scaled, ratio = %ratio, "homogeneity substitution");
  scaled == ratio && independent_of(&scaled, x)
}
