//! Expansion, simplification, substitution and structural queries.

use std::collections::BTreeSet;

use crate::functions::arithmetic::{
  call, canonical_cmp, neg, plus, power, split_coefficient, sub, times,
};
use crate::functions::calculus_ast::differentiate;
use crate::syntax::Expr;

/// Products of sums larger than this are left unexpanded.
const MAX_EXPANDED_TERMS: usize = 4096;
const MAX_EXPANDED_POWER: i128 = 12;

// ─── Structural queries ────────────────────────────────────────────────

/// True when `target` does not occur in `expr`, looking only through
/// built-in heads. Applied functions and derivatives are opaque: `y(x)` is
/// free of `x`, but not free of `y(x)`.
pub fn free_of(expr: &Expr, target: &Expr) -> bool {
  if expr == target {
    return false;
  }
  match expr {
    Expr::FunctionCall { args, .. } if expr.is_builtin() => {
      args.iter().all(|a| free_of(a, target))
    }
    Expr::Equation { lhs, rhs } => free_of(lhs, target) && free_of(rhs, target),
    _ => true,
  }
}

/// True when `target` occurs anywhere in `expr`, including inside applied
/// functions and derivatives.
pub fn contains(expr: &Expr, target: &Expr) -> bool {
  if expr == target {
    return true;
  }
  match expr {
    Expr::FunctionCall { args, .. } => args.iter().any(|a| contains(a, target)),
    Expr::Equation { lhs, rhs } => {
      contains(lhs, target) || contains(rhs, target)
    }
    _ => false,
  }
}

/// True when `expr` is constant with respect to `var`. A symbol reaches
/// through applied functions (`y(x)` depends on `x`); an atom such as `y(x)`
/// or a derivative only matches structurally.
pub fn independent_of(expr: &Expr, var: &Expr) -> bool {
  match var {
    Expr::Identifier(_) => !contains(expr, var),
    _ => free_of(expr, var),
  }
}

/// True when any `Derivative` atom occurs in `expr`.
pub fn contains_derivative(expr: &Expr) -> bool {
  match expr {
    Expr::FunctionCall { name, args } => {
      name == "Derivative" || args.iter().any(contains_derivative)
    }
    Expr::Equation { lhs, rhs } => {
      contains_derivative(lhs) || contains_derivative(rhs)
    }
    _ => false,
  }
}

/// Every symbol occurring anywhere in `expr`.
pub fn free_symbols(expr: &Expr) -> BTreeSet<String> {
  let mut out = BTreeSet::new();
  collect_symbols(expr, &mut out);
  out
}

fn collect_symbols(expr: &Expr, out: &mut BTreeSet<String>) {
  match expr {
    Expr::Identifier(name) => {
      out.insert(name.clone());
    }
    Expr::FunctionCall { args, .. } => {
      args.iter().for_each(|a| collect_symbols(a, out))
    }
    Expr::Equation { lhs, rhs } => {
      collect_symbols(lhs, out);
      collect_symbols(rhs, out);
    }
    _ => {}
  }
}

/// All `Derivative` atoms in `expr`, deduplicated.
pub fn derivative_atoms(expr: &Expr) -> Vec<Expr> {
  let mut out: Vec<Expr> = Vec::new();
  collect_derivatives(expr, &mut out);
  out
}

fn collect_derivatives(expr: &Expr, out: &mut Vec<Expr>) {
  match expr {
    Expr::FunctionCall { name, args } => {
      if name == "Derivative" {
        if !out.contains(expr) {
          out.push(expr.clone());
        }
      } else {
        args.iter().for_each(|a| collect_derivatives(a, out));
      }
    }
    Expr::Equation { lhs, rhs } => {
      collect_derivatives(lhs, out);
      collect_derivatives(rhs, out);
    }
    _ => {}
  }
}

// ─── Rebuilding ────────────────────────────────────────────────────────

/// Re-applies a head to (possibly substituted) arguments, evaluating
/// derivatives of anything that is no longer an applied function.
pub fn rebuild(name: &str, args: Vec<Expr>) -> Expr {
  if name == "Derivative" && args.len() == 3 {
    let is_applied = matches!(
      &args[0],
      Expr::FunctionCall { .. } if !args[0].is_builtin()
    );
    if is_applied || !matches!(args[1], Expr::Identifier(_)) {
      return Expr::FunctionCall {
        name: name.to_string(),
        args,
      };
    }
    let order = match args[2] {
      Expr::Integer(n) if n >= 0 => n as usize,
      _ => {
        return Expr::FunctionCall {
          name: name.to_string(),
          args,
        };
      }
    };
    let mut result = args[0].clone();
    for _ in 0..order {
      match differentiate(&result, &args[1]) {
        Ok(d) => result = d,
        Err(_) => {
          return Expr::FunctionCall {
            name: name.to_string(),
            args,
          };
        }
      }
    }
    return result;
  }
  call(name, args)
}

/// Applies `f` to every direct child and rebuilds the node canonically.
pub fn map_children(expr: &Expr, f: &mut impl FnMut(&Expr) -> Expr) -> Expr {
  match expr {
    Expr::FunctionCall { name, args } => {
      rebuild(name, args.iter().map(&mut *f).collect())
    }
    Expr::Equation { lhs, rhs } => Expr::equation(f(lhs), f(rhs)),
    other => other.clone(),
  }
}

// ─── Expansion ─────────────────────────────────────────────────────────

fn terms_of(expr: Expr) -> Vec<Expr> {
  match expr {
    Expr::FunctionCall { name, args } if name == "Plus" => args,
    other => vec![other],
  }
}

fn distribute(factors: Vec<Expr>) -> Expr {
  let mut products: Vec<Vec<Expr>> = vec![Vec::new()];
  let mut untouched: Vec<Expr> = Vec::new();
  for factor in factors {
    let terms = terms_of(factor.clone());
    if terms.len() == 1 || products.len() * terms.len() > MAX_EXPANDED_TERMS {
      untouched.push(factor);
      continue;
    }
    let mut next = Vec::with_capacity(products.len() * terms.len());
    for product in &products {
      for term in &terms {
        let mut p = product.clone();
        p.push(term.clone());
        next.push(p);
      }
    }
    products = next;
  }
  plus(
    products
      .into_iter()
      .map(|mut p| {
        p.extend(untouched.iter().cloned());
        times(p)
      })
      .collect(),
  )
}

/// Distributes products over sums and positive integer powers of sums,
/// recursively, and re-canonicalizes the result.
pub fn expand(expr: &Expr) -> Expr {
  match expr {
    Expr::FunctionCall { name, args } => match name.as_str() {
      "Plus" => plus(args.iter().map(expand).collect()),
      "Times" => {
        let factors: Vec<Expr> = args.iter().map(expand).collect();
        let product = distribute(factors);
        // a distributed product may expose new powers of sums
        if product.is_head("Plus") {
          plus(
            terms_of(product)
              .into_iter()
              .map(|t| expand_power_factors(&t))
              .collect(),
          )
        } else {
          expand_power_factors(&product)
        }
      }
      "Power" => {
        let base = expand(&args[0]);
        let exponent = expand(&args[1]);
        match exponent.as_num().and_then(|n| n.as_integer()) {
          Some(n)
            if n > 1 && n <= MAX_EXPANDED_POWER && base.is_head("Plus") =>
          {
            let mut acc = base.clone();
            for _ in 1..n {
              acc = distribute(vec![acc, base.clone()]);
            }
            acc
          }
          _ => power(base, exponent),
        }
      }
      _ => rebuild(name, args.iter().map(expand).collect()),
    },
    Expr::Equation { lhs, rhs } => Expr::equation(expand(lhs), expand(rhs)),
    other => other.clone(),
  }
}

fn expand_power_factors(term: &Expr) -> Expr {
  let needs = match term {
    Expr::FunctionCall { name, args } if name == "Times" => {
      args.iter().any(|f| {
        let (base, e) = f.as_power();
        base.is_head("Plus")
          && e.as_num().and_then(|n| n.as_integer()).is_some_and(|n| n > 1)
      })
    }
    _ => false,
  };
  if needs {
    let factors: Vec<Expr> = term.args().iter().map(expand).collect();
    distribute(factors)
  } else {
    term.clone()
  }
}

/// Canonical simplification: full expansion of the canonical form.
pub fn simplify(expr: &Expr) -> Expr {
  expand(expr)
}

fn vanishes(expr: &Expr) -> bool {
  match expr {
    Expr::Real(f) => f.abs() < 1e-12,
    other => other.is_zero(),
  }
}

/// Bases raised to negative integer powers across the terms of a sum, with
/// the largest power seen for each.
fn denominators(expr: &Expr) -> Vec<(Expr, i128)> {
  let mut out: Vec<(Expr, i128)> = Vec::new();
  for term in terms_of(expr.clone()) {
    let (_, rest) = split_coefficient(&term);
    let factors = match rest {
      Expr::FunctionCall { name, args } if name == "Times" => args,
      other => vec![other],
    };
    for factor in factors {
      let (base, exponent) = factor.as_power();
      let Some(k) = exponent.as_num().and_then(|n| n.as_integer()) else {
        continue;
      };
      if k >= 0 || base.is_number() {
        continue;
      }
      match out.iter_mut().find(|(b, _)| b == base) {
        Some((_, m)) => *m = (*m).max(-k),
        None => out.push((base.clone(), -k)),
      }
    }
  }
  out
}

/// True when `expr` simplifies to zero, after clearing denominators if
/// the expanded sum does not cancel on its own.
pub fn is_zero(expr: &Expr) -> bool {
  let simplified = simplify(expr);
  if vanishes(&simplified) {
    return true;
  }
  let bases = denominators(&simplified);
  if bases.is_empty() {
    return false;
  }
  let multipliers: Vec<Expr> = bases
    .into_iter()
    .map(|(b, k)| power(b, Expr::Integer(k)))
    .collect();
  // cancel each term against the multipliers before distributing
  let cleared = plus(
    terms_of(simplified)
      .into_iter()
      .map(|term| {
        let mut factors = vec![term];
        factors.extend(multipliers.iter().cloned());
        expand(&times(factors))
      })
      .collect(),
  );
  vanishes(&cleared)
}

/// True when `a - b` simplifies to zero.
pub fn equivalent(a: &Expr, b: &Expr) -> bool {
  is_zero(&sub(a.clone(), b.clone()))
}

/// Pulls factors shared by every term of each sum out of the sum, so that
/// `x + 2*t*x` becomes `x*(1 + 2*t)`.
pub fn factor_terms(expr: &Expr) -> Expr {
  let mapped = map_children(expr, &mut |c| factor_terms(c));
  let Expr::FunctionCall { name, args } = &mapped else {
    return mapped;
  };
  if name != "Plus" {
    return mapped;
  }
  let factor_lists: Vec<Vec<(Expr, Expr)>> = args
    .iter()
    .map(|t| {
      let (_, rest) = split_coefficient(t);
      let factors = match &rest {
        Expr::FunctionCall { name, args } if name == "Times" => args.clone(),
        Expr::Integer(1) => Vec::new(),
        other => vec![other.clone()],
      };
      factors
        .iter()
        .map(|f| {
          let (b, e) = f.as_power();
          (b.clone(), e)
        })
        .collect()
    })
    .collect();
  let mut common: Vec<Expr> = Vec::new();
  if let Some(first) = factor_lists.first() {
    for (base, _) in first {
      let mut min_exp: Option<i128> = None;
      let shared = factor_lists.iter().all(|fl| {
        fl.iter().any(|(b, e)| {
          if b != base {
            return false;
          }
          match e.as_num().and_then(|n| n.as_integer()) {
            Some(n) if n > 0 => {
              min_exp = Some(min_exp.map_or(n, |m| m.min(n)));
              true
            }
            _ => false,
          }
        })
      });
      if shared && let Some(n) = min_exp {
        common.push(power(base.clone(), Expr::Integer(n)));
      }
    }
  }
  if common.is_empty() {
    return mapped;
  }
  let divisor = times(common.clone());
  let inv = power(divisor, Expr::Integer(-1));
  let inner = plus(
    args
      .iter()
      .map(|t| times(vec![t.clone(), inv.clone()]))
      .collect(),
  );
  let mut factors = common;
  factors.push(inner);
  times(factors)
}

// ─── Substitution ──────────────────────────────────────────────────────

/// Replaces `from` with `to`.
///
/// An atom pattern (symbol, applied function, derivative) is replaced
/// structurally everywhere. A product pattern such as `y(x)/x` is replaced
/// algebraically inside each monomial of the expanded expression, only
/// where the monomial contains the whole pattern.
pub fn substitute(expr: &Expr, from: &Expr, to: &Expr) -> Expr {
  match product_pattern(from) {
    Some(pattern) => substitute_monomials(&expand(expr), &pattern, to),
    None => substitute_atom(expr, from, to),
  }
}

fn substitute_atom(expr: &Expr, from: &Expr, to: &Expr) -> Expr {
  if expr == from {
    return to.clone();
  }
  map_children(expr, &mut |c| substitute_atom(c, from, to))
}

/// `(base, integer exponent)` pairs of a product of powers, or `None` when
/// `expr` is an atom or not a plain product.
fn product_pattern(expr: &Expr) -> Option<Vec<(Expr, i128)>> {
  let factors = match expr {
    Expr::FunctionCall { name, args } if name == "Times" => args.clone(),
    Expr::FunctionCall { name, .. } if name == "Power" => vec![expr.clone()],
    _ => return None,
  };
  factors
    .iter()
    .map(|f| {
      let (b, e) = f.as_power();
      let n = e.as_num()?.as_integer()?;
      (n != 0 && !b.is_number()).then(|| (b.clone(), n))
    })
    .collect()
}

fn substitute_monomials(
  expr: &Expr,
  pattern: &[(Expr, i128)],
  to: &Expr,
) -> Expr {
  match expr {
    Expr::FunctionCall { name, args } if name == "Plus" => plus(
      args
        .iter()
        .map(|t| substitute_monomials(t, pattern, to))
        .collect(),
    ),
    Expr::Equation { lhs, rhs } => Expr::equation(
      substitute_monomials(lhs, pattern, to),
      substitute_monomials(rhs, pattern, to),
    ),
    _ => {
      let (coeff, rest) = split_coefficient(expr);
      let factors: Vec<Expr> = match &rest {
        Expr::FunctionCall { name, args } if name == "Times" => args.clone(),
        Expr::Integer(1) => Vec::new(),
        other => vec![other.clone()],
      };
      // recurse into function arguments first
      let factors: Vec<Expr> = factors
        .iter()
        .map(|f| {
          let (b, e) = f.as_power();
          let b = if b.is_head("Plus") || b.is_builtin() || b.is_head("Times")
          {
            map_children(b, &mut |c| {
              substitute_monomials(&expand(c), pattern, to)
            })
          } else {
            b.clone()
          };
          let e = if e.is_number() {
            e
          } else {
            substitute_monomials(&expand(&e), pattern, to)
          };
          power(b, e)
        })
        .collect();
      let exponent_of = |base: &Expr| -> i128 {
        factors
          .iter()
          .filter_map(|f| {
            let (b, e) = f.as_power();
            (b == base).then(|| e.as_num().and_then(|n| n.as_integer()))?
          })
          .sum()
      };
      let multiplicity = pattern
        .iter()
        .map(|(b, e)| {
          let have = exponent_of(b);
          if have.signum() == e.signum() { have / e } else { 0 }
        })
        .min()
        .unwrap_or(0);
      let mut out = vec![coeff.to_expr()];
      out.extend(factors);
      if multiplicity > 0 {
        for (b, e) in pattern {
          out.push(power(b.clone(), Expr::Integer(-e * multiplicity)));
        }
        out.push(power(to.clone(), Expr::Integer(multiplicity)));
      }
      times(out)
    }
  }
}

/// Sorts and deduplicates a list of expressions canonically.
pub fn canonical_set(mut items: Vec<Expr>) -> Vec<Expr> {
  items.sort_by(canonical_cmp);
  items.dedup();
  items
}

/// `-expr`, simplified.
pub fn negate(expr: &Expr) -> Expr {
  simplify(&neg(expr.clone()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::functions::arithmetic::{div, exp};

  fn x() -> Expr {
    Expr::symbol("x")
  }
  fn y() -> Expr {
    Expr::apply("y", x())
  }

  #[test]
  fn expand_binomial_square() {
    let sq = power(plus(vec![x(), Expr::Integer(1)]), Expr::Integer(2));
    let expected = plus(vec![
      power(x(), Expr::Integer(2)),
      times(vec![Expr::Integer(2), x()]),
      Expr::Integer(1),
    ]);
    assert_eq!(simplify(&sq), expected);
  }

  #[test]
  fn exponential_cancels_after_distribution() {
    let e = times(vec![
      exp(neg(x())),
      plus(vec![times(vec![x(), exp(x())]), Expr::symbol("C1")]),
    ]);
    let expected =
      plus(vec![x(), times(vec![Expr::symbol("C1"), exp(neg(x()))])]);
    assert_eq!(simplify(&e), expected);
  }

  #[test]
  fn ratio_substitution_only_where_present() {
    let t = Expr::symbol("t");
    let ratio = div(y(), x());
    assert_eq!(substitute(&div(y(), x()), &ratio, &t), t);
    let squared = power(y(), Expr::Integer(2));
    assert_eq!(substitute(&squared, &ratio, &t), squared);
  }

  #[test]
  fn atom_substitution_reaches_inside_derivatives() {
    let d = Expr::derivative(y(), x(), 1);
    let replaced = substitute(&d, &y(), &power(x(), Expr::Integer(2)));
    assert_eq!(replaced, times(vec![Expr::Integer(2), x()]));
  }

  #[test]
  fn common_factors_pulled_from_sums() {
    let t = Expr::symbol("t");
    let sum = plus(vec![x(), times(vec![Expr::Integer(2), t.clone(), x()])]);
    let factored = factor_terms(&sum);
    assert_eq!(
      factored,
      times(vec![
        x(),
        plus(vec![Expr::Integer(1), times(vec![Expr::Integer(2), t])])
      ])
    );
  }

  #[test]
  fn opaque_atoms_in_free_of() {
    assert!(free_of(&y(), &x()));
    assert!(!free_of(&y(), &y()));
    assert!(contains(&y(), &x()));
  }
}
