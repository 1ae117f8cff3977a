//! AST-native differentiation and antiderivatives.

use crate::SolveError;
use crate::functions::arithmetic::{
  call, div, neg, plus, power, split_coefficient, sqrt, sub, times,
};
use crate::functions::polynomial::{
  Fraction, apart, coefficients, linear_parts, rational_parts,
};
use crate::functions::simplify::{independent_of, simplify, substitute};
use crate::syntax::{Expr, Num};

// ─── Differentiation ───────────────────────────────────────────────────

/// d/d`var` of `expr`. `var` is usually a symbol; it may also be an atom
/// such as a frozen `y(x)`, in which case everything opaque is constant.
pub fn differentiate(expr: &Expr, var: &Expr) -> Result<Expr, SolveError> {
  if expr == var {
    return Ok(Expr::Integer(1));
  }
  if independent_of(expr, var) {
    return Ok(Expr::Integer(0));
  }
  match expr {
    Expr::Equation { lhs, rhs } => Ok(Expr::equation(
      differentiate(lhs, var)?,
      differentiate(rhs, var)?,
    )),
    Expr::FunctionCall { name, args } => match name.as_str() {
      "Plus" => {
        let terms = args
          .iter()
          .map(|a| differentiate(a, var))
          .collect::<Result<Vec<_>, _>>()?;
        Ok(plus(terms))
      }
      "Times" => {
        let mut terms = Vec::with_capacity(args.len());
        for (i, factor) in args.iter().enumerate() {
          let d = differentiate(factor, var)?;
          if d.is_zero() {
            continue;
          }
          let mut product: Vec<Expr> = args
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, f)| f.clone())
            .collect();
          product.push(d);
          terms.push(times(product));
        }
        Ok(plus(terms))
      }
      "Power" => {
        let (base, exponent) = (&args[0], &args[1]);
        if independent_of(exponent, var) {
          let db = differentiate(base, var)?;
          return Ok(times(vec![
            exponent.clone(),
            power(
              base.clone(),
              plus(vec![exponent.clone(), Expr::Integer(-1)]),
            ),
            db,
          ]));
        }
        let de = differentiate(exponent, var)?;
        if independent_of(base, var) {
          return Ok(times(vec![
            expr.clone(),
            call("Log", vec![base.clone()]),
            de,
          ]));
        }
        let db = differentiate(base, var)?;
        Ok(times(vec![
          expr.clone(),
          plus(vec![
            times(vec![de, call("Log", vec![base.clone()])]),
            times(vec![
              exponent.clone(),
              db,
              power(base.clone(), Expr::Integer(-1)),
            ]),
          ]),
        ]))
      }
      "Log" | "Sin" | "Cos" | "Tan" | "Sinh" | "Cosh" | "ArcTan" | "ArcSin"
      | "ArcCos" => {
        let u = &args[0];
        let du = differentiate(u, var)?;
        let outer = match name.as_str() {
          "Log" => power(u.clone(), Expr::Integer(-1)),
          "Sin" => call("Cos", vec![u.clone()]),
          "Cos" => neg(call("Sin", vec![u.clone()])),
          "Tan" => power(call("Cos", vec![u.clone()]), Expr::Integer(-2)),
          "Sinh" => call("Cosh", vec![u.clone()]),
          "Cosh" => call("Sinh", vec![u.clone()]),
          "ArcTan" => power(
            plus(vec![Expr::Integer(1), power(u.clone(), Expr::Integer(2))]),
            Expr::Integer(-1),
          ),
          "ArcSin" => power(
            sub(Expr::Integer(1), power(u.clone(), Expr::Integer(2))),
            Expr::Rational(-1, 2),
          ),
          _ => neg(power(
            sub(Expr::Integer(1), power(u.clone(), Expr::Integer(2))),
            Expr::Rational(-1, 2),
          )),
        };
        Ok(times(vec![outer, du]))
      }
      "Derivative" => match expr.derivative_order() {
        Some(n) if args[1] == *var => {
          Ok(Expr::derivative(args[0].clone(), var.clone(), n + 1))
        }
        _ => Err(SolveError::NotImplemented(format!(
          "derivative of {} with respect to {}",
          expr, var
        ))),
      },
      _ if args.len() == 1 && args[0] == *var => {
        Ok(Expr::derivative(expr.clone(), var.clone(), 1))
      }
      _ => Err(SolveError::NotImplemented(format!(
        "derivative of {} with respect to {}",
        expr, var
      ))),
    },
    _ => Ok(Expr::Integer(0)),
  }
}

// ─── Integration ───────────────────────────────────────────────────────

const MAX_DEPTH: usize = 6;

/// An antiderivative of `expr` with respect to the symbol `var`, without
/// the constant of integration, or `None` when no rule applies.
pub fn integrate(expr: &Expr, var: &Expr) -> Option<Expr> {
  integrate_depth(&simplify(expr), var, 0).map(|r| simplify(&r))
}

fn integrate_depth(expr: &Expr, var: &Expr, depth: usize) -> Option<Expr> {
  if depth > MAX_DEPTH {
    return None;
  }
  if independent_of(expr, var) {
    return Some(times(vec![expr.clone(), var.clone()]));
  }
  if let Expr::FunctionCall { name, args } = expr
    && name == "Plus"
  {
    let parts: Option<Vec<Expr>> = args
      .iter()
      .map(|t| integrate_depth(t, var, depth))
      .collect();
    return parts.map(plus);
  }
  let (constant, dependent) = split_constant(expr, var);
  let result = table(&dependent, var)
    .or_else(|| rational(&dependent, var))
    .or_else(|| by_parts(&dependent, var, depth))
    .or_else(|| by_substitution(&dependent, var, depth))?;
  Some(times(vec![constant, result]))
}

fn factor_list(expr: &Expr) -> Vec<Expr> {
  match expr {
    Expr::FunctionCall { name, args } if name == "Times" => args.clone(),
    Expr::Integer(1) => Vec::new(),
    other => vec![other.clone()],
  }
}

fn split_constant(expr: &Expr, var: &Expr) -> (Expr, Expr) {
  let (coeff, rest) = split_coefficient(expr);
  let mut constant = vec![coeff.to_expr()];
  let mut dependent = Vec::new();
  for factor in factor_list(&rest) {
    if independent_of(&factor, var) {
      constant.push(factor);
    } else {
      dependent.push(factor);
    }
  }
  (times(constant), times(dependent))
}

/// Standard forms with a linear inner argument.
fn table(f: &Expr, var: &Expr) -> Option<Expr> {
  if f == var {
    return Some(div(power(var.clone(), Expr::Integer(2)), Expr::Integer(2)));
  }
  let Expr::FunctionCall { name, args } = f else {
    return None;
  };
  match name.as_str() {
    "Power" => {
      let (base, exponent) = (&args[0], &args[1]);
      if independent_of(exponent, var) {
        if let Some((alpha, _)) = linear_parts(base, var) {
          if exponent == &Expr::Integer(-1) {
            return Some(div(call("Log", vec![base.clone()]), alpha));
          }
          let raised = plus(vec![exponent.clone(), Expr::Integer(1)]);
          return Some(div(
            power(base.clone(), raised.clone()),
            times(vec![raised, alpha]),
          ));
        }
        if exponent == &Expr::Integer(-1) {
          return inverse_quadratic(base, var);
        }
        if exponent == &Expr::Integer(-2)
          && base.is_head("Cos")
          && let Some((alpha, _)) = linear_parts(&base.args()[0], var)
        {
          return Some(div(call("Tan", vec![base.args()[0].clone()]), alpha));
        }
        return None;
      }
      if independent_of(base, var)
        && let Some((alpha, _)) = linear_parts(exponent, var)
      {
        return Some(div(
          f.clone(),
          times(vec![alpha, call("Log", vec![base.clone()])]),
        ));
      }
      None
    }
    "Sin" | "Cos" | "Tan" | "Sinh" | "Cosh" | "Log" => {
      let u = &args[0];
      let (alpha, _) = linear_parts(u, var)?;
      let antiderivative = match name.as_str() {
        "Sin" => neg(call("Cos", vec![u.clone()])),
        "Cos" => call("Sin", vec![u.clone()]),
        "Tan" => neg(call("Log", vec![call("Cos", vec![u.clone()])])),
        "Sinh" => call("Cosh", vec![u.clone()]),
        "Cosh" => call("Sinh", vec![u.clone()]),
        _ => sub(times(vec![u.clone(), f.clone()]), u.clone()),
      };
      Some(div(antiderivative, alpha))
    }
    "Derivative" => {
      let order = f.derivative_order()?;
      if args[1] != *var || order == 0 {
        return None;
      }
      Some(if order == 1 {
        args[0].clone()
      } else {
        Expr::derivative(args[0].clone(), var.clone(), order - 1)
      })
    }
    _ => None,
  }
}

/// `1/(a v^2 + b v + c)` with a negative discriminant.
fn inverse_quadratic(base: &Expr, var: &Expr) -> Option<Expr> {
  let coeffs = coefficients(base, var)?;
  let [c, b, a] = coeffs.as_slice() else {
    return None;
  };
  let (a, b, c) = (a.as_num()?, b.as_num()?, c.as_num()?);
  let width = Num::int(4) * a * c - b * b;
  if width.is_negative() || width.is_zero() {
    return None;
  }
  let root = sqrt(width.to_expr());
  let inner = div(
    plus(vec![
      times(vec![(Num::int(2) * a).to_expr(), var.clone()]),
      b.to_expr(),
    ]),
    root.clone(),
  );
  Some(times(vec![
    Expr::Integer(2),
    power(root, Expr::Integer(-1)),
    call("ArcTan", vec![inner]),
  ]))
}

fn rational(f: &Expr, var: &Expr) -> Option<Expr> {
  let (numer, denom) = rational_parts(f, var)?;
  if denom.degree() == 0 {
    return None;
  }
  let pieces = apart(&numer, &denom)?;
  let parts: Option<Vec<Expr>> = pieces
    .iter()
    .map(|piece| integrate_fraction(piece, var))
    .collect();
  parts.map(plus)
}

fn integrate_fraction(piece: &Fraction, var: &Expr) -> Option<Expr> {
  match piece {
    Fraction::Polynomial(poly) => Some(plus(
      poly
        .0
        .iter()
        .enumerate()
        .map(|(i, c)| {
          let k = i as i128 + 1;
          Some(times(vec![
            (*c * Num::ratio(1, k)?).to_expr(),
            power(var.clone(), Expr::Integer(k)),
          ]))
        })
        .collect::<Option<Vec<Expr>>>()?,
    )),
    Fraction::Linear { root, power: k, coeff } => {
      let shifted = plus(vec![var.clone(), (-*root).to_expr()]);
      if *k == 1 {
        return Some(times(vec![coeff.to_expr(), call("Log", vec![shifted])]));
      }
      let raised = 1 - *k as i128;
      Some(times(vec![
        coeff.to_expr(),
        Num::ratio(1, raised)?.to_expr(),
        power(shifted, Expr::Integer(raised)),
      ]))
    }
    Fraction::Quadratic { p, q, b, c } => {
      let quad = plus(vec![
        power(var.clone(), Expr::Integer(2)),
        times(vec![p.to_expr(), var.clone()]),
        q.to_expr(),
      ]);
      let half_b = *b * Num::ratio(1, 2)?;
      let log_part =
        times(vec![half_b.to_expr(), call("Log", vec![quad.clone()])]);
      let rest = *c - half_b * *p;
      if rest.is_zero() {
        return Some(log_part);
      }
      let atan = inverse_quadratic(&quad, var)?;
      Some(plus(vec![log_part, times(vec![rest.to_expr(), atan])]))
    }
  }
}

fn is_polynomial_factor(factor: &Expr, var: &Expr) -> bool {
  let (base, exponent) = factor.as_power();
  base == var
    && exponent
      .as_num()
      .and_then(Num::as_integer)
      .is_some_and(|n| n > 0)
}

/// `∫ p*g = p*G - ∫ p'*G` for a monomial `p` in `var`, and
/// `∫ g*log(u) = G*log(u) - ∫ G*u'/u`.
fn by_parts(f: &Expr, var: &Expr, depth: usize) -> Option<Expr> {
  let factors = factor_list(f);
  if factors.len() < 2 {
    return None;
  }
  let (poly, rest): (Vec<Expr>, Vec<Expr>) = factors
    .iter()
    .cloned()
    .partition(|factor| is_polynomial_factor(factor, var));
  if !poly.is_empty() && !rest.is_empty() {
    let p = times(poly);
    let g = times(rest);
    let big_g = integrate_depth(&g, var, depth + 1)?;
    let dp = differentiate(&p, var).ok()?;
    let product = simplify(&times(vec![dp, big_g.clone()]));
    let remainder = integrate_depth(&product, var, depth + 1)?;
    return Some(sub(times(vec![p, big_g]), remainder));
  }
  let log_at = factors.iter().position(|factor| factor.is_head("Log"))?;
  let log = factors[log_at].clone();
  let g: Vec<Expr> = factors
    .iter()
    .enumerate()
    .filter(|(i, _)| *i != log_at)
    .map(|(_, factor)| factor.clone())
    .collect();
  let big_g = integrate_depth(&times(g), var, depth + 1)?;
  let dlog = differentiate(&log, var).ok()?;
  let product = simplify(&times(vec![dlog, big_g.clone()]));
  let remainder = integrate_depth(&product, var, depth + 1)?;
  Some(sub(times(vec![log, big_g]), remainder))
}

fn substitution_candidates(f: &Expr, var: &Expr) -> Vec<Expr> {
  let mut out: Vec<Expr> = Vec::new();
  for factor in factor_list(f) {
    let (base, exponent) = factor.as_power();
    let mut candidates = Vec::new();
    if *base == Expr::e() || independent_of(base, var) {
      candidates.push(exponent.clone());
    } else if base.is_builtin()
      && !base.is_head("Plus")
      && !base.is_head("Times")
    {
      candidates.push(base.args()[0].clone());
      candidates.push(base.clone());
    } else if base != var {
      candidates.push(base.clone());
    }
    for candidate in candidates {
      if candidate != *var
        && !candidate.is_number()
        && !independent_of(&candidate, var)
        && !out.contains(&candidate)
      {
        out.push(candidate);
      }
    }
  }
  out
}

/// Reverse chain rule: finds an inner `u` with `f = g(u) * u'`.
fn by_substitution(f: &Expr, var: &Expr, depth: usize) -> Option<Expr> {
  let fresh = Expr::Identifier(format!("_u{}", depth));
  for u in substitution_candidates(f, var) {
    let Ok(du) = differentiate(&u, var) else {
      continue;
    };
    if du.is_zero() {
      continue;
    }
    let quotient = simplify(&div(f.clone(), du));
    let in_u = simplify(&substitute(&quotient, &u, &fresh));
    if !independent_of(&in_u, var) {
      continue;
    }
    if let Some(big_g) = integrate_depth(&in_u, &fresh, depth + 1) {
      return Some(substitute(&big_g, &fresh, &u));
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::functions::arithmetic::exp;
  use crate::functions::simplify::equivalent;

  fn x() -> Expr {
    Expr::symbol("x")
  }

  fn check_antiderivative(f: Expr) {
    let big_f = integrate(&f, &x())
      .unwrap_or_else(|| panic!("no antiderivative for {}", f));
    let back = differentiate(&big_f, &x()).unwrap();
    assert!(equivalent(&back, &f), "d/dx {} = {} != {}", big_f, back, f);
  }

  #[test]
  fn product_rule_on_applied_function() {
    let y = Expr::apply("y", x());
    let d = differentiate(&times(vec![x(), y.clone()]), &x()).unwrap();
    let expected =
      plus(vec![y.clone(), times(vec![x(), Expr::derivative(y, x(), 1)])]);
    assert_eq!(d, expected);
  }

  #[test]
  fn polynomial_times_exponential_by_parts() {
    check_antiderivative(times(vec![x(), exp(x())]));
    check_antiderivative(times(vec![
      power(x(), Expr::Integer(2)),
      exp(neg(x())),
    ]));
  }

  #[test]
  fn reverse_chain_rule() {
    check_antiderivative(times(vec![x(), exp(power(x(), Expr::Integer(2)))]));
    check_antiderivative(div(
      Expr::Integer(1),
      times(vec![x(), call("Log", vec![x()])]),
    ));
  }

  #[test]
  fn rational_functions() {
    check_antiderivative(power(
      plus(vec![power(x(), Expr::Integer(2)), Expr::Integer(1)]),
      Expr::Integer(-1),
    ));
    check_antiderivative(div(
      Expr::Integer(1),
      plus(vec![
        power(x(), Expr::Integer(2)),
        times(vec![Expr::Integer(3), x()]),
        Expr::Integer(2),
      ]),
    ));
  }

  #[test]
  fn power_rule_with_negative_exponent() {
    let f = power(x(), Expr::Integer(-2));
    assert_eq!(
      integrate(&f, &x()).unwrap(),
      neg(power(x(), Expr::Integer(-1)))
    );
  }
}
