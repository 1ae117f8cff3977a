//! AST-native Laplace and inverse Laplace transforms.
//!
//! Both directions are linear and table driven. Symbolic parameters are
//! allowed anywhere they are constant with respect to the transform
//! variable.

use crate::TransformError;
use crate::functions::arithmetic::{
  call, div, neg, plus, power, split_coefficient, sqrt, sub, times,
};
use crate::functions::calculus_ast::differentiate;
use crate::functions::polynomial::{
  Fraction, apart, coefficients, linear_parts, rational_parts,
};
use crate::functions::simplify::{independent_of, simplify, substitute};
use crate::syntax::{Expr, Num};

/// The variables of one transform: `time_fn` is `f(t)`, `freq_fn` is `F(s)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformVars {
  pub t: Expr,
  pub s: Expr,
  pub time_fn: Expr,
  pub freq_fn: Expr,
}

/// The placeholder atom for `f^(k)(0)`, rendered `f(0)`, `f'(0)`, ...
pub fn initial_value(time_fn: &Expr, k: usize) -> Expr {
  let name = time_fn.head().unwrap_or("f");
  Expr::FunctionCall {
    name: format!("{}{}", name, "'".repeat(k)),
    args: vec![Expr::Integer(0)],
  }
}

fn factor_list(expr: &Expr) -> Vec<Expr> {
  match expr {
    Expr::FunctionCall { name, args } if name == "Times" => args.clone(),
    Expr::Integer(1) => Vec::new(),
    other => vec![other.clone()],
  }
}

fn terms_of(expr: Expr) -> Vec<Expr> {
  match expr {
    Expr::FunctionCall { name, args } if name == "Plus" => args,
    other => vec![other],
  }
}

fn split_constant(expr: &Expr, var: &Expr) -> (Expr, Vec<Expr>) {
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
  (times(constant), dependent)
}

/// `n!`, or `None` past the exact integer range.
fn factorial(n: usize) -> Option<Expr> {
  (1..=i128::try_from(n).ok()?)
    .try_fold(1i128, |acc, k| acc.checked_mul(k))
    .map(Expr::Integer)
}

fn positive_power_of(factor: &Expr, var: &Expr) -> Option<usize> {
  let (base, exponent) = factor.as_power();
  if base != var {
    return None;
  }
  let n = exponent.as_num().and_then(Num::as_integer)?;
  usize::try_from(n).ok().filter(|n| *n > 0)
}

// ─── Forward ───────────────────────────────────────────────────────────

/// `L{expr}(s)` with respect to `vars.t`.
pub fn laplace_transform(
  expr: &Expr,
  vars: &TransformVars,
) -> Result<Expr, TransformError> {
  let transformed = forward(&simplify(expr), vars)?;
  Ok(simplify(&transformed))
}

fn forward(expr: &Expr, vars: &TransformVars) -> Result<Expr, TransformError> {
  let terms = terms_of(expr.clone());
  if terms.len() > 1 {
    let parts = terms
      .iter()
      .map(|t| forward(t, vars))
      .collect::<Result<Vec<_>, _>>()?;
    return Ok(plus(parts));
  }
  let (constant, dependent) = split_constant(expr, &vars.t);
  let image = match dependent.as_slice() {
    [] => power(vars.s.clone(), Expr::Integer(-1)),
    [single] => forward_table(single, vars)?,
    many => forward_product(many, vars)?,
  };
  Ok(times(vec![constant, image]))
}

fn unsupported(expr: &Expr) -> TransformError {
  TransformError::Forward(expr.to_string())
}

fn forward_table(
  f: &Expr,
  vars: &TransformVars,
) -> Result<Expr, TransformError> {
  let (t, s) = (&vars.t, &vars.s);
  if f == &vars.time_fn {
    return Ok(vars.freq_fn.clone());
  }
  if let Some(n) = positive_power_of(f, t) {
    let scale = factorial(n).ok_or_else(|| unsupported(f))?;
    return Ok(div(scale, power(s.clone(), Expr::Integer(n as i128 + 1))));
  }
  let Expr::FunctionCall { name, args } = f else {
    return Err(unsupported(f));
  };
  match name.as_str() {
    "Power" if args[0] == Expr::e() => {
      let (alpha, beta) =
        linear_parts(&args[1], t).ok_or_else(|| unsupported(f))?;
      Ok(div(
        power(Expr::e(), beta),
        sub(s.clone(), alpha),
      ))
    }
    "Sin" | "Cos" | "Sinh" | "Cosh" => {
      let (b, phase) = linear_parts(&args[0], t).ok_or_else(|| unsupported(f))?;
      if !phase.is_zero() {
        return Err(unsupported(f));
      }
      let b2 = power(b.clone(), Expr::Integer(2));
      let s2 = power(s.clone(), Expr::Integer(2));
      let denom = match name.as_str() {
        "Sin" | "Cos" => plus(vec![s2, b2]),
        _ => sub(s2, b2),
      };
      let numer = match name.as_str() {
        "Sin" | "Sinh" => b,
        _ => s.clone(),
      };
      Ok(div(numer, denom))
    }
    "Derivative" if args[0] == vars.time_fn && args[1] == *t => {
      let n = f.derivative_order().ok_or_else(|| unsupported(f))?;
      let mut terms = vec![times(vec![
        power(s.clone(), Expr::Integer(n as i128)),
        vars.freq_fn.clone(),
      ])];
      for k in 0..n {
        terms.push(neg(times(vec![
          power(s.clone(), Expr::Integer((n - 1 - k) as i128)),
          initial_value(&vars.time_fn, k),
        ])));
      }
      Ok(plus(terms))
    }
    "DiracDelta" if args.len() == 1 && args[0] == *t => Ok(Expr::Integer(1)),
    _ => Err(unsupported(f)),
  }
}

/// `L{e^(at) g} = G(s - a)` and `L{t^n g} = (-1)^n G^(n)(s)`.
fn forward_product(
  factors: &[Expr],
  vars: &TransformVars,
) -> Result<Expr, TransformError> {
  let (t, s) = (&vars.t, &vars.s);
  let rest_without = |i: usize| -> Expr {
    times(
      factors
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(_, f)| f.clone())
        .collect(),
    )
  };
  let exponential = factors.iter().enumerate().find_map(|(i, f)| {
    let (base, exponent) = f.as_power();
    (*base == Expr::e())
      .then(|| linear_parts(&exponent, t))
      .flatten()
      .map(|parts| (i, parts))
  });
  if let Some((i, (alpha, beta))) = exponential {
    let image = forward(&rest_without(i), vars)?;
    let shifted = substitute(&image, s, &sub(s.clone(), alpha));
    return Ok(times(vec![power(Expr::e(), beta), shifted]));
  }
  let monomial = factors
    .iter()
    .enumerate()
    .find_map(|(i, f)| positive_power_of(f, t).map(|n| (i, n)));
  if let Some((i, n)) = monomial {
    if factorial(n).is_none() {
      return Err(unsupported(&factors[i]));
    }
    let mut image = forward(&rest_without(i), vars)?;
    for _ in 0..n {
      image = neg(differentiate(&image, s)?);
    }
    return Ok(image);
  }
  Err(unsupported(&times(factors.to_vec())))
}

// ─── Inverse ───────────────────────────────────────────────────────────

/// `L^-1{expr}(t)` with respect to `vars.s`.
pub fn inverse_laplace_transform(
  expr: &Expr,
  vars: &TransformVars,
) -> Result<Expr, TransformError> {
  let expanded = simplify(expr);
  let parts = terms_of(expanded)
    .iter()
    .map(|term| inverse_term(term, vars))
    .collect::<Result<Vec<_>, _>>()?;
  Ok(simplify(&plus(parts)))
}

fn no_inverse(expr: &Expr) -> TransformError {
  TransformError::Inverse(expr.to_string())
}

fn inverse_term(
  term: &Expr,
  vars: &TransformVars,
) -> Result<Expr, TransformError> {
  let (constant, dependent) = split_constant(term, &vars.s);
  let original = match dependent.as_slice() {
    [] => call("DiracDelta", vec![vars.t.clone()]),
    [single] if *single == vars.freq_fn => vars.time_fn.clone(),
    factors => inverse_rational(&times(factors.to_vec()), vars)
      .or_else(|| inverse_table(factors, vars))
      .ok_or_else(|| no_inverse(term))?,
  };
  Ok(times(vec![constant, original]))
}

/// `s^m / b^n` with `b` linear or quadratic in `s`.
fn inverse_table(factors: &[Expr], vars: &TransformVars) -> Option<Expr> {
  let (t, s) = (&vars.t, &vars.s);
  let mut m = 0usize;
  let mut denominator: Option<(Expr, usize)> = None;
  for factor in factors {
    if let Some(k) = positive_power_of(factor, s) {
      m += k;
      continue;
    }
    let (base, exponent) = factor.as_power();
    let n = exponent.as_num().and_then(Num::as_integer)?;
    if n >= 0 || denominator.is_some() {
      return None;
    }
    denominator = Some((base.clone(), usize::try_from(-n).ok()?));
  }
  let (base, n) = denominator?;
  let coeffs = coefficients(&base, s)?;
  match coeffs.as_slice() {
    [beta, alpha] if m == 0 => {
      // 1/(alpha s + beta)^n = t^(n-1) e^(r t) / ((n-1)! alpha^n)
      let root = neg(div(beta.clone(), alpha.clone()));
      Some(div(
        times(vec![
          power(t.clone(), Expr::Integer(n as i128 - 1)),
          power(Expr::e(), times(vec![root, t.clone()])),
        ]),
        times(vec![
          factorial(n - 1)?,
          power(alpha.clone(), Expr::Integer(n as i128)),
        ]),
      ))
    }
    [c, b, a] if n <= 2 && m <= n => inverse_quadratic(m, n, a, b, c, t),
    _ => None,
  }
}

/// `s^m / (a s^2 + b s + c)^n` for `n` of 1 or 2 and `m <= n`, by
/// completing the square to `a ((s - h)^2 + k2)`.
fn inverse_quadratic(
  m: usize,
  n: usize,
  a: &Expr,
  b: &Expr,
  c: &Expr,
  t: &Expr,
) -> Option<Expr> {
  let h = simplify(&neg(div(
    b.clone(),
    times(vec![Expr::Integer(2), a.clone()]),
  )));
  let k2 = simplify(&sub(
    div(c.clone(), a.clone()),
    power(h.clone(), Expr::Integer(2)),
  ));
  let (p0, p1) = shifted_pair(n, &k2, t)?;
  let envelope = power(Expr::e(), times(vec![h.clone(), t.clone()]));
  let scale = power(a.clone(), Expr::Integer(-(n as i128)));
  // s = u + h
  let body = match m {
    0 => p0,
    1 => plus(vec![p1, times(vec![h, p0])]),
    2 if n == 2 => {
      // u^2/(u^2 + k2)^2 = 1/(u^2 + k2) - k2/(u^2 + k2)^2
      let (q0, _) = shifted_pair(1, &k2, t)?;
      let p2 = sub(q0, times(vec![k2.clone(), p0.clone()]));
      plus(vec![
        p2,
        times(vec![Expr::Integer(2), h.clone(), p1]),
        times(vec![power(h, Expr::Integer(2)), p0]),
      ])
    }
    _ => return None,
  };
  Some(times(vec![scale, envelope, body]))
}

/// Originals of `1/(u^2 + k2)^n` and `u/(u^2 + k2)^n`. A negative `k2`
/// gives the hyperbolic pair.
fn shifted_pair(n: usize, k2: &Expr, t: &Expr) -> Option<(Expr, Expr)> {
  let power_of_t = |k: i128| power(t.clone(), Expr::Integer(k));
  if k2.is_zero() {
    // repeated real root
    return match n {
      1 => Some((t.clone(), Expr::Integer(1))),
      2 => Some((
        times(vec![Expr::Rational(1, 6), power_of_t(3)]),
        times(vec![Expr::Rational(1, 2), power_of_t(2)]),
      )),
      _ => None,
    };
  }
  let hyperbolic = split_coefficient(k2).0.is_negative();
  let k = if hyperbolic {
    sqrt(neg(k2.clone()))
  } else {
    sqrt(k2.clone())
  };
  let kt = times(vec![k.clone(), t.clone()]);
  let (odd, even) = if hyperbolic {
    (call("Sinh", vec![kt.clone()]), call("Cosh", vec![kt.clone()]))
  } else {
    (call("Sin", vec![kt.clone()]), call("Cos", vec![kt.clone()]))
  };
  match n {
    1 => Some((div(odd, k), even)),
    2 => {
      let kt_even = times(vec![kt, even]);
      let numer = if hyperbolic {
        sub(kt_even, odd.clone())
      } else {
        sub(odd.clone(), kt_even)
      };
      let two = Expr::Integer(2);
      Some((
        div(
          numer,
          times(vec![two.clone(), power(k.clone(), Expr::Integer(3))]),
        ),
        div(times(vec![t.clone(), odd]), times(vec![two, k])),
      ))
    }
    _ => None,
  }
}

/// Partial fractions over the rationals for numeric rational functions.
fn inverse_rational(f: &Expr, vars: &TransformVars) -> Option<Expr> {
  let (numer, denom) = rational_parts(f, &vars.s)?;
  if denom.degree() == 0 {
    return None;
  }
  let pieces = apart(&numer, &denom)?;
  let t = &vars.t;
  let parts: Option<Vec<Expr>> = pieces
    .iter()
    .map(|piece| match piece {
      Fraction::Polynomial(poly) if poly.degree() == 0 => Some(times(vec![
        poly.coeff(0).to_expr(),
        call("DiracDelta", vec![t.clone()]),
      ])),
      Fraction::Polynomial(_) => None,
      Fraction::Linear { root, power: k, coeff } => Some(div(
        times(vec![
          coeff.to_expr(),
          power(t.clone(), Expr::Integer(*k as i128 - 1)),
          power(Expr::e(), times(vec![root.to_expr(), t.clone()])),
        ]),
        factorial(k - 1)?,
      )),
      Fraction::Quadratic { p, q, b, c } => {
        let one = Expr::Integer(1);
        let (p, q) = (p.to_expr(), q.to_expr());
        let with_s = inverse_quadratic(1, 1, &one, &p, &q, t)?;
        let without = inverse_quadratic(0, 1, &one, &p, &q, t)?;
        Some(plus(vec![
          times(vec![b.to_expr(), with_s]),
          times(vec![c.to_expr(), without]),
        ]))
      }
    })
    .collect();
  parts.map(plus)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::functions::arithmetic::exp;

  fn vars() -> TransformVars {
    let t = Expr::symbol("t");
    let s = Expr::symbol("s");
    TransformVars {
      time_fn: Expr::apply("f", t.clone()),
      freq_fn: Expr::apply("F", s.clone()),
      t,
      s,
    }
  }

  fn t() -> Expr {
    Expr::symbol("t")
  }
  fn s() -> Expr {
    Expr::symbol("s")
  }

  #[test]
  fn decaying_exponential() {
    let f = exp(times(vec![Expr::Integer(-2), t()]));
    let image = laplace_transform(&f, &vars()).unwrap();
    assert_eq!(
      image,
      power(plus(vec![s(), Expr::Integer(2)]), Expr::Integer(-1))
    );
    assert_eq!(inverse_laplace_transform(&image, &vars()).unwrap(), f);
  }

  #[test]
  fn symbolic_rate_round_trip() {
    let f = exp(neg(times(vec![Expr::symbol("a"), t()])));
    let image = laplace_transform(&f, &vars()).unwrap();
    assert_eq!(inverse_laplace_transform(&image, &vars()).unwrap(), f);
  }

  #[test]
  fn factorial_stops_at_the_integer_range() {
    assert_eq!(factorial(0), Some(Expr::Integer(1)));
    assert_eq!(factorial(5), Some(Expr::Integer(120)));
    assert!(factorial(33).is_some());
    assert!(factorial(34).is_none());
    let f = power(t(), Expr::Integer(40));
    assert!(laplace_transform(&f, &vars()).is_err());
  }

  #[test]
  fn hyperbolic_sine_inverts_to_itself() {
    let a = Expr::symbol("a");
    let f = call("Sinh", vec![times(vec![a, t()])]);
    let image = laplace_transform(&f, &vars()).unwrap();
    assert_eq!(inverse_laplace_transform(&image, &vars()).unwrap(), f);
  }

  #[test]
  fn derivative_rule_uses_initial_values() {
    let v = vars();
    let d = Expr::derivative(v.time_fn.clone(), t(), 2);
    let image = laplace_transform(&d, &v).unwrap();
    let expected = plus(vec![
      times(vec![power(s(), Expr::Integer(2)), v.freq_fn.clone()]),
      neg(times(vec![s(), initial_value(&v.time_fn, 0)])),
      neg(initial_value(&v.time_fn, 1)),
    ]);
    assert_eq!(image, expected);
    assert_eq!(initial_value(&v.time_fn, 1).to_string(), "f'(0)");
  }

  #[test]
  fn frequency_shift_of_sine() {
    let f = times(vec![
      exp(t()),
      call("Sin", vec![times(vec![Expr::Integer(2), t()])]),
    ]);
    let image = laplace_transform(&f, &vars()).unwrap();
    assert_eq!(inverse_laplace_transform(&image, &vars()).unwrap(), f);
  }

  #[test]
  fn monomial_times_exponential() {
    let f = times(vec![t(), exp(neg(t()))]);
    let image = laplace_transform(&f, &vars()).unwrap();
    assert_eq!(
      image,
      power(plus(vec![s(), Expr::Integer(1)]), Expr::Integer(-2))
    );
    assert_eq!(inverse_laplace_transform(&image, &vars()).unwrap(), f);
  }

  #[test]
  fn symbolic_cosine_completes_the_square() {
    let w = Expr::symbol("w");
    let f = call("Cos", vec![times(vec![w, t()])]);
    let image = laplace_transform(&f, &vars()).unwrap();
    assert_eq!(inverse_laplace_transform(&image, &vars()).unwrap(), f);
  }

  #[test]
  fn partial_fractions_inverse() {
    // 1/((s+1)(s+2)) -> e^-t - e^-2t
    let image = power(
      plus(vec![
        power(s(), Expr::Integer(2)),
        times(vec![Expr::Integer(3), s()]),
        Expr::Integer(2),
      ]),
      Expr::Integer(-1),
    );
    let back = inverse_laplace_transform(&image, &vars()).unwrap();
    assert_eq!(
      back,
      sub(exp(neg(t())), exp(times(vec![Expr::Integer(-2), t()])))
    );
  }

  #[test]
  fn products_of_trig_are_rejected() {
    let f = times(vec![call("Sin", vec![t()]), call("Cos", vec![t()])]);
    assert!(matches!(
      laplace_transform(&f, &vars()),
      Err(TransformError::Forward(_))
    ));
  }
}
