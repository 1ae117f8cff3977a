//! Canonical constructors for sums, products, powers and elementary
//! functions.
//!
//! Every routine that builds an expression goes through these helpers, so
//! two mathematically-identical expressions built along different paths
//! compare equal with `==` as long as they reach the same canonical form.
//! Sums and products are flat and sorted by [`canonical_cmp`], numbers are
//! folded exactly, like terms/factors are collected, and `exp(u)` is stored
//! as `Power[E, u]`.

use std::cmp::Ordering;

use crate::syntax::{Expr, Num};

// ─── Ordering ──────────────────────────────────────────────────────────

fn rank(expr: &Expr) -> u8 {
  match expr {
    Expr::Integer(_) | Expr::Rational(_, _) | Expr::Real(_) => 0,
    Expr::Constant(_) => 1,
    Expr::Identifier(_) => 2,
    Expr::FunctionCall { .. } => 3,
    Expr::Equation { .. } => 4,
  }
}

/// Deterministic total order used to sort arguments of `Plus` and `Times`.
pub fn canonical_cmp(a: &Expr, b: &Expr) -> Ordering {
  let by_rank = rank(a).cmp(&rank(b));
  if by_rank != Ordering::Equal {
    return by_rank;
  }
  match (a, b) {
    (Expr::Constant(x), Expr::Constant(y))
    | (Expr::Identifier(x), Expr::Identifier(y)) => x.cmp(y),
    (
      Expr::FunctionCall { name: n1, args: a1 },
      Expr::FunctionCall { name: n2, args: a2 },
    ) => n1.cmp(n2).then_with(|| {
      for (x, y) in a1.iter().zip(a2.iter()) {
        let c = canonical_cmp(x, y);
        if c != Ordering::Equal {
          return c;
        }
      }
      a1.len().cmp(&a2.len())
    }),
    (
      Expr::Equation { lhs: l1, rhs: r1 },
      Expr::Equation { lhs: l2, rhs: r2 },
    ) => canonical_cmp(l1, l2).then_with(|| canonical_cmp(r1, r2)),
    _ => match (a.as_num(), b.as_num()) {
      (Some(x), Some(y)) => x
        .to_f64()
        .partial_cmp(&y.to_f64())
        .unwrap_or(Ordering::Equal)
        .then_with(|| x.is_exact().cmp(&y.is_exact())),
      _ => Ordering::Equal,
    },
  }
}

// ─── Coefficients ──────────────────────────────────────────────────────

/// Splits a term into its numeric coefficient and the remaining factors.
pub fn split_coefficient(term: &Expr) -> (Num, Expr) {
  if let Some(n) = term.as_num() {
    return (n, Expr::Integer(1));
  }
  if let Expr::FunctionCall { name, args } = term
    && name == "Times"
    && let Some(n) = args.first().and_then(Expr::as_num)
  {
    let rest = &args[1..];
    let rest = if rest.len() == 1 {
      rest[0].clone()
    } else {
      Expr::FunctionCall {
        name: "Times".to_string(),
        args: rest.to_vec(),
      }
    };
    return (n, rest);
  }
  (Num::int(1), term.clone())
}

/// Rebuilds `coeff * rest` for an already-canonical `rest`.
fn scale(coeff: Num, rest: Expr) -> Expr {
  if coeff.is_one() {
    return rest;
  }
  match rest {
    Expr::FunctionCall { name, args } if name == "Times" => {
      let mut all = vec![coeff.to_expr()];
      all.extend(args);
      Expr::FunctionCall { name, args: all }
    }
    Expr::Integer(1) => coeff.to_expr(),
    other => Expr::FunctionCall {
      name: "Times".to_string(),
      args: vec![coeff.to_expr(), other],
    },
  }
}

fn flatten_into(head: &str, items: Vec<Expr>, out: &mut Vec<Expr>) {
  for item in items {
    match item {
      Expr::FunctionCall { name, args } if name == head => {
        flatten_into(head, args, out)
      }
      other => out.push(other),
    }
  }
}

// ─── Plus ──────────────────────────────────────────────────────────────

pub fn plus(terms: Vec<Expr>) -> Expr {
  let mut flat = Vec::new();
  flatten_into("Plus", terms, &mut flat);

  let mut constant = Num::int(0);
  let mut groups: Vec<(Num, Expr)> = Vec::new();
  for term in flat {
    if let Some(n) = term.as_num() {
      constant = constant + n;
      continue;
    }
    let (coeff, rest) = split_coefficient(&term);
    match groups.iter_mut().find(|(_, r)| *r == rest) {
      Some((c, _)) => *c = *c + coeff,
      None => groups.push((coeff, rest)),
    }
  }

  let mut out: Vec<Expr> = groups
    .into_iter()
    .filter(|(c, _)| !c.is_zero())
    .map(|(c, r)| scale(c, r))
    .collect();
  out.sort_by(|a, b| {
    canonical_cmp(&split_coefficient(a).1, &split_coefficient(b).1)
      .then_with(|| canonical_cmp(a, b))
  });
  if !constant.is_zero() {
    out.insert(0, constant.to_expr());
  }

  match out.len() {
    0 => Expr::Integer(0),
    1 => out.remove(0),
    _ => Expr::FunctionCall {
      name: "Plus".to_string(),
      args: out,
    },
  }
}

pub fn neg(expr: Expr) -> Expr {
  times(vec![Expr::Integer(-1), expr])
}

pub fn sub(a: Expr, b: Expr) -> Expr {
  plus(vec![a, neg(b)])
}

// ─── Times ─────────────────────────────────────────────────────────────

pub fn times(factors: Vec<Expr>) -> Expr {
  let mut flat = Vec::new();
  flatten_into("Times", factors, &mut flat);

  let mut coefficient = Num::int(1);
  let mut groups: Vec<(Expr, Vec<Expr>)> = Vec::new();
  for factor in flat {
    if let Some(n) = factor.as_num() {
      coefficient = coefficient * n;
      continue;
    }
    let (base, exponent) = factor.as_power();
    let base = base.clone();
    match groups.iter_mut().find(|(b, _)| *b == base) {
      Some((_, exps)) => exps.push(exponent),
      None => groups.push((base, vec![exponent])),
    }
  }
  if coefficient.is_zero() {
    return Expr::Integer(0);
  }

  let mut rest = Vec::new();
  let mut regroup = false;
  for (base, mut exps) in groups {
    let exponent = if exps.len() == 1 {
      exps.remove(0)
    } else {
      plus(exps)
    };
    match power(base, exponent) {
      p if p.as_num().is_some() => {
        if let Some(n) = p.as_num() {
          coefficient = coefficient * n;
        }
      }
      Expr::FunctionCall { name, args } if name == "Times" => {
        regroup = true;
        rest.extend(args);
      }
      other => rest.push(other),
    }
  }
  if regroup {
    rest.push(coefficient.to_expr());
    return times(rest);
  }
  if coefficient.is_zero() {
    return Expr::Integer(0);
  }

  rest.sort_by(canonical_cmp);
  if rest.is_empty() {
    return coefficient.to_expr();
  }
  let product = if rest.len() == 1 {
    rest.remove(0)
  } else {
    Expr::FunctionCall {
      name: "Times".to_string(),
      args: rest,
    }
  };
  scale(coefficient, product)
}

pub fn div(numer: Expr, denom: Expr) -> Expr {
  times(vec![numer, power(denom, Expr::Integer(-1))])
}

// ─── Power ─────────────────────────────────────────────────────────────

fn raw_power(base: Expr, exponent: Expr) -> Expr {
  Expr::FunctionCall {
    name: "Power".to_string(),
    args: vec![base, exponent],
  }
}

/// Exact powers of numbers. Returns `None` when the result has to stay an
/// unevaluated `Power` (irrational roots with nothing to extract).
fn numeric_power(base: Num, exponent: Num) -> Option<Expr> {
  if let Some(n) = exponent.as_integer() {
    return base.pow_i(n).map(Num::to_expr);
  }
  let (p, q) = match exponent {
    Num::Rational(p, q) => (p, q),
    Num::Real(e) => {
      return (!base.is_negative())
        .then(|| Expr::Real(base.to_f64().powf(e)));
    }
  };
  if !base.is_exact() {
    return (!base.is_negative())
      .then(|| Expr::Real(base.to_f64().powf(p as f64 / q as f64)));
  }
  if base.is_zero() {
    return (p > 0).then_some(Expr::Integer(0));
  }
  let q32 = u32::try_from(q).ok()?;
  let whole = base.pow_i(p.div_euclid(q))?;
  let rem = p.rem_euclid(q);
  if let Some(root) = base.exact_root(q32) {
    return Some((whole * root.pow_i(rem)?).to_expr());
  }
  if q == 2 && !base.is_negative() {
    // sqrt(n/d) = sqrt(n*d)/d, then pull square factors out of n*d
    let Num::Rational(n, d) = base else {
      return None;
    };
    let radicand = n.checked_mul(d)?;
    let (outside, inside) = extract_square(radicand);
    let coeff = whole * Num::ratio(outside, d)?;
    if outside == 1 && d == 1 {
      return (!whole.is_one()).then(|| {
        scale(
          whole,
          raw_power(Expr::Integer(inside), Expr::Rational(1, 2)),
        )
      });
    }
    if inside == 1 {
      return Some(coeff.to_expr());
    }
    return Some(scale(
      coeff,
      raw_power(Expr::Integer(inside), Expr::Rational(1, 2)),
    ));
  }
  (!whole.is_one()).then(|| {
    scale(whole, raw_power(base.to_expr(), Expr::Rational(rem, q)))
  })
}

/// Writes `n = outside^2 * inside` with `inside` square-free-ish.
fn extract_square(n: i128) -> (i128, i128) {
  let mut outside = 1i128;
  let mut inside = n;
  let mut k = 2i128;
  while k.saturating_mul(k) <= inside && k < 100_000 {
    while inside % (k * k) == 0 {
      inside /= k * k;
      outside *= k;
    }
    k += 1;
  }
  (outside, inside)
}

fn is_log_term(term: &Expr) -> Option<(Expr, Expr)> {
  if term.is_head("Log") {
    return Some((term.args()[0].clone(), Expr::Integer(1)));
  }
  if let Expr::FunctionCall { name, args } = term
    && name == "Times"
    && args.len() == 2
    && args[0].is_number()
    && args[1].is_head("Log")
  {
    return Some((args[1].args()[0].clone(), args[0].clone()));
  }
  None
}

fn all_terms_negative(args: &[Expr]) -> bool {
  args.iter().all(|t| split_coefficient(t).0.is_negative())
}

pub fn power(base: Expr, exponent: Expr) -> Expr {
  if let Some(e) = exponent.as_num() {
    if e.is_zero() {
      return Expr::Integer(1);
    }
    if e.is_one() {
      return base;
    }
  }
  if let Some(b) = base.as_num() {
    if b.is_one() {
      return Expr::Integer(1);
    }
    if let Some(e) = exponent.as_num() {
      return numeric_power(b, e).unwrap_or_else(|| raw_power(base, exponent));
    }
  }

  let int_exponent = exponent.as_num().and_then(Num::as_integer);

  if base == Expr::e() {
    if exponent.is_head("Log") {
      return exponent.args()[0].clone();
    }
    if let Some((arg, coeff)) = is_log_term(&exponent) {
      return power(arg, coeff);
    }
    if let Expr::FunctionCall { name, args } = &exponent
      && name == "Plus"
      && args.iter().any(|t| is_log_term(t).is_some())
    {
      let mut factors = Vec::new();
      let mut others = Vec::new();
      for term in args {
        match is_log_term(term) {
          Some((arg, coeff)) => factors.push(power(arg, coeff)),
          None => others.push(term.clone()),
        }
      }
      factors.push(power(Expr::e(), plus(others)));
      return times(factors);
    }
  }

  match (&base, int_exponent) {
    (Expr::FunctionCall { name, args }, Some(_)) if name == "Power" => {
      return power(
        args[0].clone(),
        times(vec![args[1].clone(), exponent.clone()]),
      );
    }
    (Expr::FunctionCall { name, args }, Some(_)) if name == "Times" => {
      return times(
        args.iter().map(|f| power(f.clone(), exponent.clone())).collect(),
      );
    }
    (Expr::FunctionCall { name, args }, Some(n))
      if name == "Plus" && all_terms_negative(args) =>
    {
      let flipped = plus(args.iter().cloned().map(neg).collect());
      let sign = if n % 2 == 0 { 1 } else { -1 };
      return times(vec![Expr::Integer(sign), power(flipped, exponent)]);
    }
    _ => {}
  }

  // Symbols are treated as positive, so (x^a)^b = x^(a*b).
  if let Expr::FunctionCall { name, args } = &base
    && name == "Power"
    && matches!(args[0], Expr::Identifier(_) | Expr::Constant(_))
    && exponent.is_number()
  {
    return power(
      args[0].clone(),
      times(vec![args[1].clone(), exponent.clone()]),
    );
  }

  raw_power(base, exponent)
}

pub fn sqrt(expr: Expr) -> Expr {
  power(expr, Expr::Rational(1, 2))
}

pub fn exp(expr: Expr) -> Expr {
  power(Expr::e(), expr)
}

// ─── Elementary functions ──────────────────────────────────────────────

fn raw_call(name: &str, args: Vec<Expr>) -> Expr {
  Expr::FunctionCall {
    name: name.to_string(),
    args,
  }
}

fn is_pi(expr: &Expr) -> bool {
  matches!(expr, Expr::Constant(c) if c == "Pi")
}

/// Applies a built-in function head with its special-value and parity
/// rules. Unknown heads are returned unevaluated.
pub fn call(name: &str, mut args: Vec<Expr>) -> Expr {
  match name {
    "Plus" => return plus(args),
    "Times" => return times(args),
    "Power" if args.len() == 2 => {
      let exponent = args.remove(1);
      return power(args.remove(0), exponent);
    }
    _ => {}
  }
  if args.len() != 1 || !crate::syntax::BUILTIN_HEADS.contains(&name) {
    return raw_call(name, args);
  }
  let arg = args.remove(0);
  let negative = !arg.is_zero() && split_coefficient(&arg).0.is_negative();

  if let Expr::Real(f) = arg {
    let value = match name {
      "Log" if f > 0.0 => Some(f.ln()),
      "Sin" => Some(f.sin()),
      "Cos" => Some(f.cos()),
      "Tan" => Some(f.tan()),
      "Sinh" => Some(f.sinh()),
      "Cosh" => Some(f.cosh()),
      "ArcTan" => Some(f.atan()),
      "ArcSin" if f.abs() <= 1.0 => Some(f.asin()),
      "ArcCos" if f.abs() <= 1.0 => Some(f.acos()),
      _ => None,
    };
    if let Some(v) = value {
      return Expr::Real(v);
    }
  }

  match name {
    "Log" => {
      if arg == Expr::Integer(1) {
        return Expr::Integer(0);
      }
      if arg == Expr::e() {
        return Expr::Integer(1);
      }
      if let Expr::FunctionCall { name: h, args: a } = &arg
        && h == "Power"
        && a[0] == Expr::e()
      {
        return a[1].clone();
      }
      raw_call(name, vec![arg])
    }
    "Sin" | "Tan" | "Sinh" | "ArcTan" | "ArcSin" => {
      if arg.is_zero() || (name == "Sin" && is_pi(&arg)) {
        return Expr::Integer(0);
      }
      if name == "Tan"
        && let Expr::FunctionCall { name: h, args: a } = &arg
        && h == "ArcTan"
      {
        return a[0].clone();
      }
      if negative {
        return neg(call(name, vec![neg(arg)]));
      }
      raw_call(name, vec![arg])
    }
    "Cos" | "Cosh" => {
      if arg.is_zero() {
        return Expr::Integer(1);
      }
      if name == "Cos" && is_pi(&arg) {
        return Expr::Integer(-1);
      }
      if negative {
        return call(name, vec![neg(arg)]);
      }
      raw_call(name, vec![arg])
    }
    "ArcCos" => {
      if arg == Expr::Integer(1) {
        return Expr::Integer(0);
      }
      raw_call(name, vec![arg])
    }
    _ => raw_call(name, vec![arg]),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn x() -> Expr {
    Expr::symbol("x")
  }

  #[test]
  fn like_terms_collect() {
    let sum = plus(vec![x(), times(vec![Expr::Integer(2), x()])]);
    assert_eq!(sum, times(vec![Expr::Integer(3), x()]));
  }

  #[test]
  fn exponentials_merge() {
    let product = times(vec![exp(x()), exp(neg(x()))]);
    assert_eq!(product, Expr::Integer(1));
  }

  #[test]
  fn square_root_extraction() {
    assert_eq!(sqrt(Expr::Integer(16)), Expr::Integer(4));
    let root8 = sqrt(Expr::Integer(8));
    assert_eq!(
      root8,
      times(vec![Expr::Integer(2), sqrt(Expr::Integer(2))])
    );
    let squared = power(sqrt(Expr::Integer(23)), Expr::Integer(2));
    assert_eq!(squared, Expr::Integer(23));
  }

  #[test]
  fn negative_sum_pulls_sign_out() {
    let base = plus(vec![neg(x()), Expr::Integer(-1)]);
    let inverse = power(base, Expr::Integer(-1));
    assert_eq!(
      inverse,
      neg(power(plus(vec![x(), Expr::Integer(1)]), Expr::Integer(-1)))
    );
  }

  #[test]
  fn parity_rules() {
    assert_eq!(call("Cos", vec![neg(x())]), call("Cos", vec![x()]));
    assert_eq!(call("Sin", vec![neg(x())]), neg(call("Sin", vec![x()])));
    assert_eq!(call("Log", vec![exp(x())]), x());
  }
}
