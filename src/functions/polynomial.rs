//! Polynomials: coefficient extraction from expressions, exact univariate
//! arithmetic over the rationals, root finding and partial fractions.

use crate::functions::arithmetic::{
  div, neg, plus, power, split_coefficient, sqrt, times,
};
use crate::functions::simplify::{expand, independent_of};
use crate::syntax::{Expr, Num};

// ─── Coefficients of an expression ─────────────────────────────────────

fn factors_of(rest: &Expr) -> Vec<Expr> {
  match rest {
    Expr::FunctionCall { name, args } if name == "Times" => args.clone(),
    Expr::Integer(1) => Vec::new(),
    other => vec![other.clone()],
  }
}

fn terms_of(expr: &Expr) -> Vec<Expr> {
  match expr {
    Expr::FunctionCall { name, args } if name == "Plus" => args.clone(),
    other => vec![other.clone()],
  }
}

/// Highest degree [`coefficients`] will lay out densely.
pub const MAX_DEGREE: usize = 64;

/// Coefficients `[c0, c1, ...]` of `expr` as a polynomial in `var`, or
/// `None` when some term is not of the form `c * var^k` with `c`
/// independent of `var` and `k` a non-negative integer no larger than
/// [`MAX_DEGREE`].
pub fn coefficients(expr: &Expr, var: &Expr) -> Option<Vec<Expr>> {
  let mut by_degree: Vec<Vec<Expr>> = Vec::new();
  for term in terms_of(&expand(expr)) {
    let (coeff, rest) = split_coefficient(&term);
    let mut degree = 0usize;
    let mut constant = vec![coeff.to_expr()];
    for factor in factors_of(&rest) {
      let (base, exponent) = factor.as_power();
      if base == var {
        let k = exponent.as_num().and_then(Num::as_integer)?;
        degree = degree.checked_add(usize::try_from(k).ok()?)?;
      } else if independent_of(&factor, var) {
        constant.push(factor);
      } else {
        return None;
      }
    }
    if degree > MAX_DEGREE {
      return None;
    }
    if by_degree.len() <= degree {
      by_degree.resize(degree + 1, Vec::new());
    }
    by_degree[degree].push(times(constant));
  }
  let mut coeffs: Vec<Expr> = by_degree.into_iter().map(plus).collect();
  while coeffs.len() > 1 && coeffs.last().is_some_and(Expr::is_zero) {
    coeffs.pop();
  }
  if coeffs.is_empty() {
    coeffs.push(Expr::Integer(0));
  }
  Some(coeffs)
}

/// `(a, b)` with `expr = a*var + b`, `a` nonzero and both independent of
/// `var`.
pub fn linear_parts(expr: &Expr, var: &Expr) -> Option<(Expr, Expr)> {
  let coeffs = coefficients(expr, var)?;
  match coeffs.as_slice() {
    [b, a] => Some((a.clone(), b.clone())),
    _ => None,
  }
}

/// Groups the terms of `expr` by the (numeric, possibly negative or
/// fractional) power of `target` they carry. Each entry is
/// `(exponent, coefficient)` with the coefficient independent of `target`.
pub fn monomial_powers(expr: &Expr, target: &Expr) -> Option<Vec<(Num, Expr)>> {
  let mut groups: Vec<(Num, Vec<Expr>)> = Vec::new();
  for term in terms_of(&expand(expr)) {
    let (coeff, rest) = split_coefficient(&term);
    let mut exponent = Num::int(0);
    let mut constant = vec![coeff.to_expr()];
    for factor in factors_of(&rest) {
      let (base, e) = factor.as_power();
      if base == target {
        exponent = exponent + e.as_num()?;
      } else if independent_of(&factor, target) {
        constant.push(factor);
      } else {
        return None;
      }
    }
    match groups.iter_mut().find(|(e, _)| *e == exponent) {
      Some((_, cs)) => cs.push(times(constant)),
      None => groups.push((exponent, vec![times(constant)])),
    }
  }
  let mut out: Vec<(Num, Expr)> = groups
    .into_iter()
    .map(|(e, cs)| (e, plus(cs)))
    .filter(|(_, c)| !c.is_zero())
    .collect();
  out.sort_by(|a, b| a.0.to_f64().total_cmp(&b.0.to_f64()));
  Some(out)
}

// ─── Univariate polynomials over Num ───────────────────────────────────

/// Dense polynomial, lowest degree first, with no trailing zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct RatPoly(pub Vec<Num>);

impl RatPoly {
  pub fn new(coeffs: Vec<Num>) -> Self {
    let mut coeffs = coeffs;
    while coeffs.last().is_some_and(|c| c.is_zero()) {
      coeffs.pop();
    }
    RatPoly(coeffs)
  }

  pub fn constant(c: Num) -> Self {
    RatPoly::new(vec![c])
  }

  /// `var - root`
  pub fn linear_factor(root: Num) -> Self {
    RatPoly::new(vec![-root, Num::int(1)])
  }

  pub fn from_expr(expr: &Expr, var: &Expr) -> Option<Self> {
    let coeffs = coefficients(expr, var)?;
    let nums: Option<Vec<Num>> = coeffs.iter().map(Expr::as_num).collect();
    Some(RatPoly::new(nums?))
  }

  pub fn is_zero(&self) -> bool {
    self.0.is_empty()
  }

  pub fn degree(&self) -> usize {
    self.0.len().saturating_sub(1)
  }

  pub fn lead(&self) -> Num {
    self.0.last().copied().unwrap_or(Num::int(0))
  }

  pub fn coeff(&self, i: usize) -> Num {
    self.0.get(i).copied().unwrap_or(Num::int(0))
  }

  pub fn is_exact(&self) -> bool {
    self.0.iter().all(|c| c.is_exact())
  }

  pub fn add(&self, other: &RatPoly) -> RatPoly {
    let n = self.0.len().max(other.0.len());
    RatPoly::new((0..n).map(|i| self.coeff(i) + other.coeff(i)).collect())
  }

  pub fn sub(&self, other: &RatPoly) -> RatPoly {
    self.add(&other.scale(Num::int(-1)))
  }

  pub fn scale(&self, c: Num) -> RatPoly {
    RatPoly::new(self.0.iter().map(|a| *a * c).collect())
  }

  pub fn mul(&self, other: &RatPoly) -> RatPoly {
    if self.is_zero() || other.is_zero() {
      return RatPoly::new(Vec::new());
    }
    let mut out = vec![Num::int(0); self.0.len() + other.0.len() - 1];
    for (i, a) in self.0.iter().enumerate() {
      for (j, b) in other.0.iter().enumerate() {
        out[i + j] = out[i + j] + *a * *b;
      }
    }
    RatPoly::new(out)
  }

  pub fn pow(&self, n: usize) -> RatPoly {
    (0..n).fold(RatPoly::constant(Num::int(1)), |acc, _| acc.mul(self))
  }

  /// Euclidean division; `None` for a zero divisor.
  pub fn divrem(&self, divisor: &RatPoly) -> Option<(RatPoly, RatPoly)> {
    if divisor.is_zero() {
      return None;
    }
    let mut rem = self.0.clone();
    let dd = divisor.degree();
    if self.is_zero() || self.degree() < dd {
      return Some((RatPoly::new(Vec::new()), self.clone()));
    }
    let mut quot = vec![Num::int(0); self.degree() - dd + 1];
    let lead = divisor.lead();
    for k in (0..quot.len()).rev() {
      let c = rem[k + dd].checked_div(lead)?;
      quot[k] = c;
      for (j, d) in divisor.0.iter().enumerate() {
        rem[k + j] = rem[k + j] - c * *d;
      }
    }
    rem.truncate(dd);
    Some((RatPoly::new(quot), RatPoly::new(rem)))
  }

  pub fn eval(&self, at: Num) -> Num {
    self.0.iter().rev().fold(Num::int(0), |acc, c| acc * at + *c)
  }

  pub fn derivative(&self) -> RatPoly {
    RatPoly::new(
      self
        .0
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, c)| *c * Num::int(i as i128))
        .collect(),
    )
  }

  pub fn to_expr(&self, var: &Expr) -> Expr {
    plus(
      self
        .0
        .iter()
        .enumerate()
        .map(|(i, c)| {
          times(vec![c.to_expr(), power(var.clone(), Expr::Integer(i as i128))])
        })
        .collect(),
    )
  }

  /// Rational roots with multiplicity, ascending, and the deflated
  /// remainder that has no rational roots left.
  pub fn rational_roots(&self) -> (Vec<(Num, usize)>, RatPoly) {
    let mut rest = self.clone();
    let mut roots: Vec<(Num, usize)> = Vec::new();
    if !rest.is_exact() || rest.is_zero() {
      return (roots, rest);
    }
    let mut zeros = 0;
    while rest.degree() > 0 && rest.coeff(0).is_zero() {
      rest = RatPoly::new(rest.0[1..].to_vec());
      zeros += 1;
    }
    if zeros > 0 {
      roots.push((Num::int(0), zeros));
    }
    if let Some(ints) = integer_coefficients(&rest) {
      let a0 = ints.first().copied().unwrap_or(0);
      let an = ints.last().copied().unwrap_or(1);
      for p in divisors(a0) {
        for q in divisors(an) {
          for sign in [-1, 1] {
            let Some(candidate) = Num::ratio(sign * p, q) else {
              continue;
            };
            let mut multiplicity = 0;
            while rest.degree() > 0 && rest.eval(candidate).is_zero() {
              match rest.divrem(&RatPoly::linear_factor(candidate)) {
                Some((quotient, _)) => rest = quotient,
                None => break,
              }
              multiplicity += 1;
            }
            if multiplicity > 0 {
              roots.push((candidate, multiplicity));
            }
          }
        }
      }
    }
    roots.sort_by(|a, b| a.0.to_f64().total_cmp(&b.0.to_f64()));
    (roots, rest)
  }
}

fn lcm(a: i128, b: i128) -> Option<i128> {
  let g = crate::syntax::gcd(a, b).max(1);
  (a / g).checked_mul(b)
}

fn integer_coefficients(poly: &RatPoly) -> Option<Vec<i128>> {
  let mut scale = 1i128;
  for c in &poly.0 {
    let Num::Rational(_, d) = c else { return None };
    scale = lcm(scale, *d)?;
  }
  poly
    .0
    .iter()
    .map(|c| match c {
      Num::Rational(n, d) => n.checked_mul(scale / d),
      Num::Real(_) => None,
    })
    .collect()
}

/// Positive divisors, skipped for numbers too large to factor by trial.
fn divisors(n: i128) -> Vec<i128> {
  let n = n.abs();
  if n == 0 || n > 10_000_000_000 {
    return Vec::new();
  }
  let mut small = Vec::new();
  let mut large = Vec::new();
  let mut k = 1i128;
  while k * k <= n {
    if n % k == 0 {
      small.push(k);
      if k * k != n {
        large.push(n / k);
      }
    }
    k += 1;
  }
  small.extend(large.into_iter().rev());
  small
}

// ─── Roots ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Root {
  Real(Expr),
  /// The conjugate pair `re ± i*im`, `im > 0`.
  Complex { re: Expr, im: Expr },
}

/// Roots of `a*v^2 + b*v + c`, exact where the coefficients are.
pub fn quadratic_roots(a: Num, b: Num, c: Num) -> Vec<(Root, usize)> {
  let disc = b * b - Num::int(4) * a * c;
  let two_a = Num::int(2) * a;
  let center = (-b).checked_div(two_a).unwrap_or(Num::int(0));
  if disc.is_zero() {
    return vec![(Root::Real(center.to_expr()), 2)];
  }
  let scale = Num::int(1).checked_div(two_a.abs()).unwrap_or(Num::int(0));
  let offset = times(vec![scale.to_expr(), sqrt(disc.abs().to_expr())]);
  if disc.is_negative() {
    return vec![(
      Root::Complex {
        re: center.to_expr(),
        im: offset,
      },
      1,
    )];
  }
  vec![
    (Root::Real(plus(vec![center.to_expr(), neg(offset.clone())])), 1),
    (Root::Real(plus(vec![center.to_expr(), offset])), 1),
  ]
}

/// All roots of a polynomial of which at most a quadratic factor is left
/// after removing rational roots. `None` for higher irreducible remainders.
pub fn roots(poly: &RatPoly) -> Option<Vec<(Root, usize)>> {
  let (rational, rest) = poly.rational_roots();
  let mut out: Vec<(Root, usize)> = rational
    .into_iter()
    .map(|(r, m)| (Root::Real(r.to_expr()), m))
    .collect();
  match rest.degree() {
    0 => {}
    1 => {
      let r = (-rest.coeff(0)).checked_div(rest.coeff(1))?;
      out.push((Root::Real(r.to_expr()), 1));
    }
    2 => out.extend(quadratic_roots(
      rest.coeff(2),
      rest.coeff(1),
      rest.coeff(0),
    )),
    _ => return None,
  }
  Some(out)
}

// ─── Linear systems over Num ───────────────────────────────────────────

/// Solves the square system `matrix * u = rhs` by Gaussian elimination.
pub fn solve_linear(
  mut matrix: Vec<Vec<Num>>,
  mut rhs: Vec<Num>,
) -> Option<Vec<Num>> {
  let n = rhs.len();
  for col in 0..n {
    let pivot = (col..n)
      .filter(|&r| !matrix[r][col].is_zero())
      .max_by(|&a, &b| {
        matrix[a][col]
          .abs()
          .to_f64()
          .total_cmp(&matrix[b][col].abs().to_f64())
      })?;
    matrix.swap(col, pivot);
    rhs.swap(col, pivot);
    for row in 0..n {
      if row == col || matrix[row][col].is_zero() {
        continue;
      }
      let factor = matrix[row][col].checked_div(matrix[col][col])?;
      for k in col..n {
        let v = matrix[col][k];
        matrix[row][k] = matrix[row][k] - factor * v;
      }
      let v = rhs[col];
      rhs[row] = rhs[row] - factor * v;
    }
  }
  (0..n).map(|i| rhs[i].checked_div(matrix[i][i])).collect()
}

// ─── Partial fractions ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Fraction {
  Polynomial(RatPoly),
  /// `coeff / (v - root)^power`
  Linear { root: Num, power: usize, coeff: Num },
  /// `(b*v + c) / (v^2 + p*v + q)`
  Quadratic { p: Num, q: Num, b: Num, c: Num },
}

impl Fraction {
  pub fn to_expr(&self, var: &Expr) -> Expr {
    match self {
      Fraction::Polynomial(poly) => poly.to_expr(var),
      Fraction::Linear { root, power: k, coeff } => div(
        coeff.to_expr(),
        power(
          plus(vec![var.clone(), (-*root).to_expr()]),
          Expr::Integer(*k as i128),
        ),
      ),
      Fraction::Quadratic { p, q, b, c } => div(
        plus(vec![times(vec![b.to_expr(), var.clone()]), c.to_expr()]),
        plus(vec![
          power(var.clone(), Expr::Integer(2)),
          times(vec![p.to_expr(), var.clone()]),
          q.to_expr(),
        ]),
      ),
    }
  }
}

/// Decomposes `numer / denom` over the rationals. The denominator must
/// split into rational linear factors and at most one irreducible quadratic.
pub fn apart(numer: &RatPoly, denom: &RatPoly) -> Option<Vec<Fraction>> {
  if !numer.is_exact() || !denom.is_exact() || denom.is_zero() {
    return None;
  }
  let (quot, rem) = numer.divrem(denom)?;
  let (linear, rest) = denom.rational_roots();
  let quadratic = match rest.degree() {
    0 => None,
    2 => {
      let lead = rest.lead();
      let monic = rest.scale(Num::int(1).checked_div(lead)?);
      Some((monic.coeff(1), monic.coeff(0), monic))
    }
    _ => return None,
  };

  let mut basis: Vec<RatPoly> = Vec::new();
  let mut unknowns: Vec<(Num, usize)> = Vec::new();
  for (root, multiplicity) in &linear {
    for k in 1..=*multiplicity {
      let factor = RatPoly::linear_factor(*root).pow(k);
      basis.push(denom.divrem(&factor)?.0);
      unknowns.push((*root, k));
    }
  }
  if let Some((_, _, monic)) = &quadratic {
    let cofactor = denom.divrem(monic)?.0;
    basis.push(cofactor.mul(&RatPoly::new(vec![Num::int(0), Num::int(1)])));
    basis.push(cofactor);
  }
  let n = denom.degree();
  if basis.len() != n {
    return None;
  }
  let matrix: Vec<Vec<Num>> = (0..n)
    .map(|row| basis.iter().map(|b| b.coeff(row)).collect())
    .collect();
  let rhs: Vec<Num> = (0..n).map(|i| rem.coeff(i)).collect();
  let solution = solve_linear(matrix, rhs)?;

  let mut out = Vec::new();
  if !quot.is_zero() {
    out.push(Fraction::Polynomial(quot));
  }
  for (i, (root, k)) in unknowns.iter().enumerate() {
    if !solution[i].is_zero() {
      out.push(Fraction::Linear {
        root: *root,
        power: *k,
        coeff: solution[i],
      });
    }
  }
  if let Some((p, q, _)) = quadratic {
    let b = solution[unknowns.len()];
    let c = solution[unknowns.len() + 1];
    if !b.is_zero() || !c.is_zero() {
      out.push(Fraction::Quadratic { p, q, b, c });
    }
  }
  Some(out)
}

/// Splits a single term into polynomial numerator and denominator in `var`.
pub fn rational_parts(term: &Expr, var: &Expr) -> Option<(RatPoly, RatPoly)> {
  let (coeff, rest) = split_coefficient(term);
  let mut numer = RatPoly::constant(coeff);
  let mut denom = RatPoly::constant(Num::int(1));
  for factor in factors_of(&rest) {
    let (base, exponent) = factor.as_power();
    let k = exponent.as_num().and_then(Num::as_integer)?;
    let poly = RatPoly::from_expr(base, var)?;
    let magnitude = usize::try_from(k.unsigned_abs()).ok()?;
    if poly.degree().max(1).checked_mul(magnitude)? > MAX_DEGREE {
      return None;
    }
    if k < 0 {
      denom = denom.mul(&poly.pow(magnitude));
    } else {
      numer = numer.mul(&poly.pow(magnitude));
    }
  }
  Some((numer, denom))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ints(cs: &[i128]) -> RatPoly {
    RatPoly::new(cs.iter().map(|c| Num::int(*c)).collect())
  }

  #[test]
  fn rational_roots_with_multiplicity() {
    // (v - 1)^2 (v + 2)
    let p = ints(&[2, -3, 0, 1]);
    let (roots, rest) = p.rational_roots();
    assert_eq!(roots, vec![(Num::int(-2), 1), (Num::int(1), 2)]);
    assert_eq!(rest.degree(), 0);
  }

  #[test]
  fn complex_pair_from_characteristic_polynomial() {
    let p = ints(&[6, -1, 1]);
    let found = roots(&p).unwrap();
    assert_eq!(found.len(), 1);
    let Root::Complex { re, im } = &found[0].0 else {
      panic!("expected a complex pair, got {:?}", found);
    };
    assert_eq!(*re, Expr::Rational(1, 2));
    assert_eq!(
      *im,
      times(vec![Expr::Rational(1, 2), sqrt(Expr::Integer(23))])
    );
  }

  #[test]
  fn partial_fractions_of_distinct_linear_factors() {
    // 1 / ((v + 1)(v + 2)) = 1/(v + 1) - 1/(v + 2)
    let pieces = apart(&ints(&[1]), &ints(&[2, 3, 1])).unwrap();
    assert_eq!(
      pieces,
      vec![
        Fraction::Linear {
          root: Num::int(-2),
          power: 1,
          coeff: Num::int(-1)
        },
        Fraction::Linear {
          root: Num::int(-1),
          power: 1,
          coeff: Num::int(1)
        },
      ]
    );
  }

  #[test]
  fn coefficients_reject_negative_powers() {
    let x = Expr::symbol("x");
    let e = plus(vec![x.clone(), power(x.clone(), Expr::Integer(-1))]);
    assert!(coefficients(&e, &x).is_none());
    let q = plus(vec![power(x.clone(), Expr::Integer(2)), Expr::Integer(3)]);
    assert_eq!(
      coefficients(&q, &x).unwrap(),
      vec![Expr::Integer(3), Expr::Integer(0), Expr::Integer(1)]
    );
  }

  #[test]
  fn coefficients_stop_at_the_degree_bound() {
    let x = Expr::symbol("x");
    let huge = power(x.clone(), Expr::Integer(1_000_000_000_000));
    assert!(coefficients(&huge, &x).is_none());
    let top = power(x.clone(), Expr::Integer(MAX_DEGREE as i128));
    assert_eq!(coefficients(&top, &x).map(|c| c.len()), Some(MAX_DEGREE + 1));
  }
}
