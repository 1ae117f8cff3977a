//! AST-native ODE classification and closed-form solving.
//!
//! An equation is analyzed with respect to an applied function such as
//! `y(x)`. Internally the function and its derivatives are frozen into
//! plain symbols so the algebra routines can treat them as independent
//! unknowns, then thawed back before anything is returned.

use crate::SolveError;
use crate::functions::arithmetic::{
  call, div, neg, plus, power, split_coefficient, sub, times,
};
use crate::functions::calculus_ast::{differentiate, integrate};
use crate::functions::polynomial::{
  RatPoly, Root, coefficients, linear_parts, monomial_powers, roots,
};
use crate::functions::simplify::{
  derivative_atoms, equivalent, expand, factor_terms, free_symbols,
  independent_of, is_zero, map_children, simplify, substitute,
};
use crate::functions::solve_ast::{solve, solve_linear_system};
use crate::syntax::{Expr, Num};

pub const SEPARABLE: &str = "separable";
pub const FIRST_EXACT: &str = "1st_exact";
pub const FIRST_LINEAR: &str = "1st_linear";
pub const BERNOULLI: &str = "Bernoulli";
pub const FIRST_HOMOGENEOUS: &str = "1st_homogeneous_coeff_best";
pub const FIRST_POWER_SERIES: &str = "1st_power_series";
pub const CONSTANT_COEFF_HOMOGENEOUS: &str =
  "nth_linear_constant_coeff_homogeneous";
pub const UNDETERMINED_COEFFICIENTS: &str =
  "nth_linear_constant_coeff_undetermined_coefficients";
pub const SECOND_POWER_SERIES: &str = "2nd_power_series_ordinary";

/// Every hint `dsolve` knows by name, in classification order.
pub const ALL_HINTS: &[&str] = &[
  SEPARABLE,
  FIRST_EXACT,
  FIRST_LINEAR,
  BERNOULLI,
  FIRST_HOMOGENEOUS,
  FIRST_POWER_SERIES,
  CONSTANT_COEFF_HOMOGENEOUS,
  UNDETERMINED_COEFFICIENTS,
  SECOND_POWER_SERIES,
];

/// `y^(order)(at) = value`
#[derive(Debug, Clone, PartialEq)]
pub struct InitialCondition {
  pub order: usize,
  pub at: Expr,
  pub value: Expr,
}

// ─── Analysis ──────────────────────────────────────────────────────────

struct Ode {
  var: Expr,
  func: Expr,
  order: usize,
  /// Residual with the function frozen to `_y` and derivatives to `_d<k>`.
  frozen: Expr,
}

fn frozen_function() -> Expr {
  Expr::symbol("_y")
}

fn frozen_derivative(k: usize) -> Expr {
  Expr::Identifier(format!("_d{}", k))
}

fn residual(eq: &Expr) -> Expr {
  match eq {
    Expr::Equation { lhs, rhs } => sub((**lhs).clone(), (**rhs).clone()),
    other => other.clone(),
  }
}

fn independent_variable(func: &Expr) -> Result<Expr, SolveError> {
  match func {
    Expr::FunctionCall { args, .. }
      if !func.is_builtin()
        && args.len() == 1
        && matches!(args[0], Expr::Identifier(_)) =>
    {
      Ok(args[0].clone())
    }
    _ => Err(SolveError::Internal(format!(
      "{} is not an applied function of one variable",
      func
    ))),
  }
}

/// Highest order of a derivative of `func` in `expr`.
pub fn ode_order(expr: &Expr, func: &Expr) -> usize {
  derivative_atoms(expr)
    .iter()
    .filter(|d| d.args().first() == Some(func))
    .filter_map(Expr::derivative_order)
    .max()
    .unwrap_or(0)
}

impl Ode {
  fn new(eq: &Expr, func: &Expr) -> Result<Self, SolveError> {
    let var = independent_variable(func)?;
    let residual = simplify(&residual(eq));
    let order = ode_order(&residual, func);
    let mut ode = Ode {
      var,
      func: func.clone(),
      order,
      frozen: Expr::Integer(0),
    };
    ode.frozen = simplify(&ode.freeze(&residual));
    Ok(ode)
  }

  fn freeze(&self, expr: &Expr) -> Expr {
    let mut out = expr.clone();
    for k in (1..=self.order).rev() {
      let atom = Expr::derivative(self.func.clone(), self.var.clone(), k);
      out = substitute(&out, &atom, &frozen_derivative(k));
    }
    substitute(&out, &self.func, &frozen_function())
  }

  fn thaw(&self, expr: &Expr) -> Expr {
    let mut out = substitute(expr, &frozen_function(), &self.func);
    for k in 1..=self.order {
      let atom = Expr::derivative(self.func.clone(), self.var.clone(), k);
      out = substitute(&out, &frozen_derivative(k), &atom);
    }
    out
  }

  /// `a*y' + b = 0` with `a`, `b` free of `y'`.
  fn first_order_parts(&self) -> Option<(Expr, Expr)> {
    if self.order != 1 {
      return None;
    }
    let coeffs = coefficients(&self.frozen, &frozen_derivative(1))?;
    match coeffs.as_slice() {
      [b, a] => Some((a.clone(), b.clone())),
      _ => None,
    }
  }

  /// `y' = F(x, y)`
  fn slope(&self) -> Option<Expr> {
    let (a, b) = self.first_order_parts()?;
    Some(simplify(&neg(div(b, a))))
  }

  /// Coefficients `[a0, ..., an]` of `y, y', ..., y^(n)` and the remaining
  /// forcing term, when the equation is linear in the function.
  fn linear_form(&self) -> Option<(Vec<Expr>, Expr)> {
    let symbols: Vec<Expr> = std::iter::once(frozen_function())
      .chain((1..=self.order).map(frozen_derivative))
      .collect();
    let mut coeffs: Vec<Vec<Expr>> = vec![Vec::new(); symbols.len()];
    let mut forcing = Vec::new();
    let terms = match expand(&self.frozen) {
      Expr::FunctionCall { name, args } if name == "Plus" => args,
      other => vec![other],
    };
    for term in terms {
      let (coeff, rest) = split_coefficient(&term);
      let factors = match rest {
        Expr::FunctionCall { name, args } if name == "Times" => args,
        Expr::Integer(1) => Vec::new(),
        other => vec![other],
      };
      let mut slot: Option<usize> = None;
      let mut constant = vec![coeff.to_expr()];
      for factor in factors {
        if let Some(i) = symbols.iter().position(|s| *s == factor) {
          if slot.replace(i).is_some() {
            return None;
          }
        } else if symbols.iter().all(|s| independent_of(&factor, s)) {
          constant.push(factor);
        } else {
          return None;
        }
      }
      match slot {
        Some(i) => coeffs[i].push(times(constant)),
        None => forcing.push(times(constant)),
      }
    }
    Some((coeffs.into_iter().map(plus).collect(), plus(forcing)))
  }

  fn constant_coefficients(&self) -> Option<(RatPoly, Expr)> {
    let (coeffs, forcing) = self.linear_form()?;
    let nums: Option<Vec<Num>> = coeffs.iter().map(Expr::as_num).collect();
    let poly = RatPoly::new(nums?);
    (poly.degree() == self.order).then_some((poly, forcing))
  }

  fn require_first_order(&self, hint: &str) -> Result<Expr, SolveError> {
    self.slope().ok_or_else(|| {
      SolveError::NotApplicable(format!(
        "{} needs a first-order equation of the form a*y' + b = 0",
        hint
      ))
    })
  }

  fn explicit(&self, rhs: Expr) -> Expr {
    Expr::equation(
      self.func.clone(),
      simplify(&absorb_constants(&self.thaw(&rhs))),
    )
  }

  /// Solves `implicit = 0` for the frozen function, falling back to the
  /// implicit relation `lhs = rhs` when it cannot be made explicit.
  fn explicit_or_implicit(&self, lhs: Expr, rhs: Expr) -> Expr {
    let y = frozen_function();
    match solve(&sub(lhs.clone(), rhs.clone()), &y) {
      Ok(branches) if !branches.is_empty() => {
        self.explicit(branches[0].clone())
      }
      _ => Expr::equation(
        simplify(&self.thaw(&lhs)),
        simplify(&absorb_constants(&self.thaw(&rhs))),
      ),
    }
  }
}

fn integration_constant(i: usize) -> Expr {
  Expr::Identifier(format!("C{}", i))
}

fn is_integration_constant(expr: &Expr) -> bool {
  matches!(expr, Expr::Identifier(name)
    if name.len() > 1
      && name.starts_with('C')
      && name[1..].chars().all(|c| c.is_ascii_digit()))
}

/// `exp(c*C1 + u)` becomes `C1*exp(u)`; a bare `exp(c*C1)` becomes `C1`.
pub fn absorb_constants(expr: &Expr) -> Expr {
  let mapped = map_children(expr, &mut |c| absorb_constants(c));
  let Expr::FunctionCall { name, args } = &mapped else {
    return mapped;
  };
  if name != "Power" || args[0] != Expr::e() {
    return mapped;
  }
  let terms = match &args[1] {
    Expr::FunctionCall { name, args } if name == "Plus" => args.clone(),
    other => vec![other.clone()],
  };
  let constant_at = terms
    .iter()
    .position(|t| is_integration_constant(&split_coefficient(t).1));
  match constant_at {
    Some(i) => {
      let constant = split_coefficient(&terms[i]).1;
      let rest: Vec<Expr> = terms
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(_, t)| t.clone())
        .collect();
      times(vec![constant, power(Expr::e(), plus(rest))])
    }
    None => mapped,
  }
}

fn is_regular(expr: &Expr) -> bool {
  match expr {
    Expr::FunctionCall { name, args } => {
      let singular = match name.as_str() {
        "Power" => {
          args[0].is_zero()
            && args[1].as_num().is_some_and(|e| e.is_negative())
        }
        "Log" => args[0].is_zero(),
        _ => false,
      };
      !singular && args.iter().all(is_regular)
    }
    Expr::Real(f) => f.is_finite(),
    _ => true,
  }
}

// ─── Form tests ────────────────────────────────────────────────────────

/// Splits `F(x, y)` into `g(x) * h(y)`.
fn separate(slope: &Expr, x: &Expr, y: &Expr) -> Option<(Expr, Expr)> {
  let f = factor_terms(&simplify(slope));
  if independent_of(&f, y) {
    return Some((f, Expr::Integer(1)));
  }
  if independent_of(&f, x) {
    return Some((Expr::Integer(1), f));
  }
  let (coeff, rest) = split_coefficient(&f);
  let factors = match rest {
    Expr::FunctionCall { ref name, ref args } if name == "Times" => {
      args.clone()
    }
    other => vec![other],
  };
  let mut g = vec![coeff.to_expr()];
  let mut h = Vec::new();
  let mut mixed = false;
  for factor in factors {
    if independent_of(&factor, y) {
      g.push(factor);
    } else if independent_of(&factor, x) {
      h.push(factor);
    } else if let Some((gx, hy)) = split_exponential(&factor, x, y) {
      g.push(gx);
      h.push(hy);
    } else {
      mixed = true;
      break;
    }
  }
  if !mixed {
    return Some((times(g), times(h)));
  }
  separate_by_sampling(slope, x, y)
}

/// `exp(a(x) + b(y))` as `exp(a(x))`, `exp(b(y))`.
fn split_exponential(
  factor: &Expr,
  x: &Expr,
  y: &Expr,
) -> Option<(Expr, Expr)> {
  let (base, exponent) = factor.as_power();
  if *base != Expr::e() {
    return None;
  }
  let terms = match expand(&exponent) {
    Expr::FunctionCall { name, args } if name == "Plus" => args,
    other => vec![other],
  };
  let mut in_x = Vec::new();
  let mut in_y = Vec::new();
  for term in terms {
    if independent_of(&term, y) {
      in_x.push(term);
    } else if independent_of(&term, x) {
      in_y.push(term);
    } else {
      return None;
    }
  }
  Some((
    power(Expr::e(), plus(in_x)),
    power(Expr::e(), plus(in_y)),
  ))
}

/// `F(x, y) F(x0, y0) = F(x, y0) F(x0, y)` holds exactly when `F` is a
/// product of a function of `x` and a function of `y`.
fn separate_by_sampling(
  slope: &Expr,
  x: &Expr,
  y: &Expr,
) -> Option<(Expr, Expr)> {
  const SAMPLES: &[(i128, i128)] = &[(0, 1), (1, 1), (1, 2), (2, 3)];
  for (x0, y0) in SAMPLES {
    let (x0, y0) = (Expr::Integer(*x0), Expr::Integer(*y0));
    let at_y0 = simplify(&substitute(slope, y, &y0));
    let at_x0 = simplify(&substitute(slope, x, &x0));
    let anchor = simplify(&substitute(&at_y0, x, &x0));
    if !is_regular(&at_y0)
      || !is_regular(&at_x0)
      || !is_regular(&anchor)
      || is_zero(&anchor)
    {
      continue;
    }
    let lhs = times(vec![slope.clone(), anchor.clone()]);
    let rhs = times(vec![at_y0.clone(), at_x0.clone()]);
    if !equivalent(&lhs, &rhs) {
      return None;
    }
    return Some((div(at_y0, anchor), at_x0));
  }
  None
}

fn is_exact(a: &Expr, b: &Expr, x: &Expr, y: &Expr) -> bool {
  match (differentiate(b, y), differentiate(a, x)) {
    (Ok(my), Ok(nx)) => equivalent(&my, &nx),
    _ => false,
  }
}

/// `F = p*y + q*y^n`, returning `(p, q, n)` with `n` not 0 or 1.
fn bernoulli_parts(slope: &Expr, y: &Expr) -> Option<(Expr, Expr, Num)> {
  let groups = monomial_powers(slope, y)?;
  let mut p = Expr::Integer(0);
  let mut other: Option<(Expr, Num)> = None;
  for (exponent, coeff) in groups {
    if exponent.is_one() {
      p = coeff;
    } else if exponent.is_zero() || other.is_some() {
      return None;
    } else {
      other = Some((coeff, exponent));
    }
  }
  let (q, n) = other?;
  Some((p, q, n))
}

/// `G(u)` with `F(x, u*x) = G(u)`.
fn homogeneous_reduction(
  slope: &Expr,
  x: &Expr,
  y: &Expr,
  u: &Expr,
) -> Option<Expr> {
  let scaled =
    simplify(&substitute(slope, y, &times(vec![u.clone(), x.clone()])));
  independent_of(&scaled, x).then_some(scaled)
}

fn linear_slope_parts(slope: &Expr, y: &Expr) -> Option<(Expr, Expr)> {
  let coeffs = coefficients(slope, y)?;
  match coeffs.as_slice() {
    [q] => Some((Expr::Integer(0), q.clone())),
    [q, p] => Some((neg(p.clone()), q.clone())),
    _ => None,
  }
}

// ─── Classification ────────────────────────────────────────────────────

/// Applicable hints for `eq` in `func`, most specific first. Empty when the
/// equation has no derivative of `func`.
pub fn classify_ode(eq: &Expr, func: &Expr) -> Result<Vec<String>, SolveError> {
  let ode = Ode::new(eq, func)?;
  let mut tags: Vec<&str> = Vec::new();
  if ode.order == 0 {
    return Ok(Vec::new());
  }
  let y = frozen_function();
  let x = ode.var.clone();

  if let Some((a, b)) = ode.first_order_parts() {
    let slope = simplify(&neg(div(b.clone(), a.clone())));
    if separate(&slope, &x, &y).is_some() {
      tags.push(SEPARABLE);
    }
    if is_exact(&a, &b, &x, &y) {
      tags.push(FIRST_EXACT);
    }
    if linear_slope_parts(&slope, &y).is_some() {
      tags.push(FIRST_LINEAR);
    }
    if bernoulli_parts(&slope, &y).is_some() {
      tags.push(BERNOULLI);
    }
    if !independent_of(&slope, &y)
      && homogeneous_reduction(&slope, &x, &y, &Expr::symbol("_v")).is_some()
    {
      tags.push(FIRST_HOMOGENEOUS);
    }
    if is_regular(&simplify(&substitute(&slope, &x, &Expr::Integer(0)))) {
      tags.push(FIRST_POWER_SERIES);
    }
  }

  if let Some((_, forcing)) = ode.constant_coefficients() {
    if forcing.is_zero() {
      tags.push(CONSTANT_COEFF_HOMOGENEOUS);
    } else if exponential_parts(&neg(forcing), &x).is_some() {
      tags.push(UNDETERMINED_COEFFICIENTS);
    }
  }

  if ode.order == 2
    && let Some((coeffs, forcing)) = ode.linear_form()
    && forcing.is_zero()
    && coeffs.iter().all(|c| coefficients(c, &x).is_some())
    && !is_zero(&substitute(&coeffs[2], &x, &Expr::Integer(0)))
  {
    tags.push(SECOND_POWER_SERIES);
  }

  Ok(tags.into_iter().map(str::to_string).collect())
}

// ─── Solving ───────────────────────────────────────────────────────────

/// Solves `eq` for `func`. With a hint, only that method is attempted;
/// without one, the classified hints are tried in order.
pub fn dsolve(
  eq: &Expr,
  func: &Expr,
  hint: Option<&str>,
) -> Result<Expr, SolveError> {
  let ode = Ode::new(eq, func)?;
  if ode.order == 0 {
    return Err(SolveError::NotApplicable(format!(
      "{} contains no derivative of {}",
      residual(eq),
      func
    )));
  }
  match hint {
    Some(hint) => solve_with_hint(&ode, hint),
    None => {
      let tags = classify_ode(eq, func)?;
      let mut last = None;
      for tag in &tags {
        match solve_with_hint(&ode, tag) {
          Ok(solution) => return Ok(solution),
          Err(e) => last = Some(e),
        }
      }
      Err(match last {
        Some(SolveError::Internal(msg)) => SolveError::Internal(msg),
        _ => SolveError::NotImplemented(format!(
          "no algorithm solves {} = 0 for {}",
          residual(eq),
          func
        )),
      })
    }
  }
}

fn solve_with_hint(ode: &Ode, hint: &str) -> Result<Expr, SolveError> {
  match hint {
    SEPARABLE => solve_separable(ode),
    FIRST_LINEAR => solve_first_linear(ode),
    BERNOULLI => solve_bernoulli(ode),
    FIRST_EXACT => solve_exact(ode),
    FIRST_HOMOGENEOUS => solve_homogeneous_coeff(ode),
    CONSTANT_COEFF_HOMOGENEOUS => solve_constant_coeff(ode, false),
    UNDETERMINED_COEFFICIENTS => solve_constant_coeff(ode, true),
    FIRST_POWER_SERIES | SECOND_POWER_SERIES => Err(
      SolveError::NotImplemented(format!("no series solver for {}", hint)),
    ),
    other => Err(SolveError::NotImplemented(format!("unknown hint {}", other))),
  }
}

fn cannot_integrate(expr: &Expr, var: &Expr) -> SolveError {
  SolveError::NotImplemented(format!("cannot integrate {} in {}", expr, var))
}

fn solve_separable(ode: &Ode) -> Result<Expr, SolveError> {
  let slope = ode.require_first_order(SEPARABLE)?;
  let (x, y) = (ode.var.clone(), frozen_function());
  let (g, h) = separate(&slope, &x, &y).ok_or_else(|| {
    SolveError::NotApplicable(format!("{} does not separate", slope))
  })?;
  if is_zero(&h) {
    return Err(SolveError::NotApplicable("y' = 0 is trivial".to_string()));
  }
  let reciprocal = power(h, Expr::Integer(-1));
  let big_h = integrate(&reciprocal, &y)
    .ok_or_else(|| cannot_integrate(&reciprocal, &y))?;
  let big_g = integrate(&g, &x).ok_or_else(|| cannot_integrate(&g, &x))?;
  Ok(ode.explicit_or_implicit(
    big_h,
    plus(vec![big_g, integration_constant(1)]),
  ))
}

/// `y = exp(-∫p) * (∫ q exp(∫p) + C1)` for `y' + p y = q`.
fn linear_solution(p: &Expr, q: &Expr, x: &Expr) -> Result<Expr, SolveError> {
  let p_int = integrate(p, x).ok_or_else(|| cannot_integrate(p, x))?;
  let mu = simplify(&power(Expr::e(), p_int.clone()));
  let integrand = simplify(&times(vec![q.clone(), mu]));
  let inner = integrate(&integrand, x)
    .ok_or_else(|| cannot_integrate(&integrand, x))?;
  Ok(simplify(&times(vec![
    plus(vec![inner, integration_constant(1)]),
    power(Expr::e(), neg(p_int)),
  ])))
}

fn solve_first_linear(ode: &Ode) -> Result<Expr, SolveError> {
  let slope = ode.require_first_order(FIRST_LINEAR)?;
  let (p, q) = linear_slope_parts(&slope, &frozen_function()).ok_or_else(|| {
    SolveError::NotApplicable(format!("y' = {} is not linear in y", slope))
  })?;
  let solution = linear_solution(&p, &q, &ode.var)?;
  Ok(ode.explicit(solution))
}

fn solve_bernoulli(ode: &Ode) -> Result<Expr, SolveError> {
  let slope = ode.require_first_order(BERNOULLI)?;
  let (p, q, n) = bernoulli_parts(&slope, &frozen_function()).ok_or_else(|| {
    SolveError::NotApplicable(format!("y' = {} is not a Bernoulli form", slope))
  })?;
  // v = y^(1-n) turns y' = p y + q y^n into v' = (1-n) p v + (1-n) q
  let k = (Num::int(1) - n).to_expr();
  let v = linear_solution(
    &neg(times(vec![k.clone(), p])),
    &times(vec![k.clone(), q]),
    &ode.var,
  )?;
  let y = power(v, power(k, Expr::Integer(-1)));
  Ok(ode.explicit(y))
}

fn solve_exact(ode: &Ode) -> Result<Expr, SolveError> {
  let (n, m) = ode.first_order_parts().ok_or_else(|| {
    SolveError::NotApplicable(
      "1st_exact needs a first-order equation".to_string(),
    )
  })?;
  let (x, y) = (ode.var.clone(), frozen_function());
  if !is_exact(&n, &m, &x, &y) {
    return Err(SolveError::NotApplicable(format!(
      "({}) dx + ({}) dy is not exact",
      m, n
    )));
  }
  let from_m = integrate(&m, &x).ok_or_else(|| cannot_integrate(&m, &x))?;
  let remainder = simplify(&sub(n, differentiate(&from_m, &y)?));
  if !independent_of(&remainder, &x) {
    return Err(SolveError::NotApplicable(
      "potential function does not close".to_string(),
    ));
  }
  let from_n = integrate(&remainder, &y)
    .ok_or_else(|| cannot_integrate(&remainder, &y))?;
  let potential = simplify(&plus(vec![from_m, from_n]));
  Ok(ode.explicit_or_implicit(potential, integration_constant(1)))
}

fn solve_homogeneous_coeff(ode: &Ode) -> Result<Expr, SolveError> {
  let slope = ode.require_first_order(FIRST_HOMOGENEOUS)?;
  let (x, y) = (ode.var.clone(), frozen_function());
  let u = Expr::symbol("_v");
  let g = homogeneous_reduction(&slope, &x, &y, &u).ok_or_else(|| {
    SolveError::NotApplicable(format!("{} is not a function of y/x", slope))
  })?;
  // y = u x gives x u' = G(u) - u
  let denom = simplify(&sub(g, u.clone()));
  if is_zero(&denom) {
    return Ok(ode.explicit(times(vec![integration_constant(1), x])));
  }
  let integrand = power(denom, Expr::Integer(-1));
  let big_u = integrate(&integrand, &u)
    .ok_or_else(|| cannot_integrate(&integrand, &u))?;
  let rhs = plus(vec![call("Log", vec![x.clone()]), integration_constant(1)]);
  let ratio = div(y.clone(), x.clone());
  match solve(&sub(big_u.clone(), rhs.clone()), &u) {
    Ok(branches) if !branches.is_empty() => {
      Ok(ode.explicit(times(vec![x, branches[0].clone()])))
    }
    _ => Ok(ode.explicit_or_implicit(
      simplify(&substitute(&big_u, &u, &ratio)),
      rhs,
    )),
  }
}

/// Fundamental solutions for the roots of the characteristic polynomial.
fn fundamental_system(
  poly: &RatPoly,
  x: &Expr,
) -> Result<Vec<Expr>, SolveError> {
  let found = roots(poly).ok_or_else(|| {
    SolveError::NotImplemented(format!(
      "characteristic polynomial {} has no closed-form roots",
      poly.to_expr(&Expr::symbol("r"))
    ))
  })?;
  let mut basis = Vec::new();
  for (root, multiplicity) in found {
    for j in 0..multiplicity {
      let monomial = power(x.clone(), Expr::Integer(j as i128));
      match &root {
        Root::Real(r) => basis.push(times(vec![
          monomial,
          power(Expr::e(), times(vec![r.clone(), x.clone()])),
        ])),
        Root::Complex { re, im } => {
          let envelope = power(Expr::e(), times(vec![re.clone(), x.clone()]));
          let angle = times(vec![im.clone(), x.clone()]);
          basis.push(times(vec![
            monomial.clone(),
            envelope.clone(),
            call("Sin", vec![angle.clone()]),
          ]));
          basis.push(times(vec![monomial, envelope, call("Cos", vec![angle])]));
        }
      }
    }
  }
  Ok(basis)
}

fn solve_constant_coeff(ode: &Ode, forced: bool) -> Result<Expr, SolveError> {
  let hint = if forced {
    UNDETERMINED_COEFFICIENTS
  } else {
    CONSTANT_COEFF_HOMOGENEOUS
  };
  let (poly, forcing) = ode.constant_coefficients().ok_or_else(|| {
    SolveError::NotApplicable(format!(
      "{} needs a linear equation with constant coefficients",
      hint
    ))
  })?;
  if forced == forcing.is_zero() {
    return Err(SolveError::NotApplicable(format!(
      "{} does not match the forcing term {}",
      hint, forcing
    )));
  }
  let x = ode.var.clone();
  let mut terms: Vec<Expr> = fundamental_system(&poly, &x)?
    .into_iter()
    .enumerate()
    .map(|(i, f)| times(vec![integration_constant(i + 1), f]))
    .collect();
  if forced {
    terms.push(particular_solution(&poly, &neg(forcing), &x)?);
  }
  Ok(ode.explicit(plus(terms)))
}

// ─── Undetermined coefficients ─────────────────────────────────────────

/// Writes `rhs` as `Σ p_i(x) * exp(a_i x)` with numeric rates `a_i` and
/// polynomial `p_i` (coefficients lowest degree first).
fn exponential_parts(rhs: &Expr, x: &Expr) -> Option<Vec<(Num, Vec<Expr>)>> {
  let terms = match expand(rhs) {
    Expr::FunctionCall { name, args } if name == "Plus" => args,
    other => vec![other],
  };
  let mut groups: Vec<(Num, Vec<Expr>)> = Vec::new();
  for term in terms {
    let (coeff, rest) = split_coefficient(&term);
    let factors = match rest {
      Expr::FunctionCall { name, args } if name == "Times" => args,
      Expr::Integer(1) => Vec::new(),
      other => vec![other],
    };
    let mut rate = Num::int(0);
    let mut others = vec![coeff.to_expr()];
    for factor in factors {
      let (base, exponent) = factor.as_power();
      if *base == Expr::e() && !independent_of(&exponent, x) {
        let (alpha, beta) = linear_parts(&exponent, x)?;
        rate = rate + alpha.as_num()?;
        others.push(power(Expr::e(), beta));
      } else {
        others.push(factor);
      }
    }
    let poly = coefficients(&times(others), x)?;
    match groups.iter_mut().find(|(r, _)| *r == rate) {
      Some((_, existing)) => {
        let n = existing.len().max(poly.len());
        existing.resize(n, Expr::Integer(0));
        for (i, c) in poly.into_iter().enumerate() {
          existing[i] = plus(vec![existing[i].clone(), c]);
        }
      }
      None => groups.push((rate, poly)),
    }
  }
  Some(groups)
}

fn shift(poly: &RatPoly, a: Num) -> RatPoly {
  let step = RatPoly::new(vec![a, Num::int(1)]);
  poly
    .0
    .iter()
    .enumerate()
    .fold(RatPoly::new(Vec::new()), |acc, (k, c)| {
      acc.add(&step.pow(k).scale(*c))
    })
}

/// Leading terms of the power series of `1 / m(D)`.
fn reciprocal_series(m: &RatPoly, terms: usize) -> Option<Vec<Num>> {
  let m0 = m.coeff(0);
  let mut out: Vec<Num> = Vec::with_capacity(terms);
  for j in 0..terms {
    let acc: Num = (1..=j).map(|i| m.coeff(i) * out[j - i]).sum();
    let numer = if j == 0 { Num::int(1) } else { -acc };
    out.push(numer.checked_div(m0)?);
  }
  Some(out)
}

fn poly_derivative(p: &[Expr]) -> Vec<Expr> {
  p.iter()
    .enumerate()
    .skip(1)
    .map(|(i, c)| times(vec![Expr::Integer(i as i128), c.clone()]))
    .collect()
}

fn poly_integral(p: &[Expr]) -> Vec<Expr> {
  std::iter::once(Expr::Integer(0))
    .chain(
      p.iter()
        .enumerate()
        .map(|(i, c)| div(c.clone(), Expr::Integer(i as i128 + 1))),
    )
    .collect()
}

fn poly_expr(p: &[Expr], x: &Expr) -> Expr {
  plus(
    p.iter()
      .enumerate()
      .map(|(i, c)| {
        times(vec![c.clone(), power(x.clone(), Expr::Integer(i as i128))])
      })
      .collect(),
  )
}

/// Particular solution of `L(D) y = rhs` via
/// `L(D) (e^(ax) q) = e^(ax) L(D + a) q` and the series of `1/L(D + a)`.
fn particular_solution(
  characteristic: &RatPoly,
  rhs: &Expr,
  x: &Expr,
) -> Result<Expr, SolveError> {
  let parts = exponential_parts(rhs, x).ok_or_else(|| {
    SolveError::NotApplicable(format!(
      "{} is not a sum of polynomial-times-exponential terms",
      rhs
    ))
  })?;
  let mut out = Vec::new();
  for (rate, p) in parts {
    let shifted = shift(characteristic, rate);
    let zeros = shifted.0.iter().take_while(|c| c.is_zero()).count();
    let reduced = RatPoly::new(shifted.0[zeros..].to_vec());
    let series = reciprocal_series(&reduced, p.len()).ok_or_else(|| {
      SolveError::Internal("degenerate characteristic polynomial".to_string())
    })?;
    let mut q = vec![Expr::Integer(0); p.len()];
    let mut derivative = p.clone();
    for b in series {
      for (i, c) in derivative.iter().enumerate() {
        q[i] = plus(vec![q[i].clone(), times(vec![b.to_expr(), c.clone()])]);
      }
      derivative = poly_derivative(&derivative);
    }
    for _ in 0..zeros {
      q = poly_integral(&q);
    }
    out.push(times(vec![
      power(Expr::e(), times(vec![rate.to_expr(), x.clone()])),
      poly_expr(&q, x),
    ]));
  }
  Ok(simplify(&plus(out)))
}

// ─── Initial conditions ────────────────────────────────────────────────

/// Integration constants occurring in `expr`, ordered by index.
pub fn integration_constants(expr: &Expr) -> Vec<Expr> {
  let mut found: Vec<(u64, Expr)> = free_symbols(expr)
    .into_iter()
    .map(Expr::Identifier)
    .filter(is_integration_constant)
    .filter_map(|c| {
      let Expr::Identifier(name) = &c else {
        return None;
      };
      name[1..].parse::<u64>().ok().map(|i| (i, c))
    })
    .collect();
  found.sort_by_key(|(i, _)| *i);
  found.into_iter().map(|(_, c)| c).collect()
}

/// Fixes the integration constants of `solution` from the conditions.
pub fn apply_initial_conditions(
  solution: &Expr,
  func: &Expr,
  conditions: &[InitialCondition],
) -> Result<Expr, SolveError> {
  if conditions.is_empty() {
    return Ok(solution.clone());
  }
  let var = independent_variable(func)?;
  let Expr::Equation { lhs, rhs } = solution else {
    return Err(SolveError::Internal(format!(
      "{} is not an equation",
      solution
    )));
  };
  let explicit = **lhs == *func;
  let mut equations = Vec::with_capacity(conditions.len());
  for condition in conditions {
    let equation = if explicit {
      let mut value = (**rhs).clone();
      for _ in 0..condition.order {
        value = differentiate(&value, &var)?;
      }
      sub(substitute(&value, &var, &condition.at), condition.value.clone())
    } else if condition.order == 0 {
      let relation = sub((**lhs).clone(), (**rhs).clone());
      let at_point = substitute(&relation, func, &condition.value);
      substitute(&at_point, &var, &condition.at)
    } else {
      return Err(SolveError::NotImplemented(
        "derivative conditions on an implicit solution".to_string(),
      ));
    };
    equations.push(simplify(&equation));
  }
  let constants = integration_constants(solution);
  let values = match constants.as_slice() {
    [] => return Ok(solution.clone()),
    [single] if equations.len() == 1 => {
      let branches = solve(&equations[0], single)?;
      vec![branches.into_iter().next().ok_or_else(|| {
        SolveError::NotInvertible(format!("no value of {} fits", single))
      })?]
    }
    many => solve_linear_system(&equations, many)?,
  };
  let mut fixed = solution.clone();
  for (constant, value) in constants.iter().zip(values) {
    fixed = substitute(&fixed, constant, &value);
  }
  Ok(simplify(&fixed))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::functions::arithmetic::exp;

  fn x() -> Expr {
    Expr::symbol("x")
  }
  fn y() -> Expr {
    Expr::apply("y", x())
  }
  fn dy(order: usize) -> Expr {
    Expr::derivative(y(), x(), order)
  }

  fn check_solution(eq: &Expr, solution: &Expr) {
    let Expr::Equation { lhs, rhs } = solution else {
      panic!("implicit solution {}", solution);
    };
    assert_eq!(**lhs, y());
    let back = substitute(&residual(eq), &y(), rhs);
    assert!(is_zero(&back), "residual {} for {}", simplify(&back), solution);
  }

  #[test]
  fn classifies_first_order_linear() {
    let eq = plus(vec![dy(1), y(), neg(x())]);
    let tags = classify_ode(&eq, &y()).unwrap();
    assert!(tags.contains(&FIRST_LINEAR.to_string()));
    assert!(!tags.contains(&SEPARABLE.to_string()));
  }

  #[test]
  fn no_tags_without_derivative() {
    let tags = classify_ode(&plus(vec![y(), x()]), &y()).unwrap();
    assert!(tags.is_empty());
  }

  #[test]
  fn integrating_factor_solution() {
    let eq = plus(vec![dy(1), y(), neg(x())]);
    let solution = dsolve(&eq, &y(), Some(FIRST_LINEAR)).unwrap();
    let expected = Expr::equation(
      y(),
      plus(vec![
        x(),
        Expr::Integer(-1),
        times(vec![Expr::symbol("C1"), exp(neg(x()))]),
      ]),
    );
    assert_eq!(solution, expected);
  }

  #[test]
  fn separable_riccati_square() {
    let eq = sub(dy(1), power(y(), Expr::Integer(2)));
    let solution = dsolve(&eq, &y(), Some(SEPARABLE)).unwrap();
    check_solution(&eq, &solution);
  }

  #[test]
  fn exponential_constant_absorbed() {
    let eq = sub(dy(1), y());
    let solution = dsolve(&eq, &y(), Some(SEPARABLE)).unwrap();
    assert_eq!(
      solution,
      Expr::equation(y(), times(vec![Expr::symbol("C1"), exp(x())]))
    );
  }

  #[test]
  fn bernoulli_reduction() {
    // y' = y + x*y^2
    let eq = sub(
      dy(1),
      plus(vec![y(), times(vec![x(), power(y(), Expr::Integer(2))])]),
    );
    let solution = dsolve(&eq, &y(), Some(BERNOULLI)).unwrap();
    check_solution(&eq, &solution);
  }

  #[test]
  fn complex_characteristic_roots() {
    let eq = plus(vec![dy(2), neg(dy(1)), times(vec![Expr::Integer(6), y()])]);
    let solution =
      dsolve(&eq, &y(), Some(CONSTANT_COEFF_HOMOGENEOUS)).unwrap();
    check_solution(&eq, &solution);
    assert_eq!(integration_constants(&solution).len(), 2);
  }

  #[test]
  fn repeated_root_and_polynomial_forcing() {
    // y'' - 2y' + y = x
    let eq = plus(vec![
      dy(2),
      times(vec![Expr::Integer(-2), dy(1)]),
      y(),
      neg(x()),
    ]);
    let solution = dsolve(&eq, &y(), Some(UNDETERMINED_COEFFICIENTS)).unwrap();
    check_solution(&eq, &solution);
  }

  #[test]
  fn resonant_exponential_forcing() {
    // y' - y = exp(x)
    let eq = sub(sub(dy(1), y()), exp(x()));
    let solution = dsolve(&eq, &y(), Some(UNDETERMINED_COEFFICIENTS)).unwrap();
    check_solution(&eq, &solution);
  }

  #[test]
  fn wrong_hint_is_not_applicable() {
    let eq = sub(dy(1), power(y(), Expr::Integer(2)));
    assert!(matches!(
      dsolve(&eq, &y(), Some(FIRST_LINEAR)),
      Err(SolveError::NotApplicable(_))
    ));
    assert!(matches!(
      dsolve(&eq, &y(), Some(FIRST_POWER_SERIES)),
      Err(SolveError::NotImplemented(_))
    ));
  }

  #[test]
  fn initial_conditions_fix_constants() {
    let eq = plus(vec![dy(2), y()]);
    let general = dsolve(&eq, &y(), None).unwrap();
    let conditions = vec![
      InitialCondition {
        order: 0,
        at: Expr::Integer(0),
        value: Expr::Integer(0),
      },
      InitialCondition {
        order: 1,
        at: Expr::Integer(0),
        value: Expr::Integer(1),
      },
    ];
    let particular =
      apply_initial_conditions(&general, &y(), &conditions).unwrap();
    assert_eq!(particular, Expr::equation(y(), call("Sin", vec![x()])));
  }
}
