//! Algebraic solving: isolating a target atom in `expr = 0`, and linear
//! systems with symbolic coefficients.

use crate::SolveError;
use crate::functions::arithmetic::{
  call, div, neg, plus, power, split_coefficient, sqrt, sub, times,
};
use crate::functions::polynomial::coefficients;
use crate::functions::simplify::{
  expand, independent_of, is_zero, simplify, substitute,
};
use crate::syntax::{Expr, Num};

fn residual(expr: &Expr) -> Expr {
  match expr {
    Expr::Equation { lhs, rhs } => sub((**lhs).clone(), (**rhs).clone()),
    other => other.clone(),
  }
}

fn not_invertible(target: &Expr, expr: &Expr) -> SolveError {
  SolveError::NotInvertible(format!("cannot isolate {} in {}", target, expr))
}

/// Candidate values of `target` satisfying `expr = 0` (or `lhs = rhs` for
/// an equation). With two branches, the `+` branch of a square root comes
/// first.
pub fn solve(expr: &Expr, target: &Expr) -> Result<Vec<Expr>, SolveError> {
  let e = simplify(&residual(expr));
  if independent_of(&e, target) {
    return Err(not_invertible(target, &e));
  }
  if let Some(found) = solve_polynomial(&e, target) {
    return Ok(found);
  }
  let cleared = clear_denominators(&e, target);
  if cleared != e
    && let Some(found) = solve_polynomial(&cleared, target)
  {
    return Ok(found);
  }
  isolate(&e, &Expr::Integer(0), target)
}

fn solve_polynomial(e: &Expr, target: &Expr) -> Option<Vec<Expr>> {
  let coeffs = coefficients(e, target)?;
  match coeffs.as_slice() {
    [c0, c1] => Some(vec![simplify(&neg(div(c0.clone(), c1.clone())))]),
    [c, b, a] => {
      let disc = simplify(&sub(
        power(b.clone(), Expr::Integer(2)),
        times(vec![Expr::Integer(4), a.clone(), c.clone()]),
      ));
      let denom = times(vec![Expr::Integer(2), a.clone()]);
      if disc.is_zero() {
        return Some(vec![simplify(&div(neg(b.clone()), denom))]);
      }
      let root = sqrt(disc);
      Some(vec![
        simplify(&div(plus(vec![neg(b.clone()), root.clone()]), denom.clone())),
        simplify(&div(sub(neg(b.clone()), root), denom)),
      ])
    }
    _ => None,
  }
}

/// Multiplies every term by the denominators that depend on `target`.
fn clear_denominators(e: &Expr, target: &Expr) -> Expr {
  let terms = match e {
    Expr::FunctionCall { name, args } if name == "Plus" => args.clone(),
    other => vec![other.clone()],
  };
  let mut bases: Vec<(Expr, i128)> = Vec::new();
  for term in &terms {
    let (_, rest) = split_coefficient(term);
    let factors = match rest {
      Expr::FunctionCall { name, args } if name == "Times" => args,
      other => vec![other],
    };
    for factor in factors {
      let (base, exponent) = factor.as_power();
      if let Some(k) = exponent.as_num().and_then(Num::as_integer)
        && k < 0
        && !independent_of(base, target)
      {
        match bases.iter_mut().find(|(b, _)| b == base) {
          Some((_, m)) => *m = (*m).max(-k),
          None => bases.push((base.clone(), -k)),
        }
      }
    }
  }
  if bases.is_empty() {
    return e.clone();
  }
  let multipliers: Vec<Expr> = bases
    .into_iter()
    .map(|(b, k)| power(b, Expr::Integer(k)))
    .collect();
  plus(
    terms
      .into_iter()
      .map(|t| {
        let mut factors = vec![t];
        factors.extend(multipliers.iter().cloned());
        expand(&times(factors))
      })
      .collect(),
  )
}

fn is_log_multiple(term: &Expr) -> Option<(Expr, Expr)> {
  let (coeff, rest) = split_coefficient(term);
  rest
    .is_head("Log")
    .then(|| (rest.args()[0].clone(), coeff.to_expr()))
}

fn isolate(
  lhs: &Expr,
  rhs: &Expr,
  target: &Expr,
) -> Result<Vec<Expr>, SolveError> {
  if lhs == target {
    return Ok(vec![simplify(rhs)]);
  }
  let Expr::FunctionCall { name, args } = lhs else {
    return Err(not_invertible(target, lhs));
  };
  match name.as_str() {
    "Plus" => {
      let (dependent, constant): (Vec<Expr>, Vec<Expr>) = args
        .iter()
        .cloned()
        .partition(|t| !independent_of(t, target));
      let moved = sub(rhs.clone(), plus(constant));
      match dependent.as_slice() {
        [single] => isolate(single, &moved, target),
        many if many.iter().all(|t| is_log_multiple(t).is_some()) => {
          let product = times(
            many
              .iter()
              .filter_map(is_log_multiple)
              .map(|(arg, c)| power(arg, c))
              .collect(),
          );
          solve(&sub(product, power(Expr::e(), moved)), target)
        }
        _ => Err(not_invertible(target, lhs)),
      }
    }
    "Times" => {
      let (dependent, constant): (Vec<Expr>, Vec<Expr>) = args
        .iter()
        .cloned()
        .partition(|f| !independent_of(f, target));
      match dependent.as_slice() {
        [single] => isolate(single, &div(rhs.clone(), times(constant)), target),
        _ => Err(not_invertible(target, lhs)),
      }
    }
    "Power" => {
      let (base, exponent) = (&args[0], &args[1]);
      if independent_of(exponent, target) {
        let inverse =
          power(rhs.clone(), power(exponent.clone(), Expr::Integer(-1)));
        let even = exponent
          .as_num()
          .and_then(Num::as_integer)
          .is_some_and(|n| n % 2 == 0);
        let branches = if even {
          vec![inverse.clone(), neg(inverse)]
        } else {
          vec![inverse]
        };
        let mut out = Vec::new();
        for branch in branches {
          out.extend(isolate(base, &branch, target)?);
        }
        return Ok(out);
      }
      if independent_of(base, target) {
        let log_rhs = call("Log", vec![rhs.clone()]);
        let scaled = if *base == Expr::e() {
          log_rhs
        } else {
          div(log_rhs, call("Log", vec![base.clone()]))
        };
        return isolate(exponent, &scaled, target);
      }
      Err(not_invertible(target, lhs))
    }
    "Log" => isolate(&args[0], &power(Expr::e(), rhs.clone()), target),
    "Sin" | "Cos" | "Tan" | "ArcTan" | "ArcSin" | "ArcCos" => {
      let inverse = match name.as_str() {
        "Sin" => "ArcSin",
        "Cos" => "ArcCos",
        "Tan" => "ArcTan",
        "ArcTan" => "Tan",
        "ArcSin" => "Sin",
        _ => "Cos",
      };
      isolate(&args[0], &call(inverse, vec![rhs.clone()]), target)
    }
    _ => Err(not_invertible(target, lhs)),
  }
}

// ─── Linear systems ────────────────────────────────────────────────────

/// Solves equations (each `= 0`, or an `Equation`) that are linear in
/// `unknowns` with coefficients free of them.
pub fn solve_linear_system(
  equations: &[Expr],
  unknowns: &[Expr],
) -> Result<Vec<Expr>, SolveError> {
  let n = unknowns.len();
  if equations.len() != n {
    return Err(SolveError::NotApplicable(format!(
      "{} equations for {} unknowns",
      equations.len(),
      n
    )));
  }
  let mut matrix: Vec<Vec<Expr>> = Vec::with_capacity(n);
  let mut rhs: Vec<Expr> = Vec::with_capacity(n);
  for equation in equations {
    let e = simplify(&residual(equation));
    let mut row = Vec::with_capacity(n);
    for unknown in unknowns {
      let coeffs = coefficients(&e, unknown).ok_or_else(|| {
        SolveError::NotApplicable(format!("{} is not linear in {}", e, unknown))
      })?;
      let c = match coeffs.as_slice() {
        [_] => Expr::Integer(0),
        [_, c1] if unknowns.iter().all(|u| independent_of(c1, u)) => c1.clone(),
        _ => {
          return Err(SolveError::NotApplicable(format!(
            "{} is not linear in {}",
            e, unknown
          )));
        }
      };
      row.push(c);
    }
    let constant = unknowns.iter().fold(e.clone(), |acc, u| {
      simplify(&substitute(&acc, u, &Expr::Integer(0)))
    });
    matrix.push(row);
    rhs.push(neg(constant));
  }

  for col in 0..n {
    let pivot = (col..n)
      .find(|&r| !is_zero(&matrix[r][col]))
      .ok_or_else(|| SolveError::NotInvertible("singular system".to_string()))?;
    matrix.swap(col, pivot);
    rhs.swap(col, pivot);
    for row in 0..n {
      if row == col || is_zero(&matrix[row][col]) {
        continue;
      }
      let factor =
        simplify(&div(matrix[row][col].clone(), matrix[col][col].clone()));
      for k in col..n {
        let scaled = times(vec![factor.clone(), matrix[col][k].clone()]);
        matrix[row][k] = simplify(&sub(matrix[row][k].clone(), scaled));
      }
      let scaled = times(vec![factor, rhs[col].clone()]);
      rhs[row] = simplify(&sub(rhs[row].clone(), scaled));
    }
  }
  Ok(
    (0..n)
      .map(|i| simplify(&div(rhs[i].clone(), matrix[i][i].clone())))
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::functions::arithmetic::exp;

  fn x() -> Expr {
    Expr::symbol("x")
  }

  #[test]
  fn linear_in_derivative() {
    let y = Expr::apply("y", x());
    let dy = Expr::derivative(y.clone(), x(), 1);
    let e = sub(times(vec![x(), dy.clone()]), y.clone());
    let found = solve(&e, &dy).unwrap();
    assert_eq!(found, vec![div(y, x())]);
  }

  #[test]
  fn quadratic_positive_branch_first() {
    let e = sub(power(x(), Expr::Integer(2)), Expr::Integer(2));
    let found = solve(&e, &x()).unwrap();
    assert_eq!(
      found,
      vec![sqrt(Expr::Integer(2)), neg(sqrt(Expr::Integer(2)))]
    );
  }

  #[test]
  fn inverts_exponential_kernel() {
    let c = Expr::symbol("C1");
    let e = sub(times(vec![Expr::Integer(3), exp(x())]), c.clone());
    let found = solve(&e, &x()).unwrap();
    assert_eq!(found, vec![call("Log", vec![div(c, Expr::Integer(3))])]);
  }

  #[test]
  fn two_by_two_system() {
    let c1 = Expr::symbol("C1");
    let c2 = Expr::symbol("C2");
    let eqs = vec![
      sub(plus(vec![c1.clone(), c2.clone()]), Expr::Integer(3)),
      sub(c1.clone(), c2.clone()),
    ];
    let found = solve_linear_system(&eqs, &[c1, c2]).unwrap();
    assert_eq!(found, vec![Expr::Rational(3, 2), Expr::Rational(3, 2)]);
  }

  #[test]
  fn absent_target_is_not_invertible() {
    assert!(matches!(
      solve(&x(), &Expr::symbol("z")),
      Err(SolveError::NotInvertible(_))
    ));
  }
}
