use super::*;
use odesolve::functions::calculus_ast::differentiate;
use odesolve::functions::simplify::{is_zero, simplify, substitute};
use odesolve::method::Method;
use odesolve::service::{Homogeneity, Linearity};

/// Parses `y(x) = ...` back and checks it against the equation's residual.
fn satisfies(equation: &str, rendering: &str) -> bool {
  let context = EquationContext::default();
  let vocabulary = context
    .vocabulary()
    .with_symbol("C1")
    .with_symbol("C2");
  let solution = SymbolicEngine.parse(rendering, &vocabulary).unwrap();
  let Expr::Equation { lhs, rhs } = solution else {
    panic!("not an equation: {}", rendering);
  };
  assert_eq!(*lhs, context.dependent_fn());

  let x = context.independent_var();
  let first = differentiate(&rhs, &x).unwrap();
  let second = differentiate(&first, &x).unwrap();
  let y = context.dependent_fn();
  let residual = parse_equation(equation).residual();
  let residual = substitute(
    &residual,
    &Expr::derivative(y.clone(), x.clone(), 2),
    &second,
  );
  let residual =
    substitute(&residual, &Expr::derivative(y.clone(), x, 1), &first);
  let residual = substitute(&residual, &y, &rhs);
  is_zero(&simplify(&residual))
}

#[test]
fn second_order_constant_coefficients() {
  let service = Service::default();
  let equation = "Derivative(y, x, x) - Derivative(y, x) + 6*y";
  let response = service.classify_and_solve(equation).unwrap();
  assert_eq!(response.classification.order, Some(2));
  assert_eq!(response.classification.linearity, Linearity::Linear);
  assert_eq!(response.method, Method::Unknown);
  assert_eq!(
    response.method_description,
    "No specific method could be determined"
  );
  assert!(response.solution.starts_with("y(x) = "));
  assert!(response.solution.contains("C1"));
  assert!(response.solution.contains("C2"));
  assert!(satisfies(equation, &response.solution));
}

#[test]
fn first_order_linear() {
  let service = Service::default();
  let equation = "Derivative(y, x) + y - x";
  let response = service.classify_and_solve(equation).unwrap();
  assert_eq!(response.method, Method::FirstOrderLinear);
  assert_eq!(response.classification.order, Some(1));
  assert_eq!(response.classification.linearity, Linearity::Linear);
  assert_eq!(
    response.classification.homogeneity,
    Homogeneity::NonHomogeneous
  );
  assert!(satisfies(equation, &response.solution));
  assert!(response.solution_latex.is_some());
}

#[test]
fn riccati_square_is_separable() {
  let service = Service::default();
  let equation = "Derivative(y, x) - y**2";
  let response = service.classify_and_solve(equation).unwrap();
  assert_eq!(response.method, Method::Separable);
  assert_eq!(response.classification.linearity, Linearity::Nonlinear);
  assert!(response.recommended_formula.contains(r"\int"));
  assert!(satisfies(equation, &response.solution));
}

#[test]
fn equals_sign_and_bare_residual_agree() {
  let service = Service::default();
  let bare = service.classify_and_solve("Derivative(y, x) + y - x").unwrap();
  let equated = service
    .classify_and_solve("Derivative(y, x) + y == x")
    .unwrap();
  assert_eq!(bare.method, equated.method);
  assert_eq!(bare.classification, equated.classification);
}

#[test]
fn homogeneous_first_order() {
  let response = Service::default()
    .classify_and_solve("Derivative(y, x) - y/x")
    .unwrap();
  assert_eq!(response.classification.homogeneity, Homogeneity::Homogeneous);
  assert_ne!(response.solution, "");
}

#[test]
fn unknown_symbol_is_a_parse_error() {
  let err = Service::default()
    .classify_and_solve("Derivative(y, x) + z")
    .unwrap_err();
  assert_eq!(
    err.to_string(),
    "Error processing equation: unknown identifier `z`"
  );
}

#[test]
fn undefined_values_are_parse_errors() {
  let service = Service::default();
  for equation in ["Derivative(y, x) - 1/0", "Derivative(y, x) - log(0)"] {
    let err = service.classify_and_solve(equation).unwrap_err();
    assert!(
      err.to_string().starts_with("Error processing equation:"),
      "{}",
      err
    );
  }
}

#[test]
fn enormous_powers_fail_cleanly() {
  let service = Service::default();
  let response =
    service.classify_and_solve("Derivative(y, x) - y**1000000000000");
  if let Ok(response) = response {
    assert_eq!(response.classification.order, Some(1));
  }
  assert!(
    service
      .classify_and_solve("Derivative(y, x, 1000) - y")
      .is_err()
  );
}
