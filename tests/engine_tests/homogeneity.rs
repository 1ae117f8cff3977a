use super::*;
use odesolve::homogeneity::is_homogeneous;

fn homogeneous(text: &str) -> bool {
  is_homogeneous(&parse_equation(text), &SymbolicEngine)
}

#[test]
fn ratio_forms() {
  assert!(homogeneous("Derivative(y, x) - 3*y/x"));
  assert!(homogeneous("Derivative(y, x) == y/x + (y/x)**3"));
}

#[test]
fn mixed_degrees() {
  assert!(!homogeneous("Derivative(y, x) - y - x**2"));
  assert!(!homogeneous("Derivative(y, x) + y - x"));
}

#[test]
fn higher_order_is_never_first_order_homogeneous() {
  assert!(!homogeneous("Derivative(y, x, 2) + y"));
}
