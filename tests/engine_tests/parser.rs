use super::*;
use odesolve::ParseError;
use odesolve::functions::arithmetic::times;
use odesolve::parser::{Vocabulary, parse_expression};

fn ode_vocabulary() -> Vocabulary {
  EquationContext::default().vocabulary()
}

mod accepted {
  use super::*;

  #[test]
  fn sympy_style_input() {
    let parsed = parse_expression(
      "Derivative(y, x, x) - Derivative(y, x) + 6*y",
      &ode_vocabulary(),
    )
    .unwrap();
    let y = Expr::apply("y", Expr::symbol("x"));
    let second = Expr::derivative(y.clone(), Expr::symbol("x"), 2);
    assert_eq!(parsed.head(), Some("Plus"));
    assert_eq!(parsed.args().len(), 3);
    assert!(parsed.args().contains(&second));
    assert!(parsed.args().contains(&times(vec![Expr::Integer(6), y])));
  }

  #[test]
  fn caret_and_double_star_agree() {
    let a = parse_expression("y^2 + x", &ode_vocabulary()).unwrap();
    let b = parse_expression("y**2 + x", &ode_vocabulary()).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn diff_is_derivative() {
    let a = parse_expression("diff(y, x, 2)", &ode_vocabulary()).unwrap();
    let b =
      parse_expression("Derivative(y, x, x)", &ode_vocabulary()).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn derivative_of_a_known_expression_is_evaluated() {
    let parsed =
      parse_expression("Derivative(x**3, x)", &ode_vocabulary()).unwrap();
    let expected = parse_expression("3*x**2", &ode_vocabulary()).unwrap();
    assert_eq!(parsed, expected);
  }

  #[test]
  fn elementary_functions_and_constants() {
    let parsed =
      parse_expression("exp(log(x)) + sin(pi)", &ode_vocabulary()).unwrap();
    assert_eq!(parsed, Expr::symbol("x"));
  }

  #[test]
  fn equal_sign_forms() {
    let vocabulary = ode_vocabulary();
    let a = parse_expression("Derivative(y, x) = y", &vocabulary).unwrap();
    let b = parse_expression("Derivative(y, x) == y", &vocabulary).unwrap();
    assert_eq!(a, b);
  }
}

mod rejected {
  use super::*;

  #[test]
  fn undeclared_symbol() {
    assert_eq!(
      parse_expression("Derivative(y, x) + z", &ode_vocabulary()),
      Err(ParseError::UnknownIdentifier("z".to_string()))
    );
  }

  #[test]
  fn undeclared_function() {
    assert_eq!(
      parse_expression("g(x) + y", &ode_vocabulary()),
      Err(ParseError::UnknownIdentifier("g".to_string()))
    );
  }

  #[test]
  fn dangling_operator() {
    assert!(matches!(
      parse_expression("y**2 +", &ode_vocabulary()),
      Err(ParseError::Syntax { .. })
    ));
  }

  #[test]
  fn empty_text() {
    assert_eq!(
      parse_expression("   ", &ode_vocabulary()),
      Err(ParseError::Empty)
    );
  }

  #[test]
  fn function_name_without_arguments() {
    assert!(matches!(
      parse_expression("exp + 1", &ode_vocabulary()),
      Err(ParseError::Unsupported(_))
    ));
  }

  #[test]
  fn values_without_a_finite_meaning() {
    for text in [
      "Derivative(y, x) - 1/0",
      "Derivative(y, x) - 0**(-1)",
      "Derivative(y, x) - log(0)",
      "Derivative(y, x) - 7**(10**9)",
      "Derivative(y, x) - 1.5e400",
    ] {
      assert!(
        matches!(
          parse_expression(text, &ode_vocabulary()),
          Err(ParseError::Unsupported(_))
        ),
        "{}",
        text
      );
    }
  }

  #[test]
  fn large_reals_stay_finite_and_readable() {
    for input in ["2.0**200", "2**200"] {
      let parsed = parse_expression(input, &ode_vocabulary()).unwrap();
      let text = parsed.to_string();
      assert!(text.contains('e'), "{}", text);
      assert_eq!(parse_expression(&text, &ode_vocabulary()).unwrap(), parsed);
    }
  }

  #[test]
  fn derivative_counts_follow_their_variable() {
    let vocabulary = ode_vocabulary();
    let repeated = parse_expression("Derivative(y, x, x, 2)", &vocabulary);
    let y = Expr::apply("y", Expr::symbol("x"));
    assert_eq!(repeated, Ok(Expr::derivative(y, Expr::symbol("x"), 3)));
    assert!(matches!(
      parse_expression("Derivative(y, x, 2, 2)", &vocabulary),
      Err(ParseError::Unsupported(_))
    ));
  }
}
