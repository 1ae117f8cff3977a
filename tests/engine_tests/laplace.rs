use std::collections::BTreeMap;

use super::*;

fn conditions(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
  pairs
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

mod forward {
  use super::*;

  #[test]
  fn decaying_exponential() {
    let result = Service::default()
      .forward_laplace("exp(-2*t)", None)
      .unwrap();
    assert_eq!(result.time_domain, "exp(-2*t)");
    assert_eq!(result.simplified_form, "1/(s + 2)");
  }

  #[test]
  fn differential_input_is_solved_first() {
    let given = conditions(&[("f(0)", "1")]);
    let result = Service::default()
      .forward_laplace("Derivative(f, t) + f", Some(&given))
      .unwrap();
    assert_eq!(result.time_domain, "exp(-t)");
    assert_eq!(result.simplified_form, "1/(s + 1)");
  }

  #[test]
  fn unsolvable_input_keeps_the_transform_symbolic() {
    let result = Service::default()
      .forward_laplace("Derivative(f, t, 2) + t*f", None)
      .unwrap();
    assert!(result.laplace_transform.contains("F(s)"));
    assert!(result.laplace_transform.contains("Derivative(F(s), s)"));
  }

  #[test]
  fn declared_parameters_are_accepted() {
    let result = Service::default()
      .forward_laplace("sin(w*t)", None)
      .unwrap();
    assert!(result.simplified_form.contains("w"));
    assert!(result.simplified_form.contains("s"));
  }

  #[test]
  fn undeclared_parameter_is_rejected() {
    let err = Service::default()
      .forward_laplace("exp(-q*t)", None)
      .unwrap_err();
    assert_eq!(
      err.to_string(),
      "Error processing equation: unknown identifier `q`"
    );
  }

  #[test]
  fn powers_past_the_exact_factorial_range_are_rejected() {
    let service = Service::default();
    let largest = service.forward_laplace("t**33", None).unwrap();
    assert!(largest.simplified_form.contains("s**34"));
    let err = service.forward_laplace("t**34", None).unwrap_err();
    assert!(err.to_string().starts_with("Error processing equation:"));
  }

  #[test]
  fn unknown_initial_value_name_is_rejected() {
    let given = conditions(&[("g'(0)", "2")]);
    assert!(
      Service::default()
        .forward_laplace("Derivative(f, t) + f", Some(&given))
        .is_err()
    );
  }
}

mod inverse {
  use super::*;

  #[test]
  fn simple_pole() {
    let result = Service::default().inverse_laplace("1/(s + 2)").unwrap();
    assert_eq!(result.laplace_domain, "1/(s + 2)");
    assert_eq!(result.simplified_form, "exp(-2*t)");
  }

  #[test]
  fn round_trip_through_both_directions() {
    let service = Service::default();
    let forward = service.forward_laplace("exp(-2*t)", None).unwrap();
    let back = service.inverse_laplace(&forward.simplified_form).unwrap();
    assert_eq!(back.simplified_form, "exp(-2*t)");
  }

  #[test]
  fn symbolic_rate_round_trip() {
    let service = Service::default();
    let forward = service.forward_laplace("exp(-a*t)", None).unwrap();
    let back = service.inverse_laplace(&forward.simplified_form).unwrap();
    assert_eq!(back.simplified_form, forward.time_domain);
  }

  #[test]
  fn hyperbolic_pairs_round_trip() {
    let service = Service::default();
    for time_domain in ["sinh(a*t)", "cosh(a*t)"] {
      let forward = service.forward_laplace(time_domain, None).unwrap();
      assert_eq!(forward.time_domain, time_domain);
      let back = service.inverse_laplace(&forward.simplified_form).unwrap();
      assert_eq!(back.simplified_form, time_domain);
    }
  }

  #[test]
  fn repeated_quadratic_poles_round_trip() {
    let service = Service::default();
    for time_domain in ["t*sin(t)", "t*cos(t)"] {
      let forward = service.forward_laplace(time_domain, None).unwrap();
      let back = service.inverse_laplace(&forward.simplified_form).unwrap();
      assert_eq!(back.simplified_form, forward.time_domain);
    }
  }

  #[test]
  fn constant_image_is_an_impulse() {
    let service = Service::default();
    let impulse = service.inverse_laplace("1").unwrap();
    assert_eq!(impulse.simplified_form, "DiracDelta(t)");
    let forward = service
      .forward_laplace(&impulse.simplified_form, None)
      .unwrap();
    assert_eq!(forward.simplified_form, "1");
  }

  #[test]
  fn delay_has_no_rule() {
    let err = Service::default().inverse_laplace("exp(-s)").unwrap_err();
    assert!(err.to_string().starts_with("Error processing equation:"));
  }

  #[test]
  fn time_variable_is_not_declared_in_frequency_input() {
    assert!(Service::default().inverse_laplace("t/s").is_err());
  }
}
