use std::sync::{Arc, Mutex};

use super::*;
use odesolve::classifier::{ClassificationTags, classification_tags};
use odesolve::functions::laplace_ast::TransformVars;
use odesolve::functions::ode_ast::InitialCondition;
use odesolve::method::{Method, select_method};
use odesolve::parser::Vocabulary;
use odesolve::resolver::{NO_SOLUTION, resolve};
use odesolve::{ParseError, SolveError, TransformError};

/// Delegates to the built-in engine but answers `classify_ode` and hinted
/// `dsolve` calls from a script, recording every hint it is probed with.
struct Scripted {
  tags: Result<Vec<String>, SolveError>,
  accepts: Vec<&'static str>,
  failure: SolveError,
  probes: Mutex<Vec<String>>,
}

impl Scripted {
  fn new(tags: &[&str], accepts: &[&'static str]) -> Self {
    Scripted {
      tags: Ok(tags.iter().map(|t| t.to_string()).collect()),
      accepts: accepts.to_vec(),
      failure: SolveError::NotApplicable("scripted".to_string()),
      probes: Mutex::new(Vec::new()),
    }
  }

  fn failing_with(mut self, failure: SolveError) -> Self {
    self.failure = failure;
    self
  }

  fn probed(&self) -> Vec<String> {
    self.probes.lock().unwrap().clone()
  }
}

impl AlgebraCapability for Scripted {
  fn parse(
    &self,
    text: &str,
    vocabulary: &Vocabulary,
  ) -> Result<Expr, ParseError> {
    SymbolicEngine.parse(text, vocabulary)
  }

  fn simplify(&self, expr: &Expr) -> Expr {
    SymbolicEngine.simplify(expr)
  }

  fn substitute(&self, expr: &Expr, from: &Expr, to: &Expr) -> Expr {
    SymbolicEngine.substitute(expr, from, to)
  }

  fn solve(&self, expr: &Expr, target: &Expr) -> Result<Vec<Expr>, SolveError> {
    SymbolicEngine.solve(expr, target)
  }

  fn classify_ode(
    &self,
    _eq: &Expr,
    _func: &Expr,
  ) -> Result<Vec<String>, SolveError> {
    self.tags.clone()
  }

  fn dsolve(
    &self,
    _eq: &Expr,
    func: &Expr,
    hint: Option<&str>,
  ) -> Result<Expr, SolveError> {
    let hint = hint.unwrap_or("default");
    self.probes.lock().unwrap().push(hint.to_string());
    if self.accepts.contains(&hint) {
      Ok(Expr::equation(func.clone(), Expr::symbol("C1")))
    } else {
      Err(self.failure.clone())
    }
  }

  fn apply_initial_conditions(
    &self,
    solution: &Expr,
    _func: &Expr,
    _conditions: &[InitialCondition],
  ) -> Result<Expr, SolveError> {
    Ok(solution.clone())
  }

  fn laplace_transform(
    &self,
    expr: &Expr,
    vars: &TransformVars,
  ) -> Result<Expr, TransformError> {
    SymbolicEngine.laplace_transform(expr, vars)
  }

  fn inverse_laplace_transform(
    &self,
    expr: &Expr,
    vars: &TransformVars,
  ) -> Result<Expr, TransformError> {
    SymbolicEngine.inverse_laplace_transform(expr, vars)
  }

  fn render(&self, expr: &Expr) -> String {
    SymbolicEngine.render(expr)
  }

  fn latex(&self, expr: &Expr) -> String {
    SymbolicEngine.latex(expr)
  }
}

fn route(capability: &Scripted) -> Method {
  let eq = parse_equation("Derivative(y, x) + y - x");
  let tags = classification_tags(&eq, capability);
  select_method(&eq, &tags, tags.mentions_linear(), capability)
}

#[test]
fn separable_tag_wins_without_probing() {
  let capability = Scripted::new(
    &["separable", "1st_linear", "Bernoulli"],
    &["1st_linear", "Bernoulli"],
  );
  assert_eq!(route(&capability), Method::Separable);
  assert!(capability.probed().is_empty());
}

#[test]
fn linear_probe_comes_first() {
  let capability = Scripted::new(
    &["1st_linear", "Bernoulli", "1st_exact"],
    &["1st_linear", "Bernoulli", "1st_exact"],
  );
  assert_eq!(route(&capability), Method::FirstOrderLinear);
  assert_eq!(capability.probed(), vec!["1st_linear"]);
}

#[test]
fn nonlinear_equations_skip_the_linear_probe() {
  let capability = Scripted::new(
    &["Bernoulli", "1st_power_series"],
    &["1st_linear", "Bernoulli"],
  );
  assert_eq!(route(&capability), Method::Bernoulli);
  assert_eq!(capability.probed(), vec!["Bernoulli"]);
}

#[test]
fn exact_after_rejected_bernoulli() {
  let capability = Scripted::new(&["1st_linear"], &["1st_exact"]);
  assert_eq!(route(&capability), Method::Exact);
  assert_eq!(
    capability.probed(),
    vec!["1st_linear", "Bernoulli", "1st_exact"]
  );
}

#[test]
fn nothing_accepted_is_unknown() {
  let capability = Scripted::new(&["1st_linear"], &[]);
  assert_eq!(route(&capability), Method::Unknown);
}

#[test]
fn internal_solver_errors_are_rejections_too() {
  let capability = Scripted::new(&["1st_linear"], &[])
    .failing_with(SolveError::Internal("boom".to_string()));
  assert_eq!(route(&capability), Method::Unknown);
  assert_eq!(capability.probed().len(), 3);
}

#[test]
fn resolve_reports_no_solution_for_unimplemented_methods() {
  let capability = Scripted::new(&[], &[])
    .failing_with(SolveError::NotImplemented("scripted".to_string()));
  let eq = parse_equation("Derivative(y, x) + y - x");
  let result = resolve(&eq, Method::Unknown, &capability).unwrap();
  assert!(!result.found);
  assert_eq!(result.rendering, NO_SOLUTION);
  assert_eq!(result.latex, None);
}

#[test]
fn resolve_propagates_internal_errors() {
  let capability = Scripted::new(&[], &[])
    .failing_with(SolveError::Internal("boom".to_string()));
  let eq = parse_equation("Derivative(y, x) + y - x");
  assert_eq!(
    resolve(&eq, Method::Exact, &capability),
    Err(SolveError::Internal("boom".to_string()))
  );
}

#[test]
fn failed_classification_is_under_determined() {
  let mut capability = Scripted::new(&[], &[]);
  capability.tags = Err(SolveError::Internal("no tags".to_string()));
  let service = Service::with_capability(
    EngineConfig::default(),
    Arc::new(capability),
  );
  let response = service
    .classify_and_solve("Derivative(y, x) + y - x")
    .unwrap();
  assert_eq!(response.classification.order, None);
  assert_eq!(response.method, Method::Unknown);
  assert_eq!(response.solution, NO_SOLUTION);
}

#[test]
fn tags_are_reported_in_order() {
  let capability =
    Scripted::new(&["1st_linear", "2nd_power_series_ordinary"], &[]);
  let eq = parse_equation("Derivative(y, x) + y - x");
  let tags = classification_tags(&eq, &capability);
  assert_eq!(
    tags,
    ClassificationTags::new(vec![
      "1st_linear".to_string(),
      "2nd_power_series_ordinary".to_string(),
    ])
  );
  assert_eq!(tags.order(), Some(2));
}
