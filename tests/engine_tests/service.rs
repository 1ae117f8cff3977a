use std::sync::Arc;
use std::time::Duration;

use super::*;
use odesolve::functions::laplace_ast::TransformVars;
use odesolve::functions::ode_ast::InitialCondition;
use odesolve::parser::Vocabulary;
use odesolve::service::{guarded, serve};
use odesolve::{ParseError, ServiceError, SolveError, TransformError};
use serde_json::{Value, json};
use tokio::io::BufReader;

fn envelope(service: &Service, request: Value) -> Value {
  serde_json::to_value(service.handle_line(&request.to_string())).unwrap()
}

mod envelopes {
  use super::*;

  #[test]
  fn classify_and_solve_succeeds() {
    let reply = envelope(
      &Service::default(),
      json!({
        "id": 7,
        "operation": "classifyAndSolve",
        "equation": "Derivative(y, x) + y - x"
      }),
    );
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["result"]["method"], "FirstOrderLinear");
    assert_eq!(reply["result"]["classification"]["type"], "Ordinary");
    assert_eq!(reply["result"]["classification"]["order"], 1);
    assert_eq!(reply["result"]["classification"]["linearity"], "Linear");
    assert!(reply.get("error").is_none());
  }

  #[test]
  fn failure_has_error_and_no_result() {
    let reply = envelope(
      &Service::default(),
      json!({
        "id": "a",
        "operation": "classifyAndSolve",
        "equation": "Derivative(y, x) + z"
      }),
    );
    assert_eq!(reply["ok"], false);
    assert!(reply.get("result").is_none());
    assert_eq!(
      reply["error"],
      "Error processing equation: unknown identifier `z`"
    );
  }

  #[test]
  fn missing_equation_is_a_bad_request() {
    let reply = envelope(
      &Service::default(),
      json!({ "operation": "inverseLaplace" }),
    );
    assert_eq!(reply["ok"], false);
    assert_eq!(reply["error"], "Invalid request: missing `equation`");
  }

  #[test]
  fn malformed_json_keeps_the_id_when_it_can() {
    let service = Service::default();
    let reply =
      service.handle_line(r#"{"id": 3, "operation": "solveEverything"}"#);
    assert!(!reply.ok);
    assert_eq!(reply.id, Some(json!(3)));
    assert!(
      reply
        .error
        .unwrap()
        .starts_with("Invalid request:")
    );
    assert_eq!(service.handle_line("not json").id, None);
  }

  #[test]
  fn forward_laplace_accepts_numeric_initial_values() {
    let reply = envelope(
      &Service::default(),
      json!({
        "operation": "forwardLaplace",
        "equation": "Derivative(f, t) + f",
        "initialConditions": { "f(0)": 1 }
      }),
    );
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["result"]["timeDomain"], "exp(-t)");
    assert_eq!(reply["result"]["simplifiedForm"], "1/(s + 1)");
  }

  #[test]
  fn inverse_laplace_field_names() {
    let reply = envelope(
      &Service::default(),
      json!({ "operation": "inverseLaplace", "equation": "1/(s + 2)" }),
    );
    assert_eq!(reply["result"]["laplaceDomain"], "1/(s + 2)");
    assert_eq!(reply["result"]["timeDomain"], "exp(-2*t)");
  }

  #[test]
  fn preflight_lists_operations() {
    let reply =
      envelope(&Service::default(), json!({ "operation": "preflight" }));
    assert_eq!(reply["result"]["status"], "ok");
    assert_eq!(reply["result"]["operations"].as_array().unwrap().len(), 5);
  }

  #[test]
  fn examples_solve_all_three() {
    let examples = Service::default().examples();
    assert_eq!(examples.len(), 3);
    assert!(examples.iter().all(|e| e.result.is_some() && e.error.is_none()));
  }
}

/// A capability whose every call to `classify_ode` stalls.
struct Stalling;

impl AlgebraCapability for Stalling {
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
    eq: &Expr,
    func: &Expr,
  ) -> Result<Vec<String>, SolveError> {
    std::thread::sleep(Duration::from_millis(500));
    SymbolicEngine.classify_ode(eq, func)
  }

  fn dsolve(
    &self,
    eq: &Expr,
    func: &Expr,
    hint: Option<&str>,
  ) -> Result<Expr, SolveError> {
    SymbolicEngine.dsolve(eq, func, hint)
  }

  fn apply_initial_conditions(
    &self,
    solution: &Expr,
    func: &Expr,
    conditions: &[InitialCondition],
  ) -> Result<Expr, SolveError> {
    SymbolicEngine.apply_initial_conditions(solution, func, conditions)
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
    _expr: &Expr,
    _vars: &TransformVars,
  ) -> Result<Expr, TransformError> {
    panic!("inverse transform fault")
  }

  fn render(&self, expr: &Expr) -> String {
    SymbolicEngine.render(expr)
  }

  fn latex(&self, expr: &Expr) -> String {
    SymbolicEngine.latex(expr)
  }
}

fn stalling_service(timeout_ms: u64) -> Service {
  let mut config = EngineConfig::default();
  config.service.timeout_ms = timeout_ms;
  Service::with_capability(config, Arc::new(Stalling))
}

#[test]
fn capability_panic_becomes_an_error_envelope() {
  let reply = envelope(
    &stalling_service(1_000),
    json!({ "id": 1, "operation": "inverseLaplace", "equation": "1/s" }),
  );
  assert_eq!(reply["ok"], false);
  assert_eq!(
    reply["error"],
    "Error processing equation: internal capability fault"
  );
}

#[test]
fn guarded_operations_report_panics_as_errors() {
  let outcome = guarded::<()>(|| panic!("overflow"));
  assert_eq!(
    outcome,
    Err(ServiceError::Capability(
      "internal capability fault".to_string()
    ))
  );
  assert_eq!(guarded(|| Ok::<_, ServiceError>(3)), Ok(3));
}

async fn run(service: Service, input: &str) -> Vec<Value> {
  let mut output = Vec::new();
  serve(Arc::new(service), BufReader::new(input.as_bytes()), &mut output)
    .await
    .unwrap();
  String::from_utf8(output)
    .unwrap()
    .lines()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect()
}

#[tokio::test]
async fn serve_answers_each_line_in_order() {
  let input = concat!(
    r#"{"id": 1, "operation": "preflight"}"#,
    "\n\n",
    r#"{"id": 2, "operation": "inverseLaplace", "equation": "1/(s + 2)"}"#,
    "\n",
    "garbage\n",
  );
  let replies = run(Service::default(), input).await;
  assert_eq!(replies.len(), 3);
  assert_eq!(replies[0]["id"], 1);
  assert_eq!(replies[1]["id"], 2);
  assert_eq!(replies[1]["ok"], true);
  assert_eq!(replies[2]["ok"], false);
}

#[tokio::test]
async fn serve_times_out_slow_requests() {
  let input = concat!(
    r#"{"id": 9, "operation": "classifyAndSolve", "#,
    r#""equation": "Derivative(y, x) + y"}"#,
    "\n",
    r#"{"id": 10, "operation": "preflight"}"#,
    "\n",
  );
  let replies = run(stalling_service(50), input).await;
  assert_eq!(replies.len(), 2);
  assert_eq!(replies[0]["id"], 9);
  assert_eq!(replies[0]["ok"], false);
  assert_eq!(replies[0]["error"], "Request timed out after 50 ms");
  assert_eq!(replies[1]["ok"], true);
}
