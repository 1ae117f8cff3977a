//! The request/response boundary.
//!
//! Every operation returns either a structured result or exactly one
//! [`ServiceError`]. [`Service::handle`] wraps that into the JSON
//! [`Envelope`] and [`serve`] runs envelopes over newline-delimited JSON.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::ServiceError;
use crate::capability::{AlgebraCapability, SymbolicEngine};
use crate::classifier::{EquationKind, classification_tags, classify};
use crate::config::EngineConfig;
use crate::equation::{DifferentialEquation, EquationContext};
use crate::laplace::{
  ForwardLaplace, InverseLaplace, forward_transform, inverse_transform,
};
use crate::method::{Method, select_method};
use crate::resolver::{FormulaTable, resolve};

/// Sample equations offered by the `examples` operation.
pub const EXAMPLE_EQUATIONS: &[&str] = &[
  "Derivative(y, x, x) - Derivative(y, x) + 6*y",
  "Derivative(y, x) + y - x",
  "Derivative(y, x) - y**2",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Linearity {
  Linear,
  Nonlinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Homogeneity {
  Homogeneous,
  NonHomogeneous,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationView {
  #[serde(rename = "type")]
  pub kind: EquationKind,
  pub order: Option<u32>,
  pub linearity: Linearity,
  pub homogeneity: Homogeneity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
  pub classification: ClassificationView,
  pub method: Method,
  pub method_description: String,
  pub recommended_formula: String,
  pub solution: String,
  pub solution_latex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleSolution {
  pub equation: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<SolveResponse>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acknowledgement {
  pub status: &'static str,
  pub operations: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
  ClassifyAndSolve,
  ForwardLaplace,
  InverseLaplace,
  Preflight,
  Examples,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
  #[serde(default)]
  pub id: Option<Value>,
  pub operation: Operation,
  #[serde(default)]
  pub equation: Option<String>,
  #[serde(default)]
  pub initial_conditions: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<Value>,
  pub ok: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl Envelope {
  fn success(id: Option<Value>, result: Value) -> Self {
    Envelope {
      id,
      ok: true,
      result: Some(result),
      error: None,
    }
  }

  pub fn failure(id: Option<Value>, error: &ServiceError) -> Self {
    Envelope {
      id,
      ok: false,
      result: None,
      error: Some(error.to_string()),
    }
  }
}

pub struct Service {
  capability: Arc<dyn AlgebraCapability>,
  formulas: FormulaTable,
  config: EngineConfig,
}

impl Default for Service {
  fn default() -> Self {
    Service::new(EngineConfig::default())
  }
}

impl Service {
  pub fn new(config: EngineConfig) -> Self {
    Service::with_capability(config, Arc::new(SymbolicEngine))
  }

  pub fn with_capability(
    config: EngineConfig,
    capability: Arc<dyn AlgebraCapability>,
  ) -> Self {
    Service {
      capability,
      formulas: config.formula_table(),
      config,
    }
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.config.service.timeout_ms)
  }

  pub fn classify_and_solve(
    &self,
    equation: &str,
  ) -> Result<SolveResponse, ServiceError> {
    let capability = self.capability.as_ref();
    let context = EquationContext::default();
    let eq = DifferentialEquation::parse(equation, &context, capability)?;
    let tags = classification_tags(&eq, capability);
    debug!(tags = ?tags, "classified");
    let classification = classify(&eq, &tags, capability);
    let method =
      select_method(&eq, &tags, classification.is_linear, capability);
    let solution = resolve(&eq, method, capability)?;
    Ok(SolveResponse {
      classification: ClassificationView {
        kind: classification.kind,
        order: classification.order,
        linearity: if classification.is_linear {
          Linearity::Linear
        } else {
          Linearity::Nonlinear
        },
        homogeneity: if classification.is_homogeneous {
          Homogeneity::Homogeneous
        } else {
          Homogeneity::NonHomogeneous
        },
      },
      method,
      method_description: method.description().to_string(),
      recommended_formula: self.formulas.formula(method).to_string(),
      solution: solution.rendering,
      solution_latex: solution.latex,
    })
  }

  pub fn forward_laplace(
    &self,
    equation: &str,
    initial_conditions: Option<&BTreeMap<String, String>>,
  ) -> Result<ForwardLaplace, ServiceError> {
    let env = self.config.laplace_environment();
    let empty = BTreeMap::new();
    forward_transform(
      equation,
      initial_conditions.unwrap_or(&empty),
      &env,
      self.capability.as_ref(),
    )
  }

  pub fn inverse_laplace(
    &self,
    equation: &str,
  ) -> Result<InverseLaplace, ServiceError> {
    let env = self.config.laplace_environment();
    inverse_transform(equation, &env, self.capability.as_ref())
  }

  pub fn preflight(&self) -> Acknowledgement {
    Acknowledgement {
      status: "ok",
      operations: &[
        "classifyAndSolve",
        "forwardLaplace",
        "inverseLaplace",
        "preflight",
        "examples",
      ],
    }
  }

  pub fn examples(&self) -> Vec<ExampleSolution> {
    EXAMPLE_EQUATIONS
      .iter()
      .map(|equation| match self.classify_and_solve(equation) {
        Ok(result) => ExampleSolution {
          equation: equation.to_string(),
          result: Some(result),
          error: None,
        },
        Err(e) => ExampleSolution {
          equation: equation.to_string(),
          result: None,
          error: Some(e.to_string()),
        },
      })
      .collect()
  }

  fn dispatch(&self, request: &Request) -> Result<Value, ServiceError> {
    let equation = || {
      request
        .equation
        .as_deref()
        .ok_or_else(|| {
          ServiceError::BadRequest("missing `equation`".to_string())
        })
    };
    match request.operation {
      Operation::ClassifyAndSolve => {
        to_value(self.classify_and_solve(equation()?)?)
      }
      Operation::ForwardLaplace => {
        let conditions = request
          .initial_conditions
          .as_ref()
          .map(|given| {
            given
              .iter()
              .map(|(k, v)| (k.clone(), value_text(v)))
              .collect::<BTreeMap<_, _>>()
          });
        to_value(self.forward_laplace(equation()?, conditions.as_ref())?)
      }
      Operation::InverseLaplace => to_value(self.inverse_laplace(equation()?)?),
      Operation::Preflight => to_value(self.preflight()),
      Operation::Examples => to_value(self.examples()),
    }
  }

  /// Runs one request. Panics inside the capability are reported as a
  /// capability error.
  pub fn handle(&self, request: &Request) -> Envelope {
    match guarded(|| self.dispatch(request)) {
      Ok(value) => Envelope::success(request.id.clone(), value),
      Err(e) => {
        debug!(error = %e, "request failed");
        Envelope::failure(request.id.clone(), &e)
      }
    }
  }

  pub fn handle_line(&self, line: &str) -> Envelope {
    match serde_json::from_str::<Request>(line) {
      Ok(request) => self.handle(&request),
      Err(e) => Envelope::failure(
        request_id(line),
        &ServiceError::BadRequest(e.to_string()),
      ),
    }
  }
}

/// Runs one operation, reporting a panic as a capability error.
pub fn guarded<T>(
  operation: impl FnOnce() -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
  catch_unwind(AssertUnwindSafe(operation)).unwrap_or_else(|_| {
    Err(ServiceError::Capability("internal capability fault".to_string()))
  })
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ServiceError> {
  serde_json::to_value(value)
    .map_err(|e| ServiceError::Capability(e.to_string()))
}

fn value_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn request_id(line: &str) -> Option<Value> {
  serde_json::from_str::<Value>(line)
    .ok()
    .and_then(|v| v.get("id").cloned())
}

async fn run_with_timeout(
  service: &Arc<Service>,
  line: String,
  id: Option<Value>,
  timeout: Duration,
) -> Envelope {
  let worker = Arc::clone(service);
  let task = tokio::task::spawn_blocking(move || worker.handle_line(&line));
  let envelope = match tokio::time::timeout(timeout, task).await {
    Ok(Ok(envelope)) => envelope,
    Ok(Err(e)) => {
      warn!(error = %e, "worker failed");
      Envelope::failure(
        id,
        &ServiceError::Capability("internal capability fault".to_string()),
      )
    }
    Err(_) => {
      let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
      warn!(timeout_ms = ms, "request timed out");
      Envelope::failure(id, &ServiceError::Timeout(ms))
    }
  };
  info!(ok = envelope.ok, "request complete");
  envelope
}

/// Reads one JSON request per line and writes one JSON envelope per line.
/// Each request runs on a blocking worker under the configured timeout.
pub async fn serve<R, W>(
  service: Arc<Service>,
  input: R,
  mut output: W,
) -> std::io::Result<()>
where
  R: AsyncBufRead + Unpin,
  W: AsyncWrite + Unpin,
{
  let timeout = service.timeout();
  let mut lines = input.lines();
  while let Some(line) = lines.next_line().await? {
    if line.trim().is_empty() {
      continue;
    }
    let id = request_id(&line);
    let span = info_span!("request", trace = %Uuid::new_v4());
    let envelope = run_with_timeout(&service, line, id, timeout)
      .instrument(span)
      .await;
    let mut text = serde_json::to_string(&envelope)?;
    text.push('\n');
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
  }
  Ok(())
}
