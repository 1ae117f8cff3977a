//! Solving under the selected method and the method formula table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SolveError;
use crate::capability::AlgebraCapability;
use crate::equation::DifferentialEquation;
use crate::method::Method;

pub const NO_SOLUTION: &str = "no analytical solution found";
pub const NO_FORMULA: &str = r"\text{No general formula available}";

/// General-form equation of each method, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaTable {
  version: u32,
  entries: BTreeMap<Method, String>,
}

impl Default for FormulaTable {
  fn default() -> Self {
    let entries = BTreeMap::from([
      (
        Method::Separable,
        concat!(
          r"\frac{dy}{dx} = g(x)h(y) \Rightarrow ",
          r"\int \frac{1}{h(y)} dy = \int g(x) dx",
        ),
      ),
      (
        Method::FirstOrderLinear,
        concat!(
          r"\frac{dy}{dx} + P(x)y = Q(x) \Rightarrow ",
          r"y = e^{-\int P(x) dx} ",
          r"\left( \int Q(x) e^{\int P(x) dx} dx + C \right)",
        ),
      ),
      (
        Method::Bernoulli,
        concat!(
          r"\frac{dy}{dx} + P(x)y = Q(x)y^n \Rightarrow v = y^{1-n}, ",
          r"\frac{dv}{dx} + (1-n)P(x)v = (1-n)Q(x)",
        ),
      ),
      (
        Method::Exact,
        concat!(
          r"M(x,y)dx + N(x,y)dy = 0, ",
          r"\frac{\partial M}{\partial y} = \frac{\partial N}{\partial x} ",
          r"\Rightarrow \Psi(x,y) = C",
        ),
      ),
    ]);
    FormulaTable {
      version: 1,
      entries: entries
        .into_iter()
        .map(|(m, f)| (m, f.to_string()))
        .collect(),
    }
  }
}

impl FormulaTable {
  pub fn version(&self) -> u32 {
    self.version
  }

  pub fn formula(&self, method: Method) -> &str {
    self.entries.get(&method).map_or(NO_FORMULA, String::as_str)
  }

  /// Replaces entries, bumping to `version`.
  pub fn with_overrides(
    mut self,
    version: u32,
    overrides: BTreeMap<Method, String>,
  ) -> Self {
    self.version = version;
    self.entries.extend(overrides);
    self
  }
}

/// A rendered solution, or the explicit absence of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionResult {
  pub found: bool,
  pub rendering: String,
  pub latex: Option<String>,
}

impl SolutionResult {
  pub fn not_found() -> Self {
    SolutionResult {
      found: false,
      rendering: NO_SOLUTION.to_string(),
      latex: None,
    }
  }
}

/// Requests a solution under `method`'s hint. A solver with no algorithm
/// for the equation is a normal "not found" outcome; other solver
/// failures are returned.
pub fn resolve(
  eq: &DifferentialEquation,
  method: Method,
  capability: &dyn AlgebraCapability,
) -> Result<SolutionResult, SolveError> {
  match capability.dsolve(&eq.as_equation(), eq.dependent_fn(), method.hint()) {
    Ok(solution) => Ok(SolutionResult {
      found: true,
      rendering: capability.render(&solution),
      latex: Some(capability.latex(&solution)),
    }),
    Err(
      SolveError::NotImplemented(reason) | SolveError::NotApplicable(reason),
    ) => {
      debug!(%method, %reason, "no closed form");
      Ok(SolutionResult::not_found())
    }
    Err(e) => Err(e),
  }
}
