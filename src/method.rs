//! Priority routing of an equation to one solution method.
//!
//! The `separable` tag is checked first. After that each candidate is a
//! trial solve under the method's hint, and a failed trial is a
//! [`ProbeRejection`], never an error of the selection itself.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::capability::AlgebraCapability;
use crate::classifier::ClassificationTags;
use crate::equation::DifferentialEquation;
use crate::functions::ode_ast::{
  BERNOULLI, FIRST_EXACT, FIRST_LINEAR, SEPARABLE,
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
pub enum Method {
  Separable,
  FirstOrderLinear,
  Bernoulli,
  Exact,
  Unknown,
}

impl Method {
  pub const ALL: [Method; 5] = [
    Method::Separable,
    Method::FirstOrderLinear,
    Method::Bernoulli,
    Method::Exact,
    Method::Unknown,
  ];

  /// The solver hint requested for this method.
  pub fn hint(self) -> Option<&'static str> {
    match self {
      Method::Separable => Some(SEPARABLE),
      Method::FirstOrderLinear => Some(FIRST_LINEAR),
      Method::Bernoulli => Some(BERNOULLI),
      Method::Exact => Some(FIRST_EXACT),
      Method::Unknown => None,
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Method::Separable => "Separation of variables",
      Method::FirstOrderLinear => "First-order linear equation",
      Method::Bernoulli => "Bernoulli equation",
      Method::Exact => "Exact equation",
      Method::Unknown => "No specific method could be determined",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.description())
  }
}

/// A trial solve that did not go through.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{method:?} rejected: {reason}")]
pub struct ProbeRejection {
  pub method: Method,
  pub reason: String,
}

/// Trial-solves `eq` under `method`'s hint.
pub fn probe(
  eq: &DifferentialEquation,
  method: Method,
  capability: &dyn AlgebraCapability,
) -> Result<Method, ProbeRejection> {
  let hint = method.hint().ok_or_else(|| ProbeRejection {
    method,
    reason: "no hint to probe".to_string(),
  })?;
  capability
    .dsolve(&eq.as_equation(), eq.dependent_fn(), Some(hint))
    .map(|_| method)
    .map_err(|e| ProbeRejection {
      method,
      reason: e.to_string(),
    })
}

/// First match wins: the `separable` tag, then trial solves for
/// first-order linear (only when the tags call the equation linear),
/// Bernoulli and exact, and finally [`Method::Unknown`].
pub fn select_method(
  eq: &DifferentialEquation,
  tags: &ClassificationTags,
  is_linear: bool,
  capability: &dyn AlgebraCapability,
) -> Method {
  if tags.contains(SEPARABLE) {
    return Method::Separable;
  }
  let mut candidates = Vec::with_capacity(3);
  if is_linear {
    candidates.push(Method::FirstOrderLinear);
  } else {
    debug!("skipping linear probe for a nonlinear equation");
  }
  candidates.extend([Method::Bernoulli, Method::Exact]);
  for candidate in candidates {
    match probe(eq, candidate, capability) {
      Ok(method) => return method,
      Err(rejection) => debug!(%rejection, "probe rejected"),
    }
  }
  Method::Unknown
}
