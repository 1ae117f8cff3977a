//! Structural classification from the capability's hint tags.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::AlgebraCapability;
use crate::equation::DifferentialEquation;
use crate::functions::simplify::{contains_derivative, free_symbols};
use crate::homogeneity::is_homogeneous;

/// Capability tags for one equation, most specific first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationTags(Vec<String>);

impl ClassificationTags {
  pub fn new(tags: Vec<String>) -> Self {
    ClassificationTags(tags)
  }

  pub fn contains(&self, tag: &str) -> bool {
    self.0.iter().any(|t| t == tag)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }

  /// Largest leading numeral over tags such as `1st_linear` or
  /// `2nd_power_series_ordinary`.
  pub fn order(&self) -> Option<u32> {
    self
      .iter()
      .filter_map(|tag| {
        let digits: String =
          tag.chars().take_while(char::is_ascii_digit).collect();
        digits.parse::<u32>().ok()
      })
      .max()
  }

  pub fn mentions_linear(&self) -> bool {
    self.iter().any(|tag| tag.contains("linear"))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquationKind {
  Ordinary,
  Partial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
  pub kind: EquationKind,
  pub order: Option<u32>,
  pub is_linear: bool,
  pub is_homogeneous: bool,
}

/// Asks the capability for tags. A failure yields no tags, which leaves
/// the classification under-determined rather than failing the request.
pub fn classification_tags(
  eq: &DifferentialEquation,
  capability: &dyn AlgebraCapability,
) -> ClassificationTags {
  match capability.classify_ode(&eq.as_equation(), eq.dependent_fn()) {
    Ok(tags) => ClassificationTags::new(tags),
    Err(e) => {
      debug!(error = %e, "classification under-determined");
      ClassificationTags::default()
    }
  }
}

/// Ordinary when a derivative occurs and the independent variable is the
/// only free symbol.
pub fn equation_kind(eq: &DifferentialEquation) -> EquationKind {
  let residual = eq.residual();
  let symbols = free_symbols(&residual);
  let single_variable = match eq.independent_var() {
    crate::syntax::Expr::Identifier(x) => symbols.iter().all(|s| s == x),
    _ => false,
  };
  if contains_derivative(&residual) && single_variable {
    EquationKind::Ordinary
  } else {
    EquationKind::Partial
  }
}

pub fn classify(
  eq: &DifferentialEquation,
  tags: &ClassificationTags,
  capability: &dyn AlgebraCapability,
) -> Classification {
  Classification {
    kind: equation_kind(eq),
    order: tags.order(),
    is_linear: tags.mentions_linear(),
    is_homogeneous: is_homogeneous(eq, capability),
  }
}
