//! Forward and inverse Laplace transforms of user input.
//!
//! Each request builds its own [`LaplaceEnvironment`], which fixes the
//! time and frequency variables, the functions `f(t)` and `F(s)`, the
//! declared constant parameters, and the initial-value names.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::capability::AlgebraCapability;
use crate::functions::laplace_ast::{TransformVars, initial_value};
use crate::functions::ode_ast::InitialCondition;
use crate::functions::simplify::contains_derivative;
use crate::parser::Vocabulary;
use crate::syntax::Expr;
use crate::{ParseError, ServiceError, SolveError, TransformError};

/// Highest derivative order an initial-value name may refer to.
const MAX_INITIAL_ORDER: usize = 4;

pub const DEFAULT_PARAMETERS: &[&str] = &["a", "b", "c", "k", "w"];

#[derive(Debug, Clone, PartialEq)]
pub struct LaplaceEnvironment {
  time_var: Expr,
  freq_var: Expr,
  time_fn: Expr,
  freq_fn: Expr,
  parameters: Vec<String>,
  /// `f(0)`, `f'(0)`, `y'(0)`, ... -> (order, placeholder atom)
  derivative_aliases: BTreeMap<String, (usize, Expr)>,
}

impl Default for LaplaceEnvironment {
  fn default() -> Self {
    let parameters: Vec<String> =
      DEFAULT_PARAMETERS.iter().map(|p| p.to_string()).collect();
    LaplaceEnvironment::new(&parameters)
  }
}

impl LaplaceEnvironment {
  pub fn new(parameters: &[String]) -> Self {
    let t = Expr::symbol("t");
    let s = Expr::symbol("s");
    let time_fn = Expr::apply("f", t.clone());
    let mut derivative_aliases = BTreeMap::new();
    for k in 0..=MAX_INITIAL_ORDER {
      let placeholder = initial_value(&time_fn, k);
      for name in ["f", "y"] {
        derivative_aliases.insert(
          format!("{}{}(0)", name, "'".repeat(k)),
          (k, placeholder.clone()),
        );
      }
    }
    LaplaceEnvironment {
      freq_fn: Expr::apply("F", s.clone()),
      time_var: t,
      freq_var: s,
      time_fn,
      parameters: parameters.to_vec(),
      derivative_aliases,
    }
  }

  pub fn time_fn(&self) -> &Expr {
    &self.time_fn
  }

  fn with_parameters(&self, vocabulary: Vocabulary) -> Vocabulary {
    self
      .parameters
      .iter()
      .fold(vocabulary, |v, p| v.with_symbol(p))
  }

  pub fn time_vocabulary(&self) -> Vocabulary {
    let Expr::Identifier(t) = &self.time_var else {
      return Vocabulary::default();
    };
    self.with_parameters(
      Vocabulary::default()
        .with_symbol(t)
        .with_function("f", self.time_var.clone())
        .with_function("DiracDelta", self.time_var.clone()),
    )
  }

  pub fn frequency_vocabulary(&self) -> Vocabulary {
    let Expr::Identifier(s) = &self.freq_var else {
      return Vocabulary::default();
    };
    self.with_parameters(
      Vocabulary::default()
        .with_symbol(s)
        .with_function("F", self.freq_var.clone()),
    )
  }

  pub fn transform_vars(&self) -> TransformVars {
    TransformVars {
      t: self.time_var.clone(),
      s: self.freq_var.clone(),
      time_fn: self.time_fn.clone(),
      freq_fn: self.freq_fn.clone(),
    }
  }

  /// The placeholder an initial-value name such as `f'(0)` stands for.
  pub fn alias(&self, name: &str) -> Option<&(usize, Expr)> {
    let key: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    self.derivative_aliases.get(&key)
  }

  /// Resolves `name -> value text` pairs against the aliases.
  pub fn initial_conditions(
    &self,
    given: &BTreeMap<String, String>,
    capability: &dyn AlgebraCapability,
  ) -> Result<Vec<(InitialCondition, Expr)>, ParseError> {
    let vocabulary = self.with_parameters(Vocabulary::default());
    given
      .iter()
      .map(|(name, value)| {
        let (order, placeholder) = self
          .alias(name)
          .cloned()
          .ok_or_else(|| ParseError::UnknownIdentifier(name.clone()))?;
        let value = capability.parse(value, &vocabulary)?;
        Ok((
          InitialCondition {
            order,
            at: Expr::Integer(0),
            value,
          },
          placeholder,
        ))
      })
      .collect()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardLaplace {
  pub time_domain: String,
  pub laplace_transform: String,
  pub simplified_form: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InverseLaplace {
  pub laplace_domain: String,
  pub time_domain: String,
  pub simplified_form: String,
}

fn substitute_all(
  expr: &Expr,
  pairs: &[(Expr, Expr)],
  capability: &dyn AlgebraCapability,
) -> Expr {
  pairs
    .iter()
    .fold(expr.clone(), |acc, (from, to)| capability.substitute(&acc, from, to))
}

fn transform_sides(
  expr: &Expr,
  vars: &TransformVars,
  capability: &dyn AlgebraCapability,
) -> Result<Expr, TransformError> {
  match expr {
    Expr::Equation { lhs, rhs } => Ok(Expr::equation(
      capability.laplace_transform(lhs, vars)?,
      capability.laplace_transform(rhs, vars)?,
    )),
    other => capability.laplace_transform(other, vars),
  }
}

/// Solves a differential input for `f(t)` and fixes its constants.
fn solve_time_domain(
  expr: &Expr,
  env: &LaplaceEnvironment,
  conditions: &[InitialCondition],
  capability: &dyn AlgebraCapability,
) -> Result<Expr, SolveError> {
  let general = capability.dsolve(expr, env.time_fn(), None)?;
  let particular =
    capability.apply_initial_conditions(&general, env.time_fn(), conditions)?;
  match particular {
    Expr::Equation { lhs, rhs } if *lhs == *env.time_fn() => Ok(*rhs),
    other => Err(SolveError::NotInvertible(format!(
      "{} is not explicit in {}",
      other,
      env.time_fn()
    ))),
  }
}

/// `L{text}`. A differential input is solved first and its solution
/// transformed; when solving fails the input itself is transformed with
/// the derivative rule.
pub fn forward_transform(
  text: &str,
  initial: &BTreeMap<String, String>,
  env: &LaplaceEnvironment,
  capability: &dyn AlgebraCapability,
) -> Result<ForwardLaplace, ServiceError> {
  let parsed = capability.parse(text, &env.time_vocabulary())?;
  let resolved = env.initial_conditions(initial, capability)?;
  let values: Vec<(Expr, Expr)> = resolved
    .iter()
    .map(|(c, placeholder)| (placeholder.clone(), c.value.clone()))
    .collect();
  let conditions: Vec<InitialCondition> =
    resolved.into_iter().map(|(c, _)| c).collect();
  let expr = substitute_all(&parsed, &values, capability);

  let time_domain = if contains_derivative(&expr) {
    match solve_time_domain(&expr, env, &conditions, capability) {
      Ok(solution) => solution,
      Err(e) => {
        debug!(error = %e, "transforming the unsolved equation");
        expr
      }
    }
  } else {
    expr
  };
  let vars = env.transform_vars();
  let transform = transform_sides(&time_domain, &vars, capability)?;
  let transform = substitute_all(&transform, &values, capability);
  let simplified = capability.simplify(&transform);
  Ok(ForwardLaplace {
    time_domain: capability.render(&time_domain),
    laplace_transform: capability.render(&transform),
    simplified_form: capability.render(&simplified),
  })
}

/// `L^-1{text}`.
pub fn inverse_transform(
  text: &str,
  env: &LaplaceEnvironment,
  capability: &dyn AlgebraCapability,
) -> Result<InverseLaplace, ServiceError> {
  let parsed = capability.parse(text, &env.frequency_vocabulary())?;
  let time =
    capability.inverse_laplace_transform(&parsed, &env.transform_vars())?;
  let simplified = capability.simplify(&time);
  Ok(InverseLaplace {
    laplace_domain: capability.render(&parsed),
    time_domain: capability.render(&time),
    simplified_form: capability.render(&simplified),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::capability::SymbolicEngine;

  #[test]
  fn initial_value_names_resolve_in_both_styles() {
    let env = LaplaceEnvironment::default();
    let (order, placeholder) = env.alias("y'(0)").cloned().unwrap();
    assert_eq!(order, 1);
    assert_eq!(Some(&(1, placeholder)), env.alias("f' (0)"));
    assert!(env.alias("g(0)").is_none());
  }

  #[test]
  fn parameters_are_declared_per_environment() {
    let env = LaplaceEnvironment::new(&["q".to_string()]);
    assert!(env.time_vocabulary().declares("q"));
    assert!(!env.time_vocabulary().declares("a"));
    assert!(env.time_vocabulary().declares("DiracDelta"));
    assert!(env.frequency_vocabulary().declares("F"));
  }

  #[test]
  fn unknown_initial_value_name_is_rejected() {
    let env = LaplaceEnvironment::default();
    let given = BTreeMap::from([("g(0)".to_string(), "1".to_string())]);
    let err = env.initial_conditions(&given, &SymbolicEngine).unwrap_err();
    assert_eq!(err, ParseError::UnknownIdentifier("g(0)".to_string()));
  }
}
