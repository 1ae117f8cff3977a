//! The algebra capability the classification engine is driven by.
//!
//! Everything the engine needs from a computer-algebra system is behind
//! [`AlgebraCapability`]. The trait is object safe so the engine can be
//! handed `&dyn AlgebraCapability`, and tests can script one.

use crate::functions::expr_form::{expr_to_latex, expr_to_string};
use crate::functions::laplace_ast::{
  TransformVars, inverse_laplace_transform, laplace_transform,
};
use crate::functions::ode_ast::{
  InitialCondition, apply_initial_conditions, classify_ode, dsolve,
};
use crate::functions::simplify::{simplify, substitute};
use crate::functions::solve_ast::solve;
use crate::parser::{Vocabulary, parse_expression};
use crate::syntax::Expr;
use crate::{ParseError, SolveError, TransformError};

pub trait AlgebraCapability: Send + Sync {
  fn parse(
    &self,
    text: &str,
    vocabulary: &Vocabulary,
  ) -> Result<Expr, ParseError>;

  fn simplify(&self, expr: &Expr) -> Expr;

  fn substitute(&self, expr: &Expr, from: &Expr, to: &Expr) -> Expr;

  /// Candidate values of `target` with `expr = 0`.
  fn solve(&self, expr: &Expr, target: &Expr) -> Result<Vec<Expr>, SolveError>;

  /// Applicable hints for `eq` in `func`, most specific first.
  fn classify_ode(
    &self,
    eq: &Expr,
    func: &Expr,
  ) -> Result<Vec<String>, SolveError>;

  fn dsolve(
    &self,
    eq: &Expr,
    func: &Expr,
    hint: Option<&str>,
  ) -> Result<Expr, SolveError>;

  fn apply_initial_conditions(
    &self,
    solution: &Expr,
    func: &Expr,
    conditions: &[InitialCondition],
  ) -> Result<Expr, SolveError>;

  fn laplace_transform(
    &self,
    expr: &Expr,
    vars: &TransformVars,
  ) -> Result<Expr, TransformError>;

  fn inverse_laplace_transform(
    &self,
    expr: &Expr,
    vars: &TransformVars,
  ) -> Result<Expr, TransformError>;

  /// Plain, re-parseable text.
  fn render(&self, expr: &Expr) -> String;

  fn latex(&self, expr: &Expr) -> String;
}

/// The built-in engine over [`crate::functions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolicEngine;

impl AlgebraCapability for SymbolicEngine {
  fn parse(
    &self,
    text: &str,
    vocabulary: &Vocabulary,
  ) -> Result<Expr, ParseError> {
    parse_expression(text, vocabulary)
  }

  fn simplify(&self, expr: &Expr) -> Expr {
    simplify(expr)
  }

  fn substitute(&self, expr: &Expr, from: &Expr, to: &Expr) -> Expr {
    substitute(expr, from, to)
  }

  fn solve(&self, expr: &Expr, target: &Expr) -> Result<Vec<Expr>, SolveError> {
    solve(expr, target)
  }

  fn classify_ode(
    &self,
    eq: &Expr,
    func: &Expr,
  ) -> Result<Vec<String>, SolveError> {
    classify_ode(eq, func)
  }

  fn dsolve(
    &self,
    eq: &Expr,
    func: &Expr,
    hint: Option<&str>,
  ) -> Result<Expr, SolveError> {
    dsolve(eq, func, hint)
  }

  fn apply_initial_conditions(
    &self,
    solution: &Expr,
    func: &Expr,
    conditions: &[InitialCondition],
  ) -> Result<Expr, SolveError> {
    apply_initial_conditions(solution, func, conditions)
  }

  fn laplace_transform(
    &self,
    expr: &Expr,
    vars: &TransformVars,
  ) -> Result<Expr, TransformError> {
    laplace_transform(expr, vars)
  }

  fn inverse_laplace_transform(
    &self,
    expr: &Expr,
    vars: &TransformVars,
  ) -> Result<Expr, TransformError> {
    inverse_laplace_transform(expr, vars)
  }

  fn render(&self, expr: &Expr) -> String {
    expr_to_string(expr)
  }

  fn latex(&self, expr: &Expr) -> String {
    expr_to_latex(expr)
  }
}
