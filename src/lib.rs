//! Classification, method routing and closed-form solving of ordinary
//! differential equations, plus forward and inverse Laplace transforms.
//!
//! The [`service::Service`] operations are the outer boundary. Everything
//! symbolic goes through an [`capability::AlgebraCapability`], of which
//! [`capability::SymbolicEngine`] is the built-in implementation.

use thiserror::Error;

pub mod capability;
pub mod classifier;
pub mod config;
pub mod equation;
pub mod functions;
pub mod homogeneity;
pub mod laplace;
pub mod logging;
pub mod method;
pub mod parser;
pub mod resolver;
pub mod service;
pub mod syntax;

pub use capability::{AlgebraCapability, SymbolicEngine};
pub use classifier::{Classification, ClassificationTags, EquationKind};
pub use config::EngineConfig;
pub use equation::{DifferentialEquation, EquationContext};
pub use laplace::LaplaceEnvironment;
pub use method::Method;
pub use resolver::{FormulaTable, SolutionResult};
pub use service::Service;
pub use syntax::Expr;

/// Input text that cannot become a symbolic expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
  #[error("empty input")]
  Empty,
  #[error("syntax error at line {line}, column {column}: {message}")]
  Syntax {
    line: usize,
    column: usize,
    message: String,
  },
  #[error("unknown identifier `{0}`")]
  UnknownIdentifier(String),
  #[error("unsupported construct: {0}")]
  Unsupported(String),
}

/// Failures of the algebraic and differential solvers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
  /// No algorithm exists for this hint or equation.
  #[error("not implemented: {0}")]
  NotImplemented(String),
  /// The requested hint does not match the equation's form.
  #[error("not applicable: {0}")]
  NotApplicable(String),
  #[error("not invertible: {0}")]
  NotInvertible(String),
  #[error("internal error: {0}")]
  Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
  #[error("no Laplace transform rule for {0}")]
  Forward(String),
  #[error("no inverse Laplace transform rule for {0}")]
  Inverse(String),
  #[error(transparent)]
  Solve(#[from] SolveError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("cannot read config {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("invalid config {path}: {message}")]
  Invalid { path: String, message: String },
}

/// The single failure a service operation reports.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
  #[error("Error processing equation: {0}")]
  Parse(#[from] ParseError),
  #[error("Error processing equation: {0}")]
  Transform(#[from] TransformError),
  #[error("Error processing equation: {0}")]
  Capability(String),
  #[error("Request timed out after {0} ms")]
  Timeout(u64),
  #[error("Invalid request: {0}")]
  BadRequest(String),
}

impl From<SolveError> for ServiceError {
  fn from(e: SolveError) -> Self {
    ServiceError::Capability(e.to_string())
  }
}
