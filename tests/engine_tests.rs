use odesolve::capability::{AlgebraCapability, SymbolicEngine};
use odesolve::equation::{DifferentialEquation, EquationContext};
use odesolve::service::Service;
use odesolve::{EngineConfig, Expr};

fn parse_equation(text: &str) -> DifferentialEquation {
  let context = EquationContext::default();
  DifferentialEquation::parse(text, &context, &SymbolicEngine).unwrap()
}

mod engine_tests {
  use super::*;

  mod config;
  mod homogeneity;
  mod laplace;
  mod method_priority;
  mod parser;
  mod scenarios;
  mod service;
}
