//! The per-request equation model.

use crate::ParseError;
use crate::capability::AlgebraCapability;
use crate::functions::arithmetic::sub;
use crate::parser::Vocabulary;
use crate::syntax::Expr;

/// Which names play the independent and dependent roles for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquationContext {
  independent: String,
  dependent: String,
}

impl Default for EquationContext {
  fn default() -> Self {
    EquationContext::new("x", "y")
  }
}

impl EquationContext {
  pub fn new(independent: &str, dependent: &str) -> Self {
    EquationContext {
      independent: independent.to_string(),
      dependent: dependent.to_string(),
    }
  }

  pub fn independent_var(&self) -> Expr {
    Expr::symbol(&self.independent)
  }

  /// `y(x)`
  pub fn dependent_fn(&self) -> Expr {
    Expr::apply(&self.dependent, self.independent_var())
  }

  pub fn vocabulary(&self) -> Vocabulary {
    Vocabulary::default()
      .with_symbol(&self.independent)
      .with_function(&self.dependent, self.independent_var())
  }
}

/// A differential equation normalized to `lhs = rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct DifferentialEquation {
  independent_var: Expr,
  dependent_fn: Expr,
  lhs: Expr,
  rhs: Expr,
}

impl DifferentialEquation {
  /// Parses `text`; a bare expression `e` becomes `e = 0`.
  pub fn parse(
    text: &str,
    context: &EquationContext,
    capability: &dyn AlgebraCapability,
  ) -> Result<Self, ParseError> {
    let parsed = capability.parse(text, &context.vocabulary())?;
    Ok(Self::from_expr(parsed, context))
  }

  pub fn from_expr(expr: Expr, context: &EquationContext) -> Self {
    let (lhs, rhs) = match expr {
      Expr::Equation { lhs, rhs } => (*lhs, *rhs),
      other => (other, Expr::Integer(0)),
    };
    DifferentialEquation {
      independent_var: context.independent_var(),
      dependent_fn: context.dependent_fn(),
      lhs,
      rhs,
    }
  }

  pub fn independent_var(&self) -> &Expr {
    &self.independent_var
  }

  pub fn dependent_fn(&self) -> &Expr {
    &self.dependent_fn
  }

  pub fn lhs(&self) -> &Expr {
    &self.lhs
  }

  pub fn rhs(&self) -> &Expr {
    &self.rhs
  }

  /// `lhs - rhs`
  pub fn residual(&self) -> Expr {
    sub(self.lhs.clone(), self.rhs.clone())
  }

  pub fn as_equation(&self) -> Expr {
    Expr::equation(self.lhs.clone(), self.rhs.clone())
  }
}
