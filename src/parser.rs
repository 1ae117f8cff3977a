//! Text to [`Expr`] conversion against a declared vocabulary.
//!
//! Every identifier in the input must be a declared symbol, a declared
//! function, an alias, or one of the known elementary functions. A bare
//! function name stands for its application, so with `y` declared over `x`
//! the input `y` reads as `y(x)`.

use std::collections::{BTreeMap, BTreeSet};

use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::ParseError;
use crate::functions::arithmetic::{
  call, div, exp, neg, plus, power, sqrt, sub, times,
};
use crate::functions::calculus_ast::differentiate;
use crate::syntax::Expr;

#[derive(Parser)]
#[grammar = "expression.pest"]
pub struct ExpressionParser;

/// Elementary functions accepted in input, lowercase as typed.
pub const KNOWN_FUNCTIONS: &[&str] = &[
  "exp", "log", "ln", "sqrt", "sin", "cos", "tan", "sinh", "cosh", "atan",
  "Derivative", "diff", "Eq",
];

/// The names an input text may mention.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
  symbols: BTreeSet<String>,
  /// function name -> the argument it is applied to when written bare
  functions: BTreeMap<String, Expr>,
  aliases: BTreeMap<String, Expr>,
}

impl Default for Vocabulary {
  fn default() -> Self {
    let pi = Expr::Constant("Pi".to_string());
    Vocabulary {
      symbols: BTreeSet::new(),
      functions: BTreeMap::new(),
      aliases: BTreeMap::from([
        ("E".to_string(), Expr::e()),
        ("pi".to_string(), pi.clone()),
        ("Pi".to_string(), pi),
      ]),
    }
  }
}

impl Vocabulary {
  pub fn with_symbol(mut self, name: &str) -> Self {
    self.symbols.insert(name.to_string());
    self
  }

  pub fn with_function(mut self, name: &str, arg: Expr) -> Self {
    self.functions.insert(name.to_string(), arg);
    self
  }

  pub fn with_alias(mut self, name: &str, expr: Expr) -> Self {
    self.aliases.insert(name.to_string(), expr);
    self
  }

  pub fn declares(&self, name: &str) -> bool {
    self.symbols.contains(name)
      || self.functions.contains_key(name)
      || self.aliases.contains_key(name)
  }

  fn resolve(&self, name: &str) -> Option<Expr> {
    if let Some(expr) = self.aliases.get(name) {
      return Some(expr.clone());
    }
    if self.symbols.contains(name) {
      return Some(Expr::symbol(name));
    }
    self
      .functions
      .get(name)
      .map(|arg| Expr::apply(name, arg.clone()))
  }
}

/// Parses `text` into a canonical expression, or an `Equation` when the
/// text contains `==`, `=` or `Eq(..)`.
pub fn parse_expression(
  text: &str,
  vocabulary: &Vocabulary,
) -> Result<Expr, ParseError> {
  if text.trim().is_empty() {
    return Err(ParseError::Empty);
  }
  let program = ExpressionParser::parse(Rule::Program, text)
    .map_err(syntax_error)?
    .next()
    .ok_or(ParseError::Empty)?;
  let statement = program.into_inner().next().ok_or(ParseError::Empty)?;
  let expr = Builder { vocabulary }.build(statement)?;
  reject_degenerate(&expr)?;
  Ok(expr)
}

fn syntax_error(e: pest::error::Error<Rule>) -> ParseError {
  let (line, column) = match e.line_col {
    LineColLocation::Pos(p) | LineColLocation::Span(p, _) => p,
  };
  ParseError::Syntax {
    line,
    column,
    message: e.variant.message().into_owned(),
  }
}

struct Builder<'a> {
  vocabulary: &'a Vocabulary,
}

impl Builder<'_> {
  fn build(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
    match pair.as_rule() {
      Rule::Statement => {
        let mut inner = pair.into_inner();
        let lhs = self.next_expr(&mut inner)?;
        match inner.next() {
          Some(_) => Ok(Expr::equation(lhs, self.next_expr(&mut inner)?)),
          None => Ok(lhs),
        }
      }
      Rule::Sum => {
        let mut inner = pair.into_inner();
        let mut terms = vec![self.next_expr(&mut inner)?];
        while let Some(op) = inner.next() {
          let term = self.next_expr(&mut inner)?;
          terms.push(if op.as_str() == "-" { neg(term) } else { term });
        }
        Ok(plus(terms))
      }
      Rule::Product => {
        let mut inner = pair.into_inner();
        let mut acc = self.next_expr(&mut inner)?;
        while let Some(op) = inner.next() {
          let factor = self.next_expr(&mut inner)?;
          acc = match op.as_str() {
            "/" => div(acc, factor),
            _ => times(vec![acc, factor]),
          };
        }
        Ok(acc)
      }
      Rule::Unary => {
        let mut negative = false;
        let mut body = None;
        for p in pair.into_inner() {
          match p.as_rule() {
            Rule::SignOp => negative ^= p.as_str() == "-",
            _ => body = Some(self.build(p)?),
          }
        }
        let body = body.ok_or(ParseError::Empty)?;
        Ok(if negative { neg(body) } else { body })
      }
      Rule::Power => {
        let mut inner = pair.into_inner();
        let base = self.next_expr(&mut inner)?;
        match inner.next() {
          Some(_) => Ok(power(base, self.next_expr(&mut inner)?)),
          None => Ok(base),
        }
      }
      Rule::Group => {
        let mut inner = pair.into_inner();
        self.next_expr(&mut inner)
      }
      Rule::Number => Ok(number(pair.as_str())),
      Rule::Identifier => self.identifier(pair.as_str()),
      Rule::FunctionCall => {
        let mut inner = pair.into_inner();
        let name = inner.next().ok_or(ParseError::Empty)?.as_str().to_string();
        let args = inner
          .map(|p| self.build(p))
          .collect::<Result<Vec<_>, _>>()?;
        self.function_call(&name, args)
      }
      _ => Err(ParseError::Unsupported(pair.as_str().to_string())),
    }
  }

  fn next_expr(
    &self,
    inner: &mut pest::iterators::Pairs<Rule>,
  ) -> Result<Expr, ParseError> {
    self.build(inner.next().ok_or(ParseError::Empty)?)
  }

  fn identifier(&self, name: &str) -> Result<Expr, ParseError> {
    if let Some(expr) = self.vocabulary.resolve(name) {
      return Ok(expr);
    }
    if KNOWN_FUNCTIONS.contains(&name) {
      return Err(ParseError::Unsupported(format!(
        "`{}` used without arguments",
        name
      )));
    }
    Err(ParseError::UnknownIdentifier(name.to_string()))
  }

  fn function_call(
    &self,
    name: &str,
    mut args: Vec<Expr>,
  ) -> Result<Expr, ParseError> {
    let unary = |head: &str, args: &mut Vec<Expr>| -> Result<Expr, ParseError> {
      match args.len() {
        1 => Ok(call(head, vec![args.remove(0)])),
        n => Err(arity(name, 1, n)),
      }
    };
    match name {
      "exp" => match args.len() {
        1 => Ok(exp(args.remove(0))),
        n => Err(arity(name, 1, n)),
      },
      "sqrt" => match args.len() {
        1 => Ok(sqrt(args.remove(0))),
        n => Err(arity(name, 1, n)),
      },
      "log" | "ln" if args.len() == 2 => {
        let base = args.remove(1);
        Ok(div(
          call("Log", vec![args.remove(0)]),
          call("Log", vec![base]),
        ))
      }
      "log" | "ln" => unary("Log", &mut args),
      "sin" => unary("Sin", &mut args),
      "cos" => unary("Cos", &mut args),
      "tan" => unary("Tan", &mut args),
      "sinh" => unary("Sinh", &mut args),
      "cosh" => unary("Cosh", &mut args),
      "atan" => unary("ArcTan", &mut args),
      "Eq" => match args.len() {
        1 => Ok(Expr::equation(args.remove(0), Expr::Integer(0))),
        2 => {
          let rhs = args.remove(1);
          Ok(Expr::equation(args.remove(0), rhs))
        }
        n => Err(arity(name, 2, n)),
      },
      "Derivative" | "diff" => derivative(args),
      _ if self.vocabulary.functions.contains_key(name) => {
        Ok(Expr::FunctionCall {
          name: name.to_string(),
          args,
        })
      }
      _ => Err(ParseError::UnknownIdentifier(name.to_string())),
    }
  }
}

fn arity(name: &str, expected: usize, got: usize) -> ParseError {
  ParseError::Unsupported(format!(
    "{}() takes {} argument(s), {} given",
    name, expected, got
  ))
}

fn number(text: &str) -> Expr {
  match text.parse::<i128>() {
    Ok(n) => Expr::Integer(n),
    Err(_) => Expr::Real(text.parse::<f64>().unwrap_or(f64::NAN)),
  }
}

/// Highest total derivative order accepted in input.
pub const MAX_DERIVATIVE_ORDER: usize = 32;

/// `Derivative(f, x, x)`, `Derivative(f, x, 2)` and `Derivative(f)` for a
/// function of one variable. A count applies to the variable just before
/// it, so `Derivative(f, x, x, 2)` is of order 3.
fn derivative(mut args: Vec<Expr>) -> Result<Expr, ParseError> {
  if args.is_empty() {
    return Err(arity("Derivative", 1, 0));
  }
  let function = args.remove(0);
  let mut plan: Vec<(Expr, usize)> = Vec::new();
  let mut counted = true;
  for arg in args {
    if let Expr::Integer(n) = arg {
      let entry = plan.last_mut().filter(|_| !counted).ok_or_else(|| {
        ParseError::Unsupported(format!(
          "derivative count {} does not follow a variable",
          n
        ))
      })?;
      entry.1 = usize::try_from(n).map_err(|_| {
        ParseError::Unsupported(format!("derivative order {}", n))
      })?;
      counted = true;
      continue;
    }
    if !matches!(arg, Expr::Identifier(_)) {
      return Err(ParseError::Unsupported(format!(
        "derivative variable {}",
        arg
      )));
    }
    plan.push((arg, 1));
    counted = false;
  }
  if plan.is_empty() {
    match function.args() {
      [var @ Expr::Identifier(_)] if !function.is_builtin() => {
        plan.push((var.clone(), 1))
      }
      _ => {
        return Err(ParseError::Unsupported(format!(
          "derivative of {} needs a variable",
          function
        )));
      }
    }
  }
  let total = plan
    .iter()
    .try_fold(0usize, |acc, (_, count)| acc.checked_add(*count));
  if total.is_none_or(|total| total > MAX_DERIVATIVE_ORDER) {
    return Err(ParseError::Unsupported(format!(
      "derivative order above {}",
      MAX_DERIVATIVE_ORDER
    )));
  }
  let mut out = function;
  for (var, count) in plan {
    for _ in 0..count {
      out = differentiate(&out, &var)
        .map_err(|e| ParseError::Unsupported(e.to_string()))?;
    }
  }
  Ok(out)
}

/// Rejects values with no finite meaning: non-finite reals, division by
/// zero and `log(0)`.
fn reject_degenerate(expr: &Expr) -> Result<(), ParseError> {
  match expr {
    Expr::Real(f) if !f.is_finite() => Err(ParseError::Unsupported(format!(
      "number {} is out of range",
      f
    ))),
    Expr::FunctionCall { name, args } => {
      match (name.as_str(), args.as_slice()) {
        ("Power", [base, exponent])
          if base.is_zero()
            && exponent.as_num().is_some_and(|e| e.is_negative()) =>
        {
          return Err(ParseError::Unsupported("division by zero".to_string()));
        }
        ("Log", [arg]) if arg.is_zero() => {
          return Err(ParseError::Unsupported("log(0)".to_string()));
        }
        _ => {}
      }
      args.iter().try_for_each(reject_degenerate)
    }
    Expr::Equation { lhs, rhs } => {
      reject_degenerate(lhs)?;
      reject_degenerate(rhs)
    }
    _ => Ok(()),
  }
}

/// Convenience for `lhs - rhs` of a parsed equality, or the expression
/// itself.
pub fn residual_of(expr: &Expr) -> Expr {
  match expr {
    Expr::Equation { lhs, rhs } => sub((**lhs).clone(), (**rhs).clone()),
    other => other.clone(),
  }
}
