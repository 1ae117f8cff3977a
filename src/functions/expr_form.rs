//! Rendering of canonical expressions, as re-parseable plain text and as
//! LaTeX.

use crate::functions::arithmetic::{canonical_cmp, neg, split_coefficient};
use crate::syntax::{Expr, Num};

/// Format a floating-point number for display. Magnitudes of `1e15` and
/// above use exponent form so they never read back as exact integers.
pub fn format_real_helper(f: f64) -> String {
  if f.abs() >= 1e15 {
    format!("{:e}", f)
  } else if f.fract() == 0.0 {
    format!("{:.1}", f)
  } else {
    format!("{}", f)
  }
}

fn plain_function_name(name: &str) -> &str {
  match name {
    "Log" => "log",
    "Sin" => "sin",
    "Cos" => "cos",
    "Tan" => "tan",
    "Sinh" => "sinh",
    "Cosh" => "cosh",
    "ArcTan" => "atan",
    "ArcSin" => "asin",
    "ArcCos" => "acos",
    other => other,
  }
}

/// Sum terms in display order: highest canonical order first, with a
/// positive term leading whenever there is one.
fn display_terms(args: &[Expr]) -> Vec<Expr> {
  let mut terms: Vec<Expr> = args.to_vec();
  terms.sort_by(|a, b| {
    canonical_cmp(&split_coefficient(a).1, &split_coefficient(b).1)
      .then_with(|| canonical_cmp(a, b))
  });
  // constants go last
  let constant_at = terms.iter().position(Expr::is_number);
  let constant = constant_at.map(|i| terms.remove(i));
  terms.reverse();
  terms.extend(constant);
  if let Some(first_positive) = terms
    .iter()
    .position(|t| !split_coefficient(t).0.is_negative())
    && first_positive > 0
  {
    let lead = terms.remove(first_positive);
    terms.insert(0, lead);
  }
  terms
}

/// Splits a product into (sign-free coefficient, numerator factors,
/// denominator factors). `exp(...)` always stays in the numerator.
fn fraction_parts(expr: &Expr) -> (Num, Vec<Expr>, Vec<Expr>) {
  let (coeff, rest) = split_coefficient(expr);
  let factors: Vec<Expr> = match rest {
    Expr::Integer(1) => Vec::new(),
    Expr::FunctionCall { ref name, ref args } if name == "Times" => {
      args.clone()
    }
    other => vec![other],
  };
  let mut numer = Vec::new();
  let mut denom = Vec::new();
  for factor in factors {
    let (base, exponent) = factor.as_power();
    match exponent.as_num() {
      Some(e) if e.is_negative() && *base != Expr::e() => {
        denom.push(crate::functions::arithmetic::power(
          base.clone(),
          (-e).to_expr(),
        ));
      }
      _ => numer.push(factor),
    }
  }
  (coeff, numer, denom)
}

fn precedence(expr: &Expr) -> u8 {
  match expr {
    Expr::Equation { .. } => 0,
    Expr::FunctionCall { name, .. } if name == "Plus" => 1,
    Expr::FunctionCall { name, .. } if name == "Times" => 2,
    Expr::Rational(_, _) => 2,
    Expr::Integer(n) if *n < 0 => 2,
    Expr::Real(f) if *f < 0.0 => 2,
    Expr::FunctionCall { name, args } if name == "Power" => {
      if args[0] == Expr::e() {
        4
      } else {
        let (_, numer, denom) = fraction_parts(expr);
        if denom.is_empty() && numer.len() == 1 { 3 } else { 2 }
      }
    }
    _ => 4,
  }
}

// ─── Plain text ────────────────────────────────────────────────────────

fn wrap_plain(expr: &Expr, min_prec: u8) -> String {
  let s = expr_to_string(expr);
  if precedence(expr) < min_prec {
    format!("({})", s)
  } else {
    s
  }
}

fn rational_string(n: i128, d: i128) -> String {
  if d == 1 {
    n.to_string()
  } else {
    format!("{}/{}", n, d)
  }
}

fn join_factors(factors: &[Expr]) -> String {
  factors
    .iter()
    .map(|f| wrap_plain(f, 3))
    .collect::<Vec<_>>()
    .join("*")
}

fn product_to_string(expr: &Expr) -> String {
  let (coeff, numer, denom) = fraction_parts(expr);
  let sign = if coeff.is_negative() { "-" } else { "" };
  let coeff = coeff.abs();
  let (c_num, c_den) = match coeff {
    Num::Rational(n, d) => (Some(n), d),
    Num::Real(f) => {
      let mut numer_str = format_real_helper(f);
      if !numer.is_empty() {
        numer_str = format!("{}*{}", numer_str, join_factors(&numer));
      }
      return format!("{}{}", sign, with_denominator(numer_str, &denom, 1));
    }
  };
  let numer_str = match (c_num, numer.is_empty()) {
    (Some(1), true) | (None, true) => "1".to_string(),
    (Some(1), false) | (None, false) => join_factors(&numer),
    (Some(n), true) => n.to_string(),
    (Some(n), false) => format!("{}*{}", n, join_factors(&numer)),
  };
  format!("{}{}", sign, with_denominator(numer_str, &denom, c_den))
}

fn with_denominator(numer: String, denom: &[Expr], c_den: i128) -> String {
  let mut parts: Vec<String> = Vec::new();
  if c_den != 1 {
    parts.push(c_den.to_string());
  }
  parts.extend(denom.iter().map(|f| wrap_plain(f, 3)));
  match parts.len() {
    0 => numer,
    1 => format!("{}/{}", numer, parts[0]),
    _ => format!("{}/({})", numer, parts.join("*")),
  }
}

/// Renders an expression in re-parseable infix notation (`exp(-x)`, `**`).
pub fn expr_to_string(expr: &Expr) -> String {
  match expr {
    Expr::Integer(n) => n.to_string(),
    Expr::Rational(n, d) => rational_string(*n, *d),
    Expr::Real(f) => format_real_helper(*f),
    Expr::Identifier(name) => name.clone(),
    Expr::Constant(c) => match c.as_str() {
      "Pi" => "pi".to_string(),
      other => other.to_string(),
    },
    Expr::Equation { lhs, rhs } => {
      format!("{} = {}", expr_to_string(lhs), expr_to_string(rhs))
    }
    Expr::FunctionCall { name, args } => match name.as_str() {
      "Plus" => {
        let mut out = String::new();
        for (i, term) in display_terms(args).iter().enumerate() {
          let negative = split_coefficient(term).0.is_negative();
          if i == 0 {
            out.push_str(&expr_to_string(term));
          } else if negative {
            out.push_str(" - ");
            out.push_str(&wrap_plain(&neg(term.clone()), 2));
          } else {
            out.push_str(" + ");
            out.push_str(&expr_to_string(term));
          }
        }
        out
      }
      "Times" => product_to_string(expr),
      "Power" => {
        let (base, exponent) = (&args[0], &args[1]);
        if *base == Expr::e() {
          return format!("exp({})", expr_to_string(exponent));
        }
        match exponent {
          Expr::Rational(1, 2) => format!("sqrt({})", expr_to_string(base)),
          _ if exponent.as_num().is_some_and(Num::is_negative) => {
            product_to_string(expr)
          }
          _ => {
            let exp_str = match exponent {
              Expr::Integer(n) if *n >= 0 => n.to_string(),
              Expr::Identifier(s) => s.clone(),
              other => format!("({})", expr_to_string(other)),
            };
            format!("{}**{}", wrap_plain(base, 4), exp_str)
          }
        }
      }
      "Derivative" if args.len() == 3 => {
        let order = expr.derivative_order().unwrap_or(1);
        if order == 1 {
          format!(
            "Derivative({}, {})",
            expr_to_string(&args[0]),
            expr_to_string(&args[1])
          )
        } else {
          format!(
            "Derivative({}, {}, {})",
            expr_to_string(&args[0]),
            expr_to_string(&args[1]),
            order
          )
        }
      }
      other => {
        let rendered: Vec<String> = args.iter().map(expr_to_string).collect();
        format!("{}({})", plain_function_name(other), rendered.join(", "))
      }
    },
  }
}

// ─── LaTeX ─────────────────────────────────────────────────────────────

fn latex_symbol(name: &str) -> String {
  let split = name
    .char_indices()
    .find(|(i, c)| *i > 0 && c.is_ascii_digit())
    .map(|(i, _)| i);
  let base = match split {
    Some(i) => &name[..i],
    None => name,
  };
  let base = match base {
    "omega" => "\\omega".to_string(),
    "alpha" => "\\alpha".to_string(),
    "beta" => "\\beta".to_string(),
    other => other.to_string(),
  };
  match split {
    Some(i) => format!("{}_{{{}}}", base, &name[i..]),
    None => base,
  }
}

fn wrap_latex(expr: &Expr, min_prec: u8) -> String {
  let s = expr_to_latex(expr);
  if precedence(expr) < min_prec {
    format!("\\left({}\\right)", s)
  } else {
    s
  }
}

fn latex_product(expr: &Expr) -> String {
  let (coeff, numer, denom) = fraction_parts(expr);
  let sign = if coeff.is_negative() { "- " } else { "" };
  let coeff = coeff.abs();
  let (c_num, c_den) = match coeff {
    Num::Rational(n, d) => (format!("{}", n), d.to_string()),
    Num::Real(f) => (format_real_helper(f), "1".to_string()),
  };
  let join = |fs: &[Expr]| {
    fs.iter()
      .map(|f| wrap_latex(f, 3))
      .collect::<Vec<_>>()
      .join(" ")
  };
  let mut top = join(&numer);
  if c_num != "1" {
    top = if top.is_empty() {
      c_num
    } else {
      format!("{} {}", c_num, top)
    };
  }
  if top.is_empty() {
    top = "1".to_string();
  }
  let mut bottom = join(&denom);
  if c_den != "1" {
    bottom = if bottom.is_empty() {
      c_den
    } else {
      format!("{} {}", c_den, bottom)
    };
  }
  if bottom.is_empty() {
    format!("{}{}", sign, top)
  } else {
    format!("{}\\frac{{{}}}{{{}}}", sign, top, bottom)
  }
}

fn latex_function_name(name: &str) -> String {
  match name {
    "Log" => "\\log".to_string(),
    "Sin" => "\\sin".to_string(),
    "Cos" => "\\cos".to_string(),
    "Tan" => "\\tan".to_string(),
    "Sinh" => "\\sinh".to_string(),
    "Cosh" => "\\cosh".to_string(),
    "ArcTan" => "\\operatorname{atan}".to_string(),
    "ArcSin" => "\\operatorname{asin}".to_string(),
    "ArcCos" => "\\operatorname{acos}".to_string(),
    "DiracDelta" => "\\delta".to_string(),
    other => latex_symbol(other),
  }
}

/// Renders an expression as LaTeX for display.
pub fn expr_to_latex(expr: &Expr) -> String {
  match expr {
    Expr::Integer(n) => n.to_string(),
    Expr::Rational(n, d) if *n < 0 => format!("- \\frac{{{}}}{{{}}}", -n, d),
    Expr::Rational(n, d) => format!("\\frac{{{}}}{{{}}}", n, d),
    Expr::Real(f) => format_real_helper(*f),
    Expr::Identifier(name) => latex_symbol(name),
    Expr::Constant(c) => match c.as_str() {
      "Pi" => "\\pi".to_string(),
      "E" => "e".to_string(),
      other => other.to_string(),
    },
    Expr::Equation { lhs, rhs } => {
      format!("{} = {}", expr_to_latex(lhs), expr_to_latex(rhs))
    }
    Expr::FunctionCall { name, args } => match name.as_str() {
      "Plus" => {
        let mut out = String::new();
        for (i, term) in display_terms(args).iter().enumerate() {
          let negative = split_coefficient(term).0.is_negative();
          if i == 0 {
            out.push_str(&expr_to_latex(term));
          } else if negative {
            out.push_str(" - ");
            out.push_str(&wrap_latex(&neg(term.clone()), 2));
          } else {
            out.push_str(" + ");
            out.push_str(&expr_to_latex(term));
          }
        }
        out
      }
      "Times" => latex_product(expr),
      "Power" => {
        let (base, exponent) = (&args[0], &args[1]);
        if *base == Expr::e() {
          return format!("e^{{{}}}", expr_to_latex(exponent));
        }
        match exponent {
          Expr::Rational(1, 2) => format!("\\sqrt{{{}}}", expr_to_latex(base)),
          _ if exponent.as_num().is_some_and(Num::is_negative) => {
            latex_product(expr)
          }
          _ => format!(
            "{}^{{{}}}",
            wrap_latex(base, 4),
            expr_to_latex(exponent)
          ),
        }
      }
      "Derivative" if args.len() == 3 => {
        let order = expr.derivative_order().unwrap_or(1);
        let var = expr_to_latex(&args[1]);
        let function = expr_to_latex(&args[0]);
        if order == 1 {
          format!("\\frac{{d}}{{d {}}} {}", var, function)
        } else {
          format!(
            "\\frac{{d^{{{}}}}}{{d {}^{{{}}}}} {}",
            order, var, order, function
          )
        }
      }
      other => {
        let rendered: Vec<String> = args.iter().map(expr_to_latex).collect();
        format!(
          "{}{{\\left({} \\right)}}",
          latex_function_name(other),
          rendered.join(", ")
        )
      }
    },
  }
}
