/// Exact-or-approximate number used for coefficient arithmetic.
///
/// Rationals are kept reduced with a positive denominator. Any operation
/// whose exact result would overflow `i128` degrades to `Real`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
  Rational(i128, i128),
  Real(f64),
}

pub fn gcd(a: i128, b: i128) -> i128 {
  let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
  while b != 0 {
    let t = b;
    b = a % b;
    a = t;
  }
  a.min(i128::MAX as u128) as i128
}

impl Num {
  pub fn int(n: i128) -> Self {
    Num::Rational(n, 1)
  }

  /// Builds a reduced rational, or `None` for a zero denominator.
  pub fn ratio(numer: i128, denom: i128) -> Option<Self> {
    if denom == 0 {
      return None;
    }
    let g = gcd(numer, denom).max(1);
    let (mut n, mut d) = (numer / g, denom / g);
    if d < 0 {
      match (n.checked_neg(), d.checked_neg()) {
        (Some(nn), Some(dd)) => {
          n = nn;
          d = dd;
        }
        _ => return Some(Num::Real(numer as f64 / denom as f64)),
      }
    }
    Some(Num::Rational(n, d))
  }

  pub fn to_f64(self) -> f64 {
    match self {
      Num::Rational(n, d) => n as f64 / d as f64,
      Num::Real(f) => f,
    }
  }

  pub fn is_zero(self) -> bool {
    match self {
      Num::Rational(n, _) => n == 0,
      Num::Real(f) => f == 0.0,
    }
  }

  pub fn is_one(self) -> bool {
    match self {
      Num::Rational(n, d) => n == 1 && d == 1,
      Num::Real(f) => f == 1.0,
    }
  }

  pub fn is_negative(self) -> bool {
    self.to_f64() < 0.0
  }

  pub fn as_integer(self) -> Option<i128> {
    match self {
      Num::Rational(n, 1) => Some(n),
      _ => None,
    }
  }

  pub fn is_exact(self) -> bool {
    matches!(self, Num::Rational(_, _))
  }

  pub fn abs(self) -> Self {
    if self.is_negative() { -self } else { self }
  }

  /// Division that refuses a zero divisor.
  pub fn checked_div(self, rhs: Self) -> Option<Self> {
    if rhs.is_zero() {
      return None;
    }
    match (self, rhs) {
      (Num::Rational(a, b), Num::Rational(c, d)) => {
        match (a.checked_mul(d), b.checked_mul(c)) {
          (Some(n), Some(m)) => Num::ratio(n, m),
          _ => Some(Num::Real(self.to_f64() / rhs.to_f64())),
        }
      }
      _ => Some(Num::Real(self.to_f64() / rhs.to_f64())),
    }
  }

  /// Integer power; `None` when raising zero to a negative power.
  pub fn pow_i(self, exponent: i128) -> Option<Self> {
    if exponent < 0 {
      let positive = self.pow_i(exponent.checked_neg()?)?;
      return Num::int(1).checked_div(positive);
    }
    match self {
      Num::Rational(n, d) => {
        let e = u32::try_from(exponent).ok();
        match e.and_then(|e| Some((n.checked_pow(e)?, d.checked_pow(e)?))) {
          Some((nn, dd)) => Num::ratio(nn, dd),
          None => Some(Num::Real(self.to_f64().powf(exponent as f64))),
        }
      }
      Num::Real(f) => Some(Num::Real(f.powf(exponent as f64))),
    }
  }

  /// Exact `q`-th root of a rational, when one exists.
  pub fn exact_root(self, q: u32) -> Option<Self> {
    let Num::Rational(n, d) = self else {
      return None;
    };
    if n < 0 && q % 2 == 0 {
      return None;
    }
    let root_n = integer_root(n.unsigned_abs(), q)?;
    let root_d = integer_root(d.unsigned_abs(), q)?;
    let signed = if n < 0 { -(root_n as i128) } else { root_n as i128 };
    Num::ratio(signed, root_d as i128)
  }

  pub fn to_expr(self) -> Expr {
    match self {
      Num::Rational(n, 1) => Expr::Integer(n),
      Num::Rational(n, d) => Expr::Rational(n, d),
      Num::Real(f) => Expr::Real(f),
    }
  }
}

fn integer_root(value: u128, q: u32) -> Option<u128> {
  if value < 2 || q == 1 {
    return Some(value);
  }
  let estimate = (value as f64).powf(1.0 / q as f64).round() as u128;
  let lo = estimate.saturating_sub(1);
  (lo..=estimate + 1).find(|c| c.checked_pow(q) == Some(value))
}

impl std::ops::Add for Num {
  type Output = Self;

  fn add(self, rhs: Self) -> Self {
    match (self, rhs) {
      (Num::Rational(a, b), Num::Rational(c, d)) => {
        let exact = a
          .checked_mul(d)
          .zip(c.checked_mul(b))
          .and_then(|(x, y)| x.checked_add(y))
          .zip(b.checked_mul(d))
          .and_then(|(n, m)| Num::ratio(n, m));
        exact.unwrap_or(Num::Real(self.to_f64() + rhs.to_f64()))
      }
      _ => Num::Real(self.to_f64() + rhs.to_f64()),
    }
  }
}

impl std::ops::Sub for Num {
  type Output = Self;

  fn sub(self, rhs: Self) -> Self {
    self + (-rhs)
  }
}

impl std::ops::Mul for Num {
  type Output = Self;

  fn mul(self, rhs: Self) -> Self {
    match (self, rhs) {
      (Num::Rational(a, b), Num::Rational(c, d)) => {
        let exact = a
          .checked_mul(c)
          .zip(b.checked_mul(d))
          .and_then(|(n, m)| Num::ratio(n, m));
        exact.unwrap_or(Num::Real(self.to_f64() * rhs.to_f64()))
      }
      _ => Num::Real(self.to_f64() * rhs.to_f64()),
    }
  }
}

impl std::ops::Neg for Num {
  type Output = Self;

  fn neg(self) -> Self {
    match self {
      Num::Rational(n, d) => match n.checked_neg() {
        Some(m) => Num::Rational(m, d),
        None => Num::Real(-(n as f64) / d as f64),
      },
      Num::Real(f) => Num::Real(-f),
    }
  }
}

impl std::iter::Sum for Num {
  fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
    iter.fold(Num::int(0), |a, b| a + b)
  }
}

/// Symbolic expression tree.
///
/// Built-in heads (`Plus`, `Times`, `Power`, `Log`, `Sin`, ...) are kept in
/// canonical form by the constructors in [`crate::functions::arithmetic`].
/// Any other `FunctionCall` (an applied unknown function such as `y(x)`, or
/// `Derivative[y(x), x, n]`) is an opaque atom.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Integer(i128),
  Rational(i128, i128),
  Real(f64),
  Identifier(String),
  /// `E` or `Pi`
  Constant(String),
  FunctionCall {
    name: String,
    args: Vec<Expr>,
  },
  Equation {
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
}

pub const BUILTIN_HEADS: &[&str] = &[
  "Plus", "Times", "Power", "Log", "Sin", "Cos", "Tan", "Sinh", "Cosh",
  "ArcTan", "ArcSin", "ArcCos",
];

impl Expr {
  pub fn symbol(name: &str) -> Self {
    Expr::Identifier(name.to_string())
  }

  pub fn e() -> Self {
    Expr::Constant("E".to_string())
  }

  /// `name(arg)` for an unknown (user) function.
  pub fn apply(name: &str, arg: Expr) -> Self {
    Expr::FunctionCall {
      name: name.to_string(),
      args: vec![arg],
    }
  }

  /// The opaque `Derivative[f(v), v, order]` atom.
  pub fn derivative(function: Expr, var: Expr, order: usize) -> Self {
    Expr::FunctionCall {
      name: "Derivative".to_string(),
      args: vec![function, var, Expr::Integer(order as i128)],
    }
  }

  pub fn equation(lhs: Expr, rhs: Expr) -> Self {
    Expr::Equation {
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn as_num(&self) -> Option<Num> {
    match self {
      Expr::Integer(n) => Some(Num::int(*n)),
      Expr::Rational(n, d) => Some(Num::Rational(*n, *d)),
      Expr::Real(f) => Some(Num::Real(*f)),
      _ => None,
    }
  }

  pub fn is_number(&self) -> bool {
    self.as_num().is_some()
  }

  pub fn is_zero(&self) -> bool {
    self.as_num().is_some_and(Num::is_zero)
  }

  pub fn head(&self) -> Option<&str> {
    match self {
      Expr::FunctionCall { name, .. } => Some(name.as_str()),
      _ => None,
    }
  }

  pub fn is_head(&self, head: &str) -> bool {
    self.head() == Some(head)
  }

  pub fn args(&self) -> &[Expr] {
    match self {
      Expr::FunctionCall { args, .. } => args,
      _ => &[],
    }
  }

  pub fn is_builtin(&self) -> bool {
    self.head().is_some_and(|h| BUILTIN_HEADS.contains(&h))
  }

  /// Order of a `Derivative` atom, if this is one.
  pub fn derivative_order(&self) -> Option<usize> {
    match self {
      Expr::FunctionCall { name, args }
        if name == "Derivative" && args.len() == 3 =>
      {
        match &args[2] {
          Expr::Integer(n) if *n >= 0 => Some(*n as usize),
          _ => None,
        }
      }
      _ => None,
    }
  }

  /// Splits `Power[b, e]` into its parts; anything else is `(self, 1)`.
  pub fn as_power(&self) -> (&Expr, Expr) {
    match self {
      Expr::FunctionCall { name, args }
        if name == "Power" && args.len() == 2 =>
      {
        (&args[0], args[1].clone())
      }
      _ => (self, Expr::Integer(1)),
    }
  }
}

impl std::fmt::Display for Expr {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&crate::functions::expr_form::expr_to_string(self))
  }
}
