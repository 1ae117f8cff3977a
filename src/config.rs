//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! [laplace]
//! parameters = ["a", "b", "omega"]
//!
//! [service]
//! timeout_ms = 5000
//!
//! [formulas]
//! version = 2
//! Exact = 'M\,dx + N\,dy = 0'
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::laplace::{DEFAULT_PARAMETERS, LaplaceEnvironment};
use crate::method::Method;
use crate::resolver::FormulaTable;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub laplace: LaplaceConfig,
  pub service: ServiceConfig,
  pub formulas: FormulaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaplaceConfig {
  /// Constant symbols accepted in transform input.
  pub parameters: Vec<String>,
}

impl Default for LaplaceConfig {
  fn default() -> Self {
    LaplaceConfig {
      parameters: DEFAULT_PARAMETERS.iter().map(|p| p.to_string()).collect(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
  /// Watchdog for a single request in `serve`.
  pub timeout_ms: u64,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    ServiceConfig { timeout_ms: 10_000 }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaConfig {
  pub version: Option<u32>,
  #[serde(flatten)]
  pub overrides: BTreeMap<Method, String>,
}

const RESERVED: &[&str] =
  &["t", "s", "f", "F", "E", "pi", "Pi", "DiracDelta"];

impl EngineConfig {
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let display = path.as_ref().display().to_string();
    let content =
      std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
      })?;
    Self::parse_toml(&content, &display)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
    Self::parse_toml(content, "<inline>")
  }

  fn parse_toml(content: &str, path: &str) -> Result<Self, ConfigError> {
    let config: EngineConfig =
      toml::from_str(content).map_err(|e| ConfigError::Invalid {
        path: path.to_string(),
        message: e.to_string(),
      })?;
    config.validate().map_err(|message| ConfigError::Invalid {
      path: path.to_string(),
      message,
    })?;
    Ok(config)
  }

  fn validate(&self) -> Result<(), String> {
    for p in &self.laplace.parameters {
      let mut chars = p.chars();
      let well_formed = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
      if !well_formed {
        return Err(format!("laplace.parameters: `{}` is not an identifier", p));
      }
      if RESERVED.contains(&p.as_str()) {
        return Err(format!("laplace.parameters: `{}` is reserved", p));
      }
    }
    if self.service.timeout_ms == 0 {
      return Err("service.timeout_ms must be positive".to_string());
    }
    Ok(())
  }

  pub fn formula_table(&self) -> FormulaTable {
    let base = FormulaTable::default();
    let version = self.formulas.version.unwrap_or(base.version());
    base.with_overrides(version, self.formulas.overrides.clone())
  }

  pub fn laplace_environment(&self) -> LaplaceEnvironment {
    LaplaceEnvironment::new(&self.laplace.parameters)
  }
}
