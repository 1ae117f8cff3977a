use std::io::Write;

use super::*;
use odesolve::ConfigError;
use odesolve::method::Method;
use tempfile::NamedTempFile;

#[test]
fn defaults_without_a_file() {
  let config = EngineConfig::default();
  assert_eq!(config.service.timeout_ms, 10_000);
  assert_eq!(config.laplace.parameters, vec!["a", "b", "c", "k", "w"]);
  assert_eq!(config.formula_table().version(), 1);
}

#[test]
fn loads_from_file() {
  let mut file = NamedTempFile::new().unwrap();
  writeln!(
    file,
    r#"
[laplace]
parameters = ["alpha", "beta"]

[service]
timeout_ms = 250

[formulas]
version = 3
Exact = "M dx + N dy = 0"
"#
  )
  .unwrap();

  let config = EngineConfig::from_file(file.path()).unwrap();
  assert_eq!(config.service.timeout_ms, 250);
  let table = config.formula_table();
  assert_eq!(table.version(), 3);
  assert_eq!(table.formula(Method::Exact), "M dx + N dy = 0");

  let service = Service::new(config);
  assert!(service.forward_laplace("exp(-alpha*t)", None).is_ok());
  assert!(service.forward_laplace("exp(-a*t)", None).is_err());
}

#[test]
fn missing_file_is_a_read_error() {
  let dir = tempfile::tempdir().unwrap();
  let err =
    EngineConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
  assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn reserved_parameter_is_invalid() {
  let err = EngineConfig::from_toml_str("[laplace]\nparameters = [\"s\"]\n")
    .unwrap_err();
  assert!(err.to_string().contains("reserved"));
}

#[test]
fn zero_timeout_is_invalid() {
  let err =
    EngineConfig::from_toml_str("[service]\ntimeout_ms = 0\n").unwrap_err();
  assert!(matches!(err, ConfigError::Invalid { .. }));
}

#[test]
fn partial_tables_keep_defaults() {
  let config =
    EngineConfig::from_toml_str("[service]\ntimeout_ms = 5\n").unwrap();
  assert_eq!(config.laplace, EngineConfig::default().laplace);
  assert_eq!(config.formulas.version, None);
}
