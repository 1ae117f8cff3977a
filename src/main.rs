use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use odesolve::logging::init_logger;
use odesolve::service::{guarded, serve};
use odesolve::{EngineConfig, Service};
use tokio::io::BufReader;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// TOML configuration file
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Log as JSON lines
  #[arg(long, global = true)]
  log_json: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Classify and solve a differential equation in y(x)
  Classify {
    /// e.g. "Derivative(y, x) + y - x"
    equation: String,
  },
  /// Laplace transform of an expression in t
  Laplace {
    expression: String,
    /// Initial value such as "f(0)=1" or "f'(0)=0"; repeatable
    #[arg(long = "ic", value_parser = parse_initial_condition)]
    initial_conditions: Vec<(String, String)>,
  },
  /// Inverse Laplace transform of an expression in s
  InverseLaplace { expression: String },
  /// Solve the built-in sample equations
  Examples,
  /// Answer newline-delimited JSON requests from stdin
  Serve,
}

fn parse_initial_condition(text: &str) -> Result<(String, String), String> {
  text
    .split_once('=')
    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
    .filter(|(k, v)| !k.is_empty() && !v.is_empty())
    .ok_or_else(|| format!("expected name=value, got `{}`", text))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logger(cli.verbose, cli.log_json);

  let config = match &cli.config {
    Some(path) => EngineConfig::from_file(path)
      .with_context(|| format!("loading {}", path.display()))?,
    None => EngineConfig::default(),
  };
  let service = Service::new(config);

  match cli.command {
    Commands::Classify { equation } => {
      print_json(&guarded(|| service.classify_and_solve(&equation))?)
    }
    Commands::Laplace {
      expression,
      initial_conditions,
    } => {
      let conditions: BTreeMap<String, String> =
        initial_conditions.into_iter().collect();
      print_json(&guarded(|| {
        service.forward_laplace(&expression, Some(&conditions))
      })?)
    }
    Commands::InverseLaplace { expression } => {
      print_json(&guarded(|| service.inverse_laplace(&expression))?)
    }
    Commands::Examples => print_json(&service.examples()),
    Commands::Serve => {
      let input = BufReader::new(tokio::io::stdin());
      serve(Arc::new(service), input, tokio::io::stdout()).await?;
      Ok(())
    }
  }
}
