use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::config::AcceleratorConfig;
use crate::error::Result;

const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// Simulation section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub step_mode: bool,
  #[serde(default)]
  pub trace_file: String,
  /// "layers" or "graph"
  #[serde(default = "default_mode")]
  pub mode: String,
}

fn default_mode() -> String {
  "layers".to_string()
}

impl Default for SimulationSection {
  fn default() -> Self {
    Self {
      quiet: false,
      step_mode: false,
      trace_file: String::new(),
      mode: default_mode(),
    }
  }
}

/// Which network to run and how to fill its weights
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkSection {
  #[serde(default)]
  pub file: String,
  /// "fixed" or "zeros"
  #[serde(default = "default_weights")]
  pub weights: String,
}

fn default_weights() -> String {
  "fixed".to_string()
}

impl Default for NetworkSection {
  fn default() -> Self {
    Self {
      file: String::new(),
      weights: default_weights(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub simulation: SimulationSection,
  #[serde(default)]
  pub network: NetworkSection,
  #[serde(default)]
  pub device: AcceleratorConfig,
}

/// Layer the built-in defaults, an optional TOML file, then `SMIV_*`
/// environment variables (`SMIV_SIMULATION__MODE=graph`).
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
  let mut builder = Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
  if let Some(path) = path {
    builder = builder.add_source(File::from(path).required(true));
  }
  let settings = builder
    .add_source(Environment::with_prefix("SMIV").separator("__").try_parsing(true))
    .build()?;
  Ok(settings.try_deserialize()?)
}

/// Apply CLI overrides on top of the loaded configuration
pub fn apply_cli_overrides(
  config: &mut AppConfig,
  quiet: bool,
  step: bool,
  trace_file: Option<&str>,
  graph: bool,
  network: Option<&str>,
  weights: Option<&str>,
) {
  if quiet {
    config.simulation.quiet = true;
  }
  if step {
    config.simulation.step_mode = true;
  }
  if let Some(file) = trace_file {
    config.simulation.trace_file = file.to_string();
  }
  if graph {
    config.simulation.mode = "graph".to_string();
  }
  if let Some(file) = network {
    config.network.file = file.to_string();
  }
  if let Some(init) = weights {
    config.network.weights = init.to_string();
  }
}

pub fn validate_config(config: &AppConfig) -> io::Result<()> {
  match config.simulation.mode.to_lowercase().as_str() {
    "layers" | "graph" => {},
    other => {
      return Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unsupported simulation mode: {}", other),
      ))
    },
  }

  match config.network.weights.to_lowercase().as_str() {
    "fixed" | "zeros" => {},
    other => {
      return Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unsupported weight init: {}", other),
      ))
    },
  }

  if config.network.file.trim().is_empty() {
    return Err(io::Error::new(
      io::ErrorKind::InvalidData,
      "network file cannot be empty, please specify it through the configuration file or CLI parameters".to_string(),
    ));
  }

  if config.device.convolution_hw == config.device.inner_product_hw {
    return Err(io::Error::new(
      io::ErrorKind::InvalidData,
      format!("convolution and inner-product blocks share hw id {:#x}", config.device.convolution_hw),
    ));
  }

  Ok(())
}
