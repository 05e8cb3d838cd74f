use std::io;

use crate::config::AcceleratorConfig;
use crate::network::WeightInit;
use crate::simulator::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
  /// Ping-pong loop over the layer list.
  Layers,
  /// Topologically sorted operator graph.
  Graph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
  Continuous,
  Step,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
  pub run_mode: RunMode,
  pub quiet: bool,
  pub step_mode: StepMode,
  pub trace_file: Option<String>,
  pub weight_init: WeightInit,
  pub accel: AcceleratorConfig,
}

impl Default for SimConfig {
  fn default() -> Self {
    Self {
      run_mode: RunMode::Layers,
      quiet: false,
      step_mode: StepMode::Continuous,
      trace_file: None,
      weight_init: WeightInit::Fixed,
      accel: AcceleratorConfig::default(),
    }
  }
}

impl SimConfig {
  pub fn from_app_config(config: &AppConfig) -> io::Result<Self> {
    let run_mode = match config.simulation.mode.to_lowercase().as_str() {
      "layers" => RunMode::Layers,
      "graph" => RunMode::Graph,
      other => {
        return Err(io::Error::new(
          io::ErrorKind::InvalidInput,
          format!("Unknown simulation mode: {}", other),
        ))
      },
    };
    let weight_init = match config.network.weights.to_lowercase().as_str() {
      "fixed" => WeightInit::Fixed,
      "zeros" => WeightInit::Zeros,
      other => {
        return Err(io::Error::new(
          io::ErrorKind::InvalidInput,
          format!("Unknown weight init: {}", other),
        ))
      },
    };
    let step_mode = if config.simulation.step_mode {
      StepMode::Step
    } else {
      StepMode::Continuous
    };
    let trace_file = Some(config.simulation.trace_file.clone()).filter(|f| !f.is_empty());

    Ok(Self {
      run_mode,
      quiet: config.simulation.quiet,
      step_mode,
      trace_file,
      weight_init,
      accel: config.device.clone(),
    })
  }
}
