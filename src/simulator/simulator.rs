use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Result, Write};

use super::sim::mode::{RunMode, SimConfig, StepMode};
use super::sim::records::ExecRecord;
use super::sim::shell::{Command, Shell};
use super::utils::log::set_quiet;
use super::utils::report::RunSummary;
use crate::arch::smiv::SoftwareDevice;
use crate::exec_record;
use crate::network::{ExecContext, Network, Tensor};

pub struct Simulator {
  config: SimConfig,
  network: Network,
  input: Tensor,
  device: SoftwareDevice,
  records: Vec<ExecRecord>,
  step_count: usize,
  traced: usize,
  trace_writer: Option<BufWriter<File>>,
  output: Option<Tensor>,
}

impl Simulator {
  pub fn new(config: SimConfig, mut network: Network, input: Tensor) -> Result<Self> {
    network.load_input(&input)?;
    let trace_writer = match &config.trace_file {
      Some(path) => Some(BufWriter::new(File::create(path)?)),
      None => None,
    };
    Ok(Self {
      config,
      network,
      input,
      device: SoftwareDevice::new(),
      records: Vec::new(),
      step_count: 0,
      traced: 0,
      trace_writer,
      output: None,
    })
  }

  pub fn run(&mut self) -> Result<()> {
    set_quiet(self.config.quiet);
    match self.config.run_mode {
      RunMode::Graph => {
        if self.config.step_mode == StepMode::Step {
          warn!("step mode is not available for graph runs, running to completion");
        }
        self.run_graph()
      },
      RunMode::Layers => match self.config.step_mode {
        StepMode::Continuous => self.run_continuous(),
        StepMode::Step => self.run_step_mode(),
      },
    }
  }

  fn run_step_mode(&mut self) -> Result<()> {
    println!("Step mode - Press Enter to run the next layer, 'q' to quit");
    let mut shell = Shell::new()?;
    while !self.network.is_done() {
      if let Some(desc) = self.network.layers().get(self.network.next_layer()) {
        println!("next: layer {} ({})", self.network.next_layer(), desc.name);
      }
      match shell.read_command()? {
        Command::Step(n) => {
          for _ in 0..n {
            if self.network.is_done() {
              break;
            }
            self.step()?;
          }
        },
        Command::Continue => return self.run_continuous(),
        Command::Quit => return Ok(()),
      }
    }
    self.finish()
  }

  fn run_continuous(&mut self) -> Result<()> {
    while !self.network.is_done() {
      self.step()?;
    }
    self.finish()
  }

  fn step(&mut self) -> Result<()> {
    let idx = self.network.next_layer();
    let name = self.network.layers()[idx].name.clone();
    let live = self.network.step(&mut self.device, &self.config.accel)?;
    self.step_count += 1;
    exec_record!(self, "layer", format!("{} -> {:?}", name, live));
    self.write_trace()
  }

  fn finish(&mut self) -> Result<()> {
    let output = self.network.output()?;
    if let Some(slot) = self.network.result_slot() {
      exec_record!(self, "result", format!("{:?}", slot));
    }
    info!("[{}] output ready after {} layers", self.network.name, self.step_count);
    self.output = Some(output);
    self.write_trace()
  }

  fn run_graph(&mut self) -> Result<()> {
    let (graph, mut workspace) = self.network.to_graph(self.input.clone())?;
    let out_id = {
      let mut ctx = ExecContext {
        device: &mut self.device,
        accel: &self.config.accel,
      };
      graph.run_network(&mut ctx, &mut workspace)?
    };
    self.step_count = graph.len();
    exec_record!(self, "graph", format!("{} operators, output {}", graph.len(), out_id));
    self.output = Some(workspace.get(out_id)?.clone());
    self.write_trace()
  }

  fn write_trace(&mut self) -> Result<()> {
    if let Some(writer) = &mut self.trace_writer {
      for record in &self.records[self.traced..] {
        writeln!(writer, "{}", serde_json::to_string(record)?)?;
      }
      writer.flush()?;
    }
    self.traced = self.records.len();
    Ok(())
  }

  pub fn network(&self) -> &Network {
    &self.network
  }

  /// Final output, once a run has finished.
  pub fn output(&self) -> Option<&Tensor> {
    self.output.as_ref()
  }

  pub fn records(&self) -> &[ExecRecord] {
    &self.records
  }

  pub fn summary(&self) -> RunSummary {
    let mode = match self.config.run_mode {
      RunMode::Layers => "layers",
      RunMode::Graph => "graph",
    };
    RunSummary {
      network: self.network.name.clone(),
      mode: mode.to_string(),
      layers_run: self.step_count,
      result_slot: self.network.result_slot(),
      device: self.device.stats().clone(),
    }
  }
}
