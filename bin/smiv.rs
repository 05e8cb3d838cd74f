use clap::Parser;
use smiv::network::{NetworkBuilder, NetworkSpec};
use smiv::simulator::config::{apply_cli_overrides, load_config, validate_config};
use smiv::simulator::sim::mode::SimConfig;
use smiv::simulator::utils::log::init_log;
use smiv::simulator::utils::report::{print_output, print_records, print_summary};
use smiv::simulator::Simulator;
use std::path::Path;

/// SMIV - forward inference on a software model of the SMIV accelerator
#[derive(Parser, Debug)]
#[command(name = "smiv")]
#[command(version = "0.1.0")]
#[command(about = "Run a network description through the SMIV datapath model", long_about = None)]
struct Args {
  /// Network description (TOML)
  #[arg(short, long, value_name = "FILE")]
  network: Option<String>,

  /// Configuration file layered over the defaults
  #[arg(short, long, value_name = "FILE")]
  config: Option<String>,

  /// Enable step mode (interactive, one layer at a time)
  #[arg(short, long)]
  step: bool,

  /// Quiet mode (warnings only)
  #[arg(short, long)]
  quiet: bool,

  /// Output trace file path (JSON lines)
  #[arg(long, value_name = "FILE")]
  trace_file: Option<String>,

  /// Run through the operator graph instead of the layer loop
  #[arg(short, long)]
  graph: bool,

  /// Weight initialisation: fixed or zeros
  #[arg(short, long, value_name = "INIT")]
  weights: Option<String>,

  /// Print the execution records after the run
  #[arg(long)]
  records: bool,
}

fn main() -> std::io::Result<()> {
  init_log();

  let args = Args::parse();

  let mut app_config = load_config(args.config.as_deref().map(Path::new))?;
  apply_cli_overrides(
    &mut app_config,
    args.quiet,
    args.step,
    args.trace_file.as_deref(),
    args.graph,
    args.network.as_deref(),
    args.weights.as_deref(),
  );
  validate_config(&app_config)?;
  let config = SimConfig::from_app_config(&app_config)?;

  let spec = NetworkSpec::from_file(Path::new(&app_config.network.file))?;
  let builder = NetworkBuilder::new(spec).weight_init(config.weight_init);
  let network = builder.build()?;
  let input = builder.sample_input();

  let mut simulator = Simulator::new(config, network, input)?;
  simulator.run()?;

  if let Some(output) = simulator.output() {
    print_output(output, 0);
  }
  if args.records {
    print_records(simulator.records());
  }
  print_summary(&simulator.summary());
  Ok(())
}
