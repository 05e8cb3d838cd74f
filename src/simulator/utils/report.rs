use serde::Serialize;

use crate::arch::smiv::DeviceStats;
use crate::network::{Slot, Tensor};
use crate::simulator::sim::ExecRecord;

/// What a finished run reports back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
  pub network: String,
  pub mode: String,
  pub layers_run: usize,
  /// Ping-pong slot holding the output; graph runs have none.
  pub result_slot: Option<Slot>,
  pub device: DeviceStats,
}

pub fn print_records(records: &[ExecRecord]) {
  println!("\n--- Execution Records ---");
  for record in records {
    println!("  Step {}: {} {}", record.step, record.action, record.subject);
  }
  println!("--- End Records ---\n");
}

pub fn print_summary(summary: &RunSummary) {
  println!("Network:      {}", summary.network);
  println!("Mode:         {}", summary.mode);
  println!("Layers run:   {}", summary.layers_run);
  if let Some(slot) = summary.result_slot {
    println!("Result slot:  {:?}", slot);
  }
  let d = &summary.device;
  println!("Invocations:  {}", d.invocations);
  println!("Transfers in: {} ({} bytes)", d.transfers_in, d.bytes_in);
  println!("Transfers out:{} ({} bytes)", d.transfers_out, d.bytes_out);
}

/// Print the logical values of image `n`, one row per line.
pub fn print_output(output: &Tensor, n: usize) {
  let dims = output.dims;
  let values = output.image(n);
  println!("Output [{}] image {}: {}x{}x{}", output.name, n, dims.height, dims.rows, dims.cols);
  for row in values.chunks(dims.cols.max(1)) {
    let line: Vec<String> = row.iter().map(|v| format!("{:9.5}", v)).collect();
    println!("  {}", line.join(" "));
  }
}
