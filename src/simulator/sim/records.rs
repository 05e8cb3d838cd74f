use serde::Serialize;

/// One entry of a run's execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecRecord {
  /// Layers (or operators) completed when the record was taken.
  pub step: usize,
  pub action: String,
  pub subject: String,
}

/// Macro to push an ExecRecord stamped with the current step count
///
/// Usage:
/// ```ignore
/// exec_record!(self, "layer", "conv0");
/// exec_record!(self, "layer", format!("{} -> {:?}", name, slot));
/// ```
#[macro_export]
macro_rules! exec_record {
  ($self:expr, $action:expr, $subject:expr) => {
    $self.records.push($crate::simulator::sim::records::ExecRecord {
      step: $self.step_count,
      action: $action.to_string(),
      subject: $subject.to_string(),
    });
  };
}
