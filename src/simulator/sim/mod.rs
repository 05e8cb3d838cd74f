pub mod mode;
pub mod records;
pub mod shell;

pub use mode::{RunMode, SimConfig, StepMode};
pub use records::ExecRecord;
