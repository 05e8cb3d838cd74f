pub mod arch;
pub mod config;
pub mod error;
pub mod kernels;
pub mod network;
pub mod simulator;

pub use config::AcceleratorConfig;
pub use error::{Result, SmivError};
pub use simulator::sim::mode::{RunMode, SimConfig, StepMode};
pub use simulator::utils::log;
