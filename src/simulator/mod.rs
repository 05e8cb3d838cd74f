pub mod config;
pub mod sim;
pub mod simulator;
pub mod utils;

// provide to smiv
pub use simulator::Simulator;
pub use utils::log;
