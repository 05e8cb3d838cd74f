//! SMIV: one hardware block per layer type, each responsible for loading
//! its own activations and weights.

pub mod convolution;
pub mod datapath;
pub mod device;
pub mod layers;
pub mod merge;
pub mod vector;

pub use convolution::{convolution2d, convolve2d, max_psums_per_fetch, ConvSchedule};
pub use datapath::{multiply_accumulate, shift_left, shift_left_paired};
pub use device::{ArrayRole, Device, DeviceStats, HwId, SoftwareDevice};
pub use layers::{run_layer, ResultLoc};
pub use merge::{merge_partial_sums, Throughput};
pub use vector::{ShiftReg, VectorReg, DATAPATH_WIDTH, SHIFT_REG_SIZE, SR_UNITS, VECTOR_SIZE};
