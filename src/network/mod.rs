pub mod builder;
pub mod graph;
pub mod layer;
#[allow(clippy::module_inception)]
pub mod network;
pub mod pingpong;
pub mod tensor;

pub use builder::{fixed_value, LayerSpec, NetworkBuilder, NetworkSpec, WeightInit};
pub use graph::{ExecContext, LayerOp, Operator, OperatorGraph, TensorId, Workspace};
pub use layer::{calc_align_pad, Dims, LayerDesc, LayerKind, PoolKind};
pub use network::{nnet_fwd, Network};
pub use pingpong::{PingPong, Slot};
pub use tensor::Tensor;
