//! Software kernels the SMIV core calls through narrow interfaces.
//!
//! None of these are accelerated: padding and pooling run on the host, the
//! matrix multiply stands in for the inner-product block.

pub mod activation;
pub mod matmul;
pub mod pooling;
pub mod zeropad;

pub use activation::{apply_activation, Activation};
pub use matmul::matrix_multiply_with_bias;
pub use pooling::max_pooling;
pub use zeropad::copy_zeropad;
