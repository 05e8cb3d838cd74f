use thiserror::Error;

use crate::arch::smiv::HwId;

/// Errors raised while configuring or running a forward pass.
///
/// Configuration errors are fatal for the whole run: nothing in the engine
/// retries or returns a partial result.
#[derive(Debug, Error)]
pub enum SmivError {
  #[error("unsupported convolution stride {stride} (supported: 1, 2, 4)")]
  UnsupportedStride { stride: usize },

  #[error("kernel width {k_width} does not fit in a {vector_size}-lane vector register")]
  KernelTooWide { k_width: usize, vector_size: usize },

  #[error("unsupported pooling kind {kind:?} in layer {layer}")]
  UnsupportedPooling { layer: String, kind: crate::network::PoolKind },

  #[error("layer {layer}: {reason}")]
  ShapeMismatch { layer: String, reason: String },

  #[error("layer {layer} requires weights but none were provided")]
  MissingWeights { layer: String },

  #[error("transfer of {byte_len} bytes at offset {byte_offset} on hw {hw:#x} exceeds {available} bytes")]
  Transfer {
    hw: HwId,
    byte_offset: usize,
    byte_len: usize,
    available: usize,
  },

  #[error("operator graph has a cycle ({remaining} operators never became ready)")]
  GraphCycle { remaining: usize },

  #[error("invalid operator graph: {0}")]
  InvalidGraph(String),

  #[error("unknown tensor id {0}")]
  UnknownTensor(usize),

  #[error("configuration error: {0}")]
  Config(#[from] ::config::ConfigError),

  #[error("network description error: {0}")]
  NetworkSpec(#[from] toml::de::Error),

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SmivError>;

impl From<SmivError> for std::io::Error {
  fn from(err: SmivError) -> Self {
    match err {
      SmivError::Io(e) => e,
      other => std::io::Error::new(std::io::ErrorKind::InvalidInput, other.to_string()),
    }
  }
}
