use serde::{Deserialize, Serialize};

use crate::arch::smiv::{max_psums_per_fetch, Throughput, VECTOR_SIZE};
use crate::error::{Result, SmivError};
use crate::kernels::Activation;

/// Number of pad lanes needed to round `cols` up to a multiple of `alignment`.
pub fn calc_align_pad(cols: usize, alignment: usize) -> usize {
  if alignment == 0 {
    return 0;
  }
  (alignment - cols % alignment) % alignment
}

/// Shape of one image's tensor: `height` planes of `rows` x (`cols` + `align_pad`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dims {
  pub rows: usize,
  pub cols: usize,
  pub height: usize,
  pub align_pad: usize,
}

impl Dims {
  /// Dims with rows padded out to the vector width.
  pub fn new(rows: usize, cols: usize, height: usize) -> Self {
    Self {
      rows,
      cols,
      height,
      align_pad: calc_align_pad(cols, VECTOR_SIZE),
    }
  }

  pub fn padded_cols(&self) -> usize {
    self.cols + self.align_pad
  }

  pub fn plane_len(&self) -> usize {
    self.rows * self.padded_cols()
  }

  /// Elements of one image, pad lanes included.
  pub fn len(&self) -> usize {
    self.height * self.plane_len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Logical element count, pad lanes excluded.
  pub fn valid_len(&self) -> usize {
    self.height * self.rows * self.cols
  }

  /// Flat offset of `[chan][row][col]` within one image.
  pub fn offset(&self, chan: usize, row: usize, col: usize) -> usize {
    (chan * self.rows + row) * self.padded_cols() + col
  }

  /// The same tensor grown by `padding` zeros on every spatial edge.
  pub fn zero_padded(&self, padding: usize) -> Self {
    Self::new(self.rows + 2 * padding, self.cols + 2 * padding, self.height)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
  Convolution,
  InnerProduct,
  Pooling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
  #[default]
  None,
  Max,
  Avg,
}

/// Immutable configuration of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDesc {
  pub name: String,
  pub kind: LayerKind,
  /// Shape of the tensor this layer receives.
  pub inputs: Dims,
  pub outputs: Dims,
  /// Convolution: one kernel (`rows` x `cols` x `height`); there are
  /// `outputs.height` of them. Inner product: `(in + 1) x out`, bias last.
  pub weights: Dims,
  pub field_size: usize,
  pub field_stride: usize,
  pub c_padding: usize,
  pub activation: Activation,
  pub pool: PoolKind,
}

fn window_out(layer: &str, input: usize, field: usize, stride: usize) -> Result<usize> {
  if stride == 0 {
    return Err(SmivError::UnsupportedStride { stride });
  }
  if field == 0 || field > input {
    return Err(SmivError::ShapeMismatch {
      layer: layer.to_string(),
      reason: format!("field size {} does not fit input extent {}", field, input),
    });
  }
  Ok((input - field) / stride + 1)
}

impl LayerDesc {
  /// Convolution layer with `num_kernels` square kernels of `field_size`.
  pub fn convolution(
    name: impl Into<String>,
    inputs: Dims,
    field_size: usize,
    field_stride: usize,
    c_padding: usize,
    num_kernels: usize,
    activation: Activation,
  ) -> Result<Self> {
    let name = name.into();
    max_psums_per_fetch(field_stride, Throughput::for_kernel(field_size))?;
    let conv_in = if c_padding > 0 { inputs.zero_padded(c_padding) } else { inputs };
    let rows = window_out(&name, conv_in.rows, field_size, field_stride)?;
    let cols = window_out(&name, conv_in.cols, field_size, field_stride)?;
    Ok(Self {
      name,
      kind: LayerKind::Convolution,
      inputs,
      outputs: Dims::new(rows, cols, num_kernels),
      weights: Dims::new(field_size, field_size, inputs.height),
      field_size,
      field_stride,
      c_padding,
      activation,
      pool: PoolKind::None,
    })
  }

  /// Fully connected layer over every logical element of `inputs`.
  pub fn inner_product(name: impl Into<String>, inputs: Dims, num_outputs: usize, activation: Activation) -> Self {
    Self {
      name: name.into(),
      kind: LayerKind::InnerProduct,
      inputs,
      outputs: Dims::new(1, num_outputs, 1),
      weights: Dims::new(inputs.valid_len() + 1, num_outputs, 1),
      field_size: 0,
      field_stride: 0,
      c_padding: 0,
      activation,
      pool: PoolKind::None,
    }
  }

  pub fn pooling(
    name: impl Into<String>,
    inputs: Dims,
    field_size: usize,
    field_stride: usize,
    pool: PoolKind,
  ) -> Result<Self> {
    let name = name.into();
    let rows = window_out(&name, inputs.rows, field_size, field_stride)?;
    let cols = window_out(&name, inputs.cols, field_size, field_stride)?;
    Ok(Self {
      name,
      kind: LayerKind::Pooling,
      inputs,
      outputs: Dims::new(rows, cols, inputs.height),
      weights: Dims::default(),
      field_size,
      field_stride,
      c_padding: 0,
      activation: Activation::None,
      pool,
    })
  }

  /// Shape the convolution datapath actually reads.
  pub fn conv_input(&self) -> Dims {
    if self.c_padding > 0 {
      self.inputs.zero_padded(self.c_padding)
    } else {
      self.inputs
    }
  }

  pub fn num_kernels(&self) -> usize {
    self.outputs.height
  }

  /// Elements in this layer's weight buffer.
  pub fn weights_len(&self) -> usize {
    match self.kind {
      LayerKind::Convolution => self.num_kernels() * self.weights.len(),
      LayerKind::InnerProduct => self.weights.len(),
      LayerKind::Pooling => 0,
    }
  }

  pub fn has_weights(&self) -> bool {
    self.kind != LayerKind::Pooling
  }

  /// Largest single-image footprint this layer touches in either ping-pong buffer.
  pub fn max_footprint(&self) -> usize {
    self.inputs.len().max(self.conv_input().len()).max(self.outputs.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align_pad() {
    assert_eq!(calc_align_pad(6, 8), 2);
    assert_eq!(calc_align_pad(8, 8), 0);
    assert_eq!(calc_align_pad(9, 8), 7);
    assert_eq!(calc_align_pad(5, 0), 0);
  }

  #[test]
  fn test_dims_offsets() {
    let dims = Dims::new(4, 6, 3);
    assert_eq!(dims.padded_cols(), 8);
    assert_eq!(dims.plane_len(), 32);
    assert_eq!(dims.len(), 96);
    assert_eq!(dims.valid_len(), 72);
    assert_eq!(dims.offset(1, 2, 5), 32 + 16 + 5);
  }

  #[test]
  fn test_zero_padded_realigns() {
    let dims = Dims::new(6, 6, 2).zero_padded(1);
    assert_eq!(dims.rows, 8);
    assert_eq!(dims.cols, 8);
    assert_eq!(dims.align_pad, 0);
    assert_eq!(dims.height, 2);
  }

  #[test]
  fn test_convolution_shapes() {
    let desc = LayerDesc::convolution("conv", Dims::new(6, 6, 2), 3, 1, 1, 4, Activation::Relu).unwrap();
    assert_eq!(desc.conv_input(), Dims::new(8, 8, 2));
    assert_eq!(desc.outputs, Dims::new(6, 6, 4));
    assert_eq!(desc.weights, Dims::new(3, 3, 2));
    assert_eq!(desc.weights_len(), 4 * 2 * 3 * 8);

    let strided = LayerDesc::convolution("conv", Dims::new(9, 9, 1), 3, 2, 0, 1, Activation::None).unwrap();
    assert_eq!((strided.outputs.rows, strided.outputs.cols), (4, 4));
  }

  #[test]
  fn test_field_larger_than_input_rejected() {
    let err = LayerDesc::pooling("pool", Dims::new(2, 2, 1), 3, 1, PoolKind::Max).unwrap_err();
    assert!(matches!(err, SmivError::ShapeMismatch { .. }));
    let err = LayerDesc::convolution("conv", Dims::new(4, 4, 1), 3, 0, 0, 1, Activation::None).unwrap_err();
    assert!(matches!(err, SmivError::UnsupportedStride { stride: 0 }));
  }

  #[test]
  fn test_unsupported_conv_stride_rejected_up_front() {
    for (field_size, stride) in [(3, 3), (5, 3), (2, 8)] {
      let err = LayerDesc::convolution("conv", Dims::new(16, 16, 1), field_size, stride, 0, 1, Activation::None)
        .unwrap_err();
      assert!(matches!(err, SmivError::UnsupportedStride { stride: s } if s == stride));
    }
    // pooling has no datapath stride limit
    assert!(LayerDesc::pooling("pool", Dims::new(9, 9, 1), 3, 3, PoolKind::Max).is_ok());
  }

  #[test]
  fn test_inner_product_weights_include_bias_row() {
    let desc = LayerDesc::inner_product("fc", Dims::new(2, 3, 2), 10, Activation::None);
    assert_eq!(desc.weights.rows, 13);
    assert_eq!(desc.weights.cols, 10);
    assert_eq!(desc.outputs, Dims::new(1, 10, 1));
  }
}
