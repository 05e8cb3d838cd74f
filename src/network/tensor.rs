use crate::error::{Result, SmivError};

use super::Dims;

/// A batch of `batch` tensors of shape `dims`, stored flat with row pad lanes.
///
/// For activations `batch` counts images, for convolution weights it counts
/// kernels. Pad lanes are always zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  pub name: String,
  pub dims: Dims,
  pub batch: usize,
  data: Vec<f32>,
}

impl Tensor {
  pub fn zeros(name: impl Into<String>, dims: Dims, batch: usize) -> Self {
    Self {
      name: name.into(),
      dims,
      batch,
      data: vec![0.0; batch * dims.len()],
    }
  }

  /// Build from logical values laid out `[batch][height][rows][cols]` without pads.
  pub fn from_dense(name: impl Into<String>, dims: Dims, batch: usize, values: &[f32]) -> Result<Self> {
    let mut tensor = Self::zeros(name, dims, batch);
    let expected = batch * dims.valid_len();
    if values.len() != expected {
      return Err(SmivError::ShapeMismatch {
        layer: tensor.name,
        reason: format!("expected {} values, got {}", expected, values.len()),
      });
    }
    let mut it = values.iter();
    tensor.fill_with(|_| it.next().copied().unwrap_or(0.0));
    Ok(tensor)
  }

  /// Wrap an already padded buffer; extra trailing elements are dropped.
  pub fn from_padded(name: impl Into<String>, dims: Dims, batch: usize, mut data: Vec<f32>) -> Result<Self> {
    let name = name.into();
    let len = batch * dims.len();
    if data.len() < len {
      return Err(SmivError::ShapeMismatch {
        layer: name,
        reason: format!("buffer holds {} elements, shape needs {}", data.len(), len),
      });
    }
    data.truncate(len);
    Ok(Self { name, dims, batch, data })
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn data_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }

  pub fn into_data(self) -> Vec<f32> {
    self.data
  }

  fn index(&self, n: usize, chan: usize, row: usize, col: usize) -> usize {
    n * self.dims.len() + self.dims.offset(chan, row, col)
  }

  pub fn get(&self, n: usize, chan: usize, row: usize, col: usize) -> f32 {
    self.data[self.index(n, chan, row, col)]
  }

  pub fn set(&mut self, n: usize, chan: usize, row: usize, col: usize, value: f32) {
    let idx = self.index(n, chan, row, col);
    self.data[idx] = value;
  }

  /// Assign every logical element from `f(dense_index)`, leaving pad lanes at zero.
  pub fn fill_with(&mut self, mut f: impl FnMut(usize) -> f32) {
    let dims = self.dims;
    let mut dense = 0;
    for n in 0..self.batch {
      for chan in 0..dims.height {
        for row in 0..dims.rows {
          for col in 0..dims.cols {
            let idx = self.index(n, chan, row, col);
            self.data[idx] = f(dense);
            dense += 1;
          }
        }
      }
    }
  }

  /// Logical values with pad lanes stripped.
  pub fn to_dense(&self) -> Vec<f32> {
    let cols = self.dims.cols;
    self
      .data
      .chunks_exact(self.dims.padded_cols().max(1))
      .flat_map(|row| row[..cols].iter().copied())
      .collect()
  }

  /// Logical values of one batch entry.
  pub fn image(&self, n: usize) -> Vec<f32> {
    let per = self.dims.valid_len();
    self.to_dense()[n * per..(n + 1) * per].to_vec()
  }
}
