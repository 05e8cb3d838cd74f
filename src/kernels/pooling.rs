use crate::network::Dims;

/// Max pooling over every channel of every image.
///
/// Output dims must be `((in - field) / stride + 1)` on both axes.
pub fn max_pooling(
  activations: &[f32],
  in_dims: &Dims,
  out_dims: &Dims,
  num_images: usize,
  field_size: usize,
  stride: usize,
  result: &mut [f32],
) {
  for img in 0..num_images {
    let src = &activations[img * in_dims.len()..(img + 1) * in_dims.len()];
    let dst = &mut result[img * out_dims.len()..(img + 1) * out_dims.len()];
    dst.fill(0.0);
    for chan in 0..in_dims.height {
      for out_row in 0..out_dims.rows {
        for out_col in 0..out_dims.cols {
          let mut max = f32::NEG_INFINITY;
          for i in 0..field_size {
            let base = in_dims.offset(chan, out_row * stride + i, out_col * stride);
            for &v in &src[base..base + field_size] {
              max = max.max(v);
            }
          }
          dst[out_dims.offset(chan, out_row, out_col)] = max;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::network::Tensor;

  #[test]
  fn test_max_pool_2x2() {
    let in_dims = Dims::new(4, 4, 1);
    let out_dims = Dims::new(2, 2, 1);
    #[rustfmt::skip]
    let x = Tensor::from_dense("x", in_dims, 1, &[
      1.0, 2.0, 5.0, 0.0,
      3.0, 4.0, 1.0, 1.0,
      -1.0, -2.0, 0.0, 9.0,
      -3.0, -4.0, 8.0, 7.0,
    ]).unwrap();
    let mut result = vec![0.0; out_dims.len()];

    max_pooling(x.data(), &in_dims, &out_dims, 1, 2, 2, &mut result);

    let out = Tensor::from_padded("y", out_dims, 1, result).unwrap();
    assert_eq!(out.to_dense(), vec![4.0, 5.0, -1.0, 9.0]);
  }

  #[test]
  fn test_max_pool_overlapping_windows() {
    let in_dims = Dims::new(3, 3, 1);
    let out_dims = Dims::new(2, 2, 1);
    let x = Tensor::from_dense("x", in_dims, 1, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]).unwrap();
    let mut result = vec![0.0; out_dims.len()];

    max_pooling(x.data(), &in_dims, &out_dims, 1, 2, 1, &mut result);

    let out = Tensor::from_padded("y", out_dims, 1, result).unwrap();
    assert_eq!(out.to_dense(), vec![5.0, 6.0, 8.0, 9.0]);
  }
}
