use super::activation::Activation;
use crate::network::Dims;

/// Fully connected layer: `result = act(x . W + b)` for each image.
///
/// `weights` holds `in_features + 1` rows of `w_dims.padded_cols()` lanes;
/// the last row is the bias. Input features are read in `[chan][row][col]`
/// order from a tensor of shape `in_dims`, skipping pad lanes, so a
/// convolution or pooling output can feed this kernel without a reorder.
#[allow(clippy::too_many_arguments)]
pub fn matrix_multiply_with_bias(
  activations: &[f32],
  weights: &[f32],
  num_images: usize,
  in_dims: &Dims,
  w_dims: &Dims,
  out_dims: &Dims,
  activation: Activation,
  result: &mut [f32],
) {
  let in_features = in_dims.valid_len();
  let w_stride = w_dims.padded_cols();
  let bias = &weights[in_features * w_stride..in_features * w_stride + out_dims.cols];

  for img in 0..num_images {
    let x = &activations[img * in_dims.len()..(img + 1) * in_dims.len()];
    let out = &mut result[img * out_dims.len()..(img + 1) * out_dims.len()];
    out.fill(0.0);
    out[..out_dims.cols].copy_from_slice(bias);

    let mut feature = 0;
    for chan in 0..in_dims.height {
      for row in 0..in_dims.rows {
        let base = in_dims.offset(chan, row, 0);
        for &a in &x[base..base + in_dims.cols] {
          let w_row = &weights[feature * w_stride..feature * w_stride + out_dims.cols];
          for (o, &w) in out.iter_mut().zip(w_row) {
            *o += a * w;
          }
          feature += 1;
        }
      }
    }

    for o in &mut out[..out_dims.cols] {
      *o = activation.apply(*o);
    }
  }
}
