use crate::network::Dims;

/// Copy `num_images` tensors of shape `src_dims` into `dst`, surrounded by
/// `padding` zeros on every spatial edge.
///
/// `dst` is laid out as `src_dims.zero_padded(padding)`; every element of
/// that shape is written, pads included.
pub fn copy_zeropad(src: &[f32], src_dims: &Dims, num_images: usize, padding: usize, dst: &mut [f32]) {
  let dst_dims = src_dims.zero_padded(padding);
  let dst_len = num_images * dst_dims.len();
  dst[..dst_len].fill(0.0);

  for img in 0..num_images {
    let src_base = img * src_dims.len();
    let dst_base = img * dst_dims.len();
    for chan in 0..src_dims.height {
      for row in 0..src_dims.rows {
        let s = src_base + src_dims.offset(chan, row, 0);
        let d = dst_base + dst_dims.offset(chan, row + padding, padding);
        dst[d..d + src_dims.cols].copy_from_slice(&src[s..s + src_dims.cols]);
      }
    }
  }
}
