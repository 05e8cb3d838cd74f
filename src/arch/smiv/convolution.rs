// SIMD convolution driver: schedules output-pixel groups onto the two pipes

use log::{debug, trace};

use super::datapath::{multiply_accumulate, shift_left};
use super::merge::{merge_partial_sums, Throughput};
use super::vector::{ShiftReg, VectorReg, DATAPATH_WIDTH, VECTOR_SIZE};
use crate::error::{Result, SmivError};
use crate::kernels::apply_activation;
use crate::network::LayerDesc;

/// Most partial sums one pipe can produce from a single activation fetch.
pub fn max_psums_per_fetch(stride: usize, throughput: Throughput) -> Result<usize> {
  match (stride, throughput) {
    (1, Throughput::Double) => Ok(DATAPATH_WIDTH),
    (1, Throughput::Single) => Ok(DATAPATH_WIDTH * 2),
    (2, Throughput::Double) => Ok(DATAPATH_WIDTH / 2),
    (2, Throughput::Single) => Ok(DATAPATH_WIDTH),
    (4, Throughput::Double) => Ok(DATAPATH_WIDTH / 4),
    (4, Throughput::Single) => Ok(DATAPATH_WIDTH / 2),
    _ => Err(SmivError::UnsupportedStride { stride }),
  }
}

/// Static per-call schedule derived from the kernel shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvSchedule {
  pub stride: usize,
  pub k_width: usize,
  pub throughput: Throughput,
  /// Offset applied to pipe 1 after every load.
  pub init_shift: usize,
  /// Lanes both pipes advance after each accumulation step.
  pub step_shift: usize,
  pub max_psums_per_fetch: usize,
}

impl ConvSchedule {
  pub fn new(k_width: usize, stride: usize) -> Result<Self> {
    if k_width > VECTOR_SIZE {
      return Err(SmivError::KernelTooWide {
        k_width,
        vector_size: VECTOR_SIZE,
      });
    }
    let throughput = Throughput::for_kernel(k_width);
    let max_psums_per_fetch = max_psums_per_fetch(stride, throughput)?;
    let (init_shift, step_shift) = match throughput {
      Throughput::Double => (stride, 2 * stride),
      Throughput::Single => (DATAPATH_WIDTH, stride),
    };
    Ok(Self {
      stride,
      k_width,
      throughput,
      init_shift,
      step_shift,
      max_psums_per_fetch,
    })
  }

  /// Split the `remaining` output columns of a row between the pipes.
  ///
  /// Returns `(pipe0_iters, pipe1_iters, pixels_produced)`. In double
  /// throughput the odd remainder goes to pipe 0.
  pub fn split(&self, remaining: usize) -> (usize, usize, usize) {
    let max = self.max_psums_per_fetch;
    match self.throughput {
      Throughput::Double => {
        let per_dp = remaining / 2;
        let dp0 = max.min(per_dp + remaining % 2);
        let dp1 = max.min(per_dp);
        (dp0, dp1, dp0 + dp1)
      },
      Throughput::Single => {
        let dp = max.min(remaining);
        (dp, dp, dp)
      },
    }
  }
}

fn shape_error(desc: &LayerDesc, reason: String) -> SmivError {
  SmivError::ShapeMismatch {
    layer: desc.name.clone(),
    reason,
  }
}

fn require_len(desc: &LayerDesc, what: &str, have: usize, need: usize) -> Result<()> {
  if have < need {
    return Err(shape_error(desc, format!("{} buffer holds {} elements, needs {}", what, have, need)));
  }
  Ok(())
}

/// Convolve channel `chan` of image `img` with channel `chan` of kernel `kern`.
///
/// `activations` is `[img][chan][row][col]` in the layer's convolution
/// input shape, `kernels` is `[kern][chan][row][col]`, and the unreduced
/// output plane is written to `result[chan][row][col]`.
pub fn convolve2d(
  activations: &[f32],
  kernels: &[f32],
  img: usize,
  kern: usize,
  chan: usize,
  desc: &LayerDesc,
  result: &mut [f32],
) -> Result<()> {
  let a_dims = desc.conv_input();
  let out = desc.outputs;
  let k_dims = desc.weights;
  let k_width = k_dims.cols;
  let sched = ConvSchedule::new(k_width, desc.field_stride)?;
  let stride = sched.stride;

  if a_dims.padded_cols() % VECTOR_SIZE != 0 {
    return Err(shape_error(
      desc,
      format!("padded input width {} is not vector aligned", a_dims.padded_cols()),
    ));
  }
  if k_dims.rows != k_width || a_dims.rows < k_width || a_dims.cols < k_width {
    return Err(shape_error(
      desc,
      format!("{}x{} kernel over {}x{} input", k_dims.rows, k_width, a_dims.rows, a_dims.cols),
    ));
  }
  let expect_rows = (a_dims.rows - k_width) / stride + 1;
  let expect_cols = (a_dims.cols - k_width) / stride + 1;
  if out.rows != expect_rows || out.cols != expect_cols {
    return Err(shape_error(
      desc,
      format!("output is {}x{}, convolution yields {}x{}", out.rows, out.cols, expect_rows, expect_cols),
    ));
  }
  require_len(desc, "activation", activations.len(), (img + 1) * a_dims.len())?;
  require_len(desc, "kernel", kernels.len(), (kern + 1) * k_dims.len())?;
  require_len(desc, "result", result.len(), (chan + 1) * out.plane_len())?;

  let fetches_per_row = a_dims.cols.div_ceil(VECTOR_SIZE);
  let last_input_col = out.cols * stride;
  let has_boundary_case = last_input_col > (fetches_per_row - 1) * VECTOR_SIZE;
  let end_row = a_dims.rows - k_width + 1;
  let end_col = if has_boundary_case { fetches_per_row } else { fetches_per_row - 1 };
  let end_col_marker = fetches_per_row - 1;

  debug!(
    "convolve2d img={} kern={} chan={}: {:?}, fetches={}, boundary={}",
    img, kern, chan, sched, fetches_per_row, has_boundary_case
  );

  let a_base = img * a_dims.len();
  let k_base = kern * k_dims.len();
  let r_base = chan * out.plane_len();

  let mut out_row = 0;
  for in_row in (0..end_row).step_by(stride) {
    let mut out_col = 0;
    for in_col in 0..end_col {
      let (dp0_iters, dp1_iters, total_outpx) = sched.split(out.cols - out_col);
      trace!("dp0_iters: {}, dp1_iters: {}", dp0_iters, dp1_iters);

      let mut psums0 = VectorReg::ZERO;
      let mut psums1 = VectorReg::ZERO;
      for kern_row in 0..k_width {
        let mut pipe0 = ShiftReg::new();
        let mut pipe1 = ShiftReg::new();

        let row_start = a_base + a_dims.offset(chan, in_row + kern_row, 0);
        let fetch = |v: usize| VectorReg::load(&activations[row_start + v * VECTOR_SIZE..][..VECTOR_SIZE]);
        let act = fetch(in_col);
        pipe0.load_unit(0, act);
        pipe1.load_unit(0, act);
        if !(has_boundary_case && in_col == end_col_marker) {
          let act = fetch(in_col + 1);
          pipe0.load_unit(1, act);
          pipe1.load_unit(1, act);
        }
        trace!("shift regs after load {:?} {:?}", pipe0, pipe1);

        let wgt = &kernels[k_base + k_dims.offset(chan, kern_row, 0)..][..k_width];
        let mut weights = VectorReg::ZERO;
        for (w, &value) in wgt.iter().enumerate() {
          weights[w] = value;
          if sched.throughput.is_double() {
            weights[DATAPATH_WIDTH + w] = value;
          }
        }
        trace!("weights buffer {:?}", weights);

        shift_left(&mut pipe1, sched.init_shift);

        multiply_accumulate(
          &weights,
          &mut pipe0,
          &mut pipe1,
          sched.step_shift,
          dp0_iters,
          dp1_iters,
          &mut psums0,
          &mut psums1,
        );
      }

      let final_psums = merge_partial_sums(&psums0, &psums1, sched.throughput);
      let dst = r_base + out_row * out.padded_cols() + out_col;
      result[dst..dst + total_outpx].copy_from_slice(&final_psums.lanes()[..total_outpx]);

      out_col += total_outpx;
      if out_col >= out.cols {
        out_col = 0;
      }
    }
    trace!("result row {}: {:?}", out_row, &result[r_base + out_row * out.padded_cols()..][..out.cols]);
    out_row += 1;
  }

  Ok(())
}

/// Full convolution layer: every image against every kernel.
///
/// Channels are convolved one at a time into a scratch plane set, summed
/// into `result[img][kern]`, and the layer activation is applied.
pub fn convolution2d(
  activations: &[f32],
  kernels: &[f32],
  desc: &LayerDesc,
  num_images: usize,
  result: &mut [f32],
) -> Result<()> {
  let channels = desc.conv_input().height;
  let out = desc.outputs;
  let plane = out.plane_len();
  require_len(desc, "result", result.len(), num_images * out.len())?;

  let mut scratch = vec![0.0; channels * plane];
  for img in 0..num_images {
    for kern in 0..desc.num_kernels() {
      for chan in 0..channels {
        convolve2d(activations, kernels, img, kern, chan, desc, &mut scratch)?;
      }

      let dst = &mut result[img * out.len() + kern * plane..][..plane];
      dst.fill(0.0);
      for partial in scratch.chunks_exact(plane) {
        for (d, &s) in dst.iter_mut().zip(partial) {
          *d += s;
        }
      }
    }
  }

  apply_activation(result, &out, num_images, desc.activation);
  Ok(())
}
