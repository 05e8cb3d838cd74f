use log::trace;

use super::vector::{VectorReg, DATAPATH_WIDTH, VECTOR_SIZE};

/// How the two pipes share the work of one output-pixel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throughput {
  /// Both pipes reduce into the same output pixels.
  Single,
  /// Each pipe produces its own output pixels.
  Double,
}

impl Throughput {
  /// Kernels narrower than the datapath leave room for two pixels per step.
  pub fn for_kernel(k_width: usize) -> Self {
    if k_width < DATAPATH_WIDTH {
      Throughput::Double
    } else {
      Throughput::Single
    }
  }

  pub fn is_double(self) -> bool {
    self == Throughput::Double
  }
}

/// Combine two pipes' partial sums into one output vector.
///
/// Double throughput interleaves (`out[2i] = psum0[i]`, `out[2i+1] = psum1[i]`),
/// single throughput sums lane by lane.
pub fn merge_partial_sums(psum0: &VectorReg, psum1: &VectorReg, throughput: Throughput) -> VectorReg {
  let mut result = VectorReg::ZERO;

  match throughput {
    Throughput::Double => {
      for i in 0..VECTOR_SIZE / 2 {
        result[2 * i] += psum0[i];
        result[2 * i + 1] += psum1[i];
      }
    },
    Throughput::Single => {
      for i in 0..VECTOR_SIZE {
        result[i] += psum0[i] + psum1[i];
      }
    },
  }
  trace!("merged psums {:?}", result);
  result
}
