// Dual-pipe multiply-accumulate datapath

use log::trace;

use super::vector::{ShiftReg, VectorReg, DATAPATH_WIDTH, SHIFT_REG_SIZE, VECTOR_SIZE};

/// Shift one shift register left by `shamt` lanes.
///
/// The register is treated as one flat lane array across its vector units.
/// Lanes whose source index falls past the end become zero.
pub fn shift_left(reg: &mut ShiftReg, shamt: usize) {
  for sr in 0..SHIFT_REG_SIZE {
    let value = source_lane(sr, shamt).map_or(0.0, |src| reg.lane(src));
    reg.set_lane(sr, value);
  }
}

/// Shift both pipes' registers in the same step.
pub fn shift_left_paired(reg0: &mut ShiftReg, reg1: &mut ShiftReg, shamt: usize) {
  for sr in 0..SHIFT_REG_SIZE {
    match source_lane(sr, shamt) {
      Some(src) => {
        reg0.set_lane(sr, reg0.lane(src));
        reg1.set_lane(sr, reg1.lane(src));
      },
      None => {
        reg0.set_lane(sr, 0.0);
        reg1.set_lane(sr, 0.0);
      },
    }
  }
}

/// Lane that feeds lane `sr` after a shift of `shamt`, if it is still inside the register.
fn source_lane(sr: usize, shamt: usize) -> Option<usize> {
  sr.checked_add(shamt).filter(|&src| src < SHIFT_REG_SIZE)
}

/// Run `iters0` accumulation steps on pipe 0 and `iters1` on pipe 1.
///
/// Step `i` adds `weights[0..W] . pipe0[0..W]` into `psum0[i]` and
/// `weights[W..2W] . pipe1[0..W]` into `psum1[i]` (W = `DATAPATH_WIDTH`),
/// then advances both shift registers by `shamt`. Pipe 1 stops accumulating
/// once its budget is spent while pipe 0 keeps going.
#[allow(clippy::too_many_arguments)]
pub fn multiply_accumulate(
  weights: &VectorReg,
  pipe0: &mut ShiftReg,
  pipe1: &mut ShiftReg,
  shamt: usize,
  iters0: usize,
  iters1: usize,
  psum0: &mut VectorReg,
  psum1: &mut VectorReg,
) {
  debug_assert!(iters0 <= VECTOR_SIZE, "pipe 0 budget {} exceeds a vector", iters0);
  debug_assert!(iters1 <= iters0 && iters0 - iters1 <= 1, "pipe budgets {}/{} diverge", iters0, iters1);

  for psum_reg in 0..iters0 {
    let mut acc0 = psum0[psum_reg];
    let mut acc1 = psum1[psum_reg];
    for j in 0..DATAPATH_WIDTH {
      acc0 += weights[j] * pipe0.lane(j);
      acc1 += weights[j + DATAPATH_WIDTH] * pipe1.lane(j);
    }
    psum0[psum_reg] = acc0;
    if psum_reg < iters1 {
      psum1[psum_reg] = acc1;
    }
    trace!("psums {:?} {:?}", psum0, psum1);

    shift_left_paired(pipe0, pipe1, shamt);
    trace!("shift regs {:?} {:?}", pipe0, pipe1);
  }
}
