use std::fmt;
use std::ops::{Index, IndexMut};

/// Scalar lanes per vector register.
pub const VECTOR_SIZE: usize = 8;
/// Scalar lanes consumed by one pipe per multiply-accumulate step.
pub const DATAPATH_WIDTH: usize = 4;
/// Logical lane count of one shift register.
pub const SHIFT_REG_SIZE: usize = 16;
/// Vector units backing one shift register.
pub const SR_UNITS: usize = SHIFT_REG_SIZE.div_ceil(VECTOR_SIZE);

// Pipe 0 reads the low half of the weights vector, pipe 1 the high half.
const _: () = assert!(VECTOR_SIZE == 2 * DATAPATH_WIDTH);

/// One vector register of `VECTOR_SIZE` lanes.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct VectorReg(pub [f32; VECTOR_SIZE]);

impl VectorReg {
  pub const ZERO: VectorReg = VectorReg([0.0; VECTOR_SIZE]);

  /// Load up to `VECTOR_SIZE` lanes from `src`; missing lanes are zero.
  pub fn load(src: &[f32]) -> Self {
    let mut reg = Self::ZERO;
    let n = src.len().min(VECTOR_SIZE);
    reg.0[..n].copy_from_slice(&src[..n]);
    reg
  }

  pub fn lanes(&self) -> &[f32; VECTOR_SIZE] {
    &self.0
  }
}

impl Index<usize> for VectorReg {
  type Output = f32;

  fn index(&self, lane: usize) -> &f32 {
    &self.0[lane]
  }
}

impl IndexMut<usize> for VectorReg {
  fn index_mut(&mut self, lane: usize) -> &mut f32 {
    &mut self.0[lane]
  }
}

impl fmt::Debug for VectorReg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.0.iter()).finish()
  }
}

/// Sliding window of activations, `SR_UNITS` vector registers wide.
///
/// Lanes are addressed as one flat array: lane `i` lives in unit
/// `i / VECTOR_SIZE`, position `i % VECTOR_SIZE`.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct ShiftReg {
  units: [VectorReg; SR_UNITS],
}

impl ShiftReg {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a register from flat lanes; lanes past `SHIFT_REG_SIZE` are ignored.
  pub fn from_lanes(lanes: &[f32]) -> Self {
    let mut reg = Self::new();
    for (i, &v) in lanes.iter().take(SHIFT_REG_SIZE).enumerate() {
      reg.set_lane(i, v);
    }
    reg
  }

  pub fn lane(&self, i: usize) -> f32 {
    self.units[i / VECTOR_SIZE][i % VECTOR_SIZE]
  }

  pub fn set_lane(&mut self, i: usize, value: f32) {
    self.units[i / VECTOR_SIZE][i % VECTOR_SIZE] = value;
  }

  pub fn unit(&self, u: usize) -> &VectorReg {
    &self.units[u]
  }

  pub fn load_unit(&mut self, u: usize, reg: VectorReg) {
    self.units[u] = reg;
  }

  pub fn to_lanes(&self) -> [f32; SHIFT_REG_SIZE] {
    let mut out = [0.0; SHIFT_REG_SIZE];
    for (i, lane) in out.iter_mut().enumerate() {
      *lane = self.lane(i);
    }
    out
  }
}

impl fmt::Debug for ShiftReg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.to_lanes().iter()).finish()
  }
}
