use crate::arch::smiv::ResultLoc;

/// One of the two activation buffers owned by a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Slot {
  /// Holds the network input before the first layer runs.
  Activations,
  Result,
}

impl Slot {
  pub fn other(self) -> Self {
    match self {
      Slot::Activations => Slot::Result,
      Slot::Result => Slot::Activations,
    }
  }

  fn index(self) -> usize {
    match self {
      Slot::Activations => 0,
      Slot::Result => 1,
    }
  }
}

/// Two equally sized buffers plus the index of the one holding live data.
#[derive(Debug, Clone)]
pub struct PingPong {
  buffers: [Vec<f32>; 2],
  live: Slot,
}

impl PingPong {
  pub fn new(len: usize) -> Self {
    Self {
      buffers: [vec![0.0; len], vec![0.0; len]],
      live: Slot::Activations,
    }
  }

  pub fn len(&self) -> usize {
    self.buffers[0].len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn live(&self) -> Slot {
    self.live
  }

  pub fn buffer(&self, slot: Slot) -> &[f32] {
    &self.buffers[slot.index()]
  }

  /// Overwrite the `Activations` slot with `data` and make it live.
  ///
  /// Both buffers are cleared first so no values leak from an earlier pass.
  pub fn reset_with(&mut self, data: &[f32]) {
    for buf in &mut self.buffers {
      buf.fill(0.0);
    }
    let n = data.len().min(self.len());
    self.buffers[0][..n].copy_from_slice(&data[..n]);
    self.live = Slot::Activations;
  }

  /// Borrow `(live, other)`: the layer's input side and its output side.
  pub fn split(&mut self) -> (&mut [f32], &mut [f32]) {
    let [a, b] = &mut self.buffers;
    match self.live {
      Slot::Activations => (a.as_mut_slice(), b.as_mut_slice()),
      Slot::Result => (b.as_mut_slice(), a.as_mut_slice()),
    }
  }

  /// Apply a layer's report of where its output landed; returns the new live slot.
  pub fn commit(&mut self, loc: ResultLoc) -> Slot {
    if loc == ResultLoc::Result {
      self.live = self.live.other();
    }
    self.live
  }
}
