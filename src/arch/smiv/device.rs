use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::mem::size_of;

use crate::error::{Result, SmivError};

/// Identifier of one accelerator block.
pub type HwId = u32;

/// Which layer array a transfer moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArrayRole {
  Activations,
  Weights,
  Result,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
  In,
  Out,
}

/// The accelerator-visible side of a kernel call.
///
/// Transfers are synchronous and all-or-nothing: either the whole range
/// moves or an error is returned.
pub trait Device {
  /// Declare that `role` occupies `bytes` of accelerator-visible memory for `hw`.
  fn map_array(&mut self, hw: HwId, role: ArrayRole, bytes: usize);

  fn transfer_in(&mut self, hw: HwId, role: ArrayRole, buffer: &[f32], byte_offset: usize, byte_len: usize) -> Result<()>;

  fn transfer_out(&mut self, hw: HwId, role: ArrayRole, buffer: &[f32], byte_offset: usize, byte_len: usize)
    -> Result<()>;

  /// Announce that `kernel` is launched on `hw`.
  fn invoke(&mut self, hw: HwId, kernel: &str);
}

/// One completed transfer.
#[derive(Debug, Clone, Serialize)]
pub struct Transfer {
  pub hw: HwId,
  pub role: ArrayRole,
  pub direction: Direction,
  pub byte_offset: usize,
  pub byte_len: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
  pub transfers_in: usize,
  pub transfers_out: usize,
  pub bytes_in: usize,
  pub bytes_out: usize,
  pub invocations: usize,
}

/// Host-memory device: buffers are shared, so transfers only get checked and logged.
#[derive(Debug, Default)]
pub struct SoftwareDevice {
  mapped: HashMap<(HwId, ArrayRole), usize>,
  transfers: Vec<Transfer>,
  stats: DeviceStats,
}

impl SoftwareDevice {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn stats(&self) -> &DeviceStats {
    &self.stats
  }

  pub fn transfers(&self) -> &[Transfer] {
    &self.transfers
  }

  pub fn mapped_bytes(&self, hw: HwId, role: ArrayRole) -> Option<usize> {
    self.mapped.get(&(hw, role)).copied()
  }

  fn check(&self, hw: HwId, role: ArrayRole, buffer: &[f32], byte_offset: usize, byte_len: usize) -> Result<()> {
    let mut available = buffer.len() * size_of::<f32>();
    if let Some(&mapped) = self.mapped.get(&(hw, role)) {
      available = available.min(mapped);
    }
    match byte_offset.checked_add(byte_len) {
      Some(end) if end <= available => Ok(()),
      _ => Err(SmivError::Transfer {
        hw,
        byte_offset,
        byte_len,
        available,
      }),
    }
  }

  fn record(&mut self, hw: HwId, role: ArrayRole, direction: Direction, byte_offset: usize, byte_len: usize) {
    debug!("[Device] {:?} hw={:#x} {:?}: offset={}, bytes={}", direction, hw, role, byte_offset, byte_len);
    match direction {
      Direction::In => {
        self.stats.transfers_in += 1;
        self.stats.bytes_in += byte_len;
      },
      Direction::Out => {
        self.stats.transfers_out += 1;
        self.stats.bytes_out += byte_len;
      },
    }
    self.transfers.push(Transfer {
      hw,
      role,
      direction,
      byte_offset,
      byte_len,
    });
  }
}

impl Device for SoftwareDevice {
  fn map_array(&mut self, hw: HwId, role: ArrayRole, bytes: usize) {
    debug!("[Device] map hw={:#x} {:?}: {} bytes", hw, role, bytes);
    self.mapped.insert((hw, role), bytes);
  }

  fn transfer_in(&mut self, hw: HwId, role: ArrayRole, buffer: &[f32], byte_offset: usize, byte_len: usize) -> Result<()> {
    self.check(hw, role, buffer, byte_offset, byte_len)?;
    self.record(hw, role, Direction::In, byte_offset, byte_len);
    Ok(())
  }

  fn transfer_out(
    &mut self,
    hw: HwId,
    role: ArrayRole,
    buffer: &[f32],
    byte_offset: usize,
    byte_len: usize,
  ) -> Result<()> {
    self.check(hw, role, buffer, byte_offset, byte_len)?;
    self.record(hw, role, Direction::Out, byte_offset, byte_len);
    Ok(())
  }

  fn invoke(&mut self, hw: HwId, kernel: &str) {
    info!("[Device] invoke {} on hw={:#x}", kernel, hw);
    self.stats.invocations += 1;
  }
}
