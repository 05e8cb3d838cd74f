use serde::{Deserialize, Serialize};

use crate::arch::smiv::HwId;

/// Hardware block ids handed to the offload device
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorConfig {
  /// Convolution block
  #[serde(default = "default_convolution_hw")]
  pub convolution_hw: HwId,
  /// Inner-product block
  #[serde(default = "default_inner_product_hw")]
  pub inner_product_hw: HwId,
}

fn default_convolution_hw() -> HwId {
  0x0001
}

fn default_inner_product_hw() -> HwId {
  0x0002
}

impl AcceleratorConfig {
  pub fn new() -> Self {
    Self {
      convolution_hw: default_convolution_hw(),
      inner_product_hw: default_inner_product_hw(),
    }
  }
}

impl Default for AcceleratorConfig {
  fn default() -> Self {
    Self::new()
  }
}
