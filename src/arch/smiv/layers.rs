use log::{debug, info};
use std::mem::size_of;

use super::convolution::convolution2d;
use super::device::{ArrayRole, Device, HwId};
use crate::config::AcceleratorConfig;
use crate::error::{Result, SmivError};
use crate::kernels::{copy_zeropad, matrix_multiply_with_bias, max_pooling};
use crate::network::{LayerDesc, LayerKind, PoolKind};

/// Which of the two buffers handed to a layer ends up holding its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultLoc {
  /// The buffer passed as `activations`.
  Activations,
  /// The buffer passed as `result`.
  Result,
}

fn bytes(elems: usize) -> usize {
  elems * size_of::<f32>()
}

fn grab_matrix_dma(device: &mut dyn Device, hw: HwId, weights: &[f32], desc: &LayerDesc) -> Result<()> {
  device.transfer_in(hw, ArrayRole::Weights, weights, 0, bytes(desc.weights_len()))
}

fn grab_input_activations_dma(device: &mut dyn Device, hw: HwId, activations: &[f32], elems: usize) -> Result<()> {
  device.transfer_in(hw, ArrayRole::Activations, activations, 0, bytes(elems))
}

fn store_output_activations_dma(device: &mut dyn Device, hw: HwId, result: &[f32], elems: usize) -> Result<()> {
  device.transfer_out(hw, ArrayRole::Result, result, 0, bytes(elems))
}

fn map_layer_arrays(device: &mut dyn Device, hw: HwId, desc: &LayerDesc, num_images: usize) {
  let footprint = bytes(num_images * desc.max_footprint());
  device.map_array(hw, ArrayRole::Activations, footprint);
  device.map_array(hw, ArrayRole::Weights, bytes(desc.weights_len()));
  device.map_array(hw, ArrayRole::Result, footprint);
}

fn convolution_layer_hw(
  device: &mut dyn Device,
  hw: HwId,
  activations: &[f32],
  weights: &[f32],
  desc: &LayerDesc,
  num_images: usize,
  result: &mut [f32],
) -> Result<()> {
  grab_matrix_dma(device, hw, weights, desc)?;
  grab_input_activations_dma(device, hw, activations, num_images * desc.conv_input().len())?;
  convolution2d(activations, weights, desc, num_images, result)?;
  store_output_activations_dma(device, hw, result, num_images * desc.outputs.len())
}

/// Convolution layer.
///
/// With padding, the zero-padded input is staged in `result` and the
/// convolution writes back into `activations`, so the output lands in the
/// input-side buffer.
pub fn convolution_layer(
  device: &mut dyn Device,
  accel: &AcceleratorConfig,
  activations: &mut [f32],
  weights: &[f32],
  desc: &LayerDesc,
  num_images: usize,
  result: &mut [f32],
) -> Result<ResultLoc> {
  let hw = accel.convolution_hw;
  map_layer_arrays(device, hw, desc, num_images);

  if desc.c_padding > 0 {
    copy_zeropad(activations, &desc.inputs, num_images, desc.c_padding, result);
    debug!("[{}] zero padded input by {}", desc.name, desc.c_padding);
    device.invoke(hw, "convolution_layer_hw");
    convolution_layer_hw(device, hw, result, weights, desc, num_images, activations)?;
    return Ok(ResultLoc::Activations);
  }

  device.invoke(hw, "convolution_layer_hw");
  convolution_layer_hw(device, hw, activations, weights, desc, num_images, result)?;
  Ok(ResultLoc::Result)
}

fn inner_product_layer_hw(
  device: &mut dyn Device,
  hw: HwId,
  activations: &[f32],
  weights: &[f32],
  desc: &LayerDesc,
  num_images: usize,
  result: &mut [f32],
) -> Result<()> {
  grab_matrix_dma(device, hw, weights, desc)?;
  grab_input_activations_dma(device, hw, activations, num_images * desc.inputs.len())?;
  // The activation function runs inside the matrix multiply.
  matrix_multiply_with_bias(
    activations,
    weights,
    num_images,
    &desc.inputs,
    &desc.weights,
    &desc.outputs,
    desc.activation,
    result,
  );
  store_output_activations_dma(device, hw, result, num_images * desc.outputs.len())
}

pub fn inner_product_layer(
  device: &mut dyn Device,
  accel: &AcceleratorConfig,
  activations: &[f32],
  weights: &[f32],
  desc: &LayerDesc,
  num_images: usize,
  result: &mut [f32],
) -> Result<ResultLoc> {
  let hw = accel.inner_product_hw;
  map_layer_arrays(device, hw, desc, num_images);
  device.invoke(hw, "inner_product_layer_hw");
  inner_product_layer_hw(device, hw, activations, weights, desc, num_images, result)?;
  Ok(ResultLoc::Result)
}

/// Pooling has no accelerated path; only max pooling is implemented.
pub fn pooling_layer(activations: &[f32], desc: &LayerDesc, num_images: usize, result: &mut [f32]) -> Result<ResultLoc> {
  match desc.pool {
    PoolKind::Max => {
      max_pooling(
        activations,
        &desc.inputs,
        &desc.outputs,
        num_images,
        desc.field_size,
        desc.field_stride,
        result,
      );
      Ok(ResultLoc::Result)
    },
    kind => Err(SmivError::UnsupportedPooling {
      layer: desc.name.clone(),
      kind,
    }),
  }
}

/// Run one layer reading `activations` and writing `result`.
///
/// Both buffers must hold `num_images * desc.max_footprint()` elements.
/// Activation functions run inside the convolution / matrix multiply
/// rather than as a separate stage.
pub fn run_layer(
  device: &mut dyn Device,
  accel: &AcceleratorConfig,
  activations: &mut [f32],
  weights: &[f32],
  desc: &LayerDesc,
  num_images: usize,
  result: &mut [f32],
) -> Result<ResultLoc> {
  let need = num_images * desc.max_footprint();
  for (what, have) in [("activations", activations.len()), ("result", result.len())] {
    if have < need {
      return Err(SmivError::ShapeMismatch {
        layer: desc.name.clone(),
        reason: format!("{} buffer holds {} elements, layer needs {}", what, have, need),
      });
    }
  }
  if desc.has_weights() && weights.len() < desc.weights_len() {
    if weights.is_empty() {
      return Err(SmivError::MissingWeights {
        layer: desc.name.clone(),
      });
    }
    return Err(SmivError::ShapeMismatch {
      layer: desc.name.clone(),
      reason: format!("weights hold {} elements, layer needs {}", weights.len(), desc.weights_len()),
    });
  }

  info!("[{}] {:?}: {:?} -> {:?}", desc.name, desc.kind, desc.inputs, desc.outputs);
  match desc.kind {
    LayerKind::Convolution => convolution_layer(device, accel, activations, weights, desc, num_images, result),
    LayerKind::InnerProduct => inner_product_layer(device, accel, activations, weights, desc, num_images, result),
    LayerKind::Pooling => pooling_layer(activations, desc, num_images, result),
  }
}
