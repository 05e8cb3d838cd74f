// Network: layer descriptors, their weights, and the ping-pong forward pass

use log::{debug, info};

use super::pingpong::{PingPong, Slot};
use super::{Dims, LayerDesc, Tensor};
use crate::arch::smiv::{run_layer, Device};
use crate::config::AcceleratorConfig;
use crate::error::{Result, SmivError};

#[derive(Debug)]
pub struct Network {
  pub name: String,
  num_images: usize,
  layers: Vec<LayerDesc>,
  /// One entry per layer; `None` for layers without parameters.
  weights: Vec<Option<Tensor>>,
  buffers: PingPong,
  next_layer: usize,
  result_slot: Option<Slot>,
}

impl Network {
  /// Assemble a network, checking that consecutive layers agree on shapes.
  ///
  /// Both ping-pong buffers are sized for the largest footprint of any layer.
  pub fn new(
    name: impl Into<String>,
    num_images: usize,
    layers: Vec<LayerDesc>,
    weights: Vec<Option<Tensor>>,
  ) -> Result<Self> {
    let name = name.into();
    if layers.is_empty() {
      return Err(SmivError::ShapeMismatch {
        layer: name,
        reason: "network has no layers".to_string(),
      });
    }
    if weights.len() != layers.len() {
      return Err(SmivError::ShapeMismatch {
        layer: name,
        reason: format!("{} weight entries for {} layers", weights.len(), layers.len()),
      });
    }
    for pair in layers.windows(2) {
      if pair[0].outputs != pair[1].inputs {
        return Err(SmivError::ShapeMismatch {
          layer: pair[1].name.clone(),
          reason: format!("expects {:?} but {} produces {:?}", pair[1].inputs, pair[0].name, pair[0].outputs),
        });
      }
    }
    for (desc, w) in layers.iter().zip(&weights) {
      match w {
        None if desc.has_weights() => {
          return Err(SmivError::MissingWeights {
            layer: desc.name.clone(),
          })
        },
        Some(t) if t.data().len() != desc.weights_len() => {
          return Err(SmivError::ShapeMismatch {
            layer: desc.name.clone(),
            reason: format!("weights hold {} elements, layer needs {}", t.data().len(), desc.weights_len()),
          })
        },
        _ => {},
      }
    }

    let footprint = layers.iter().map(LayerDesc::max_footprint).max().unwrap_or(0);
    info!(
      "[{}] {} layers, {} images, buffers of {} floats",
      name,
      layers.len(),
      num_images,
      num_images * footprint
    );
    Ok(Self {
      name,
      num_images,
      layers,
      weights,
      buffers: PingPong::new(num_images * footprint),
      next_layer: 0,
      result_slot: None,
    })
  }

  pub fn num_images(&self) -> usize {
    self.num_images
  }

  pub fn layers(&self) -> &[LayerDesc] {
    &self.layers
  }

  pub fn weights(&self, layer: usize) -> Option<&Tensor> {
    self.weights.get(layer).and_then(Option::as_ref)
  }

  pub fn input_dims(&self) -> Dims {
    self.layers[0].inputs
  }

  pub fn output_dims(&self) -> Dims {
    self.layers[self.layers.len() - 1].outputs
  }

  pub fn buffer_len(&self) -> usize {
    self.buffers.len()
  }

  /// Load a batch of inputs and rewind to the first layer.
  pub fn load_input(&mut self, input: &Tensor) -> Result<()> {
    if input.dims != self.input_dims() || input.batch != self.num_images {
      return Err(SmivError::ShapeMismatch {
        layer: self.name.clone(),
        reason: format!(
          "input is {} x {:?}, network takes {} x {:?}",
          input.batch,
          input.dims,
          self.num_images,
          self.input_dims()
        ),
      });
    }
    self.buffers.reset_with(input.data());
    self.next_layer = 0;
    self.result_slot = None;
    Ok(())
  }

  pub fn live_slot(&self) -> Slot {
    self.buffers.live()
  }

  /// Index of the layer the next `step` will run.
  pub fn next_layer(&self) -> usize {
    self.next_layer
  }

  pub fn is_done(&self) -> bool {
    self.next_layer >= self.layers.len()
  }

  /// Slot holding the final output; set once the last layer has run.
  pub fn result_slot(&self) -> Option<Slot> {
    self.result_slot
  }

  /// Run one layer: read the live slot, write the other, and record where
  /// the output landed. Returns the new live slot.
  pub fn step(&mut self, device: &mut dyn Device, accel: &AcceleratorConfig) -> Result<Slot> {
    let idx = self.next_layer;
    let desc = self.layers.get(idx).ok_or_else(|| SmivError::ShapeMismatch {
      layer: self.name.clone(),
      reason: "forward pass already finished".to_string(),
    })?;
    let weights = self.weights[idx].as_ref().map(Tensor::data).unwrap_or(&[]);
    let from = self.buffers.live();
    let (activations, result) = self.buffers.split();

    let loc = run_layer(device, accel, activations, weights, desc, self.num_images, result)?;
    let live = self.buffers.commit(loc);
    debug!("[{}] layer {} ({}) read {:?}, output in {:?}", self.name, idx, desc.name, from, live);

    self.next_layer += 1;
    if self.is_done() {
      self.result_slot = Some(live);
      info!("[{}] forward pass done, result in {:?}", self.name, live);
    }
    Ok(live)
  }

  /// Run every remaining layer; returns the slot holding the result.
  pub fn run(&mut self, device: &mut dyn Device, accel: &AcceleratorConfig) -> Result<Slot> {
    while !self.is_done() {
      self.step(device, accel)?;
    }
    Ok(self.buffers.live())
  }

  /// Copy the final output out of its slot.
  pub fn output(&self) -> Result<Tensor> {
    let slot = self.result_slot.ok_or_else(|| SmivError::ShapeMismatch {
      layer: self.name.clone(),
      reason: "forward pass has not finished".to_string(),
    })?;
    let dims = self.output_dims();
    let len = self.num_images * dims.len();
    Tensor::from_padded("output", dims, self.num_images, self.buffers.buffer(slot)[..len].to_vec())
  }
}

/// Run a whole forward pass over `input`; returns the slot holding the result.
pub fn nnet_fwd(
  network: &mut Network,
  input: &Tensor,
  device: &mut dyn Device,
  accel: &AcceleratorConfig,
) -> Result<Slot> {
  network.load_input(input)?;
  network.run(device, accel)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::smiv::SoftwareDevice;
  use crate::kernels::Activation;
  use crate::network::PoolKind;

  fn tiny() -> Network {
    let conv = LayerDesc::convolution("conv", Dims::new(4, 4, 1), 3, 1, 0, 1, Activation::None).unwrap();
    let pool = LayerDesc::pooling("pool", conv.outputs, 2, 2, PoolKind::Max).unwrap();
    let w = Tensor::from_dense("w", conv.weights, 1, &[1.0; 9]).unwrap();
    Network::new("tiny", 1, vec![conv, pool], vec![Some(w), None]).unwrap()
  }

  #[test]
  fn test_forward_alternates_slots() {
    let mut net = tiny();
    let input = Tensor::from_dense("in", net.input_dims(), 1, &[1.0; 16]).unwrap();
    let mut device = SoftwareDevice::new();
    let accel = AcceleratorConfig::default();

    net.load_input(&input).unwrap();
    assert_eq!(net.step(&mut device, &accel).unwrap(), Slot::Result);
    assert!(net.result_slot().is_none());
    assert_eq!(net.step(&mut device, &accel).unwrap(), Slot::Activations);
    assert_eq!(net.result_slot(), Some(Slot::Activations));

    assert_eq!(net.output().unwrap().to_dense(), vec![9.0]);
    assert!(net.step(&mut device, &accel).is_err());
  }

  #[test]
  fn test_rerun_after_reload() {
    let mut net = tiny();
    let mut device = SoftwareDevice::new();
    let accel = AcceleratorConfig::default();
    let ones = Tensor::from_dense("in", net.input_dims(), 1, &[1.0; 16]).unwrap();
    let twos = Tensor::from_dense("in", net.input_dims(), 1, &[2.0; 16]).unwrap();

    nnet_fwd(&mut net, &ones, &mut device, &accel).unwrap();
    nnet_fwd(&mut net, &twos, &mut device, &accel).unwrap();
    assert_eq!(net.output().unwrap().to_dense(), vec![18.0]);
  }

  #[test]
  fn test_shape_chain_checked() {
    let conv = LayerDesc::convolution("conv", Dims::new(4, 4, 1), 3, 1, 0, 1, Activation::None).unwrap();
    let fc = LayerDesc::inner_product("fc", Dims::new(4, 4, 1), 2, Activation::None);
    let cw = Tensor::zeros("cw", conv.weights, 1);
    let fw = Tensor::zeros("fw", fc.weights, 1);
    let err = Network::new("bad", 1, vec![conv, fc], vec![Some(cw), Some(fw)]).err().unwrap();
    assert!(matches!(err, SmivError::ShapeMismatch { ref layer, .. } if layer == "fc"));
  }

  #[test]
  fn test_missing_weights_rejected_up_front() {
    let fc = LayerDesc::inner_product("fc", Dims::new(1, 4, 1), 2, Activation::None);
    let err = Network::new("bad", 1, vec![fc], vec![None]).err().unwrap();
    assert!(matches!(err, SmivError::MissingWeights { .. }));
  }
}
