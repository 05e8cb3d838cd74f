use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::{Dims, LayerDesc, LayerKind, Network, PoolKind, Tensor};
use crate::error::Result;
use crate::kernels::Activation;

fn default_one() -> usize {
  1
}

fn default_pool() -> PoolKind {
  PoolKind::Max
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputSpec {
  pub rows: usize,
  pub cols: usize,
  #[serde(default = "default_one")]
  pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
  Conv {
    name: Option<String>,
    field_size: usize,
    #[serde(default = "default_one")]
    stride: usize,
    #[serde(default)]
    padding: usize,
    kernels: usize,
    #[serde(default)]
    activation: Activation,
  },
  Fc {
    name: Option<String>,
    outputs: usize,
    #[serde(default)]
    activation: Activation,
  },
  Pool {
    name: Option<String>,
    field_size: usize,
    #[serde(default = "default_one")]
    stride: usize,
    #[serde(default = "default_pool")]
    pool: PoolKind,
  },
}

/// A network as written in a description file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NetworkSpec {
  pub name: String,
  #[serde(default = "default_one")]
  pub num_images: usize,
  pub input: InputSpec,
  pub layers: Vec<LayerSpec>,
}

impl NetworkSpec {
  pub fn from_toml_str(text: &str) -> Result<Self> {
    Ok(toml::from_str(text)?)
  }

  pub fn from_file(path: &Path) -> Result<Self> {
    let text = fs::read_to_string(path)?;
    Self::from_toml_str(&text)
  }
}

/// How the builder fills weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightInit {
  /// Small repeating values in [-0.3, 0.3].
  #[default]
  Fixed,
  Zeros,
}

/// The deterministic pattern used for `WeightInit::Fixed` and sample inputs.
pub fn fixed_value(i: usize) -> f32 {
  ((i % 13) as f32 - 6.0) * 0.05
}

pub struct NetworkBuilder {
  spec: NetworkSpec,
  init: WeightInit,
}

impl NetworkBuilder {
  pub fn new(spec: NetworkSpec) -> Self {
    Self {
      spec,
      init: WeightInit::default(),
    }
  }

  pub fn weight_init(mut self, init: WeightInit) -> Self {
    self.init = init;
    self
  }

  pub fn spec(&self) -> &NetworkSpec {
    &self.spec
  }

  pub fn input_dims(&self) -> Dims {
    let input = &self.spec.input;
    Dims::new(input.rows, input.cols, input.height)
  }

  /// Derive every descriptor, threading each layer's output shape into the next.
  pub fn layer_descs(&self) -> Result<Vec<LayerDesc>> {
    let mut dims = self.input_dims();
    let mut descs = Vec::with_capacity(self.spec.layers.len());
    for (idx, layer) in self.spec.layers.iter().enumerate() {
      let desc = match layer {
        LayerSpec::Conv {
          name,
          field_size,
          stride,
          padding,
          kernels,
          activation,
        } => {
          let name = name.clone().unwrap_or_else(|| format!("conv{}", idx));
          LayerDesc::convolution(name, dims, *field_size, *stride, *padding, *kernels, *activation)?
        },
        LayerSpec::Fc {
          name,
          outputs,
          activation,
        } => {
          let name = name.clone().unwrap_or_else(|| format!("fc{}", idx));
          LayerDesc::inner_product(name, dims, *outputs, *activation)
        },
        LayerSpec::Pool {
          name,
          field_size,
          stride,
          pool,
        } => {
          let name = name.clone().unwrap_or_else(|| format!("pool{}", idx));
          LayerDesc::pooling(name, dims, *field_size, *stride, *pool)?
        },
      };
      dims = desc.outputs;
      descs.push(desc);
    }
    Ok(descs)
  }

  fn weights_for(&self, desc: &LayerDesc) -> Option<Tensor> {
    if !desc.has_weights() {
      return None;
    }
    let batch = match desc.kind {
      LayerKind::Convolution => desc.num_kernels(),
      _ => 1,
    };
    let mut tensor = Tensor::zeros(format!("{}.weights", desc.name), desc.weights, batch);
    if self.init == WeightInit::Fixed {
      tensor.fill_with(fixed_value);
    }
    Some(tensor)
  }

  pub fn build(&self) -> Result<Network> {
    let layers = self.layer_descs()?;
    let weights = layers.iter().map(|desc| self.weights_for(desc)).collect();
    info!("[builder] {}: {} layers, weights {:?}", self.spec.name, layers.len(), self.init);
    Network::new(self.spec.name.clone(), self.spec.num_images, layers, weights)
  }

  /// A deterministic input batch matching the network's first layer.
  pub fn sample_input(&self) -> Tensor {
    let mut input = Tensor::zeros("input", self.input_dims(), self.spec.num_images);
    input.fill_with(|i| fixed_value(i + 3).abs());
    input
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::SmivError;

  const SPEC: &str = r#"
name = "small"
num_images = 2

[input]
rows = 8
cols = 8

[[layers]]
type = "conv"
field_size = 3
padding = 1
kernels = 2
activation = "relu"

[[layers]]
type = "pool"
field_size = 2
stride = 2

[[layers]]
type = "fc"
name = "logits"
outputs = 3
"#;

  #[test]
  fn test_parse_defaults() {
    let spec = NetworkSpec::from_toml_str(SPEC).unwrap();
    assert_eq!(spec.input.height, 1);
    assert_eq!(spec.layers.len(), 3);
    assert!(matches!(
      spec.layers[1],
      LayerSpec::Pool {
        stride: 2,
        pool: PoolKind::Max,
        ..
      }
    ));
    assert!(matches!(spec.layers[0], LayerSpec::Conv { stride: 1, .. }));
  }

  #[test]
  fn test_descs_chain_shapes() {
    let builder = NetworkBuilder::new(NetworkSpec::from_toml_str(SPEC).unwrap());
    let descs = builder.layer_descs().unwrap();

    assert_eq!(descs[0].name, "conv0");
    assert_eq!(descs[0].outputs, Dims::new(8, 8, 2));
    assert_eq!(descs[1].kind, LayerKind::Pooling);
    assert_eq!(descs[1].outputs, Dims::new(4, 4, 2));
    assert_eq!(descs[2].name, "logits");
    assert_eq!(descs[2].weights.rows, 4 * 4 * 2 + 1);
  }

  #[test]
  fn test_build_sizes_buffers_for_largest_layer() {
    let net = NetworkBuilder::new(NetworkSpec::from_toml_str(SPEC).unwrap()).build().unwrap();
    // padded conv input: 10x10 rows of 16 lanes, one channel, two images
    assert_eq!(net.buffer_len(), 2 * 10 * 16);
    assert!(net.weights(1).is_none());
    assert_eq!(net.weights(0).unwrap().data().len(), net.layers()[0].weights_len());
  }

  #[test]
  fn test_zero_weights_give_zero_output() {
    let builder = NetworkBuilder::new(NetworkSpec::from_toml_str(SPEC).unwrap()).weight_init(WeightInit::Zeros);
    let mut net = builder.build().unwrap();
    let input = builder.sample_input();
    let mut device = crate::arch::smiv::SoftwareDevice::new();

    crate::network::nnet_fwd(&mut net, &input, &mut device, &Default::default()).unwrap();
    assert_eq!(net.output().unwrap().to_dense(), vec![0.0; 6]);
  }

  #[test]
  fn test_bad_layer_reported() {
    let text = SPEC.replace("field_size = 2\nstride = 2", "field_size = 2\nstride = 0");
    let builder = NetworkBuilder::new(NetworkSpec::from_toml_str(&text).unwrap());
    assert!(builder.build().is_err());
    assert!(NetworkSpec::from_toml_str("name = 1").is_err());
  }

  #[test]
  fn test_conv_stride_three_fails_at_build() {
    let text = SPEC.replace("padding = 1\nkernels = 2", "padding = 1\nstride = 3\nkernels = 2");
    let builder = NetworkBuilder::new(NetworkSpec::from_toml_str(&text).unwrap());
    let err = builder.build().unwrap_err();
    assert!(matches!(err, SmivError::UnsupportedStride { stride: 3 }));
  }
}
