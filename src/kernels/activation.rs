use serde::{Deserialize, Serialize};

use crate::network::Dims;

/// Activation function applied to a layer's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
  #[default]
  None,
  Relu,
  LeakyRelu,
  Elu,
  Selu,
  Tanh,
  Sigmoid,
}

const LRELU_SLOPE: f32 = 0.1;
const SELU_ALPHA: f32 = 1.673_263_2;
const SELU_LAMBDA: f32 = 1.050_701;

impl Activation {
  pub fn apply(self, x: f32) -> f32 {
    match self {
      Activation::None => x,
      Activation::Relu => x.max(0.0),
      Activation::LeakyRelu => {
        if x < 0.0 {
          LRELU_SLOPE * x
        } else {
          x
        }
      },
      Activation::Elu => elu(x, 1.0),
      Activation::Selu => SELU_LAMBDA * elu(x, SELU_ALPHA),
      Activation::Tanh => x.tanh(),
      Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
    }
  }
}

fn elu(x: f32, alpha: f32) -> f32 {
  if x < 0.0 {
    alpha * (x.exp() - 1.0)
  } else {
    x
  }
}

/// Apply `act` to every valid (non-pad) element of `num_images` tensors of shape `dims`.
pub fn apply_activation(buf: &mut [f32], dims: &Dims, num_images: usize, act: Activation) {
  if act == Activation::None {
    return;
  }
  let padded = dims.padded_cols();
  for row in buf[..num_images * dims.len()].chunks_exact_mut(padded) {
    for x in &mut row[..dims.cols] {
      *x = act.apply(*x);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_activation_values() {
    assert_eq!(Activation::Relu.apply(-2.0), 0.0);
    assert_eq!(Activation::Relu.apply(3.0), 3.0);
    assert_eq!(Activation::LeakyRelu.apply(-2.0), -0.2);
    assert_eq!(Activation::None.apply(-2.0), -2.0);
    assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-6);
    assert!((Activation::Tanh.apply(1.0) - 1.0f32.tanh()).abs() < 1e-6);
    assert!(Activation::Elu.apply(-50.0) > -1.0 - 1e-6);
    assert!((Activation::Selu.apply(1.0) - SELU_LAMBDA).abs() < 1e-6);
  }

  #[test]
  fn test_apply_activation_skips_pad_lanes() {
    let dims = Dims::new(2, 3, 1);
    let mut buf = vec![-1.0; dims.len()];

    apply_activation(&mut buf, &dims, 1, Activation::Relu);

    for row in buf.chunks_exact(dims.padded_cols()) {
      assert_eq!(&row[..3], &[0.0, 0.0, 0.0]);
      assert!(row[3..].iter().all(|&x| x == -1.0));
    }
  }

  #[test]
  fn test_activation_from_toml_name() {
    #[derive(Deserialize)]
    struct Holder {
      act: Activation,
    }
    let h: Holder = toml::from_str("act = \"leaky_relu\"").unwrap();
    assert_eq!(h.act, Activation::LeakyRelu);
  }
}
